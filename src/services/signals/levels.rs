//! Price-level rules against the band of the prior N days.

use super::Classifier;
use crate::config::EngineConfig;
use crate::services::indicators::{mean, true_range};
use crate::services::window::{Day, Window};
use crate::types::{SignalType, Verdict};

/// Lowest low and highest high of a run of days.
fn band(days: &[Day]) -> (f64, f64) {
    days.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
        (lo.min(d.bar.low), hi.max(d.bar.high))
    })
}

/// Today's bar touching or approaching the prior band's floor or ceiling.
pub struct SupportResistance {
    lookback: usize,
    near_pct: f64,
    flat_pct: f64,
}

impl SupportResistance {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            lookback: config.support_resistance_days,
            near_pct: config.near_band_pct,
            flat_pct: config.flat_band_pct,
        }
    }
}

impl Classifier for SupportResistance {
    fn signal_type(&self) -> SignalType {
        SignalType::SupportResistance
    }

    fn classify(&self, window: &Window, idx: usize) -> Verdict {
        let (Some(day), Some(prior)) = (window.day(idx), window.prior(idx, self.lookback)) else {
            return Verdict::no_signal("历史K线不足");
        };
        if prior.is_empty() {
            return Verdict::neutral("无前段区间");
        }
        let (support, resistance) = band(prior);
        let bar = &day.bar;

        let threshold = if resistance != support {
            self.near_pct * (resistance - support)
        } else {
            self.flat_pct * bar.close
        };
        if !(threshold > 0.0) {
            return Verdict::neutral("区间无波动");
        }

        let near_support = bar.low <= support + threshold || bar.close <= support + threshold;
        let near_resist = bar.high >= resistance - threshold || bar.close >= resistance - threshold;
        match (near_support, near_resist) {
            (true, false) => Verdict::bullish("触及或接近关键支撑位"),
            (false, true) => Verdict::bearish("触及或接近关键阻力位"),
            (true, true) => Verdict::neutral("同时接近支撑与阻力"),
            (false, false) => Verdict::neutral("未触及关键支撑/阻力位"),
        }
    }
}

/// Close breaking out of the prior band, else a volatility expansion check.
pub struct VolatilityBreakout {
    lookback: usize,
    recent_days: usize,
    baseline_days: usize,
    expand_ratio: f64,
}

impl VolatilityBreakout {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            lookback: config.breakout_days,
            recent_days: config.volatility_recent_days,
            baseline_days: config.volatility_baseline_days,
            expand_ratio: config.volatility_expand_ratio,
        }
    }

    /// Mean of true range over close for days `from..to`, skipping flat or
    /// unpriced days. Day `from` must have a predecessor.
    fn normalized_range(window: &Window, from: usize, to: usize) -> Option<f64> {
        let ranges: Vec<f64> = (from..to)
            .filter_map(|k| {
                let bar = &window.days[k].bar;
                let tr = true_range(bar, Some(&window.days[k - 1].bar));
                (tr > 0.0 && bar.close > 0.0).then(|| tr / bar.close)
            })
            .collect();
        mean(&ranges)
    }

    fn is_expanding(&self, window: &Window, idx: usize) -> bool {
        if self.recent_days == 0 || self.baseline_days == 0 || idx < self.recent_days + self.baseline_days {
            return false;
        }
        let recent_start = idx + 1 - self.recent_days;
        let baseline_start = recent_start - self.baseline_days;
        let recent = Self::normalized_range(window, recent_start, idx + 1);
        let baseline = Self::normalized_range(window, baseline_start, recent_start);
        match (recent, baseline) {
            (Some(r), Some(b)) => b > 0.0 && r >= self.expand_ratio * b,
            _ => false,
        }
    }
}

impl Classifier for VolatilityBreakout {
    fn signal_type(&self) -> SignalType {
        SignalType::VolatilityBreakout
    }

    fn classify(&self, window: &Window, idx: usize) -> Verdict {
        let (Some(day), Some(prior)) = (window.day(idx), window.prior(idx, self.lookback)) else {
            return Verdict::no_signal("历史日数不足");
        };
        if prior.is_empty() {
            return Verdict::neutral("无前段区间");
        }
        let (support, resistance) = band(prior);
        if resistance <= 0.0 || support <= 0.0 {
            return Verdict::neutral("无有效高低点");
        }

        let close = day.bar.close;
        if close > resistance {
            Verdict::bullish("突破前段高点")
        } else if close < support {
            Verdict::bearish("跌破前段低点")
        } else if self.is_expanding(window, idx) {
            Verdict::neutral("波动率放大")
        } else {
            Verdict::neutral("未突破")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::flat_window;
    use super::*;
    use crate::types::Direction;

    /// 20 prior days ranging 9..11, then today's bar.
    fn banded(low: f64, high: f64, close: f64) -> Window {
        let mut w = flat_window(21, 10.0, 1000.0);
        let today = &mut w.days[20].bar;
        today.low = low;
        today.high = high;
        today.close = close;
        w
    }

    #[test]
    fn test_support_touch_is_bullish() {
        let v = SupportResistance::from_config(&EngineConfig::default()).classify(&banded(9.02, 10.0, 9.5), 20);
        assert_eq!(v.direction(), Some(Direction::Bullish));
    }

    #[test]
    fn test_resistance_touch_is_bearish() {
        let v = SupportResistance::from_config(&EngineConfig::default()).classify(&banded(10.0, 10.99, 10.5), 20);
        assert_eq!(v.direction(), Some(Direction::Bearish));
    }

    #[test]
    fn test_both_levels_tie_is_neutral() {
        let v = SupportResistance::from_config(&EngineConfig::default()).classify(&banded(9.0, 11.0, 10.0), 20);
        assert_eq!(v.direction(), Some(Direction::Neutral));
        assert_eq!(v.reason, "同时接近支撑与阻力");
    }

    #[test]
    fn test_mid_band_is_neutral() {
        let v = SupportResistance::from_config(&EngineConfig::default()).classify(&banded(9.8, 10.2, 10.0), 20);
        assert_eq!(v.reason, "未触及关键支撑/阻力位");
    }

    #[test]
    fn test_support_resistance_needs_twenty_prior_days() {
        let w = banded(9.0, 11.0, 10.0);
        let v = SupportResistance::from_config(&EngineConfig::default()).classify(&w, 19);
        assert_eq!(v.direction(), Some(Direction::NoSignal));
    }

    #[test]
    fn test_flat_band_uses_close_threshold() {
        let mut w = flat_window(21, 10.0, 1000.0);
        for d in &mut w.days[..20] {
            d.bar.high = 10.0;
            d.bar.low = 10.0;
        }
        w.days[20].bar.low = 10.05;
        w.days[20].bar.high = 10.3;
        w.days[20].bar.close = 10.2;
        // band collapses to 10.0, threshold is 1% of close: low 10.05
        // touches support and high 10.3 is past resistance
        let v = SupportResistance::from_config(&EngineConfig::default()).classify(&w, 20);
        assert_eq!(v.reason, "同时接近支撑与阻力");
    }

    #[test]
    fn test_breakout_above_and_below() {
        let classifier = VolatilityBreakout::from_config(&EngineConfig::default());
        assert_eq!(classifier.classify(&banded(10.0, 12.0, 11.5), 20).direction(), Some(Direction::Bullish));
        assert_eq!(classifier.classify(&banded(8.0, 10.0, 8.5), 20).direction(), Some(Direction::Bearish));
        assert_eq!(classifier.classify(&banded(9.5, 10.5, 10.0), 20).reason, "未突破");
        assert_eq!(classifier.classify(&banded(9.5, 10.5, 10.0), 19).direction(), Some(Direction::NoSignal));
    }

    #[test]
    fn test_volatility_expansion_without_breakout() {
        let mut w = flat_window(21, 10.0, 1000.0);
        for d in &mut w.days[..16] {
            d.bar.high = 10.2;
            d.bar.low = 9.8;
        }
        // last five days swing wider while the close stays inside the band
        for d in &mut w.days[16..21] {
            d.bar.high = 10.9;
            d.bar.low = 9.1;
        }
        w.days[20].bar.close = 10.0;
        let v = VolatilityBreakout::from_config(&EngineConfig::default()).classify(&w, 20);
        assert_eq!(v.direction(), Some(Direction::Neutral));
        assert_eq!(v.reason, "波动率放大");
    }
}
