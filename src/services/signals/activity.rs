//! Trading-activity rules: turnover level and volume/price divergence.

use super::Classifier;
use crate::config::EngineConfig;
use crate::services::indicators::mean;
use crate::services::window::Window;
use crate::types::{SignalType, TurnoverLevel, Verdict};

/// Buckets the day's turnover rate. Writes a [`TurnoverLevel`] rather than
/// a direction.
pub struct Turnover {
    quiet_below: f64,
    active_max: f64,
}

impl Turnover {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            quiet_below: config.turnover_quiet_below,
            active_max: config.turnover_active_max,
        }
    }

    pub fn level(&self, rate: f64) -> TurnoverLevel {
        if rate < self.quiet_below {
            TurnoverLevel::Quiet
        } else if rate <= self.active_max {
            TurnoverLevel::Active
        } else {
            TurnoverLevel::AbnormallyActive
        }
    }
}

impl Classifier for Turnover {
    fn signal_type(&self) -> SignalType {
        SignalType::Turnover
    }

    fn classify(&self, window: &Window, idx: usize) -> Verdict {
        let rate = match window.day(idx).and_then(|d| d.bar.turnover_rate) {
            None => return Verdict::no_signal("无换手率数据"),
            Some(r) if !r.is_finite() => return Verdict::no_signal("换手率无效"),
            Some(r) if r < 0.0 => return Verdict::no_signal("换手率为负"),
            Some(r) => r,
        };
        Verdict::new(self.level(rate), format!("换手率{:.2}%", rate))
    }
}

/// Price at an extreme of the recent window while volume shrinks.
pub struct VolumePriceDivergence {
    lookback: usize,
    avg_days: usize,
}

impl VolumePriceDivergence {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            lookback: config.divergence_days,
            avg_days: config.avg_volume_days,
        }
    }
}

impl Classifier for VolumePriceDivergence {
    fn signal_type(&self) -> SignalType {
        SignalType::VolumePriceDivergence
    }

    fn classify(&self, window: &Window, idx: usize) -> Verdict {
        let Some(day) = window.day(idx) else {
            return Verdict::no_signal("历史日数不足");
        };
        if idx < self.lookback || idx < self.avg_days * 2 || self.avg_days == 0 {
            return Verdict::no_signal("历史日数不足");
        }
        let span = &window.days[idx - self.lookback..=idx];
        if span.len() < self.avg_days * 2 {
            return Verdict::neutral("数据不足");
        }

        let vols: Vec<f64> = span.iter().map(|d| d.bar.volume).collect();
        let n = vols.len();
        let recent = mean(&vols[n - self.avg_days..]).unwrap_or(0.0);
        let previous = mean(&vols[n - 2 * self.avg_days..n - self.avg_days]).unwrap_or(0.0);
        if previous <= 0.0 {
            return Verdict::neutral("前段均量无效");
        }
        let shrinking = recent < previous;

        let (min_close, max_close) = span.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
            (lo.min(d.bar.close), hi.max(d.bar.close))
        });
        let close = day.bar.close;
        if close >= max_close && shrinking {
            Verdict::bearish("顶背离(价创新高量缩)")
        } else if close <= min_close && shrinking {
            Verdict::bullish("底背离(价创新低量缩)")
        } else {
            Verdict::neutral("无显著量价背离")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::flat_window;
    use super::*;
    use crate::types::{Direction, SignalValue};

    fn turnover_at(rate: Option<f64>) -> Verdict {
        let mut w = flat_window(1, 10.0, 1000.0);
        w.days[0].bar.turnover_rate = rate;
        Turnover::from_config(&EngineConfig::default()).classify(&w, 0)
    }

    #[test]
    fn test_turnover_bucket_boundaries() {
        assert_eq!(turnover_at(Some(2.999)).value, SignalValue::Turnover(TurnoverLevel::Quiet));
        assert_eq!(turnover_at(Some(3.0)).value, SignalValue::Turnover(TurnoverLevel::Active));
        assert_eq!(turnover_at(Some(10.0)).value, SignalValue::Turnover(TurnoverLevel::Active));
        assert_eq!(
            turnover_at(Some(10.001)).value,
            SignalValue::Turnover(TurnoverLevel::AbnormallyActive)
        );
    }

    #[test]
    fn test_turnover_unusable_readings() {
        assert_eq!(turnover_at(None).direction(), Some(Direction::NoSignal));
        assert_eq!(turnover_at(Some(-0.5)).direction(), Some(Direction::NoSignal));
        assert_eq!(turnover_at(Some(f64::NAN)).direction(), Some(Direction::NoSignal));
    }

    #[test]
    fn test_turnover_reason_formats_rate() {
        assert_eq!(turnover_at(Some(4.5)).reason, "换手率4.50%");
    }

    /// Eleven days: first six at `early_vol`, last five at `late_vol`.
    fn divergence_window(closes: &[f64; 11], early_vol: f64, late_vol: f64) -> Window {
        let mut w = flat_window(11, 10.0, early_vol);
        for (i, d) in w.days.iter_mut().enumerate() {
            d.bar.close = closes[i];
            if i >= 6 {
                d.bar.volume = late_vol;
            }
        }
        w
    }

    #[test]
    fn test_top_divergence() {
        let closes = [10.0, 10.1, 10.2, 10.3, 10.4, 10.5, 10.6, 10.7, 10.8, 10.9, 11.0];
        let w = divergence_window(&closes, 1000.0, 600.0);
        let v = VolumePriceDivergence::from_config(&EngineConfig::default()).classify(&w, 10);
        assert_eq!(v.direction(), Some(Direction::Bearish));
    }

    #[test]
    fn test_bottom_divergence() {
        let closes = [11.0, 10.9, 10.8, 10.7, 10.6, 10.5, 10.4, 10.3, 10.2, 10.1, 10.0];
        let w = divergence_window(&closes, 1000.0, 600.0);
        let v = VolumePriceDivergence::from_config(&EngineConfig::default()).classify(&w, 10);
        assert_eq!(v.direction(), Some(Direction::Bullish));
    }

    #[test]
    fn test_no_divergence_when_volume_grows() {
        let closes = [10.0, 10.1, 10.2, 10.3, 10.4, 10.5, 10.6, 10.7, 10.8, 10.9, 11.0];
        let w = divergence_window(&closes, 600.0, 1000.0);
        let classifier = VolumePriceDivergence::from_config(&EngineConfig::default());
        assert_eq!(classifier.classify(&w, 10).reason, "无显著量价背离");
        assert_eq!(classifier.classify(&w, 9).direction(), Some(Direction::NoSignal));
    }
}
