//! Volume surge rules.
//!
//! A surge is today's volume at or above `volume_ratio` times the mean of
//! the prior `avg_volume_days` volumes.

use super::{average_prior_volume, Classifier};
use crate::config::EngineConfig;
use crate::services::window::Window;
use crate::types::{SignalType, Verdict};

/// Volume surge read against net money flow and the close's position
/// relative to MA20.
pub struct VolumeFlowMa20 {
    volume_ratio: f64,
    avg_days: usize,
}

impl VolumeFlowMa20 {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            volume_ratio: config.volume_ratio,
            avg_days: config.avg_volume_days,
        }
    }
}

impl Classifier for VolumeFlowMa20 {
    fn signal_type(&self) -> SignalType {
        SignalType::VolumeFlowMa20
    }

    fn classify(&self, window: &Window, idx: usize) -> Verdict {
        let Some(day) = window.day(idx) else {
            return Verdict::no_signal("缺日线或成交量");
        };
        let close = day.bar.close;
        let volume = day.bar.volume;
        if !close.is_finite() || volume <= 0.0 {
            return Verdict::no_signal("缺日线或成交量");
        }
        let Some(avg) = average_prior_volume(window, idx, self.avg_days) else {
            return Verdict::no_signal("历史日数不足");
        };
        if avg <= 0.0 {
            return Verdict::no_signal("均量无效");
        }
        if volume < self.volume_ratio * avg {
            return Verdict::neutral("未放量");
        }
        let Some(net) = day.flow.as_ref().and_then(|f| f.net_amount) else {
            return Verdict::neutral("无资金流向数据");
        };
        let inflow = net > 0.0;

        match day.ma.ma20 {
            Some(ma20) if close < ma20 => {
                if inflow {
                    Verdict::bullish("低位放量净流入")
                } else {
                    Verdict::bearish("低位放量净流出")
                }
            }
            Some(ma20) if close == ma20 => Verdict::neutral("放量"),
            // Above MA20, or no MA20 yet: treated as high position.
            _ => {
                if inflow {
                    Verdict::neutral("高位放量净流入")
                } else {
                    Verdict::neutral("高位放量净流出")
                }
            }
        }
    }
}

/// Volume surge read against MA20 position only, for securities without
/// money flow.
pub struct VolumeMa20 {
    volume_ratio: f64,
    avg_days: usize,
}

impl VolumeMa20 {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            volume_ratio: config.volume_ratio,
            avg_days: config.avg_volume_days,
        }
    }
}

impl Classifier for VolumeMa20 {
    fn signal_type(&self) -> SignalType {
        SignalType::VolumeMa20
    }

    fn classify(&self, window: &Window, idx: usize) -> Verdict {
        let Some(day) = window.day(idx) else {
            return Verdict::no_signal("历史日数不足或缺收盘价");
        };
        let close = day.bar.close;
        let avg = match average_prior_volume(window, idx, self.avg_days) {
            Some(avg) if close.is_finite() => avg,
            _ => return Verdict::no_signal("历史日数不足或缺收盘价"),
        };
        if avg <= 0.0 {
            return Verdict::neutral("均量无效");
        }
        if day.bar.volume < self.volume_ratio * avg {
            return Verdict::neutral("未放量");
        }
        match day.ma.ma20 {
            None => Verdict::neutral("无MA20"),
            Some(ma20) if close < ma20 => Verdict::bullish("低位放量"),
            Some(_) => Verdict::neutral("高位放量"),
        }
    }
}

/// Volume surge or shrink combined with the day's price change.
pub struct VolumeChange {
    volume_ratio: f64,
    avg_days: usize,
}

impl VolumeChange {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            volume_ratio: config.volume_ratio,
            avg_days: config.avg_volume_days,
        }
    }
}

impl Classifier for VolumeChange {
    fn signal_type(&self) -> SignalType {
        SignalType::VolumeChange
    }

    fn classify(&self, window: &Window, idx: usize) -> Verdict {
        let (Some(day), Some(avg)) = (
            window.day(idx),
            average_prior_volume(window, idx, self.avg_days.max(1)),
        ) else {
            return Verdict::no_signal("历史日数不足");
        };
        let prev_close = window.days[idx - 1].bar.close;
        let close = day.bar.close;
        if !close.is_finite() || !prev_close.is_finite() || prev_close == 0.0 {
            return Verdict::no_signal("缺收盘价");
        }
        if avg <= 0.0 {
            return Verdict::neutral("均量无效");
        }

        let surge = day.bar.volume >= self.volume_ratio * avg;
        let up = (close - prev_close) / prev_close > 0.0;
        match (surge, up) {
            (true, true) => Verdict::bullish("放量上涨"),
            (false, false) => Verdict::bearish("缩量下跌"),
            (true, false) => Verdict::neutral("放量下跌"),
            (false, true) => Verdict::neutral("缩量上涨"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::flat_window;
    use super::*;
    use crate::types::{Direction, MoneyFlow};

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    /// Five days at volume 1000, then `today` at the given close and volume.
    fn surge_window(close: f64, volume: f64, ma20: Option<f64>, net: Option<f64>) -> crate::services::window::Window {
        let mut w = flat_window(6, 10.0, 1000.0);
        let today = &mut w.days[5];
        today.bar.close = close;
        today.bar.volume = volume;
        today.ma.ma20 = ma20;
        today.flow = net.map(|n| MoneyFlow::net(today.bar.trade_date, n));
        w
    }

    #[test]
    fn test_flow_ma20_low_position_inflow_is_bullish() {
        let w = surge_window(9.0, 1200.0, Some(10.0), Some(5.0));
        let v = VolumeFlowMa20::from_config(&config()).classify(&w, 5);
        assert_eq!(v.direction(), Some(Direction::Bullish));
        assert_eq!(v.reason, "低位放量净流入");
    }

    #[test]
    fn test_flow_ma20_low_position_outflow_is_bearish() {
        let w = surge_window(9.0, 2000.0, Some(10.0), Some(0.0));
        let v = VolumeFlowMa20::from_config(&config()).classify(&w, 5);
        assert_eq!(v.direction(), Some(Direction::Bearish));
    }

    #[test]
    fn test_flow_ma20_high_or_missing_ma_is_neutral() {
        let classifier = VolumeFlowMa20::from_config(&config());

        let w = surge_window(11.0, 2000.0, Some(10.0), Some(5.0));
        assert_eq!(classifier.classify(&w, 5).reason, "高位放量净流入");

        let w = surge_window(9.0, 2000.0, None, Some(-5.0));
        assert_eq!(classifier.classify(&w, 5).reason, "高位放量净流出");

        let w = surge_window(10.0, 2000.0, Some(10.0), Some(5.0));
        assert_eq!(classifier.classify(&w, 5).reason, "放量");
    }

    #[test]
    fn test_flow_ma20_insufficient_inputs() {
        let classifier = VolumeFlowMa20::from_config(&config());

        let w = surge_window(9.0, 1199.0, Some(10.0), Some(5.0));
        assert_eq!(classifier.classify(&w, 5).reason, "未放量");

        let w = surge_window(9.0, 2000.0, Some(10.0), None);
        let v = classifier.classify(&w, 5);
        assert_eq!(v.direction(), Some(Direction::Neutral));
        assert_eq!(v.reason, "无资金流向数据");

        let w = surge_window(9.0, 2000.0, Some(10.0), Some(5.0));
        assert_eq!(classifier.classify(&w, 4).direction(), Some(Direction::NoSignal));

        let w = surge_window(9.0, 0.0, Some(10.0), Some(5.0));
        assert_eq!(classifier.classify(&w, 5).direction(), Some(Direction::NoSignal));
    }

    #[test]
    fn test_flow_ma20_zero_average_volume() {
        let mut w = surge_window(9.0, 2000.0, Some(10.0), Some(5.0));
        for d in &mut w.days[..5] {
            d.bar.volume = 0.0;
        }
        let v = VolumeFlowMa20::from_config(&config()).classify(&w, 5);
        assert_eq!(v.direction(), Some(Direction::NoSignal));
        assert_eq!(v.reason, "均量无效");
    }

    #[test]
    fn test_volume_ma20_rules() {
        let classifier = VolumeMa20::from_config(&config());

        let w = surge_window(9.0, 1200.0, Some(10.0), None);
        assert_eq!(classifier.classify(&w, 5).direction(), Some(Direction::Bullish));

        let w = surge_window(11.0, 1200.0, Some(10.0), None);
        assert_eq!(classifier.classify(&w, 5).reason, "高位放量");

        let w = surge_window(9.0, 1200.0, None, None);
        assert_eq!(classifier.classify(&w, 5).reason, "无MA20");

        let w = surge_window(9.0, 1000.0, Some(10.0), None);
        assert_eq!(classifier.classify(&w, 5).reason, "未放量");

        assert_eq!(classifier.classify(&w, 2).direction(), Some(Direction::NoSignal));
    }

    #[test]
    fn test_volume_change_quadrants() {
        let classifier = VolumeChange::from_config(&config());

        let w = surge_window(10.5, 1500.0, None, None);
        assert_eq!(classifier.classify(&w, 5).reason, "放量上涨");
        assert_eq!(classifier.classify(&w, 5).direction(), Some(Direction::Bullish));

        let w = surge_window(9.5, 800.0, None, None);
        assert_eq!(classifier.classify(&w, 5).direction(), Some(Direction::Bearish));

        let w = surge_window(9.5, 1500.0, None, None);
        assert_eq!(classifier.classify(&w, 5).reason, "放量下跌");

        let w = surge_window(10.5, 800.0, None, None);
        assert_eq!(classifier.classify(&w, 5).reason, "缩量上涨");
    }

    #[test]
    fn test_volume_change_flat_close_counts_as_not_up() {
        let w = surge_window(10.0, 800.0, None, None);
        let v = VolumeChange::from_config(&config()).classify(&w, 5);
        assert_eq!(v.reason, "缩量下跌");
    }

    #[test]
    fn test_volume_change_needs_history_and_prev_close() {
        let classifier = VolumeChange::from_config(&config());
        let mut w = surge_window(10.5, 1500.0, None, None);
        assert_eq!(classifier.classify(&w, 0).direction(), Some(Direction::NoSignal));
        assert_eq!(classifier.classify(&w, 4).direction(), Some(Direction::NoSignal));

        w.days[4].bar.close = 0.0;
        let v = classifier.classify(&w, 5);
        assert_eq!(v.reason, "缺收盘价");
    }
}
