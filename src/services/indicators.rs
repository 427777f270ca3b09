//! Moving-average and range calculations over daily bars.

use crate::config::MaPolicy;
use crate::types::{Bar, MovingAverages};

/// Periods of the moving averages maintained for every security.
pub const MA_PERIODS: [usize; 3] = [5, 10, 20];

/// Simple moving averages over closes.
pub struct IndicatorCalculator {
    policy: MaPolicy,
}

impl IndicatorCalculator {
    pub fn new(policy: MaPolicy) -> Self {
        Self { policy }
    }

    /// SMA at `idx`: mean of the `period` most recent closes up to and
    /// including `idx`.
    pub fn sma(&self, closes: &[f64], idx: usize, period: usize) -> Option<f64> {
        if period == 0 || idx >= closes.len() {
            return None;
        }
        let available = idx + 1;
        let take = match self.policy {
            MaPolicy::Strict if available < period => return None,
            MaPolicy::Strict => period,
            MaPolicy::Shrinking => available.min(period),
        };
        let start = available - take;
        let sum: f64 = closes[start..=idx].iter().sum();
        Some(sum / take as f64)
    }

    /// MA5/MA10/MA20 for every bar, aligned with the input.
    pub fn compute(&self, bars: &[Bar]) -> Vec<MovingAverages> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        (0..closes.len())
            .map(|i| {
                MovingAverages::new(
                    self.sma(&closes, i, MA_PERIODS[0]),
                    self.sma(&closes, i, MA_PERIODS[1]),
                    self.sma(&closes, i, MA_PERIODS[2]),
                )
            })
            .collect()
    }
}

/// True range: max(high - low, |high - prev close|, |low - prev close|).
pub fn true_range(current: &Bar, previous: Option<&Bar>) -> f64 {
    let hl = current.high - current.low;
    match previous {
        Some(prev) => {
            let hc = (current.high - prev.close).abs();
            let lc = (current.low - prev.close).abs();
            hl.max(hc).max(lc)
        }
        None => hl,
    }
}

/// Mean of a slice, `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
