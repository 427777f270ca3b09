//! Per-day signal classifiers.
//!
//! Every classifier is a pure function of a loaded [`Window`] and the offset
//! of the day being evaluated. Missing or short history never errors; it
//! yields a no-signal or neutral verdict with a reason.

pub mod activity;
pub mod levels;
pub mod money_flow;
pub mod moving_average;
pub mod volume;

pub use activity::{Turnover, VolumePriceDivergence};
pub use levels::{SupportResistance, VolatilityBreakout};
pub use money_flow::{MainForce, SustainedFlow};
pub use moving_average::{MaAlignment, MaCross};
pub use volume::{VolumeChange, VolumeFlowMa20, VolumeMa20};

use crate::config::EngineConfig;
use crate::services::window::Window;
use crate::types::{SignalType, Verdict};

/// Trait for implementing per-day signal rules.
pub trait Classifier: Send + Sync {
    /// Signal type this classifier writes.
    fn signal_type(&self) -> SignalType;

    /// Classify the day at `idx` of `window`.
    fn classify(&self, window: &Window, idx: usize) -> Verdict;
}

/// Build the classifier for one signal type.
pub fn classifier_for(signal_type: SignalType, config: &EngineConfig) -> Box<dyn Classifier> {
    match signal_type {
        SignalType::VolumeFlowMa20 => Box::new(VolumeFlowMa20::from_config(config)),
        SignalType::VolumeMa20 => Box::new(VolumeMa20::from_config(config)),
        SignalType::VolumeChange => Box::new(VolumeChange::from_config(config)),
        SignalType::SustainedFlow => Box::new(SustainedFlow::from_config(config)),
        SignalType::MaCross => Box::new(MaCross),
        SignalType::MaAlignment => Box::new(MaAlignment),
        SignalType::MainForce => Box::new(MainForce),
        SignalType::SupportResistance => Box::new(SupportResistance::from_config(config)),
        SignalType::Turnover => Box::new(Turnover::from_config(config)),
        SignalType::VolumePriceDivergence => Box::new(VolumePriceDivergence::from_config(config)),
        SignalType::VolatilityBreakout => Box::new(VolatilityBreakout::from_config(config)),
    }
}

/// Build classifiers for a signal set, preserving order.
pub fn classifiers_for(types: &[SignalType], config: &EngineConfig) -> Vec<Box<dyn Classifier>> {
    types.iter().map(|t| classifier_for(*t, config)).collect()
}

/// Mean volume of the `n` days before `idx`, `None` without enough history.
pub(crate) fn average_prior_volume(window: &Window, idx: usize, n: usize) -> Option<f64> {
    if n == 0 {
        return None;
    }
    let prior = window.prior(idx, n)?;
    Some(prior.iter().map(|d| d.bar.volume).sum::<f64>() / n as f64)
}


#[cfg(test)]
mod tests {
    use super::testing::flat_window;
    use super::*;
    use crate::types::Universe;

    #[test]
    fn test_classifier_for_every_type() {
        let config = EngineConfig::default();
        for t in SignalType::ALL {
            assert_eq!(classifier_for(t, &config).signal_type(), t);
        }
    }

    #[test]
    fn test_classifiers_preserve_order() {
        let config = EngineConfig::default();
        let set = SignalType::default_set(Universe::Index);
        let classifiers = classifiers_for(&set, &config);
        let types: Vec<_> = classifiers.iter().map(|c| c.signal_type()).collect();
        assert_eq!(types, set);
    }

    #[test]
    fn test_no_classifier_panics_on_first_day() {
        let config = EngineConfig::default();
        let window = flat_window(1, 10.0, 100.0);
        for t in SignalType::ALL {
            let verdict = classifier_for(t, &config).classify(&window, 0);
            assert!(!verdict.reason.is_empty());
        }
    }

    #[test]
    fn test_no_classifier_panics_out_of_range() {
        let config = EngineConfig::default();
        let window = flat_window(3, 10.0, 100.0);
        for t in SignalType::ALL {
            classifier_for(t, &config).classify(&window, 7);
        }
    }

    #[test]
    fn test_average_prior_volume() {
        let mut window = flat_window(6, 10.0, 100.0);
        window.days[0].bar.volume = 600.0;
        assert_eq!(average_prior_volume(&window, 5, 5), Some(200.0));
        assert_eq!(average_prior_volume(&window, 4, 5), None);
        assert_eq!(average_prior_volume(&window, 5, 0), None);
    }
}
