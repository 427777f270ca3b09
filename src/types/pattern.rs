use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Multi-day chart patterns detected by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Rounded base followed by a shallow pullback closing high.
    CupHandle,
    /// Strong candle, three contained candles, breakout candle.
    RisingThree,
}

impl PatternType {
    pub const ALL: [PatternType; 2] = [PatternType::CupHandle, PatternType::RisingThree];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::CupHandle => "cup_handle",
            PatternType::RisingThree => "rising_three",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "cup_handle" => Some(PatternType::CupHandle),
            "rising_three" => Some(PatternType::RisingThree),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PatternType::CupHandle => "杯柄形态",
            PatternType::RisingThree => "上升三法",
        }
    }
}

/// A persisted pattern detection. Key: (code, pattern_type, ref_date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSignalRow {
    pub code: String,
    pub pattern_type: PatternType,
    /// Day the pattern completed.
    pub ref_date: NaiveDate,
    pub reason: String,
}

/// Per-pattern counts for a scan run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternCounts {
    pub cup_handle: usize,
    pub rising_three: usize,
}

impl PatternCounts {
    pub fn add(&mut self, pattern: PatternType, n: usize) {
        match pattern {
            PatternType::CupHandle => self.cup_handle += n,
            PatternType::RisingThree => self.rising_three += n,
        }
    }

    pub fn total(&self) -> usize {
        self.cup_handle + self.rising_three
    }

    pub fn get(&self, pattern: PatternType) -> usize {
        match pattern {
            PatternType::CupHandle => self.cup_handle,
            PatternType::RisingThree => self.rising_three,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_type_from_str() {
        assert_eq!(PatternType::from_str("cup_handle"), Some(PatternType::CupHandle));
        assert_eq!(PatternType::from_str("rising_three"), Some(PatternType::RisingThree));
        assert_eq!(PatternType::from_str("head_shoulders"), None);
    }

    #[test]
    fn test_pattern_counts_add() {
        let mut counts = PatternCounts::default();
        counts.add(PatternType::RisingThree, 2);
        counts.add(PatternType::RisingThree, 1);
        assert_eq!(counts.get(PatternType::RisingThree), 3);
        assert_eq!(counts.get(PatternType::CupHandle), 0);
    }
}
