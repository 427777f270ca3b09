use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Universe;

/// Longest reason text stored on a signal or pattern row, in characters.
pub const MAX_REASON_CHARS: usize = 200;

/// Direction of a directional signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
    NoSignal,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Bullish => "bullish",
            Direction::Bearish => "bearish",
            Direction::Neutral => "neutral",
            Direction::NoSignal => "no_signal",
        }
    }

    /// Get display label for this direction.
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Bullish => "看涨",
            Direction::Bearish => "看跌",
            Direction::Neutral => "中性",
            Direction::NoSignal => "无信号",
        }
    }
}

/// Trading activity bucket derived from the turnover rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnoverLevel {
    Quiet,
    Active,
    AbnormallyActive,
}

impl TurnoverLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnoverLevel::Quiet => "quiet",
            TurnoverLevel::Active => "active",
            TurnoverLevel::AbnormallyActive => "abnormally_active",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TurnoverLevel::Quiet => "交投清淡",
            TurnoverLevel::Active => "正常活跃",
            TurnoverLevel::AbnormallyActive => "异常活跃",
        }
    }
}

/// Value stored in the direction column of a signal row.
///
/// Turnover uses its own three-value scale; every other signal uses
/// [`Direction`]. An unusable turnover reading is `Direction(NoSignal)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalValue {
    Direction(Direction),
    Turnover(TurnoverLevel),
}

impl SignalValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalValue::Direction(d) => d.as_str(),
            SignalValue::Turnover(t) => t.as_str(),
        }
    }

    /// Parse a stored value.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bullish" => Some(Self::Direction(Direction::Bullish)),
            "bearish" => Some(Self::Direction(Direction::Bearish)),
            "neutral" => Some(Self::Direction(Direction::Neutral)),
            "no_signal" => Some(Self::Direction(Direction::NoSignal)),
            "quiet" => Some(Self::Turnover(TurnoverLevel::Quiet)),
            "active" => Some(Self::Turnover(TurnoverLevel::Active)),
            "abnormally_active" => Some(Self::Turnover(TurnoverLevel::AbnormallyActive)),
            _ => None,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            SignalValue::Direction(d) => Some(*d),
            SignalValue::Turnover(_) => None,
        }
    }

    /// Display label of the stored value.
    pub fn label(&self) -> &'static str {
        match self {
            SignalValue::Direction(d) => d.label(),
            SignalValue::Turnover(t) => t.label(),
        }
    }
}

impl From<Direction> for SignalValue {
    fn from(d: Direction) -> Self {
        SignalValue::Direction(d)
    }
}

impl From<TurnoverLevel> for SignalValue {
    fn from(t: TurnoverLevel) -> Self {
        SignalValue::Turnover(t)
    }
}

impl Serialize for SignalValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SignalValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SignalValue::from_str(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown signal value: {}", s)))
    }
}

/// The fixed taxonomy of per-day signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// Volume surge read against net money flow and MA20 position.
    VolumeFlowMa20,
    /// Volume surge read against MA20 position only (indices carry no flow).
    VolumeMa20,
    VolumeChange,
    SustainedFlow,
    MaCross,
    MaAlignment,
    MainForce,
    SupportResistance,
    Turnover,
    VolumePriceDivergence,
    VolatilityBreakout,
}

impl SignalType {
    pub const ALL: [SignalType; 11] = [
        SignalType::VolumeFlowMa20,
        SignalType::VolumeMa20,
        SignalType::VolumeChange,
        SignalType::SustainedFlow,
        SignalType::MaCross,
        SignalType::MaAlignment,
        SignalType::MainForce,
        SignalType::SupportResistance,
        SignalType::Turnover,
        SignalType::VolumePriceDivergence,
        SignalType::VolatilityBreakout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::VolumeFlowMa20 => "volume_flow_ma20",
            SignalType::VolumeMa20 => "volume_ma20",
            SignalType::VolumeChange => "volume_change",
            SignalType::SustainedFlow => "sustained_flow",
            SignalType::MaCross => "ma_cross",
            SignalType::MaAlignment => "ma_alignment",
            SignalType::MainForce => "main_force",
            SignalType::SupportResistance => "support_resistance",
            SignalType::Turnover => "turnover",
            SignalType::VolumePriceDivergence => "volume_price_divergence",
            SignalType::VolatilityBreakout => "volatility_breakout",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Get display name.
    pub fn label(&self) -> &'static str {
        match self {
            SignalType::VolumeFlowMa20 => "成交量资金MA20",
            SignalType::VolumeMa20 => "成交量MA20",
            SignalType::VolumeChange => "成交量涨跌幅",
            SignalType::SustainedFlow => "持续资金流向",
            SignalType::MaCross => "均线金叉死叉",
            SignalType::MaAlignment => "均线多空排列",
            SignalType::MainForce => "主力资金",
            SignalType::SupportResistance => "支撑阻力位",
            SignalType::Turnover => "换手率",
            SignalType::VolumePriceDivergence => "量价背离",
            SignalType::VolatilityBreakout => "波动率突破",
        }
    }

    /// Whether the classifier reads money-flow rows.
    pub fn requires_money_flow(&self) -> bool {
        matches!(
            self,
            SignalType::VolumeFlowMa20 | SignalType::SustainedFlow | SignalType::MainForce
        )
    }

    /// Default signal set evaluated for a universe.
    pub fn default_set(universe: Universe) -> Vec<SignalType> {
        match universe {
            Universe::Stock => Self::ALL
                .iter()
                .copied()
                .filter(|t| *t != SignalType::VolumeMa20)
                .collect(),
            Universe::Index => vec![
                SignalType::VolumeMa20,
                SignalType::VolumeChange,
                SignalType::MaCross,
                SignalType::MaAlignment,
                SignalType::SupportResistance,
                SignalType::VolumePriceDivergence,
                SignalType::VolatilityBreakout,
            ],
        }
    }
}

/// Output of one classifier for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub value: SignalValue,
    pub reason: String,
}

impl Verdict {
    pub fn new(value: impl Into<SignalValue>, reason: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn bullish(reason: impl Into<String>) -> Self {
        Self::new(Direction::Bullish, reason)
    }

    pub fn bearish(reason: impl Into<String>) -> Self {
        Self::new(Direction::Bearish, reason)
    }

    pub fn neutral(reason: impl Into<String>) -> Self {
        Self::new(Direction::Neutral, reason)
    }

    pub fn no_signal(reason: impl Into<String>) -> Self {
        Self::new(Direction::NoSignal, reason)
    }

    pub fn direction(&self) -> Option<Direction> {
        self.value.direction()
    }
}

/// A persisted signal. Key: (code, ref_date, signal_type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRow {
    pub code: String,
    pub ref_date: NaiveDate,
    pub signal_type: SignalType,
    pub value: SignalValue,
    pub reason: String,
    pub source: String,
}

impl SignalRow {
    /// Build a row from a verdict, bounding the reason length.
    pub fn from_verdict(
        code: &str,
        ref_date: NaiveDate,
        signal_type: SignalType,
        verdict: Verdict,
        source: &str,
    ) -> Self {
        Self {
            code: code.to_string(),
            ref_date,
            signal_type,
            value: verdict.value,
            reason: truncate_reason(&verdict.reason),
            source: source.to_string(),
        }
    }
}

/// Truncate a reason to [`MAX_REASON_CHARS`] characters on a char boundary.
pub fn truncate_reason(reason: &str) -> String {
    reason.chars().take(MAX_REASON_CHARS).collect()
}
