use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day for one security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    pub trade_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Traded volume. A null volume in storage reads as zero.
    pub volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Turnover rate in percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnover_rate: Option<f64>,
}

impl Bar {
    /// Create a bar without amount or turnover.
    pub fn new(trade_date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            trade_date,
            open,
            high,
            low,
            close,
            volume,
            amount: None,
            turnover_rate: None,
        }
    }

    pub fn with_turnover(mut self, turnover_rate: f64) -> Self {
        self.turnover_rate = Some(turnover_rate);
        self
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Moving averages for one (security, date). Null until enough history exists
/// under the strict policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
}

impl MovingAverages {
    pub fn new(ma5: Option<f64>, ma10: Option<f64>, ma20: Option<f64>) -> Self {
        Self { ma5, ma10, ma20 }
    }

    pub fn is_empty(&self) -> bool {
        self.ma5.is_none() && self.ma10.is_none() && self.ma20.is_none()
    }
}

/// Persisted indicator row. Only the moving averages are populated by this
/// system; the oscillator slots are reserved for other producers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorRow {
    pub trade_date: NaiveDate,
    pub ma: MovingAverages,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub rsi: Option<f64>,
    pub kdj_k: Option<f64>,
    pub kdj_d: Option<f64>,
    pub kdj_j: Option<f64>,
}

/// Buy and sell amounts/volumes for one order-size bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowBucket {
    pub buy_amount: Option<f64>,
    pub sell_amount: Option<f64>,
    pub buy_vol: Option<f64>,
    pub sell_vol: Option<f64>,
}

impl FlowBucket {
    /// Net amount (buy minus sell), if both sides are known.
    pub fn net_amount(&self) -> Option<f64> {
        Some(self.buy_amount? - self.sell_amount?)
    }
}

/// Daily money flow for one (security, date).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyFlow {
    pub trade_date: NaiveDate,
    /// Net signed flow amount.
    pub net_amount: Option<f64>,
    pub net_vol: Option<f64>,
    #[serde(default)]
    pub small: FlowBucket,
    #[serde(default)]
    pub medium: FlowBucket,
    #[serde(default)]
    pub large: FlowBucket,
    /// Extra-large orders, used as the main-force proxy.
    #[serde(default)]
    pub extra_large: FlowBucket,
}

impl MoneyFlow {
    /// A flow row carrying only the net amount.
    pub fn net(trade_date: NaiveDate, net_amount: f64) -> Self {
        Self {
            trade_date,
            net_amount: Some(net_amount),
            ..Default::default()
        }
    }

    /// Main-force net amount: extra-large buy minus extra-large sell.
    pub fn main_force_net(&self) -> Option<f64> {
        self.extra_large.net_amount()
    }
}

/// Valuation snapshot written by ingestion. Not read by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fundamentals {
    pub report_date: NaiveDate,
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub ps: Option<f64>,
    pub market_cap: Option<f64>,
}

/// Which family of securities a pipeline operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Universe {
    Stock,
    Index,
}

impl Universe {
    /// Source tag recorded on every signal row written for this universe.
    pub fn source_tag(&self) -> &'static str {
        match self {
            Universe::Stock => "stock_signals",
            Universe::Index => "index_signals",
        }
    }
}

/// Default tracked market indices with display names.
pub const DEFAULT_INDICES: [(&str, &str); 5] = [
    ("000001.SH", "上证指数"),
    ("399001.SZ", "深证成指"),
    ("399006.SZ", "创业板指"),
    ("000300.SH", "沪深300"),
    ("000905.SH", "中证500"),
];

/// Display name for a known index code.
pub fn index_name(code: &str) -> Option<&'static str> {
    DEFAULT_INDICES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// A tracked security on the watchlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub code: String,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_main_force_net_requires_both_sides() {
        let mut flow = MoneyFlow::net(day(), 10.0);
        assert_eq!(flow.main_force_net(), None);

        flow.extra_large.buy_amount = Some(500.0);
        assert_eq!(flow.main_force_net(), None);

        flow.extra_large.sell_amount = Some(800.0);
        assert_eq!(flow.main_force_net(), Some(-300.0));
    }

    #[test]
    fn test_index_name_lookup() {
        assert_eq!(index_name("000300.SH"), Some("沪深300"));
        assert_eq!(index_name("600000"), None);
    }

    #[test]
    fn test_universe_serialization() {
        assert_eq!(serde_json::to_string(&Universe::Index).unwrap(), "\"index\"");
        assert_eq!(Universe::Stock.source_tag(), "stock_signals");
    }
}
