//! Look-back windows over stored daily data.
//!
//! A window is an arena of [`Day`]s ascending by trade date. Classifiers
//! address days by offset, so "today" and "the N prior days" are plain
//! index arithmetic over the slice.

use chrono::NaiveDate;

use crate::config::MaPolicy;
use crate::error::Result;
use crate::services::indicators::IndicatorCalculator;
use crate::services::sqlite_store::SqliteStore;
use crate::types::{Bar, MoneyFlow, MovingAverages, SignalType, Universe};

/// One trading day with everything a classifier may read.
#[derive(Debug, Clone, PartialEq)]
pub struct Day {
    pub bar: Bar,
    pub ma: MovingAverages,
    pub flow: Option<MoneyFlow>,
}

impl Day {
    pub fn new(bar: Bar) -> Self {
        Self {
            bar,
            ma: MovingAverages::default(),
            flow: None,
        }
    }

    pub fn trade_date(&self) -> NaiveDate {
        self.bar.trade_date
    }
}

/// Ordered slice of days for one security. Only dates present in storage
/// appear; nothing is synthesized for gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
    pub code: String,
    pub days: Vec<Day>,
}

impl Window {
    pub fn new(code: impl Into<String>, days: Vec<Day>) -> Self {
        Self {
            code: code.into(),
            days,
        }
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn day(&self, idx: usize) -> Option<&Day> {
        self.days.get(idx)
    }

    /// The `n` days strictly before `idx`, or `None` if fewer exist.
    pub fn prior(&self, idx: usize, n: usize) -> Option<&[Day]> {
        if idx < n || idx >= self.days.len() {
            return None;
        }
        Some(&self.days[idx - n..idx])
    }

    /// The `n` days ending at `idx` inclusive, or `None` if fewer exist.
    pub fn trailing(&self, idx: usize, n: usize) -> Option<&[Day]> {
        if n == 0 || idx + 1 < n || idx >= self.days.len() {
            return None;
        }
        Some(&self.days[idx + 1 - n..=idx])
    }

    /// First offset of the last `count` days.
    pub fn tail_start(&self, count: usize) -> usize {
        self.days.len().saturating_sub(count)
    }
}

/// Read-only source of windows for one universe of securities.
pub trait WindowStore {
    fn universe(&self) -> Universe;

    /// Securities processed when a request names none.
    fn default_securities(&self) -> Result<Vec<String>>;

    /// Up to `length` bars ending at `as_of` (or the latest stored day),
    /// ascending by date. Empty when nothing is stored.
    fn bars(&self, code: &str, as_of: Option<NaiveDate>, length: usize) -> Result<Vec<Bar>>;

    /// Moving averages aligned with `bars`.
    fn moving_averages(&self, code: &str, bars: &[Bar]) -> Result<Vec<MovingAverages>>;

    /// Money flow aligned with `bars`; `None` where no row exists.
    fn money_flow(&self, code: &str, bars: &[Bar]) -> Result<Vec<Option<MoneyFlow>>>;

    /// Signal set evaluated when a request does not narrow it.
    fn signal_set(&self) -> Vec<SignalType> {
        SignalType::default_set(self.universe())
    }

    /// Load bars, indicators and flow once into an arena.
    fn window(&self, code: &str, as_of: Option<NaiveDate>, length: usize) -> Result<Window> {
        let bars = self.bars(code, as_of, length)?;
        if bars.is_empty() {
            return Ok(Window::new(code, Vec::new()));
        }
        let mas = self.moving_averages(code, &bars)?;
        let flows = self.money_flow(code, &bars)?;

        let days = bars
            .into_iter()
            .enumerate()
            .map(|(i, bar)| Day {
                bar,
                ma: mas.get(i).copied().unwrap_or_default(),
                flow: flows.get(i).cloned().flatten(),
            })
            .collect();
        Ok(Window::new(code, days))
    }
}

fn date_span(bars: &[Bar]) -> Option<(NaiveDate, NaiveDate)> {
    Some((bars.first()?.trade_date, bars.last()?.trade_date))
}

/// Stock windows: bars from `stock_day`, persisted moving averages, money flow.
pub struct StockWindows<'a> {
    store: &'a SqliteStore,
}

impl<'a> StockWindows<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }
}

impl WindowStore for StockWindows<'_> {
    fn universe(&self) -> Universe {
        Universe::Stock
    }

    fn default_securities(&self) -> Result<Vec<String>> {
        self.store.watchlist_codes()
    }

    fn bars(&self, code: &str, as_of: Option<NaiveDate>, length: usize) -> Result<Vec<Bar>> {
        self.store.stock_bars(code, as_of, length)
    }

    fn moving_averages(&self, code: &str, bars: &[Bar]) -> Result<Vec<MovingAverages>> {
        let Some((from, to)) = date_span(bars) else {
            return Ok(Vec::new());
        };
        let stored = self.store.moving_averages(code, from, to)?;
        Ok(bars
            .iter()
            .map(|b| stored.get(&b.trade_date).copied().unwrap_or_default())
            .collect())
    }

    fn money_flow(&self, code: &str, bars: &[Bar]) -> Result<Vec<Option<MoneyFlow>>> {
        let Some((from, to)) = date_span(bars) else {
            return Ok(Vec::new());
        };
        let mut stored = self.store.money_flows(code, from, to)?;
        Ok(bars.iter().map(|b| stored.remove(&b.trade_date)).collect())
    }
}

/// Index windows: bars from `index_day`, moving averages computed from the
/// window's own closes, no money flow.
pub struct IndexWindows<'a> {
    store: &'a SqliteStore,
    codes: Vec<String>,
    calculator: IndicatorCalculator,
}

impl<'a> IndexWindows<'a> {
    pub fn new(store: &'a SqliteStore, codes: Vec<String>, policy: MaPolicy) -> Self {
        Self {
            store,
            codes,
            calculator: IndicatorCalculator::new(policy),
        }
    }
}

impl WindowStore for IndexWindows<'_> {
    fn universe(&self) -> Universe {
        Universe::Index
    }

    fn default_securities(&self) -> Result<Vec<String>> {
        Ok(self.codes.clone())
    }

    fn bars(&self, code: &str, as_of: Option<NaiveDate>, length: usize) -> Result<Vec<Bar>> {
        self.store.index_bars(code, as_of, length)
    }

    fn moving_averages(&self, _code: &str, bars: &[Bar]) -> Result<Vec<MovingAverages>> {
        Ok(self.calculator.compute(bars))
    }

    fn money_flow(&self, _code: &str, bars: &[Bar]) -> Result<Vec<Option<MoneyFlow>>> {
        Ok(vec![None; bars.len()])
    }
}
