//! Ingestion boundary: writes vendor data that has already been mapped to
//! domain types. Writes that hit a busy or locked database are retried a
//! fixed number of times with a fixed backoff.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config::{Config, MaPolicy, RetryConfig};
use crate::error::Result;
use crate::services::indicators::IndicatorCalculator;
use crate::services::sqlite_store::SqliteStore;
use crate::types::{Bar, Fundamentals, IndicatorRow, MoneyFlow, WatchlistEntry};

pub struct Ingestor<'a> {
    store: &'a SqliteStore,
    retry: RetryConfig,
    calculator: IndicatorCalculator,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a SqliteStore, retry: RetryConfig, ma_policy: MaPolicy) -> Self {
        Self {
            store,
            retry,
            calculator: IndicatorCalculator::new(ma_policy),
        }
    }

    /// Ingestor using the configured retry policy and stock MA policy.
    pub fn from_config(store: &'a SqliteStore, config: &Config) -> Self {
        Self::new(store, config.retry.clone(), config.engine.stock_ma_policy)
    }

    fn with_retry<T>(&self, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_busy() && attempt < attempts => {
                    warn!(
                        "{}: database busy (attempt {}/{}), retrying in {:?}",
                        what, attempt, attempts, self.retry.backoff
                    );
                    std::thread::sleep(self.retry.backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Upsert stock bars and refresh the security's persisted moving averages.
    pub fn record_stock_bars(&self, code: &str, bars: &[Bar]) -> Result<usize> {
        let n = self.with_retry("stock bars", || self.store.upsert_stock_bars(code, bars))?;
        self.refresh_moving_averages(code)?;
        info!("Recorded {} stock bars for {}", n, code);
        Ok(n)
    }

    pub fn record_index_bars(&self, code: &str, bars: &[Bar]) -> Result<usize> {
        let n = self.with_retry("index bars", || self.store.upsert_index_bars(code, bars))?;
        info!("Recorded {} index bars for {}", n, code);
        Ok(n)
    }

    /// Attach a turnover rate to an existing bar. Returns whether the bar exists.
    pub fn record_turnover(&self, code: &str, trade_date: NaiveDate, rate: f64) -> Result<bool> {
        let found = self.with_retry("turnover", || self.store.update_turnover(code, trade_date, rate))?;
        if !found {
            debug!("No bar for {} on {}; turnover dropped", code, trade_date);
        }
        Ok(found)
    }

    pub fn record_money_flows(&self, code: &str, flows: &[MoneyFlow]) -> Result<usize> {
        self.with_retry("money flow", || self.store.upsert_money_flows(code, flows))
    }

    pub fn record_fundamentals(&self, code: &str, fundamentals: &Fundamentals) -> Result<()> {
        self.with_retry("fundamentals", || self.store.upsert_fundamentals(code, fundamentals))
    }

    /// Recompute MA5/MA10/MA20 over the full stored history of a stock and
    /// persist them.
    pub fn refresh_moving_averages(&self, code: &str) -> Result<usize> {
        let bars = self.store.stock_bars(code, None, usize::MAX)?;
        let rows: Vec<IndicatorRow> = self
            .calculator
            .compute(&bars)
            .into_iter()
            .zip(&bars)
            .filter(|(ma, _)| !ma.is_empty())
            .map(|(ma, bar)| IndicatorRow {
                trade_date: bar.trade_date,
                ma,
                ..Default::default()
            })
            .collect();
        let n = self.with_retry("technicals", || self.store.upsert_indicators(code, &rows))?;
        debug!("Refreshed {} moving-average rows for {}", n, code);
        Ok(n)
    }

    pub fn track(&self, code: &str, name: Option<&str>) -> Result<()> {
        let entry = WatchlistEntry {
            code: code.trim().to_string(),
            name: name.map(str::to_string),
        };
        self.with_retry("watchlist", || self.store.add_watchlist(&entry))
    }

    pub fn untrack(&self, code: &str) -> Result<bool> {
        self.with_retry("watchlist", || self.store.remove_watchlist(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::cell::Cell;
    use std::time::Duration;

    fn ingestor(store: &SqliteStore) -> Ingestor<'_> {
        Ingestor::new(
            store,
            RetryConfig {
                attempts: 3,
                backoff: Duration::from_millis(1),
            },
            MaPolicy::Strict,
        )
    }

    fn busy() -> AppError {
        AppError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ))
    }

    #[test]
    fn test_retry_recovers_from_busy() {
        let store = SqliteStore::new_in_memory().unwrap();
        let calls = Cell::new(0);
        let result = ingestor(&store).with_retry("test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(busy())
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_retry_gives_up_after_attempts() {
        let store = SqliteStore::new_in_memory().unwrap();
        let calls = Cell::new(0);
        let result: Result<()> = ingestor(&store).with_retry("test", || {
            calls.set(calls.get() + 1);
            Err(busy())
        });
        assert!(result.unwrap_err().is_busy());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let store = SqliteStore::new_in_memory().unwrap();
        let calls = Cell::new(0);
        let result: Result<()> = ingestor(&store).with_retry("test", || {
            calls.set(calls.get() + 1);
            Err(AppError::Internal("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_record_stock_bars_persists_strict_averages() {
        let store = SqliteStore::new_in_memory().unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars: Vec<Bar> = (0..20)
            .map(|i| {
                let c = 1.0 + i as f64;
                Bar::new(start + chrono::Duration::days(i), c, c, c, c, 100.0)
            })
            .collect();
        ingestor(&store).record_stock_bars("600000", &bars).unwrap();

        let end = start + chrono::Duration::days(19);
        let mas = store.moving_averages("600000", start, end).unwrap();
        assert_eq!(mas[&(start + chrono::Duration::days(18))].ma20, None);
        assert_eq!(mas[&end].ma20, Some(10.5));
        assert_eq!(mas[&end].ma5, Some(18.0));
    }

    #[test]
    fn test_configured_shrinking_policy_fills_short_history() {
        let store = SqliteStore::new_in_memory().unwrap();
        let mut config = Config::default();
        config.engine.stock_ma_policy = MaPolicy::Shrinking;
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars: Vec<Bar> = (0..10)
            .map(|i| Bar::new(start + chrono::Duration::days(i), 10.0, 10.0, 10.0, 10.0 + i as f64, 100.0))
            .collect();

        Ingestor::from_config(&store, &config).record_stock_bars("600000", &bars).unwrap();

        let end = start + chrono::Duration::days(9);
        let mas = store.moving_averages("600000", start, end).unwrap();
        assert_eq!(mas[&end].ma20, Some(14.5));
        assert_eq!(mas[&start].ma20, Some(10.0));
    }

    #[test]
    fn test_default_config_keeps_short_history_null() {
        let store = SqliteStore::new_in_memory().unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars: Vec<Bar> = (0..10)
            .map(|i| Bar::new(start + chrono::Duration::days(i), 10.0, 10.0, 10.0, 10.0, 100.0))
            .collect();

        Ingestor::from_config(&store, &Config::default())
            .record_stock_bars("600000", &bars)
            .unwrap();

        let end = start + chrono::Duration::days(9);
        let mas = store.moving_averages("600000", start, end).unwrap();
        assert_eq!(mas[&end].ma20, None);
        assert_eq!(mas[&end].ma10, Some(10.0));
        assert!(!mas.contains_key(&start));
    }

    #[test]
    fn test_turnover_requires_existing_bar() {
        let store = SqliteStore::new_in_memory().unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let ingest = ingestor(&store);
        assert!(!ingest.record_turnover("600000", day, 3.2).unwrap());

        ingest
            .record_stock_bars("600000", &[Bar::new(day, 1.0, 1.0, 1.0, 1.0, 1.0)])
            .unwrap();
        assert!(ingest.record_turnover("600000", day, 3.2).unwrap());
        assert_eq!(store.stock_bars("600000", None, 1).unwrap()[0].turnover_rate, Some(3.2));
    }

    #[test]
    fn test_track_and_untrack() {
        let store = SqliteStore::new_in_memory().unwrap();
        let ingest = ingestor(&store);
        ingest.track(" 600000 ", Some("浦发银行")).unwrap();
        assert_eq!(store.watchlist_codes().unwrap(), vec!["600000".to_string()]);
        assert!(ingest.untrack("600000").unwrap());
        assert!(!ingest.untrack("600000").unwrap());
    }
}
