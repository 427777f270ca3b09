//! Batch signal computation.
//!
//! For each security the engine loads one window, evaluates every classifier
//! of the signal set against each day of the recompute tail, and writes the
//! resulting rows in a single transaction. A failing security is logged and
//! reported; the batch carries on.

use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use crate::services::signals::{classifiers_for, Classifier};
use crate::services::sqlite_store::SqliteStore;
use crate::services::window::{Window, WindowStore};
use crate::types::{
    RunRequest, RunSummary, SecurityReport, SecurityStatus, SignalRow, SignalType, Universe,
};

/// Signal engine, generic over the window source.
pub struct SignalEngine<'a, W: WindowStore> {
    windows: W,
    store: &'a SqliteStore,
    config: EngineConfig,
}

impl<'a, W: WindowStore> SignalEngine<'a, W> {
    pub fn new(windows: W, store: &'a SqliteStore, config: EngineConfig) -> Self {
        Self {
            windows,
            store,
            config,
        }
    }

    pub fn universe(&self) -> Universe {
        self.windows.universe()
    }

    /// Resolve the signal set for a request. A narrowed set must be a subset
    /// of the universe's set.
    pub fn signal_set(&self, requested: Option<&[SignalType]>) -> Result<Vec<SignalType>> {
        let allowed = self.windows.signal_set();
        let Some(requested) = requested.filter(|r| !r.is_empty()) else {
            return Ok(allowed);
        };

        let mut set = Vec::with_capacity(requested.len());
        for t in requested {
            if !allowed.contains(t) {
                let why = if t.requires_money_flow() && self.universe() == Universe::Index {
                    "indices carry no money flow"
                } else {
                    "not part of this universe's signal set"
                };
                return Err(AppError::BadRequest(format!("{}: {}", t.as_str(), why)));
            }
            if !set.contains(t) {
                set.push(*t);
            }
        }
        Ok(set)
    }

    /// Classify the last `days` days of a window.
    pub fn evaluate(&self, window: &Window, classifiers: &[Box<dyn Classifier>], days: usize) -> Vec<SignalRow> {
        let source = self.universe().source_tag();
        let start = window.tail_start(days);
        let mut rows = Vec::with_capacity((window.len() - start) * classifiers.len());
        for idx in start..window.len() {
            let ref_date = window.days[idx].trade_date();
            for classifier in classifiers {
                let verdict = classifier.classify(window, idx);
                rows.push(SignalRow::from_verdict(
                    &window.code,
                    ref_date,
                    classifier.signal_type(),
                    verdict,
                    source,
                ));
            }
        }
        rows
    }

    fn process(
        &self,
        code: &str,
        request: &RunRequest,
        classifiers: &[Box<dyn Classifier>],
        days: usize,
    ) -> Result<SecurityStatus> {
        let window = self.windows.window(code, request.as_of, self.config.window_days)?;
        if window.is_empty() {
            debug!("{}: no bars stored", code);
            return Ok(SecurityStatus::Skipped {
                reason: "无日线数据".to_string(),
            });
        }
        if self.universe() == Universe::Index && window.len() < self.config.index_min_days {
            warn!("{}: only {} bars, need {}", code, window.len(), self.config.index_min_days);
            return Ok(SecurityStatus::Skipped {
                reason: format!("日线不足{}日", self.config.index_min_days),
            });
        }

        let rows = self.evaluate(&window, classifiers, days);
        let written = self.store.write_signals(&rows)?;
        debug!("{}: wrote {} signal rows", code, written);
        Ok(SecurityStatus::Ok { rows: written })
    }

    fn securities(&self, request: &RunRequest) -> Result<Vec<String>> {
        let requested: Vec<String> = request
            .codes
            .iter()
            .flatten()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if requested.is_empty() {
            self.windows.default_securities()
        } else {
            Ok(requested)
        }
    }

    /// Run one batch. Per-security failures are reported in the summary.
    pub fn run(&self, request: &RunRequest) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let universe = self.universe();
        let span = info_span!("signal_run", %run_id, ?universe);
        let _guard = span.enter();

        let types = self.signal_set(request.signal_types.as_deref())?;
        let classifiers = classifiers_for(&types, &self.config);
        let days = request.days.unwrap_or(self.config.days_to_compute);
        let codes = self.securities(request)?;
        info!(
            "Computing {} signal types over {} days for {} securities",
            types.len(),
            days,
            codes.len()
        );

        let mut reports = Vec::with_capacity(codes.len());
        for code in codes {
            let status = match self.process(&code, request, &classifiers, days) {
                Ok(status) => status,
                Err(e) => {
                    warn!("Signal computation failed for {}: {}", code, e);
                    SecurityStatus::Failed { error: e.to_string() }
                }
            };
            reports.push(SecurityReport { code, status });
        }

        let summary = RunSummary::from_reports(run_id, universe, reports);
        info!(
            "Signal run done: {} securities, {} failed, {} rows",
            summary.securities_processed, summary.securities_failed, summary.rows_written
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaPolicy;
    use crate::services::window::{IndexWindows, StockWindows};
    use crate::types::{Bar, WatchlistEntry};
    use chrono::NaiveDate;

    fn bars(n: usize) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let c = 10.0 + (i % 7) as f64 * 0.1;
                Bar::new(start + chrono::Duration::days(i as i64), c, c + 0.2, c - 0.2, c, 1000.0)
            })
            .collect()
    }

    #[test]
    fn test_money_flow_signals_rejected_for_indices() {
        let store = SqliteStore::new_in_memory().unwrap();
        let engine = SignalEngine::new(
            IndexWindows::new(&store, vec![], MaPolicy::Shrinking),
            &store,
            EngineConfig::default(),
        );
        let err = engine.signal_set(Some(&[SignalType::MainForce][..])).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(
            engine
                .signal_set(Some(&[SignalType::MaCross, SignalType::MaCross][..]))
                .unwrap(),
            vec![SignalType::MaCross]
        );
    }

    #[test]
    fn test_stock_run_defaults_to_watchlist() {
        let store = SqliteStore::new_in_memory().unwrap();
        store
            .add_watchlist(&WatchlistEntry {
                code: "600000".into(),
                name: None,
            })
            .unwrap();
        store.upsert_stock_bars("600000", &bars(40)).unwrap();

        let engine = SignalEngine::new(StockWindows::new(&store), &store, EngineConfig::default());
        let summary = engine.run(&RunRequest::default()).unwrap();

        assert!(summary.ok);
        assert_eq!(summary.securities_processed, 1);
        assert_eq!(summary.rows_written, 30 * 10);
        assert_eq!(store.signal_count().unwrap(), 300);
    }

    #[test]
    fn test_short_index_is_skipped() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.upsert_index_bars("000001.SH", &bars(24)).unwrap();
        store.upsert_index_bars("399001.SZ", &bars(25)).unwrap();

        let engine = SignalEngine::new(
            IndexWindows::new(&store, vec!["000001.SH".into(), "399001.SZ".into()], MaPolicy::Shrinking),
            &store,
            EngineConfig::default(),
        );
        let summary = engine.run(&RunRequest::default().with_days(5)).unwrap();

        assert!(matches!(summary.reports[0].status, SecurityStatus::Skipped { .. }));
        assert_eq!(summary.reports[1].status, SecurityStatus::Ok { rows: 5 * 7 });
        assert!(summary.ok);
    }

    #[test]
    fn test_unknown_security_is_skipped_not_failed() {
        let store = SqliteStore::new_in_memory().unwrap();
        let engine = SignalEngine::new(StockWindows::new(&store), &store, EngineConfig::default());
        let summary = engine.run(&RunRequest::for_codes(["999999"])).unwrap();
        assert!(summary.ok);
        assert_eq!(summary.securities_failed, 0);
        assert_eq!(summary.rows_written, 0);
    }
}
