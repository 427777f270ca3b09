//! Daily workflow: refresh watchlist moving averages, index signals, then
//! watchlist signals, then the pattern scan.

use serde::Serialize;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::services::engine::SignalEngine;
use crate::services::ingest::Ingestor;
use crate::services::patterns::PatternScanner;
use crate::services::sqlite_store::SqliteStore;
use crate::services::window::{IndexWindows, StockWindows};
use crate::types::{
    DailyTasksSummary, MaRefreshSummary, PatternScanSummary, RunRequest, RunSummary, StepSummary,
};

/// Recompute the persisted moving averages of every watchlist security with
/// the configured stock policy. A failing security is logged and counted.
pub fn refresh_watchlist_averages(store: &SqliteStore, config: &Config) -> Result<MaRefreshSummary> {
    let ingestor = Ingestor::from_config(store, config);
    let mut summary = MaRefreshSummary::default();
    for code in store.watchlist_codes()? {
        summary.securities_processed += 1;
        match ingestor.refresh_moving_averages(&code) {
            Ok(rows) => summary.rows_written += rows,
            Err(e) => {
                warn!("Moving-average refresh failed for {}: {}", code, e);
                summary.securities_failed += 1;
            }
        }
    }
    summary.ok = summary.securities_processed == 0 || summary.securities_failed < summary.securities_processed;
    Ok(summary)
}

pub fn run_index_signals(store: &SqliteStore, config: &Config, request: &RunRequest) -> Result<RunSummary> {
    let windows = IndexWindows::new(store, config.index_codes.clone(), config.engine.index_ma_policy);
    SignalEngine::new(windows, store, config.engine.clone()).run(request)
}

pub fn run_stock_signals(store: &SqliteStore, config: &Config, request: &RunRequest) -> Result<RunSummary> {
    SignalEngine::new(StockWindows::new(store), store, config.engine.clone()).run(request)
}

pub fn run_pattern_scan(store: &SqliteStore, config: &Config, request: &RunRequest) -> Result<PatternScanSummary> {
    PatternScanner::new(store, config.patterns.clone()).scan(request)
}

fn step<T: Serialize>(name: &str, result: Result<T>, ok: impl Fn(&T) -> bool) -> StepSummary {
    match result {
        Ok(summary) => {
            let passed = ok(&summary);
            match serde_json::to_value(&summary) {
                Ok(value) => StepSummary::succeeded(name, passed, value),
                Err(e) => StepSummary::failed(name, e),
            }
        }
        Err(e) => {
            error!("Daily step {} failed: {}", name, e);
            StepSummary::failed(name, e)
        }
    }
}

/// Run every daily step in order. A failing step is recorded and the
/// remaining steps still run. Codes and signal types in `request` are
/// ignored; each step uses its universe's defaults.
pub fn run_daily_tasks(store: &SqliteStore, config: &Config, request: &RunRequest) -> DailyTasksSummary {
    let run_id = Uuid::new_v4();
    let span = info_span!("daily_tasks", %run_id);
    let _guard = span.enter();

    let base = RunRequest {
        codes: None,
        signal_types: None,
        days: request.days,
        as_of: request.as_of,
    };

    let steps = vec![
        step("moving_averages", refresh_watchlist_averages(store, config), |s| s.ok),
        step("index_signals", run_index_signals(store, config, &base), |s| s.ok),
        step("stock_signals", run_stock_signals(store, config, &base), |s| s.ok),
        step("pattern_scan", run_pattern_scan(store, config, &base), |s| s.ok),
    ];
    let ok = steps.iter().all(|s| s.ok);
    info!("Daily tasks done: ok={}", ok);

    DailyTasksSummary { run_id, ok, steps }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bar, WatchlistEntry};
    use chrono::NaiveDate;

    #[test]
    fn test_daily_tasks_runs_every_step() {
        let store = SqliteStore::new_in_memory().unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars: Vec<Bar> = (0..45)
            .map(|i| Bar::new(start + chrono::Duration::days(i), 10.0, 10.5, 9.5, 10.0, 1000.0))
            .collect();
        store.upsert_index_bars("000300.SH", &bars).unwrap();
        store.upsert_stock_bars("600000", &bars).unwrap();
        store
            .add_watchlist(&WatchlistEntry {
                code: "600000".into(),
                name: None,
            })
            .unwrap();

        let config = Config {
            index_codes: vec!["000300.SH".into()],
            ..Config::default()
        };
        let summary = run_daily_tasks(&store, &config, &RunRequest::default().with_days(3));

        assert!(summary.ok);
        let names: Vec<_> = summary.steps.iter().map(|s| s.step.as_str()).collect();
        assert_eq!(
            names,
            vec!["moving_averages", "index_signals", "stock_signals", "pattern_scan"]
        );
        assert_eq!(summary.steps[0].result.as_ref().unwrap()["rowsWritten"], 45 - 4);
        assert_eq!(store.signal_count().unwrap(), 3 * 7 + 3 * 10);
    }
}
