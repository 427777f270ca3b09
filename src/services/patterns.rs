//! Multi-day chart pattern detection over stock bars.

use chrono::{Duration, NaiveDate, Utc};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::PatternConfig;
use crate::error::Result;
use crate::services::sqlite_store::SqliteStore;
use crate::types::{
    Bar, PatternCounts, PatternScanSummary, PatternSignalRow, PatternType, RunRequest, SecurityReport,
    SecurityStatus,
};

/// Cup and handle completing on the last bar of `bars`.
///
/// The cup spans the last `cup_days` bars: its lowest low must sit away from
/// both edges and the right rim must recover most of the left rim. The handle
/// is the last `handle_days` bars: a shallow pullback with the final close in
/// the upper half of the handle range.
pub fn cup_handle(bars: &[Bar], config: &PatternConfig) -> Option<String> {
    let n = config.cup_days;
    let edge = config.cup_edge_days;
    let h = config.handle_days;
    if edge == 0 || h == 0 || n < 2 * edge || h > n || bars.len() < n {
        return None;
    }
    let cup = &bars[bars.len() - n..];

    let (low_idx, cup_low) = cup
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(li, lo), (i, b)| if b.low < lo { (i, b.low) } else { (li, lo) });
    if low_idx < edge || low_idx > n - edge {
        return None;
    }

    let rim = |days: &[Bar]| days.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let left_rim = rim(&cup[..edge]);
    let right_rim = rim(&cup[n - edge..]);
    if right_rim < left_rim * config.cup_recovery_ratio {
        return None;
    }

    let handle = &cup[n - h..];
    let handle_high = rim(handle);
    let handle_low = handle.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    if !(handle_high > 0.0) {
        return None;
    }
    let pullback = (handle_high - handle_low) / handle_high;
    if pullback < config.handle_min_pullback || pullback > config.handle_max_pullback {
        return None;
    }
    let last_close = cup[n - 1].close;
    if last_close < handle_low + (handle_high - handle_low) * 0.5 {
        return None;
    }

    Some(format!(
        "杯底{:.2}，柄回撤{:.1}%，收于柄区间上半部",
        cup_low,
        pullback * 100.0
    ))
}

/// Rising three methods completing on the last bar of `bars`.
pub fn rising_three(bars: &[Bar], config: &PatternConfig) -> Option<String> {
    if bars.len() < 5 {
        return None;
    }
    let d = &bars[bars.len() - 5..];
    let (first, last) = (&d[0], &d[4]);
    if first.open <= 0.0 {
        return None;
    }
    let body = (first.close - first.open) / first.open;
    if !first.is_bullish() || body < config.rising_first_body_pct {
        return None;
    }
    if !last.is_bullish() || last.close <= first.high {
        return None;
    }
    let ceiling = first.high * (1.0 + config.rising_containment_pct);
    let floor = first.low * (1.0 - config.rising_containment_pct);
    if d[1..4].iter().any(|b| b.high > ceiling || b.low < floor) {
        return None;
    }

    Some(format!(
        "首日涨幅{:.2}%，末日收盘{:.2}突破首日高点{:.2}",
        body * 100.0,
        last.close,
        first.high
    ))
}

/// Scans stock bars for patterns and records first detections.
pub struct PatternScanner<'a> {
    store: &'a SqliteStore,
    config: PatternConfig,
}

impl<'a> PatternScanner<'a> {
    pub fn new(store: &'a SqliteStore, config: PatternConfig) -> Self {
        Self { store, config }
    }

    /// Detections whose completion day falls in the scan tail of `bars`.
    pub fn detect(&self, code: &str, bars: &[Bar]) -> Vec<PatternSignalRow> {
        if bars.len() < self.config.min_history {
            return Vec::new();
        }
        let start = bars
            .len()
            .saturating_sub(self.config.scan_days.max(1))
            .max(self.config.min_history.saturating_sub(1));

        let mut rows = Vec::new();
        for end in start..bars.len() {
            let upto = &bars[..=end];
            let ref_date = bars[end].trade_date;
            for pattern in PatternType::ALL {
                let reason = match pattern {
                    PatternType::CupHandle => cup_handle(upto, &self.config),
                    PatternType::RisingThree => rising_three(upto, &self.config),
                };
                if let Some(reason) = reason {
                    rows.push(PatternSignalRow {
                        code: code.to_string(),
                        pattern_type: pattern,
                        ref_date,
                        reason,
                    });
                }
            }
        }
        rows
    }

    /// Detect and record patterns for one security. `None` when it lacks history.
    fn scan_security(&self, code: &str, as_of: Option<NaiveDate>) -> Result<Option<PatternCounts>> {
        let bars = self.store.stock_bars(code, as_of, self.config.window_days)?;
        if bars.len() < self.config.min_history {
            return Ok(None);
        }
        let rows = self.detect(code, &bars);
        let inserted = self.store.insert_patterns(&rows)?;
        debug!("{}: {} detections, {} new", code, rows.len(), inserted.total());
        Ok(Some(inserted))
    }

    /// Scan requested securities (default: every stock with enough history).
    pub fn scan(&self, request: &RunRequest) -> Result<PatternScanSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pattern_scan", %run_id);
        let _guard = span.enter();

        let codes = self
            .store
            .codes_with_history(self.config.min_history, request.codes.as_deref())?;
        info!("Scanning {} securities for patterns", codes.len());

        let mut inserted = PatternCounts::default();
        let mut reports = Vec::with_capacity(codes.len());
        for code in codes {
            let status = match self.scan_security(&code, request.as_of) {
                Ok(Some(counts)) => {
                    for pattern in PatternType::ALL {
                        inserted.add(pattern, counts.get(pattern));
                    }
                    SecurityStatus::Ok { rows: counts.total() }
                }
                Ok(None) => SecurityStatus::Skipped {
                    reason: format!("日线不足{}日", self.config.min_history),
                },
                Err(e) => {
                    warn!("Pattern scan failed for {}: {}", code, e);
                    SecurityStatus::Failed { error: e.to_string() }
                }
            };
            reports.push(SecurityReport { code, status });
        }

        let since = request.as_of.unwrap_or_else(|| Utc::now().date_naive())
            - Duration::days(self.config.recent_report_days);
        let recent_totals = self.store.pattern_totals_since(since)?;

        let processed = reports.len();
        let failed = reports.iter().filter(|r| r.status.is_failed()).count();
        info!(
            "Pattern scan done: {} securities, {} failed, {} new cup_handle, {} new rising_three",
            processed, failed, inserted.cup_handle, inserted.rising_three
        );

        Ok(PatternScanSummary {
            run_id,
            ok: processed == 0 || failed < processed,
            securities_processed: processed,
            securities_failed: failed,
            inserted,
            recent_totals,
            reports,
        })
    }
}
