use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PatternCounts, SignalType, Universe};

/// Parameters of one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRequest {
    /// Explicit securities. `None` means every tracked security of the universe.
    #[serde(default)]
    pub codes: Option<Vec<String>>,
    /// Number of trailing trading days to (re)compute.
    #[serde(default)]
    pub days: Option<usize>,
    /// Last trading day to consider. `None` means the latest stored day.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    /// Narrow the universe's signal set.
    #[serde(default)]
    pub signal_types: Option<Vec<SignalType>>,
}

impl RunRequest {
    pub fn for_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: Some(codes.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn with_days(mut self, days: usize) -> Self {
        self.days = Some(days);
        self
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }
}

/// Outcome for one security in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SecurityStatus {
    Ok { rows: usize },
    Skipped { reason: String },
    Failed { error: String },
}

impl SecurityStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, SecurityStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityReport {
    pub code: String,
    #[serde(flatten)]
    pub status: SecurityStatus,
}

/// Summary returned by every batch run, even when some securities failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub universe: Universe,
    /// False only when securities were attempted and none succeeded.
    pub ok: bool,
    pub securities_processed: usize,
    pub securities_failed: usize,
    pub rows_written: usize,
    pub reports: Vec<SecurityReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RunSummary {
    /// Fold per-security reports into a summary.
    pub fn from_reports(run_id: Uuid, universe: Universe, reports: Vec<SecurityReport>) -> Self {
        let failed = reports.iter().filter(|r| r.status.is_failed()).count();
        let rows_written = reports
            .iter()
            .map(|r| match r.status {
                SecurityStatus::Ok { rows } => rows,
                _ => 0,
            })
            .sum();
        let processed = reports.len();
        let ok = processed == 0 || failed < processed;
        let message = if processed == 0 {
            Some("no securities to process".to_string())
        } else {
            None
        };
        Self {
            run_id,
            universe,
            ok,
            securities_processed: processed,
            securities_failed: failed,
            rows_written,
            reports,
            message,
        }
    }
}

/// Summary of a pattern scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternScanSummary {
    pub run_id: Uuid,
    pub ok: bool,
    pub securities_processed: usize,
    pub securities_failed: usize,
    /// Rows newly inserted by this scan.
    pub inserted: PatternCounts,
    /// Rows with a reference date in the recent window, from any scan.
    pub recent_totals: PatternCounts,
    pub reports: Vec<SecurityReport>,
}

/// Result of one step in the daily workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSummary {
    pub step: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepSummary {
    pub fn succeeded(step: &str, ok: bool, result: serde_json::Value) -> Self {
        Self {
            step: step.to_string(),
            ok,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(step: &str, error: impl ToString) -> Self {
        Self {
            step: step.to_string(),
            ok: false,
            result: None,
            error: Some(error.to_string()),
        }
    }
}

/// Result of refreshing persisted moving averages for the watchlist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaRefreshSummary {
    pub ok: bool,
    pub securities_processed: usize,
    pub securities_failed: usize,
    pub rows_written: usize,
}

/// Outcome of the daily workflow: every step runs even when an earlier one fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTasksSummary {
    pub run_id: Uuid,
    pub ok: bool,
    pub steps: Vec<StepSummary>,
}
