//! Pattern read endpoint.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::error::{AppError, Result};
use crate::types::{PatternSignalRow, PatternType};
use crate::AppState;

const MAX_LIMIT: usize = 1000;

fn default_limit() -> usize {
    100
}

#[derive(Debug, Deserialize)]
pub struct PatternsQuery {
    /// `cup_handle` or `rising_three`.
    pub pattern_type: Option<String>,
    pub code: Option<String>,
    pub since: Option<NaiveDate>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// A pattern row with the pattern's display label.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternView {
    #[serde(flatten)]
    pub row: PatternSignalRow,
    pub type_label: &'static str,
}

impl From<PatternSignalRow> for PatternView {
    fn from(row: PatternSignalRow) -> Self {
        Self {
            type_label: row.pattern_type.label(),
            row,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_patterns))
}

/// Pattern detections, newest first.
async fn get_patterns(
    State(state): State<AppState>,
    Query(query): Query<PatternsQuery>,
) -> Result<Json<ApiResponse<Vec<PatternView>>>> {
    let pattern_type = match query.pattern_type.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            PatternType::from_str(raw)
                .ok_or_else(|| AppError::BadRequest(format!("unknown pattern type: {}", raw)))?,
        ),
    };
    let rows = state.store.patterns(
        pattern_type,
        query.code.as_deref(),
        query.since,
        query.limit.min(MAX_LIMIT),
    )?;
    Ok(Json(ApiResponse::list(rows.into_iter().map(PatternView::from).collect())))
}
