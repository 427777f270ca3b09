//! Signal read endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::error::{AppError, Result};
use crate::types::{SignalRow, SignalType};
use crate::AppState;

/// Query parameters for a security's signal history.
#[derive(Debug, Default, Deserialize)]
pub struct SignalsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// One of the signal type names, e.g. `ma_cross`.
    pub signal_type: Option<String>,
}

impl SignalsQuery {
    fn signal_type(&self) -> Result<Option<SignalType>> {
        match self.signal_type.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => SignalType::from_str(raw)
                .map(Some)
                .ok_or_else(|| AppError::BadRequest(format!("unknown signal type: {}", raw))),
        }
    }
}

/// A signal row with display labels for its type and value.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalView {
    #[serde(flatten)]
    pub row: SignalRow,
    pub type_label: &'static str,
    pub value_label: &'static str,
}

impl From<SignalRow> for SignalView {
    fn from(row: SignalRow) -> Self {
        Self {
            type_label: row.signal_type.label(),
            value_label: row.value.label(),
            row,
        }
    }
}

fn views(rows: Vec<SignalRow>) -> ApiResponse<Vec<SignalView>> {
    ApiResponse::list(rows.into_iter().map(SignalView::from).collect())
}

/// Create the signals router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/board", get(get_board))
        .route("/:code", get(get_signals))
        .route("/:code/:date", get(get_signals_on))
}

/// Latest signals for every watchlist security.
async fn get_board(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<SignalView>>>> {
    let rows = state.store.latest_board()?;
    Ok(Json(views(rows)))
}

async fn get_signals(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<SignalsQuery>,
) -> Result<Json<ApiResponse<Vec<SignalView>>>> {
    let signal_type = query.signal_type()?;
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(AppError::BadRequest(format!("from {} is after to {}", from, to)));
        }
    }
    let rows = state.store.signals_for(&code, query.from, query.to, signal_type)?;
    Ok(Json(views(rows)))
}

async fn get_signals_on(
    State(state): State<AppState>,
    Path((code, date)): Path<(String, NaiveDate)>,
) -> Result<Json<ApiResponse<Vec<SignalView>>>> {
    let rows = state.store.signals_on(&code, date)?;
    if rows.is_empty() {
        return Err(AppError::NotFound(format!("No signals for {} on {}", code, date)));
    }
    Ok(Json(views(rows)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_type_query_parsing() {
        let query = SignalsQuery {
            signal_type: Some("ma_cross".into()),
            ..Default::default()
        };
        assert_eq!(query.signal_type().unwrap(), Some(SignalType::MaCross));

        let query = SignalsQuery {
            signal_type: Some("macd".into()),
            ..Default::default()
        };
        assert!(matches!(query.signal_type(), Err(AppError::BadRequest(_))));

        assert_eq!(SignalsQuery::default().signal_type().unwrap(), None);
    }

    #[test]
    fn test_signal_view_carries_labels() {
        let row = SignalRow::from_verdict(
            "600000",
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            SignalType::MaCross,
            crate::types::Verdict::bullish("均线金叉"),
            "stock_signals",
        );
        let json = serde_json::to_value(SignalView::from(row)).unwrap();
        assert_eq!(json["signalType"], "ma_cross");
        assert_eq!(json["typeLabel"], "均线金叉死叉");
        assert_eq!(json["valueLabel"], "看涨");
        assert_eq!(json["reason"], "均线金叉");
    }
}
