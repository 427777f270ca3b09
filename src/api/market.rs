//! Market data ingestion endpoints and the index catalogue.
//!
//! Payloads are vendor rows already mapped to domain types. Writes go through
//! the retrying ingestor; stock bars also refresh persisted moving averages.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::{blocking, ApiResponse};
use crate::error::Result;
use crate::types::{index_name, Bar, MoneyFlow};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct IndexInfo {
    pub code: String,
    pub name: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct Ingested {
    pub code: String,
    pub rows: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/indices", get(list_indices))
        .route("/api/indices/:code/bars", post(ingest_index_bars))
        .route("/api/stocks/:code/bars", post(ingest_stock_bars))
        .route("/api/stocks/:code/moneyflow", post(ingest_money_flow))
}

/// Configured indices with their display names.
async fn list_indices(State(state): State<AppState>) -> Json<ApiResponse<Vec<IndexInfo>>> {
    let indices = state
        .config
        .index_codes
        .iter()
        .map(|code| IndexInfo {
            code: code.clone(),
            name: index_name(code),
        })
        .collect();
    Json(ApiResponse::list(indices))
}

async fn ingest_stock_bars(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(bars): Json<Vec<Bar>>,
) -> Result<Json<ApiResponse<Ingested>>> {
    let target = code.clone();
    let rows = blocking(state, move |state| state.ingestor().record_stock_bars(&target, &bars)).await?;
    Ok(Json(ApiResponse::new(Ingested { code, rows })))
}

async fn ingest_index_bars(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(bars): Json<Vec<Bar>>,
) -> Result<Json<ApiResponse<Ingested>>> {
    let target = code.clone();
    let rows = blocking(state, move |state| state.ingestor().record_index_bars(&target, &bars)).await?;
    Ok(Json(ApiResponse::new(Ingested { code, rows })))
}

async fn ingest_money_flow(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(flows): Json<Vec<MoneyFlow>>,
) -> Result<Json<ApiResponse<Ingested>>> {
    let target = code.clone();
    let rows = blocking(state, move |state| state.ingestor().record_money_flows(&target, &flows)).await?;
    Ok(Json(ApiResponse::new(Ingested { code, rows })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_index_catalogue_carries_display_names() {
        let Json(response) = list_indices(State(AppState::in_memory().unwrap())).await;
        assert_eq!(response.data.len(), 5);
        let csi300 = response.data.iter().find(|i| i.code == "000300.SH").unwrap();
        assert_eq!(csi300.name, Some("沪深300"));
    }
}
