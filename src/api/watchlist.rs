//! Watchlist endpoints. The watchlist is the default security list of the
//! stock pipeline.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;

use super::{blocking, ApiResponse};
use crate::error::{AppError, Result};
use crate::types::WatchlistEntry;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(track))
        .route("/:code", delete(untrack))
}

async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<WatchlistEntry>>>> {
    Ok(Json(ApiResponse::list(state.store.watchlist()?)))
}

async fn track(
    State(state): State<AppState>,
    Json(body): Json<TrackRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WatchlistEntry>>)> {
    let code = body.code.trim().to_string();
    if code.is_empty() {
        return Err(AppError::BadRequest("code is required".to_string()));
    }
    let entry = WatchlistEntry {
        code,
        name: body.name,
    };
    let tracked = entry.clone();
    blocking(state, move |state| state.ingestor().track(&tracked.code, tracked.name.as_deref())).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(entry))))
}

async fn untrack(State(state): State<AppState>, Path(code): Path<String>) -> Result<StatusCode> {
    let lookup = code.clone();
    let removed = blocking(state, move |state| state.ingestor().untrack(&lookup)).await?;
    if !removed {
        return Err(AppError::NotFound(format!("{} is not on the watchlist", code)));
    }
    Ok(StatusCode::NO_CONTENT)
}
