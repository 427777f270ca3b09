pub mod health;
pub mod market;
pub mod patterns;
pub mod signals;
pub mod trigger;
pub mod watchlist;

use crate::error::{AppError, Result};
use crate::AppState;
use axum::Router;
use serde::Serialize;

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub meta: ApiMeta,
}

#[derive(Debug, Serialize)]
pub struct ApiMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: ApiMeta { count: None },
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn list(data: Vec<T>) -> Self {
        let count = data.len();
        Self {
            data,
            meta: ApiMeta { count: Some(count) },
        }
    }
}

/// Run synchronous store work on the blocking pool.
pub(crate) async fn blocking<T, F>(state: AppState, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&state))
        .await
        .map_err(|e| AppError::Internal(format!("blocking task aborted: {}", e)))?
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/trigger", trigger::router())
        .nest("/api/signals", signals::router())
        .nest("/api/patterns", patterns::router())
        .nest("/api/watchlist", watchlist::router())
        .merge(market::router())
}
