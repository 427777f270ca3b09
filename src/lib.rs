//! stex - daily signal engine for A-share equities and indices

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use services::{Ingestor, SqliteStore};

pub use types::*;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
}

impl AppState {
    pub fn new(config: Config, store: SqliteStore) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
        }
    }

    /// Ingestion writer using the configured retry and stock MA policies.
    pub fn ingestor(&self) -> Ingestor<'_> {
        Ingestor::from_config(&self.store, &self.config)
    }

    /// State over an in-memory database with default configuration.
    pub fn in_memory() -> error::Result<Self> {
        Ok(Self::new(Config::default(), SqliteStore::new_in_memory()?))
    }
}

/// Build the HTTP application.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
