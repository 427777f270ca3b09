//! Batch trigger endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use super::{blocking, ApiResponse};
use crate::error::Result;
use crate::services::engine::SignalEngine;
use crate::services::window::{IndexWindows, StockWindows};
use crate::services::workflow;
use crate::types::{RunRequest, SignalType};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerAction {
    ComputeSignals,
    ComputeIndexSignals,
    DetectPattern,
    DailyTasks,
}

impl TriggerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerAction::ComputeSignals => "compute_signals",
            TriggerAction::ComputeIndexSignals => "compute_index_signals",
            TriggerAction::DetectPattern => "detect_pattern",
            TriggerAction::DailyTasks => "daily_tasks",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub action: TriggerAction,
    #[serde(default)]
    pub codes: Option<Vec<String>>,
    #[serde(default)]
    pub days: Option<usize>,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    #[serde(default)]
    pub signal_types: Option<Vec<SignalType>>,
    /// Return 202 at once and run the batch detached.
    #[serde(default)]
    pub background: bool,
}

impl TriggerRequest {
    fn run_request(&self) -> RunRequest {
        RunRequest {
            codes: self.codes.clone(),
            days: self.days,
            as_of: self.as_of,
            signal_types: self.signal_types.clone(),
        }
    }
}

/// Reject a narrowed signal set before any work starts.
fn validate(state: &AppState, action: TriggerAction, request: &RunRequest) -> Result<()> {
    let requested = request.signal_types.as_deref();
    let engine = &state.config.engine;
    match action {
        TriggerAction::ComputeSignals => {
            SignalEngine::new(StockWindows::new(&state.store), &state.store, engine.clone())
                .signal_set(requested)?;
        }
        TriggerAction::ComputeIndexSignals => {
            let windows = IndexWindows::new(&state.store, state.config.index_codes.clone(), engine.index_ma_policy);
            SignalEngine::new(windows, &state.store, engine.clone()).signal_set(requested)?;
        }
        TriggerAction::DetectPattern | TriggerAction::DailyTasks => {}
    }
    Ok(())
}

fn execute(state: &AppState, action: TriggerAction, request: &RunRequest) -> Result<Value> {
    let store = &state.store;
    let config = &state.config;
    let value = match action {
        TriggerAction::ComputeSignals => serde_json::to_value(workflow::run_stock_signals(store, config, request)?)?,
        TriggerAction::ComputeIndexSignals => {
            serde_json::to_value(workflow::run_index_signals(store, config, request)?)?
        }
        TriggerAction::DetectPattern => serde_json::to_value(workflow::run_pattern_scan(store, config, request)?)?,
        TriggerAction::DailyTasks => serde_json::to_value(workflow::run_daily_tasks(store, config, request))?,
    };
    Ok(value)
}

async fn run_batch(state: AppState, action: TriggerAction, request: RunRequest) -> Result<Value> {
    blocking(state, move |state| execute(state, action, &request)).await
}

/// POST /api/trigger
async fn trigger(
    State(state): State<AppState>,
    Json(body): Json<TriggerRequest>,
) -> Result<axum::response::Response> {
    let action = body.action;
    let request = body.run_request();
    validate(&state, action, &request)?;
    info!("Trigger {} (background={})", action.as_str(), body.background);

    if body.background {
        tokio::spawn(async move {
            match run_batch(state, action, request).await {
                Ok(_) => info!("Background {} finished", action.as_str()),
                Err(e) => error!("Background {} failed: {}", action.as_str(), e),
            }
        });
        let accepted = json!({ "action": action.as_str(), "status": "accepted" });
        return Ok((StatusCode::ACCEPTED, Json(accepted)).into_response());
    }

    let result = run_batch(state, action, request).await?;
    Ok(Json(ApiResponse::new(result)).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(trigger))
}
