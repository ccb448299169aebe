//! HTTP API over the portfolio manager

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use screener::{LifecycleError, LifecycleState, PortfolioManager, ScanProgress, ScreenError, QUORUM};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::APP_VERSION;

type ApiResponse = (StatusCode, Json<Value>);

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<PortfolioManager>,
    pub progress: Arc<ScanProgress>,
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api_health))
        .route("/status", get(api_status))
        .route("/selection", get(api_status).post(api_request_selection).delete(api_delete_selection))
        .route("/selection/progress", get(api_progress))
        .route("/tiers", get(api_tiers))
        .with_state(state)
}

/// HTTP status for a lifecycle failure
fn error_status(err: &LifecycleError) -> StatusCode {
    match err {
        LifecycleError::Locked { .. } => StatusCode::LOCKED,
        LifecycleError::CorruptState { .. } => StatusCode::CONFLICT,
        LifecycleError::NothingToDelete => StatusCode::NOT_FOUND,
        LifecycleError::Screen(ScreenError::EmptyUniverseResult) => StatusCode::UNPROCESSABLE_ENTITY,
        LifecycleError::Screen(_) => StatusCode::BAD_REQUEST,
        LifecycleError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &LifecycleError) -> ApiResponse {
    let status = error_status(err);
    if status.is_server_error() {
        error!(error = %err, "Request failed");
    }

    let mut body = json!({
        "success": false,
        "message": err.to_string(),
    });
    if let LifecycleError::Locked {
        days_remaining,
        unlock_date,
    } = err
    {
        body["days_remaining"] = json!(days_remaining);
        body["unlock_date"] = json!(unlock_date);
    }
    (status, Json(body))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health
async fn api_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "bist-lock",
        "version": APP_VERSION,
    }))
}

/// GET /api/status: lock state and, while locked, live valuation
async fn api_status(State(state): State<AppState>) -> ApiResponse {
    match state.manager.view_status().await {
        Ok(status) => (StatusCode::OK, Json(json!(status))),
        Err(e) => error_response(&e),
    }
}

/// POST /api/selection: start a new scan in the background
async fn api_request_selection(State(state): State<AppState>) -> ApiResponse {
    // Reject up front so the caller gets 423/409 instead of a failed scan
    match state.manager.current_state().await {
        Ok(LifecycleState::Locked { lock, .. }) => {
            return error_response(&LifecycleError::Locked {
                days_remaining: lock.days_remaining,
                unlock_date: lock.unlock_date,
            })
        }
        Ok(LifecycleState::Corrupt { reason }) => {
            return error_response(&LifecycleError::CorruptState { reason })
        }
        Ok(_) => {}
        Err(e) => return error_response(&e),
    }

    if !state.progress.try_start() {
        let snapshot = state.progress.snapshot();
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "success": false,
                "message": "A scan is already running",
                "progress": snapshot,
            })),
        );
    }

    info!(tickers = state.manager.universe().len(), "Starting selection scan");

    let manager = state.manager.clone();
    let progress = state.progress.clone();
    tokio::spawn(async move {
        match manager.request_new_selection().await {
            Ok(selection) => info!(
                filter = %selection.filter_used,
                stocks = selection.stocks.len(),
                "Selection scan finished"
            ),
            Err(e) => {
                warn!(error = %e, "Selection scan failed");
                progress.fail(e.to_string());
            }
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "message": "Selection scan started",
        })),
    )
}

/// GET /api/selection/progress
async fn api_progress(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.progress.snapshot()))
}

/// DELETE /api/selection
async fn api_delete_selection(State(state): State<AppState>) -> ApiResponse {
    if state.progress.is_running() {
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "success": false,
                "message": "A scan is running",
            })),
        );
    }

    match state.manager.delete_selection().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Selection deleted",
            })),
        ),
        Err(e) => error_response(&e),
    }
}

/// GET /api/tiers: the filter ladder and scan parameters
async fn api_tiers(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "quorum": QUORUM,
        "tiers": state.manager.tiers(),
        "universe": state.manager.universe(),
    }))
}
