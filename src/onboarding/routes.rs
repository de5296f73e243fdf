//! REST endpoints for onboarding snapshot status and submission retry.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::model::EntryIntent;
use super::session::OnboardingSession;
use crate::error::SubmissionError;
use crate::store::SnapshotStore;
use crate::submission::SubmissionPipeline;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub snapshots: SnapshotStore,
    pub pipeline: Arc<SubmissionPipeline>,
    /// Passed to every session started through `/begin`.
    pub clear_stale_on_start: bool,
}

#[derive(Debug, Deserialize)]
struct BeginRequest {
    intent: EntryIntent,
}

/// POST /api/onboarding/begin
///
/// Starts a session for the chosen entry. A registration clears stale
/// snapshots when configured to.
async fn begin(
    State(state): State<OnboardingRouteState>,
    Json(req): Json<BeginRequest>,
) -> Response {
    let session = OnboardingSession::new(state.snapshots, state.pipeline)
        .with_clear_stale_on_start(state.clear_stale_on_start);
    match session.begin(req.intent).await {
        Ok(outcome) => Json(json!({
            "session": session.id(),
            "next": outcome.next,
        }))
        .into_response(),
        Err(e) => storage_failure(e.to_string()),
    }
}

/// GET /api/onboarding/status
///
/// Which snapshots exist, and whether a session token is already stored.
async fn get_status(State(state): State<OnboardingRouteState>) -> Response {
    let snapshots = match state.snapshots.status().await {
        Ok(s) => s,
        Err(e) => return storage_failure(e.to_string()),
    };
    let registered = match state.pipeline.stored_token().await {
        Ok(token) => token.is_some(),
        Err(e) => return storage_failure(e.to_string()),
    };
    Json(json!({
        "snapshots": snapshots,
        "pending": !snapshots.is_empty(),
        "registered": registered,
    }))
    .into_response()
}

/// POST /api/onboarding/resubmit
///
/// Re-runs reconcile + submit over the stored snapshots.
async fn resubmit(State(state): State<OnboardingRouteState>) -> Response {
    match state.pipeline.resubmit().await {
        Ok(_) => Json(json!({"registered": true})).into_response(),
        Err(e) => {
            let status = match e {
                SubmissionError::Transport { .. } => StatusCode::SERVICE_UNAVAILABLE,
                SubmissionError::Rejected { .. } | SubmissionError::Invalid(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                SubmissionError::InFlight => StatusCode::CONFLICT,
                SubmissionError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
                SubmissionError::Storage(_) | SubmissionError::SessionNotPersisted { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (
                status,
                Json(json!({
                    "error": e.to_string(),
                    "retryable": e.is_retryable(),
                    "reenter_credentials": e.routes_to_credentials(),
                })),
            )
                .into_response()
        }
    }
}

/// DELETE /api/onboarding/snapshots
async fn reset(State(state): State<OnboardingRouteState>) -> Response {
    match state.snapshots.clear_all().await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => storage_failure(e.to_string()),
    }
}

fn storage_failure(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": message, "retryable": true})),
    )
        .into_response()
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/begin", post(begin))
        .route("/api/onboarding/status", get(get_status))
        .route("/api/onboarding/resubmit", post(resubmit))
        .route("/api/onboarding/snapshots", delete(reset))
        .with_state(state)
}
