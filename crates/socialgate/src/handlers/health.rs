//! Health check endpoints for Kubernetes-style probes.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use socialgate_core::auth::generate_session_id;

use crate::state::AppState;

/// GET /livez - Basic liveness probe.
///
/// Returns 200 immediately. Used to check if the server is accepting
/// connections.
pub async fn livez() -> StatusCode {
    StatusCode::OK
}

/// GET /healthz - Readiness probe.
///
/// Verifies the session store answers a lookup. A probe id is generated per
/// request, so the lookup always misses; only the store's availability is
/// checked.
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let probe = generate_session_id();
    match state.auth.sessions.get_session(&probe).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "time": Utc::now().to_rfc3339(),
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unavailable",
                "error": e.to_string(),
            })),
        ),
    }
}
