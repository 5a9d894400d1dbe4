use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use socialgate_auth::auth_routes;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    handlers::{
        health::{healthz, livez},
        pages::{dashboard, index, login_page},
    },
    state::AppState,
};

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    let auth = auth_routes().with_state(state.auth.clone());

    Router::new()
        .route("/", get(index))
        .route("/login", get(login_page))
        .route("/dashboard", get(dashboard))
        .route("/livez", get(livez))
        .route("/healthz", get(healthz))
        .with_state(state)
        .merge(auth)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        ))
}
