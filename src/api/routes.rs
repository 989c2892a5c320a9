/*
 * Responsibility
 * - URL layout of the gatekeeper
 * - /health, /auth/verify (auth_request), /projects/{id}/services/{id}/{*path} (internal redirect)
 */
use axum::{
    Router,
    routing::{any, get},
};

use crate::api::handlers::{forward::forward, health::health, verify::verify};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/auth/verify", get(verify))
        .route(
            "/projects/{project_id}/services/{service_id}",
            any(forward),
        )
        .route(
            "/projects/{project_id}/services/{service_id}/{*path}",
            any(forward),
        )
}
