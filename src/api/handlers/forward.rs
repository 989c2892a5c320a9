/*
 * Responsibility
 * - ANY /projects/{project_id}/services/{service_id}[/{*path}]
 * - Gate per-project service traffic; on success hand the request back to the
 *   proxy as an internal redirect (X-Accel-Redirect) to the protected location
 */
use axum::{
    extract::{OriginalUri, Path, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::api::extractors::Credentials;
use crate::error::AppError;
use crate::services::auth::{ProjectBinding, RequestIdentityContext};
use crate::state::AppState;

use super::with_session_cookie;

pub const ACCEL_REDIRECT_HEADER: HeaderName = HeaderName::from_static("x-accel-redirect");

#[derive(Debug, Deserialize)]
pub struct ServicePath {
    project_id: String,
    service_id: String,
}

pub async fn forward(
    State(state): State<AppState>,
    Path(ServicePath {
        project_id,
        service_id,
    }): Path<ServicePath>,
    OriginalUri(original_uri): OriginalUri,
    credentials: Credentials,
) -> Result<Response, AppError> {
    // Project services are guarded by the project's own permission.
    let ctx = RequestIdentityContext {
        api_token: credentials.api_token,
        session_token: credentials.session_token,
        required_permission: project_id.clone(),
        binding: Some(ProjectBinding {
            project_id,
            service_id,
        }),
    };

    let forward = state.gatekeeper.evaluate(&ctx).await?;

    let target = match original_uri.query() {
        Some(query) => format!(
            "{}{}?{}",
            state.internal_redirect_prefix,
            original_uri.path(),
            query
        ),
        None => format!("{}{}", state.internal_redirect_prefix, original_uri.path()),
    };
    let target = HeaderValue::from_str(&target)
        .map_err(|_| AppError::BadRequest("invalid request target".to_string()))?;

    let mut resp = StatusCode::OK.into_response();
    resp.headers_mut().insert(ACCEL_REDIRECT_HEADER, target);

    with_session_cookie(resp, &forward)
}
