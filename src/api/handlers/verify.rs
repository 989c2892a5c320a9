//! `auth_request` endpoint for the reverse proxy.
//!
//! The proxy issues a subrequest here before serving a protected location and
//! forwards the original request only on a 2xx answer. Route variables are
//! passed as proxy-set headers. A freshly minted session cookie only reaches
//! the client when the protected location copies it from the subrequest:
//!
//! ```text
//! location = /_gate {
//!     internal;
//!     proxy_pass              http://gatekeeper/auth/verify;
//!     proxy_set_header        X-Auth-Permission $project_id;
//!     proxy_set_header        X-Auth-Project-Id $project_id;
//!     proxy_set_header        X-Auth-Service-Id $service_id;
//! }
//!
//! location ~ ^/projects/(?<project_id>[^/]+)/services/(?<service_id>[^/]+) {
//!     auth_request            /_gate;
//!     auth_request_set        $gate_cookie $upstream_http_set_cookie;
//!     add_header              Set-Cookie $gate_cookie;
//!     proxy_pass              http://$service_id;
//! }
//! ```

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};

use crate::api::extractors::Credentials;
use crate::error::AppError;
use crate::services::auth::{ProjectBinding, RejectReason, RequestIdentityContext};
use crate::state::AppState;

use super::with_session_cookie;

pub const PERMISSION_HEADER: HeaderName = HeaderName::from_static("x-auth-permission");
pub const PROJECT_ID_HEADER: HeaderName = HeaderName::from_static("x-auth-project-id");
pub const SERVICE_ID_HEADER: HeaderName = HeaderName::from_static("x-auth-service-id");

pub async fn verify(
    State(state): State<AppState>,
    credentials: Credentials,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let required_permission = header_value(&headers, &PERMISSION_HEADER)
        .ok_or_else(|| AppError::BadRequest("missing X-Auth-Permission header".to_string()))?;

    let binding = match (
        header_value(&headers, &PROJECT_ID_HEADER),
        header_value(&headers, &SERVICE_ID_HEADER),
    ) {
        (Some(project_id), Some(service_id)) => Some(ProjectBinding {
            project_id,
            service_id,
        }),
        (None, None) => None,
        _ => return Err(RejectReason::BindingMismatch.into()),
    };

    let ctx = RequestIdentityContext {
        api_token: credentials.api_token,
        session_token: credentials.session_token,
        required_permission,
        binding,
    };

    let forward = state.gatekeeper.evaluate(&ctx).await?;

    with_session_cookie(StatusCode::NO_CONTENT.into_response(), &forward)
}

fn header_value(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
