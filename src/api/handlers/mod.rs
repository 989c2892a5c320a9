pub mod forward;
pub mod health;
pub mod verify;

use axum::http::{HeaderValue, header};
use axum::response::Response;

use crate::error::AppError;
use crate::services::auth::Forward;

/// Attach the freshly minted session cookie, if any.
fn with_session_cookie(mut resp: Response, forward: &Forward) -> Result<Response, AppError> {
    if let Some(cookie) = &forward.session_cookie {
        let value = HeaderValue::from_str(&cookie.header_value()).map_err(|e| {
            tracing::error!(error = %e, "session cookie is not a valid header value");
            AppError::Internal
        })?;
        resp.headers_mut().append(header::SET_COOKIE, value);
    }
    Ok(resp)
}
