use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};

use crate::services::auth::cookie::{API_TOKEN_COOKIE, SESSION_TOKEN_COOKIE};
use crate::services::auth::token::non_empty_token;

/// Credentials presented by the client.
///
/// - `api_token`: `Authorization` header, else the `ct_token` cookie
/// - `session_token`: the `ct_session_token` cookie
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_token: Option<String>,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let api_token = non_empty_token(authorization)
            .or_else(|| non_empty_token(cookie_value(headers, API_TOKEN_COOKIE)));
        let session_token = non_empty_token(cookie_value(headers, SESSION_TOKEN_COOKIE));

        Self {
            api_token,
            session_token,
        }
    }
}

impl<S> FromRequestParts<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// First non-empty value of cookie `name` across all `Cookie` headers.
fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim())
        })
        .find(|value| !value.is_empty())
}
