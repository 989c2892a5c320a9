//! Upstream API-token verification.
//!
//! The authorization service answers `POST /auth/tokens/verify?permission=..`
//! with `204 No Content` when the bearer token grants the permission. A
//! successful check mints a session token so that following requests can be
//! decided locally.

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, warn};
use url::Url;

use crate::services::auth::cookie::SessionCookie;
use crate::services::auth::session_jwt::SessionTokenCodec;
use crate::services::auth::token::{token_digest, token_fingerprint};
use crate::services::cache::CacheClient;

const VERIFY_PATH: &str = "auth/tokens/verify";

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("authorization service timed out")]
    Timeout,
    #[error("authorization service request failed: {0}")]
    Transport(reqwest::Error),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e)
        }
    }
}

/// Network seam for the authorization service.
///
/// - `Ok(true)`  => token grants `permission`
/// - `Ok(false)` => authorization service said no
/// - `Err(_)`    => transport failure or timeout (caller denies)
#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    async fn check_permission(
        &self,
        api_token: &str,
        permission: &str,
    ) -> Result<bool, UpstreamError>;
}

/// reqwest-backed client with a bounded request time.
#[derive(Debug, Clone)]
pub struct HttpAuthorizationClient {
    http: reqwest::Client,
    verify_url: Url,
}

impl HttpAuthorizationClient {
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        // Append to the base path instead of `Url::join`, which would drop a
        // last segment without a trailing slash.
        let mut verify_url = base_url.clone();
        let path = format!("{}/{}", base_url.path().trim_end_matches('/'), VERIFY_PATH);
        verify_url.set_path(&path);
        verify_url.set_query(None);

        Ok(Self { http, verify_url })
    }

    pub fn verify_url(&self, permission: &str) -> Url {
        let mut url = self.verify_url.clone();
        url.query_pairs_mut().append_pair("permission", permission);
        url
    }
}

#[async_trait]
impl AuthorizationClient for HttpAuthorizationClient {
    async fn check_permission(
        &self,
        api_token: &str,
        permission: &str,
    ) -> Result<bool, UpstreamError> {
        let resp = self
            .http
            .post(self.verify_url(permission))
            .bearer_auth(api_token)
            .send()
            .await?;

        let status = resp.status();
        debug!(status = %status, permission, "authorization service answered");

        Ok(status == reqwest::StatusCode::NO_CONTENT)
    }
}

/// Caches positive upstream answers for a short time.
#[derive(Clone)]
pub struct VerificationCache {
    cache: Arc<dyn CacheClient>,
    ttl: Duration,
}

impl VerificationCache {
    pub fn new(cache: Arc<dyn CacheClient>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub fn key(api_token: &str, permission: &str) -> String {
        format!("verify:{}:{}", token_digest(api_token), permission)
    }

    async fn contains(&self, key: &str) -> bool {
        match self.cache.get_string(key).await {
            Ok(value) => value.is_some(),
            Err(err) => {
                warn!(error = %err, backend = self.cache.backend_name(), "verification cache read failed");
                false
            }
        }
    }

    async fn remember(&self, key: &str) {
        if let Err(err) = self.cache.set_with_ttl(key, "1", self.ttl).await {
            warn!(error = %err, backend = self.cache.backend_name(), "verification cache write failed");
        }
    }
}

/// Verifies API tokens upstream and mints session cookies on success.
#[derive(Clone)]
pub struct UpstreamTokenVerifier {
    client: Arc<dyn AuthorizationClient>,
    codec: Arc<SessionTokenCodec>,
    cache: Option<VerificationCache>,
    session_ttl_seconds: u64,
    cookie_secure: bool,
}

impl std::fmt::Debug for UpstreamTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamTokenVerifier")
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("cookie_secure", &self.cookie_secure)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl UpstreamTokenVerifier {
    pub fn new(
        client: Arc<dyn AuthorizationClient>,
        codec: Arc<SessionTokenCodec>,
        session_ttl_seconds: u64,
        cookie_secure: bool,
    ) -> Self {
        Self {
            client,
            codec,
            cache: None,
            session_ttl_seconds,
            cookie_secure,
        }
    }

    pub fn with_cache(mut self, cache: VerificationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Check `api_token` for `permission`.
    ///
    /// Returns the session cookie to attach to the response, or `None` when
    /// access is denied (non-204, transport error, timeout).
    pub async fn verify_access(&self, api_token: &str, permission: &str) -> Option<SessionCookie> {
        let fingerprint = token_fingerprint(api_token);
        let cache_key = VerificationCache::key(api_token, permission);

        let cached = match &self.cache {
            Some(cache) => cache.contains(&cache_key).await,
            None => false,
        };

        if cached {
            debug!(token = %fingerprint, permission, "api token verification served from cache");
        } else {
            match self.client.check_permission(api_token, permission).await {
                Ok(true) => {
                    if let Some(cache) = &self.cache {
                        cache.remember(&cache_key).await;
                    }
                }
                Ok(false) => {
                    debug!(token = %fingerprint, permission, "api token rejected upstream");
                    return None;
                }
                Err(err) => {
                    warn!(token = %fingerprint, permission, error = %err, "api token verification failed");
                    return None;
                }
            }
        }

        let token = match self.codec.generate(
            &fingerprint,
            vec![permission.to_string()],
            self.session_ttl_seconds,
        ) {
            Ok(token) => token,
            Err(err) => {
                error!(token = %fingerprint, permission, error = %err, "failed to mint session token");
                return None;
            }
        };

        Some(SessionCookie {
            token,
            max_age_seconds: self.session_ttl_seconds,
            secure: self.cookie_secure,
        })
    }
}
