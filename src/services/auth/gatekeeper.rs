//! Per-request access decision.
//!
//! Order of checks:
//! 1. project/service binding (401 on mismatch, before any token work)
//! 2. at least one credential present (403 otherwise)
//! 3. session token: local signature/expiry/permission check (fast path)
//! 4. API token: upstream verification, mints a new session cookie (slow path)
//!
//! Every branch is an explicit return value; the HTTP adapters translate it.

use std::sync::Arc;
use tracing::debug;

use crate::services::auth::binding::is_service_in_project;
use crate::services::auth::cookie::SessionCookie;
use crate::services::auth::session_jwt::{SessionTokenCodec, SessionTokenError};
use crate::services::auth::upstream::UpstreamTokenVerifier;

/// Credentials and route variables of a single proxied request.
#[derive(Debug, Clone, Default)]
pub struct RequestIdentityContext {
    pub api_token: Option<String>,
    pub session_token: Option<String>,
    pub required_permission: String,
    /// Project/service pair to bind; `None` when the route carries neither.
    pub binding: Option<ProjectBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectBinding {
    pub project_id: String,
    pub service_id: String,
}

/// Request may reach the protected upstream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Forward {
    /// Freshly minted session cookie to attach to the response.
    pub session_cookie: Option<SessionCookie>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("Requested service is not in specified project!")]
    BindingMismatch,
    #[error("No auth cookie set")]
    NoCredentials,
    #[error("JWT token not valid.")]
    SessionTokenInvalid,
    #[error("JWT token does not contain correct permissions.")]
    InsufficientPermission,
    #[error("API Token not valid")]
    UpstreamRejected,
}

impl RejectReason {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BindingMismatch => 401,
            _ => 403,
        }
    }
}

/// What to do when a valid session token lacks the required permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionFallbackPolicy {
    /// Fall through to the API token, if one was presented.
    #[default]
    Fallthrough,
    /// Reject immediately.
    Strict,
}

#[derive(Debug, Clone)]
pub struct Gatekeeper {
    codec: Arc<SessionTokenCodec>,
    upstream: UpstreamTokenVerifier,
    policy: SessionFallbackPolicy,
}

impl Gatekeeper {
    pub fn new(
        codec: Arc<SessionTokenCodec>,
        upstream: UpstreamTokenVerifier,
        policy: SessionFallbackPolicy,
    ) -> Self {
        Self {
            codec,
            upstream,
            policy,
        }
    }

    pub async fn evaluate(&self, ctx: &RequestIdentityContext) -> Result<Forward, RejectReason> {
        if let Some(binding) = &ctx.binding {
            if !is_service_in_project(&binding.service_id, &binding.project_id) {
                debug!(
                    project_id = %binding.project_id,
                    service_id = %binding.service_id,
                    "service is not bound to project"
                );
                return Err(RejectReason::BindingMismatch);
            }
        }

        let api_token = ctx.api_token.as_deref().filter(|t| !t.is_empty());
        let session_token = ctx.session_token.as_deref().filter(|t| !t.is_empty());

        if api_token.is_none() && session_token.is_none() {
            return Err(RejectReason::NoCredentials);
        }

        let mut session_failure = None;
        if let Some(session_token) = session_token {
            match self.check_session(session_token, &ctx.required_permission) {
                Ok(()) => return Ok(Forward::default()),
                Err(RejectReason::InsufficientPermission)
                    if self.policy == SessionFallbackPolicy::Strict =>
                {
                    return Err(RejectReason::InsufficientPermission);
                }
                Err(reason) => session_failure = Some(reason),
            }
        }

        match api_token {
            Some(api_token) => self
                .upstream
                .verify_access(api_token, &ctx.required_permission)
                .await
                .map(|cookie| Forward {
                    session_cookie: Some(cookie),
                })
                .ok_or(RejectReason::UpstreamRejected),
            None => Err(session_failure.unwrap_or(RejectReason::SessionTokenInvalid)),
        }
    }

    fn check_session(&self, token: &str, permission: &str) -> Result<(), RejectReason> {
        let claims = self.codec.verify(token).map_err(|err| {
            match err {
                SessionTokenError::Expired => debug!("session token expired"),
                other => debug!(error = %other, "session token rejected"),
            }
            RejectReason::SessionTokenInvalid
        })?;

        if claims.grants(permission) {
            Ok(())
        } else {
            debug!(permission, perms = ?claims.perms, "session token lacks permission");
            Err(RejectReason::InsufficientPermission)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::upstream::tests::MockAuthorizationClient;
    use crate::services::auth::upstream::{AuthorizationClient, UpstreamError};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    const SECRET: &[u8] = b"gatekeeper-secret";

    struct Fixture {
        gatekeeper: Gatekeeper,
        codec: Arc<SessionTokenCodec>,
        upstream: Arc<MockAuthorizationClient>,
    }

    fn fixture_with(policy: SessionFallbackPolicy) -> Fixture {
        let codec = Arc::new(SessionTokenCodec::new(SECRET));
        let upstream = Arc::new(MockAuthorizationClient::granting("api-token", "read"));
        let verifier = UpstreamTokenVerifier::new(upstream.clone(), codec.clone(), 900, false);

        Fixture {
            gatekeeper: Gatekeeper::new(codec.clone(), verifier, policy),
            codec,
            upstream,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(SessionFallbackPolicy::Fallthrough)
    }

    fn session(codec: &SessionTokenCodec, perms: &[&str]) -> String {
        codec
            .generate("sub", perms.iter().map(|p| p.to_string()).collect(), 900)
            .unwrap()
    }

    fn ctx(api: Option<&str>, session: Option<&str>, permission: &str) -> RequestIdentityContext {
        RequestIdentityContext {
            api_token: api.map(str::to_string),
            session_token: session.map(str::to_string),
            required_permission: permission.to_string(),
            binding: None,
        }
    }

    #[tokio::test]
    async fn test_no_credentials() {
        let f = fixture();
        let result = f.gatekeeper.evaluate(&ctx(None, None, "read")).await;
        assert_eq!(result, Err(RejectReason::NoCredentials));

        let blank = f.gatekeeper.evaluate(&ctx(Some(""), Some(""), "read")).await;
        assert_eq!(blank, Err(RejectReason::NoCredentials));
    }

    #[tokio::test]
    async fn test_session_fast_path_skips_upstream() {
        let f = fixture();
        let token = session(&f.codec, &["read"]);

        let result = f
            .gatekeeper
            .evaluate(&ctx(Some("api-token"), Some(&token), "read"))
            .await;
        assert_eq!(result, Ok(Forward::default()));
        assert_eq!(f.upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_admin_session_grants_anything() {
        let f = fixture();
        let token = session(&f.codec, &["admin"]);

        let result = f.gatekeeper.evaluate(&ctx(None, Some(&token), "anything")).await;
        assert_eq!(result, Ok(Forward::default()));
    }

    #[tokio::test]
    async fn test_api_token_mints_cookie() {
        let f = fixture();
        let forward = f
            .gatekeeper
            .evaluate(&ctx(Some("api-token"), None, "read"))
            .await
            .unwrap();

        let cookie = forward.session_cookie.unwrap();
        assert_eq!(cookie.max_age_seconds, 900);
        assert!(cookie.header_value().contains("Max-Age=900"));
        assert!(f.codec.verify(&cookie.token).unwrap().grants("read"));
        assert_eq!(f.upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_api_token_rejected_upstream() {
        let f = fixture();
        let result = f.gatekeeper.evaluate(&ctx(Some("stolen"), None, "read")).await;
        assert_eq!(result, Err(RejectReason::UpstreamRejected));
    }

    #[tokio::test]
    async fn test_invalid_session_falls_back_to_api_token() {
        let f = fixture();
        let foreign = session(&SessionTokenCodec::new(b"other"), &["read"]);

        let result = f
            .gatekeeper
            .evaluate(&ctx(Some("api-token"), Some(&foreign), "read"))
            .await;
        assert!(result.unwrap().session_cookie.is_some());
        assert_eq!(f.upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_session_failure_reason_without_api_token() {
        let f = fixture();

        let result = f.gatekeeper.evaluate(&ctx(None, Some("garbage"), "read")).await;
        assert_eq!(result, Err(RejectReason::SessionTokenInvalid));

        let token = session(&f.codec, &["write"]);
        let result = f.gatekeeper.evaluate(&ctx(None, Some(&token), "read")).await;
        assert_eq!(result, Err(RejectReason::InsufficientPermission));
        assert_eq!(f.upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_permission_falls_through_by_default() {
        let f = fixture();
        let token = session(&f.codec, &["write"]);

        let result = f
            .gatekeeper
            .evaluate(&ctx(Some("api-token"), Some(&token), "read"))
            .await;
        assert!(result.is_ok());
        assert_eq!(f.upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_strict_policy_hard_fails_on_insufficient_permission() {
        let f = fixture_with(SessionFallbackPolicy::Strict);
        let token = session(&f.codec, &["write"]);

        let result = f
            .gatekeeper
            .evaluate(&ctx(Some("api-token"), Some(&token), "read"))
            .await;
        assert_eq!(result, Err(RejectReason::InsufficientPermission));
        assert_eq!(f.upstream.calls(), 0);

        // Invalid tokens still fall through under the strict policy.
        let result = f
            .gatekeeper
            .evaluate(&ctx(Some("api-token"), Some("garbage"), "read"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_binding_checked_before_credentials() {
        let f = fixture();
        let token = session(&f.codec, &["admin"]);
        let mut request = ctx(None, Some(&token), "proj123");
        request.binding = Some(ProjectBinding {
            project_id: "other".into(),
            service_id: "lab-p-proj123-s-jupyter".into(),
        });

        let result = f.gatekeeper.evaluate(&request).await;
        assert_eq!(result, Err(RejectReason::BindingMismatch));
        assert_eq!(RejectReason::BindingMismatch.status_code(), 401);

        request.api_token = None;
        request.session_token = None;
        let result = f.gatekeeper.evaluate(&request).await;
        assert_eq!(result, Err(RejectReason::BindingMismatch));
    }

    #[tokio::test]
    async fn test_bound_service_is_forwarded() {
        let f = fixture();
        let token = session(&f.codec, &["proj123"]);
        let mut request = ctx(None, Some(&token), "proj123");
        request.binding = Some(ProjectBinding {
            project_id: "proj123".into(),
            service_id: "-p-proj123-s-abc".into(),
        });

        assert!(f.gatekeeper.evaluate(&request).await.is_ok());
    }

    /// Holds every upstream check until `release` is notified.
    struct HeldAuthorizationClient {
        release: Notify,
    }

    #[async_trait]
    impl AuthorizationClient for HeldAuthorizationClient {
        async fn check_permission(&self, _: &str, _: &str) -> Result<bool, UpstreamError> {
            self.release.notified().await;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_pending_upstream_does_not_block_session_requests() {
        let codec = Arc::new(SessionTokenCodec::new(SECRET));
        let client = Arc::new(HeldAuthorizationClient {
            release: Notify::new(),
        });
        let verifier = UpstreamTokenVerifier::new(client.clone(), codec.clone(), 900, false);
        let gatekeeper = Gatekeeper::new(codec.clone(), verifier, SessionFallbackPolicy::Fallthrough);
        let token = session(&codec, &["read"]);

        let slow_ctx = ctx(Some("api-token"), None, "read");
        let fast_ctx = ctx(None, Some(&token), "read");

        let slow = gatekeeper.evaluate(&slow_ctx);
        let fast = async {
            // Completes while the upstream check is still held.
            let result = gatekeeper.evaluate(&fast_ctx).await;
            client.release.notify_one();
            result
        };

        let (slow, fast) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(slow, fast)
        })
        .await
        .unwrap();

        assert_eq!(fast, Ok(Forward::default()));
        assert!(slow.unwrap().session_cookie.is_some());
    }
}
