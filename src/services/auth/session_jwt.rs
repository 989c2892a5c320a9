use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Errors returned by session-token verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionTokenError {
    #[error("session token signature mismatch")]
    InvalidSignature,
    #[error("session token expired")]
    Expired,
    #[error("session token malformed")]
    Malformed,
    #[error("failed to sign session token")]
    Signing,
}

impl From<jsonwebtoken::errors::Error> for SessionTokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed,
        }
    }
}

/// Session token (JWT) claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default)]
    pub perms: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    /// `admin` grants every permission.
    pub fn grants(&self, permission: &str) -> bool {
        self.perms
            .iter()
            .any(|p| p == permission || p == ADMIN_PERMISSION)
    }
}

pub const ADMIN_PERMISSION: &str = "admin";

/// HS256 codec for the short-lived session tokens handed out as cookies.
///
/// - Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct SessionTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for SessionTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenCodec")
            .field("validation", &self.validation)
            .finish()
    }
}

impl SessionTokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        // Expiry is checked against our own clock in `verify_at`, with zero leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn generate(
        &self,
        subject: &str,
        perms: Vec<String>,
        ttl_seconds: u64,
    ) -> Result<String, SessionTokenError> {
        self.generate_at(subject, perms, ttl_seconds, now_unix())
    }

    /// Sign a token issued at `issued_at` (unix seconds).
    pub fn generate_at(
        &self,
        subject: &str,
        perms: Vec<String>,
        ttl_seconds: u64,
        issued_at: i64,
    ) -> Result<String, SessionTokenError> {
        let ttl = i64::try_from(ttl_seconds).map_err(|_| SessionTokenError::Signing)?;
        let claims = SessionClaims {
            sub: subject.to_string(),
            perms,
            iat: issued_at,
            exp: issued_at.saturating_add(ttl),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign session token");
            SessionTokenError::Signing
        })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionTokenError> {
        self.verify_at(token, now_unix())
    }

    /// Verify signature and shape, then require `now < exp`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<SessionClaims, SessionTokenError> {
        let data =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &self.validation)?;

        if now >= data.claims.exp {
            return Err(SessionTokenError::Expired);
        }

        Ok(data.claims)
    }
}

pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";
    const T0: i64 = 1_700_000_000;

    fn perms(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_generate_then_verify_returns_claims() {
        let codec = SessionTokenCodec::new(SECRET);
        let token = codec.generate("sub-1", perms(&["read", "proj"]), 900).unwrap();

        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.sub, "sub-1");
        assert_eq!(claims.perms, perms(&["read", "proj"]));
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_other_secret_is_invalid_signature() {
        let token = SessionTokenCodec::new(SECRET)
            .generate("sub", perms(&["read"]), 900)
            .unwrap();

        let other = SessionTokenCodec::new(b"another-secret");
        assert_eq!(other.verify(&token), Err(SessionTokenError::InvalidSignature));
    }

    #[test]
    fn test_expiry_window_boundaries() {
        let codec = SessionTokenCodec::new(SECRET);
        let token = codec
            .generate_at("sub", perms(&["read"]), 900, T0)
            .unwrap();

        assert!(codec.verify_at(&token, T0 + 900 - 1).is_ok());
        assert_eq!(
            codec.verify_at(&token, T0 + 900 + 1),
            Err(SessionTokenError::Expired)
        );
        assert_eq!(
            codec.verify_at(&token, T0 + 900),
            Err(SessionTokenError::Expired)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = SessionTokenCodec::new(SECRET);
        assert_eq!(codec.verify("not-a-jwt"), Err(SessionTokenError::Malformed));
        assert_eq!(codec.verify(""), Err(SessionTokenError::Malformed));
        assert_eq!(codec.verify("a.b.c"), Err(SessionTokenError::Malformed));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let codec = SessionTokenCodec::new(SECRET);
        let token = codec.generate("sub", perms(&["read"]), 900).unwrap();
        let forged = SessionTokenCodec::new(b"attacker")
            .generate("sub", perms(&["admin"]), 900)
            .unwrap();

        // Original header + signature around a forged payload.
        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = forged.split('.').nth(1).unwrap();
        let spliced = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(codec.verify(&spliced), Err(SessionTokenError::InvalidSignature));
    }

    #[test]
    fn test_verify_is_idempotent() {
        let codec = SessionTokenCodec::new(SECRET);
        let token = codec.generate("sub", perms(&["read"]), 900).unwrap();

        let first = codec.verify(&token).unwrap();
        let second = codec.verify(&token).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_grants_exact_or_admin() {
        let claims = SessionClaims {
            sub: "s".into(),
            perms: perms(&["read"]),
            iat: T0,
            exp: T0 + 1,
        };
        assert!(claims.grants("read"));
        assert!(!claims.grants("write"));

        let admin = SessionClaims {
            perms: perms(&["admin"]),
            ..claims
        };
        assert!(admin.grants("anything"));
    }
}
