//! Credential normalisation shared by header and cookie transports.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

const BEARER_SCHEME: &str = "Bearer";

/// Strip transport framing from a raw header/cookie value.
///
/// Returns an empty string for absent or blank input; callers treat that as
/// "no credential".
pub fn normalize_token(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    let trimmed = raw.trim();
    // The scheme counts only as a whole word: `Bearer x` or a bare `Bearer`.
    let bare = match trimmed.split_at_checked(BEARER_SCHEME.len()) {
        Some((scheme, rest))
            if scheme.eq_ignore_ascii_case(BEARER_SCHEME)
                && rest.chars().next().is_none_or(char::is_whitespace) =>
        {
            rest
        }
        _ => trimmed,
    };

    bare.trim().to_string()
}

/// `None` when the normalised value is empty.
pub fn non_empty_token(raw: Option<&str>) -> Option<String> {
    let token = normalize_token(raw);
    (!token.is_empty()).then_some(token)
}

/// sha256(token) -> URL-safe base64 without padding.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

// Short, log-safe handle for a credential.
pub fn token_fingerprint(token: &str) -> String {
    token_digest(token).chars().take(12).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_bearer_prefix() {
        assert_eq!(normalize_token(Some("Bearer abc123")), "abc123");
        assert_eq!(normalize_token(Some("  Bearer   abc123  ")), "abc123");
        assert_eq!(normalize_token(Some("bearer abc123")), "abc123");
    }

    #[test]
    fn test_bearer_lookalike_values_are_kept() {
        assert_eq!(normalize_token(Some("bearer-abc")), "bearer-abc");
        assert_eq!(normalize_token(Some("BearerXYZ")), "BearerXYZ");
        assert_eq!(normalize_token(Some("Bearer\tabc")), "abc");
    }

    #[test]
    fn test_plain_value_is_trimmed() {
        assert_eq!(normalize_token(Some(" abc123 ")), "abc123");
    }

    #[test]
    fn test_absent_or_blank_is_empty() {
        assert_eq!(normalize_token(None), "");
        assert_eq!(normalize_token(Some("")), "");
        assert_eq!(normalize_token(Some("   ")), "");
        assert_eq!(normalize_token(Some("Bearer")), "");
        assert_eq!(normalize_token(Some("Bearer   ")), "");
    }

    #[test]
    fn test_non_empty_token() {
        assert_eq!(non_empty_token(Some("Bearer x")), Some("x".to_string()));
        assert_eq!(non_empty_token(Some("Bearer ")), None);
        assert_eq!(non_empty_token(None), None);
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let a = token_fingerprint("secret-token");
        assert_eq!(a, token_fingerprint("secret-token"));
        assert_eq!(a.len(), 12);
        assert_ne!(a, token_fingerprint("other-token"));
        assert!(!a.contains("secret"));
    }
}
