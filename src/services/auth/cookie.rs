/// Cookie carrying the long-lived API token (alternate to `Authorization`).
pub const API_TOKEN_COOKIE: &str = "ct_token";
/// Cookie carrying the short-lived session token.
pub const SESSION_TOKEN_COOKIE: &str = "ct_session_token";

/// Session cookie minted after a successful upstream verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub token: String,
    pub max_age_seconds: u64,
    pub secure: bool,
}

impl SessionCookie {
    /// `Set-Cookie` value: HttpOnly, site-wide, bounded by the token lifetime.
    pub fn header_value(&self) -> String {
        let mut value = format!(
            "{}={}; HttpOnly; Path=/; Max-Age={}",
            SESSION_TOKEN_COOKIE, self.token, self.max_age_seconds
        );
        if self.secure {
            value.push_str("; Secure");
        }
        value
    }
}
