/*
 * Responsibility
 * - Read process configuration from the environment (JWT_TOKEN_SECRET, AUTH_SERVICE_URL, ...)
 * - Validate values once at startup (a missing secret fails the process, never a request)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use url::Url;

use crate::services::auth::gatekeeper::SessionFallbackPolicy;

// Upper bound for every TTL setting: 1 year
const MAX_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    // Session tokens are signed with this secret
    pub jwt_token_secret: String,
    pub session_token_ttl_seconds: u64,
    pub session_cookie_secure: bool,
    pub session_permission_policy: SessionFallbackPolicy,

    pub auth_service_url: Url,
    pub auth_verify_timeout_seconds: u64,

    pub internal_redirect_prefix: String,
    pub request_timeout_seconds: u64,

    pub verify_cache_ttl_seconds: u64,
    pub cache_url: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the secret
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("session_token_ttl_seconds", &self.session_token_ttl_seconds)
            .field("session_cookie_secure", &self.session_cookie_secure)
            .field("session_permission_policy", &self.session_permission_policy)
            .field("auth_service_url", &self.auth_service_url.as_str())
            .field("auth_verify_timeout_seconds", &self.auth_verify_timeout_seconds)
            .field("internal_redirect_prefix", &self.internal_redirect_prefix)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("verify_cache_ttl_seconds", &self.verify_cache_ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = var("PORT").and_then(|s| s.parse().ok()).unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = var("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or(AppEnv::Development);

        let jwt_token_secret = var("JWT_TOKEN_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("JWT_TOKEN_SECRET"))?;

        let session_token_ttl_seconds =
            parse_u64(&var, "SESSION_TOKEN_TTL_SECONDS")?.unwrap_or(900); // 15 min
        if session_token_ttl_seconds == 0 || session_token_ttl_seconds > MAX_TTL_SECONDS {
            return Err(ConfigError::Invalid("SESSION_TOKEN_TTL_SECONDS"));
        }

        let session_cookie_secure = match var("SESSION_COOKIE_SECURE") {
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid("SESSION_COOKIE_SECURE"))?,
            None => app_env.is_production(),
        };

        let session_permission_policy = match var("SESSION_PERMISSION_POLICY")
            .unwrap_or_else(|| "fallthrough".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "fallthrough" => SessionFallbackPolicy::Fallthrough,
            "strict" => SessionFallbackPolicy::Strict,
            _ => return Err(ConfigError::Invalid("SESSION_PERMISSION_POLICY")),
        };

        let auth_service_url = var("AUTH_SERVICE_URL")
            .unwrap_or_else(|| "http://localhost:8091".to_string());
        let auth_service_url = Url::parse(&auth_service_url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or(ConfigError::Invalid("AUTH_SERVICE_URL"))?;

        let auth_verify_timeout_seconds =
            parse_u64(&var, "AUTH_VERIFY_TIMEOUT_SECONDS")?.unwrap_or(5);

        let internal_redirect_prefix = var("INTERNAL_REDIRECT_PREFIX")
            .unwrap_or_else(|| "/internal".to_string())
            .trim_end_matches('/')
            .to_string();
        if !internal_redirect_prefix.is_empty() && !internal_redirect_prefix.starts_with('/') {
            return Err(ConfigError::Invalid("INTERNAL_REDIRECT_PREFIX"));
        }

        let request_timeout_seconds = parse_u64(&var, "REQUEST_TIMEOUT_SECONDS")?.unwrap_or(30);

        let verify_cache_ttl_seconds = parse_u64(&var, "VERIFY_CACHE_TTL_SECONDS")?.unwrap_or(0);
        if verify_cache_ttl_seconds > MAX_TTL_SECONDS {
            return Err(ConfigError::Invalid("VERIFY_CACHE_TTL_SECONDS"));
        }

        let cache_url = var("CACHE_URL").filter(|s| !s.trim().is_empty());

        Ok(Self {
            addr,
            app_env,
            jwt_token_secret,
            session_token_ttl_seconds,
            session_cookie_secure,
            session_permission_policy,
            auth_service_url,
            auth_verify_timeout_seconds,
            internal_redirect_prefix,
            request_timeout_seconds,
            verify_cache_ttl_seconds,
            cache_url,
        })
    }
}

fn parse_u64(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    var(key)
        .map(|v| v.trim().parse::<u64>().map_err(|_| ConfigError::Invalid(key)))
        .transpose()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
