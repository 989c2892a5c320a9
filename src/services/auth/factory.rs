/// Factory: build the `Gatekeeper` and its collaborators from application `Config`.
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::AppError;
use crate::services::auth::Gatekeeper;
use crate::services::auth::session_jwt::SessionTokenCodec;
use crate::services::auth::upstream::{
    HttpAuthorizationClient, UpstreamTokenVerifier, VerificationCache,
};
use crate::services::cache::{CacheClient, MemoryCache, ValkeyClient};

pub async fn build_gatekeeper(config: &Config) -> Result<Arc<Gatekeeper>, AppError> {
    let codec = Arc::new(SessionTokenCodec::new(config.jwt_token_secret.as_bytes()));

    let client = HttpAuthorizationClient::new(
        &config.auth_service_url,
        Duration::from_secs(config.auth_verify_timeout_seconds),
    )
    .map_err(|e| {
        tracing::error!(error = %e, "failed to build authorization service client");
        AppError::Internal
    })?;

    let mut upstream = UpstreamTokenVerifier::new(
        Arc::new(client),
        codec.clone(),
        config.session_token_ttl_seconds,
        config.session_cookie_secure,
    );

    if config.verify_cache_ttl_seconds > 0 {
        let cache = build_cache(config.cache_url.as_deref()).await?;
        tracing::info!(
            backend = cache.backend_name(),
            ttl_seconds = config.verify_cache_ttl_seconds,
            "upstream verification cache enabled"
        );
        upstream = upstream.with_cache(VerificationCache::new(
            cache,
            Duration::from_secs(config.verify_cache_ttl_seconds),
        ));
    }

    Ok(Arc::new(Gatekeeper::new(
        codec,
        upstream,
        config.session_permission_policy,
    )))
}

async fn build_cache(cache_url: Option<&str>) -> Result<Arc<dyn CacheClient>, AppError> {
    match cache_url {
        Some(url) => {
            let client = ValkeyClient::new(url).await.map_err(|e| {
                tracing::error!(error = %e, "failed to connect verification cache");
                AppError::Internal
            })?;
            Ok(Arc::new(client))
        }
        None => Ok(Arc::new(MemoryCache::new())),
    }
}
