/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 *   - gatekeeper: Arc<Gatekeeper>, internal redirect prefix
 * - Cheap to Clone (Arc inside); nothing in here is mutated after startup
 */
use std::sync::Arc;

use crate::services::auth::Gatekeeper;

#[derive(Clone, Debug)]
pub struct AppState {
    pub gatekeeper: Arc<Gatekeeper>,
    pub internal_redirect_prefix: Arc<str>,
}

impl AppState {
    pub fn new(gatekeeper: Arc<Gatekeeper>, internal_redirect_prefix: &str) -> Self {
        Self {
            gatekeeper,
            internal_redirect_prefix: Arc::from(internal_redirect_prefix),
        }
    }
}
