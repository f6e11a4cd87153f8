use std::sync::Arc;

use crate::config::Config;
use crate::interview::registry::SessionRegistry;
use crate::llm_client::Oracle;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The external text-generation collaborator. Trait object so tests and
    /// alternative backends never touch handler code.
    pub oracle: Arc<dyn Oracle>,
    /// Live interview sessions, keyed by session id.
    pub sessions: SessionRegistry,
    /// Reserved for handlers that need runtime settings (none yet).
    #[allow(dead_code)]
    pub config: Config,
}
