use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::store::AdvisorStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Persistence collaborator. Default: `PgStore`.
    pub store: Arc<dyn AdvisorStore>,
    pub llm: LlmClient,
    pub config: Config,
}
