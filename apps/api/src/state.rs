use crate::agent_client::AgentClient;
use crate::config::Config;
use crate::orchestration::run::RunController;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// `None` when the agent service is not configured; runs are refused.
    pub agent_client: Option<AgentClient>,
    pub runs: RunController,
}
