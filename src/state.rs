//! Application state: the orchestrator (templates + gateway + generation service) and
//! the client-local store backing access counters and topic history.
//!
//! Built once at startup from env/TOML. If no OpenAI key is configured the gateway is
//! wired to a disabled service, so every generation fails through the normal policy.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::access::AccessGate;
use crate::config::{load_agent_config_from_env, AgentConfig};
use crate::gateway::{Gateway, GenerationService};
use crate::history::TopicHistory;
use crate::logic::Orchestrator;
use crate::openai::{Disabled, OpenAI};
use crate::store::LocalStore;
use crate::templates::Templates;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub store: LocalStore,
}

impl AppState {
    /// Build state from env: load config, init OpenAI (or the disabled stand-in).
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_agent_config_from_env();

        let service: Arc<dyn GenerationService> = match OpenAI::from_env() {
            Some(oa) => {
                info!(target: "learnai_backend", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, "OpenAI enabled.");
                Arc::new(oa)
            }
            None => {
                info!(target: "learnai_backend", "OpenAI disabled (no OPENAI_API_KEY). Generation requests will fail.");
                Arc::new(Disabled)
            }
        };
        info!(
            target: "learnai_backend",
            assistant = %cfg.identity.assistant_name,
            policy = ?cfg.failure_policy,
            "Agent configuration ready"
        );

        Self::with_service(service, cfg)
    }

    pub fn with_service(service: Arc<dyn GenerationService>, cfg: AgentConfig) -> Self {
        let gateway = Gateway::new(service, cfg.failure_policy);
        let templates = Templates::new(cfg.identity);
        Self {
            orchestrator: Orchestrator::new(gateway, templates),
            store: LocalStore::new(),
        }
    }

    pub fn access(&self, client_id: &str) -> AccessGate {
        AccessGate::new(self.store.scope(client_id))
    }

    pub fn history(&self, client_id: &str) -> TopicHistory {
        TopicHistory::new(self.store.scope(client_id))
    }
}
