//! Process wiring: builds the shared subsystems once from configuration so
//! the CLI and the gateway run the same orchestrator.

use addis_config::AppConfig;
use addis_core::EventBus;
use addis_providers::build_chain_from_config;
use addis_sessions::{SessionStore, spawn_sweeper};
use addis_tools::{InMemoryLedger, TicketLedger, default_registry};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::orchestrator::TurnOrchestrator;
use crate::roster::addis_capability_tree;

/// Everything a running Addis-Sync process shares between turns.
pub struct Runtime {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub events: Arc<EventBus>,
    pub ledger: Arc<InMemoryLedger>,
}

impl Runtime {
    pub fn from_config(config: &AppConfig) -> Self {
        let events = Arc::new(EventBus::default());
        let ledger = Arc::new(InMemoryLedger::new());

        let tree = addis_capability_tree(&config.agent.root_model, &config.agent.specialist_model);
        let registry = default_registry(Arc::clone(&ledger) as Arc<dyn TicketLedger>);
        let chain = build_chain_from_config(config, Some(Arc::clone(&events)));
        let store = SessionStore::new(config.sessions.timeout()).with_events(Arc::clone(&events));

        info!(
            roles = tree.descendants().len() + 1,
            tools = registry.len(),
            candidates = chain.len(),
            "Runtime assembled"
        );

        let orchestrator = TurnOrchestrator::new(
            Arc::new(tree),
            Arc::new(registry),
            Arc::new(chain),
            Arc::new(store),
        )
        .with_agent_config(&config.agent)
        .with_events(Arc::clone(&events));

        Self {
            orchestrator: Arc::new(orchestrator),
            events,
            ledger,
        }
    }

    /// Start the idle-session sweeper on the current tokio runtime.
    pub fn spawn_sweeper(&self, config: &AppConfig) -> JoinHandle<()> {
        spawn_sweeper(
            Arc::clone(self.orchestrator.store()),
            config.sessions.sweep_interval(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_wires_roster_and_registry() {
        let runtime = Runtime::from_config(&AppConfig::default());
        let orch = &runtime.orchestrator;
        assert_eq!(orch.tree().name, crate::roster::ROOT_ROLE);
        assert_eq!(orch.registry().len(), 16);
        assert!(orch.store().is_empty());
    }

    #[tokio::test]
    async fn turn_without_usable_providers_degrades() {
        let mut config = AppConfig::default();
        config.providers.gemini.enabled = false;
        config.providers.openrouter.enabled = false;

        let runtime = Runtime::from_config(&config);
        let reply = runtime.orchestrator.run_turn("s1", "hello").await;
        assert_eq!(reply, crate::PROVIDERS_EXHAUSTED_REPLY);
    }
}
