//! Chain construction: turns the `[providers]` config into an ordered
//! `FallbackChain`.
//!
//! Gemini candidates come first, led by the root role's model, then one
//! OpenRouter candidate per model.

use addis_config::{AppConfig, ProviderConfig};
use addis_core::{EventBus, ProviderAdapter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::fallback::FallbackChain;
use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the fallback chain from configuration.
pub fn build_chain_from_config(config: &AppConfig, events: Option<Arc<EventBus>>) -> FallbackChain {
    let mut chain =
        FallbackChain::new().with_transient_retries(config.agent.transient_retries);
    if let Some(events) = events {
        chain = chain.with_events(events);
    }

    let temperature = config.agent.temperature;

    let gemini = &config.providers.gemini;
    if gemini.enabled {
        let timeout = candidate_timeout(config, gemini);
        for model in &config.gemini_models() {
            let adapter: Arc<dyn ProviderAdapter> = Arc::new(
                GeminiProvider::new(gemini.api_key.clone(), model)
                    .with_base_url(&gemini.base_url)
                    .with_temperature(temperature),
            );
            chain = chain.add(adapter, timeout);
        }
    }

    let openrouter = &config.providers.openrouter;
    if openrouter.is_usable() {
        let timeout = candidate_timeout(config, openrouter);
        for model in &openrouter.models {
            let adapter: Arc<dyn ProviderAdapter> = Arc::new(
                OpenAiCompatProvider::new(
                    "openrouter",
                    &openrouter.base_url,
                    openrouter.api_key.clone(),
                    model,
                )
                .with_temperature(temperature),
            );
            chain = chain.add(adapter, timeout);
        }
    }

    if chain.is_empty() {
        warn!("No provider candidates configured; every turn will degrade");
    } else {
        info!(candidates = chain.len(), "Provider fallback chain ready");
    }

    chain
}

fn candidate_timeout(config: &AppConfig, provider: &ProviderConfig) -> Duration {
    provider
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.agent.provider_timeout())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_orders_gemini_first() {
        let config = AppConfig::default();
        let chain = build_chain_from_config(&config, None);
        let status = chain.status();

        assert_eq!(status.len(), 3);
        assert_eq!(status[0].provider, "gemini");
        assert_eq!(status[0].model, "gemini-2.5-flash-lite");
        assert_eq!(status[1].provider, "openrouter");
        assert_eq!(status[2].provider, "openrouter");
        assert!(status.iter().all(|s| s.timeout == Duration::from_secs(60)));
    }

    #[test]
    fn disabled_backend_contributes_nothing() {
        let mut config = AppConfig::default();
        config.providers.gemini.enabled = false;
        config.providers.openrouter.models = vec!["only/one:free".into()];
        config.providers.openrouter.timeout_secs = Some(7);

        let status = build_chain_from_config(&config, None).status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].model, "only/one:free");
        assert_eq!(status[0].timeout, Duration::from_secs(7));
    }

    #[test]
    fn root_model_is_primary_candidate() {
        let mut config = AppConfig::default();
        config.agent.root_model = "gemini-2.5-pro".into();
        config.providers.gemini.models = vec!["gemini-2.5-flash".into()];
        config.providers.openrouter.enabled = false;

        let status = build_chain_from_config(&config, None).status();
        let models: Vec<_> = status.iter().map(|s| s.model.as_str()).collect();
        assert_eq!(models, vec!["gemini-2.5-pro", "gemini-2.5-flash"]);
        assert!(status.iter().all(|s| s.provider == "gemini"));
    }

    #[test]
    fn empty_model_lists_give_empty_chain() {
        let mut config = AppConfig::default();
        config.providers.gemini.enabled = false;
        config.providers.openrouter.models.clear();
        assert!(build_chain_from_config(&config, None).is_empty());
    }
}
