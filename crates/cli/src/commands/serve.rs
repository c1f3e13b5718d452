//! `addis-sync serve`: Start the HTTP API server.

use addis_agent::Runtime;
use addis_config::AppConfig;
use tracing::{info, warn};

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    info!(host = %config.gateway.host, port = config.gateway.port, "Configuration loaded");
    if !config.has_api_key() {
        warn!("No provider API key configured");
    }

    let runtime = Runtime::from_config(&config);
    let candidates = runtime.orchestrator.chain().len();

    println!("Addis-Sync Gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Providers: {candidates} candidate(s)");
    if candidates == 0 {
        println!("   Warning:   no provider configured, every chat will return an apology");
    }

    addis_gateway::start(config, &runtime).await?;

    Ok(())
}
