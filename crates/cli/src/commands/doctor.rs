//! `addis-sync doctor`: Diagnose configuration and provider setup.

use addis_agent::Runtime;
use addis_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Addis-Sync Doctor: System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  [ok]   Config file found: {}", config_path.display());
    } else {
        println!("  [info] No config file at {}, using defaults", config_path.display());
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  [ok]   Configuration valid");
            config
        }
        Err(e) => {
            println!("  [fail] Configuration invalid: {e}");
            println!("\n  1 issue found. Fix the configuration and run doctor again.");
            return Ok(());
        }
    };

    if config.providers.gemini.api_key.is_some() {
        println!("  [ok]   Gemini API key configured");
    } else {
        println!("  [warn] No Gemini API key (set GEMINI_API_KEY or GOOGLE_API_KEY)");
        issues += 1;
    }
    if config.providers.openrouter.api_key.is_some() {
        println!("  [ok]   OpenRouter API key configured");
    } else {
        println!("  [info] No OpenRouter API key; free-tier fallback unavailable");
    }

    let runtime = Runtime::from_config(&config);
    let orchestrator = &runtime.orchestrator;

    let candidates = orchestrator.chain().status();
    if candidates.is_empty() {
        println!("  [fail] No provider candidates enabled");
        issues += 1;
    } else {
        println!("  [ok]   Fallback chain:");
        for (i, c) in candidates.iter().enumerate() {
            println!(
                "           {}. {} / {} (timeout {}s)",
                i + 1,
                c.provider,
                c.model,
                c.timeout.as_secs()
            );
        }
    }

    let missing: Vec<&str> = orchestrator
        .tree()
        .collect_tool_names()
        .into_iter()
        .filter(|name| orchestrator.registry().resolve(name).is_none())
        .collect();
    if missing.is_empty() {
        println!("  [ok]   All roster tools registered");
    } else {
        println!("  [fail] Roster names unregistered tools: {}", missing.join(", "));
        issues += 1;
    }

    let assigned = orchestrator.tree().collect_tool_names();
    let idle: Vec<&str> = orchestrator
        .registry()
        .names()
        .into_iter()
        .filter(|name| !assigned.contains(name))
        .collect();
    if !idle.is_empty() {
        println!("  [info] Registered tools no role offers: {}", idle.join(", "));
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
