//! `addis-sync chat`: Interactive or single-message chat mode.

use addis_agent::Runtime;
use addis_config::AppConfig;
use std::io::Write;
use tracing::{debug, info};
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    message: Option<String>,
    session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Fail early with setup instructions when no key is configured
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GEMINI_API_KEY      (or GOOGLE_API_KEY)  primary provider");
        eprintln!("    OPENROUTER_API_KEY                       free-tier fallback");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let runtime = Runtime::from_config(&config);
    let orchestrator = &runtime.orchestrator;
    let session_id = session.unwrap_or_else(|| orchestrator.store().create_session());
    info!(session_id = %session_id, root_model = %config.agent.root_model, "Chat session ready");

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let reply = orchestrator.run_turn(&session_id, &msg).await;
        eprint!("\r              \r");
        println!("{reply}");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Addis-Sync: Interactive Mode");
    println!();
    println!("  Session:   {session_id}");
    println!("  Model:     {}", config.agent.root_model);
    println!("  Providers: {} candidate(s)", orchestrator.chain().len());
    println!();
    println!("  Describe the issue you want to report, or ask about a ticket.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let _sweeper = runtime.spawn_sweeper(&config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            debug!(session_id = %session_id, "Interactive chat ended");
            break;
        }
        if !input.is_empty() {
            eprint!("  ...");
            let reply = orchestrator.run_turn(&session_id, input).await;
            eprint!("\r     \r");
            println!();
            for line in reply.lines() {
                println!("  Addis-Sync > {line}");
            }
            println!();
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
