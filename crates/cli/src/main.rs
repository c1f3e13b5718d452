//! Addis-Sync CLI: the main entry point.
//!
//! Commands:
//! - `chat`   : Interactive or single-message chat with the service desk
//! - `serve`  : Start the HTTP gateway
//! - `agents` : Show the capability tree and its tools
//! - `doctor` : Diagnose configuration and provider setup

use clap::{Parser, Subcommand};
use tracing::{debug, error};

mod commands;

#[derive(Parser)]
#[command(
    name = "addis-sync",
    about = "Addis-Sync: urban service desk for Addis Ababa",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the service desk
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Continue an existing session id
        #[arg(long)]
        session: Option<String>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the agent roster and its tools
    Agents,

    /// Diagnose configuration and providers
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!(version = env!("CARGO_PKG_VERSION"), "Addis-Sync starting");

    let result = match cli.command {
        Commands::Chat { message, session } => commands::chat::run(message, session).await,
        Commands::Serve { port } => commands::serve::run(port).await,
        Commands::Agents => commands::agents::run().await,
        Commands::Doctor => commands::doctor::run().await,
    };

    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    result
}
