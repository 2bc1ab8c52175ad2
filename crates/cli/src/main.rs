//! postaction CLI - signing key and trigger id tooling.
//!
//! # Usage
//!
//! ```bash
//! # Generate a trigger signing key (PKCS#8 PEM)
//! postaction keys generate > trigger-key.pem
//!
//! # Decode a trigger id an integration received
//! POSTACTION_SIGNING_KEY="$(cat trigger-key.pem)" postaction trigger inspect <TRIGGER_ID>
//!
//! # Check a seed file before starting the server with it
//! postaction seed check fixtures/demo.yaml
//! ```
//!
//! # Commands
//!
//! - `keys generate` - Print a new P-256 signing key
//! - `trigger inspect` - Verify and decode a request-form trigger id
//! - `seed check` - Load a seed file and report its interactive posts

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "postaction")]
#[command(author, version, about = "postaction CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage trigger signing keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
    /// Work with trigger ids
    Trigger {
        #[command(subcommand)]
        action: TriggerAction,
    },
    /// Work with seed files
    Seed {
        #[command(subcommand)]
        action: SeedAction,
    },
}

#[derive(Subcommand)]
enum KeysAction {
    /// Print a new PKCS#8 PEM signing key to stdout
    Generate,
}

#[derive(Subcommand)]
enum TriggerAction {
    /// Verify and decode a request-form trigger id
    Inspect {
        /// The trigger id as sent to the integration
        trigger_id: String,

        /// Freshness window in milliseconds
        #[arg(long, env = "POSTACTION_TRIGGER_TTL_MS", default_value_t = 3000)]
        ttl_ms: u64,
    },
}

#[derive(Subcommand)]
enum SeedAction {
    /// Parse a seed file and list its interactive posts
    Check {
        /// Path to the YAML seed file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // Load .env so clap sees POSTACTION_* defaults
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Keys { action } => match action {
            KeysAction::Generate => commands::keys::generate()?,
        },
        Commands::Trigger { action } => match action {
            TriggerAction::Inspect { trigger_id, ttl_ms } => {
                commands::trigger::inspect(&trigger_id, ttl_ms)?;
            }
        },
        Commands::Seed { action } => match action {
            SeedAction::Check { path } => commands::seed::check(&path).await?,
        },
    }
    Ok(())
}
