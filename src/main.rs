mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use memvault::auth::rate_limit::Tier;
use memvault::config::MemvaultConfig;

#[derive(Parser)]
#[command(name = "memvault", version, about = "Multi-tenant memory service for AI agents")]
struct Cli {
    /// Path to config.toml (defaults to ~/.memvault/config.toml)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve,
    /// Manage API keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
    /// Show memory statistics for a user
    Stats {
        #[arg(long)]
        user: String,
    },
    /// Run one decay-and-forget pass over a user's memories
    Consolidate {
        #[arg(long)]
        user: String,
    },
    /// Rebuild a user's full-text index
    Reindex {
        #[arg(long)]
        user: String,
    },
    /// Check a user's database health
    Doctor {
        #[arg(long)]
        user: String,
    },
    /// Start an interactive agent session
    Chat {
        #[arg(long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum KeysAction {
    /// Create a key; the plaintext is printed once
    Create {
        #[arg(long)]
        user: String,
        /// free, pro, or enterprise
        #[arg(long, default_value = "free")]
        tier: Tier,
        #[arg(long)]
        name: Option<String>,
    },
    /// List a user's keys
    List {
        #[arg(long)]
        user: String,
    },
    /// Revoke a key by id
    Revoke { key_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => MemvaultConfig::load_from(path)?,
        None => MemvaultConfig::load()?,
    };

    // Log to stderr so command output on stdout stays clean.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => memvault::server::serve(config).await?,
        Command::Keys { action } => match action {
            KeysAction::Create { user, tier, name } => cli::keys::create(&config, &user, tier, name)?,
            KeysAction::List { user } => cli::keys::list(&config, &user)?,
            KeysAction::Revoke { key_id } => cli::keys::revoke(&config, &key_id)?,
        },
        Command::Stats { user } => cli::stats::stats(&config, &user)?,
        Command::Consolidate { user } => cli::consolidate::consolidate(&config, &user)?,
        Command::Reindex { user } => cli::reindex::reindex(&config, &user)?,
        Command::Doctor { user } => cli::doctor::doctor(&config, &user)?,
        Command::Chat { user } => cli::chat::chat(&config, &user).await?,
    }

    Ok(())
}
