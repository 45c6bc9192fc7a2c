pub mod config;
pub mod query;
pub mod session;
pub mod upload;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mt_domain::records::LogLevel;

/// monkai-trace: conversation and log telemetry for AI agents.
#[derive(Debug, Parser)]
#[command(name = "monkai-trace", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Check that the ingestion API is reachable and accepts the token.
    Ping,
    /// Resolve the session id for a user, as an agent run would.
    Session {
        /// End-user identity.
        user: String,
        /// Start a new session even if the current one is still active.
        #[arg(long)]
        force_new: bool,
        /// Namespace override (defaults to sessions.namespace).
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Upload conversation records from a `{"records": [...]}` JSON file.
    UploadRecords {
        file: PathBuf,
    },
    /// Upload log entries from a `{"logs": [...]}` JSON file.
    UploadLogs {
        file: PathBuf,
        /// Namespace for entries that carry none.
        #[arg(long)]
        namespace: String,
    },
    /// Query stored conversation records.
    QueryRecords(RecordQueryArgs),
    /// Query stored log entries.
    QueryLogs(LogQueryArgs),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, clap::Args)]
pub struct RecordQueryArgs {
    /// Namespace override (defaults to sessions.namespace).
    #[arg(long)]
    pub namespace: Option<String>,
    #[arg(long)]
    pub agent: Option<String>,
    #[arg(long)]
    pub session_id: Option<String>,
    /// ISO-8601 lower bound.
    #[arg(long)]
    pub start_date: Option<String>,
    /// ISO-8601 upper bound.
    #[arg(long)]
    pub end_date: Option<String>,
    #[arg(long, default_value_t = 100)]
    pub limit: u32,
    #[arg(long, default_value_t = 0)]
    pub offset: u32,
}

#[derive(Debug, clap::Args)]
pub struct LogQueryArgs {
    /// Namespace override (defaults to sessions.namespace).
    #[arg(long)]
    pub namespace: Option<String>,
    /// Minimum level: debug, info, warn or error.
    #[arg(long)]
    pub level: Option<LogLevel>,
    #[arg(long)]
    pub resource_id: Option<String>,
    #[arg(long)]
    pub start_date: Option<String>,
    #[arg(long)]
    pub end_date: Option<String>,
    #[arg(long, default_value_t = 100)]
    pub limit: u32,
    #[arg(long, default_value_t = 0)]
    pub offset: u32,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `MONKAI_CONFIG` (or
/// `monkai.toml` by default).  A missing file means defaults.  Returns the
/// parsed config and the path that was used.
pub fn load_config() -> anyhow::Result<(mt_domain::config::Config, String)> {
    let config_path = std::env::var("MONKAI_CONFIG").unwrap_or_else(|_| "monkai.toml".into());

    let path = std::path::Path::new(&config_path);
    let config = if path.exists() {
        mt_domain::config::Config::from_path(path)
            .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?
    } else {
        mt_domain::config::Config::default()
    };

    Ok((config, config_path))
}
