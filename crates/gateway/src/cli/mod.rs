pub mod config;
pub mod run;

use anyhow::Context;
use clap::{Parser, Subcommand};

use dq_domain::config::{Config, ConfigError};

/// DocQA: a documentation Q&A agent behind an HTTP front door.
#[derive(Debug, Parser)]
#[command(name = "docqa", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve(ServeArgs),
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Ask a single question and print the answer.
    Run {
        /// The question to send.
        message: String,
    },
}

#[derive(Debug, Default, clap::Args)]
pub struct ServeArgs {
    /// Bind host (overrides HOST).
    #[arg(long)]
    pub host: Option<String>,
    /// Bind port (overrides PORT).
    #[arg(long)]
    pub port: Option<u16>,
    /// Emit JSON log lines (also enabled by LOG_FORMAT=json).
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Report configuration issues for the gateway.
    Validate,
    /// Print the resolved configuration with API keys removed.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load defaults, the optional `DOCQA_CONFIG` file, and the environment
/// overlay. Overlay issues (unparseable values) are returned alongside.
///
/// Shared by `serve`, `run`, and `config` so the logic lives in one place.
pub fn load_config() -> anyhow::Result<(Config, Vec<ConfigError>)> {
    Config::load().context("loading configuration")
}
