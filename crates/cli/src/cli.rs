//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use config_loader::{parse_destination_list, ConfigOverrides};
use contracts::{ChatId, ContractError};
use std::path::PathBuf;

/// tg-relay - Telegram channel relay
#[derive(Parser, Debug)]
#[command(
    name = "tg-relay",
    author,
    version,
    about = "Relay posts from one Telegram channel to many chats",
    long_about = "Watches a source channel through the Bot API and re-posts every message \n\
                  to the configured destinations, keeping links and attached media. \n\
                  Each destination retries independently."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TG_RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TG_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay
    Run(RunArgs),

    /// Validate configuration without running
    Validate(ValidateArgs),

    /// Display configuration, optionally resolving chats via the Bot API
    Info(InfoArgs),
}

/// Configuration source shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to configuration file (TOML or JSON); defaults plus overrides when absent
    #[arg(short, long, env = "TG_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the source channel id
    #[arg(long, env = "TG_RELAY_SOURCE_CHANNEL", allow_hyphen_values = true)]
    pub source_channel: Option<String>,

    /// Override destinations (comma-separated chat ids or @names)
    #[arg(long, env = "TG_RELAY_DESTINATIONS", allow_hyphen_values = true)]
    pub destinations: Option<String>,

    /// Bot API token
    #[arg(long, env = "TG_RELAY_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Bot API base URL
    #[arg(long, env = "TG_RELAY_API_BASE")]
    pub api_base: Option<String>,
}

impl ConfigArgs {
    /// Collect the override flags
    ///
    /// # Errors
    /// A destination list with no usable entry
    pub fn overrides(&self) -> Result<ConfigOverrides, ContractError> {
        let destinations = self
            .destinations
            .as_deref()
            .map(parse_destination_list)
            .transpose()?;

        Ok(ConfigOverrides {
            source_channel: self.source_channel.as_deref().map(ChatId::from),
            destinations,
            bot_token: self.bot_token.clone(),
            api_base: self.api_base.clone(),
        })
    }
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Read messages from a JSON-lines file instead of the Bot API
    #[arg(long, env = "TG_RELAY_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Directory that relative payload paths in the replay file refer to
    /// (defaults to the replay file's directory)
    #[arg(long, requires = "replay")]
    pub media_dir: Option<PathBuf>,

    /// Log deliveries instead of sending them
    #[arg(long)]
    pub log_only: bool,

    /// Also relay posts queued before startup
    #[arg(long)]
    pub include_backlog: bool,

    /// Maximum number of messages to relay (0 = unlimited)
    #[arg(long, default_value = "0", env = "TG_RELAY_MAX_MESSAGES")]
    pub max_messages: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Channel buffer size between the source and the relay
    #[arg(long, default_value = "100", env = "TG_RELAY_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "TG_RELAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Look up every configured chat with getChat
    #[arg(long)]
    pub resolve: bool,

    /// List chats from pending updates without consuming them
    ///
    /// Post in the channel (or add the bot to it) first. Only the bot token is
    /// required, so this works before any chat id is configured.
    #[arg(long, conflicts_with = "resolve")]
    pub discover: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
