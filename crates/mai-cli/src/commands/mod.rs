use clap::{Parser, Subcommand};
use std::path::PathBuf;

use mai_config::{ConfigLoader, MaiConfig};
use mai_core::MaiError;

mod start;
mod streams;

/// Mai — per-conversation thinking-flow runtime
#[derive(Parser)]
#[command(name = "mai", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to mai.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore thinking flows and observe them until Ctrl-C
    Start {
        /// Seconds between flow state summaries in the log
        #[arg(long, default_value = "60")]
        status_interval: u64,
    },
    /// List persisted interaction streams
    Streams {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version and build info
    Version,
}

impl Cli {
    pub async fn run(self) -> mai_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };
        init_tracing(&config.logging.format, log_level);

        match self.command {
            Commands::Start { status_interval } => start::cmd_start(config, status_interval).await,
            Commands::Streams { json } => streams::cmd_streams(&config, json),
            Commands::Config { json } => Self::cmd_config(&config, json),
            Commands::Version => Self::cmd_version(),
        }
    }

    fn cmd_config(config: &MaiConfig, json: bool) -> mai_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(config).map_err(|e| MaiError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_version() -> mai_core::Result<()> {
        println!("Mai v{}", env!("CARGO_PKG_VERSION"));
        println!("   Database schema: {}", mai_store::SUPPORTED_SCHEMA);
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }
}

fn init_tracing(format: &str, log_level: &str) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level))
    };
    match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .json()
            .with_target(true)
            .init(),
        "compact" => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .compact()
            .with_target(false)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(false)
            .init(),
    }
}
