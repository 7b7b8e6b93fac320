use clap::{Parser, Subcommand};
use std::path::PathBuf;

use simo_config::{ConfigLoader, SimoConfig};
use simo_core::SimoError;

mod parse;
mod run;

/// 🤖 Simo: intent safety pipeline for a household robot
#[derive(Parser)]
#[command(name = "simo", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to simo.toml config file
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
    /// Read utterances from stdin and drive the robot
    Run {
        /// Record commands instead of connecting to the controller
        #[arg(long)]
        dry_run: bool,
    },
    /// Show what the NLU makes of one utterance (nothing is executed)
    Parse {
        /// The utterance, e.g. "前进然后左转"
        text: String,
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
    pub async fn run(self) -> simo_core::Result<()> {
        // Load config first so we can use it for log format
        let config = ConfigLoader::load(self.config.as_deref())?;

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
        Self::init_tracing(log_level, &config.logging.format);

        match self.command {
            Commands::Run { dry_run } => run::cmd_run(config, dry_run).await,
            Commands::Parse { text, json } => parse::cmd_parse(config, text, json).await,
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Version => Self::cmd_version(),
        }
    }

    fn init_tracing(log_level: &str, format: &str) {
        let filter = || {
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level))
        };
        match format {
            "json" => tracing_subscriber::fmt()
                .with_env_filter(filter())
                .json()
                .with_target(true)
                .with_writer(std::io::stderr)
                .init(),
            "compact" => tracing_subscriber::fmt()
                .with_env_filter(filter())
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
                .init(),
            _ => tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_target(false)
                .with_writer(std::io::stderr)
                .init(),
        }
    }

    fn cmd_config(config: SimoConfig, json: bool) -> simo_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| SimoError::Config(e.to_string()))?
            );
        }

        let warnings = config.validate().map_err(SimoError::Config)?;
        for w in &warnings {
            eprintln!("⚠️  {w}");
        }
        Ok(())
    }

    fn cmd_version() -> simo_core::Result<()> {
        println!("🤖 Simo v{}", env!("CARGO_PKG_VERSION"));
        println!("   Rust edition: 2024");
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }
}
