//! Litreview CLI: generate a literature review for a research topic.

mod commands;
mod review;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub(crate) const DEFAULT_TOPIC: &str = "Transformer architectures in natural language processing";

/// Litreview: plan, search, read and synthesize a literature review
#[derive(Parser, Debug)]
#[command(name = "litreview", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Research topic to review
    #[arg(short, long, default_value = DEFAULT_TOPIC)]
    topic: String,

    /// Write the review as markdown to this file instead of printing it
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file path (defaults to ./litreview.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bypass the on-disk response cache
    #[arg(long)]
    no_cache: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Inspect or clear the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum CacheAction {
    /// Show entry counts and sizes per namespace
    Stats,
    /// Delete cached entries
    Clear {
        /// Only clear this namespace (e.g. "search", "embeddings")
        #[arg(long)]
        namespace: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "litreview", "litreview")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "litreview.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut config = litreview_core::config::load_config(Some(&workspace), cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    if let Some(command) = cli.command {
        return commands::handle_command(command, &config).await;
    }

    if let Ok(model) = std::env::var("OPENAI_MODEL")
        && !model.trim().is_empty()
    {
        config.llm.model = model.trim().to_string();
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }

    // Returning the error, rather than exiting, lets the log guard flush.
    review::require_credentials(&config, |var| std::env::var(var).ok())?;

    review::run(&cli.topic, cli.output.as_deref(), config, cli.quiet).await
}
