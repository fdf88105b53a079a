//! Keiba-AI Validator
//!
//! CLI for scoring race predictions against official results.

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use keiba_validator::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keiba_validator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load()?;
    if let Some(path) = cli.database {
        config.database.path = path.to_string_lossy().to_string();
    }
    tracing::debug!("Database path: {}", config.database.path);

    match cli.command {
        Commands::Validate {
            race_ids,
            pending,
            wait,
            format,
        } => cli::run_validate(&config, race_ids, pending, wait, format).await,
        Commands::Import {
            predictions,
            results,
        } => cli::run_import(&config, predictions, results),
        Commands::Report { race_id, format } => cli::run_report(&config, race_id, format),
    }
}
