//! CLI commands for keiba-validator.
//!
//! Supports importing predictions and results, validating races, and
//! reporting aggregate accuracy.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use keiba_validator::config::AppConfig;
use keiba_validator::error::ValidationError;
use keiba_validator::retry::{retry_if, RetryConfig};
use keiba_validator::scorer::PredictionScorer;
use keiba_validator::storage::ValidationRepository;
use keiba_validator::summary::{print_summary_table, AccuracySummary};
use keiba_validator::types::{AccuracyRecord, Prediction, RaceResult};
use keiba_validator::validation::{
    AccuracySink, PredictionSource, ResultSource, RunOutcome, ValidationRun,
};

#[derive(Parser)]
#[command(name = "keiba-validator")]
#[command(version, about = "Keiba-AI: prediction accuracy validation", long_about = None)]
pub struct Cli {
    /// Database path override
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score predictions of one or more races against their results
    Validate {
        /// Race IDs to validate
        #[arg(value_name = "RACE_ID")]
        race_ids: Vec<String>,

        /// Also validate every race with a result and unscored predictions
        #[arg(long)]
        pending: bool,

        /// Keep retrying races whose result is not yet published
        #[arg(short, long)]
        wait: bool,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Import predictions and/or results from JSON files
    Import {
        /// JSON array of predictions
        #[arg(short, long)]
        predictions: Option<PathBuf>,

        /// JSON array of race results
        #[arg(short, long)]
        results: Option<PathBuf>,
    },

    /// Summarize stored accuracy records
    Report {
        /// Restrict to a single race
        #[arg(short, long)]
        race_id: Option<String>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

/// Per-race validation output
#[derive(Debug, Serialize)]
struct RaceReport {
    race_id: String,
    status: &'static str,
    records: Vec<AccuracyRecord>,
}

impl RaceReport {
    fn new(race_id: &str, outcome: RunOutcome) -> Self {
        let (status, records) = match outcome {
            RunOutcome::NoPredictions => ("no_predictions", Vec::new()),
            RunOutcome::ResultPending => ("result_pending", Vec::new()),
            RunOutcome::Validated { records } => ("validated", records),
        };
        Self {
            race_id: race_id.to_string(),
            status,
            records,
        }
    }
}

#[derive(Debug, Error)]
enum WaitError {
    #[error("result for race {0} not yet available")]
    Pending(String),
    #[error(transparent)]
    Failed(#[from] ValidationError),
}

fn open_repository(config: &AppConfig) -> anyhow::Result<ValidationRepository> {
    let path = Path::new(&config.database.path);
    ValidationRepository::new(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))
}

/// Run validation for the given races.
pub async fn run_validate(
    config: &AppConfig,
    mut race_ids: Vec<String>,
    pending: bool,
    wait: bool,
    format: String,
) -> anyhow::Result<()> {
    let repo = open_repository(config)?;

    if pending {
        for race_id in repo.get_pending_races()? {
            if !race_ids.contains(&race_id) {
                race_ids.push(race_id);
            }
        }
    }

    if race_ids.is_empty() {
        bail!("No races to validate: pass race IDs or --pending");
    }

    let scorer = PredictionScorer::from_config(&config.scoring);
    let run = ValidationRun::new(&repo, &repo, &repo, scorer);
    let retry = config.wait.retry_config();

    let mut reports = Vec::with_capacity(race_ids.len());
    for race_id in &race_ids {
        let outcome = if wait {
            run_with_wait(&run, race_id, &retry).await
        } else {
            run.run(race_id)
        };
        let outcome = outcome.with_context(|| format!("Validation failed for race {}", race_id))?;

        reports.push(RaceReport::new(race_id, outcome));
    }

    let validated = reports.iter().filter(|r| r.status == "validated").count();
    info!("{} of {} races validated", validated, reports.len());

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&reports)?),
        "table" => print_reports_table(&reports),
        _ => {
            eprintln!("Unknown format: {}. Using table.", format);
            print_reports_table(&reports);
        }
    }

    Ok(())
}

/// Run validation, retrying with backoff while the result is pending.
async fn run_with_wait<P, R, S>(
    run: &ValidationRun<'_, P, R, S>,
    race_id: &str,
    retry: &RetryConfig,
) -> Result<RunOutcome, ValidationError>
where
    P: PredictionSource,
    R: ResultSource,
    S: AccuracySink,
{
    let operation_name = format!("Validation of race {}", race_id);
    let outcome = retry_if(
        retry,
        &operation_name,
        || {
            let attempt = match run.run(race_id) {
                Ok(RunOutcome::ResultPending) => Err(WaitError::Pending(race_id.to_string())),
                Ok(outcome) => Ok(outcome),
                Err(e) => Err(WaitError::Failed(e)),
            };
            std::future::ready(attempt)
        },
        |e| matches!(e, WaitError::Pending(_)),
    )
    .await;

    match outcome {
        Ok(outcome) => Ok(outcome),
        Err(WaitError::Pending(_)) => Ok(RunOutcome::ResultPending),
        Err(WaitError::Failed(e)) => Err(e),
    }
}

/// Import predictions and results into the database.
pub fn run_import(
    config: &AppConfig,
    predictions: Option<PathBuf>,
    results: Option<PathBuf>,
) -> anyhow::Result<()> {
    if predictions.is_none() && results.is_none() {
        bail!("Nothing to import: pass --predictions and/or --results");
    }

    let repo = open_repository(config)?;

    if let Some(path) = predictions {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let predictions: Vec<Prediction> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid predictions in {}", path.display()))?;
        for prediction in &predictions {
            repo.insert_prediction(prediction)?;
        }
        info!("Imported {} predictions from {}", predictions.len(), path.display());
    }

    if let Some(path) = results {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let results: Vec<RaceResult> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid results in {}", path.display()))?;
        for result in &results {
            repo.insert_result(result)?;
        }
        info!("Imported {} results from {}", results.len(), path.display());
    }

    Ok(())
}

/// Print an accuracy summary over stored records.
pub fn run_report(
    config: &AppConfig,
    race_id: Option<String>,
    format: String,
) -> anyhow::Result<()> {
    let repo = open_repository(config)?;
    let records = repo.get_accuracy_records(race_id.as_deref())?;
    let summary = AccuracySummary::from_records(&records);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        "table" => print_summary_table(&summary),
        _ => {
            eprintln!("Unknown format: {}. Using table.", format);
            print_summary_table(&summary);
        }
    }

    Ok(())
}

/// Print validation results in table format.
fn print_reports_table(reports: &[RaceReport]) {
    for report in reports {
        println!("Race: {} ({})", report.race_id, report.status);
        if report.records.is_empty() {
            println!();
            continue;
        }

        println!(
            "  {:<20} {:>5} {:>5} {:>4} {:>8} {:>8} {:>7} {:>9}",
            "prediction", "hit", "pos", "top3", "rho", "conf.err", "bet", "p/l"
        );
        for r in &report.records {
            let position = r
                .top_pick_position
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            let rho = r
                .rank_correlation
                .map(|v| format!("{:.4}", v))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "  {:<20} {:>5} {:>5} {:>4} {:>8} {:>8.4} {:>7} {:>+9.2}",
                r.prediction_id,
                if r.top_pick_correct { "yes" } else { "no" },
                position,
                if r.top3_accuracy { "yes" } else { "no" },
                rho,
                r.confidence_error,
                r.betting_outcome.as_str(),
                r.profit_loss
            );
        }
        println!();
    }
}
