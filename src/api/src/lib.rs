//! Keiba-AI prediction validator
//!
//! This library provides:
//! - Spearman rank correlation between predicted and actual orderings
//! - Per-prediction accuracy scoring (top pick, top 3, calibration, simulated bet)
//! - A validation run that scores every prediction of a race and persists the records
//! - SQLite storage and aggregate accuracy reports
//!
//! # Example
//!
//! ```no_run
//! use keiba_validator::scorer::PredictionScorer;
//! use keiba_validator::storage::ValidationRepository;
//! use keiba_validator::validation::ValidationRun;
//! use std::path::Path;
//!
//! let repo = ValidationRepository::new(Path::new("data/validation.db")).unwrap();
//! let run = ValidationRun::new(&repo, &repo, &repo, PredictionScorer::default());
//! let outcome = run.run("202401010101").unwrap();
//! println!("{:?}", outcome);
//! ```

pub mod config;
pub mod correlation;
pub mod error;
pub mod retry;
pub mod scorer;
pub mod storage;
pub mod summary;
pub mod types;
pub mod validation;

pub use error::ValidationError;
pub use scorer::PredictionScorer;
pub use types::{AccuracyRecord, BettingOutcome, BettingSignal, Prediction, RaceResult};
pub use validation::{RunOutcome, ValidationRun};
