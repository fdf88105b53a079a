//! Error types for validation runs.

use thiserror::Error;

/// Failures surfaced by the scorer and the validation orchestrator.
///
/// Missing predictions or a missing result are not errors; see
/// [`crate::validation::RunOutcome`].
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Input violates an invariant the scorer relies on
    #[error("data integrity violation in race {race_id}, prediction {prediction_id}: {reason}")]
    DataIntegrity {
        race_id: String,
        prediction_id: String,
        reason: String,
    },

    /// Load or persist call failed
    #[error("storage error: {0}")]
    Storage(String),
}

impl ValidationError {
    pub fn integrity(race_id: &str, prediction_id: &str, reason: impl Into<String>) -> Self {
        ValidationError::DataIntegrity {
            race_id: race_id.to_string(),
            prediction_id: prediction_id.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<anyhow::Error> for ValidationError {
    fn from(err: anyhow::Error) -> Self {
        // Keep the full context chain
        ValidationError::Storage(format!("{:#}", err))
    }
}
