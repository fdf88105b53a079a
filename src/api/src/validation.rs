//! Validation run for a single race.
//!
//! Loads every prediction for the race and its result, scores each
//! prediction, and persists one accuracy record per prediction. Storage is
//! reached only through the collaborator traits below.

use tracing::{info, warn};

use crate::error::ValidationError;
use crate::scorer::PredictionScorer;
use crate::types::{AccuracyRecord, Prediction, RaceResult};

/// Source of predictions
pub trait PredictionSource {
    fn load_predictions_by_race(&self, race_id: &str) -> Result<Vec<Prediction>, ValidationError>;
}

/// Source of official results
pub trait ResultSource {
    fn load_result_by_race(&self, race_id: &str) -> Result<Option<RaceResult>, ValidationError>;
}

/// Destination for accuracy records
pub trait AccuracySink {
    fn insert_accuracy_record(&self, record: &AccuracyRecord) -> Result<(), ValidationError>;
}

/// What a run did for its race.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No predictions exist for the race
    NoPredictions,
    /// Predictions exist but the result is not published yet
    ResultPending,
    /// Every prediction was scored and persisted
    Validated { records: Vec<AccuracyRecord> },
}

/// Orchestrates scoring for one race.
///
/// Fail-fast: the first scoring or persistence error aborts the remaining
/// predictions. Records already inserted for earlier predictions stay.
/// Concurrent runs for the same race can insert duplicates; callers must
/// keep at most one run in flight per race.
pub struct ValidationRun<'a, P, R, S> {
    predictions: &'a P,
    results: &'a R,
    sink: &'a S,
    scorer: PredictionScorer,
}

impl<'a, P, R, S> ValidationRun<'a, P, R, S>
where
    P: PredictionSource,
    R: ResultSource,
    S: AccuracySink,
{
    pub fn new(predictions: &'a P, results: &'a R, sink: &'a S, scorer: PredictionScorer) -> Self {
        Self {
            predictions,
            results,
            sink,
            scorer,
        }
    }

    /// Validate every prediction of `race_id`.
    pub fn run(&self, race_id: &str) -> Result<RunOutcome, ValidationError> {
        let predictions = self
            .predictions
            .load_predictions_by_race(race_id)
            .map_err(|e| in_race(race_id, e))?;
        if predictions.is_empty() {
            warn!("No predictions for race {}, skipping", race_id);
            return Ok(RunOutcome::NoPredictions);
        }

        let result = match self
            .results
            .load_result_by_race(race_id)
            .map_err(|e| in_race(race_id, e))?
        {
            Some(result) => result,
            None => {
                warn!(
                    "No result for race {} yet ({} predictions waiting)",
                    race_id,
                    predictions.len()
                );
                return Ok(RunOutcome::ResultPending);
            }
        };

        let mut records = Vec::with_capacity(predictions.len());
        for prediction in &predictions {
            let record = self.scorer.score(prediction, &result).map_err(|e| {
                warn!("Scoring failed for race {}: {}", race_id, e);
                e
            })?;
            self.sink
                .insert_accuracy_record(&record)
                .map_err(|e| in_race(race_id, e))?;
            records.push(record);
        }

        let hits = records.iter().filter(|r| r.top_pick_correct).count();
        info!(
            "Validated race {}: {} predictions, {} top-pick hits",
            race_id,
            records.len(),
            hits
        );

        Ok(RunOutcome::Validated { records })
    }
}

/// Name the race in storage failures. Integrity errors already carry it.
fn in_race(race_id: &str, err: ValidationError) -> ValidationError {
    match err {
        ValidationError::Storage(msg) => {
            warn!("Storage failure in race {}: {}", race_id, msg);
            ValidationError::Storage(format!("race {}: {}", race_id, msg))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BettingOutcome, BettingSignal, FinishEntry, PredictedRank};
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        predictions: HashMap<String, Vec<Prediction>>,
        results: HashMap<String, RaceResult>,
        records: RefCell<Vec<AccuracyRecord>>,
        fail_inserts: bool,
        fail_loads: bool,
    }

    impl PredictionSource for MemoryStore {
        fn load_predictions_by_race(
            &self,
            race_id: &str,
        ) -> Result<Vec<Prediction>, ValidationError> {
            if self.fail_loads {
                return Err(ValidationError::Storage("database locked".to_string()));
            }
            Ok(self.predictions.get(race_id).cloned().unwrap_or_default())
        }
    }

    impl ResultSource for MemoryStore {
        fn load_result_by_race(&self, race_id: &str) -> Result<Option<RaceResult>, ValidationError> {
            Ok(self.results.get(race_id).cloned())
        }
    }

    impl AccuracySink for MemoryStore {
        fn insert_accuracy_record(&self, record: &AccuracyRecord) -> Result<(), ValidationError> {
            if self.fail_inserts {
                return Err(ValidationError::Storage("insert rejected".to_string()));
            }
            self.records.borrow_mut().push(record.clone());
            Ok(())
        }
    }

    fn prediction(id: &str, race_id: &str, order: &[&str]) -> Prediction {
        Prediction {
            id: id.to_string(),
            race_id: race_id.to_string(),
            predicted_rankings: order
                .iter()
                .enumerate()
                .map(|(i, c)| PredictedRank {
                    competitor: c.to_string(),
                    rank: i as u32 + 1,
                    score: 0.0,
                })
                .collect(),
            top_pick: order[0].to_string(),
            top_pick_confidence: 0.5,
            betting_signal: Some(BettingSignal::Bet),
        }
    }

    fn result(race_id: &str, order: &[&str]) -> RaceResult {
        RaceResult {
            id: format!("result_{}", race_id),
            race_id: race_id.to_string(),
            actual_rankings: order
                .iter()
                .enumerate()
                .map(|(i, c)| FinishEntry {
                    competitor: c.to_string(),
                    position: i as u32 + 1,
                    odds: 2.0 + i as f64,
                })
                .collect(),
            winner: order[0].to_string(),
        }
    }

    fn run(store: &MemoryStore, race_id: &str) -> Result<RunOutcome, ValidationError> {
        ValidationRun::new(store, store, store, PredictionScorer::default()).run(race_id)
    }

    #[test]
    fn test_no_predictions_is_noop() {
        let mut store = MemoryStore::default();
        store.results.insert("R1".to_string(), result("R1", &["A", "B"]));

        assert_eq!(run(&store, "R1").unwrap(), RunOutcome::NoPredictions);
        assert!(store.records.borrow().is_empty());
    }

    #[test]
    fn test_missing_result_is_noop() {
        let mut store = MemoryStore::default();
        store
            .predictions
            .insert("R1".to_string(), vec![prediction("P1", "R1", &["A", "B"])]);

        assert_eq!(run(&store, "R1").unwrap(), RunOutcome::ResultPending);
        assert!(store.records.borrow().is_empty());
    }

    #[test]
    fn test_one_record_per_prediction() {
        let mut store = MemoryStore::default();
        store.predictions.insert(
            "R1".to_string(),
            vec![
                prediction("P1", "R1", &["A", "B", "C"]),
                prediction("P2", "R1", &["B", "A", "C"]),
                prediction("P3", "R1", &["C", "B", "A"]),
            ],
        );
        store.results.insert("R1".to_string(), result("R1", &["A", "B", "C"]));

        let outcome = run(&store, "R1").unwrap();
        let records = match outcome {
            RunOutcome::Validated { records } => records,
            other => panic!("Expected Validated, got {:?}", other),
        };

        assert_eq!(records.len(), 3);
        assert_eq!(*store.records.borrow(), records);

        let by_id: HashMap<_, _> = records.iter().map(|r| (r.prediction_id.as_str(), r)).collect();
        assert!(by_id["P1"].top_pick_correct);
        assert_eq!(by_id["P1"].betting_outcome, BettingOutcome::Win);
        assert!((by_id["P1"].profit_loss - 10.0).abs() < 1e-9);
        assert!(!by_id["P2"].top_pick_correct);
        assert_eq!(by_id["P2"].profit_loss, -10.0);
        assert_eq!(by_id["P3"].rank_correlation, Some(-1.0));
    }

    #[test]
    fn test_rerun_inserts_again() {
        let mut store = MemoryStore::default();
        store
            .predictions
            .insert("R1".to_string(), vec![prediction("P1", "R1", &["A", "B"])]);
        store.results.insert("R1".to_string(), result("R1", &["A", "B"]));

        run(&store, "R1").unwrap();
        run(&store, "R1").unwrap();

        let records = store.records.borrow();
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].id, records[1].id);
    }

    #[test]
    fn test_fail_fast_on_bad_prediction() {
        let mut store = MemoryStore::default();
        let mut bad = prediction("P2", "R1", &["A", "B"]);
        bad.top_pick = "Z".to_string();
        store.predictions.insert(
            "R1".to_string(),
            vec![
                prediction("P1", "R1", &["A", "B"]),
                bad,
                prediction("P3", "R1", &["B", "A"]),
            ],
        );
        store.results.insert("R1".to_string(), result("R1", &["A", "B"]));

        let err = run(&store, "R1").unwrap_err();
        assert!(err.to_string().contains("P2"));

        // P1 persisted before the failure; P2 and P3 never written
        let records = store.records.borrow();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].prediction_id, "P1");
    }

    #[test]
    fn test_persistence_failure_propagates() {
        let mut store = MemoryStore {
            fail_inserts: true,
            ..Default::default()
        };
        store
            .predictions
            .insert("R1".to_string(), vec![prediction("P1", "R1", &["A", "B"])]);
        store.results.insert("R1".to_string(), result("R1", &["A", "B"]));

        match run(&store, "R1") {
            Err(ValidationError::Storage(msg)) => assert_eq!(msg, "race R1: insert rejected"),
            other => panic!("Expected Storage error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_failure_names_race() {
        let store = MemoryStore {
            fail_loads: true,
            ..Default::default()
        };

        let err = run(&store, "R7").unwrap_err();
        assert!(matches!(err, ValidationError::Storage(_)));
        assert!(err.to_string().contains("race R7"));
    }

    #[test]
    fn test_races_are_independent() {
        let mut store = MemoryStore::default();
        store
            .predictions
            .insert("R1".to_string(), vec![prediction("P1", "R1", &["A", "B"])]);
        store
            .predictions
            .insert("R2".to_string(), vec![prediction("P2", "R2", &["X", "Y"])]);
        store.results.insert("R2".to_string(), result("R2", &["Y", "X"]));

        assert_eq!(run(&store, "R1").unwrap(), RunOutcome::ResultPending);
        assert!(matches!(run(&store, "R2").unwrap(), RunOutcome::Validated { .. }));

        let records = store.records.borrow();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].race_id, "R2");
    }
}
