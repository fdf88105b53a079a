//! Scoring of a single prediction against the official result.
//!
//! Produces the accuracy metrics for one prediction:
//! - top pick hit and the top pick's actual position
//! - whether the winner was inside the predicted top K
//! - Spearman rank correlation
//! - confidence calibration residual
//! - simulated flat-stake bet outcome

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::debug;
use uuid::Uuid;

use crate::config::ScoringConfig;
use crate::correlation::correlate;
use crate::error::ValidationError;
use crate::types::{AccuracyRecord, BettingOutcome, Prediction, RaceResult};

/// Hypothetical stake per simulated bet
pub const DEFAULT_STAKE: f64 = 10.0;

/// Predicted places checked for the winner
pub const DEFAULT_TOP_K: usize = 3;

/// Scores predictions. Holds only constants, so one instance can score any race.
#[derive(Debug, Clone)]
pub struct PredictionScorer {
    stake: f64,
    top_k: usize,
}

impl Default for PredictionScorer {
    fn default() -> Self {
        Self {
            stake: DEFAULT_STAKE,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl PredictionScorer {
    pub fn new(stake: f64, top_k: usize) -> Self {
        Self { stake, top_k }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(config.stake, config.top_k)
    }

    /// Score one prediction against the result of its race.
    ///
    /// Fails with [`ValidationError::DataIntegrity`] when the inputs break an
    /// invariant the metrics depend on. No record is produced in that case.
    pub fn score(
        &self,
        prediction: &Prediction,
        result: &RaceResult,
    ) -> Result<AccuracyRecord, ValidationError> {
        check_inputs(prediction, result)?;

        let positions: HashMap<&str, u32> = result
            .actual_rankings
            .iter()
            .map(|e| (e.competitor.as_str(), e.position))
            .collect();
        let odds: HashMap<&str, f64> = result
            .actual_rankings
            .iter()
            .map(|e| (e.competitor.as_str(), e.odds))
            .collect();

        let top_pick_correct = prediction.top_pick == result.winner;
        let top_pick_position = positions.get(prediction.top_pick.as_str()).copied();

        let mut ranked: Vec<_> = prediction.predicted_rankings.iter().collect();
        ranked.sort_by_key(|r| r.rank);
        let top3_accuracy = ranked
            .iter()
            .take(self.top_k)
            .any(|r| r.competitor == result.winner);

        let predicted: Vec<(&str, u32)> = prediction
            .predicted_rankings
            .iter()
            .map(|r| (r.competitor.as_str(), r.rank))
            .collect();
        let actual: Vec<(&str, u32)> = positions.iter().map(|(c, p)| (*c, *p)).collect();
        let rank_correlation = correlate(&predicted, &actual);

        let realized = if top_pick_correct { 1.0 } else { 0.0 };
        let confidence_error = (prediction.top_pick_confidence - realized).abs();

        let places_bet = prediction
            .betting_signal
            .as_ref()
            .map_or(false, |s| s.places_bet());

        let (betting_outcome, stake, profit_loss) = if !places_bet {
            (BettingOutcome::NoBet, 0.0, 0.0)
        } else if top_pick_correct {
            let top_odds = odds.get(prediction.top_pick.as_str()).copied().ok_or_else(|| {
                ValidationError::integrity(
                    &prediction.race_id,
                    &prediction.id,
                    format!("no odds for winning top pick {}", prediction.top_pick),
                )
            })?;
            (BettingOutcome::Win, self.stake, self.stake * (top_odds - 1.0))
        } else {
            (BettingOutcome::Loss, self.stake, -self.stake)
        };

        let record = AccuracyRecord {
            id: Uuid::new_v4().to_string(),
            prediction_id: prediction.id.clone(),
            race_result_id: result.id.clone(),
            race_id: prediction.race_id.clone(),
            top_pick_correct,
            top_pick_position,
            top3_accuracy,
            rank_correlation,
            confidence_error,
            betting_outcome,
            stake,
            profit_loss,
            validated_at: Utc::now(),
        };

        debug!(
            "Scored prediction {}: correct={}, rho={:?}, outcome={}, pl={:.2}",
            record.prediction_id,
            record.top_pick_correct,
            record.rank_correlation,
            record.betting_outcome,
            record.profit_loss
        );

        Ok(record)
    }
}

/// Reject inputs that would produce a misleading metric.
fn check_inputs(prediction: &Prediction, result: &RaceResult) -> Result<(), ValidationError> {
    let fail =
        |reason: String| ValidationError::integrity(&prediction.race_id, &prediction.id, reason);

    if prediction.race_id != result.race_id {
        return Err(fail(format!(
            "result {} belongs to race {}",
            result.id, result.race_id
        )));
    }

    let confidence = prediction.top_pick_confidence;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(fail(format!(
            "top pick confidence must be between 0 and 1, got {}",
            confidence
        )));
    }

    if !prediction
        .predicted_rankings
        .iter()
        .any(|r| r.competitor == prediction.top_pick)
    {
        return Err(fail(format!(
            "top pick {} is not in the predicted rankings",
            prediction.top_pick
        )));
    }

    let predicted = &prediction.predicted_rankings;
    if let Some(competitor) = first_duplicate(predicted.iter().map(|r| r.competitor.as_str())) {
        return Err(fail(format!("{} appears twice in the predicted rankings", competitor)));
    }
    if let Some(rank) = first_duplicate(predicted.iter().map(|r| r.rank)) {
        return Err(fail(format!("predicted rank {} is given twice", rank)));
    }

    let actual = &result.actual_rankings;
    if let Some(competitor) = first_duplicate(actual.iter().map(|e| e.competitor.as_str())) {
        return Err(fail(format!(
            "{} appears twice in result {}",
            competitor, result.id
        )));
    }
    if let Some(position) = first_duplicate(actual.iter().map(|e| e.position)) {
        return Err(fail(format!(
            "position {} is given twice in result {}",
            position, result.id
        )));
    }

    if let Some(entry) = result
        .actual_rankings
        .iter()
        .find(|e| !e.odds.is_finite() || e.odds <= 0.0)
    {
        return Err(fail(format!(
            "odds for {} must be positive, got {}",
            entry.competitor, entry.odds
        )));
    }

    let first = result.actual_rankings.iter().find(|e| e.position == 1);
    if first.map(|e| e.competitor.as_str()) != Some(result.winner.as_str()) {
        return Err(fail(format!(
            "winner {} does not hold position 1 in result {}",
            result.winner, result.id
        )));
    }

    Ok(())
}

fn first_duplicate<T, I>(values: I) -> Option<T>
where
    T: Eq + Hash + Copy,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    values.into_iter().find(|v| !seen.insert(*v))
}
