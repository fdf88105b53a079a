//! Prediction, result and accuracy record types for the validator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of a predicted ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedRank {
    pub competitor: String,
    /// 1-based predicted rank
    pub rank: u32,
    /// Model score for this competitor
    #[serde(default)]
    pub score: f64,
}

/// Betting signal attached to a prediction.
///
/// Any signal other than `Avoid` places the simulated wager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BettingSignal {
    Bet,
    Avoid,
    Other(String),
}

impl BettingSignal {
    pub fn as_str(&self) -> &str {
        match self {
            BettingSignal::Bet => "bet",
            BettingSignal::Avoid => "avoid",
            BettingSignal::Other(s) => s,
        }
    }

    /// Whether a hypothetical stake is risked for this signal.
    pub fn places_bet(&self) -> bool {
        !matches!(self, BettingSignal::Avoid)
    }
}

impl From<String> for BettingSignal {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "bet" => BettingSignal::Bet,
            "avoid" => BettingSignal::Avoid,
            _ => BettingSignal::Other(s),
        }
    }
}

impl From<BettingSignal> for String {
    fn from(signal: BettingSignal) -> Self {
        signal.as_str().to_string()
    }
}

/// A forecast of the finishing order of one race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub race_id: String,
    pub predicted_rankings: Vec<PredictedRank>,
    pub top_pick: String,
    /// Stated probability that `top_pick` wins
    pub top_pick_confidence: f64,
    #[serde(default)]
    pub betting_signal: Option<BettingSignal>,
}

/// One finisher in an official result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishEntry {
    pub competitor: String,
    /// 1-based finishing position
    pub position: u32,
    /// Decimal odds (payout multiplier)
    pub odds: f64,
}

/// Official result of a race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceResult {
    pub id: String,
    pub race_id: String,
    pub actual_rankings: Vec<FinishEntry>,
    pub winner: String,
}

/// Outcome of the simulated wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BettingOutcome {
    Win,
    Loss,
    NoBet,
}

impl BettingOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BettingOutcome::Win => "win",
            BettingOutcome::Loss => "loss",
            BettingOutcome::NoBet => "no_bet",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "win" => Some(BettingOutcome::Win),
            "loss" => Some(BettingOutcome::Loss),
            "no_bet" => Some(BettingOutcome::NoBet),
            _ => None,
        }
    }
}

impl fmt::Display for BettingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accuracy metrics for one prediction. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRecord {
    pub id: String,
    pub prediction_id: String,
    pub race_result_id: String,
    pub race_id: String,
    pub top_pick_correct: bool,
    /// `None` when the top pick does not appear in the result
    pub top_pick_position: Option<u32>,
    pub top3_accuracy: bool,
    /// `None` when fewer than two competitors overlap
    pub rank_correlation: Option<f64>,
    pub confidence_error: f64,
    pub betting_outcome: BettingOutcome,
    /// Amount risked on the simulated bet, 0 for `NoBet`
    #[serde(default)]
    pub stake: f64,
    pub profit_loss: f64,
    pub validated_at: DateTime<Utc>,
}

impl AccuracyRecord {
    /// Stated top-pick confidence, recovered from the calibration residual.
    pub fn stated_confidence(&self) -> f64 {
        if self.top_pick_correct {
            1.0 - self.confidence_error
        } else {
            self.confidence_error
        }
    }
}
