//! SQLite repository for predictions, results and accuracy records

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::schema::create_tables;
use crate::error::ValidationError;
use crate::types::{AccuracyRecord, BettingOutcome, BettingSignal, Prediction, RaceResult};
use crate::validation::{AccuracySink, PredictionSource, ResultSource};

/// Prediction row with rankings still encoded as JSON
struct PredictionRow {
    id: String,
    race_id: String,
    predicted_rankings: String,
    top_pick: String,
    top_pick_confidence: f64,
    betting_signal: Option<String>,
}

impl PredictionRow {
    fn into_prediction(self) -> Result<Prediction> {
        let predicted_rankings = serde_json::from_str(&self.predicted_rankings)
            .with_context(|| format!("Invalid predicted_rankings for prediction {}", self.id))?;

        Ok(Prediction {
            id: self.id,
            race_id: self.race_id,
            predicted_rankings,
            top_pick: self.top_pick,
            top_pick_confidence: self.top_pick_confidence,
            betting_signal: self.betting_signal.map(BettingSignal::from),
        })
    }
}

/// Accuracy record row with the outcome still as text
struct AccuracyRow {
    id: String,
    prediction_id: String,
    race_result_id: String,
    race_id: String,
    top_pick_correct: bool,
    top_pick_position: Option<u32>,
    top3_accuracy: bool,
    rank_correlation: Option<f64>,
    confidence_error: f64,
    betting_outcome: String,
    stake: f64,
    profit_loss: f64,
    validated_at: DateTime<Utc>,
}

impl AccuracyRow {
    fn into_record(self) -> Result<AccuracyRecord> {
        let betting_outcome = BettingOutcome::from_str(&self.betting_outcome).ok_or_else(|| {
            anyhow!(
                "Unknown betting outcome '{}' in accuracy record {}",
                self.betting_outcome,
                self.id
            )
        })?;

        Ok(AccuracyRecord {
            id: self.id,
            prediction_id: self.prediction_id,
            race_result_id: self.race_result_id,
            race_id: self.race_id,
            top_pick_correct: self.top_pick_correct,
            top_pick_position: self.top_pick_position,
            top3_accuracy: self.top3_accuracy,
            rank_correlation: self.rank_correlation,
            confidence_error: self.confidence_error,
            betting_outcome,
            stake: self.stake,
            profit_loss: self.profit_loss,
            validated_at: self.validated_at,
        })
    }
}

/// Repository for validation data
pub struct ValidationRepository {
    conn: Connection,
}

impl ValidationRepository {
    /// Create a new repository, initializing the database if needed
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        create_tables(&conn)?;

        Ok(Self { conn })
    }

    /// Create an in-memory repository (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    // ==================== Insert Operations ====================

    /// Insert a prediction (upsert by id)
    pub fn insert_prediction(&self, prediction: &Prediction) -> Result<()> {
        let rankings = serde_json::to_string(&prediction.predicted_rankings)?;
        self.conn
            .execute(
                r#"
                INSERT INTO predictions
                (id, race_id, predicted_rankings, top_pick, top_pick_confidence, betting_signal)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    race_id = excluded.race_id,
                    predicted_rankings = excluded.predicted_rankings,
                    top_pick = excluded.top_pick,
                    top_pick_confidence = excluded.top_pick_confidence,
                    betting_signal = excluded.betting_signal
                "#,
                params![
                    prediction.id,
                    prediction.race_id,
                    rankings,
                    prediction.top_pick,
                    prediction.top_pick_confidence,
                    prediction.betting_signal.as_ref().map(|s| s.as_str()),
                ],
            )
            .with_context(|| format!("Failed to insert prediction {}", prediction.id))?;
        Ok(())
    }

    /// Insert a race result (upsert by id)
    pub fn insert_result(&self, result: &RaceResult) -> Result<()> {
        let rankings = serde_json::to_string(&result.actual_rankings)?;
        self.conn
            .execute(
                r#"
                INSERT INTO race_results (id, race_id, actual_rankings, winner)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    race_id = excluded.race_id,
                    actual_rankings = excluded.actual_rankings,
                    winner = excluded.winner
                "#,
                params![result.id, result.race_id, rankings, result.winner],
            )
            .with_context(|| format!("Failed to insert result {}", result.id))?;
        Ok(())
    }

    /// Insert an accuracy record. Never overwrites.
    pub fn insert_record(&self, record: &AccuracyRecord) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO accuracy_records
                (id, prediction_id, race_result_id, race_id, top_pick_correct,
                 top_pick_position, top3_accuracy, rank_correlation, confidence_error,
                 betting_outcome, stake, profit_loss, validated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    record.id,
                    record.prediction_id,
                    record.race_result_id,
                    record.race_id,
                    record.top_pick_correct,
                    record.top_pick_position,
                    record.top3_accuracy,
                    record.rank_correlation,
                    record.confidence_error,
                    record.betting_outcome.as_str(),
                    record.stake,
                    record.profit_loss,
                    record.validated_at,
                ],
            )
            .with_context(|| {
                format!(
                    "Failed to insert accuracy record for prediction {} of race {}",
                    record.prediction_id, record.race_id
                )
            })?;
        Ok(())
    }

    // ==================== Query Operations ====================

    /// Get predictions for a race
    pub fn get_predictions_by_race(&self, race_id: &str) -> Result<Vec<Prediction>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, race_id, predicted_rankings, top_pick, top_pick_confidence, betting_signal
            FROM predictions
            WHERE race_id = ?1
            ORDER BY id
            "#,
        )?;

        let rows = stmt
            .query_map([race_id], |row| {
                Ok(PredictionRow {
                    id: row.get(0)?,
                    race_id: row.get(1)?,
                    predicted_rankings: row.get(2)?,
                    top_pick: row.get(3)?,
                    top_pick_confidence: row.get(4)?,
                    betting_signal: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(PredictionRow::into_prediction).collect()
    }

    /// Get the result of a race, if published
    pub fn get_result_by_race(&self, race_id: &str) -> Result<Option<RaceResult>> {
        let row: Option<(String, String, String, String)> = self
            .conn
            .query_row(
                "SELECT id, race_id, actual_rankings, winner FROM race_results WHERE race_id = ?1",
                [race_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        row.map(|(id, race_id, rankings, winner)| -> Result<RaceResult> {
            let actual_rankings = serde_json::from_str(&rankings)
                .with_context(|| format!("Invalid actual_rankings for result {}", id))?;
            Ok(RaceResult {
                id,
                race_id,
                actual_rankings,
                winner,
            })
        })
        .transpose()
    }

    /// Get accuracy records, optionally for a single race
    pub fn get_accuracy_records(&self, race_id: Option<&str>) -> Result<Vec<AccuracyRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, prediction_id, race_result_id, race_id, top_pick_correct,
                   top_pick_position, top3_accuracy, rank_correlation, confidence_error,
                   betting_outcome, stake, profit_loss, validated_at
            FROM accuracy_records
            WHERE ?1 IS NULL OR race_id = ?1
            ORDER BY validated_at, id
            "#,
        )?;

        let rows = stmt
            .query_map(params![race_id], |row| {
                Ok(AccuracyRow {
                    id: row.get(0)?,
                    prediction_id: row.get(1)?,
                    race_result_id: row.get(2)?,
                    race_id: row.get(3)?,
                    top_pick_correct: row.get(4)?,
                    top_pick_position: row.get(5)?,
                    top3_accuracy: row.get(6)?,
                    rank_correlation: row.get(7)?,
                    confidence_error: row.get(8)?,
                    betting_outcome: row.get(9)?,
                    stake: row.get(10)?,
                    profit_loss: row.get(11)?,
                    validated_at: row.get(12)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(AccuracyRow::into_record).collect()
    }

    /// Races with a result and at least one prediction that has no accuracy
    /// record yet
    pub fn get_pending_races(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT p.race_id
            FROM predictions p
            JOIN race_results r ON r.race_id = p.race_id
            WHERE NOT EXISTS (
                SELECT 1 FROM accuracy_records a WHERE a.prediction_id = p.id
            )
            ORDER BY p.race_id
            "#,
        )?;

        let races = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(races)
    }

    /// Get accuracy record count
    pub fn get_record_count(&self) -> Result<i32> {
        let count: i32 = self
            .conn
            .query_row("SELECT COUNT(*) FROM accuracy_records", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl PredictionSource for ValidationRepository {
    fn load_predictions_by_race(&self, race_id: &str) -> Result<Vec<Prediction>, ValidationError> {
        Ok(self.get_predictions_by_race(race_id)?)
    }
}

impl ResultSource for ValidationRepository {
    fn load_result_by_race(&self, race_id: &str) -> Result<Option<RaceResult>, ValidationError> {
        Ok(self.get_result_by_race(race_id)?)
    }
}

impl AccuracySink for ValidationRepository {
    fn insert_accuracy_record(&self, record: &AccuracyRecord) -> Result<(), ValidationError> {
        Ok(self.insert_record(record)?)
    }
}
