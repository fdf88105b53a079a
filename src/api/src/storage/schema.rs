//! SQLite schema definitions for validation data
//!
//! Tables:
//! - predictions: Forecasts to validate, rankings stored as JSON
//! - race_results: Official results, one per race
//! - accuracy_records: One row per scored prediction per run

use rusqlite::{Connection, Result};

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS predictions (
            id TEXT PRIMARY KEY,
            race_id TEXT NOT NULL,
            predicted_rankings TEXT NOT NULL,
            top_pick TEXT NOT NULL,
            top_pick_confidence REAL NOT NULL,
            betting_signal TEXT,
            created_at TEXT DEFAULT (datetime('now'))
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS race_results (
            id TEXT PRIMARY KEY,
            race_id TEXT NOT NULL UNIQUE,
            actual_rankings TEXT NOT NULL,
            winner TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now'))
        )
        "#,
        [],
    )?;

    // No uniqueness on prediction_id: re-running a race inserts new rows
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS accuracy_records (
            id TEXT PRIMARY KEY,
            prediction_id TEXT NOT NULL REFERENCES predictions(id),
            race_result_id TEXT NOT NULL REFERENCES race_results(id),
            race_id TEXT NOT NULL,
            top_pick_correct INTEGER NOT NULL,
            top_pick_position INTEGER,
            top3_accuracy INTEGER NOT NULL,
            rank_correlation REAL,
            confidence_error REAL NOT NULL,
            betting_outcome TEXT NOT NULL,
            stake REAL NOT NULL DEFAULT 0,
            profit_loss REAL NOT NULL,
            validated_at TEXT NOT NULL
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_predictions_race ON predictions(race_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accuracy_race ON accuracy_records(race_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accuracy_prediction ON accuracy_records(prediction_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('predictions', 'race_results', 'accuracy_records')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_create_tables_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }
}
