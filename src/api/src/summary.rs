//! Aggregate report over stored accuracy records.
//!
//! Rolls per-prediction records up into hit rates, betting ROI and a
//! reliability table of stated confidence against observed top-pick hits.

use serde::Serialize;

use crate::types::{AccuracyRecord, BettingOutcome};

/// Number of equal-width confidence buckets.
const NUM_BUCKETS: usize = 10;

/// Predictions whose stated confidence fell in `[lower, upper)`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceBucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub avg_confidence: f64,
    /// Fraction of top picks that won
    pub hit_rate: f64,
    /// |avg_confidence - hit_rate|
    pub gap: f64,
}

/// Accuracy summary over a set of records.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccuracySummary {
    pub num_records: usize,
    pub num_races: usize,
    pub top_pick_hits: usize,
    pub top3_hits: usize,
    /// Mean over records with a correlation
    pub mean_rank_correlation: Option<f64>,
    pub mean_confidence_error: f64,
    pub num_bets: usize,
    pub num_wins: usize,
    pub net_profit: f64,
    /// Sum of the stakes recorded on each bet
    pub total_staked: f64,
    pub buckets: Vec<ConfidenceBucket>,
    /// Expected calibration error (sample-weighted bucket gap)
    pub ece: f64,
}

impl AccuracySummary {
    /// Build a summary. ROI uses the stake stored on each record, so records
    /// scored under different stake settings can be mixed.
    pub fn from_records(records: &[AccuracyRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let num_records = records.len();
        let mut races: Vec<&str> = records.iter().map(|r| r.race_id.as_str()).collect();
        races.sort_unstable();
        races.dedup();

        let correlations: Vec<f64> = records.iter().filter_map(|r| r.rank_correlation).collect();
        let mean_rank_correlation = if correlations.is_empty() {
            None
        } else {
            Some(correlations.iter().sum::<f64>() / correlations.len() as f64)
        };

        let num_bets = records
            .iter()
            .filter(|r| r.betting_outcome != BettingOutcome::NoBet)
            .count();
        let num_wins = records
            .iter()
            .filter(|r| r.betting_outcome == BettingOutcome::Win)
            .count();

        let buckets = build_buckets(records);
        let ece = buckets
            .iter()
            .map(|b| b.gap * b.count as f64)
            .sum::<f64>()
            / num_records as f64;

        Self {
            num_records,
            num_races: races.len(),
            top_pick_hits: records.iter().filter(|r| r.top_pick_correct).count(),
            top3_hits: records.iter().filter(|r| r.top3_accuracy).count(),
            mean_rank_correlation,
            mean_confidence_error: records.iter().map(|r| r.confidence_error).sum::<f64>()
                / num_records as f64,
            num_bets,
            num_wins,
            net_profit: records.iter().map(|r| r.profit_loss).sum(),
            total_staked: records.iter().map(|r| r.stake).sum(),
            buckets,
            ece,
        }
    }

    pub fn top_pick_rate(&self) -> f64 {
        if self.num_records > 0 {
            self.top_pick_hits as f64 / self.num_records as f64
        } else {
            0.0
        }
    }

    pub fn top3_rate(&self) -> f64 {
        if self.num_records > 0 {
            self.top3_hits as f64 / self.num_records as f64
        } else {
            0.0
        }
    }

    pub fn bet_hit_rate(&self) -> f64 {
        if self.num_bets > 0 {
            self.num_wins as f64 / self.num_bets as f64
        } else {
            0.0
        }
    }

    pub fn roi(&self) -> f64 {
        if self.total_staked > 0.0 {
            self.net_profit / self.total_staked
        } else {
            0.0
        }
    }
}

fn bucket_index(confidence: f64) -> usize {
    ((confidence * NUM_BUCKETS as f64) as usize).min(NUM_BUCKETS - 1)
}

/// Non-empty buckets only, in ascending confidence order.
fn build_buckets(records: &[AccuracyRecord]) -> Vec<ConfidenceBucket> {
    let mut sums = [(0usize, 0.0f64, 0usize); NUM_BUCKETS];

    for record in records {
        let confidence = record.stated_confidence();
        let slot = &mut sums[bucket_index(confidence)];
        slot.0 += 1;
        slot.1 += confidence;
        if record.top_pick_correct {
            slot.2 += 1;
        }
    }

    sums.iter()
        .enumerate()
        .filter(|(_, (count, _, _))| *count > 0)
        .map(|(i, &(count, conf_sum, hits))| {
            let avg_confidence = conf_sum / count as f64;
            let hit_rate = hits as f64 / count as f64;
            ConfidenceBucket {
                lower: i as f64 / NUM_BUCKETS as f64,
                upper: (i + 1) as f64 / NUM_BUCKETS as f64,
                count,
                avg_confidence,
                hit_rate,
                gap: (avg_confidence - hit_rate).abs(),
            }
        })
        .collect()
}

/// Print summary in table format.
pub fn print_summary_table(summary: &AccuracySummary) {
    println!("=== Accuracy Summary ===");
    println!("  Races:               {}", summary.num_races);
    println!("  Predictions:         {}", summary.num_records);
    println!(
        "  Top pick hit rate:   {:.1}% ({}/{})",
        summary.top_pick_rate() * 100.0,
        summary.top_pick_hits,
        summary.num_records
    );
    println!(
        "  Top 3 hit rate:      {:.1}% ({}/{})",
        summary.top3_rate() * 100.0,
        summary.top3_hits,
        summary.num_records
    );
    match summary.mean_rank_correlation {
        Some(rho) => println!("  Mean rank corr.:     {:.4}", rho),
        None => println!("  Mean rank corr.:     n/a"),
    }
    println!("  Mean conf. error:    {:.4}", summary.mean_confidence_error);
    println!();

    println!("=== Simulated Betting ===");
    println!(
        "  Bets:                {} ({} won, {:.1}%)",
        summary.num_bets,
        summary.num_wins,
        summary.bet_hit_rate() * 100.0
    );
    println!("  Staked:              {:.2}", summary.total_staked);
    println!("  Net profit:          {:+.2}", summary.net_profit);
    println!("  ROI:                 {:+.1}%", summary.roi() * 100.0);
    println!();

    if !summary.buckets.is_empty() {
        println!("=== Calibration (ECE {:.4}) ===", summary.ece);
        println!("  {:>11} {:>6} {:>9} {:>9}", "confidence", "n", "stated", "observed");
        for b in &summary.buckets {
            println!(
                "  {:.1} - {:.1} {:>6} {:>8.1}% {:>8.1}%",
                b.lower,
                b.upper,
                b.count,
                b.avg_confidence * 100.0,
                b.hit_rate * 100.0
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(
        race_id: &str,
        correct: bool,
        confidence: f64,
        outcome: BettingOutcome,
        pl: f64,
    ) -> AccuracyRecord {
        AccuracyRecord {
            id: format!("{}-{}", race_id, confidence),
            prediction_id: "p".to_string(),
            race_result_id: "r".to_string(),
            race_id: race_id.to_string(),
            top_pick_correct: correct,
            top_pick_position: Some(if correct { 1 } else { 2 }),
            top3_accuracy: true,
            rank_correlation: None,
            confidence_error: if correct { 1.0 - confidence } else { confidence },
            betting_outcome: outcome,
            stake: if outcome == BettingOutcome::NoBet { 0.0 } else { 10.0 },
            profit_loss: pl,
            validated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_summary() {
        let summary = AccuracySummary::from_records(&[]);
        assert_eq!(summary.num_records, 0);
        assert_eq!(summary.roi(), 0.0);
        assert_eq!(summary.top_pick_rate(), 0.0);
        assert!(summary.mean_rank_correlation.is_none());
        assert!(summary.buckets.is_empty());
    }

    #[test]
    fn test_rates_and_roi() {
        let records = vec![
            record("R1", true, 0.8, BettingOutcome::Win, 15.0),
            record("R1", false, 0.6, BettingOutcome::Loss, -10.0),
            record("R2", false, 0.4, BettingOutcome::NoBet, 0.0),
            record("R3", true, 0.7, BettingOutcome::NoBet, 0.0),
        ];
        let summary = AccuracySummary::from_records(&records);

        assert_eq!(summary.num_records, 4);
        assert_eq!(summary.num_races, 3);
        assert_eq!(summary.top_pick_hits, 2);
        assert!((summary.top_pick_rate() - 0.5).abs() < 1e-9);
        assert_eq!(summary.num_bets, 2);
        assert_eq!(summary.num_wins, 1);
        assert!((summary.net_profit - 5.0).abs() < 1e-9);
        assert!((summary.total_staked - 20.0).abs() < 1e-9);
        assert!((summary.roi() - 0.25).abs() < 1e-9);
        // (0.2 + 0.6 + 0.4 + 0.3) / 4
        assert!((summary.mean_confidence_error - 0.375).abs() < 1e-9);
    }

    #[test]
    fn test_roi_with_mixed_stakes() {
        // Old record scored at 10, newer ones at 50
        let mut old_win = record("R1", true, 0.8, BettingOutcome::Win, 15.0);
        old_win.stake = 10.0;
        let mut new_loss = record("R2", false, 0.6, BettingOutcome::Loss, -50.0);
        new_loss.stake = 50.0;
        let mut new_win = record("R3", true, 0.7, BettingOutcome::Win, 100.0);
        new_win.stake = 50.0;
        let skipped = record("R4", false, 0.3, BettingOutcome::NoBet, 0.0);

        let summary = AccuracySummary::from_records(&[old_win, new_loss, new_win, skipped]);

        assert_eq!(summary.num_bets, 3);
        assert!((summary.total_staked - 110.0).abs() < 1e-9);
        assert!((summary.net_profit - 65.0).abs() < 1e-9);
        assert!((summary.roi() - 65.0 / 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_correlation_skips_missing() {
        let mut a = record("R1", true, 0.5, BettingOutcome::NoBet, 0.0);
        a.rank_correlation = Some(1.0);
        let mut b = record("R2", true, 0.5, BettingOutcome::NoBet, 0.0);
        b.rank_correlation = Some(0.5);
        let c = record("R3", true, 0.5, BettingOutcome::NoBet, 0.0);

        let summary = AccuracySummary::from_records(&[a, b, c]);
        assert!((summary.mean_rank_correlation.unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_buckets() {
        let records = vec![
            record("R1", true, 0.82, BettingOutcome::NoBet, 0.0),
            record("R2", false, 0.88, BettingOutcome::NoBet, 0.0),
            record("R3", false, 0.15, BettingOutcome::NoBet, 0.0),
            record("R4", true, 1.0, BettingOutcome::NoBet, 0.0),
        ];
        let summary = AccuracySummary::from_records(&records);

        assert_eq!(summary.buckets.len(), 3);
        let high = &summary.buckets[1];
        assert_eq!(high.count, 2);
        assert!((high.avg_confidence - 0.85).abs() < 1e-9);
        assert!((high.hit_rate - 0.5).abs() < 1e-9);
        // Confidence 1.0 lands in the last bucket
        assert_eq!(summary.buckets[2].count, 1);
        assert!((summary.buckets[2].lower - 0.9).abs() < 1e-9);

        // (0.35 * 2 + 0.15 * 1 + 0.0 * 1) / 4
        assert!((summary.ece - 0.2125).abs() < 1e-9);
    }
}
