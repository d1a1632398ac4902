//! In-order result log with per-file aggregates
//!
//! The display context drains the runner's result channel into this log.
//! Entries keep strict insertion order (test-plan order); aggregates track
//! drift spread per file for the end-of-run summary.

use crate::runner::{RoundOutcome, TestResultEntry};

/// Aggregated drift statistics for one (file, mode) plan entry
#[derive(Debug, Clone)]
pub struct DriftStats {
    /// File name the rounds were tagged with
    pub file_name: String,
    /// Number of successfully timed rounds
    pub timed_rounds: u32,
    /// Number of failed rounds
    pub failed_rounds: u32,
    /// Minimum observed drift (ppm)
    pub min_ppm: f64,
    /// Maximum observed drift (ppm)
    pub max_ppm: f64,
    /// Mean drift across timed rounds (ppm)
    pub mean_ppm: f64,
    /// Sum of drift values, kept for incremental mean
    sum_ppm: f64,
}

impl DriftStats {
    fn new(file_name: String) -> Self {
        Self {
            file_name,
            timed_rounds: 0,
            failed_rounds: 0,
            min_ppm: f64::MAX,
            max_ppm: f64::MIN,
            mean_ppm: 0.0,
            sum_ppm: 0.0,
        }
    }

    fn record_drift(&mut self, ppm: f64) {
        self.timed_rounds += 1;
        self.min_ppm = self.min_ppm.min(ppm);
        self.max_ppm = self.max_ppm.max(ppm);
        self.sum_ppm += ppm;
        self.mean_ppm = self.sum_ppm / self.timed_rounds as f64;
    }
}

/// Append-only, insertion-ordered result log
#[derive(Debug, Default)]
pub struct ResultLog {
    entries: Vec<TestResultEntry>,
    stats: Vec<DriftStats>,
}

impl ResultLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, updating the per-file aggregates
    pub fn append(&mut self, entry: TestResultEntry) {
        let idx = match self
            .stats
            .iter()
            .position(|s| s.file_name == entry.file_name)
        {
            Some(i) => i,
            None => {
                self.stats.push(DriftStats::new(entry.file_name.clone()));
                self.stats.len() - 1
            }
        };
        let stats = &mut self.stats[idx];

        match &entry.outcome {
            RoundOutcome::Timing(result) => stats.record_drift(result.drift_ppm),
            RoundOutcome::Failed(_) => stats.failed_rounds += 1,
        }

        self.entries.push(entry);
    }

    /// All entries in insertion order
    pub fn entries(&self) -> &[TestResultEntry] {
        &self.entries
    }

    /// Per-file aggregates in first-seen order
    pub fn stats(&self) -> &[DriftStats] {
        &self.stats
    }

    /// Number of entries logged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::TimingResult;
    use chrono::Utc;

    fn timing_entry(file: &str, round: u32, ppm: f64) -> TestResultEntry {
        let result = TimingResult {
            actual_seconds: 1.0,
            expected_seconds: 1.0,
            drift_ppm: ppm,
        };
        TestResultEntry {
            file_name: file.to_string(),
            round_index: round,
            summary: result.summary(),
            outcome: RoundOutcome::Timing(result),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut log = ResultLog::new();
        log.append(timing_entry("a.wav", 0, 10.0));
        log.append(timing_entry("b.wav", 0, 20.0));
        log.append(timing_entry("a.wav", 1, 30.0));

        let names: Vec<_> = log.entries().iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, ["a.wav", "b.wav", "a.wav"]);
    }

    #[test]
    fn test_drift_aggregates() {
        let mut log = ResultLog::new();
        log.append(timing_entry("a.wav", 0, 100.0));
        log.append(timing_entry("a.wav", 1, 200.0));
        log.append(timing_entry("a.wav", 2, 300.0));

        let stats = &log.stats()[0];
        assert_eq!(stats.timed_rounds, 3);
        assert_eq!(stats.min_ppm, 100.0);
        assert_eq!(stats.max_ppm, 300.0);
        assert!((stats.mean_ppm - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_rounds_counted_separately() {
        let mut log = ResultLog::new();
        log.append(timing_entry("a.wav", 0, 50.0));
        log.append(TestResultEntry {
            file_name: "a.wav".to_string(),
            round_index: 1,
            summary: "failed: no data chunk found before end of file".to_string(),
            outcome: RoundOutcome::Failed("no data chunk found before end of file".to_string()),
            timestamp: Utc::now(),
        });

        let stats = &log.stats()[0];
        assert_eq!(stats.timed_rounds, 1);
        assert_eq!(stats.failed_rounds, 1);
        assert_eq!(stats.mean_ppm, 50.0);
    }
}
