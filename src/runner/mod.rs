//! Test orchestration
//!
//! Runs the parse → open → play → measure → release pipeline across a test
//! plan on one dedicated worker thread, keeping the triggering/display
//! context free. Rounds execute strictly sequentially: the output device is
//! a single-consumer resource and drift measurement assumes exclusive access
//! to its clock.
//!
//! Results are handed to the display side through a `crossbeam_channel`
//! sender in strict plan order (file order, then round order). A failed
//! round produces a failure entry and the plan continues with the next
//! round; nothing is shared between rounds, so an error never corrupts
//! later measurements.

pub mod log;
pub mod plan;

use crate::audio::output::{OpenRequest, OutputFactory};
use crate::audio::player::{PlaybackError, Player};
use crate::config::RunConfig;
use crate::drift::TimingResult;
use crate::runner::plan::{PlanEntry, TestPlan};
use crate::wav::parser::{self, ParseOptions, WavError};
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use std::fs::File;
use std::io::BufReader;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort a single round
#[derive(Error, Debug)]
pub enum RoundError {
    #[error("cannot open file: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wav(#[from] WavError),

    #[error("cannot open output device: {0}")]
    Device(#[from] crate::audio::output::DeviceError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Outcome of one playback round
#[derive(Debug, Clone)]
pub enum RoundOutcome {
    /// Round completed and was timed
    Timing(TimingResult),
    /// Round aborted; the message describes the error
    Failed(String),
}

/// One result-sink entry, emitted per round in strict plan order
#[derive(Debug, Clone)]
pub struct TestResultEntry {
    /// Name of the source file
    pub file_name: String,
    /// Zero-based round index within the plan entry
    pub round_index: u32,
    /// Human-readable round summary
    pub summary: String,
    /// Structured outcome
    pub outcome: RoundOutcome,
    /// When the round finished
    pub timestamp: DateTime<Utc>,
}

/// Handle to the worker thread running a test plan
pub struct RunnerHandle {
    thread: Option<std::thread::JoinHandle<()>>,
}

impl RunnerHandle {
    /// Wait for the plan to finish
    pub fn join(mut self) {
        if let Some(h) = self.thread.take() {
            let _ = h.join();
        }
    }

    /// Check if the worker is still running
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for RunnerHandle {
    fn drop(&mut self) {
        if let Some(h) = self.thread.take() {
            let _ = h.join();
        }
    }
}

/// Test orchestrator
///
/// Owns the run configuration; [`Runner::spawn`] moves the plan and the
/// device factory onto a dedicated worker thread and returns the receiving
/// end of the result channel.
pub struct Runner {
    config: RunConfig,
}

impl Runner {
    /// Create a runner with the given configuration
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Spawn the worker thread executing the plan
    ///
    /// # Arguments
    /// * `plan` - Ordered (file, rounds, mode) entries, read once
    /// * `factory` - Opens one fresh output device per round
    ///
    /// # Returns
    /// A handle to the worker and the receiver carrying one
    /// [`TestResultEntry`] per round, in plan order
    pub fn spawn<F>(self, plan: TestPlan, factory: F) -> (RunnerHandle, Receiver<TestResultEntry>)
    where
        F: OutputFactory + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded::<TestResultEntry>();

        let thread = std::thread::Builder::new()
            .name("drift-runner".into())
            .spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    self.run_plan(&plan, &factory, &tx);
                }));
                match result {
                    Ok(()) => tracing::info!("Runner thread exited normally"),
                    Err(panic_info) => {
                        let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                            s.to_string()
                        } else if let Some(s) = panic_info.downcast_ref::<String>() {
                            s.clone()
                        } else {
                            "unknown panic".to_string()
                        };
                        tracing::error!(panic = %msg, "Runner thread PANICKED");
                    }
                }
            })
            .expect("Failed to spawn runner thread");

        (
            RunnerHandle {
                thread: Some(thread),
            },
            rx,
        )
    }

    fn run_plan(&self, plan: &TestPlan, factory: &dyn OutputFactory, tx: &Sender<TestResultEntry>) {
        tracing::info!(
            entries = plan.entries.len(),
            total_rounds = plan.total_rounds(),
            "Test plan started"
        );

        for entry in &plan.entries {
            tracing::info!(
                file = %entry.path.display(),
                mode = %entry.mode,
                rounds = entry.rounds,
                "Testing file"
            );

            for round in 0..entry.rounds {
                let outcome = match self.run_round(entry, factory) {
                    Ok(result) => RoundOutcome::Timing(result),
                    Err(e) => {
                        tracing::warn!(
                            file = %entry.path.display(),
                            round,
                            error = %e,
                            "Round failed"
                        );
                        RoundOutcome::Failed(e.to_string())
                    }
                };

                let summary = match &outcome {
                    RoundOutcome::Timing(result) => result.summary(),
                    RoundOutcome::Failed(msg) => format!("failed: {}", msg),
                };

                let sent = tx.send(TestResultEntry {
                    file_name: entry.file_name(),
                    round_index: round,
                    summary,
                    outcome,
                    timestamp: Utc::now(),
                });
                // Receiver gone means the display context went away;
                // finishing the plan would measure into the void
                if sent.is_err() {
                    tracing::warn!("Result receiver dropped, abandoning plan");
                    return;
                }
            }
        }

        tracing::info!("Test plan finished");
    }

    /// Run one fully independent round: open, parse, play, measure, release
    ///
    /// Everything the round owns (file handle, device, buffers) is dropped
    /// when this returns, so round-to-round state never accumulates.
    fn run_round(
        &self,
        entry: &PlanEntry,
        factory: &dyn OutputFactory,
    ) -> Result<TimingResult, RoundError> {
        let file = File::open(&entry.path)?;
        let mut reader = BufReader::new(file);

        let options = ParseOptions {
            pad_odd_chunks: self.config.pad_odd_chunks,
        };
        let (format, region) = parser::parse(&mut reader, options)?;

        let mut device = factory.open(&OpenRequest {
            format,
            mode: entry.mode,
            total_frames: region.frame_count(&format),
        })?;

        let player = Player::new(
            Duration::from_millis(self.config.poll_interval_ms),
            Duration::from_secs(self.config.max_wait_margin_secs),
        );
        let result = player.play(device.as_mut(), &mut reader, &format, &region, entry.mode)?;
        Ok(result)
    }
}
