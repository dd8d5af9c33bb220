//! Per-run bookkeeping that becomes the [`ImportSummary`].

use super::stream::StreamOutput;
use crate::error::PersistError;
use crate::types::{ImportState, ImportSummary, RunFailure};
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Counters for one run, finished into an [`ImportSummary`]
pub(crate) struct RunTracker {
    summary: ImportSummary,
    started: Instant,
}

impl RunTracker {
    pub(crate) fn new(run_id: u64) -> Self {
        let now = Utc::now();
        Self {
            summary: ImportSummary {
                run_id,
                state: ImportState::Fetching,
                failure: None,
                entry: None,
                started_at: now,
                finished_at: now,
                elapsed: Duration::ZERO,
                lines_read: 0,
                blank_lines: 0,
                parsed_ok: 0,
                parsed_failed: 0,
                parse_failures: Vec::new(),
                batches_attempted: 0,
                batches_committed: 0,
                batches_failed: 0,
                batch_failures: Vec::new(),
                records_committed: 0,
            },
            started: Instant::now(),
        }
    }

    pub(crate) fn run_id(&self) -> u64 {
        self.summary.run_id
    }

    pub(crate) fn set_entry(&mut self, entry: crate::types::ArchiveEntry) {
        self.summary.entry = Some(entry);
    }

    /// Outcome of one persist call
    pub(crate) fn record_batch(&mut self, outcome: Result<u64, PersistError>) {
        self.summary.batches_attempted += 1;
        match outcome {
            Ok(written) => {
                self.summary.batches_committed += 1;
                self.summary.records_committed += written;
            }
            Err(failure) => {
                self.summary.batches_failed += 1;
                self.summary.batch_failures.push(failure);
            }
        }
    }

    /// Fold in the producer's line counters
    pub(crate) fn absorb(&mut self, output: &mut StreamOutput) {
        self.summary.lines_read = output.lines_read;
        self.summary.blank_lines = output.blank_lines;
        self.summary.parsed_ok = output.parsed_ok;
        self.summary.parsed_failed = output.parsed_failed;
        self.summary.parse_failures = std::mem::take(&mut output.parse_failures);
    }

    /// Stamp the terminal state and log the summary
    pub(crate) fn finish(mut self, state: ImportState, failure: Option<RunFailure>) -> ImportSummary {
        self.summary.state = state;
        self.summary.failure = failure;
        self.summary.finished_at = Utc::now();
        self.summary.elapsed = self.started.elapsed();

        log_summary(&self.summary);
        self.summary
    }
}

fn log_summary(summary: &ImportSummary) {
    info!(
        run_id = summary.run_id,
        state = ?summary.state,
        entry = summary.entry.as_ref().map(|e| e.name.as_str()).unwrap_or("-"),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        lines_read = summary.lines_read,
        blank_lines = summary.blank_lines,
        parsed_ok = summary.parsed_ok,
        parsed_failed = summary.parsed_failed,
        batches_attempted = summary.batches_attempted,
        batches_committed = summary.batches_committed,
        batches_failed = summary.batches_failed,
        records_committed = summary.records_committed,
        "import run finished"
    );

    if let Some(failure) = &summary.failure {
        error!(run_id = summary.run_id, %failure, "import run failed");
    }

    for failure in &summary.batch_failures {
        warn!(run_id = summary.run_id, %failure, "batch not committed");
    }

    if summary.needs_attention() {
        warn!(
            run_id = summary.run_id,
            lines_read = summary.lines_read,
            "import finished without committing any batch"
        );
    }
}
