//! Custom assertions over import summaries

use rnc_importer::{ImportState, ImportSummary};

/// Assert the run finished cleanly with the given line counts
pub fn assert_done(summary: &ImportSummary, lines_read: u64, parsed_ok: u64, parsed_failed: u64) {
    assert_eq!(
        summary.state,
        ImportState::Done,
        "expected Done, got {:?} ({:?})",
        summary.state,
        summary.failure
    );
    assert!(summary.failure.is_none());
    assert_eq!(summary.lines_read, lines_read, "lines_read");
    assert_eq!(summary.parsed_ok, parsed_ok, "parsed_ok");
    assert_eq!(summary.parsed_failed, parsed_failed, "parsed_failed");
}

/// Assert the batch counters add up
pub fn assert_batches_consistent(summary: &ImportSummary) {
    assert_eq!(
        summary.batches_attempted,
        summary.batches_committed + summary.batches_failed
    );
    assert_eq!(summary.batch_failures.len() as u64, summary.batches_failed);
    assert!(summary.parse_failures.len() as u64 <= summary.parsed_failed);
}
