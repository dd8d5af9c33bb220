//! Core types shared across the import pipeline

use crate::error::{DecodeError, FetchError, LocateError, ParseError, PersistError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One taxpayer parsed from a registry line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    /// Taxpayer registration number (RNC/cédula); the natural key
    pub registration_number: String,
    /// Registered legal name
    pub legal_name: String,
    /// Trade name (may be empty)
    pub trade_name: String,
    /// Economic activity description (may be empty)
    pub activity_description: String,
    /// Date operations started; `None` when the source field is blank
    pub operations_start_date: Option<NaiveDate>,
    /// Registry status text (e.g. "ACTIVO")
    pub status: String,
    /// Payment regime text, when the source line carries it
    pub payment_regime: Option<String>,
}

/// Stage of an import run
///
/// `Idle → Fetching → Locating → Decoding → Streaming → Finalizing → Done`,
/// with `Failed` and `Cancelled` as the other terminal states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    /// No run has started (or the last one finished)
    #[default]
    Idle,
    /// Downloading the archive
    Fetching,
    /// Opening the container and selecting the registry entry
    Locating,
    /// Initializing the secondary codec
    Decoding,
    /// Parsing lines and committing batches
    Streaming,
    /// Flushing the partial final batch and building the summary
    Finalizing,
    /// Input exhausted, summary produced
    Done,
    /// Aborted by an unrecoverable error
    Failed,
    /// Aborted by the cancellation token
    Cancelled,
}

impl ImportState {
    /// Whether a run in this state has ended
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ImportState::Done | ImportState::Failed | ImportState::Cancelled
        )
    }

    /// Whether a run in this state holds the import gate
    pub fn is_active(self) -> bool {
        !self.is_terminal() && self != ImportState::Idle
    }
}

/// Reason a run ended in [`ImportState::Failed`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "error", rename_all = "snake_case")]
pub enum RunFailure {
    /// The archive could not be downloaded
    Fetch(FetchError),
    /// The registry entry could not be found or opened
    Locate(LocateError),
    /// The registry entry could not be decoded
    Decode(DecodeError),
    /// A pipeline task panicked or was aborted
    Internal(String),
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunFailure::Fetch(e) => write!(f, "fetch failed: {e}"),
            RunFailure::Locate(e) => write!(f, "locate failed: {e}"),
            RunFailure::Decode(e) => write!(f, "decode failed: {e}"),
            RunFailure::Internal(reason) => write!(f, "internal failure: {reason}"),
        }
    }
}

/// Handle describing the registry entry selected inside the archive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Full entry path inside the container
    pub name: String,
    /// Position of the entry in the container's directory
    pub index: usize,
    /// Stored (compressed) size in bytes
    pub compressed_size: u64,
    /// Size after container decompression, before any secondary codec
    pub size: u64,
}

/// A line that was skipped because it could not be parsed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    /// One-based line number within the entry
    pub line_number: u64,
    /// Why the line was rejected
    pub error: ParseError,
}

/// Outcome of one import run, returned and logged on every terminal state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Process-local run counter
    pub run_id: u64,
    /// Terminal state
    pub state: ImportState,
    /// Why the run failed, when `state` is `Failed`
    pub failure: Option<RunFailure>,
    /// Selected archive entry, once located
    pub entry: Option<ArchiveEntry>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run reached its terminal state
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration of the run
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    /// Non-blank lines read from the entry
    pub lines_read: u64,
    /// Blank lines skipped without parsing
    pub blank_lines: u64,
    /// Lines converted into records
    pub parsed_ok: u64,
    /// Lines rejected by the parser
    pub parsed_failed: u64,
    /// First rejected lines (capped by `import.max_failure_samples`)
    pub parse_failures: Vec<ParseFailure>,
    /// Batches handed to the storage collaborator
    pub batches_attempted: u64,
    /// Batches committed
    pub batches_committed: u64,
    /// Batches rejected
    pub batches_failed: u64,
    /// Every rejected batch with its key range
    pub batch_failures: Vec<PersistError>,
    /// Records written by committed batches
    pub records_committed: u64,
}

impl ImportSummary {
    /// A finished run that committed nothing deserves an alert even though it did not fail
    pub fn needs_attention(&self) -> bool {
        self.state == ImportState::Done && self.batches_committed == 0
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
