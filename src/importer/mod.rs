//! Import orchestration: fetch → locate → decode → parse → batch → persist.
//!
//! One [`ImportOrchestrator`] serves a process. It lets a single run proceed at
//! a time, publishes its progress on a `watch` channel and returns an
//! [`ImportSummary`] for every run that reaches a terminal state.
//!
//! Decoding and parsing run on a blocking worker; parsed batches cross a
//! bounded channel to the async persister, which is the only backpressure
//! point. Batches are committed in the order they were parsed.

mod run;
mod stream;

use crate::archive::ArchiveLocator;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::persister::{BatchPersister, RegistryStore};
use crate::retry::retry_with_backoff;
use crate::types::{ImportState, ImportSummary, RegistryRecord, RunFailure};
use run::RunTracker;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use stream::{StreamParams, stream_entry};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Observable state of the orchestrator
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ImportStatus {
    /// Stage of the current run, or the terminal state of the last one
    pub state: ImportState,
    /// Id of the current or last run
    pub run_id: Option<u64>,
    /// Summary of the last finished run
    pub last_summary: Option<ImportSummary>,
}

impl ImportStatus {
    /// Whether a run currently holds the gate
    pub fn is_running(&self) -> bool {
        self.state.is_active()
    }
}

/// Drives registry import runs against a storage collaborator
pub struct ImportOrchestrator {
    config: Arc<Config>,
    fetcher: Fetcher,
    locator: ArchiveLocator,
    persister: BatchPersister,
    gate: Mutex<()>,
    status_tx: watch::Sender<ImportStatus>,
    run_counter: AtomicU64,
}

impl ImportOrchestrator {
    /// Create an orchestrator writing through `store`
    ///
    /// Fails when the configuration does not validate or the HTTP client
    /// cannot be built.
    pub fn new(config: Arc<Config>, store: Arc<dyn RegistryStore>) -> Result<Self> {
        config.validate()?;

        let fetcher = Fetcher::new(config.source.fetch_timeout)?;
        let locator = ArchiveLocator::new(config.source.entry_path.clone());
        let (status_tx, _) = watch::channel(ImportStatus::default());

        Ok(Self {
            config,
            fetcher,
            locator,
            persister: BatchPersister::new(store),
            gate: Mutex::new(()),
            status_tx,
            run_counter: AtomicU64::new(0),
        })
    }

    /// Subscribe to state changes
    pub fn status(&self) -> watch::Receiver<ImportStatus> {
        self.status_tx.subscribe()
    }

    /// Snapshot of the current state
    pub fn current_status(&self) -> ImportStatus {
        self.status_tx.borrow().clone()
    }

    /// Configuration this orchestrator runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one import to completion
    ///
    /// Returns `Err(Error::ImportAlreadyRunning)` immediately when another run
    /// holds the gate. Fetch, locate and decode failures, cancellation and
    /// rejected batches are all reported through the returned summary; only
    /// a crashed pipeline task surfaces as another `Err`.
    pub async fn run_import(&self, cancel: CancellationToken) -> Result<ImportSummary> {
        let _gate = self
            .gate
            .try_lock()
            .map_err(|_| Error::ImportAlreadyRunning)?;

        let run_id = self.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut tracker = RunTracker::new(run_id);
        info!(run_id, url = %self.config.source.url, "import run started");

        // Fetching
        self.set_state(run_id, ImportState::Fetching);
        let url = self.config.source.url.as_str();
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = retry_with_backoff(&self.config.retry, || self.fetcher.fetch(url)) => Some(result),
        };
        let bytes = match fetched {
            None => return Ok(self.finish(tracker, ImportState::Cancelled, None)),
            Some(Err(e)) => {
                return Ok(self.finish(tracker, ImportState::Failed, Some(RunFailure::Fetch(e))));
            }
            Some(Ok(bytes)) => bytes,
        };

        // Locating
        self.set_state(run_id, ImportState::Locating);
        let located = match self.locator.locate(bytes) {
            Ok(located) => located,
            Err(e) => {
                return Ok(self.finish(tracker, ImportState::Failed, Some(RunFailure::Locate(e))));
            }
        };
        tracker.set_entry(located.entry().clone());

        if cancel.is_cancelled() {
            return Ok(self.finish(tracker, ImportState::Cancelled, None));
        }

        // Decoding
        self.set_state(run_id, ImportState::Decoding);
        let (batch_tx, mut batch_rx) =
            mpsc::channel::<Vec<RegistryRecord>>(self.config.import.queue_capacity);
        let (ready_tx, ready_rx) = oneshot::channel();
        let params = StreamParams {
            run_id,
            batch_size: self.config.import.batch_size,
            max_failure_samples: self.config.import.max_failure_samples,
            cancel: cancel.clone(),
        };
        let producer =
            tokio::task::spawn_blocking(move || stream_entry(located, params, batch_tx, ready_tx));

        match ready_rx.await {
            Ok(Ok(codec)) => debug!(run_id, %codec, "registry entry decoding"),
            Ok(Err(failure)) => {
                let _ = producer.await;
                return Ok(self.finish(tracker, ImportState::Failed, Some(failure)));
            }
            Err(_) => {
                let reason = match producer.await {
                    Err(e) => format!("import producer crashed: {e}"),
                    Ok(_) => "import producer exited before decoding started".to_string(),
                };
                return Err(self.fail_internal(tracker, reason));
            }
        }

        // Streaming
        self.set_state(run_id, ImportState::Streaming);
        let mut batch_index = 0u64;
        let mut cancelled = false;
        loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                batch = batch_rx.recv() => batch,
            };
            let Some(batch) = batch else { break };

            let outcome = self.persister.persist(batch_index, &batch).await;
            tracker.record_batch(outcome);
            batch_index += 1;
        }

        // Unblocks a producer waiting on a full channel
        drop(batch_rx);
        let mut output = match producer.await {
            Ok(output) => output,
            Err(e) => return Err(self.fail_internal(tracker, format!("import producer crashed: {e}"))),
        };
        tracker.absorb(&mut output);

        if cancelled || cancel.is_cancelled() {
            return Ok(self.finish(tracker, ImportState::Cancelled, None));
        }

        // Finalizing
        self.set_state(run_id, ImportState::Finalizing);
        if let Some(rest) = output.remainder.take() {
            let outcome = self.persister.persist(batch_index, &rest).await;
            tracker.record_batch(outcome);
        }

        match output.interrupted {
            Some(e) => Ok(self.finish(tracker, ImportState::Failed, Some(RunFailure::Decode(e)))),
            None => Ok(self.finish(tracker, ImportState::Done, None)),
        }
    }

    fn set_state(&self, run_id: u64, state: ImportState) {
        debug!(run_id, ?state, "import state");
        self.status_tx.send_modify(|status| {
            status.state = state;
            status.run_id = Some(run_id);
        });
    }

    fn finish(
        &self,
        tracker: RunTracker,
        state: ImportState,
        failure: Option<RunFailure>,
    ) -> ImportSummary {
        let run_id = tracker.run_id();
        let summary = tracker.finish(state, failure);
        self.status_tx.send_replace(ImportStatus {
            state,
            run_id: Some(run_id),
            last_summary: Some(summary.clone()),
        });
        summary
    }

    fn fail_internal(&self, tracker: RunTracker, reason: String) -> Error {
        self.finish(
            tracker,
            ImportState::Failed,
            Some(RunFailure::Internal(reason.clone())),
        );
        Error::Other(reason)
    }
}

impl std::fmt::Debug for ImportOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportOrchestrator")
            .field("url", &self.config.source.url)
            .field("entry", &self.locator.target())
            .finish_non_exhaustive()
    }
}
