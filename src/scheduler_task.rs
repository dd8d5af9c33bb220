//! Weekly import trigger
//!
//! Sleeps until the next configured slot, runs one import and repeats until
//! the shutdown token fires. A slot that finds another run in progress is
//! skipped with a warning; the next one is a week later.
//!
//! # Example
//!
//! ```no_run
//! use rnc_importer::{Config, Database, ImportOrchestrator};
//! use rnc_importer::scheduler_task::ImportScheduler;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(Config::default());
//! let db = Arc::new(Database::new(&config.persistence.database_path).await?);
//! let orchestrator = Arc::new(ImportOrchestrator::new(config.clone(), db)?);
//!
//! let shutdown = CancellationToken::new();
//! let scheduler = ImportScheduler::new(orchestrator, config.schedule.schedule());
//! tokio::spawn(scheduler.run(shutdown.clone()));
//! # Ok(())
//! # }
//! ```

use crate::error::Error;
use crate::importer::ImportOrchestrator;
use crate::scheduler::ImportSchedule;
use crate::types::ImportSummary;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Background task running the import on a weekly schedule
pub struct ImportScheduler {
    orchestrator: Arc<ImportOrchestrator>,
    schedule: ImportSchedule,
}

impl ImportScheduler {
    /// Creates a new scheduler for `orchestrator`
    pub fn new(orchestrator: Arc<ImportOrchestrator>, schedule: ImportSchedule) -> Self {
        Self {
            orchestrator,
            schedule,
        }
    }

    /// Run until `shutdown` is cancelled
    ///
    /// Cancelling `shutdown` also cancels an import started by this task.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(day = ?self.schedule.day, time = %self.schedule.time, "import scheduler started");

        loop {
            let now = Utc::now();
            let next = self.schedule.next_run_after(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next, "next scheduled import");

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(wait) => {
                    self.trigger(shutdown.child_token()).await;
                }
            }

            if shutdown.is_cancelled() {
                break;
            }
        }

        info!("import scheduler stopped");
    }

    /// Run one scheduled import, logging instead of propagating errors
    pub async fn trigger(&self, cancel: CancellationToken) -> Option<ImportSummary> {
        info!("scheduled import triggered");
        match self.orchestrator.run_import(cancel).await {
            Ok(summary) => Some(summary),
            Err(Error::ImportAlreadyRunning) => {
                warn!("scheduled import skipped: another run is active");
                None
            }
            Err(e) => {
                error!(error = %e, "scheduled import crashed");
                None
            }
        }
    }
}
