//! # rnc-importer
//!
//! Bulk importer for the DGII taxpayer registry (RNC).
//!
//! The registry is published as a ZIP archive holding one pipe-delimited text
//! entry, optionally compressed a second time (`.xz`, `.gz`, `.bz2`). An
//! import run downloads the archive, selects the entry, decodes it as a
//! stream, parses each line into a [`RegistryRecord`] and upserts fixed-size
//! batches into a [`RegistryStore`]. Malformed lines and rejected batches are
//! counted and reported in the run's [`ImportSummary`] without aborting it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rnc_importer::{Config, ImportService, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ImportService::new(Config::default()).await?;
//!
//!     // Run one import right away instead of waiting for the weekly slot
//!     let summary = service
//!         .orchestrator()
//!         .run_import(service.shutdown_token().child_token())
//!         .await?;
//!     println!("committed {} records", summary.records_committed);
//!
//!     // Serve the trigger API and the weekly schedule until SIGTERM/SIGINT
//!     run_with_shutdown(service).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP trigger API
pub mod api;
/// ZIP container inspection
pub mod archive;
/// Configuration types
pub mod config;
/// SQLite registry store
pub mod db;
/// Secondary codec selection
pub mod decompress;
/// Error types
pub mod error;
/// Archive download
pub mod fetcher;
/// Import run orchestration
pub mod importer;
/// Registry line parsing
pub mod parser;
/// Batch accumulation and persistence
pub mod persister;
/// Retry logic with exponential backoff
pub mod retry;
/// Weekly schedule computation
pub mod scheduler;
/// Scheduler task execution
pub mod scheduler_task;
/// Process-level service wiring
pub mod service;
/// Core types
pub mod types;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{
    ApiError, DatabaseError, DecodeError, Error, ErrorDetail, FetchError, LocateError, ParseError, PersistError,
    Result, ToHttpStatus,
};
pub use importer::{ImportOrchestrator, ImportStatus};
pub use persister::RegistryStore;
pub use scheduler::{ImportSchedule, Weekday};
pub use service::ImportService;
pub use types::{ImportState, ImportSummary, RegistryRecord, RunFailure};

/// Helper function to run the service with graceful signal handling.
///
/// Starts the service's background tasks, waits for a termination signal and
/// then calls [`ImportService::shutdown`], which also cancels a run in progress.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use rnc_importer::{Config, ImportService, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = ImportService::new(Config::default()).await?;
///     run_with_shutdown(service).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: ImportService) -> Result<()> {
    service.start().await?;
    wait_for_signal().await;
    service.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
