//! Process-level wiring of the importer
//!
//! [`ImportService`] owns the orchestrator and the background tasks around
//! it (weekly scheduler, HTTP trigger). Everything hangs off one
//! cancellation token, so [`ImportService::shutdown`] stops the scheduler,
//! the API server and any run either of them started.

use crate::api;
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::importer::ImportOrchestrator;
use crate::persister::RegistryStore;
use crate::scheduler_task::ImportScheduler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long shutdown waits for background tasks before giving up on them
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Orchestrator plus its scheduler and API server
pub struct ImportService {
    config: Arc<Config>,
    db: Option<Arc<Database>>,
    orchestrator: Arc<ImportOrchestrator>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ImportService {
    /// Validate `config`, open the SQLite store and build the orchestrator
    ///
    /// Background tasks are not started until [`start`](Self::start).
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);
        let store: Arc<dyn RegistryStore> = db.clone();
        let orchestrator = Arc::new(ImportOrchestrator::new(config.clone(), store)?);

        Ok(Self {
            config,
            db: Some(db),
            orchestrator,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Build the service around a caller-supplied store instead of SQLite
    pub fn with_store(config: Config, store: Arc<dyn RegistryStore>) -> Result<Self> {
        let config = Arc::new(config);
        let orchestrator = Arc::new(ImportOrchestrator::new(config.clone(), store)?);

        Ok(Self {
            config,
            db: None,
            orchestrator,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// The orchestrator, for running imports directly
    pub fn orchestrator(&self) -> Arc<ImportOrchestrator> {
        self.orchestrator.clone()
    }

    /// The validated configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token cancelled by [`shutdown`](Self::shutdown)
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn the scheduler (when enabled) and the API server
    ///
    /// Fails with [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) was called.
    pub async fn start(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let mut tasks = self.tasks.lock().await;

        if self.config.schedule.enabled {
            let scheduler =
                ImportScheduler::new(self.orchestrator.clone(), self.config.schedule.schedule());
            tasks.push(tokio::spawn(scheduler.run(self.shutdown.clone())));
            tracing::info!("import scheduler background task started");
        } else {
            tracing::info!("schedule disabled, imports run only on demand");
        }

        let listener = tokio::net::TcpListener::bind(self.config.api.bind_address).await?;
        let orchestrator = self.orchestrator.clone();
        let config = self.config.clone();
        let shutdown = self.shutdown.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = api::serve(listener, orchestrator, config, shutdown).await {
                tracing::error!(error = %e, "API server exited with error");
            }
        }));

        Ok(())
    }

    /// Cancel everything, wait for the background tasks and close the store
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("initiating graceful shutdown");
        self.shutdown.cancel();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "background task panicked"),
                Err(_) => tracing::warn!("timeout waiting for background task, abandoning it"),
            }
        }

        if let Some(db) = &self.db {
            db.close().await;
            tracing::info!("database closed");
        }

        tracing::info!("graceful shutdown complete");
        Ok(())
    }
}

impl std::fmt::Debug for ImportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportService")
            .field("bind_address", &self.config.api.bind_address)
            .field("schedule_enabled", &self.config.schedule.enabled)
            .field("shutting_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}
