//! Application state for the API server

use crate::ImportOrchestrator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared application state accessible to all route handlers
#[derive(Clone)]
pub struct AppState {
    /// Orchestrator the trigger endpoint drives
    pub orchestrator: Arc<ImportOrchestrator>,

    /// Process shutdown token; runs started over HTTP get a child of it
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new AppState
    pub fn new(orchestrator: Arc<ImportOrchestrator>, shutdown: CancellationToken) -> Self {
        Self {
            orchestrator,
            shutdown,
        }
    }
}
