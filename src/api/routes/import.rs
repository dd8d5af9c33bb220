//! Import trigger and status handlers

use crate::api::AppState;
use crate::error::{Error, Result};
use crate::importer::ImportStatus;
use crate::types::ImportSummary;
use axum::{Json, extract::State};

/// POST /import - Run an import to completion and return its summary
///
/// The run is spawned so a client disconnect does not abort it; only process
/// shutdown cancels it. Responds 409 when another run holds the gate.
pub async fn trigger_import(State(state): State<AppState>) -> Result<Json<ImportSummary>> {
    let orchestrator = state.orchestrator.clone();
    let cancel = state.shutdown.child_token();

    let handle = tokio::spawn(async move { orchestrator.run_import(cancel).await });

    let summary = handle
        .await
        .map_err(|e| Error::Other(format!("import task panicked: {e}")))??;

    Ok(Json(summary))
}

/// GET /import/status - Current state and the last completed summary
pub async fn import_status(State(state): State<AppState>) -> Json<ImportStatus> {
    Json(state.orchestrator.current_status())
}
