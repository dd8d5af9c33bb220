//! Test configuration helpers: mock registry server and SQLite-backed orchestrators

use rnc_importer::{Config, Database, ImportOrchestrator, RegistryStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock server publishes the archive under
pub const ARCHIVE_PATH: &str = "/dgii/rnc.zip";

/// An orchestrator writing to a temporary SQLite file
pub struct TestImporter {
    /// The orchestrator under test
    pub orchestrator: Arc<ImportOrchestrator>,
    /// Direct handle on the store for assertions
    pub db: Arc<Database>,
    /// Keeps the database file alive
    pub temp_dir: TempDir,
}

/// Configuration pointing at `server` with fast retries
pub fn test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.source.url = format!("{}{ARCHIVE_PATH}", server.uri());
    config.source.fetch_timeout = Duration::from_secs(5);
    config.retry.max_attempts = 2;
    config.retry.initial_delay = Duration::from_millis(10);
    config.retry.max_delay = Duration::from_millis(50);
    config.retry.jitter = false;
    config.schedule.enabled = false;
    config
}

/// Build an orchestrator over a fresh SQLite store
pub async fn create_test_importer(config: Config) -> TestImporter {
    let temp_dir = tempfile::tempdir().unwrap();
    let db = Arc::new(
        Database::new(&temp_dir.path().join("registry.db"))
            .await
            .unwrap(),
    );
    let store: Arc<dyn RegistryStore> = db.clone();
    let orchestrator = Arc::new(ImportOrchestrator::new(Arc::new(config), store).unwrap());

    TestImporter {
        orchestrator,
        db,
        temp_dir,
    }
}

/// Serve `archive` at [`ARCHIVE_PATH`]
pub async fn serve_archive(server: &MockServer, archive: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .mount(server)
        .await;
}
