use super::*;
use crate::persister::RegistryStore;
use crate::test_helpers::{build_zip, create_test_db, registry_line};
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    orchestrator: Arc<ImportOrchestrator>,
    config: Arc<Config>,
    _temp_dir: TempDir,
}

impl Harness {
    fn router(&self) -> Router {
        create_router(
            self.orchestrator.clone(),
            self.config.clone(),
            CancellationToken::new(),
        )
    }
}

async fn harness(server: &MockServer) -> Harness {
    let mut config = Config::default();
    config.source.url = format!("{}/rnc.zip", server.uri());
    config.retry.max_attempts = 0;
    let config = Arc::new(config);

    let (db, temp_dir) = create_test_db().await;
    let store: Arc<dyn RegistryStore> = Arc::new(db);
    let orchestrator = Arc::new(ImportOrchestrator::new(config.clone(), store).unwrap());

    Harness {
        orchestrator,
        config,
        _temp_dir: temp_dir,
    }
}

async fn mount_registry(server: &MockServer, lines: &[String]) {
    let body = lines.join("\n");
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(build_zip(&[("TMP/DGII_RNC.TXT", body.as_bytes())]).to_vec()),
        )
        .mount(server)
        .await;
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    let h = harness(&server).await;

    let response = h.router().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_idle_before_first_run() {
    let server = MockServer::start().await;
    let h = harness(&server).await;

    let response = h.router().oneshot(get("/import/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["state"], "idle");
    assert!(json["run_id"].is_null());
    assert!(json["last_summary"].is_null());
}

#[tokio::test]
async fn test_trigger_import_returns_summary() {
    let server = MockServer::start().await;
    mount_registry(
        &server,
        &[
            registry_line("101000001", "ALFA", "01/02/2003", "ACTIVO"),
            registry_line("101000002", "BETA", "", "SUSPENDIDO"),
            "103|solo|tres".to_string(),
        ],
    )
    .await;
    let h = harness(&server).await;

    let response = h.router().oneshot(post("/import")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["state"], "done");
    assert_eq!(json["lines_read"], 3);
    assert_eq!(json["parsed_ok"], 2);
    assert_eq!(json["parsed_failed"], 1);
    assert_eq!(json["records_committed"], 2);
    assert_eq!(json["parse_failures"][0]["line_number"], 3);

    let response = h.router().oneshot(get("/import/status")).await.unwrap();
    let json = json_body(response).await;
    assert_eq!(json["state"], "done");
    assert_eq!(json["run_id"], 1);
    assert_eq!(json["last_summary"]["records_committed"], 2);
}

#[tokio::test]
async fn test_failed_import_is_still_200() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let h = harness(&server).await;

    let response = h.router().oneshot(post("/import")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["state"], "failed");
    assert_eq!(json["records_committed"], 0);
}

#[tokio::test]
async fn test_trigger_while_running_is_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_millis(400)))
        .mount(&server)
        .await;
    let h = harness(&server).await;

    let first = tokio::spawn(h.router().oneshot(post("/import")));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = h.router().oneshot(post("/import")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "import_already_running");

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cors_allows_any_origin_by_default() {
    let server = MockServer::start().await;
    let h = harness(&server).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://example.com")
        .body(Body::empty())
        .unwrap();
    let response = h.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_disabled_sends_no_header() {
    let server = MockServer::start().await;
    let mut h = harness(&server).await;
    let mut config = (*h.config).clone();
    config.api.cors_enabled = false;
    h.config = Arc::new(config);

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://example.com")
        .body(Body::empty())
        .unwrap();
    let response = h.router().oneshot(request).await.unwrap();

    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_server_stops_on_shutdown() {
    let server = MockServer::start().await;
    let h = harness(&server).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn(serve(
        listener,
        h.orchestrator.clone(),
        h.config.clone(),
        shutdown.clone(),
    ));

    let response = reqwest::get(format!("http://{address}/health")).await.unwrap();
    assert!(response.status().is_success());

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("server should stop after shutdown");
    assert!(result.unwrap().is_ok());
}
