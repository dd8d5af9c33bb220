//! Archive download over HTTP

use crate::error::{Error, FetchError, Result};
use bytes::Bytes;
use std::time::Duration;

/// User-Agent sent with every archive request
const USER_AGENT: &str = concat!("rnc-importer/", env!("CARGO_PKG_VERSION"));

/// Downloads the registry archive in one GET
///
/// No retries happen here; wrap [`Fetcher::fetch`] with
/// [`retry_with_backoff`](crate::retry::retry_with_backoff) for that.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl Fetcher {
    /// Build a fetcher whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Other(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }

    /// Download `url` into memory
    ///
    /// Fails with [`FetchError::Network`] on connection errors, timeouts and
    /// non-2xx statuses, and with [`FetchError::Empty`] when the body is empty.
    pub async fn fetch(&self, url: &str) -> std::result::Result<Bytes, FetchError> {
        tracing::info!(url, "fetching registry archive");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: format!("HTTP {status}"),
                transient: status.is_server_error(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.request_error(url, e))?;

        if body.is_empty() {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }

        tracing::info!(url, bytes = body.len(), "registry archive downloaded");
        Ok(body)
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        let reason = if e.is_timeout() {
            format!("timed out after {} seconds", self.timeout.as_secs())
        } else if e.is_connect() {
            format!("connection failed: {e}")
        } else {
            e.to_string()
        };

        FetchError::Network {
            url: url.to_string(),
            status: e.status().map(|s| s.as_u16()),
            reason,
            transient: e.is_timeout() || e.is_connect() || e.is_body(),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn returns_body_on_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rnc.zip"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04data".to_vec()))
            .mount(&mock_server)
            .await;

        let url = format!("{}/rnc.zip", mock_server.uri());
        let body = fetcher().fetch(&url).await.unwrap();
        assert_eq!(&body[..4], b"PK\x03\x04");
    }

    #[tokio::test]
    async fn server_error_is_transient_network_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let url = format!("{}/rnc.zip", mock_server.uri());
        match fetcher().fetch(&url).await.unwrap_err() {
            FetchError::Network {
                status, transient, ..
            } => {
                assert_eq!(status, Some(503));
                assert!(transient);
            }
            other => panic!("expected Network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn not_found_is_permanent_network_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = format!("{}/missing.zip", mock_server.uri());
        match fetcher().fetch(&url).await.unwrap_err() {
            FetchError::Network {
                status, transient, ..
            } => {
                assert_eq!(status, Some(404));
                assert!(!transient);
            }
            other => panic!("expected Network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_body_is_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let url = format!("{}/rnc.zip", mock_server.uri());
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Empty { .. }));
    }

    #[tokio::test]
    async fn timeout_is_transient() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(Duration::from_millis(200)).unwrap();
        let url = format!("{}/rnc.zip", mock_server.uri());
        match fetcher.fetch(&url).await.unwrap_err() {
            FetchError::Network {
                status, transient, ..
            } => {
                assert_eq!(status, None);
                assert!(transient);
            }
            other => panic!("expected Network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        // Port 9 (discard) on localhost is almost never listening
        let err = fetcher().fetch("http://127.0.0.1:9/rnc.zip").await.unwrap_err();
        assert!(matches!(err, FetchError::Network { status: None, .. }));
    }
}
