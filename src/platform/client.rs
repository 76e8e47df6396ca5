//! Authenticated calls against the clinical platform: the appointment/record
//! listing used for discovery, and per-document downloads.
//!
//! Both report a 401 back to the `TokenManager` and retry exactly once with a
//! reacquired token; a second 401 propagates as an upstream error.

use reqwest::StatusCode;

use super::{truncate_detail, PlatformError, TokenManager};
use crate::config::PlatformConfig;

const API_TIMEOUT_SECS: u64 = 30;
const DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// One downloaded document body.
#[derive(Debug)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    host: Option<String>,
    tokens: TokenManager,
}

impl PlatformClient {
    pub fn new(config: &PlatformConfig) -> Self {
        let http = reqwest::Client::new();
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let host = reqwest::Url::parse(&base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        let tokens = TokenManager::new(http.clone(), config);
        Self {
            http,
            base_url,
            host,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Fetch the appointment/record listing for one patient as raw JSON.
    /// The shape is not contractually fixed; the scanner walks it as-is.
    pub async fn appointments(
        &self,
        patient_id: &str,
        page_no: u32,
    ) -> Result<serde_json::Value, PlatformError> {
        let url = format!("{}/dr/v1/appointment", self.base_url);
        let query = [
            ("patient_id", patient_id.to_string()),
            ("page_no", page_no.to_string()),
        ];

        let response = self
            .get_with_retry(&url, Some(&query), API_TIMEOUT_SECS)
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api {
                status: status.as_u16(),
                detail: truncate_detail(&body, 500),
            });
        }

        response
            .json()
            .await
            .map_err(|e| PlatformError::Decode(format!("appointment listing not JSON: {e}")))
    }

    /// Download one document. The bearer token is attached only when the URL
    /// lives on the platform host; third-party storage URLs are fetched bare.
    pub async fn download(&self, url: &str) -> Result<Download, PlatformError> {
        let authed = self.is_platform_host(url);
        let response = if authed {
            self.get_with_retry(url, None, DOWNLOAD_TIMEOUT_SECS).await?
        } else {
            self.http
                .get(url)
                .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
                .send()
                .await
                .map_err(|e| PlatformError::Transport(format!("download failed: {e}")))?
        };

        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Api {
                status: status.as_u16(),
                detail: format!("failed to download {url}"),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PlatformError::Transport(format!("download body failed: {e}")))?;

        Ok(Download {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    /// Whether a URL points at the platform itself (same host or subdomain).
    pub(crate) fn is_platform_host(&self, url: &str) -> bool {
        let Some(base_host) = self.host.as_deref() else {
            return false;
        };
        reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .is_some_and(|h| h == base_host || h.ends_with(&format!(".{base_host}")))
    }

    /// Authenticated GET with a single retry after an observed 401.
    async fn get_with_retry(
        &self,
        url: &str,
        query: Option<&[(&str, String)]>,
        timeout_secs: u64,
    ) -> Result<reqwest::Response, PlatformError> {
        let token = self.tokens.access_token().await?;
        let response = self.authed_get(url, query, &token, timeout_secs).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!(url, "platform rejected token; retrying once with a fresh one");
        self.tokens.invalidate(&token).await;
        let token = self.tokens.access_token().await?;
        self.authed_get(url, query, &token, timeout_secs).await
    }

    async fn authed_get(
        &self,
        url: &str,
        query: Option<&[(&str, String)]>,
        token: &str,
        timeout_secs: u64,
    ) -> Result<reqwest::Response, PlatformError> {
        let mut request = self
            .http
            .get(url)
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .bearer_auth(token);
        if let Some(query) = query {
            request = request.query(query);
        }
        request
            .send()
            .await
            .map_err(|e| PlatformError::Transport(format!("platform request failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;

    #[derive(Clone)]
    struct Stub {
        appointment_calls: Arc<AtomicUsize>,
        /// Number of leading appointment calls to reject with 401.
        reject_first: usize,
    }

    async fn handle_login() -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "access_token": "access-token",
            "refresh_token": "refresh-token",
            "expires_in": 600.0,
            "refresh_expires_in": 86400.0,
        }))
    }

    async fn handle_appointments(State(stub): State<Stub>) -> axum::response::Response {
        let n = stub.appointment_calls.fetch_add(1, Ordering::SeqCst);
        if n < stub.reject_first {
            return (StatusCode::UNAUTHORIZED, "token expired").into_response();
        }
        Json(serde_json::json!({
            "appointments": [{"file_url": "https://x/a.pdf"}],
        }))
        .into_response()
    }

    async fn handle_doc(headers: HeaderMap) -> axum::response::Response {
        if !headers.contains_key("authorization") {
            return (StatusCode::UNAUTHORIZED, "missing auth").into_response();
        }
        (
            [("content-type", "application/pdf")],
            b"%PDF-1.4 fake".to_vec(),
        )
            .into_response()
    }

    async fn spawn_stub(stub: Stub) -> String {
        let app = Router::new()
            .route("/connect-auth/v1/account/login", post(handle_login))
            .route("/dr/v1/appointment", get(handle_appointments))
            .route("/docs/a.pdf", get(handle_doc))
            .with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base_url: &str) -> PlatformClient {
        PlatformClient::new(&PlatformConfig {
            base_url: base_url.to_string(),
            api_key: "k".into(),
            client_id: "c".into(),
            client_secret: "s".into(),
            user_token: None,
        })
    }

    #[tokio::test]
    async fn appointments_returns_raw_json() {
        let stub = Stub {
            appointment_calls: Arc::new(AtomicUsize::new(0)),
            reject_first: 0,
        };
        let base = spawn_stub(stub).await;
        let client = client(&base);

        let listing = client.appointments("pat-1", 0).await.unwrap();
        assert_eq!(listing["appointments"][0]["file_url"], "https://x/a.pdf");
    }

    #[tokio::test]
    async fn single_retry_after_401() {
        let stub = Stub {
            appointment_calls: Arc::new(AtomicUsize::new(0)),
            reject_first: 1,
        };
        let calls = Arc::clone(&stub.appointment_calls);
        let base = spawn_stub(stub).await;
        let client = client(&base);

        let listing = client.appointments("pat-1", 0).await.unwrap();
        assert!(listing.get("appointments").is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistent_401_propagates_after_one_retry() {
        let stub = Stub {
            appointment_calls: Arc::new(AtomicUsize::new(0)),
            reject_first: usize::MAX,
        };
        let calls = Arc::clone(&stub.appointment_calls);
        let base = spawn_stub(stub).await;
        let client = client(&base);

        let err = client.appointments("pat-1", 0).await.unwrap_err();
        assert!(matches!(err, PlatformError::Api { status: 401, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn download_on_platform_host_carries_auth() {
        let stub = Stub {
            appointment_calls: Arc::new(AtomicUsize::new(0)),
            reject_first: 0,
        };
        let base = spawn_stub(stub).await;
        let client = client(&base);

        let download = client.download(&format!("{base}/docs/a.pdf")).await.unwrap();
        assert!(download.bytes.starts_with(b"%PDF"));
        assert_eq!(download.content_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn download_missing_document_is_api_error() {
        let stub = Stub {
            appointment_calls: Arc::new(AtomicUsize::new(0)),
            reject_first: 0,
        };
        let base = spawn_stub(stub).await;
        let client = client(&base);

        let err = client
            .download(&format!("{base}/docs/missing.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Api { status: 404, .. }));
    }

    #[test]
    fn platform_host_matching() {
        let client = client("https://api.example-health.test");
        assert!(client.is_platform_host("https://api.example-health.test/doc/1"));
        assert!(client.is_platform_host("https://cdn.api.example-health.test/doc/1"));
        assert!(!client.is_platform_host("https://files.other-storage.test/doc/1"));
        assert!(!client.is_platform_host("not a url"));
    }
}
