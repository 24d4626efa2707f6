//! HttpClient middleware used by TriageClient
//!
//! Responsible for
//!  - handing all HTTP api requests
//!  - attaching the session bearer token
//!  - logging/tracing
//!  - retries and backoff (for timeouts and connection errors)
//!  - mapping status codes into `TriageError`

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::{ClientBuilder, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use snafu::prelude::*;
use tracing::{debug, error, trace, warn};

use crate::{Result, prelude::*};

/// HTTP metrics tracked using atomic counters for thread-safe access.
/// These counters are cumulative and never reset during the client's lifetime.
#[derive(Debug, Default)]
pub struct HttpMetrics {
    total_requests: AtomicU64,
    successful_responses: AtomicU64,
    errors: AtomicU64,
    retries: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of current metrics as plain u64 values
    pub fn snapshot(&self) -> HttpMetricsSnapshot {
        HttpMetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_responses: self.successful_responses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }

    fn increment_requests(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_success(&self) {
        self.successful_responses.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of HTTP metrics with plain u64 values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpMetricsSnapshot {
    /// Total number of HTTP requests sent to the server
    pub total_requests: u64,
    /// Total number of successful responses (2xx status codes)
    pub successful_responses: u64,
    /// Total number of error responses (non-2xx status codes)
    pub errors: u64,
    /// Total number of retry attempts
    pub retries: u64,
    /// Total bytes sent in request bodies
    pub bytes_sent: u64,
    /// Total bytes received in response bodies
    pub bytes_received: u64,
}

impl std::fmt::Display for HttpMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requests={} success={} errors={} retries={} sent={} recv={}",
            self.total_requests,
            self.successful_responses,
            self.errors,
            self.retries,
            format_bytes(self.bytes_sent),
            format_bytes(self.bytes_received),
        )
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// status codes where it's ok to retry and backoff
fn retry_for_status(code: StatusCode) -> bool {
    matches!(
        code,
        StatusCode::BAD_GATEWAY /* 502 */
            | StatusCode::SERVICE_UNAVAILABLE /* 503 */
            | StatusCode::GATEWAY_TIMEOUT /* 504 */
            | StatusCode::REQUEST_TIMEOUT /* 408 */
    )
}

#[derive(Clone, Default)]
pub(crate) struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("body", &self.body.as_ref().map_or(0, Bytes::len))
            .finish()
    }
}

impl HttpRequest {
    pub(crate) fn get(path: impl Into<String>, query: Vec<(String, String)>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query,
            body: None,
        }
    }

    pub(crate) fn json<B: Serialize>(
        method: Method,
        path: impl Into<String>,
        query: Vec<(String, String)>,
        body: &B,
    ) -> Result<Self> {
        Ok(Self {
            method,
            path: path.into(),
            query,
            body: Some(Bytes::from(
                serde_json::to_vec(body).context(SerializationSnafu)?,
            )),
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    pub client: reqwest::Client,

    /// Base URL for API requests (e.g., "http://127.0.0.1:8000")
    pub base_url: String,

    pub session: Arc<RwLock<Option<Session>>>,

    max_retries: u32,

    /// HTTP request/response metrics
    pub metrics: Arc<HttpMetrics>,
}

impl HttpClient {
    pub fn new(builder: ClientBuilder, base_url: String, max_retries: u32) -> Result<Self> {
        let client = builder.build().context(HttpSnafu {
            method: "client-init",
            url: "",
        })?;
        Ok(HttpClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: Arc::new(RwLock::new(None)),
            max_retries,
            metrics: Arc::new(HttpMetrics::new()),
        })
    }

    /// Returns a snapshot of current HTTP metrics
    pub fn metrics_snapshot(&self) -> HttpMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn set_session(&self, session: Option<Session>) {
        *self.session.write() = session;
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    /// Makes an unauthenticated POST request (for login endpoints).
    /// A 401 here means rejected credentials, reported as `Auth`.
    pub(crate) async fn post_unauthenticated<Resp: DeserializeOwned, Req: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &Req,
    ) -> Result<Resp> {
        let full_url = format!("{}{}", self.base_url, path);
        debug!("{method} unauthenticated {full_url}");
        self.metrics.increment_requests();
        let response = self
            .client
            .request(method.clone(), &full_url)
            .json(body)
            .send()
            .await
            .context(HttpSnafu {
                method: method.to_string(),
                url: &full_url,
            })?;
        let code = response.status();
        if code == StatusCode::UNAUTHORIZED {
            self.metrics.increment_errors();
            let message = response.text().await.unwrap_or_default();
            return Err(TriageError::Auth {
                message: if message.is_empty() {
                    "Invalid credentials".to_string()
                } else {
                    message
                },
            });
        }
        if !code.is_success() {
            self.metrics.increment_errors();
            return Err(TriageError::ApiError {
                code: code.as_u16(),
                method: method.to_string(),
                url: full_url,
                message: response.text().await.unwrap_or_default(),
            });
        }
        let data = response.bytes().await.context(HttpSnafu {
            method: method.to_string(),
            url: &full_url,
        })?;
        self.metrics.increment_success();
        self.metrics.add_bytes_received(data.len() as u64);
        deserialize_json(&data)
    }

    /// Sends the request and deserializes the json response body into T.
    pub(crate) async fn send<T: DeserializeOwned>(&self, req: HttpRequest) -> Result<T> {
        let path = req.path.clone();
        let response = self.execute(req).await?;
        let body = response.bytes().await.context(HttpSnafu {
            method: "read",
            url: path.clone(),
        })?;
        self.metrics.add_bytes_received(body.len() as u64);
        log_response(&path, &body);
        deserialize_json(&body)
    }

    /// Sends the request, ignoring any response body.
    pub(crate) async fn send_no_content(&self, req: HttpRequest) -> Result<()> {
        let path = req.path.clone();
        let response = self.execute(req).await?;
        let body = response.bytes().await.context(HttpSnafu {
            method: "read",
            url: path.clone(),
        })?;
        self.metrics.add_bytes_received(body.len() as u64);
        log_response(&path, &body);
        Ok(())
    }

    /// Sends the request and returns the successful response unread,
    /// for callers that stream the body (exports).
    pub(crate) async fn send_streaming(&self, req: HttpRequest) -> Result<reqwest::Response> {
        self.execute(req).await
    }

    /// This function handles all authenticated requests
    /// - attaches the session bearer token
    /// - retries up to N(=3) times for connection failures or gateway timeouts
    /// - maps http error codes into TriageErrors
    async fn execute(&self, req: HttpRequest) -> Result<reqwest::Response> {
        let mut attempt = 0u32;

        let token = self.session.read().as_ref().map(|s| s.token.clone());
        let token = token.ok_or(TriageError::NoSession)?;

        let full_url = format!("{}{}", self.base_url, req.path);
        let mut req_builder = self
            .client
            .request(req.method.clone(), &full_url)
            .query(&req.query);
        if req.body.is_some() {
            req_builder = req_builder.header(reqwest::header::CONTENT_TYPE, "application/json");
        }
        let req_builder = token.set_auth_header(req_builder);

        // debug log (if tracing enabled)
        log_request(&req_builder, req.body.as_ref());

        let body_size = req.body.as_ref().map_or(0, |b| b.len() as u64);

        loop {
            let request = req_builder
                .try_clone()
                .ok_or_else(|| TriageError::Other {
                    message: "reqwest::RequestBuilder internal error".into(),
                })?
                .body(req.body.clone().unwrap_or_default());

            self.metrics.increment_requests();
            self.metrics.add_bytes_sent(body_size);

            match request.send().await {
                Ok(response) => {
                    let code = response.status();
                    match code {
                        ok if ok.is_success() => {
                            self.metrics.increment_success();
                            return Ok(response);
                        }
                        StatusCode::UNAUTHORIZED /* 401 */ => {
                            // never retried: the caller must log in again
                            self.metrics.increment_errors();
                            warn!(?req, "http 401 unauthorized");
                            return Err(TriageError::Unauthorized);
                        }
                        StatusCode::FORBIDDEN /* 403 */ => {
                            self.metrics.increment_errors();
                            let message = response.text().await.unwrap_or("Forbidden".into());
                            error!(?code, ?message, ?req, "http");
                            return Err(TriageError::Forbidden);
                        }
                        StatusCode::NOT_FOUND /* 404 */ | StatusCode::GONE /* 410 */ => {
                            self.metrics.increment_errors();
                            let message = response.text().await.unwrap_or("NotFound".into());
                            error!(?code, ?message, ?req, "http");
                            return Err(TriageError::NotFound {
                                obj_type: "Resource".into(),
                                key: req.path,
                            });
                        }
                        StatusCode::BAD_REQUEST /* 400 */ | StatusCode::UNPROCESSABLE_ENTITY /* 422 */ => {
                            self.metrics.increment_errors();
                            let message = response.text().await.unwrap_or("BadRequest".into());
                            error!(?code, ?message, ?req, "http");
                            return Err(TriageError::Validation { message });
                        }
                        _ => {
                            let message = response.text().await.unwrap_or_default();
                            error!(?code, ?req, message, attempt, "http");
                            self.metrics.increment_errors();
                            if attempt < self.max_retries
                                && retry_for_status(code)
                                && is_idempotent_method(&req.method)
                            {
                                log_and_backoff(attempt, code.to_string()).await;
                                self.metrics.increment_retries();
                                attempt += 1;
                                continue;
                            }
                            return Err(TriageError::ApiError {
                                code: code.as_u16(),
                                method: req.method.to_string(),
                                url: req.path,
                                message,
                            });
                        }
                    }
                }
                Err(e) => {
                    error!(source=?e, ?req, "http");
                    if (e.is_connect() || e.is_timeout())
                        && is_idempotent_method(&req.method)
                        && attempt < self.max_retries
                    {
                        log_and_backoff(attempt, e.to_string()).await;
                        self.metrics.increment_retries();
                        attempt += 1;
                        continue;
                    }
                    self.metrics.increment_errors();
                    return Err(TriageError::Http {
                        method: req.method.to_string(),
                        url: req.path,
                        source: e,
                    });
                }
            }
        }
    }
}

// dump request
// requires RUST_LOG=bugtriage::http_json=trace
fn log_request(builder: &reqwest::RequestBuilder, body: Option<&Bytes>) {
    if tracing::enabled!(target: "bugtriage::http_json", tracing::Level::TRACE)
        && let Some(req) = builder.try_clone().and_then(|b| b.build().ok())
    {
        let method = req.method().as_str();
        let url = req.url();
        let body = body
            .map(|b| String::from_utf8_lossy(b).to_string())
            .unwrap_or_default();
        // don't log headers so we don't leak the bearer token
        trace!(target: "bugtriage::http_json", "{method} url={url} body={body}");
    }
}

// dump json response, for debugging
fn log_response(path: &str, body: &Bytes) {
    if tracing::enabled!(target: "bugtriage::http_json", tracing::Level::TRACE) {
        trace!(target: "bugtriage::http_json", "Response path={path} body={}",
            String::from_utf8_lossy(body)
        );
    }
}

// deserialize, reporting errors with 'serde_path_to_error', which provides
// detailed json path to the error
pub(crate) fn deserialize_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    match serde_path_to_error::deserialize(&mut deserializer) {
        Ok(value) => Ok(value),
        Err(err) => {
            error!("Deserialization failed at {}: {}", err.path(), err);
            Err(TriageError::Deserialization {
                source: err.into_inner(),
            })
        }
    }
}

// log attempt and sleep for exponential backoff
async fn log_and_backoff(attempt: u32, err: String) {
    // exponential backoff: 1s, 2s, 4s, with jitter
    let base_delay = 2u64.pow(attempt);
    let jitter = f64::from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos(),
    ) / 1_000_000_000.0;
    let jittered_delay = ((base_delay as f64) * (0.5 + jitter)).round() as u64;
    let delay = jittered_delay.max(1);
    warn!("Recoverable error {err}. Attempt {attempt}. Waiting {delay}s before retry");
    tokio::time::sleep(Duration::from_secs(delay)).await;
}

fn is_idempotent_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS
    )
}

#[cfg(test)]
mod tests {
    use reqwest::{Method, StatusCode};

    use super::*;

    #[test]
    fn test_retry_for_status() {
        assert!(retry_for_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(retry_for_status(StatusCode::REQUEST_TIMEOUT));
        assert!(retry_for_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!retry_for_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!retry_for_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_post_is_not_idempotent() {
        assert!(is_idempotent_method(&Method::GET));
        assert!(is_idempotent_method(&Method::DELETE));
        assert!(!is_idempotent_method(&Method::POST));
    }

    #[test]
    fn test_deserialize_reports_bad_payload() {
        let result: Result<Vec<u32>> = deserialize_json(br#"{"not":"a list"}"#);
        assert!(matches!(result, Err(TriageError::Deserialization { .. })));
    }

    #[test]
    fn test_metrics_display() {
        let snapshot = HttpMetricsSnapshot {
            total_requests: 3,
            successful_responses: 2,
            errors: 1,
            retries: 0,
            bytes_sent: 10,
            bytes_received: 2048,
        };
        assert_eq!(
            snapshot.to_string(),
            "requests=3 success=2 errors=1 retries=0 sent=10B recv=2.0KB"
        );
    }

    #[test]
    fn test_request_debug_hides_body() {
        let req = HttpRequest::json(Method::POST, "/api/bug", Vec::new(), &serde_json::json!({"a": 1}))
            .expect("serialize");
        let text = format!("{req:?}");
        assert!(text.contains("/api/bug"));
        assert!(!text.contains("\"a\""));
    }
}
