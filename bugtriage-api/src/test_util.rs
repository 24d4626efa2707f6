//! Test utilities
//!
//! Helper functions used to test the `bugtriage` library against the mock backend.
//! These are not part of the supported api and are subject to change.
//!
#![doc(hidden)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use snafu::prelude::*;

use crate::mock::{MOCK_USERS, MockTriageHandle, MockTriageServer};
use crate::prelude::{ClientConfig, FetchMode, TriageClient, TriageError};

// =============================================================================
// TestError
// =============================================================================

#[doc(hidden)]
pub type TestResult<T> = std::result::Result<T, TestError>;

#[doc(hidden)]
#[derive(Debug, Snafu)]
pub enum TestError {
    #[snafu(display("API error: {source}"))]
    Api { source: TriageError },

    #[snafu(display("Mock server error: {source}"))]
    Server { source: std::io::Error },

    #[snafu(display("Configuration error: {message}"))]
    Config { message: String },

    #[snafu(display("Test assertion failed: {message}"))]
    Assertion { message: String },
}

impl From<TriageError> for TestError {
    fn from(source: TriageError) -> Self {
        TestError::Api { source }
    }
}

// =============================================================================
// TestContext
// =============================================================================

/// Mock backend plus a client logged in as the first mock user
#[doc(hidden)]
pub struct TestContext {
    pub client: TriageClient,
    pub server: MockTriageHandle,
    pub company_id: i64,
    temp_paths: Mutex<Vec<PathBuf>>,
}

impl TestContext {
    /// Starts a seeded mock server and logs in.
    pub async fn new() -> TestResult<Self> {
        Self::with_server(MockTriageServer::new(), FetchMode::ClientSide).await
    }

    /// Starts `server` on a free port, and logs in with a client in `mode`.
    pub async fn with_server(server: MockTriageServer, mode: FetchMode) -> TestResult<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let server = server.start(addr).await.context(ServerSnafu)?;
        let client = test_client(&server.url(), mode)?;
        let (username, password, company_id, _) = MOCK_USERS[0];
        let session = client.login(username, password).await?;
        client.set_session(session);
        Ok(Self {
            client,
            server,
            company_id,
            temp_paths: Mutex::default(),
        })
    }

    /// Creates a scratch directory removed after the test.
    pub fn temp_dir(&self, prefix: &str) -> TestResult<PathBuf> {
        let dir = std::env::temp_dir().join(format!("bugtriage_test_{prefix}_{}", unique_suffix()));
        std::fs::create_dir_all(&dir).map_err(|err| TestError::Config {
            message: format!("Failed to create temp dir {}: {err}", dir.display()),
        })?;
        self.temp_paths.lock().push(dir.clone());
        Ok(dir)
    }

    pub fn cleanup(&self) {
        let paths = std::mem::take(&mut *self.temp_paths.lock());
        for path in paths {
            let _ = std::fs::remove_dir_all(path);
        }
    }
}

/// Runs `f` with a fresh context; temp dirs are removed even if `f` panics.
#[doc(hidden)]
pub async fn with_test_context<F, Fut, T>(f: F) -> TestResult<T>
where
    F: FnOnce(Arc<TestContext>) -> Fut,
    Fut: std::future::Future<Output = TestResult<T>>,
{
    let ctx = Arc::new(TestContext::new().await?);
    run_with(ctx, f).await
}

/// Like [`with_test_context`], for a custom server and fetch mode.
#[doc(hidden)]
pub async fn with_server_context<F, Fut, T>(
    server: MockTriageServer,
    mode: FetchMode,
    f: F,
) -> TestResult<T>
where
    F: FnOnce(Arc<TestContext>) -> Fut,
    Fut: std::future::Future<Output = TestResult<T>>,
{
    let ctx = Arc::new(TestContext::with_server(server, mode).await?);
    run_with(ctx, f).await
}

async fn run_with<F, Fut, T>(ctx: Arc<TestContext>, f: F) -> TestResult<T>
where
    F: FnOnce(Arc<TestContext>) -> Fut,
    Fut: std::future::Future<Output = TestResult<T>>,
{
    let result = std::panic::AssertUnwindSafe(f(Arc::clone(&ctx)))
        .catch_unwind()
        .await;
    ctx.cleanup();
    match result {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

// =============================================================================
// Functions
// =============================================================================

static UNIQUE_SUFFIX_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Returns a unique ASCII suffix for names in tests.
#[doc(hidden)]
pub fn unique_suffix() -> String {
    // counter + timestamp: unique across runs without relying on clock resolution
    let counter = UNIQUE_SUFFIX_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    format!("{}_{}", Utc::now().timestamp_millis(), counter)
}

/// Client for `base_url` with retries off and a short debounce.
#[doc(hidden)]
pub fn test_client(base_url: &str, mode: FetchMode) -> TestResult<TriageClient> {
    let config = ClientConfig::default()
        .base_url(base_url)
        .mode(mode)
        .debounce(Duration::from_millis(50))
        .max_retries(0);
    Ok(TriageClient::with_config(config)?)
}
