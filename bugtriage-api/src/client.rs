//! Bug triage API client
//!
//! # Creating new api client
//!
//! - [with_config](TriageClient::with_config) - create client with configuration
//! - [with_client](TriageClient::with_client) - create client with configuration and custom reqwest client
//! - [with_session](TriageClient::with_session) - attach a session at construction
//!
//! # Configuration
//!
//! - [get_config](TriageClient::get_config) - returns configuration
//!

use std::{sync::Arc, time::Duration};

use tracing::debug;

use crate::{
    DEFAULT_URL, Result,
    config::{
        BUGTRIAGE_FETCH_MODE_ENV, BUGTRIAGE_URL_ENV, DEFAULT_CLIENT_FETCH_LIMIT, DEFAULT_DEBOUNCE,
        DEFAULT_PAGE_SIZE, MAX_RETRIES,
    },
    http_client::HttpClient,
    prelude::*,
};

/// Configuration for the triage client and the explorers it opens.
///
/// ```rust,no_run
/// use bugtriage::prelude::*;
/// # fn create_client() -> Result<TriageClient, TriageError> {
/// let config = ClientConfig::default()
///     .base_url("http://triage.internal:8000")
///     .mode(FetchMode::ServerSide)
///     .page_size(25);
/// let client = TriageClient::with_config(config)?;
/// # Ok(client)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base url for all backend requests.
    /// If not provided in config, url is determined by:
    /// * The environment variable `BUGTRIAGE_URL`, if defined, or
    /// * "http://127.0.0.1:8000" `bugtriage::DEFAULT_URL`
    pub base_url: String,

    /// Where filtering, sorting and pagination happen.
    /// Defaults to the environment variable `BUGTRIAGE_FETCH_MODE` ("client" or "server"),
    /// or client-side.
    pub mode: FetchMode,

    /// Rows per explorer page
    pub page_size: usize,

    /// Quiescence delay before typed filter text takes effect
    pub debounce: Duration,

    /// Row limit requested for the client-side full snapshot
    pub client_fetch_limit: u32,

    /// Retries for connection failures and gateway timeouts on idempotent requests
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: std::env::var(BUGTRIAGE_URL_ENV).unwrap_or(DEFAULT_URL.to_string()),
            mode: std::env::var(BUGTRIAGE_FETCH_MODE_ENV)
                .ok()
                .and_then(|value| value.parse::<FetchMode>().ok())
                .unwrap_or_default(),
            page_size: DEFAULT_PAGE_SIZE,
            debounce: DEFAULT_DEBOUNCE,
            client_fetch_limit: DEFAULT_CLIENT_FETCH_LIMIT,
            max_retries: MAX_RETRIES,
        }
    }
}

impl ClientConfig {
    pub fn base_url(self, base_url: impl Into<String>) -> Self {
        ClientConfig {
            base_url: base_url.into(),
            ..self
        }
    }

    pub fn mode(self, mode: FetchMode) -> Self {
        ClientConfig { mode, ..self }
    }

    /// Sets rows per page. Zero is treated as one.
    pub fn page_size(self, page_size: usize) -> Self {
        ClientConfig {
            page_size: page_size.max(1),
            ..self
        }
    }

    pub fn debounce(self, debounce: Duration) -> Self {
        ClientConfig { debounce, ..self }
    }

    pub fn client_fetch_limit(self, client_fetch_limit: u32) -> Self {
        ClientConfig {
            client_fetch_limit,
            ..self
        }
    }

    pub fn max_retries(self, max_retries: u32) -> Self {
        ClientConfig {
            max_retries,
            ..self
        }
    }
}

/// Client for the bug triage backend.
///
/// Cloning is cheap; clones share the http connection pool, session, and metrics.
#[derive(Clone)]
pub struct TriageClient {
    pub(crate) client: Arc<HttpClient>,
    pub(crate) config: ClientConfig,
}

impl std::fmt::Debug for TriageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriageClient")
            .field("config", &self.config)
            .field("session", &self.client.session())
            .finish()
    }
}

impl TriageClient {
    /// Creates a new client with the provided configuration.
    ///
    /// # Example
    /// ```rust,no_run
    /// use bugtriage::prelude::*;
    /// # fn create_client() -> Result<TriageClient, TriageError> {
    /// let client = TriageClient::with_config(ClientConfig::default())?;
    /// # Ok(client)
    /// # }
    /// ```
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .connect_timeout(Duration::from_secs(10));
        Self::with_client(client, config)
    }

    /// Creates a client from a `reqwest::ClientBuilder` and configuration.
    /// ClientBuilder can be customized with timeouts, proxies, dns servers, user_agent, etc.
    pub fn with_client(client: reqwest::ClientBuilder, config: ClientConfig) -> Result<Self> {
        debug!(url=?config.base_url, mode=%config.mode, "new client");
        let client = HttpClient::new(client, config.base_url.clone(), config.max_retries)?;
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    /// Attaches a session, consuming and returning the client.
    #[must_use]
    pub fn with_session(self, session: Session) -> Self {
        self.set_session(session);
        self
    }

    /// Replaces the current session.
    pub fn set_session(&self, session: Session) {
        debug!(user=%session.username, company_id=session.company_id, "session set");
        self.client.set_session(Some(session));
    }

    /// Discards the current session.
    pub fn clear_session(&self) {
        self.client.set_session(None);
    }

    /// Returns a copy of the current session, if any.
    pub fn session(&self) -> Option<Session> {
        self.client.session()
    }

    /// Returns true if a session is attached. Whether the backend still accepts it
    /// is only known after the next request.
    pub fn has_session(&self) -> bool {
        self.client.session.read().is_some()
    }

    /// Company id of the current session.
    pub(crate) fn company_id(&self) -> Result<i64> {
        self.client
            .session
            .read()
            .as_ref()
            .map(|s| s.company_id)
            .ok_or(TriageError::NoSession)
    }

    /// Returns the configuration.
    pub fn get_config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns a snapshot of current HTTP metrics.
    pub fn http_metrics(&self) -> HttpMetricsSnapshot {
        self.client.metrics_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builders() {
        let config = ClientConfig::default()
            .base_url("http://example.test")
            .mode(FetchMode::ServerSide)
            .page_size(0)
            .debounce(Duration::from_millis(5))
            .client_fetch_limit(20)
            .max_retries(0);
        assert_eq!(config.base_url, "http://example.test");
        assert_eq!(config.mode, FetchMode::ServerSide);
        assert_eq!(config.page_size, 1);
        assert_eq!(config.debounce, Duration::from_millis(5));
        assert_eq!(config.client_fetch_limit, 20);
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn session_lifecycle() {
        let client = TriageClient::with_config(ClientConfig::default()).expect("client");
        assert!(!client.has_session());
        assert!(matches!(client.company_id(), Err(TriageError::NoSession)));

        let client = client.with_session(Session::new("dana", 42, SecretToken::new("t")));
        assert!(client.has_session());
        assert_eq!(client.company_id().expect("company"), 42);

        // clones share the session
        let other = client.clone();
        other.clear_session();
        assert!(!client.has_session());
    }
}
