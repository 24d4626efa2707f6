//! # Data source
//!
//! Fetches records for the explorer and normalizes them into [`BugRow`]s.
//!
//! Two fetch modes; one is active per source:
//!
//! - [`FetchMode::ClientSide`]: fetch the whole collection (`company_id`, `limit`) and let
//!   the [projector](crate::projector) filter, sort and page locally. Query changes do not
//!   refetch.
//! - [`FetchMode::ServerSide`]: every query change sends `page`, `limit`, `search`,
//!   `sort_key`, `sort_dir`, and the response (`{rows, total}`) is used as is.
//!
//! Refresh triggers ([`RefreshTrigger`]) all go through the same fetch path.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    Result,
    config::RECORDS_PATH,
    fields::{BugRow, FieldTable},
    http_client::HttpRequest,
    prelude::*,
};

/// Where filtering, sorting and pagination happen
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum FetchMode {
    /// Full snapshot, local projection
    #[default]
    #[serde(rename = "client")]
    #[strum(serialize = "client")]
    ClientSide,
    /// Parameterized fetch per query
    #[serde(rename = "server")]
    #[strum(serialize = "server")]
    ServerSide,
}

/// Why a refresh was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RefreshTrigger {
    /// User asked to reload, or a submit/delete completed
    Manual,
    /// Periodic refresh timer
    Interval,
    /// The committed query changed
    QueryChange,
}

/// Rows from one fetch with the number of rows the query matches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordsPage {
    pub rows: Vec<BugRow>,
    /// Client-side: rows in the snapshot. Server-side: rows matching the query.
    pub total: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordsResponse {
    Paged { rows: Vec<Value>, total: usize },
    List(Vec<Value>),
}

/// Fetches and normalizes records for one company.
///
/// Cloning is cheap; clones share the client.
#[derive(Clone, Debug)]
pub struct DataSource {
    client: TriageClient,
    mode: FetchMode,
    table: FieldTable,
    page_size: usize,
    fetch_limit: u32,
}

impl DataSource {
    /// Source using the client's configured mode, page size and fetch limit.
    /// The client must carry a session.
    pub fn new(client: TriageClient) -> Self {
        let config = client.get_config();
        let (mode, page_size, fetch_limit) =
            (config.mode, config.page_size, config.client_fetch_limit);
        Self {
            client,
            mode,
            table: FieldTable::default(),
            page_size,
            fetch_limit,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces the field resolution table.
    #[must_use]
    pub fn with_field_table(mut self, table: FieldTable) -> Self {
        self.table = table;
        self
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn client(&self) -> &TriageClient {
        &self.client
    }

    /// Returns true if the trigger requires a network fetch.
    /// Client-side query changes are re-projected locally.
    pub fn needs_fetch(&self, trigger: RefreshTrigger) -> bool {
        !(self.mode == FetchMode::ClientSide && trigger == RefreshTrigger::QueryChange)
    }

    /// Fetches in the active mode.
    pub async fn fetch(&self, query: &QueryTuple) -> Result<RecordsPage> {
        match self.mode {
            FetchMode::ClientSide => {
                let rows = self.fetch_all().await?;
                let total = rows.len();
                Ok(RecordsPage { rows, total })
            }
            FetchMode::ServerSide => self.fetch_page(query).await,
        }
    }

    /// Fetches the whole collection (up to the configured limit).
    pub async fn fetch_all(&self) -> Result<Vec<BugRow>> {
        let req = HttpRequest::get(
            RECORDS_PATH,
            vec![
                ("company_id".into(), self.client.company_id()?.to_string()),
                ("limit".into(), self.fetch_limit.to_string()),
            ],
        );
        let response: RecordsResponse = self.client.client.send(req).await?;
        let raw = match response {
            RecordsResponse::List(rows) | RecordsResponse::Paged { rows, .. } => rows,
        };
        if raw.len() >= self.fetch_limit as usize {
            warn!(limit = self.fetch_limit, "snapshot reached fetch limit; older records are not shown");
        }
        debug!(rows = raw.len(), "fetched snapshot");
        Ok(self.normalize(&raw))
    }

    /// Fetches one server-filtered, sorted page.
    pub async fn fetch_page(&self, query: &QueryTuple) -> Result<RecordsPage> {
        let req = HttpRequest::get(
            RECORDS_PATH,
            vec![
                ("company_id".into(), self.client.company_id()?.to_string()),
                ("page".into(), query.page.max(1).to_string()),
                ("limit".into(), self.page_size.to_string()),
                ("search".into(), query.filter.clone()),
                ("sort_key".into(), query.sort_key.to_string()),
                ("sort_dir".into(), query.sort_dir.to_string()),
            ],
        );
        let response: RecordsResponse = self.client.client.send(req).await?;
        let (raw, total) = match response {
            RecordsResponse::Paged { rows, total } => (rows, total),
            // backend without paging support: treat the list as the whole result
            RecordsResponse::List(rows) => {
                let total = rows.len();
                (rows, total)
            }
        };
        debug!(rows = raw.len(), total, page = query.page, "fetched page");
        Ok(RecordsPage {
            rows: self.normalize(&raw),
            total,
        })
    }

    fn normalize(&self, raw: &[Value]) -> Vec<BugRow> {
        raw.iter().map(|record| self.table.normalize(record)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_names() {
        assert_eq!("server".parse::<FetchMode>().ok(), Some(FetchMode::ServerSide));
        assert_eq!("CLIENT".parse::<FetchMode>().ok(), Some(FetchMode::ClientSide));
        assert_eq!(FetchMode::ServerSide.to_string(), "server");
        assert_eq!(
            serde_json::to_string(&FetchMode::ClientSide).expect("serialize"),
            "\"client\""
        );
    }

    #[test]
    fn client_mode_skips_query_change_fetch() {
        let client = TriageClient::with_config(ClientConfig::default().mode(FetchMode::ClientSide))
            .expect("client");
        let source = DataSource::new(client);
        assert!(source.needs_fetch(RefreshTrigger::Manual));
        assert!(source.needs_fetch(RefreshTrigger::Interval));
        assert!(!source.needs_fetch(RefreshTrigger::QueryChange));

        let source = source.with_mode(FetchMode::ServerSide);
        assert!(source.needs_fetch(RefreshTrigger::QueryChange));
    }

    #[test]
    fn response_shapes() {
        let paged: RecordsResponse =
            serde_json::from_str(r#"{"rows":[{"id":1}],"total":40}"#).expect("paged");
        assert!(matches!(paged, RecordsResponse::Paged { total: 40, .. }));
        let list: RecordsResponse = serde_json::from_str(r#"[{"bug_id":2}]"#).expect("list");
        assert!(matches!(list, RecordsResponse::List(rows) if rows.len() == 1));
    }
}
