/*
 * Bug triage rust client
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
//! # Bug Triage Rust Client
//!
//! Client library for the bug triage dashboard backend.
//!
//! ## Features
//!
//! - record explorer: filter, sort, paginate and export bug records
//! - client-side (full snapshot) or server-side (parameterized) fetch modes
//! - debounced query state with page reset on filter and sort changes
//! - tolerant field resolution for flat, nested (`data`) and aliased record shapes
//! - stale response suppression for overlapping fetches
//! - CSV export, local or streamed from the server
//! - login, bug submission, AI severity analysis, feedback, overview statistics
//! - http middleware with retry logic and metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bugtriage::prelude::*;
//! # async fn example() -> Result<(), TriageError> {
//!
//! let client = TriageClient::with_config(ClientConfig::default())?;
//! let session = client.login("alice", "secret").await?;
//! client.set_session(session);
//!
//! // open an explorer over the company's records
//! let mut explorer = RecordExplorer::new(client.clone());
//! explorer.refresh(RefreshTrigger::Manual).await;
//!
//! explorer.request_sort(SortKey::Severity);
//! for row in explorer.view().rows {
//!     println!("#{} {} {}", row.id, row.severity, row.display_summary());
//! }
//!
//! // write every matching record, not just the visible page
//! explorer.export(EXPORT_FILE_NAME).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Structure
//!
//! The explorer is a pipeline of three parts:
//!
//! - [`QueryState`](query::QueryState): filter text, debounced filter, sort and page
//! - [`DataSource`](source::DataSource): fetches rows in the configured [`FetchMode`](source::FetchMode)
//!   and normalizes record shapes through the [`FieldTable`](fields::FieldTable)
//! - [`projector`]: filter, stable sort, page slicing and CSV export
//!
//! [`RecordExplorer`](explorer::RecordExplorer) composes them and tracks the load state.
//!
#![allow(clippy::missing_errors_doc)] // pedantic
#![allow(clippy::missing_const_for_fn)] //  nursery function
#![allow(clippy::must_use_candidate)] // pedantic
#![warn(clippy::default_trait_access)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::match_same_arms)]
#![warn(clippy::needless_raw_strings)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::redundant_closure)]
#![warn(clippy::uninlined_format_args)]
#![warn(clippy::unused_async)]

pub mod analysis;
pub mod auth;
pub mod batches;
pub mod bugs;
pub mod client;
pub mod error;
pub mod explorer;
pub mod export;
pub mod fields;
mod http_client;
#[cfg(feature = "mock")]
#[doc(hidden)]
pub mod mock;
pub mod overview;
pub mod pending;
pub mod projector;
pub mod query;
pub mod session;
pub mod severity;
pub mod source;

#[cfg(feature = "mock")]
pub mod test_util;

/// Result type alias using `TriageError` as the default error.
pub type Result<T, E = crate::error::TriageError> = std::result::Result<T, E>;

/// Prelude module - import the common types with `use bugtriage::prelude::*;`
pub mod prelude {
    pub use super::{DEFAULT_URL, EXPORT_FILE_NAME};
    pub use crate::error::*;
    pub use crate::{
        analysis::{AnalysisReport, Feedback, SeverityPrediction, SimilarBug},
        auth::Registration,
        batches::Batch,
        bugs::NewBug,
        client::{ClientConfig, TriageClient},
        explorer::{
            ExplorerStatus, ExplorerView, FetchRequest, FetchResult, FetchTicket, LoadState,
            Navigator, RecordExplorer, RefreshOutcome,
        },
        fields::{BugRow, FieldTable, RecordId, SourcePath, get_field},
        http_client::HttpMetricsSnapshot,
        overview::{ComponentCount, Overview, OverviewStats},
        pending::{Change, ChangeId, PendingChanges},
        projector::Page,
        query::{QueryState, QueryTuple, SortDirection, SortKey},
        session::{SecretToken, Session},
        severity::{Severity, is_fixed},
        source::{DataSource, FetchMode, RecordsPage, RefreshTrigger},
    };
}

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default backend endpoint
pub const DEFAULT_URL: &str = "http://127.0.0.1:8000";

/// File name used for CSV exports when the caller does not pick one
pub const EXPORT_FILE_NAME: &str = "bug_report_export.csv";

pub(crate) mod config {
    use std::time::Duration;

    /// Environment variable for default endpoint URL
    pub const BUGTRIAGE_URL_ENV: &str = "BUGTRIAGE_URL";

    /// Environment variable selecting fetch mode ("client" or "server")
    pub const BUGTRIAGE_FETCH_MODE_ENV: &str = "BUGTRIAGE_FETCH_MODE";

    /// Rows per explorer page
    pub const DEFAULT_PAGE_SIZE: usize = 10;

    /// Quiescence delay before typed filter text takes effect
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

    /// Row limit for the client-side full snapshot
    pub const DEFAULT_CLIENT_FETCH_LIMIT: u32 = 5000;

    /// Max retries for HTTP client
    pub const MAX_RETRIES: u32 = 3;

    /// Placeholder shown for records without a summary
    pub const SUMMARY_PLACEHOLDER: &str = "(no summary)";

    /// Longest accepted bug summary, in characters
    pub const MAX_SUMMARY_LEN: usize = 4000;

    // Backend paths
    pub const LOGIN_PATH: &str = "/api/login";
    pub const USERS_PATH: &str = "/api/users";
    pub const RESET_PASSWORD_PATH: &str = "/api/reset-password";
    pub const RECORDS_PATH: &str = "/api/hub/explorer";
    pub const EXPORT_PATH: &str = "/api/hub/explorer/export";
    pub const OVERVIEW_PATH: &str = "/api/hub/overview";
    pub const BUG_PATH: &str = "/api/bug";
    pub const ANALYZE_PATH: &str = "/analyze_bug";
    pub const FEEDBACK_PATH: &str = "/api/feedback";
    pub const BATCHES_PATH: &str = "/api/batches";
}
