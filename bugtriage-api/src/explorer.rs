//! # Record explorer
//!
//! A filterable, sortable, paginated, exportable view over a company's records.
//! The explorer composes [`QueryState`], [`DataSource`] and the
//! [projector](crate::projector), and tracks a [`LoadState`]:
//!
//! ```text
//! Idle -> Loading -> Loaded | Errored | Unauthenticated
//!            ^------ any later refresh
//! ```
//!
//! ## Overlapping fetches
//!
//! Every fetch carries a [`FetchTicket`]. Only the result for the most recently
//! issued ticket is applied; older results are dropped and reported as
//! [`RefreshOutcome::Superseded`]. [`refresh`](RecordExplorer::refresh) runs
//! begin, fetch and apply in one call. Drivers that keep the UI responsive while
//! a fetch is in flight call [`begin_fetch`](RecordExplorer::begin_fetch), run the
//! returned [`FetchRequest`] on a task, and hand its [`FetchResult`] back to
//! [`apply`](RecordExplorer::apply).
//!
//! ## Errors
//!
//! - 401 (or no session): the [`Navigator`] is told once per failing refresh; no
//!   error banner is shown.
//! - Anything else: the message is shown and the last good rows stay visible.
//! - No matching rows is [`ExplorerStatus::Empty`], not an error.
//!
//! ```rust,no_run
//! use std::time::Instant;
//! use bugtriage::prelude::*;
//! # async fn example(client: TriageClient) -> Result<(), TriageError> {
//! let mut explorer = RecordExplorer::new(client).with_filter("S1");
//! explorer.refresh(RefreshTrigger::Manual).await;
//!
//! explorer.set_filter_text("crash", Instant::now());
//! // ... after the debounce delay
//! if explorer.poll(Instant::now()) {
//!     explorer.refresh(RefreshTrigger::QueryChange).await;
//! }
//! let view = explorer.view();
//! println!("page {} of {}: {:?}", view.page, view.total_pages, view.status);
//! # Ok(())
//! # }
//! ```

use std::{fmt, path::Path, sync::Arc, time::Instant};

use tracing::{debug, info, warn};

use crate::{
    Result,
    bugs::NewBug,
    export::write_csv,
    fields::{BugRow, RecordId},
    pending::{PendingChanges, fold_into},
    prelude::*,
    projector,
    source::RecordsPage,
};

/// Receives the "send the user to login" signal.
pub trait Navigator: Send + Sync {
    fn login_required(&self);
}

impl<F> Navigator for F
where
    F: Fn() + Send + Sync,
{
    fn login_required(&self) {
        self()
    }
}

/// Fetch lifecycle
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing fetched yet
    #[default]
    Idle,
    Loading,
    Loaded,
    Errored {
        message: String,
    },
    Unauthenticated,
}

/// What the view should present
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExplorerStatus {
    /// First load, or a refresh, is in flight
    Loading,
    /// Loaded, and no records match
    Empty,
    /// Loaded rows
    Rows,
    /// Inline error banner. Rows from the last good fetch are still present.
    Error(String),
    /// Session missing or rejected
    LoginRequired,
}

/// Result of one refresh
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New rows applied
    Applied,
    /// Nothing to fetch for this trigger; rows were re-projected locally
    Local,
    /// A newer fetch was issued before this one finished
    Superseded,
    /// Fetch failed; stale rows kept
    Failed(String),
    /// Session missing or rejected
    Unauthenticated,
}

/// Sequence number of an issued fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

/// A fetch to run, detached from the explorer.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    ticket: FetchTicket,
    query: QueryTuple,
    source: DataSource,
}

impl FetchRequest {
    pub fn ticket(&self) -> FetchTicket {
        self.ticket
    }

    /// Performs the fetch.
    pub async fn run(self) -> FetchResult {
        let result = self.source.fetch(&self.query).await;
        FetchResult {
            ticket: self.ticket,
            result,
        }
    }
}

/// Outcome of a [`FetchRequest`], to be passed to [`RecordExplorer::apply`].
#[derive(Debug)]
pub struct FetchResult {
    ticket: FetchTicket,
    result: Result<RecordsPage>,
}

impl FetchResult {
    pub fn ticket(&self) -> FetchTicket {
        self.ticket
    }
}

/// Everything needed to draw the explorer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplorerView {
    /// Rows on the current page
    pub rows: Vec<BugRow>,
    /// 1-based page
    pub page: usize,
    pub total_pages: usize,
    /// Rows matching the filter, across all pages
    pub total: usize,
    pub status: ExplorerStatus,
    /// Raw filter input
    pub filter_text: String,
    /// Filter in effect
    pub filter: String,
    pub sort_key: SortKey,
    pub sort_dir: SortDirection,
    /// Tentative submits and deletes in flight
    pub pending: usize,
}

/// Filterable, sortable, paginated, exportable view over records.
pub struct RecordExplorer {
    source: DataSource,
    query: QueryState,
    state: LoadState,
    /// Client-side: whole snapshot. Server-side: the current page.
    rows: Vec<BugRow>,
    /// Server-side total for the current query
    server_total: usize,
    pending: PendingChanges,
    navigator: Option<Arc<dyn Navigator>>,
    issued: u64,
}

impl fmt::Debug for RecordExplorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordExplorer")
            .field("mode", &self.source.mode())
            .field("state", &self.state)
            .field("query", &self.query.tuple())
            .field("rows", &self.rows.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl RecordExplorer {
    /// Explorer using the client's configured fetch mode, page size and debounce.
    pub fn new(client: TriageClient) -> Self {
        let config = client.get_config();
        let query = QueryState::new(config.page_size, config.debounce);
        Self::with_source(DataSource::new(client), query)
    }

    pub fn with_source(source: DataSource, query: QueryState) -> Self {
        Self {
            source,
            query,
            state: LoadState::Idle,
            rows: Vec::new(),
            server_total: 0,
            pending: PendingChanges::new(),
            navigator: None,
            issued: 0,
        }
    }

    /// Opens with a filter already in effect (e.g. "S1" from a dashboard shortcut).
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.query = self.query.with_filter(filter);
        self
    }

    #[must_use]
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn mode(&self) -> FetchMode {
        self.source.mode()
    }

    pub fn load_state(&self) -> &LoadState {
        &self.state
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    // ------------------------------------------------------------------
    // query input
    // ------------------------------------------------------------------

    /// Echoes typed filter text. The query changes only after the debounce delay.
    pub fn set_filter_text(&mut self, text: impl Into<String>, now: Instant) {
        self.query.set_filter_text(text, now);
    }

    /// Commits typed filter text once its deadline passed.
    /// Returns true if the query changed; follow with `refresh(RefreshTrigger::QueryChange)`.
    pub fn poll(&mut self, now: Instant) -> bool {
        let changed = self.query.poll(now);
        if changed {
            self.update_totals();
        }
        changed
    }

    /// Commits typed filter text now. Returns true if the query changed.
    pub fn flush_filter(&mut self) -> bool {
        let changed = self.query.flush();
        if changed {
            self.update_totals();
        }
        changed
    }

    /// When typed filter text will commit, if any is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.query.next_deadline()
    }

    /// Sorts by `key`, toggling direction if already sorted by it. Resets to page 1.
    pub fn request_sort(&mut self, key: SortKey) {
        self.query.request_sort(key);
        self.update_totals();
    }

    /// Moves to a page, clamped into range. Returns true if the page changed.
    pub fn set_page(&mut self, page: usize) -> bool {
        self.query.set_page(page)
    }

    pub fn next_page(&mut self) -> bool {
        self.query.next_page()
    }

    pub fn prev_page(&mut self) -> bool {
        self.query.prev_page()
    }

    // ------------------------------------------------------------------
    // fetching
    // ------------------------------------------------------------------

    /// Issues a fetch for the trigger. Returns `None` when the trigger needs no
    /// network fetch (client-side query changes).
    pub fn begin_fetch(&mut self, trigger: RefreshTrigger) -> Option<FetchRequest> {
        if !self.source.needs_fetch(trigger) {
            self.update_totals();
            return None;
        }
        self.issued += 1;
        let ticket = FetchTicket(self.issued);
        debug!(?ticket, %trigger, mode=%self.source.mode(), "fetch");
        self.state = LoadState::Loading;
        Some(FetchRequest {
            ticket,
            query: self.query.tuple(),
            source: self.source.clone(),
        })
    }

    /// Applies a finished fetch, unless a newer one was issued since.
    pub fn apply(&mut self, fetched: FetchResult) -> RefreshOutcome {
        if fetched.ticket.0 != self.issued {
            debug!(ticket=?fetched.ticket, latest = self.issued, "dropping superseded result");
            return RefreshOutcome::Superseded;
        }
        match fetched.result {
            Ok(page) => {
                self.rows = page.rows;
                self.server_total = page.total;
                self.state = LoadState::Loaded;
                self.update_totals();
                RefreshOutcome::Applied
            }
            Err(err) if err.is_unauthenticated() => {
                warn!("session rejected; login required");
                self.state = LoadState::Unauthenticated;
                if let Some(navigator) = &self.navigator {
                    navigator.login_required();
                }
                RefreshOutcome::Unauthenticated
            }
            Err(err) => {
                let message = err.to_string();
                warn!(error=%message, "fetch failed; keeping last rows");
                self.state = LoadState::Errored {
                    message: message.clone(),
                };
                RefreshOutcome::Failed(message)
            }
        }
    }

    /// Fetches (if the trigger needs it) and applies the result.
    pub async fn refresh(&mut self, trigger: RefreshTrigger) -> RefreshOutcome {
        match self.begin_fetch(trigger) {
            Some(request) => {
                let fetched = request.run().await;
                self.apply(fetched)
            }
            None => RefreshOutcome::Local,
        }
    }

    // ------------------------------------------------------------------
    // projection
    // ------------------------------------------------------------------

    fn effective_rows(&self) -> Vec<BugRow> {
        self.pending.apply_to(&self.rows)
    }

    fn matching_total(&self) -> usize {
        match self.source.mode() {
            FetchMode::ClientSide => {
                let filter = self.query.debounced_filter();
                self.effective_rows()
                    .iter()
                    .filter(|row| projector::matches_filter(row, filter))
                    .count()
            }
            FetchMode::ServerSide => self.server_total,
        }
    }

    fn update_totals(&mut self) {
        let total = self.matching_total();
        self.query.set_total_count(total);
    }

    /// All rows the current query selects, sorted. Client-side only holds the
    /// full set; server-side this is the current page.
    pub fn selected_rows(&self) -> Vec<BugRow> {
        let rows = self.effective_rows();
        match self.source.mode() {
            FetchMode::ClientSide => projector::filter_and_sort(&rows, &self.query.tuple()),
            FetchMode::ServerSide => rows,
        }
    }

    /// Current page and status.
    pub fn view(&self) -> ExplorerView {
        let tuple = self.query.tuple();
        let page_size = self.query.page_size();
        let (rows, total) = match self.source.mode() {
            FetchMode::ClientSide => {
                let page = projector::project(&self.effective_rows(), &tuple, page_size);
                (page.rows, page.total)
            }
            FetchMode::ServerSide => {
                let mut rows = self.effective_rows();
                rows.truncate(page_size);
                (rows, self.server_total)
            }
        };
        let status = match &self.state {
            LoadState::Idle | LoadState::Loading => ExplorerStatus::Loading,
            LoadState::Unauthenticated => ExplorerStatus::LoginRequired,
            LoadState::Errored { message } => ExplorerStatus::Error(message.clone()),
            LoadState::Loaded if rows.is_empty() => ExplorerStatus::Empty,
            LoadState::Loaded => ExplorerStatus::Rows,
        };
        ExplorerView {
            rows,
            page: self.query.page(),
            total_pages: self.query.total_pages(),
            total,
            status,
            filter_text: self.query.filter_text().to_string(),
            filter: tuple.filter,
            sort_key: tuple.sort_key,
            sort_dir: tuple.sort_dir,
            pending: self.pending.len(),
        }
    }

    // ------------------------------------------------------------------
    // export
    // ------------------------------------------------------------------

    /// Writes every row the query selects (not just the visible page) as CSV.
    /// Server-side, the backend renders the file and it is streamed to disk.
    /// Failures leave the explorer state untouched.
    pub async fn export(&self, path: impl AsRef<Path>) -> Result<u64> {
        match self.source.mode() {
            FetchMode::ClientSide => write_csv(path, &self.selected_rows()).await,
            FetchMode::ServerSide => {
                self.source
                    .client()
                    .export_csv(&self.query.tuple(), path)
                    .await
            }
        }
    }

    // ------------------------------------------------------------------
    // optimistic changes
    // ------------------------------------------------------------------

    /// Submits a report. The row is shown at once while the backend is asked, and
    /// removed again whatever it answers: the tentative row only has a local id, so
    /// an accepted report reaches the snapshot through the manual refresh that follows.
    pub async fn submit(&mut self, mut bug: NewBug) -> Result<RefreshOutcome> {
        bug.validate()?;
        let change = self.pending.begin_insert_with(|id| bug.tentative_row(id));
        self.update_totals();

        match self.source.client().create_bug(&bug).await {
            Ok(message) => {
                info!(%message, "submit confirmed");
                self.pending.confirm(change);
                self.update_totals();
                Ok(self.refresh(RefreshTrigger::Manual).await)
            }
            Err(err) => {
                warn!(error=%err, "submit rejected; rolling back");
                self.pending.rollback(change);
                self.update_totals();
                Err(err)
            }
        }
    }

    /// Deletes a record. The row disappears at once and comes back if the backend
    /// refuses. An accepted delete triggers a manual refresh.
    pub async fn delete(&mut self, id: RecordId) -> Result<RefreshOutcome> {
        let change = self.pending.begin_remove(id.clone());
        self.update_totals();

        match self.source.client().delete_bug(&id).await {
            Ok(()) => {
                if let Some(confirmed) = self.pending.confirm(change) {
                    fold_into(&mut self.rows, confirmed);
                }
                self.update_totals();
                Ok(self.refresh(RefreshTrigger::Manual).await)
            }
            Err(err) => {
                warn!(error=%err, %id, "delete rejected; rolling back");
                self.pending.rollback(change);
                self.update_totals();
                Err(err)
            }
        }
    }
}
