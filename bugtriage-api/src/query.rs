//! # Query state
//!
//! Holds the explorer's filter text, sort, and page, and debounces typed filter
//! input. Nothing here touches the network: consumers read the committed
//! [`QueryTuple`] and decide what to fetch or re-project.
//!
//! Debounce is deadline based. Every [`set_filter_text`](QueryState::set_filter_text)
//! moves the deadline to `now + debounce`; [`poll`](QueryState::poll) commits the
//! text once the deadline has passed. Async drivers sleep until
//! [`next_deadline`](QueryState::next_deadline); tests pass instants directly.
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use bugtriage::prelude::*;
//!
//! let mut query = QueryState::new(10, Duration::from_millis(400));
//! let start = Instant::now();
//! query.set_filter_text("cr", start);
//! query.set_filter_text("crash", start + Duration::from_millis(100));
//! assert!(!query.poll(start + Duration::from_millis(450)));
//! assert!(query.poll(start + Duration::from_millis(500)));
//! assert_eq!(query.tuple().filter, "crash");
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_DEBOUNCE, DEFAULT_PAGE_SIZE};

/// Sort direction
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn toggle(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Sortable column
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortKey {
    #[default]
    Id,
    Summary,
    Component,
    Severity,
    Status,
}

impl SortKey {
    /// Canonical field name, as sent in `sort_key`.
    pub fn field(self) -> &'static str {
        match self {
            SortKey::Id => "id",
            SortKey::Summary => "summary",
            SortKey::Component => "component",
            SortKey::Severity => "severity",
            SortKey::Status => "status",
        }
    }
}

/// Committed query: what downstream fetching and projection act on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTuple {
    /// Debounced filter text
    pub filter: String,
    pub sort_key: SortKey,
    pub sort_dir: SortDirection,
    /// 1-based page
    pub page: usize,
}

/// Filter, sort and page state with debounced filter input.
#[derive(Clone, Debug)]
pub struct QueryState {
    filter_text: String,
    debounced: String,
    deadline: Option<Instant>,
    debounce: Duration,
    sort_key: SortKey,
    sort_dir: SortDirection,
    page: usize,
    page_size: usize,
    total_pages: usize,
}

impl Default for QueryState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, DEFAULT_DEBOUNCE)
    }
}

impl QueryState {
    pub fn new(page_size: usize, debounce: Duration) -> Self {
        Self {
            filter_text: String::new(),
            debounced: String::new(),
            deadline: None,
            debounce,
            sort_key: SortKey::default(),
            sort_dir: SortDirection::default(),
            page: 1,
            page_size: page_size.max(1),
            total_pages: 1,
        }
    }

    /// Starts with a filter already committed, skipping the debounce delay.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_text = filter.into();
        self.debounced = self.filter_text.clone();
        self.deadline = None;
        self.page = 1;
        self
    }

    /// Stores raw input and restarts the debounce timer. The committed query is unchanged.
    pub fn set_filter_text(&mut self, text: impl Into<String>, now: Instant) {
        self.filter_text = text.into();
        self.deadline = Some(now + self.debounce);
    }

    /// Commits pending input if its deadline has passed.
    /// Returns true if the committed filter changed (and the page was reset).
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => self.flush(),
            _ => false,
        }
    }

    /// Commits pending input immediately. Returns true if the committed filter changed.
    pub fn flush(&mut self) -> bool {
        self.deadline = None;
        if self.filter_text == self.debounced {
            return false;
        }
        self.debounced = self.filter_text.clone();
        self.page = 1;
        true
    }

    /// When pending input will commit, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Sorts by `key`: toggles direction if already sorted by it, otherwise ascending.
    /// Always returns to page 1.
    pub fn request_sort(&mut self, key: SortKey) {
        if key == self.sort_key {
            self.sort_dir = self.sort_dir.toggle();
        } else {
            self.sort_key = key;
            self.sort_dir = SortDirection::Asc;
        }
        self.page = 1;
    }

    /// Moves to page `n`, clamped into `[1, total_pages]`. Returns true if the page changed.
    pub fn set_page(&mut self, n: usize) -> bool {
        let page = n.clamp(1, self.total_pages);
        let changed = page != self.page;
        self.page = page;
        changed
    }

    pub fn next_page(&mut self) -> bool {
        self.set_page(self.page.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> bool {
        self.set_page(self.page.saturating_sub(1))
    }

    /// Updates the page count from a row total, clamping the current page.
    pub fn set_total_count(&mut self, total: usize) {
        self.total_pages = crate::projector::total_pages(total, self.page_size);
        self.page = self.page.clamp(1, self.total_pages);
    }

    /// Raw input, as typed
    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    /// Filter in effect
    pub fn debounced_filter(&self) -> &str {
        &self.debounced
    }

    /// True while typed input has not been committed
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_dir
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// The committed query
    pub fn tuple(&self) -> QueryTuple {
        QueryTuple {
            filter: self.debounced.clone(),
            sort_key: self.sort_key,
            sort_dir: self.sort_dir,
            page: self.page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn rapid_input_commits_once() {
        let mut query = QueryState::new(10, ms(400));
        let t0 = Instant::now();
        let mut commits = Vec::new();
        for (i, text) in ["c", "cr", "cra", "cras", "crash"].iter().enumerate() {
            let now = t0 + ms(i as u64 * 50);
            query.set_filter_text(*text, now);
            if query.poll(now) {
                commits.push(query.debounced_filter().to_string());
            }
        }
        // polling repeatedly after quiescence still commits only once
        for step in 0..20 {
            if query.poll(t0 + ms(200 + step * 100)) {
                commits.push(query.debounced_filter().to_string());
            }
        }
        assert_eq!(commits, vec!["crash".to_string()]);
        assert!(!query.is_pending());
    }

    #[test]
    fn raw_text_echoes_immediately() {
        let mut query = QueryState::default();
        let t0 = Instant::now();
        query.set_filter_text("S1", t0);
        assert_eq!(query.filter_text(), "S1");
        assert_eq!(query.debounced_filter(), "");
        assert_eq!(query.next_deadline(), Some(t0 + DEFAULT_DEBOUNCE));
    }

    #[test]
    fn commit_resets_page() {
        let mut query = QueryState::new(10, ms(400));
        query.set_total_count(95);
        assert!(query.set_page(5));
        let t0 = Instant::now();
        query.set_filter_text("x", t0);
        assert_eq!(query.page(), 5);
        assert!(query.poll(t0 + ms(400)));
        assert_eq!(query.page(), 1);
    }

    #[test]
    fn retyping_committed_text_is_not_a_change() {
        let mut query = QueryState::new(10, ms(10)).with_filter("Active");
        let t0 = Instant::now();
        query.set_filter_text("Activ", t0);
        query.set_filter_text("Active", t0 + ms(5));
        assert!(!query.poll(t0 + ms(20)));
        assert_eq!(query.debounced_filter(), "Active");
    }

    #[test]
    fn request_sort_toggles_and_resets_page() {
        let mut query = QueryState::default();
        query.set_total_count(100);
        query.set_page(3);
        query.request_sort(SortKey::Id);
        assert_eq!(query.sort_direction(), SortDirection::Desc);
        assert_eq!(query.page(), 1);

        query.set_page(4);
        query.request_sort(SortKey::Severity);
        assert_eq!(query.sort_key(), SortKey::Severity);
        assert_eq!(query.sort_direction(), SortDirection::Asc);
        assert_eq!(query.page(), 1);

        query.request_sort(SortKey::Severity);
        assert_eq!(query.sort_direction(), SortDirection::Desc);
    }

    #[test]
    fn set_page_clamps() {
        let mut query = QueryState::new(10, ms(400));
        query.set_total_count(0);
        assert_eq!(query.total_pages(), 1);
        assert!(!query.set_page(0));
        assert!(!query.set_page(7));
        assert_eq!(query.page(), 1);

        query.set_total_count(21);
        assert!(query.set_page(99));
        assert_eq!(query.page(), 3);
        assert!(!query.next_page());
        assert!(query.prev_page());
        assert_eq!(query.page(), 2);

        // shrinking the result set pulls the page back in range
        query.set_total_count(5);
        assert_eq!(query.page(), 1);
    }

    #[test]
    fn sort_key_names() {
        assert_eq!("severity".parse::<SortKey>().ok(), Some(SortKey::Severity));
        assert_eq!("DESC".parse::<SortDirection>().ok(), Some(SortDirection::Desc));
        assert_eq!(SortKey::Component.to_string(), "component");
        assert_eq!(SortDirection::Asc.to_string(), "asc");
    }
}
