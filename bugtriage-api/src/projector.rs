//! # Projection
//!
//! Pure functions deriving what the explorer shows from rows and a [`QueryTuple`]:
//! filter, stable sort, and page slicing. The same functions back the mock
//! server's server-side mode, so both fetch modes order rows identically.

use std::cmp::Ordering;

use crate::{
    fields::{BugRow, CANONICAL_FIELDS},
    query::{QueryTuple, SortDirection, SortKey},
};

/// Number of pages for `count` rows. Never less than 1.
pub fn total_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1)).max(1)
}

/// Case-insensitive substring match against id, summary, component, severity and status.
/// An empty filter matches every row.
pub fn matches_filter(row: &BugRow, filter: &str) -> bool {
    let needle = filter.to_lowercase();
    if needle.is_empty() {
        return true;
    }
    CANONICAL_FIELDS
        .iter()
        .any(|field| row.field(field).to_lowercase().contains(&needle))
}

/// Compares two rows on a sort key: ids numerically, everything else as lowercase text.
pub fn compare(a: &BugRow, b: &BugRow, key: SortKey) -> Ordering {
    match key {
        SortKey::Id => a.id.cmp(&b.id),
        other => {
            let field = other.field();
            a.field(field)
                .to_lowercase()
                .cmp(&b.field(field).to_lowercase())
        }
    }
}

/// Stable sort. Rows that compare equal keep their input order in both directions.
pub fn sort_rows(rows: &mut [BugRow], key: SortKey, dir: SortDirection) {
    match dir {
        SortDirection::Asc => rows.sort_by(|a, b| compare(a, b, key)),
        SortDirection::Desc => rows.sort_by(|a, b| compare(b, a, key)),
    }
}

/// Filters and sorts: the full result set a query selects.
pub fn filter_and_sort<'a, I>(rows: I, query: &QueryTuple) -> Vec<BugRow>
where
    I: IntoIterator<Item = &'a BugRow>,
{
    let mut selected: Vec<BugRow> = rows
        .into_iter()
        .filter(|row| matches_filter(row, &query.filter))
        .cloned()
        .collect();
    sort_rows(&mut selected, query.sort_key, query.sort_dir);
    selected
}

/// Rows on a 1-based page. Out of range pages are empty.
pub fn page_slice(rows: &[BugRow], page: usize, page_size: usize) -> &[BugRow] {
    let page_size = page_size.max(1);
    let start = page.saturating_sub(1).saturating_mul(page_size);
    if start >= rows.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(rows.len());
    &rows[start..end]
}

/// One visible page of a result set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub rows: Vec<BugRow>,
    /// 1-based page number, clamped into range
    pub page: usize,
    pub total_pages: usize,
    /// Rows matching the filter, across all pages
    pub total: usize,
}

/// Filter, sort and slice in one step.
pub fn project<'a, I>(rows: I, query: &QueryTuple, page_size: usize) -> Page
where
    I: IntoIterator<Item = &'a BugRow>,
{
    let selected = filter_and_sort(rows, query);
    let total = selected.len();
    let total_pages = total_pages(total, page_size);
    let page = query.page.clamp(1, total_pages);
    Page {
        rows: page_slice(&selected, page, page_size).to_vec(),
        page,
        total_pages,
        total,
    }
}
