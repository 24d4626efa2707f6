//! Integration tests for the record explorer in client-side mode
//!
//! Each test starts an in-process mock backend on a free port, so no external
//! services are needed.
//!
//! ```bash
//! cargo test -p bugtriage --test test_explorer
//! ```

mod common;

use std::time::{Duration, Instant};

use bugtriage::{
    prelude::*,
    test_util::{TestResult, with_server_context},
};
use common::{crash_and_minor, explorer, ids, numbered, record, server_with};

const RECORDS: &str = "/api/hub/explorer";

// =============================================================================
// Filter and sort
// =============================================================================

#[test_log::test(tokio::test)]
async fn test_filter_and_sort_locally() -> TestResult<()> {
    with_server_context(server_with(crash_and_minor()), FetchMode::ClientSide, |ctx| async move {
        let (mut explorer, _) = explorer(&ctx);
        assert_eq!(explorer.view().status, ExplorerStatus::Loading);

        let outcome = explorer.refresh(RefreshTrigger::Manual).await;
        assert_eq!(outcome, RefreshOutcome::Applied);
        let view = explorer.view();
        assert_eq!(view.status, ExplorerStatus::Rows);
        assert_eq!(ids(&view.rows), ["1", "3"]);

        explorer.set_filter_text("crash", Instant::now());
        assert!(explorer.flush_filter());
        let outcome = explorer.refresh(RefreshTrigger::QueryChange).await;
        assert_eq!(outcome, RefreshOutcome::Local);
        let view = explorer.view();
        assert_eq!(ids(&view.rows), ["3"]);
        assert_eq!(view.total, 1);

        // query changes are answered from the snapshot
        assert_eq!(ctx.server.request_count(RECORDS), 1);
        Ok(())
    })
    .await
}

#[test_log::test(tokio::test)]
async fn test_severity_sort_toggles() -> TestResult<()> {
    let records = vec![
        record(1, "S2", "b", "NEW"),
        record(2, "S1", "a", "NEW"),
        record(3, "S3", "c", "NEW"),
    ];
    with_server_context(server_with(records), FetchMode::ClientSide, |ctx| async move {
        let (mut explorer, _) = explorer(&ctx);
        explorer.refresh(RefreshTrigger::Manual).await;

        explorer.request_sort(SortKey::Severity);
        let asc: Vec<String> = explorer.view().rows.iter().map(|r| r.severity.clone()).collect();
        assert_eq!(asc, ["S1", "S2", "S3"]);

        explorer.request_sort(SortKey::Severity);
        let view = explorer.view();
        assert_eq!(view.sort_dir, SortDirection::Desc);
        let desc: Vec<String> = view.rows.iter().map(|r| r.severity.clone()).collect();
        assert_eq!(desc, ["S3", "S2", "S1"]);

        let mut reversed = asc.clone();
        reversed.reverse();
        assert_eq!(desc, reversed);
        Ok(())
    })
    .await
}

#[test_log::test(tokio::test)]
async fn test_initial_filter_applies_without_delay() -> TestResult<()> {
    with_server_context(server_with(crash_and_minor()), FetchMode::ClientSide, |ctx| async move {
        let (explorer, _) = explorer(&ctx);
        let mut explorer = explorer.with_filter("S1");
        explorer.refresh(RefreshTrigger::Manual).await;
        let view = explorer.view();
        assert_eq!(view.filter, "S1");
        assert_eq!(ids(&view.rows), ["3"]);
        Ok(())
    })
    .await
}

#[test_log::test(tokio::test)]
async fn test_no_match_is_empty_not_error() -> TestResult<()> {
    with_server_context(server_with(crash_and_minor()), FetchMode::ClientSide, |ctx| async move {
        let (mut explorer, _) = explorer(&ctx);
        explorer.refresh(RefreshTrigger::Manual).await;
        explorer.set_filter_text("no such bug", Instant::now());
        explorer.flush_filter();
        let view = explorer.view();
        assert_eq!(view.status, ExplorerStatus::Empty);
        assert!(view.rows.is_empty());
        assert_eq!(view.total_pages, 1);
        assert_eq!(view.page, 1);
        Ok(())
    })
    .await
}

// =============================================================================
// Debounce and paging
// =============================================================================

#[test_log::test(tokio::test)]
async fn test_debounced_filter_resets_page() -> TestResult<()> {
    with_server_context(server_with(numbered(25)), FetchMode::ClientSide, |ctx| async move {
        let (mut explorer, _) = explorer(&ctx);
        explorer.refresh(RefreshTrigger::Manual).await;
        assert_eq!(explorer.view().total_pages, 3);
        assert!(explorer.set_page(3));
        assert_eq!(explorer.view().rows.len(), 5);

        // two keystrokes inside the quiet period commit once
        let start = Instant::now();
        explorer.set_filter_text("report 1", start);
        explorer.set_filter_text("report 2", start + Duration::from_millis(20));
        assert!(!explorer.poll(start + Duration::from_millis(40)));
        assert_eq!(explorer.view().filter, "");
        assert_eq!(explorer.view().filter_text, "report 2");
        assert_eq!(explorer.view().page, 3);

        let deadline = explorer.next_deadline().expect("pending input");
        assert!(explorer.poll(deadline));
        assert!(!explorer.poll(deadline + Duration::from_secs(1)));

        let view = explorer.view();
        assert_eq!(view.filter, "report 2");
        assert_eq!(view.page, 1);
        // "report 2" and "report 20".."report 25"
        assert_eq!(view.total, 7);
        Ok(())
    })
    .await
}

#[test_log::test(tokio::test)]
async fn test_page_clamps_into_range() -> TestResult<()> {
    with_server_context(server_with(numbered(25)), FetchMode::ClientSide, |ctx| async move {
        let (mut explorer, _) = explorer(&ctx);
        explorer.refresh(RefreshTrigger::Manual).await;

        assert!(explorer.set_page(9));
        assert_eq!(explorer.view().page, 3);
        assert!(!explorer.next_page());
        assert!(explorer.prev_page());
        assert_eq!(ids(&explorer.view().rows)[0], "11");

        explorer.request_sort(SortKey::Id);
        let view = explorer.view();
        assert_eq!(view.page, 1);
        assert_eq!(view.sort_dir, SortDirection::Desc);
        assert_eq!(ids(&view.rows)[0], "25");
        Ok(())
    })
    .await
}

// =============================================================================
// Record shapes
// =============================================================================

#[test_log::test(tokio::test)]
async fn test_mixed_record_shapes_normalize() -> TestResult<()> {
    with_server_context(
        bugtriage::mock::MockTriageServer::new(),
        FetchMode::ClientSide,
        |ctx| async move {
            let (mut explorer, _) = explorer(&ctx);
            explorer.refresh(RefreshTrigger::Manual).await;
            let rows = explorer.selected_rows();
            let find = |id: i64| {
                rows.iter()
                    .find(|row| row.id == RecordId::Int(id))
                    .cloned()
                    .expect("seeded row")
            };
            // nested under data
            assert_eq!(find(2).component, "Layout");
            assert_eq!(find(2).summary, "Flexbox alignment breaks on mobile view");
            // aliased keys
            assert_eq!(find(3).component, "Storage");
            assert_eq!(find(3).severity, "S2");
            // imported rows without a component resolve to empty text
            assert_eq!(find(501).component, "");
            Ok(())
        },
    )
    .await
}
