//! Integration tests for fetch failures and overlapping fetches
//!
//! ```bash
//! cargo test -p bugtriage --test test_fetch_errors
//! ```

mod common;

use std::sync::Arc;
use std::time::Duration;

use bugtriage::{
    prelude::*,
    test_util::{TestResult, test_client, with_server_context},
};
use common::{CountingNavigator, crash_and_minor, explorer, ids, server_with};

// =============================================================================
// Authentication
// =============================================================================

#[test_log::test(tokio::test)]
async fn test_401_signals_login_once_without_banner() -> TestResult<()> {
    with_server_context(server_with(crash_and_minor()), FetchMode::ClientSide, |ctx| async move {
        let (mut explorer, navigator) = explorer(&ctx);
        ctx.server.revoke_tokens();

        let outcome = explorer.refresh(RefreshTrigger::Manual).await;
        assert_eq!(outcome, RefreshOutcome::Unauthenticated);
        assert_eq!(navigator.calls(), 1);
        assert_eq!(explorer.load_state(), &LoadState::Unauthenticated);
        let view = explorer.view();
        assert_eq!(view.status, ExplorerStatus::LoginRequired);
        assert!(!matches!(view.status, ExplorerStatus::Error(_)));
        Ok(())
    })
    .await
}

#[test_log::test(tokio::test)]
async fn test_missing_session_is_unauthenticated() -> TestResult<()> {
    with_server_context(server_with(crash_and_minor()), FetchMode::ServerSide, |ctx| async move {
        let client = test_client(&ctx.server.url(), FetchMode::ServerSide)?;
        let navigator = Arc::new(CountingNavigator::default());
        let mut explorer =
            RecordExplorer::new(client).with_navigator(Arc::clone(&navigator) as Arc<dyn Navigator>);

        let outcome = explorer.refresh(RefreshTrigger::Manual).await;
        assert_eq!(outcome, RefreshOutcome::Unauthenticated);
        assert_eq!(navigator.calls(), 1);
        // no request reached the backend
        assert_eq!(ctx.server.request_count("/api/hub/explorer"), 0);
        Ok(())
    })
    .await
}

#[test_log::test(tokio::test)]
async fn test_login_after_401_recovers() -> TestResult<()> {
    with_server_context(server_with(crash_and_minor()), FetchMode::ClientSide, |ctx| async move {
        let (mut explorer, navigator) = explorer(&ctx);
        ctx.server.fail_next(401);
        explorer.refresh(RefreshTrigger::Manual).await;
        assert_eq!(navigator.calls(), 1);

        let session = ctx.client.login("alice", "alice-pw").await?;
        ctx.client.set_session(session);
        let outcome = explorer.refresh(RefreshTrigger::Manual).await;
        assert_eq!(outcome, RefreshOutcome::Applied);
        assert_eq!(explorer.view().status, ExplorerStatus::Rows);
        assert_eq!(navigator.calls(), 1);
        Ok(())
    })
    .await
}

// =============================================================================
// Other failures
// =============================================================================

#[test_log::test(tokio::test)]
async fn test_error_keeps_last_rows() -> TestResult<()> {
    with_server_context(server_with(crash_and_minor()), FetchMode::ClientSide, |ctx| async move {
        let (mut explorer, navigator) = explorer(&ctx);
        explorer.refresh(RefreshTrigger::Manual).await;
        assert_eq!(explorer.view().rows.len(), 2);

        ctx.server.fail_next(500);
        let outcome = explorer.refresh(RefreshTrigger::Interval).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(_)));

        let view = explorer.view();
        assert!(matches!(view.status, ExplorerStatus::Error(_)));
        assert_eq!(ids(&view.rows), ["1", "3"]);
        assert_eq!(navigator.calls(), 0);

        // the next good fetch clears the banner
        assert_eq!(
            explorer.refresh(RefreshTrigger::Manual).await,
            RefreshOutcome::Applied
        );
        assert_eq!(explorer.view().status, ExplorerStatus::Rows);
        Ok(())
    })
    .await
}

// =============================================================================
// Overlapping fetches
// =============================================================================

#[test_log::test(tokio::test)]
async fn test_stale_result_is_dropped() -> TestResult<()> {
    with_server_context(server_with(crash_and_minor()), FetchMode::ClientSide, |ctx| async move {
        let (mut explorer, _) = explorer(&ctx);

        // the older fetch fails, but finishes after the newer one was issued
        ctx.server.fail_next(500);
        let older = explorer
            .begin_fetch(RefreshTrigger::Manual)
            .expect("manual refresh fetches");
        let older = older.run().await;

        let newer = explorer
            .begin_fetch(RefreshTrigger::Interval)
            .expect("interval refresh fetches");
        assert!(newer.ticket() > older.ticket());
        assert_eq!(explorer.view().status, ExplorerStatus::Loading);
        let newer = newer.run().await;

        assert_eq!(explorer.apply(newer), RefreshOutcome::Applied);
        assert_eq!(explorer.apply(older), RefreshOutcome::Superseded);
        assert_eq!(explorer.load_state(), &LoadState::Loaded);
        assert_eq!(explorer.view().rows.len(), 2);
        Ok(())
    })
    .await
}

#[test_log::test(tokio::test)]
async fn test_slow_fetch_overtaken() -> TestResult<()> {
    with_server_context(server_with(crash_and_minor()), FetchMode::ServerSide, |ctx| async move {
        let (mut explorer, _) = explorer(&ctx);
        ctx.server.delay_next(Duration::from_millis(300));
        let slow = explorer
            .begin_fetch(RefreshTrigger::Manual)
            .expect("fetch");
        let slow = tokio::spawn(slow.run());
        // let the slow request reach the server first
        tokio::time::sleep(Duration::from_millis(50)).await;

        explorer.set_filter_text("crash", std::time::Instant::now());
        explorer.flush_filter();
        let fast = explorer
            .begin_fetch(RefreshTrigger::QueryChange)
            .expect("server-side query change fetches");
        let fast = fast.run().await;
        assert_eq!(explorer.apply(fast), RefreshOutcome::Applied);

        let slow = slow.await.expect("join");
        assert_eq!(explorer.apply(slow), RefreshOutcome::Superseded);
        assert_eq!(ids(&explorer.view().rows), ["3"]);
        Ok(())
    })
    .await
}
