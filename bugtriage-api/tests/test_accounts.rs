//! Integration tests for login, registration and session handling
//!
//! ```bash
//! cargo test -p bugtriage --test test_accounts
//! ```

mod common;

use bugtriage::{
    prelude::*,
    test_util::{TestResult, test_client, with_test_context},
};

#[test_log::test(tokio::test)]
async fn test_login_returns_company_session() -> TestResult<()> {
    with_test_context(|ctx| async move {
        let session = ctx.client.session().expect("logged in");
        assert_eq!(session.username, "alice");
        assert_eq!(session.company_id, ctx.company_id);
        assert_eq!(session.role, "admin");

        let err = ctx
            .client
            .login("alice", "wrong")
            .await
            .expect_err("bad password");
        assert!(matches!(err, TriageError::Auth { .. }));
        Ok(())
    })
    .await
}

#[test_log::test(tokio::test)]
async fn test_register_then_login() -> TestResult<()> {
    with_test_context(|ctx| async move {
        let client = test_client(&ctx.server.url(), FetchMode::ClientSide)?;
        let username = format!("carol_{}", bugtriage::test_util::unique_suffix());
        let registration = client.register(&username, "carol-pw", "Carol Co").await?;
        let company_id = registration.company_id.expect("new company");
        assert_ne!(company_id, ctx.company_id);

        let err = client
            .register(&username, "other", "Carol Co")
            .await
            .expect_err("duplicate user");
        assert!(matches!(err, TriageError::ApiError { code: 400, .. }));

        let session = client.login(&username, "carol-pw").await?;
        assert_eq!(session.company_id, company_id);
        client.set_session(session);

        // a new company starts with no records
        let mut explorer = RecordExplorer::new(client.clone());
        explorer.refresh(RefreshTrigger::Manual).await;
        assert_eq!(explorer.view().status, ExplorerStatus::Empty);
        Ok(())
    })
    .await
}

#[test_log::test(tokio::test)]
async fn test_reset_password_and_delete_account() -> TestResult<()> {
    with_test_context(|ctx| async move {
        let client = test_client(&ctx.server.url(), FetchMode::ClientSide)?;
        client.register("dave", "old-pw", "Dave Co").await?;
        client.reset_password("dave", "new-pw").await?;
        assert!(matches!(
            client.login("dave", "old-pw").await,
            Err(TriageError::Auth { .. })
        ));
        let session = client.login("dave", "new-pw").await?;
        client.set_session(session);

        assert!(matches!(
            client.delete_account("dave", "old-pw").await,
            Err(TriageError::Auth { .. })
        ));
        assert!(client.has_session());
        client.delete_account("dave", "new-pw").await?;
        assert!(!client.has_session());
        assert!(client.login("dave", "new-pw").await.is_err());
        Ok(())
    })
    .await
}

#[test_log::test(tokio::test)]
async fn test_logout_and_session_file() -> TestResult<()> {
    with_test_context(|ctx| async move {
        let dir = ctx.temp_dir("session")?;
        let path = dir.join("session.json");
        let session = ctx.client.session().expect("logged in");
        session.save(&path)?;

        ctx.client.logout();
        assert!(!ctx.client.has_session());
        let err = ctx.client.overview().await.expect_err("no session");
        assert!(err.is_unauthenticated());

        let restored = Session::load(&path)?;
        assert_eq!(restored.username, session.username);
        ctx.client.set_session(restored);
        ctx.client.overview().await?;

        Session::remove(&path)?;
        assert!(matches!(
            Session::load(&path),
            Err(TriageError::SessionFile { .. })
        ));
        // removing twice is fine
        Session::remove(&path)?;
        Ok(())
    })
    .await
}
