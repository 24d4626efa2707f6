mod app;
mod keys;
mod ui;

use std::time::Duration;

use anyhow::Result;
use bugtriage::prelude::*;

use crate::cli::AppContext;

/// Full-screen record explorer. Returns [`TriageError::Unauthorized`] if the
/// session is missing or rejected, so the caller can send the user to login.
pub async fn run_explorer(ctx: &AppContext, filter: Option<String>, refresh_secs: u64) -> Result<()> {
    if !ctx.client.has_session() {
        return Err(TriageError::NoSession.into());
    }
    let mut explorer = RecordExplorer::new(ctx.client.clone());
    if let Some(filter) = filter {
        explorer = explorer.with_filter(filter);
    }
    let refresh_every = (refresh_secs > 0).then(|| Duration::from_secs(refresh_secs));
    app::App::run(explorer, refresh_every).await
}
