//! common functions for cli
//!

use std::io::{self, BufRead, Write};

use anyhow::{Result, bail};
use bugtriage::prelude::*;

use crate::cli::{AppContext, QueryArgs};

/// Returns `provided`, or reads a line from stdin after printing `prompt`.
pub(crate) fn password_or_prompt(provided: Option<String>, prompt: &str) -> Result<String> {
    if let Some(password) = provided {
        return Ok(password);
    }
    eprint!("{prompt}: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("password is empty");
    }
    Ok(password)
}

/// Asks for y/N on stdin. `skip` answers yes without asking.
pub(crate) fn confirm(prompt: &str, skip: bool) -> Result<bool> {
    if skip {
        return Ok(true);
    }
    eprint!("{prompt} [y/N] ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

/// Turns a refresh that did not apply into an error.
/// Login problems become [`TriageError::Unauthorized`] so the exit code says so.
pub(crate) fn ensure_applied(outcome: RefreshOutcome) -> Result<()> {
    match outcome {
        RefreshOutcome::Applied | RefreshOutcome::Local => Ok(()),
        RefreshOutcome::Unauthenticated => Err(TriageError::Unauthorized.into()),
        RefreshOutcome::Failed(message) => bail!("fetch failed: {message}"),
        RefreshOutcome::Superseded => bail!("fetch superseded"),
    }
}

/// Explorer with the query from the command line, loaded.
pub(crate) async fn loaded_explorer(ctx: &AppContext, query: &QueryArgs) -> Result<RecordExplorer> {
    let mut explorer = RecordExplorer::new(ctx.client.clone());
    if let Some(filter) = &query.filter {
        explorer = explorer.with_filter(filter.clone());
    }
    let key = query.sort.to_key();
    explorer.request_sort(key);
    // request_sort toggles when the key is already active (id is the default)
    if (explorer.query().sort_direction() == SortDirection::Desc) != query.desc {
        explorer.request_sort(key);
    }
    ensure_applied(explorer.refresh(RefreshTrigger::Manual).await)?;
    Ok(explorer)
}
