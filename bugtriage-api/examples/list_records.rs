// Lists the first page of records, most urgent first.
//
// Uses BUGTRIAGE_URL (default http://127.0.0.1:8000) and logs in with
// BUGTRIAGE_USER / BUGTRIAGE_PASSWORD. Start `bugtriage-mock-server` to try it
// without a backend; its users are alice/alice-pw and bob/bob-pw.
//

use bugtriage::prelude::*;

#[tokio::main]
async fn main() -> Result<(), TriageError> {
    let user = std::env::var("BUGTRIAGE_USER").unwrap_or_else(|_| "alice".into());
    let password = std::env::var("BUGTRIAGE_PASSWORD").unwrap_or_else(|_| "alice-pw".into());

    let client = TriageClient::with_config(ClientConfig::default())?;
    client.set_session(client.login(&user, &password).await?);

    let mut explorer = RecordExplorer::new(client);
    explorer.request_sort(SortKey::Severity);
    if let RefreshOutcome::Failed(message) = explorer.refresh(RefreshTrigger::Manual).await {
        eprintln!("fetch failed: {message}");
    }

    let view = explorer.view();
    for row in &view.rows {
        println!(
            "{:>6} {:<4} {:<12} {}",
            row.id.to_string(),
            row.severity,
            row.component,
            row.display_summary()
        );
    }
    println!("page {} of {} ({} records)", view.page, view.total_pages, view.total);
    Ok(())
}
