// Exports every record matching a filter to CSV.
//
// usage: cargo run --example export_records -- [FILTER] [PATH]
//
// Set BUGTRIAGE_FETCH_MODE=server to have the backend render the file.
//

use bugtriage::prelude::*;

#[tokio::main]
async fn main() -> Result<(), TriageError> {
    let mut args = std::env::args().skip(1);
    let filter = args.next().unwrap_or_default();
    let path = args.next().unwrap_or_else(|| EXPORT_FILE_NAME.to_string());

    let client = TriageClient::with_config(ClientConfig::default())?;
    client.set_session(client.login("alice", "alice-pw").await?);

    let mut explorer = RecordExplorer::new(client).with_filter(filter);
    explorer.refresh(RefreshTrigger::Manual).await;
    let bytes = explorer.export(&path).await?;
    println!("wrote {bytes} bytes to {path} ({} mode)", explorer.mode());
    Ok(())
}
