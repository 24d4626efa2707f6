use std::net::SocketAddr;
use std::str::FromStr;

use bugtriage::mock::{MOCK_USERS, MockTriageServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8000".to_string());
    let addr = SocketAddr::from_str(&addr)?;
    let handle = MockTriageServer::new().start(addr).await?;
    let users = MOCK_USERS
        .iter()
        .map(|(user, password, company, _)| format!("{user}/{password} (company {company})"))
        .collect::<Vec<_>>()
        .join(", ");
    println!("mock triage server listening on {} (users: {users})", handle.url());
    tokio::signal::ctrl_c().await?;
    handle.shutdown().await;
    Ok(())
}
