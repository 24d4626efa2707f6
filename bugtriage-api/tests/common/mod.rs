//! Shared test utilities for bugtriage integration tests
//!
//! - record fixtures in the shapes the backend sends
//! - an explorer wired to a mock server
//! - a navigator that counts login signals
#![cfg(test)]
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use bugtriage::mock::MockTriageServer;
use bugtriage::prelude::*;

pub use bugtriage::test_util::TestContext;

/// Company of the first mock user
pub const COMPANY: i64 = 1;

/// Flat record
pub fn record(id: i64, severity: &str, summary: &str, status: &str) -> Value {
    json!({"id": id, "severity": severity, "summary": summary, "status": status})
}

/// The two-record collection used by the filter and sort scenarios
pub fn crash_and_minor() -> Vec<Value> {
    vec![
        record(3, "S1", "crash A", "Active"),
        record(1, "S3", "minor B", "Fixed"),
    ]
}

/// `count` records with ids 1..=count and rotating severities
pub fn numbered(count: i64) -> Vec<Value> {
    (1..=count)
        .map(|id| {
            let severity = ["S1", "S2", "S3", "S4"][(id % 4) as usize];
            record(id, severity, &format!("report {id}"), "NEW")
        })
        .collect()
}

pub fn server_with(records: Vec<Value>) -> MockTriageServer {
    MockTriageServer::new().with_records(COMPANY, records)
}

pub fn ids(rows: &[BugRow]) -> Vec<String> {
    rows.iter().map(|row| row.id.to_string()).collect()
}

/// Navigator that counts how often login was requested
#[derive(Default)]
pub struct CountingNavigator {
    calls: AtomicUsize,
}

impl CountingNavigator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Navigator for CountingNavigator {
    fn login_required(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Explorer over the context's client, with a counting navigator attached.
pub fn explorer(ctx: &TestContext) -> (RecordExplorer, Arc<CountingNavigator>) {
    let navigator = Arc::new(CountingNavigator::default());
    let explorer = RecordExplorer::new(ctx.client.clone())
        .with_navigator(Arc::clone(&navigator) as Arc<dyn Navigator>);
    (explorer, navigator)
}
