//! # Training batches
//!
//! Each bulk import is tracked as a batch so it can be undone.
//!
//! - [batches](TriageClient::batches) - list the company's batches, newest first
//! - [undo_batch](TriageClient::undo_batch) - delete a batch and the records it imported

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Result, config::BATCHES_PATH, http_client::HttpRequest, prelude::*};

/// One bulk import
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub record_count: u64,
    /// Model accuracy after training on this batch
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Upload time as sent by the backend
    #[serde(default)]
    pub upload_time: Option<String>,
}

impl Batch {
    /// Upload time, if present and in a recognized format (RFC 3339, or naive UTC).
    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        let text = self.upload_time.as_deref()?.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
            return Some(ts.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}

impl TriageClient {
    /// Lists batches for the session's company, newest first.
    pub async fn batches(&self) -> Result<Vec<Batch>> {
        let req = HttpRequest::get(
            BATCHES_PATH,
            vec![("company_id".into(), self.company_id()?.to_string())],
        );
        let mut batches: Vec<Batch> = self.client.send(req).await?;
        batches.sort_by(|a, b| b.uploaded_at().cmp(&a.uploaded_at()).then(b.id.cmp(&a.id)));
        Ok(batches)
    }

    /// Undoes a batch: the backend deletes it with its records.
    pub async fn undo_batch(&self, batch_id: i64) -> Result<()> {
        self.client
            .send_no_content(HttpRequest {
                method: Method::DELETE,
                path: format!("{BATCHES_PATH}/{batch_id}"),
                query: vec![("company_id".into(), self.company_id()?.to_string())],
                body: None,
            })
            .await?;
        info!(batch_id, "batch undone");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upload_times() {
        let batch: Batch = serde_json::from_str(
            r#"{"id":1,"filename":"jan.csv","record_count":120,"accuracy":0.91,"upload_time":"2025-01-05T10:00:00"}"#,
        )
        .expect("parse");
        let ts = batch.uploaded_at().expect("time");
        assert_eq!(ts.to_rfc3339(), "2025-01-05T10:00:00+00:00");

        let rfc: Batch =
            serde_json::from_str(r#"{"id":2,"upload_time":"2025-01-05T10:00:00+02:00"}"#).expect("parse");
        assert_eq!(
            rfc.uploaded_at().map(|t| t.to_rfc3339()),
            Some("2025-01-05T08:00:00+00:00".to_string())
        );

        let none: Batch = serde_json::from_str(r#"{"id":3,"upload_time":"yesterday"}"#).expect("parse");
        assert!(none.uploaded_at().is_none());
        assert!(none.accuracy.is_none());
    }
}
