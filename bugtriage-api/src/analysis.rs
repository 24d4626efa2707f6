//! # AI analysis
//!
//! The backend predicts a severity for free text and looks up similar historical
//! reports. The prediction logic is opaque; this module only carries the results.
//!
//! - [analyze_bug](TriageClient::analyze_bug) - predict severity and find similar bugs
//! - [send_feedback](TriageClient::send_feedback) - report the actual severity for a prediction
//!
//! ```rust,no_run
//! use bugtriage::prelude::*;
//! # async fn example(client: &TriageClient) -> Result<(), TriageError> {
//! let report = client.analyze_bug("App crashes on startup").await?;
//! println!("{} ({}%): {}", report.severity.label, report.severity.confidence, report.severity.action);
//! for similar in &report.similar_bugs {
//!     println!("  #{} {}% {}", similar.id, similar.match_score, similar.summary);
//! }
//! # Ok(())
//! # }
//! ```

use reqwest::Method;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tracing::debug;

use crate::{
    Result,
    config::{ANALYZE_PATH, FEEDBACK_PATH},
    fields::RecordId,
    http_client::HttpRequest,
    prelude::*,
};

/// Predicted severity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityPrediction {
    /// Severity label, e.g. "S1"
    pub label: String,
    /// Confidence, 0-100
    #[serde(default)]
    pub confidence: u8,
    /// Suggested next step
    #[serde(default)]
    pub action: String,
}

impl SeverityPrediction {
    /// The label as a known severity, if it is one.
    pub fn severity(&self) -> Option<Severity> {
        Severity::parse_label(&self.label)
    }
}

/// Historical report resembling the analyzed text
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarBug {
    pub id: RecordId,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub status: String,
    /// Similarity percentage, 0-100
    #[serde(rename = "match", default)]
    pub match_score: u8,
}

impl SimilarBug {
    pub fn is_fixed(&self) -> bool {
        is_fixed(&self.status)
    }
}

/// Result of [`analyze_bug`](TriageClient::analyze_bug)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub severity: SeverityPrediction,
    #[serde(default)]
    pub similar_bugs: Vec<SimilarBug>,
}

impl AnalysisReport {
    /// Most similar historical report
    pub fn best_match(&self) -> Option<&SimilarBug> {
        self.similar_bugs.iter().max_by_key(|bug| bug.match_score)
    }
}

/// Correction sent after a prediction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub summary: String,
    pub predicted_severity: String,
    pub actual_severity: String,
    pub company_id: i64,
}

impl TriageClient {
    /// Predicts severity for `text` and finds similar reports.
    pub async fn analyze_bug(&self, text: &str) -> Result<AnalysisReport> {
        let text = text.trim();
        ensure!(
            !text.is_empty(),
            ValidationSnafu {
                message: "text to analyze is required"
            }
        );
        let req = HttpRequest {
            method: Method::POST,
            path: ANALYZE_PATH.to_string(),
            query: vec![("bug_text".into(), text.to_string())],
            body: None,
        };
        let report: AnalysisReport = self.client.send(req).await?;
        debug!(label=%report.severity.label, similar = report.similar_bugs.len(), "analysis");
        Ok(report)
    }

    /// Records the actual severity of a report whose severity was predicted.
    pub async fn send_feedback(
        &self,
        summary: &str,
        predicted_severity: &str,
        actual_severity: &str,
    ) -> Result<()> {
        let feedback = Feedback {
            summary: summary.to_string(),
            predicted_severity: predicted_severity.to_string(),
            actual_severity: actual_severity.to_string(),
            company_id: self.company_id()?,
        };
        self.client
            .send_no_content(HttpRequest::json(
                Method::POST,
                FEEDBACK_PATH,
                Vec::new(),
                &feedback,
            )?)
            .await
    }
}
