//! # Bug submission and deletion
//!
//! - [create_bug](TriageClient::create_bug) - submit a new report
//! - [delete_bug](TriageClient::delete_bug) - delete a report by id
//!
//! ```rust,no_run
//! use bugtriage::prelude::*;
//! # async fn example(client: &TriageClient) -> Result<(), TriageError> {
//! let bug = NewBug::new("Crash when opening settings")
//!     .component("Frontend")
//!     .severity("S1");
//! client.create_bug(&bug).await?;
//! # Ok(())
//! # }
//! ```

use reqwest::Method;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tracing::info;

use crate::{
    Result,
    config::{BUG_PATH, MAX_SUMMARY_LEN},
    fields::{BugRow, RecordId},
    http_client::HttpRequest,
    pending::ChangeId,
    prelude::*,
};

/// Status given to new reports unless one is set
pub const DEFAULT_STATUS: &str = "NEW";

/// Platform given to new reports unless one is set
pub const DEFAULT_PLATFORM: &str = "Windows";

/// A report to submit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBug {
    pub summary: String,
    pub component: String,
    pub severity: String,
    pub status: String,
    pub platform: String,
}

impl NewBug {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            component: String::new(),
            severity: String::new(),
            status: DEFAULT_STATUS.to_string(),
            platform: DEFAULT_PLATFORM.to_string(),
        }
    }

    #[must_use]
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    #[must_use]
    pub fn severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = severity.into();
        self
    }

    #[must_use]
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    #[must_use]
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Checks the report before it is sent: the summary must be non-blank and at
    /// most 4000 characters; blank status and platform get their defaults.
    pub fn validate(&mut self) -> Result<()> {
        self.summary = self.summary.trim().to_string();
        ensure!(
            !self.summary.is_empty(),
            ValidationSnafu {
                message: "summary is required"
            }
        );
        let len = self.summary.chars().count();
        ensure!(
            len <= MAX_SUMMARY_LEN,
            ValidationSnafu {
                message: format!("summary is {len} characters; the limit is {MAX_SUMMARY_LEN}")
            }
        );
        if self.status.trim().is_empty() {
            self.status = DEFAULT_STATUS.to_string();
        }
        if self.platform.trim().is_empty() {
            self.platform = DEFAULT_PLATFORM.to_string();
        }
        Ok(())
    }

    /// Row shown while the submission is in flight.
    pub fn tentative_row(&self, change: ChangeId) -> BugRow {
        BugRow {
            id: RecordId::Text(change.to_string()),
            summary: self.summary.clone(),
            component: self.component.clone(),
            severity: self.severity.clone(),
            status: self.status.clone(),
        }
    }
}

#[derive(Serialize)]
struct CreateBugRequest<'a> {
    bug: &'a NewBug,
    company_id: i64,
}

#[derive(Deserialize)]
struct CreateBugResponse {
    #[serde(default)]
    message: String,
}

impl TriageClient {
    /// Submits a report for the session's company. The report is validated first.
    /// Returns the backend's confirmation message.
    pub async fn create_bug(&self, bug: &NewBug) -> Result<String> {
        let mut bug = bug.clone();
        bug.validate()?;
        let request = CreateBugRequest {
            bug: &bug,
            company_id: self.company_id()?,
        };
        let response: CreateBugResponse = self
            .client
            .send(HttpRequest::json(Method::POST, BUG_PATH, Vec::new(), &request)?)
            .await?;
        info!(component=%bug.component, severity=%bug.severity, "bug submitted");
        Ok(response.message)
    }

    /// Deletes a report.
    pub async fn delete_bug(&self, id: &RecordId) -> Result<()> {
        let path = format!("{BUG_PATH}/{id}");
        self.client
            .send_no_content(HttpRequest {
                method: Method::DELETE,
                path,
                query: vec![("company_id".into(), self.company_id()?.to_string())],
                body: None,
            })
            .await?;
        info!(%id, "bug deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_builders() {
        let bug = NewBug::new("x").component("Core").severity("S2");
        assert_eq!(bug.status, "NEW");
        assert_eq!(bug.platform, "Windows");
        assert_eq!(bug.component, "Core");
    }

    #[test]
    fn validation() {
        let mut blank = NewBug::new("   ");
        assert!(matches!(blank.validate(), Err(TriageError::Validation { .. })));

        let mut long = NewBug::new("a".repeat(MAX_SUMMARY_LEN + 1));
        assert!(long.validate().is_err());

        let mut ok = NewBug::new("  trimmed  ").status("").platform(" ");
        ok.validate().expect("valid");
        assert_eq!(ok.summary, "trimmed");
        assert_eq!(ok.status, DEFAULT_STATUS);
        assert_eq!(ok.platform, DEFAULT_PLATFORM);
    }

    #[test]
    fn request_shape() {
        let bug = NewBug::new("boom").component("Core").severity("S1");
        let body = serde_json::to_value(CreateBugRequest {
            bug: &bug,
            company_id: 5,
        })
        .expect("serialize");
        assert_eq!(
            body,
            serde_json::json!({
                "bug": {"summary":"boom","component":"Core","severity":"S1","status":"NEW","platform":"Windows"},
                "company_id": 5
            })
        );
    }
}
