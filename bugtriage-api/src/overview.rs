//! # Overview statistics
//!
//! Dashboard totals, per-component counts, and the most recent reports.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Result,
    config::OVERVIEW_PATH,
    fields::{BugRow, FieldTable},
    http_client::HttpRequest,
    prelude::*,
};

/// Headline counts
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverviewStats {
    /// Records in the company's database
    #[serde(default)]
    pub total_db: u64,
    /// Records the AI has analyzed
    #[serde(default)]
    pub analyzed: u64,
    /// Records with the most urgent severity
    #[serde(default)]
    pub critical: u64,
    /// Distinct components
    #[serde(default)]
    pub components: u64,
}

/// Records per component
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCount {
    pub name: String,
    pub count: u64,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct Charts {
    #[serde(default)]
    components: Vec<ComponentCount>,
}

#[derive(Deserialize)]
struct OverviewResponse {
    #[serde(default)]
    stats: OverviewStats,
    #[serde(default)]
    charts: Charts,
    #[serde(default)]
    recent: Vec<Value>,
}

/// Dashboard overview
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub stats: OverviewStats,
    /// Busiest components first
    pub components: Vec<ComponentCount>,
    /// Most recent reports, normalized
    pub recent: Vec<BugRow>,
}

impl Overview {
    fn from_response(response: OverviewResponse) -> Self {
        let table = FieldTable::default();
        let mut components = response.charts.components;
        components.sort_by(|a, b| b.count.cmp(&a.count));
        Overview {
            stats: response.stats,
            components,
            recent: response.recent.iter().map(|r| table.normalize(r)).collect(),
        }
    }

    /// Share of records analyzed, in percent
    pub fn analyzed_percent(&self) -> f64 {
        if self.stats.total_db == 0 {
            0.0
        } else {
            self.stats.analyzed as f64 * 100.0 / self.stats.total_db as f64
        }
    }
}

impl TriageClient {
    /// Returns the overview for the session's company.
    pub async fn overview(&self) -> Result<Overview> {
        let req = HttpRequest::get(
            OVERVIEW_PATH,
            vec![("company_id".into(), self.company_id()?.to_string())],
        );
        let response: OverviewResponse = self.client.send(req).await?;
        Ok(Overview::from_response(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dashboard_payload() {
        let response: OverviewResponse = serde_json::from_str(
            r#"{
                "stats": {"total_db": 200, "analyzed": 50, "critical": 3, "components": 2},
                "charts": {"components": [{"name": "DOM", "count": 4}, {"name": "JS Engine", "count": 9}]},
                "recent": [{"bug_id": 9821, "summary": "Crash in WebGL", "priority": "S1"}]
            }"#,
        )
        .expect("parse");
        let overview = Overview::from_response(response);
        assert_eq!(overview.stats.critical, 3);
        assert_eq!(overview.components[0].name, "JS Engine");
        assert_eq!(overview.recent[0].severity, "S1");
        assert!((overview.analyzed_percent() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_sections_default() {
        let response: OverviewResponse = serde_json::from_str("{}").expect("parse");
        let overview = Overview::from_response(response);
        assert_eq!(overview, Overview::default());
        assert_eq!(overview.analyzed_percent(), 0.0);
    }
}
