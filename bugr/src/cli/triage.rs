//! submit, analyze, feedback, and overview

use anyhow::Result;
use bugtriage::prelude::*;
use serde_json::json;
use tracing::info;

use crate::{
    cli::AppContext,
    output::{OutputFormat, render_table},
};

/// Submits `bug`. With `analyze`, the prediction fills in a missing severity,
/// and an explicit severity that disagrees with it is sent back as feedback.
pub async fn submit(
    ctx: &AppContext,
    mut bug: NewBug,
    severity: Option<String>,
    analyze: bool,
) -> Result<()> {
    bug.validate()?;
    let report = if analyze {
        Some(ctx.client.analyze_bug(&bug.summary).await?)
    } else {
        None
    };

    let mut feedback_sent = false;
    bug.severity = match (&report, severity) {
        (Some(report), Some(actual)) => {
            if !actual.eq_ignore_ascii_case(&report.severity.label) {
                ctx.client
                    .send_feedback(&bug.summary, &report.severity.label, &actual)
                    .await?;
                info!(predicted=%report.severity.label, %actual, "correction sent");
                feedback_sent = true;
            }
            actual
        }
        (Some(report), None) => report.severity.label.clone(),
        (None, Some(actual)) => actual,
        (None, None) => String::new(),
    };

    let message = ctx.client.create_bug(&bug).await?;

    if ctx.output.format() == OutputFormat::Table {
        let mut text = format!("{message}\n");
        if let Some(report) = &report {
            text.push_str(&prediction_text(report));
        }
        return ctx.output.emit_text(&text);
    }
    ctx.output.emit_json(&json!({
        "message": message,
        "bug": bug,
        "analysis": report,
        "feedback_sent": feedback_sent,
    }))
}

pub async fn analyze(ctx: &AppContext, text: &str) -> Result<()> {
    let report = ctx.client.analyze_bug(text).await?;
    if ctx.output.format() == OutputFormat::Table {
        return ctx.output.emit_text(&prediction_text(&report));
    }
    ctx.output.emit_json(&report)
}

pub async fn feedback(ctx: &AppContext, summary: &str, predicted: &str, actual: &str) -> Result<()> {
    ctx.client.send_feedback(summary, predicted, actual).await?;
    ctx.output.emit_json(&json!({
        "summary": summary,
        "predicted_severity": predicted,
        "actual_severity": actual,
    }))
}

pub async fn overview(ctx: &AppContext) -> Result<()> {
    let overview = ctx.client.overview().await?;
    if ctx.output.format() != OutputFormat::Table {
        return ctx.output.emit_json(&overview);
    }
    let stats = &overview.stats;
    let text = format!(
        "records: {}  analyzed: {} ({:.0}%)  critical: {}  components: {}\n\n{}\n\nrecent\n{}",
        stats.total_db,
        stats.analyzed,
        overview.analyzed_percent(),
        stats.critical,
        stats.components,
        render_table(&overview.components),
        render_table(&overview.recent),
    );
    ctx.output.emit_text(&text)
}

fn prediction_text(report: &AnalysisReport) -> String {
    let prediction = &report.severity;
    let mut text = format!(
        "predicted {} ({}% confidence): {}\n",
        prediction.label, prediction.confidence, prediction.action
    );
    if !report.similar_bugs.is_empty() {
        text.push('\n');
        text.push_str(&render_table(&report.similar_bugs));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_text_lists_similar_bugs() {
        let report = AnalysisReport {
            severity: SeverityPrediction {
                label: "S1".into(),
                confidence: 95,
                action: "Escalate".into(),
            },
            similar_bugs: vec![SimilarBug {
                id: RecordId::Int(4),
                summary: "crash on start".into(),
                status: "FIXED".into(),
                match_score: 66,
            }],
        };
        let text = prediction_text(&report);
        assert!(text.starts_with("predicted S1 (95% confidence): Escalate"));
        assert!(text.contains("66%"));
        assert!(text.contains("crash on start"));
    }
}
