use bugtriage::prelude::*;

pub trait TableRow {
    fn headers() -> &'static [&'static str];
    fn row(&self) -> Vec<String>;
}

pub fn render_table<T: TableRow>(items: &[T]) -> String {
    let headers = T::headers();
    let rows: Vec<Vec<String>> = items.iter().map(TableRow::row).collect();
    let widths = column_widths(headers, &rows);

    let mut out = String::new();
    out.push_str(&format_row(
        &headers.iter().map(ToString::to_string).collect::<Vec<_>>(),
        &widths,
    ));
    out.push('\n');
    out.push_str(&format_separator(&widths));

    for row in rows {
        out.push('\n');
        out.push_str(&format_row(&row, &widths));
    }

    out
}

fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            if idx >= widths.len() {
                widths.push(len);
            } else {
                widths[idx] = widths[idx].max(len);
            }
        }
    }
    widths
}

fn format_row(row: &[String], widths: &[usize]) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    for (idx, cell) in row.iter().enumerate() {
        if idx > 0 {
            out.push_str("  ");
        }
        let width = widths.get(idx).copied().unwrap_or(0);
        let _ = write!(out, "{cell:<width$}");
    }
    out.truncate(out.trim_end().len());
    out
}

fn format_separator(widths: &[usize]) -> String {
    let mut out = String::new();
    for (idx, width) in widths.iter().enumerate() {
        if idx > 0 {
            out.push_str("  ");
        }
        out.push_str(&"-".repeat(*width));
    }
    out
}

/// Keeps table cells on one line.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl TableRow for BugRow {
    fn headers() -> &'static [&'static str] {
        &["id", "severity", "component", "status", "summary"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.severity.clone(),
            self.component.clone(),
            self.status.clone(),
            one_line(self.display_summary()),
        ]
    }
}

impl TableRow for SimilarBug {
    fn headers() -> &'static [&'static str] {
        &["id", "match", "status", "summary"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            format!("{}%", self.match_score),
            self.status.clone(),
            one_line(&self.summary),
        ]
    }
}

impl TableRow for ComponentCount {
    fn headers() -> &'static [&'static str] {
        &["component", "count"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.clone(), self.count.to_string()]
    }
}

impl TableRow for Batch {
    fn headers() -> &'static [&'static str] {
        &["id", "filename", "records", "accuracy", "uploaded"]
    }

    fn row(&self) -> Vec<String> {
        let accuracy = self
            .accuracy
            .map(|acc| format!("{:.1}%", acc * 100.0))
            .unwrap_or_default();
        let uploaded = self.uploaded_at().map_or_else(
            || self.upload_time.clone().unwrap_or_default(),
            |ts| ts.format("%Y-%m-%d %H:%M").to_string(),
        );
        vec![
            self.id.to_string(),
            self.filename.clone(),
            self.record_count.to_string(),
            accuracy,
            uploaded,
        ]
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn renders_rows_under_headers() {
        let rows = vec![
            BugRow::from_record(&json!({"id": 7, "severity": "S1", "summary": "crash\non start"})),
            BugRow::from_record(&json!({"bug_id": 12, "priority": "S3"})),
        ];
        let text = render_table(&rows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("id  severity"));
        assert!(lines[2].ends_with("crash on start"));
        assert!(lines[3].ends_with("(no summary)"));
    }
}
