//! # CSV export
//!
//! Exports cover the whole filtered and sorted result set, not the visible page.
//! Columns are fixed: `ID,Severity,Component,Summary,Status`. The summary is always
//! quoted with embedded quotes doubled; other fields are quoted only when they
//! contain a delimiter, quote or line break.
//!
//! - [to_csv] - render rows
//! - [parse_csv] / [rows_from_csv] - read an export back
//! - [write_csv] - render rows into a file
//! - [export_csv](TriageClient::export_csv) - stream a server-side export into a file
//!

use std::path::{Path, PathBuf};

use futures::StreamExt;
use snafu::prelude::*;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::{
    Result,
    config::EXPORT_PATH,
    fields::{BugRow, RecordId},
    http_client::HttpRequest,
    prelude::*,
};

/// Header line of every export
pub const CSV_HEADER: &str = "ID,Severity,Component,Summary,Status";

/// MIME type of exports
pub const CSV_CONTENT_TYPE: &str = "text/csv";

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        quote(value)
    } else {
        value.to_string()
    }
}

/// Renders one data line, without the trailing newline.
pub fn csv_line(row: &BugRow) -> String {
    [
        field(&row.id.to_string()),
        field(&row.severity),
        field(&row.component),
        quote(&row.summary),
        field(&row.status),
    ]
    .join(",")
}

/// Renders rows as CSV, header first, one `\n` terminated line per row.
pub fn to_csv<'a, I>(rows: I) -> String
where
    I: IntoIterator<Item = &'a BugRow>,
{
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&csv_line(row));
        out.push('\n');
    }
    out
}

/// Splits CSV text into records of fields. Quoted fields may contain commas,
/// doubled quotes, and line breaks. Blank lines are skipped.
pub fn parse_csv(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    current.push('"');
                }
                '"' => in_quotes = false,
                _ => current.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut current)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut current));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                }
                record.clear();
            }
            _ => current.push(c),
        }
    }
    ensure!(
        !in_quotes,
        ValidationSnafu {
            message: "csv: unterminated quoted field"
        }
    );
    if !current.is_empty() || !record.is_empty() {
        record.push(current);
        records.push(record);
    }
    Ok(records)
}

/// Reads an export back into rows. The header line is required.
pub fn rows_from_csv(text: &str) -> Result<Vec<BugRow>> {
    let mut records = parse_csv(text)?.into_iter();
    let header = records.next().unwrap_or_default();
    ensure!(
        header.join(",") == CSV_HEADER,
        ValidationSnafu {
            message: format!("csv: unexpected header {header:?}")
        }
    );
    records
        .enumerate()
        .map(|(n, fields)| -> Result<BugRow> {
            let [id, severity, component, summary, status]: [String; 5] =
                fields.try_into().map_err(|fields: Vec<String>| TriageError::Validation {
                    message: format!("csv line {}: expected 5 fields, got {}", n + 2, fields.len()),
                })?;
            Ok(BugRow {
                id: RecordId::from(id),
                summary,
                component,
                severity,
                status,
            })
        })
        .collect()
}

/// Writes rows to `path` as CSV. Returns bytes written.
pub async fn write_csv<'a, I>(path: impl AsRef<Path>, rows: I) -> Result<u64>
where
    I: IntoIterator<Item = &'a BugRow>,
{
    let path = path.as_ref();
    let text = to_csv(rows);
    tokio::fs::write(path, text.as_bytes())
        .await
        .context(ExportSnafu { path })?;
    info!(path=?path, bytes = text.len(), "export written");
    Ok(text.len() as u64)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

impl TriageClient {
    /// Streams the server-side export for `query` into `path`. Returns bytes written.
    ///
    /// The body is written as it arrives and never held in memory as a whole.
    /// The file appears at `path` only once the download completes.
    pub async fn export_csv(&self, query: &QueryTuple, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        let req = HttpRequest::get(
            EXPORT_PATH,
            vec![
                ("company_id".into(), self.company_id()?.to_string()),
                ("search".into(), query.filter.clone()),
                ("sort_key".into(), query.sort_key.to_string()),
                ("sort_dir".into(), query.sort_dir.to_string()),
            ],
        );
        let response = self.client.send_streaming(req).await?;

        let part = partial_path(path);
        let written = match stream_to_file(response, &part, &self.client.metrics).await {
            Ok(written) => written,
            Err(err) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(err);
            }
        };
        tokio::fs::rename(&part, path)
            .await
            .context(ExportSnafu { path })?;
        info!(path=?path, bytes = written, "server export written");
        Ok(written)
    }
}

async fn stream_to_file(
    response: reqwest::Response,
    path: &Path,
    metrics: &crate::http_client::HttpMetrics,
) -> Result<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .context(ExportSnafu { path })?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context(HttpSnafu {
            method: "GET",
            url: EXPORT_PATH,
        })?;
        file.write_all(&chunk)
            .await
            .context(ExportSnafu { path })?;
        written += chunk.len() as u64;
        metrics.add_bytes_received(chunk.len() as u64);
        debug!(bytes = written, "export chunk");
    }
    file.flush().await.context(ExportSnafu { path })?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Vec<BugRow> {
        vec![
            BugRow::from_record(&json!({"id": 3, "severity": "S1", "component": "Core",
                "summary": "crash \"A\" on start", "status": "Active"})),
            BugRow::from_record(&json!({"id": 1, "severity": "S3", "component": "Layout, Flexbox",
                "summary": "minor, B\nsecond line", "status": "Fixed"})),
            BugRow::from_record(&json!({"id": "X-9"})),
        ]
    }

    #[test]
    fn header_and_escaping() {
        let csv = to_csv(&sample()[..1]);
        assert_eq!(
            csv,
            "ID,Severity,Component,Summary,Status\n3,S1,Core,\"crash \"\"A\"\" on start\",Active\n"
        );
    }

    #[test]
    fn round_trip_preserves_rows() {
        let rows = sample();
        let csv = to_csv(&rows);
        let parsed = rows_from_csv(&csv).expect("parse");
        assert_eq!(parsed.len(), rows.len());
        assert_eq!(parsed, rows);
        assert_eq!(parsed[0].summary, "crash \"A\" on start");
    }

    #[test]
    fn empty_export_is_header_only() {
        let csv = to_csv(&Vec::new());
        assert_eq!(csv, format!("{CSV_HEADER}\n"));
        assert!(rows_from_csv(&csv).expect("parse").is_empty());
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(parse_csv("a,\"b\n").is_err());
        assert!(rows_from_csv("nope\n1,2,3,4,5\n").is_err());
        assert!(rows_from_csv(&format!("{CSV_HEADER}\n1,2\n")).is_err());
    }

    #[test]
    fn parse_handles_crlf_and_missing_final_newline() {
        let records = parse_csv("a,b\r\n\"c,d\",e").expect("parse");
        assert_eq!(records, vec![vec!["a", "b"], vec!["c,d", "e"]]);
    }

    #[tokio::test]
    async fn write_csv_to_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(crate::EXPORT_FILE_NAME);
        let rows = sample();
        let written = write_csv(&path, &rows).await.expect("write");
        let text = std::fs::read_to_string(&path).expect("read");
        assert_eq!(written, text.len() as u64);
        assert_eq!(rows_from_csv(&text).expect("parse"), rows);
    }

    #[tokio::test]
    async fn write_csv_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("out.csv");
        let err = write_csv(&path, &sample()).await.expect_err("no parent dir");
        assert!(matches!(err, TriageError::Export { .. }));
    }

    #[test]
    fn partial_file_name() {
        assert_eq!(
            partial_path(Path::new("/tmp/out.csv")),
            PathBuf::from("/tmp/out.csv.part")
        );
    }
}
