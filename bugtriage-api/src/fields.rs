//! # Field resolution
//!
//! Records arrive in several shapes: flat (`{"id":1,"severity":"S1"}`), nested under a
//! generic `data` payload (`{"bug_id":1,"data":{"severity":"S1"}}`), or with provider
//! specific names (`priority` for severity, `product` for component). A [`FieldTable`] is
//! an ordered list of `(source path, target field)` rules; the first source that yields a
//! value wins.
//!
//! The default table resolves, for every canonical field:
//!
//! 1. the top-level key
//! 2. `data.<field>`
//! 3. known aliases (`id`←`bug_id`, `severity`←`priority`, `component`←`product`),
//!    each tried top-level, then under `data`
//!
//! Resolution never fails: unresolved fields are `""`.
//!
//! ```rust
//! use bugtriage::prelude::*;
//! let record = serde_json::json!({"bug_id": 7, "data": {"priority": "S2", "summary": "hang"}});
//! assert_eq!(get_field(&record, "id"), "7");
//! assert_eq!(get_field(&record, "severity"), "S2");
//! assert_eq!(get_field(&record, "status"), "");
//! ```

use std::{borrow::Cow, cmp::Ordering, fmt, sync::LazyLock};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::SUMMARY_PLACEHOLDER;

/// Canonical fields of a bug row, in display order
pub const CANONICAL_FIELDS: [&str; 5] = ["id", "summary", "component", "severity", "status"];

const DEFAULT_ALIASES: [(&str, &str); 3] = [
    ("bug_id", "id"),
    ("priority", "severity"),
    ("product", "component"),
];

/// Where a rule reads its value from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourcePath {
    /// Top-level key of the record
    Top(String),
    /// Key inside the record's `data` payload
    Data(String),
}

impl SourcePath {
    fn lookup<'a>(&self, record: &'a Value) -> Option<Cow<'a, Value>> {
        match self {
            SourcePath::Top(key) => record.get(key).map(Cow::Borrowed),
            SourcePath::Data(key) => match record.get("data")? {
                Value::Object(map) => map.get(key).map(Cow::Borrowed),
                // some backends store the payload as a json-encoded string
                Value::String(text) => serde_json::from_str::<Value>(text)
                    .ok()
                    .and_then(|mut payload| payload.get_mut(key).map(Value::take))
                    .map(Cow::Owned),
                _ => None,
            },
        }
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourcePath::Top(key) => f.write_str(key),
            SourcePath::Data(key) => write!(f, "data.{key}"),
        }
    }
}

/// Ordered `(source, target)` resolution rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldTable {
    rules: Vec<(SourcePath, String)>,
}

impl Default for FieldTable {
    fn default() -> Self {
        let mut table = FieldTable::empty();
        for field in CANONICAL_FIELDS {
            table = table
                .rule(SourcePath::Top(field.into()), field)
                .rule(SourcePath::Data(field.into()), field);
        }
        for (alias, field) in DEFAULT_ALIASES {
            table = table.alias(alias, field);
        }
        table
    }
}

static DEFAULT_TABLE: LazyLock<FieldTable> = LazyLock::new(FieldTable::default);

impl FieldTable {
    /// Table with no rules. Fields without rules fall back to top-level, then `data`.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Appends a rule. Earlier rules take precedence.
    #[must_use]
    pub fn rule(mut self, source: SourcePath, target: impl Into<String>) -> Self {
        self.rules.push((source, target.into()));
        self
    }

    /// Appends an alias rule pair: `alias` top-level, then `data.alias`.
    #[must_use]
    pub fn alias(self, alias: &str, target: &str) -> Self {
        self.rule(SourcePath::Top(alias.into()), target)
            .rule(SourcePath::Data(alias.into()), target)
    }

    /// Source paths consulted for `field`, in order.
    pub fn sources_for(&self, field: &str) -> Vec<SourcePath> {
        let sources: Vec<SourcePath> = self
            .rules
            .iter()
            .filter(|(_, target)| target == field)
            .map(|(source, _)| source.clone())
            .collect();
        if sources.is_empty() {
            vec![
                SourcePath::Top(field.to_string()),
                SourcePath::Data(field.to_string()),
            ]
        } else {
            sources
        }
    }

    /// Returns the first usable raw value for the field.
    fn resolve_value<'a>(&self, record: &'a Value, field: &str) -> Option<Cow<'a, Value>> {
        self.sources_for(field)
            .iter()
            .filter_map(|source| source.lookup(record))
            .find(|value| scalar_text(value).is_some())
    }

    /// Resolves a field as display text. Returns `""` if no rule yields a scalar value.
    pub fn resolve(&self, record: &Value, field: &str) -> String {
        self.resolve_value(record, field)
            .and_then(|value| scalar_text(&value))
            .unwrap_or_default()
    }

    /// Normalizes a record into the canonical row shape.
    pub fn normalize(&self, record: &Value) -> BugRow {
        let id = self
            .resolve_value(record, "id")
            .map_or_else(|| RecordId::Text(String::new()), |value| RecordId::from_value(&value));
        BugRow {
            id,
            summary: self.resolve(record, "summary"),
            component: self.resolve(record, "component"),
            severity: self.resolve(record, "severity"),
            status: self.resolve(record, "status"),
        }
    }
}

/// Scalars become text. Null, empty strings, objects and arrays are unresolved.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Resolves a field with the default table. Returns `""` when unresolved.
pub fn get_field(record: &Value, field: &str) -> String {
    DEFAULT_TABLE.resolve(record, field)
}

/// Record identifier. Integer ids order numerically and before text ids.
/// Numeric strings are read as integers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => RecordId::Int(n),
            Raw::Text(s) => RecordId::from(s),
        })
    }
}

impl RecordId {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map_or_else(|| RecordId::Text(n.to_string()), RecordId::Int),
            other => scalar_text(other).map_or(RecordId::Text(String::new()), RecordId::from),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Int(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        match id.trim().parse::<i64>() {
            Ok(n) => RecordId::Int(n),
            Err(_) => RecordId::Text(id),
        }
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId::from(id.to_string())
    }
}

impl std::str::FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(RecordId::from(s))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl Ord for RecordId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RecordId::Int(a), RecordId::Int(b)) => a.cmp(b),
            (RecordId::Int(_), RecordId::Text(_)) => Ordering::Less,
            (RecordId::Text(_), RecordId::Int(_)) => Ordering::Greater,
            (RecordId::Text(a), RecordId::Text(b)) => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
        }
    }
}

impl PartialOrd for RecordId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Canonical row shape shown by the explorer.
///
/// Missing fields are empty strings; use [`display_summary`](Self::display_summary)
/// for a summary that is never blank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugRow {
    pub id: RecordId,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub status: String,
}

impl BugRow {
    /// Normalizes a raw record with the default field table.
    pub fn from_record(record: &Value) -> Self {
        DEFAULT_TABLE.normalize(record)
    }

    /// Summary, or a placeholder when the record has none.
    pub fn display_summary(&self) -> &str {
        if self.summary.trim().is_empty() {
            SUMMARY_PLACEHOLDER
        } else {
            &self.summary
        }
    }

    /// Canonical field by name. Unknown names are `""`.
    pub fn field(&self, name: &str) -> Cow<'_, str> {
        match name {
            "id" => Cow::Owned(self.id.to_string()),
            "summary" => Cow::Borrowed(&self.summary),
            "component" => Cow::Borrowed(&self.component),
            "severity" => Cow::Borrowed(&self.severity),
            "status" => Cow::Borrowed(&self.status),
            _ => Cow::Borrowed(""),
        }
    }

    /// Returns true if the status reads as fixed.
    pub fn is_fixed(&self) -> bool {
        crate::severity::is_fixed(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn resolves_top_level_first() {
        let record = json!({"severity": "S1", "data": {"severity": "S4"}, "priority": "S3"});
        assert_eq!(get_field(&record, "severity"), "S1");
    }

    #[test]
    fn falls_back_to_data_then_alias() {
        let nested = json!({"data": {"severity": "S2"}, "priority": "S3"});
        assert_eq!(get_field(&nested, "severity"), "S2");

        let aliased = json!({"priority": "S3"});
        assert_eq!(get_field(&aliased, "severity"), "S3");

        let nested_alias = json!({"data": {"product": "Core"}});
        assert_eq!(get_field(&nested_alias, "component"), "Core");
    }

    #[test]
    fn unresolved_is_empty() {
        for record in [
            json!({}),
            json!(null),
            json!([1, 2]),
            json!({"summary": null}),
            json!({"summary": {"nested": true}}),
            json!({"data": "not json"}),
            json!({"data": 5}),
        ] {
            assert_eq!(get_field(&record, "summary"), "", "{record}");
        }
    }

    #[test]
    fn empty_string_falls_through() {
        let record = json!({"summary": "", "data": {"summary": "from data"}});
        assert_eq!(get_field(&record, "summary"), "from data");
    }

    #[test]
    fn stringified_data_payload() {
        let record = json!({"bug_id": 12, "data": "{\"summary\":\"boom\",\"priority\":\"S1\"}"});
        let row = BugRow::from_record(&record);
        assert_eq!(row.id, RecordId::Int(12));
        assert_eq!(row.summary, "boom");
        assert_eq!(row.severity, "S1");
    }

    #[test]
    fn scalars_stringify() {
        let record = json!({"status": true, "component": 42});
        assert_eq!(get_field(&record, "status"), "true");
        assert_eq!(get_field(&record, "component"), "42");
    }

    #[test]
    fn unknown_fields_use_top_then_data() {
        let record = json!({"data": {"platform": "Linux"}});
        assert_eq!(get_field(&record, "platform"), "Linux");
    }

    #[test]
    fn custom_table_rules() {
        let table = FieldTable::empty()
            .rule(SourcePath::Data("title".into()), "summary")
            .rule(SourcePath::Top("summary".into()), "summary");
        let record = json!({"summary": "top", "data": {"title": "nested title"}});
        assert_eq!(table.resolve(&record, "summary"), "nested title");
        assert_eq!(
            table.sources_for("summary"),
            vec![
                SourcePath::Data("title".into()),
                SourcePath::Top("summary".into())
            ]
        );
    }

    #[test]
    fn record_id_parsing_and_order() {
        assert_eq!(RecordId::from("17"), RecordId::Int(17));
        assert_eq!(RecordId::from("BUG-1"), RecordId::Text("BUG-1".into()));
        assert!(RecordId::Int(9) < RecordId::Int(10));
        assert!(RecordId::Int(1000) < RecordId::Text("a".into()));
        assert!(RecordId::Text("abc".into()) < RecordId::Text("ABD".into()));

        let row = BugRow::from_record(&json!({"id": "31"}));
        assert_eq!(row.id, RecordId::Int(31));
    }

    #[test]
    fn summary_placeholder() {
        let row = BugRow::from_record(&json!({"id": 1}));
        assert_eq!(row.summary, "");
        assert_eq!(row.display_summary(), "(no summary)");
        assert_eq!(row.field("id"), "1");
        assert_eq!(row.field("nope"), "");
    }
}
