//! Severity labels and status helpers

use serde::{Deserialize, Serialize};

/// Triage severity label.
///
/// Two label families are in use: Bugzilla style `S1`..`S4`, and the named
/// levels produced by some importers. Both map onto the same urgency scale.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Severity {
    S1,
    S2,
    S3,
    S4,
    #[serde(rename = "CRITICAL")]
    #[strum(serialize = "CRITICAL")]
    Critical,
    #[serde(rename = "HIGH")]
    #[strum(serialize = "HIGH")]
    High,
    #[serde(rename = "MEDIUM")]
    #[strum(serialize = "MEDIUM")]
    Medium,
    #[serde(rename = "LOW")]
    #[strum(serialize = "LOW")]
    Low,
}

impl Severity {
    /// Urgency from 0 (most urgent) to 3.
    pub fn urgency(self) -> u8 {
        match self {
            Severity::S1 | Severity::Critical => 0,
            Severity::S2 | Severity::High => 1,
            Severity::S3 | Severity::Medium => 2,
            Severity::S4 | Severity::Low => 3,
        }
    }

    /// Returns true for the highest urgency labels.
    pub fn is_critical(self) -> bool {
        self.urgency() == 0
    }

    /// Parses a free-form label. Unknown labels are `None`.
    pub fn parse_label(label: &str) -> Option<Self> {
        label.trim().parse().ok()
    }
}

/// Urgency of a free-form severity label; unknown labels rank after all known ones.
pub fn urgency_of(label: &str) -> u8 {
    Severity::parse_label(label).map_or(u8::MAX, Severity::urgency)
}

/// Returns true if the status reads as fixed ("Fixed", "RESOLVED FIXED", "fixed-in-nightly").
pub fn is_fixed(status: &str) -> bool {
    status.to_lowercase().contains("fixed")
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn parse_labels() {
        assert_eq!(Severity::parse_label("s1"), Some(Severity::S1));
        assert_eq!(Severity::parse_label(" Critical "), Some(Severity::Critical));
        assert_eq!(Severity::parse_label("blocker"), None);
        assert_eq!(Severity::High.to_string(), "HIGH");
        assert_eq!(Severity::S3.as_ref(), "S3");
    }

    #[test]
    fn urgency_pairs_families() {
        for sev in Severity::iter() {
            assert!(sev.urgency() <= 3);
        }
        assert_eq!(Severity::S1.urgency(), Severity::Critical.urgency());
        assert!(Severity::Low.urgency() > Severity::Medium.urgency());
        assert_eq!(urgency_of("whatever"), u8::MAX);
        assert!(Severity::S1.is_critical());
    }

    #[test]
    fn serde_uses_label_text() {
        let json = serde_json::to_string(&Severity::Medium).expect("serialize");
        assert_eq!(json, "\"MEDIUM\"");
        let sev: Severity = serde_json::from_str("\"S2\"").expect("parse");
        assert_eq!(sev, Severity::S2);
    }

    #[test]
    fn fixed_is_substring_match() {
        assert!(is_fixed("Fixed"));
        assert!(is_fixed("RESOLVED FIXED"));
        assert!(is_fixed("unfixed"));
        assert!(!is_fixed("Active"));
        assert!(!is_fixed(""));
    }
}
