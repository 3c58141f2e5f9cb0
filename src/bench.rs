//! The value objects a benchmark history is made of: single measurements,
//! commit identities and per-run entries.
//!
//! All of them validate on construction so that a `HistoryStore` never holds
//! an entry that could not be serialized back out verbatim.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, Utc};
use serde_derive::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// One benchmark result: a named value with an error range, e.g.
/// `fib_recursive(12) = 292556 ± 500 ns/iter`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub value: f64,
    /// The ± uncertainty around `value`. Persisted as a formatted string
    /// ("± 500") to match the snapshot format, handled by `range_fmt`.
    #[serde(with = "range_fmt")]
    pub range: f64,
    pub unit: String,
}

impl Measurement {
    pub fn new(name: &str, value: f64, range: f64, unit: &str) -> Result<Self> {
        let m = Measurement {
            name: name.to_owned(),
            value,
            range,
            unit: unit.to_owned(),
        };
        m.validate()?;
        Ok(m)
    }

    /// Re-checks the invariants; needed after deserialization, which bypasses
    /// `new`.
    pub fn validate(&self) -> Result<()> {
        if !self.value.is_finite() {
            return Err(Error::InvalidMeasurement {
                name: self.name.clone(),
                reason: format!("value {} is not a finite number", self.value),
            });
        }
        // NaN fails the comparison too, which is what we want.
        if !(self.range >= 0.0) || !self.range.is_finite() {
            return Err(Error::InvalidMeasurement {
                name: self.name.clone(),
                reason: format!("range {} is not a non-negative finite number", self.range),
            });
        }
        Ok(())
    }
}

/// Author or committer identity. The full CI-commit shape carries an email,
/// the abbreviated PR-commit shape only name and username; absent fields stay
/// absent so that "unknown" never turns into "empty string".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitPerson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Identity of the code state a measurement set was taken from.
///
/// Two wire shapes are accepted under this one type: the full CI-commit shape
/// (with `distinct`, `timestamp` and `tree_id`) and the abbreviated PR-commit
/// shape, which omits all three.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub author: CommitPerson,
    pub committer: CommitPerson,
    /// True if this commit's tree differs from its parent's. A rerun of an
    /// unchanged tree is recorded with `distinct == false` (or absent) and is
    /// subject to replacement on the next append of the same id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct: Option<bool>,
    pub id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<String>,
    pub url: String,
}

impl CommitInfo {
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidCommit("empty commit id".to_owned()));
        }
        Ok(())
    }

    /// Whether an append of the same commit id should replace this entry
    /// rather than grow the group. An absent flag counts as non-distinct.
    pub fn is_distinct(&self) -> bool {
        self.distinct == Some(true)
    }
}

/// One recorded benchmark run: the commit it was taken from, the instant the
/// results were ingested, the harness that produced them, and the results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub commit: CommitInfo,
    /// Ingestion instant; may differ from the commit timestamp.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    pub tool: String,
    pub benches: Vec<Measurement>,
}

impl Entry {
    pub fn new(
        commit: CommitInfo,
        date: DateTime<Utc>,
        tool: &str,
        benches: Vec<Measurement>,
    ) -> Result<Self> {
        let e = Entry {
            commit,
            date,
            tool: tool.to_owned(),
            benches,
        };
        e.validate()?;
        Ok(e)
    }

    pub fn validate(&self) -> Result<()> {
        self.commit.validate()?;
        let mut seen = HashSet::new();
        for m in &self.benches {
            m.validate()?;
            if !seen.insert(m.name.as_str()) {
                return Err(Error::DuplicateMeasurement(m.name.clone()));
            }
        }
        Ok(())
    }

    pub fn measurement(&self, name: &str) -> Option<&Measurement> {
        self.benches.iter().find(|m| m.name == name)
    }
}

/// Serde adapter for the formatted range field: `44206.0` on our side,
/// `"± 44206"` on the wire. Parsing also accepts the `+/-` spelling and
/// digit-grouping commas that libtest emits.
mod range_fmt {
    use serde::de::{self, Deserialize};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(range: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("± {}", range))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_range(&s).map_err(de::Error::custom)
    }

    pub fn parse_range(s: &str) -> std::result::Result<f64, String> {
        let number = s
            .trim()
            .trim_start_matches('±')
            .trim_start_matches("+/-")
            .trim()
            .replace(',', "");
        number
            .parse::<f64>()
            .map_err(|e| format!("bad range '{}': {}", s, e))
    }
}

pub use range_fmt::parse_range;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn person() -> CommitPerson {
        CommitPerson {
            email: Some("y21@example.org".to_owned()),
            name: "y21".to_owned(),
            username: Some("y21".to_owned()),
        }
    }

    fn commit(id: &str, distinct: Option<bool>) -> CommitInfo {
        CommitInfo {
            author: person(),
            committer: person(),
            distinct,
            id: id.to_owned(),
            message: "ci: one more time".to_owned(),
            timestamp: None,
            tree_id: None,
            url: format!("https://example.org/commit/{}", id),
        }
    }

    #[test]
    fn measurement_rejects_negative_range() {
        let err = Measurement::new("interpreter", 100.0, -1.0, "ns/iter").unwrap_err();
        assert!(matches!(err, Error::InvalidMeasurement { .. }));
    }

    #[test]
    fn measurement_rejects_nan_value() {
        let err = Measurement::new("interpreter", f64::NAN, 1.0, "ns/iter").unwrap_err();
        assert!(matches!(err, Error::InvalidMeasurement { .. }));
        let err = Measurement::new("interpreter", f64::INFINITY, 1.0, "ns/iter").unwrap_err();
        assert!(matches!(err, Error::InvalidMeasurement { .. }));
        let err = Measurement::new("interpreter", 1.0, f64::NAN, "ns/iter").unwrap_err();
        assert!(matches!(err, Error::InvalidMeasurement { .. }));
    }

    #[test]
    fn zero_range_is_legal() {
        assert!(Measurement::new("interpreter", 100.0, 0.0, "ns/iter").is_ok());
    }

    #[test]
    fn entry_rejects_duplicate_measurement_names() {
        let benches = vec![
            Measurement::new("fib", 1.0, 0.0, "ns/iter").unwrap(),
            Measurement::new("fib", 2.0, 0.0, "ns/iter").unwrap(),
        ];
        let err = Entry::new(commit("abc", Some(true)), Utc::now(), "cargo", benches).unwrap_err();
        assert!(matches!(err, Error::DuplicateMeasurement(ref n) if n == "fib"));
    }

    #[test]
    fn commit_rejects_empty_id() {
        let err = Entry::new(commit("", None), Utc::now(), "cargo", vec![]).unwrap_err();
        assert!(matches!(err, Error::InvalidCommit(_)));
    }

    #[test]
    fn empty_measurement_list_is_legal() {
        assert!(Entry::new(commit("abc", Some(true)), Utc::now(), "cargo", vec![]).is_ok());
    }

    #[test]
    fn range_string_round_trips() {
        let m = Measurement::new("interpreter", 3143182.0, 44206.0, "ns/iter").unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"± 44206\""), "json was {}", json);
        let back: Measurement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn range_parser_accepts_libtest_spelling() {
        assert_eq!(parse_range("+/- 44,206").unwrap(), 44206.0);
        assert_eq!(parse_range("± 500").unwrap(), 500.0);
        assert_eq!(parse_range("± 0.5").unwrap(), 0.5);
        assert!(parse_range("about 500").is_err());
    }

    #[test]
    fn entry_date_serializes_as_epoch_millis() {
        let date = Utc.timestamp_millis_opt(1674604229792).unwrap();
        let e = Entry::new(commit("abc", Some(true)), date, "cargo", vec![]).unwrap();
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["date"], serde_json::json!(1674604229792i64));
    }

    #[test]
    fn absent_commit_fields_stay_absent() {
        let e = Entry::new(commit("abc", None), Utc::now(), "cargo", vec![]).unwrap();
        let json = serde_json::to_value(&e).unwrap();
        let c = json["commit"].as_object().unwrap();
        assert!(!c.contains_key("distinct"));
        assert!(!c.contains_key("timestamp"));
        assert!(!c.contains_key("tree_id"));
    }
}
