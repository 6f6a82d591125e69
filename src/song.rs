//! Catalog song records and their attribute accessor.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Free-form song metadata, keyed by normalized tag name.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A single metadata value. Tag readers produce text and integers; a
/// hand-edited catalog file may also contain floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetaValue {
    /// Numeric view of the value, parsing text when possible.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Integer(n) => Some(*n as f64),
            MetaValue::Float(f) => Some(*f),
            MetaValue::Text(s) => s.trim().parse().ok(),
        }
    }

    fn is_numeric(&self) -> bool {
        !matches!(self, MetaValue::Text(_))
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Integer(n) => write!(f, "{n}"),
            MetaValue::Float(v) => write!(f, "{v}"),
            MetaValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

impl From<i64> for MetaValue {
    fn from(n: i64) -> Self {
        MetaValue::Integer(n)
    }
}

/// Ordering used by playlist sorting. Missing values sort as the empty
/// string; two numeric values compare numerically, anything else by text.
pub fn compare_attrs(a: Option<&MetaValue>, b: Option<&MetaValue>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) if x.is_numeric() && y.is_numeric() => {
            // is_numeric guarantees as_f64 succeeds
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        _ => {
            let x = a.map(ToString::to_string).unwrap_or_default();
            let y = b.map(ToString::to_string).unwrap_or_default();
            x.cmp(&y)
        }
    }
}

/// A song owned by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// Name of the file inside the managed `music/` directory. Unique within
    /// a catalog and never regenerated once assigned.
    pub filename: String,
    #[serde(with = "timestamp")]
    pub date_added: NaiveDateTime,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Song {
    pub fn new(filename: impl Into<String>, date_added: NaiveDateTime) -> Self {
        Self {
            filename: filename.into(),
            date_added,
            metadata: Metadata::new(),
        }
    }

    /// Looks up an attribute by name. Catalog-level attributes take
    /// precedence over metadata; an unset key yields `None`.
    pub fn attr(&self, name: &str) -> Option<MetaValue> {
        match name {
            "date_added" => Some(MetaValue::Text(timestamp::format(&self.date_added))),
            _ => self.metadata.get(name).cloned(),
        }
    }

    /// Replaces metadata with freshly extracted tags, keeping keys the tag
    /// reader did not produce.
    pub fn merge_metadata(&mut self, tags: Metadata) {
        self.metadata.extend(tags);
    }

    /// Track length in whole seconds, 0 when unknown.
    pub fn length_seconds(&self) -> i64 {
        self.metadata
            .get("length")
            .and_then(MetaValue::as_f64)
            .map(|secs| secs as i64)
            .unwrap_or(0)
    }
}

/// ISO-8601 timestamps without timezone, as stored in the catalog file.
///
/// Reading also accepts RFC 3339 (the offset is dropped, keeping local wall
/// time) and bare `YYYY-MM-DD` dates.
pub mod timestamp {
    use super::*;
    use serde::{Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn format(ts: &NaiveDateTime) -> String {
        ts.format(FORMAT).to_string()
    }

    pub fn parse(s: &str) -> Option<NaiveDateTime> {
        let s = s.trim();
        NaiveDateTime::parse_from_str(s, FORMAT)
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{raw}`")))
    }
}
