//! Field values and their stringified index keys
//!
//! Field indices are keyed by strings. `FieldValue::to_key` is the single
//! place that decides how a typed value becomes a bucket key, so indexing,
//! lookups and full scans always agree.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison semantics for keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Infer from the operands: number, then date, then boolean, then string
    #[default]
    Auto,
    Number,
    Date,
    Boolean,
    String,
}

/// A value read from a document field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Converts a JSON value. Objects become their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Array(items) => FieldValue::List(items.iter().map(Self::from_json).collect()),
            Value::Object(_) => FieldValue::String(value.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// The bucket key for this value; `None` for null.
    ///
    /// Numbers use `Display`, so `120` and `120.0` share the key `"120"`.
    pub fn to_key(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Int(i) => Some(i.to_string()),
            FieldValue::Float(f) => Some(f.to_string()),
            FieldValue::String(s) => Some(s.clone()),
            FieldValue::Date(d) => Some(d.to_rfc3339()),
            FieldValue::List(items) => {
                let keys: Vec<String> = items.iter().filter_map(|v| v.to_key()).collect();
                serde_json::to_string(&keys).ok()
            }
        }
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) if f.is_finite() => Some(*f),
            FieldValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Scalar elements: a list yields its non-null items, a scalar itself.
    pub fn elements(&self) -> Vec<&FieldValue> {
        match self {
            FieldValue::Null => Vec::new(),
            FieldValue::List(items) => items.iter().filter(|v| !v.is_null()).collect(),
            other => vec![other],
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&String> for FieldValue {
    fn from(v: &String) -> Self {
        FieldValue::String(v.clone())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v as i64)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(v as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Date(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(v: Vec<T>) -> Self {
        FieldValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// Parses an RFC 3339 timestamp or a plain `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parses a boolean key (`true`/`false`, case-insensitive).
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_keys_agree() {
        assert_eq!(FieldValue::Int(120).to_key().as_deref(), Some("120"));
        assert_eq!(FieldValue::Float(120.0).to_key().as_deref(), Some("120"));
        assert_eq!(FieldValue::Float(99.5).to_key().as_deref(), Some("99.5"));
    }

    #[test]
    fn test_null_has_no_key() {
        assert_eq!(FieldValue::Null.to_key(), None);
        assert_eq!(FieldValue::from(None::<String>).to_key(), None);
    }

    #[test]
    fn test_from_json() {
        assert_eq!(FieldValue::from_json(&json!("Aden")), FieldValue::from("Aden"));
        assert_eq!(FieldValue::from_json(&json!(3)), FieldValue::Int(3));
        assert_eq!(FieldValue::from_json(&json!(true)), FieldValue::Bool(true));
        assert_eq!(
            FieldValue::from_json(&json!(["wifi", "pool"])),
            FieldValue::List(vec!["wifi".into(), "pool".into()])
        );
    }

    #[test]
    fn test_list_key_and_elements() {
        let v = FieldValue::from(vec!["wifi", "pool"]);
        assert_eq!(v.to_key().as_deref(), Some(r#"["wifi","pool"]"#));
        assert_eq!(v.elements().len(), 2);
        assert!(FieldValue::Null.elements().is_empty());
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2024-05-01").is_some());
        assert!(parse_date("2024-05-01T10:00:00Z").is_some());
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(FieldValue::from("12.5").as_f64(), Some(12.5));
        assert_eq!(FieldValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(FieldValue::Bool(true).as_f64(), None);
    }
}
