//! Lenient field decoders for OpenF1 records
//!
//! OpenF1 is loosely typed: positions arrive as integers, floats, numeric
//! strings, status strings ("DNF") or null, and boolean flags arrive as
//! `true`/`false` or `0`/`1`. These helpers decode such fields without
//! failing the whole response; a value that cannot be interpreted becomes
//! `None` (or `false` for flags).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Interpret a JSON value as an integer.
///
/// Accepts integers, integral floats and strings holding either.
pub fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

/// Interpret a JSON value as a finite float.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Interpret a JSON value as a flag. Anything unrecognised is `false`.
pub fn value_to_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        ),
        _ => false,
    }
}

fn integral(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// `deserialize_with` adapter for optional integers
pub fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_i64))
}

/// `deserialize_with` adapter for optional floats
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_f64))
}

/// `deserialize_with` adapter for boolean flags
pub fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().is_some_and(value_to_flag))
}

/// Classified position exactly as upstream reported it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RawPosition {
    /// Null or absent
    #[default]
    Missing,
    /// A number (possibly out of range; range checks happen later)
    Numeric(i64),
    /// A status or otherwise non-numeric value (e.g., "DNF")
    Text(String),
}

impl RawPosition {
    /// Classify a raw JSON value
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => RawPosition::Missing,
            Some(v) => match value_to_i64(v) {
                Some(n) => RawPosition::Numeric(n),
                None => match v {
                    Value::String(s) => RawPosition::Text(s.clone()),
                    other => RawPosition::Text(other.to_string()),
                },
            },
        }
    }
}

impl<'de> Deserialize<'de> for RawPosition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(RawPosition::from_value(value.as_ref()))
    }
}

impl Serialize for RawPosition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            RawPosition::Missing => serializer.serialize_none(),
            RawPosition::Numeric(n) => serializer.serialize_i64(*n),
            RawPosition::Text(s) => serializer.serialize_str(s),
        }
    }
}
