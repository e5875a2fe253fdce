//! Attribute casts applied when reading an attribute.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::value::{DATETIME_FORMAT, Value};

/// Semantic type of a stored column.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Cast {
    Int,
    Float,
    Bool,
    String,
    /// Also accepts `array` and `object`.
    Json,
    DateTime,
}

impl FromStr for Cast {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(Cast::Int),
            "float" | "double" | "real" | "decimal" => Ok(Cast::Float),
            "bool" | "boolean" => Ok(Cast::Bool),
            "string" => Ok(Cast::String),
            "json" | "array" | "object" => Ok(Cast::Json),
            "datetime" | "timestamp" | "date" => Ok(Cast::DateTime),
            other => Err(format!("Unknown cast: '{}'", other)),
        }
    }
}

impl Cast {
    /// Convert a raw stored value. `Null` stays `Null`; a value that cannot
    /// be read as the target type becomes `Null`.
    pub fn apply(&self, raw: &Value) -> Value {
        if raw.is_null() {
            return Value::Null;
        }
        match self {
            Cast::Int => raw.as_i64().map(Value::Int).unwrap_or(Value::Null),
            Cast::Float => raw.as_f64().map(Value::Float).unwrap_or(Value::Null),
            Cast::Bool => match raw {
                Value::Text(s) => match s.trim() {
                    "1" | "true" => Value::Bool(true),
                    "0" | "false" | "" => Value::Bool(false),
                    _ => Value::Null,
                },
                other => other.as_bool().map(Value::Bool).unwrap_or(Value::Null),
            },
            Cast::String => Value::Text(raw.to_string()),
            Cast::Json => match raw {
                Value::Json(_) => raw.clone(),
                Value::Text(s) => serde_json::from_str::<serde_json::Value>(s)
                    .map(Value::Json)
                    .unwrap_or(Value::Null),
                other => Value::Json(other.to_json()),
            },
            Cast::DateTime => match raw {
                Value::DateTime(_) => raw.clone(),
                Value::Text(s) => parse_datetime(s).map(Value::DateTime).unwrap_or(Value::Null),
                _ => Value::Null,
            },
        }
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
