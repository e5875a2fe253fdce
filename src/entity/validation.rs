//! Attribute validation.
//!
//! Rules are declared per field as `required|email|min:3` strings and parsed
//! once when the entity's metadata is built. Validation is advisory: saving
//! never validates on its own.

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use tracing::warn;

use crate::value::{Row, Value};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("static regex should not panic")
});

/// One validation rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    Email,
    /// Numbers by value, strings by character count.
    Min(f64),
    Max(f64),
    Numeric,
    Integer,
    String,
    Boolean,
    In(Vec<String>),
    /// Parsed but not understood; skipped with a warning.
    Unknown(String),
}

/// Field name to the messages of every rule it violated, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationErrors(IndexMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn add(&mut self, field: &str, message: String) {
        self.0.entry(field.to_string()).or_default().push(message);
    }

    /// Messages for one field.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> IndexMap<String, Vec<String>> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Check `data` against per-field rules.
pub fn validate(data: &Row, rules: &IndexMap<String, Vec<Rule>>) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    for (field, field_rules) in rules {
        let value = data.get(field).unwrap_or(&Value::Null);
        let required = field_rules.contains(&Rule::Required);

        if value.is_empty() {
            if required {
                errors.add(field, format!("The {} field is required.", label(field)));
            }
            continue;
        }

        for rule in field_rules {
            if let Some(message) = check(field, value, rule) {
                errors.add(field, message);
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check(field: &str, value: &Value, rule: &Rule) -> Option<String> {
    let name = label(field);
    match rule {
        Rule::Required => None,
        Rule::Email => {
            let ok = value.as_str().is_some_and(|s| EMAIL.is_match(s));
            (!ok).then(|| format!("The {} must be a valid email address.", name))
        }
        Rule::Min(n) => match size(value) {
            Some((size, unit)) if size < *n => {
                Some(format!("The {} must be at least {}{}.", name, n, unit))
            }
            _ => None,
        },
        Rule::Max(n) => match size(value) {
            Some((size, unit)) if size > *n => {
                Some(format!("The {} may not be greater than {}{}.", name, n, unit))
            }
            _ => None,
        },
        Rule::Numeric => (!is_numeric(value)).then(|| format!("The {} must be a number.", name)),
        Rule::Integer => {
            let ok = match value {
                Value::Int(_) => true,
                Value::Float(f) => f.fract() == 0.0,
                Value::Text(s) => s.trim().parse::<i64>().is_ok(),
                _ => false,
            };
            (!ok).then(|| format!("The {} must be an integer.", name))
        }
        Rule::String => (!matches!(value, Value::Text(_)))
            .then(|| format!("The {} must be a string.", name)),
        Rule::Boolean => {
            let ok = match value {
                Value::Bool(_) => true,
                Value::Int(n) => *n == 0 || *n == 1,
                Value::Text(s) => matches!(s.as_str(), "0" | "1" | "true" | "false"),
                _ => false,
            };
            (!ok).then(|| format!("The {} field must be true or false.", name))
        }
        Rule::In(options) => {
            let text = value.to_string();
            (!options.iter().any(|o| *o == text))
                .then(|| format!("The selected {} is invalid.", name))
        }
        Rule::Unknown(rule) => {
            warn!(field, rule = rule.as_str(), "skipping unknown validation rule");
            None
        }
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Int(_) | Value::Float(_) => true,
        Value::Text(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}

/// The measured size of a value and the unit to quote in messages.
fn size(value: &Value) -> Option<(f64, &'static str)> {
    match value {
        Value::Int(n) => Some((*n as f64, "")),
        Value::Float(f) => Some((*f, "")),
        Value::Text(s) => Some((s.chars().count() as f64, " characters")),
        Value::Json(serde_json::Value::Array(items)) => Some((items.len() as f64, " items")),
        _ => None,
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}
