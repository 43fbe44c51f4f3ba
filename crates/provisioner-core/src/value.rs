use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A value produced for one column of one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum GeneratedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Fixed-point number rendered with its exact scale.
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Json(String),
}

impl GeneratedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GeneratedValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GeneratedValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GeneratedValue::Text(value)
            | GeneratedValue::Decimal(value)
            | GeneratedValue::Json(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Human-readable rendering used by logs and dry-run output.
    pub fn display(&self) -> String {
        match self {
            GeneratedValue::Null => "NULL".to_string(),
            GeneratedValue::Bool(value) => value.to_string(),
            GeneratedValue::Int(value) => value.to_string(),
            GeneratedValue::Float(value) => format!("{value:.2}"),
            GeneratedValue::Decimal(value)
            | GeneratedValue::Text(value)
            | GeneratedValue::Json(value) => value.clone(),
            GeneratedValue::Date(value) => value.format("%Y-%m-%d").to_string(),
            GeneratedValue::DateTime(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            GeneratedValue::Time(value) => value.format("%H:%M:%S").to_string(),
        }
    }
}
