use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::json;

/// A value crossing the SQL boundary. The narrow union the scanner needs:
/// integers both signed and unsigned (the database reports counts as
/// unsigned), floats, strings, timestamps, and the float arrays returned by
/// `quantiles(...)`.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Time(DateTime<Utc>),
    Floats(Vec<f64>),
    Null,
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Int(v) => Some(*v as f64),
            SqlValue::UInt(v) => Some(*v as f64),
            SqlValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SqlValue::Int(v) => json!(v),
            SqlValue::UInt(v) => json!(v),
            SqlValue::Float(v) => json!(v),
            SqlValue::Str(v) => json!(v),
            SqlValue::Time(v) => json!(v.to_rfc3339()),
            SqlValue::Floats(v) => json!(v),
            SqlValue::Null => serde_json::Value::Null,
        }
    }

    /// Total order used to sort result rows by their group-by key columns.
    /// Numbers compare numerically across the int/uint/float variants;
    /// everything else falls back to the string form.
    pub fn cmp_key(&self, other: &SqlValue) -> Ordering {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => self.key_string().cmp(&other.key_string()),
        }
    }

    fn key_string(&self) -> String {
        match self {
            SqlValue::Str(v) => v.clone(),
            SqlValue::Time(v) => v.to_rfc3339(),
            other => other.to_json().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResultCol {
    pub name: String,
    pub value: SqlValue,
}

/// One row as returned from the database: ordered columns plus the
/// originating table. The first N columns are the group-by keys in planner
/// order; the rest are metric outputs in the order the planner appended
/// them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResultRow {
    pub index: String,
    pub cols: Vec<QueryResultCol>,
}

impl QueryResultRow {
    pub fn same_group_by_prefix(&self, other: &QueryResultRow, width: usize) -> bool {
        (0..width).all(|i| match (self.cols.get(i), other.cols.get(i)) {
            (Some(a), Some(b)) => a.value == b.value,
            _ => false,
        })
    }
}

/// The scan type a select column is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Int,
    UInt,
    Float,
    Text,
    Timestamp,
    FloatArray,
    /// Anything the driver hands back; group-by keys over arbitrary
    /// columns land here.
    Dynamic,
}

/// One slot of the row schema shared by the planner and the executor: the
/// reconstructor reads row positions through this, never by name matching.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSlot {
    pub kind: ScanKind,
    pub name: String,
}
