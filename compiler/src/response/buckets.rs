use chrono::{TimeZone, Utc};
use serde_json::{json, Value as JsonValue};
use tracing::error;

use crate::plan::{DateTimeInterval, QueryResultRow};

pub(crate) type JsonMap = serde_json::Map<String, JsonValue>;

fn bucket(entries: impl IntoIterator<Item = (&'static str, JsonValue)>) -> JsonMap {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// `terms` and `histogram` buckets: the last key column plus its count.
pub(crate) fn key_count(rows: &[QueryResultRow], key_depth: usize) -> Vec<JsonMap> {
    let Some(key_index) = key_depth.checked_sub(1) else {
        error!("bucket folder called without any group-by key");
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| {
            let key = row.cols.get(key_index)?;
            let doc_count = row.cols.get(key_depth)?;
            Some(bucket([
                ("key", key.value.to_json()),
                ("doc_count", doc_count.value.to_json()),
            ]))
        })
        .collect()
}

/// `date_histogram` buckets: the key column holds a bucket index; the
/// epoch-milliseconds key is index × interval, echoed as an ISO timestamp.
pub(crate) fn date_histogram(
    rows: &[QueryResultRow],
    key_depth: usize,
    interval_ms: i64,
) -> Vec<JsonMap> {
    let Some(key_index) = key_depth.checked_sub(1) else {
        error!("date_histogram folder called without any group-by key");
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| {
            let bucket_index = row.cols.get(key_index)?.value.as_i64()?;
            let doc_count = row.cols.get(key_depth)?;
            let key = bucket_index * interval_ms;
            Some(bucket([
                ("key", json!(key)),
                ("key_as_string", json!(format_epoch_ms(key))),
                ("doc_count", doc_count.value.to_json()),
            ]))
        })
        .collect()
}

/// `date_range` buckets read the fixed column layout the planner emitted:
/// per range one count column, followed by one epoch-seconds column for
/// each bounded endpoint.
pub(crate) fn date_range(
    rows: &[QueryResultRow],
    key_depth: usize,
    intervals: &[DateTimeInterval],
) -> Vec<JsonMap> {
    let Some(row) = rows.first() else {
        return Vec::new();
    };
    let mut cursor = key_depth;
    let mut buckets = Vec::with_capacity(intervals.len());
    for interval in intervals {
        let doc_count = row
            .cols
            .get(cursor)
            .map(|c| c.value.to_json())
            .unwrap_or(JsonValue::Null);
        cursor += 1;
        let mut entry = bucket([("doc_count", doc_count)]);
        let mut key_parts = ["*".to_string(), "*".to_string()];
        if interval.begin.is_some() {
            if let Some(seconds) = row.cols.get(cursor).and_then(|c| c.value.as_i64()) {
                let ms = seconds * 1000;
                let as_string = format_epoch_ms(ms);
                entry.insert("from".to_string(), json!(ms));
                entry.insert("from_as_string".to_string(), json!(as_string.clone()));
                key_parts[0] = as_string;
            }
            cursor += 1;
        }
        if interval.end.is_some() {
            if let Some(seconds) = row.cols.get(cursor).and_then(|c| c.value.as_i64()) {
                let ms = seconds * 1000;
                let as_string = format_epoch_ms(ms);
                entry.insert("to".to_string(), json!(ms));
                entry.insert("to_as_string".to_string(), json!(as_string.clone()));
                key_parts[1] = as_string;
            }
            cursor += 1;
        }
        entry.insert(
            "key".to_string(),
            json!(format!("{}-{}", key_parts[0], key_parts[1])),
        );
        buckets.push(entry);
    }
    buckets
}

pub(crate) fn format_epoch_ms(epoch_ms: i64) -> String {
    match Utc.timestamp_millis_opt(epoch_ms).single() {
        Some(ts) => ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
        None => {
            error!("epoch milliseconds {epoch_ms} out of range");
            String::new()
        }
    }
}
