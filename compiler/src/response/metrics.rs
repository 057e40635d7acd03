use serde_json::{json, Value as JsonValue};
use tracing::error;

use super::buckets::JsonMap;
use crate::plan::{PlanEntry, QueryResultRow, ResultKind, SqlValue};

/// Translate one metric entry's rows into the JSON object that sits under
/// the last aggregator name. `key_depth` is how many group-by key columns
/// precede the metric outputs in each row.
pub(crate) fn translate(
    entry: &PlanEntry,
    rows: &[QueryResultRow],
    key_depth: usize,
) -> JsonValue {
    match &entry.kind {
        ResultKind::Count => json!({ "doc_count": first_value(rows, key_depth) }),
        ResultKind::Sum
        | ResultKind::Min
        | ResultKind::Max
        | ResultKind::Avg
        | ResultKind::Cardinality
        | ResultKind::ValueCount => json!({ "value": first_value(rows, key_depth) }),
        ResultKind::Stats => stats(rows, key_depth),
        ResultKind::Quantile => quantile(rows),
        ResultKind::PercentileRanks { cut_names } => {
            percentile_ranks(rows, key_depth, cut_names)
        }
        ResultKind::TopHits { .. } | ResultKind::TopMetrics { .. } => top(rows, key_depth),
        other => {
            error!("metric folder called for non-metric result kind {other:?}");
            JsonValue::Null
        }
    }
}

fn first_value(rows: &[QueryResultRow], index: usize) -> JsonValue {
    rows.first()
        .and_then(|row| row.cols.get(index))
        .map(|col| col.value.to_json())
        .unwrap_or(JsonValue::Null)
}

/// One object keyed by the aggregate function: the column is named e.g.
/// `avg(\`latency\`)`, so everything before the opening bracket is the key.
fn stats(rows: &[QueryResultRow], key_depth: usize) -> JsonValue {
    let mut result = JsonMap::new();
    if let Some(row) = rows.first() {
        for col in row.cols.iter().skip(key_depth) {
            match col.name.find('(') {
                Some(bracket) => {
                    result.insert(col.name[..bracket].to_string(), col.value.to_json());
                }
                None => {
                    error!("invalid column name in stats aggregation: {}, skipping", col.name);
                }
            }
        }
    }
    JsonValue::Object(result)
}

/// Percentile names can't be bare integers (the consumer chokes on
/// `"50"`), so a missing decimal point gets a `.0` appended.
pub(crate) fn with_decimal_point(name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{name}.0")
    }
}

fn quantile(rows: &[QueryResultRow]) -> JsonValue {
    let mut values = JsonMap::new();
    if let Some(row) = rows.first() {
        for col in &row.cols {
            let Some(percentile_name) = col.name.strip_prefix("quantile_") else {
                continue;
            };
            let value = match &col.value {
                SqlValue::Floats(quantiles) => quantiles.first().copied(),
                other => other.as_f64(),
            };
            values.insert(
                with_decimal_point(percentile_name),
                value.map(|v| json!(v)).unwrap_or(JsonValue::Null),
            );
        }
    }
    json!({ "values": values })
}

fn percentile_ranks(
    rows: &[QueryResultRow],
    key_depth: usize,
    cut_names: &[String],
) -> JsonValue {
    let mut values = JsonMap::new();
    if let Some(row) = rows.first() {
        for (cut, col) in cut_names.iter().zip(row.cols.iter().skip(key_depth)) {
            values.insert(with_decimal_point(cut), col.value.to_json());
        }
    }
    json!({ "values": values })
}

/// `top_hits` and `top_metrics` both answer with a hit list: one
/// `_source` object per row, built from the columns after the keys.
fn top(rows: &[QueryResultRow], key_depth: usize) -> JsonValue {
    let hits: Vec<JsonValue> = rows
        .iter()
        .map(|row| {
            let source: JsonMap = row
                .cols
                .iter()
                .skip(key_depth)
                .map(|col| {
                    let name = col.name.strip_prefix("windowed_").unwrap_or(&col.name);
                    (name.to_string(), col.value.to_json())
                })
                .collect();
            json!({ "_index": row.index, "_source": source })
        })
        .collect();
    json!({ "hits": { "hits": hits } })
}
