mod buckets;
mod fold;
mod metrics;

pub use fold::fold_entry;

use std::time::Duration;

use serde_json::{json, Value as JsonValue};

use crate::compiling::{ResponseShape, SearchPlan};
use crate::plan::{QueryResultRow, ResultKind, EMPTY_FIELD_SELECTION};
use fold::merge_maps;

/// Assemble the response envelope from each plan entry's rows.
/// `results[i]` must hold the rows of `plan.entries[i]`; an entry whose
/// execution failed contributes an empty row set and folds to an empty
/// bucket.
pub fn make_search_response(
    plan: &SearchPlan,
    results: &[Vec<QueryResultRow>],
    took: Duration,
) -> JsonValue {
    let relation = if plan.track_total_hits { "eq" } else { "gte" };
    match plan.shape {
        ResponseShape::Hits => {
            let rows = results.first().map(Vec::as_slice).unwrap_or(&[]);
            let hits: Vec<JsonValue> = rows.iter().map(hit_json).collect();
            json!({
                "took": took.as_millis() as u64,
                "timed_out": false,
                "hits": {
                    "total": { "value": rows.len(), "relation": relation },
                    "hits": hits,
                },
            })
        }
        ResponseShape::Aggregations => {
            let mut aggregations = serde_json::Map::new();
            for (entry, rows) in plan.entries.iter().zip(results) {
                merge_maps(&mut aggregations, fold_entry(entry, rows));
            }
            json!({
                "took": took.as_millis() as u64,
                "timed_out": false,
                "hits": {
                    "total": { "value": total_hits(plan, results), "relation": relation },
                    "hits": [],
                },
                "aggregations": aggregations,
            })
        }
    }
}

/// Async-search responses wrap the search body and carry an opaque id the
/// core never interprets.
pub fn make_async_search_response(id: &str, response: JsonValue) -> JsonValue {
    json!({
        "id": id,
        "is_partial": false,
        "is_running": false,
        "response": response,
    })
}

fn hit_json(row: &QueryResultRow) -> JsonValue {
    let source: serde_json::Map<String, JsonValue> = row
        .cols
        .iter()
        .filter(|col| col.name != "*" && col.name != EMPTY_FIELD_SELECTION)
        .map(|col| (col.name.clone(), col.value.to_json()))
        .collect();
    json!({ "_index": row.index, "_source": source })
}

/// Best available total for the envelope: the summed counts of the first
/// top-level bucket entry, else the value of a whole-table count entry.
fn total_hits(plan: &SearchPlan, results: &[Vec<QueryResultRow>]) -> u64 {
    for (entry, rows) in plan.entries.iter().zip(results) {
        if entry.kind.is_bucket_aggregation() && entry.key_depth == 1 {
            return rows
                .iter()
                .filter_map(|row| row.cols.get(1).and_then(|c| c.value.as_i64()))
                .map(|v| v.max(0) as u64)
                .sum();
        }
    }
    for (entry, rows) in plan.entries.iter().zip(results) {
        let countish = matches!(entry.kind, ResultKind::Count | ResultKind::ValueCount);
        if countish && entry.key_depth == 0 {
            if let Some(count) = rows
                .first()
                .and_then(|row| row.cols.first())
                .and_then(|c| c.value.as_i64())
            {
                return count.max(0) as u64;
            }
        }
    }
    0
}
