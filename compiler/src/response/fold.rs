use serde_json::{json, Value as JsonValue};
use tracing::error;

use super::buckets::{self, JsonMap};
use super::metrics;
use crate::plan::{PlanEntry, QueryResultRow, ResultKind};

/// Regroup one plan entry's flat rows back into its position in the
/// nested aggregation response. The walk follows the aggregator trail:
/// levels that added a group-by split the rows on the shared key prefix
/// and wrap their children in a `buckets` array, structural levels nest
/// plainly, and the result-kind folder takes over at the leaf.
pub fn fold_entry(entry: &PlanEntry, rows: &[QueryResultRow]) -> JsonMap {
    if entry.aggregators.is_empty() {
        error!("cannot fold a plan entry without an aggregator trail");
        return JsonMap::new();
    }
    // Entries carrying unrecognized DSL fold to their empty shape: the
    // position stays in the response, the data does not.
    let rows: &[QueryResultRow] = if entry.can_parse { rows } else { &[] };
    let mut sorted = rows.to_vec();
    sort_by_keys(&mut sorted, entry.key_depth);
    let mut merged = JsonMap::new();
    for map in walk(entry, &sorted, 0, 0) {
        merge_maps(&mut merged, map);
    }
    merged
}

/// The storage engine does not guarantee group-by output order, and the
/// splitter requires it, so rows are ordered by their key columns first.
fn sort_by_keys(rows: &mut [QueryResultRow], key_depth: usize) {
    if key_depth == 0 {
        return;
    }
    rows.sort_by(|a, b| {
        for i in 0..key_depth {
            let ordering = match (a.cols.get(i), b.cols.get(i)) {
                (Some(x), Some(y)) => x.value.cmp_key(&y.value),
                _ => std::cmp::Ordering::Equal,
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn walk(
    entry: &PlanEntry,
    rows: &[QueryResultRow],
    level: usize,
    key_depth: usize,
) -> Vec<JsonMap> {
    let trail = &entry.aggregators;
    if level == trail.len()
        || (level + 1 == trail.len() && !entry.kind.is_bucket_aggregation())
    {
        return finish(entry, rows, key_depth);
    }

    // date_range groups by its ranges, not by a key column, so its level
    // wraps the folder output directly.
    if let ResultKind::DateRange { intervals } = &entry.kind {
        if level + 1 == trail.len() {
            let range_buckets = buckets::date_range(rows, key_depth, intervals);
            return vec![wrap(
                &trail[level].name,
                json!({ "buckets": range_buckets }),
            )];
        }
    }

    let aggregator = &trail[level];
    if aggregator.empty {
        let mut merged = JsonMap::new();
        for child in walk(entry, rows, level + 1, key_depth) {
            merge_maps(&mut merged, child);
        }
        return vec![wrap(&aggregator.name, JsonValue::Object(merged))];
    }

    let mut children: Vec<JsonValue> = Vec::new();
    for bucket_rows in split(rows, key_depth) {
        children.extend(
            walk(entry, bucket_rows, level + 1, key_depth + 1)
                .into_iter()
                .map(JsonValue::Object),
        );
    }
    vec![wrap(&aggregator.name, json!({ "buckets": children }))]
}

fn finish(entry: &PlanEntry, rows: &[QueryResultRow], key_depth: usize) -> Vec<JsonMap> {
    if entry.kind.is_bucket_aggregation() {
        match &entry.kind {
            ResultKind::Terms | ResultKind::Histogram => buckets::key_count(rows, key_depth),
            ResultKind::DateHistogram { interval_ms } => {
                buckets::date_histogram(rows, key_depth, *interval_ms)
            }
            other => {
                error!("no bucket folder for result kind {other:?}");
                Vec::new()
            }
        }
    } else {
        let Some(last) = entry.aggregators.last() else {
            return Vec::new();
        };
        vec![wrap(&last.name, metrics::translate(entry, rows, key_depth))]
    }
}

/// Groups consecutive rows that share the first `key_depth + 1` key
/// column values.
fn split(rows: &[QueryResultRow], key_depth: usize) -> Vec<&[QueryResultRow]> {
    let width = key_depth + 1;
    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..=rows.len() {
        if i == rows.len() || !rows[i].same_group_by_prefix(&rows[start], width) {
            out.push(&rows[start..i]);
            start = i;
        }
    }
    out
}

fn wrap(name: &str, value: JsonValue) -> JsonMap {
    let mut map = JsonMap::new();
    map.insert(name.to_string(), value);
    map
}

/// Deep-merges the per-entry aggregation fragments into one response
/// tree. Objects merge key-wise; `buckets` arrays (and arrays generally)
/// merge element-wise, which is sound because every entry of one request
/// sorts its rows by the same group-by keys.
pub(crate) fn merge_maps(dst: &mut JsonMap, src: JsonMap) {
    for (key, value) in src {
        match dst.get_mut(&key) {
            None => {
                dst.insert(key, value);
            }
            Some(existing) => merge_values(existing, value),
        }
    }
}

fn merge_values(dst: &mut JsonValue, src: JsonValue) {
    match (dst, src) {
        (JsonValue::Object(d), JsonValue::Object(s)) => merge_maps(d, s),
        (JsonValue::Array(d), JsonValue::Array(s)) => {
            for (i, sv) in s.into_iter().enumerate() {
                match d.get_mut(i) {
                    Some(dv) => merge_values(dv, sv),
                    None => d.push(sv),
                }
            }
        }
        // Scalar conflicts keep the first writer.
        _ => {}
    }
}
