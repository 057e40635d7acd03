//! End-to-end translation and folding scenarios over a fixed log schema.

use std::time::Duration;

use serde_json::{json, Value as JsonValue};

use crate::plan::{PlanEntry, QueryResultCol, QueryResultRow, ResultKind, SqlValue};
use crate::response::{fold_entry, make_search_response};
use crate::sql::{ClickHouse, Render};
use crate::{Options, ResponseShape, SearchPlan, Translator};

const SCHEMA_JSON: &str = r#"{
    "tables": [
        {
            "name": "logs",
            "columns": [
                {"name": "id"},
                {"name": "service"},
                {"name": "level"},
                {"name": "host"},
                {"name": "latency"},
                {"name": "trace_id"},
                {"name": "@timestamp"},
                {"name": "message"},
                {"name": "cpu"},
                {"name": "tags", "array": true}
            ]
        }
    ]
}"#;

fn translator() -> Translator {
    Translator::new(SCHEMA_JSON, Options::default()).expect("test schema must parse")
}

fn plan_for(body: JsonValue) -> SearchPlan {
    translator()
        .translate_value("logs", &body)
        .expect("test body must translate")
}

fn sql_of(entry: &PlanEntry) -> String {
    entry.render(&ClickHouse())
}

fn trail_of(entry: &PlanEntry) -> Vec<&str> {
    entry.aggregators.iter().map(|a| a.name.as_str()).collect()
}

fn row(values: Vec<(&str, SqlValue)>) -> QueryResultRow {
    QueryResultRow {
        index: "logs".to_string(),
        cols: values
            .into_iter()
            .map(|(name, value)| QueryResultCol {
                name: name.to_string(),
                value,
            })
            .collect(),
    }
}

#[test]
fn s1_term_filter_with_value_count() {
    let plan = plan_for(json!({
        "query": {"term": {"service": "api"}},
        "aggs": {"c": {"value_count": {"field": "id"}}}
    }));
    assert_eq!(plan.entries.len(), 1);
    let entry = &plan.entries[0];
    assert_eq!(
        sql_of(entry),
        r#"SELECT count() FROM logs WHERE "service" = 'api'"#
    );
    assert_eq!(trail_of(entry), vec!["c"]);
    assert_eq!(entry.kind, ResultKind::ValueCount);

    let folded = fold_entry(entry, &[row(vec![("count()", SqlValue::UInt(42))])]);
    assert_eq!(JsonValue::Object(folded), json!({"c": {"value": 42}}));
}

#[test]
fn s2_date_histogram_over_one_day() {
    let plan = plan_for(json!({
        "aggs": {"h": {"date_histogram": {"field": "@timestamp", "fixed_interval": "1h"}}}
    }));
    assert_eq!(plan.entries.len(), 1);
    let entry = &plan.entries[0];
    let bucket_expr = r#"toInt64(toUnixTimestamp64Milli("@timestamp")/3600000)"#;
    assert_eq!(
        sql_of(entry),
        format!("SELECT {bucket_expr}, count() FROM logs GROUP BY ({bucket_expr})")
    );
    assert_eq!(
        entry.kind,
        ResultKind::DateHistogram {
            interval_ms: 3_600_000
        }
    );

    // Rows arrive unsorted; buckets must come out ascending by key.
    let rows = vec![
        row(vec![("key", SqlValue::Int(473_354)), ("count()", SqlValue::UInt(5))]),
        row(vec![("key", SqlValue::Int(473_353)), ("count()", SqlValue::UInt(2))]),
    ];
    let folded = JsonValue::Object(fold_entry(entry, &rows));
    let buckets = folded["h"]["buckets"].as_array().expect("buckets array");
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0]["key"], json!(473_353i64 * 3_600_000));
    assert_eq!(buckets[0]["doc_count"], json!(2));
    assert_eq!(buckets[1]["key"], json!(473_354i64 * 3_600_000));
    assert!(buckets[0]["key_as_string"]
        .as_str()
        .expect("key_as_string")
        .starts_with("2024-01-01T"));
}

#[test]
fn s3_terms_with_nested_avg() {
    let plan = plan_for(json!({
        "aggs": {
            "hosts": {
                "terms": {"field": "host"},
                "aggs": {"latency_avg": {"avg": {"field": "latency"}}}
            }
        }
    }));
    assert_eq!(plan.entries.len(), 2);

    let avg_entry = &plan.entries[0];
    assert_eq!(trail_of(avg_entry), vec!["hosts", "latency_avg"]);
    assert_eq!(
        sql_of(avg_entry),
        r#"SELECT "host", avg("latency") FROM logs GROUP BY ("host")"#
    );

    let bucket_entry = &plan.entries[1];
    assert_eq!(trail_of(bucket_entry), vec!["hosts"]);
    assert_eq!(
        sql_of(bucket_entry),
        r#"SELECT "host", count() FROM logs GROUP BY ("host")"#
    );

    let avg_rows = vec![
        row(vec![("host", SqlValue::Str("web-1".into())), ("avg", SqlValue::Float(12.5))]),
        row(vec![("host", SqlValue::Str("web-2".into())), ("avg", SqlValue::Float(8.0))]),
    ];
    let bucket_rows = vec![
        row(vec![("host", SqlValue::Str("web-1".into())), ("count()", SqlValue::UInt(3))]),
        row(vec![("host", SqlValue::Str("web-2".into())), ("count()", SqlValue::UInt(2))]),
    ];
    let response = make_search_response(
        &plan,
        &[avg_rows, bucket_rows],
        Duration::from_millis(1),
    );
    let buckets = response["aggregations"]["hosts"]["buckets"]
        .as_array()
        .expect("buckets array");
    assert_eq!(
        buckets[0],
        json!({"key": "web-1", "doc_count": 3, "latency_avg": {"value": 12.5}})
    );
    assert_eq!(
        buckets[1],
        json!({"key": "web-2", "doc_count": 2, "latency_avg": {"value": 8.0}})
    );
    assert_eq!(response["hits"]["total"]["value"], json!(5));
}

#[test]
fn s4_filter_aggregation_emits_its_own_count() {
    let plan = plan_for(json!({
        "aggs": {
            "errs": {
                "filter": {"term": {"level": "error"}},
                "aggs": {"uniq": {"cardinality": {"field": "trace_id"}}}
            }
        }
    }));
    assert_eq!(plan.entries.len(), 2);

    let count_entry = &plan.entries[0];
    assert_eq!(trail_of(count_entry), vec!["errs"]);
    assert_eq!(
        sql_of(count_entry),
        r#"SELECT count() FROM logs WHERE "level" = 'error'"#
    );

    let cardinality_entry = &plan.entries[1];
    assert_eq!(trail_of(cardinality_entry), vec!["errs", "uniq"]);
    assert_eq!(
        sql_of(cardinality_entry),
        r#"SELECT COUNT(DISTINCT "trace_id") FROM logs WHERE "level" = 'error'"#
    );

    let response = make_search_response(
        &plan,
        &[
            vec![row(vec![("count()", SqlValue::UInt(31))])],
            vec![row(vec![("uniq", SqlValue::UInt(7))])],
        ],
        Duration::from_millis(1),
    );
    assert_eq!(
        response["aggregations"]["errs"],
        json!({"doc_count": 31, "uniq": {"value": 7}})
    );
}

#[test]
fn s5_top_metrics_with_partition() {
    let plan = plan_for(json!({
        "aggs": {
            "hosts": {
                "terms": {"field": "host"},
                "aggs": {
                    "tops": {
                        "top_metrics": {
                            "metrics": {"field": "cpu"},
                            "sort": {"@timestamp": "desc"},
                            "size": 1
                        }
                    }
                }
            }
        }
    }));
    let top_entry = plan
        .entries
        .iter()
        .find(|e| matches!(e.kind, ResultKind::TopMetrics { .. }))
        .expect("top_metrics entry");
    let sql = sql_of(top_entry);
    assert!(
        sql.contains(r#"ROW_NUMBER() OVER (PARTITION BY "host" ORDER BY "@timestamp" desc)"#),
        "window clause missing in: {sql}"
    );
    assert!(sql.contains("row_number <= 1"), "row bound missing in: {sql}");
    assert!(sql.contains(r#"MIN("cpu") AS "windowed_cpu""#), "windowed select missing in: {sql}");
}

#[test]
fn s6_percentiles_with_integer_percent() {
    let plan = plan_for(json!({
        "aggs": {"p": {"percentiles": {"field": "latency", "percents": [50, 95]}}}
    }));
    assert_eq!(plan.entries.len(), 1);
    let entry = &plan.entries[0];
    let sql = sql_of(entry);
    assert!(
        sql.contains("quantiles(0.500000)(`latency`) AS `quantile_50`"),
        "missing 50th percentile in: {sql}"
    );
    assert!(
        sql.contains("quantiles(0.950000)(`latency`) AS `quantile_95`"),
        "missing 95th percentile in: {sql}"
    );

    let rows = vec![row(vec![
        ("quantile_50", SqlValue::Floats(vec![0.42])),
        ("quantile_95", SqlValue::Floats(vec![1.9])),
    ])];
    let folded = JsonValue::Object(fold_entry(entry, &rows));
    assert_eq!(
        folded,
        json!({"p": {"values": {"50.0": 0.42, "95.0": 1.9}}})
    );
    // every percentile key carries a decimal point
    for key in folded["p"]["values"].as_object().expect("values").keys() {
        assert!(key.contains('.'), "percentile key {key} lacks a decimal point");
    }
}

#[test]
fn plan_linearity_reconstructs_tree_paths() {
    let plan = plan_for(json!({
        "aggs": {
            "hosts": {
                "terms": {"field": "host"},
                "aggs": {
                    "lat_avg": {"avg": {"field": "latency"}},
                    "lat_max": {"max": {"field": "latency"}}
                }
            },
            "total": {"value_count": {"field": "id"}}
        }
    }));
    let mut trails: Vec<Vec<&str>> = plan.entries.iter().map(trail_of).collect();
    trails.sort();
    assert_eq!(
        trails,
        vec![
            vec!["hosts"],
            vec!["hosts", "lat_avg"],
            vec!["hosts", "lat_max"],
            vec!["total"],
        ]
    );
}

#[test]
fn where_locality_between_siblings() {
    let with_filter_sibling = plan_for(json!({
        "aggs": {
            "errs": {"filter": {"term": {"level": "error"}}},
            "hosts": {"terms": {"field": "host"}}
        }
    }));
    let alone = plan_for(json!({
        "aggs": {
            "hosts": {"terms": {"field": "host"}}
        }
    }));
    let hosts_with = with_filter_sibling
        .entries
        .iter()
        .find(|e| trail_of(e) == vec!["hosts"])
        .expect("hosts entry");
    let hosts_alone = alone
        .entries
        .iter()
        .find(|e| trail_of(e) == vec!["hosts"])
        .expect("hosts entry");
    assert_eq!(hosts_with.where_expr, hosts_alone.where_expr);
    assert!(hosts_with.where_expr.is_empty());
}

#[test]
fn bucket_pairing_between_group_by_and_trail() {
    let plan = plan_for(json!({
        "aggs": {
            "services": {
                "terms": {"field": "service"},
                "aggs": {
                    "hosts": {"terms": {"field": "host"}}
                }
            }
        }
    }));
    for entry in &plan.entries {
        if !entry.kind.is_bucket_aggregation() {
            continue;
        }
        let bucket_levels = entry.aggregators.iter().filter(|a| !a.empty).count();
        assert_eq!(
            entry.group_by.len(),
            bucket_levels,
            "group-by length must match bucket trail levels for {:?}",
            trail_of(entry)
        );
    }
    let inner = plan
        .entries
        .iter()
        .find(|e| trail_of(e) == vec!["services", "hosts"])
        .expect("inner bucket entry");
    assert_eq!(inner.group_by.len(), 2);
}

#[test]
fn nested_buckets_fold_into_nested_buckets() {
    let plan = plan_for(json!({
        "aggs": {
            "services": {
                "terms": {"field": "service"},
                "aggs": {
                    "hosts": {"terms": {"field": "host"}}
                }
            }
        }
    }));
    let inner = plan
        .entries
        .iter()
        .find(|e| trail_of(e) == vec!["services", "hosts"])
        .expect("inner bucket entry");
    let rows = vec![
        row(vec![
            ("service", SqlValue::Str("api".into())),
            ("host", SqlValue::Str("web-1".into())),
            ("count()", SqlValue::UInt(4)),
        ]),
        row(vec![
            ("service", SqlValue::Str("api".into())),
            ("host", SqlValue::Str("web-2".into())),
            ("count()", SqlValue::UInt(1)),
        ]),
        row(vec![
            ("service", SqlValue::Str("auth".into())),
            ("host", SqlValue::Str("web-1".into())),
            ("count()", SqlValue::UInt(9)),
        ]),
    ];
    let folded = JsonValue::Object(fold_entry(inner, &rows));
    let outer_buckets = folded["services"]["buckets"].as_array().expect("outer");
    assert_eq!(outer_buckets.len(), 2);
    let api_hosts = outer_buckets[0]["hosts"]["buckets"]
        .as_array()
        .expect("inner buckets");
    assert_eq!(api_hosts.len(), 2);
    assert_eq!(api_hosts[0]["key"], json!("web-1"));
    assert_eq!(api_hosts[0]["doc_count"], json!(4));
    let auth_hosts = outer_buckets[1]["hosts"]["buckets"]
        .as_array()
        .expect("inner buckets");
    assert_eq!(auth_hosts.len(), 1);
    assert_eq!(auth_hosts[0]["doc_count"], json!(9));
}

#[test]
fn empty_round_trip_keeps_response_structure() {
    let histogram = plan_for(json!({
        "aggs": {"h": {"date_histogram": {"field": "@timestamp", "fixed_interval": "1h"}}}
    }));
    let folded = JsonValue::Object(fold_entry(&histogram.entries[0], &[]));
    assert_eq!(folded, json!({"h": {"buckets": []}}));

    let metric = plan_for(json!({
        "aggs": {"m": {"sum": {"field": "latency"}}}
    }));
    let folded = JsonValue::Object(fold_entry(&metric.entries[0], &[]));
    assert_eq!(folded, json!({"m": {"value": null}}));
}

#[test]
fn unrecognized_aggregation_keeps_its_position() {
    let plan = plan_for(json!({
        "aggs": {"mystery": {"geo_distance": {"field": "host"}}}
    }));
    assert_eq!(plan.entries.len(), 1);
    let entry = &plan.entries[0];
    assert!(!entry.can_parse);
    assert_eq!(trail_of(entry), vec!["mystery"]);
    // rows are ignored when the subtree could not be parsed
    let folded = JsonValue::Object(fold_entry(entry, &[row(vec![("count()", SqlValue::UInt(5))])]));
    assert_eq!(folded, json!({"mystery": {"doc_count": null}}));
}

#[test]
fn sampler_is_transparent_and_counts() {
    let plan = plan_for(json!({
        "aggs": {
            "sample": {
                "sampler": {"shard_size": 200},
                "aggs": {"m": {"avg": {"field": "latency"}}}
            }
        }
    }));
    let count_entry = plan
        .entries
        .iter()
        .find(|e| trail_of(e) == vec!["sample"])
        .expect("sampler count entry");
    assert_eq!(count_entry.kind, ResultKind::Count);
    assert!(count_entry.group_by.is_empty());
    let avg_entry = plan
        .entries
        .iter()
        .find(|e| trail_of(e) == vec!["sample", "m"])
        .expect("avg entry");
    assert_eq!(avg_entry.kind, ResultKind::Avg);
}

#[test]
fn terms_on_array_column_unnests() {
    let plan = plan_for(json!({
        "aggs": {"t": {"terms": {"field": "tags"}}}
    }));
    assert_eq!(
        sql_of(&plan.entries[0]),
        r#"SELECT arrayJoin("tags"), count() FROM logs GROUP BY (arrayJoin("tags"))"#
    );
}

#[test]
fn histogram_with_interval() {
    let plan = plan_for(json!({
        "aggs": {"lat": {"histogram": {"field": "latency", "interval": 20}}}
    }));
    assert_eq!(
        sql_of(&plan.entries[0]),
        r#"SELECT floor("latency" / 20) * 20 AS "latency", count() FROM logs GROUP BY (floor("latency" / 20) * 20 AS "latency")"#
    );
}

#[test]
fn histogram_with_unit_interval_uses_bare_column() {
    let plan = plan_for(json!({
        "aggs": {"lat": {"histogram": {"field": "latency", "interval": 1}}}
    }));
    assert_eq!(
        sql_of(&plan.entries[0]),
        r#"SELECT "latency", count() FROM logs GROUP BY ("latency")"#
    );
}

#[test]
fn list_request_without_aggregations() {
    let plan = plan_for(json!({
        "query": {"range": {"@timestamp": {"gte": "now-1d/d"}}},
        "size": 50,
        "from": 100,
        "sort": [{"@timestamp": {"order": "desc"}}],
        "_source": ["@timestamp", "message"]
    }));
    assert_eq!(plan.shape, ResponseShape::Hits);
    assert_eq!(plan.entries.len(), 1);
    assert_eq!(
        sql_of(&plan.entries[0]),
        r#"SELECT "@timestamp", "message" FROM logs WHERE "@timestamp" >= toStartOfDay(now() - toIntervalDay(1)) ORDER BY "@timestamp" desc LIMIT 50 OFFSET 100"#
    );

    let rows = vec![row(vec![
        ("@timestamp", SqlValue::Str("2024-01-01T00:00:00Z".into())),
        ("message", SqlValue::Str("hello".into())),
    ])];
    let response = make_search_response(&plan, &[rows], Duration::from_millis(2));
    assert_eq!(response["hits"]["total"]["value"], json!(1));
    assert_eq!(
        response["hits"]["hits"][0]["_source"]["message"],
        json!("hello")
    );
    assert_eq!(response["hits"]["hits"][0]["_index"], json!("logs"));
}

#[test]
fn date_range_aggregation_buckets() {
    let plan = plan_for(json!({
        "aggs": {
            "r": {
                "date_range": {
                    "field": "@timestamp",
                    "ranges": [
                        {"to": "2024-01-01"},
                        {"from": "2024-01-01"}
                    ]
                }
            }
        }
    }));
    assert_eq!(plan.entries.len(), 1);
    let entry = &plan.entries[0];
    let sql = sql_of(entry);
    assert!(
        sql.contains(r#"count(if("@timestamp" < '2024-01-01', 1, NULL))"#),
        "first range count missing in: {sql}"
    );
    assert!(
        sql.contains("toInt64(toUnixTimestamp('2024-01-01'))"),
        "bounded endpoint column missing in: {sql}"
    );

    let rows = vec![row(vec![
        ("count_to", SqlValue::UInt(10)),
        ("to_secs", SqlValue::Int(1_704_067_200)),
        ("count_from", SqlValue::UInt(4)),
        ("from_secs", SqlValue::Int(1_704_067_200)),
    ])];
    let folded = JsonValue::Object(fold_entry(entry, &rows));
    let buckets = folded["r"]["buckets"].as_array().expect("buckets");
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0]["doc_count"], json!(10));
    assert_eq!(buckets[0]["to"], json!(1_704_067_200_000i64));
    assert_eq!(buckets[1]["from_as_string"], json!("2024-01-01T00:00:00.000"));
}

#[test]
fn malformed_body_is_a_parse_error() {
    let t = translator();
    assert!(t.translate("logs", "{not json").is_err());
    assert!(t
        .translate_value("logs", &json!(["not", "an", "object"]))
        .is_err());
}
