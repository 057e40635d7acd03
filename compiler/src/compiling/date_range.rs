use serde_json::Value as JsonValue;
use tracing::warn;

use skua_parser::parse_date_math;

use super::date_math::render_date_math;
use super::predicate::{JsonMap, QueryContext};
use crate::plan::DateTimeInterval;

/// A parsed `date_range` aggregation: the per-range count columns plus
/// the epoch-seconds columns for every bounded endpoint, in the exact
/// order the response folder will read them back.
#[derive(Debug, Clone)]
pub(crate) struct DateRangeAggregation {
    pub intervals: Vec<DateTimeInterval>,
    pub select_columns: Vec<String>,
    pub can_parse: bool,
}

pub(crate) fn parse_date_range(ctx: &QueryContext, map: &JsonMap) -> DateRangeAggregation {
    let mut can_parse = true;
    let field = match map.get("field").and_then(|f| f.as_str()) {
        Some(f) => ctx.resolve_field(f),
        None => {
            warn!("no field specified for date_range aggregation, using empty");
            can_parse = false;
            String::new()
        }
    };
    let column = ctx.dialect.quote_identifier(&field);

    let ranges: &[JsonValue] = match map.get("ranges").and_then(|r| r.as_array()) {
        Some(r) => r,
        None => {
            warn!("no ranges specified for date_range aggregation, using empty");
            can_parse = false;
            &[]
        }
    };

    let mut intervals = Vec::with_capacity(ranges.len());
    let mut select_columns = Vec::new();
    for range in ranges {
        let Some(range) = range.as_object() else {
            warn!("date_range range is not an object, skipping");
            can_parse = false;
            continue;
        };
        let begin = range
            .get("from")
            .and_then(|v| endpoint(ctx, v, &mut can_parse));
        let end = range
            .get("to")
            .and_then(|v| endpoint(ctx, v, &mut can_parse));

        let condition = match (&begin, &end) {
            (Some(b), Some(e)) => Some(format!("{column} >= {b} AND {column} < {e}")),
            (Some(b), None) => Some(format!("{column} >= {b}")),
            (None, Some(e)) => Some(format!("{column} < {e}")),
            (None, None) => None,
        };
        select_columns.push(match condition {
            Some(condition) => format!("count(if({condition}, 1, NULL))"),
            None => "count()".to_string(),
        });
        if let Some(b) = &begin {
            select_columns.push(format!("toInt64(toUnixTimestamp({b}))"));
        }
        if let Some(e) = &end {
            select_columns.push(format!("toInt64(toUnixTimestamp({e}))"));
        }
        intervals.push(DateTimeInterval { begin, end });
    }

    DateRangeAggregation {
        intervals,
        select_columns,
        can_parse,
    }
}

fn endpoint(ctx: &QueryContext, value: &JsonValue, can_parse: &mut bool) -> Option<String> {
    let Some(text) = value.as_str() else {
        warn!("date_range endpoint is not a string, treating as unbounded");
        *can_parse = false;
        return None;
    };
    match parse_date_math(text) {
        Ok(parsed) => Some(render_date_math(&parsed, ctx.dialect).content),
        Err(_) => {
            warn!("cannot parse date_range endpoint {text}, treating as unbounded");
            *can_parse = false;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ClickHouse;
    use serde_json::json;

    #[test]
    fn bounded_and_unbounded_ranges() {
        let dialect = ClickHouse();
        let ctx = QueryContext {
            table: None,
            dialect: &dialect,
        };
        let map = json!({
            "field": "@timestamp",
            "ranges": [
                {"to": "now-1d/d"},
                {"from": "now-1d/d", "to": "now/d"},
                {"from": "now/d"}
            ]
        });
        let parsed = parse_date_range(&ctx, map.as_object().unwrap());
        assert!(parsed.can_parse);
        assert_eq!(parsed.intervals.len(), 3);
        // one count column per range plus one column per bounded endpoint
        assert_eq!(parsed.select_columns.len(), 3 + 4);
        assert!(parsed.select_columns[0].starts_with("count(if(\"@timestamp\" < "));
        assert_eq!(
            parsed.select_columns[1],
            "toInt64(toUnixTimestamp(toStartOfDay(now() - toIntervalDay(1))))"
        );
    }
}
