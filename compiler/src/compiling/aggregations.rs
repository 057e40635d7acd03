use std::collections::HashSet;

use serde_json::Value as JsonValue;
use tracing::{debug, error, warn};

use skua_parser::parse_interval;

use super::date_range::{parse_date_range, DateRangeAggregation};
use super::predicate::{JsonMap, QueryContext, SimpleQuery};
use crate::plan::{Aggregator, PlanEntry, ResultKind, ROW_NUMBER_COLUMN};
use crate::schema::FieldInfo;
use crate::sql::expr::build::cmp;
use crate::sql::SqlExpr;

const DEFAULT_DATE_HISTOGRAM_INTERVAL_MS: i64 = 30_000;
const DEFAULT_PERCENTILES: [f64; 7] = [1.0, 5.0, 25.0, 50.0, 75.0, 95.0, 99.0];
const DEFAULT_TOP_HITS_SIZE: usize = 3;
const DEFAULT_TOP_METRICS_SIZE: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricsKind {
    Sum,
    Min,
    Max,
    Avg,
    Cardinality,
    ValueCount,
    Stats,
    Quantile,
    TopHits,
    TopMetrics,
    PercentileRanks,
}

/// A recognized metrics aggregation, normalized enough to emit SQL for.
#[derive(Debug, Clone)]
struct MetricsAggregation {
    kind: MetricsKind,
    field_names: Vec<String>,
    /// Only for `percentiles`: (user-visible name, quantile level 0..1).
    percentiles: Vec<(String, f64)>,
    /// Only for `percentile_ranks`: (user-visible name, cut value).
    cut_values: Vec<(String, f64)>,
    /// Only for `top_hits`/`top_metrics`.
    sort_by: String,
    size: usize,
    order: String,
    can_parse: bool,
}

impl MetricsAggregation {
    fn new(kind: MetricsKind) -> Self {
        MetricsAggregation {
            kind,
            field_names: Vec::new(),
            percentiles: Vec::new(),
            cut_values: Vec::new(),
            sort_by: String::new(),
            size: 0,
            order: "desc".to_string(),
            can_parse: true,
        }
    }
}

/// The planner's mutable descent state. Snapshots of the WHERE, the
/// group-by/select stacks, the aggregator trail and the result kind are
/// taken at entry to every subtree and reinstated at exit, so siblings
/// never observe each other's modifications.
pub(crate) struct AggrQueryBuilder<'a> {
    ctx: &'a QueryContext<'a>,
    from_clause: String,
    where_builder: SimpleQuery,
    group_by: Vec<String>,
    non_schema_fields: Vec<String>,
    aggregators: Vec<Aggregator>,
    kind: ResultKind,
}

/// Walk the root `aggs` map and linearize the whole tree into a flat,
/// ordered list of plan entries.
pub(crate) fn parse_aggregation_tree(
    ctx: &QueryContext,
    from_clause: String,
    base_where: SimpleQuery,
    aggs: &JsonMap,
) -> Vec<PlanEntry> {
    let mut builder = AggrQueryBuilder {
        ctx,
        from_clause,
        where_builder: base_where,
        group_by: Vec::new(),
        non_schema_fields: Vec::new(),
        aggregators: Vec::new(),
        kind: ResultKind::Count,
    };
    let mut entries = Vec::new();
    for (name, subtree) in aggs {
        match subtree.as_object() {
            Some(map) => {
                builder.aggregators.push(Aggregator::empty(name.clone()));
                let before = entries.len();
                parse_aggregation(&mut builder, map, &mut entries);
                if entries.len() == before && !map.is_empty() {
                    entries.push(builder.build_unrecognized_aggregation(name));
                }
                builder.aggregators.pop();
            }
            None => warn!("aggregation {name} is not an object, skipping"),
        }
    }
    entries
}

/// Builds aggregations recursively. The order in which the node's keys
/// are examined is load-bearing: metrics short-circuit as leaves, filters
/// apply to everything at or below this level, buckets extend the
/// group-by for the subtree, and only then do named sub-aggregations get
/// their turn.
fn parse_aggregation(
    builder: &mut AggrQueryBuilder,
    node: &JsonMap,
    result_accumulator: &mut Vec<PlanEntry>,
) {
    if node.is_empty() {
        return;
    }

    let where_before_nesting = builder.where_builder.clone();
    let kind_before_nesting = builder.kind.clone();
    let mut consumed: HashSet<&str> = HashSet::new();

    // 1. Metrics aggregations are always leaves.
    if let Some(metrics) = try_metrics_aggregation(builder.ctx, node) {
        result_accumulator.push(builder.build_metrics_aggregation(metrics));
        return;
    }

    // 2. Filters before anything else: they narrow everything on this
    //    level or below, and contribute a count at this level.
    if let Some(filter) = node.get("filter") {
        consumed.insert("filter");
        builder.kind = ResultKind::Count;
        match filter.as_object() {
            Some(filter_map) => {
                builder.where_builder = builder.ctx.combine_wheres(
                    builder.where_builder.clone(),
                    builder.ctx.parse_query_map(filter_map),
                );
            }
            None => {
                warn!("filter aggregation is not an object");
                builder.where_builder.can_parse = false;
            }
        }
        result_accumulator.push(builder.build_count_aggregation());
    }
    if node.get("filters").is_some() {
        // Recognized but not implemented; consumed so the sibling walk
        // does not mistake it for a named sub-aggregation.
        consumed.insert("filters");
        warn!("filters (plural) aggregation is not supported, skipping");
    }
    if let Some(date_range) = node.get("date_range") {
        consumed.insert("date_range");
        match date_range.as_object() {
            Some(map) => {
                let parsed = parse_date_range(builder.ctx, map);
                result_accumulator.push(builder.build_date_range_aggregation(parsed));
            }
            None => warn!("date_range aggregation is not an object"),
        }
    }

    // 3. Bucket aggregations extend the group-by for this level and below.
    let bucket = builder.try_bucket_aggregation(node);
    if let Some(key) = bucket.consumed_key {
        consumed.insert(key);
    }
    if bucket.added_group_by {
        match builder.aggregators.last_mut() {
            Some(last) => last.empty = false,
            None => error!("bucket aggregation outside any aggregator level"),
        }
    }

    // 4. Recurse into explicit sub-aggregations with the updated builder.
    for key in ["aggs", "aggregations"] {
        if let Some(sub_aggs) = node.get(key) {
            consumed.insert(key);
            match sub_aggs.as_object() {
                Some(map) => parse_aggregation(builder, map, result_accumulator),
                None => warn!("{key} is not an object, skipping"),
            }
        }
    }

    // 5. The bucket's own entry is emitted after its children so it sees
    //    the fully built group-by.
    if bucket.present {
        result_accumulator.push(builder.build_bucket_aggregation());
    }

    // 6. Every remaining key is a named sub-aggregation.
    for (key, value) in node {
        if consumed.contains(key.as_str()) {
            continue;
        }
        debug!("aggregator trail += {key}");
        match value.as_object() {
            Some(map) => {
                builder.aggregators.push(Aggregator::empty(key.clone()));
                parse_aggregation(builder, map, result_accumulator);
                builder.aggregators.pop();
            }
            None => warn!("sub-aggregation {key} is not an object, skipping"),
        }
        debug!("aggregator trail -= {key}");
    }

    // 7. Reinstate the pre-entry snapshot.
    builder.where_builder = where_before_nesting;
    if bucket.added_group_by {
        builder.group_by.pop();
        builder.non_schema_fields.pop();
    }
    builder.kind = kind_before_nesting;
}

struct BucketOutcome {
    present: bool,
    added_group_by: bool,
    consumed_key: Option<&'static str>,
}

impl BucketOutcome {
    fn none() -> Self {
        BucketOutcome {
            present: false,
            added_group_by: false,
            consumed_key: None,
        }
    }

    fn grouping(key: &'static str) -> Self {
        BucketOutcome {
            present: true,
            added_group_by: true,
            consumed_key: Some(key),
        }
    }

    fn transparent(key: &'static str) -> Self {
        BucketOutcome {
            present: true,
            added_group_by: false,
            consumed_key: Some(key),
        }
    }
}

impl AggrQueryBuilder<'_> {
    /// Checks whether `node` carries a bucket aggregation and, if so,
    /// updates the builder in place. The caller must pop the group-by and
    /// select stacks at subtree exit when `added_group_by` is set.
    fn try_bucket_aggregation(&mut self, node: &JsonMap) -> BucketOutcome {
        if let Some(histogram) = node.get("histogram").and_then(|v| v.as_object()) {
            self.kind = ResultKind::Histogram;
            let column = self.quoted_agg_field(histogram, "histogram");
            let interval = histogram_interval(histogram.get("interval"));
            let group_by_expr = if interval <= 1 {
                column
            } else {
                format!("floor({column} / {interval}) * {interval} AS {column}")
            };
            self.group_by.push(group_by_expr.clone());
            self.non_schema_fields.push(group_by_expr);
            return BucketOutcome::grouping("histogram");
        }
        if let Some(date_histogram) = node.get("date_histogram").and_then(|v| v.as_object()) {
            let interval_ms = extract_interval_ms(date_histogram);
            self.kind = ResultKind::DateHistogram { interval_ms };
            let column = self.quoted_agg_field(date_histogram, "date_histogram");
            let bucket_expr = format!("toInt64(toUnixTimestamp64Milli({column})/{interval_ms})");
            self.group_by.push(bucket_expr.clone());
            self.non_schema_fields.push(bucket_expr);
            return BucketOutcome::grouping("date_histogram");
        }
        if let Some(terms) = node.get("terms").and_then(|v| v.as_object()) {
            self.kind = ResultKind::Terms;
            let field = agg_field(terms, "terms").map(|f| self.ctx.resolve_field(&f));
            let expr = match field {
                Some(field) => {
                    let quoted = self.ctx.dialect.quote_identifier(&field);
                    // Array columns need to be unnested to group on their
                    // elements.
                    if self.ctx.field_info(&field) == FieldInfo::Array {
                        format!("arrayJoin({quoted})")
                    } else {
                        quoted
                    }
                }
                None => self.ctx.dialect.quote_identifier(""),
            };
            self.group_by.push(expr.clone());
            self.non_schema_fields.push(expr);
            return BucketOutcome::grouping("terms");
        }
        if node.get("sampler").is_some() {
            self.kind = ResultKind::Count;
            return BucketOutcome::transparent("sampler");
        }
        // Treated just like sampler until a LIMIT-based implementation
        // honors its probability.
        if node.get("random_sampler").is_some() {
            self.kind = ResultKind::Count;
            return BucketOutcome::transparent("random_sampler");
        }
        if let Some(range) = node.get("range").and_then(|v| v.as_object()) {
            self.where_builder = self
                .ctx
                .combine_wheres(self.where_builder.clone(), self.ctx.parse_range(range));
            return BucketOutcome::transparent("range");
        }
        if let Some(bool_map) = node.get("bool").and_then(|v| v.as_object()) {
            self.where_builder = self
                .ctx
                .combine_wheres(self.where_builder.clone(), self.ctx.parse_bool(bool_map));
            return BucketOutcome::transparent("bool");
        }
        BucketOutcome::none()
    }

    fn quoted_agg_field(&self, map: &JsonMap, aggregation: &str) -> String {
        match agg_field(map, aggregation) {
            Some(field) => self
                .ctx
                .dialect
                .quote_identifier(&self.ctx.resolve_field(&field)),
            None => self.ctx.dialect.quote_identifier(""),
        }
    }

    fn build_aggregation_common(&self) -> PlanEntry {
        PlanEntry {
            fields: Vec::new(),
            non_schema_fields: self.non_schema_fields.clone(),
            from_clause: self.from_clause.clone(),
            where_expr: self.where_builder.expr.clone(),
            group_by: self.group_by.clone(),
            suffix_clauses: Vec::new(),
            aggregators: self.aggregators.clone(),
            kind: self.kind.clone(),
            key_depth: self.group_by.len(),
            can_parse: self.where_builder.can_parse,
        }
    }

    fn build_count_aggregation(&self) -> PlanEntry {
        let mut query = self.build_aggregation_common();
        query.kind = ResultKind::Count;
        query.non_schema_fields.push("count()".to_string());
        query
    }

    fn build_bucket_aggregation(&self) -> PlanEntry {
        let mut query = self.build_aggregation_common();
        query.non_schema_fields.push("count()".to_string());
        query
    }

    /// Emitted when a named subtree matched nothing the planner knows.
    /// The entry keeps its position in the response (as an empty bucket)
    /// without aborting the rest of the plan.
    fn build_unrecognized_aggregation(&self, name: &str) -> PlanEntry {
        warn!("unrecognized aggregation subtree under {name}");
        let mut query = self.build_count_aggregation();
        query.can_parse = false;
        query
    }

    fn build_date_range_aggregation(&self, date_range: DateRangeAggregation) -> PlanEntry {
        let mut query = self.build_aggregation_common();
        query.kind = ResultKind::DateRange {
            intervals: date_range.intervals,
        };
        query.non_schema_fields.extend(date_range.select_columns);
        query.can_parse &= date_range.can_parse;
        query
    }

    fn build_metrics_aggregation(&self, metrics: MetricsAggregation) -> PlanEntry {
        let dialect = self.ctx.dialect;
        let mut query = self.build_aggregation_common();
        query.can_parse &= metrics.can_parse;
        let field = metrics.field_names.first().cloned().unwrap_or_default();
        let quoted = dialect.quote_identifier(&field);
        let backticked = dialect.quote_expr_identifier(&field);

        match metrics.kind {
            MetricsKind::Sum => query.non_schema_fields.push(format!("sum({quoted})")),
            MetricsKind::Min => query.non_schema_fields.push(format!("min({quoted})")),
            MetricsKind::Max => query.non_schema_fields.push(format!("max({quoted})")),
            MetricsKind::Avg => query.non_schema_fields.push(format!("avg({quoted})")),
            MetricsKind::Cardinality => query
                .non_schema_fields
                .push(format!("COUNT(DISTINCT {quoted})")),
            MetricsKind::ValueCount => query.non_schema_fields.push("count()".to_string()),
            MetricsKind::Stats => {
                for func in ["count", "min", "max", "avg", "sum"] {
                    query
                        .non_schema_fields
                        .push(format!("{func}({backticked})"));
                }
            }
            MetricsKind::Quantile => {
                for (name, level) in &metrics.percentiles {
                    let alias = dialect.quote_expr_identifier(&format!("quantile_{name}"));
                    query.non_schema_fields.push(format!(
                        "quantiles({level:.6})({backticked}) AS {alias}"
                    ));
                }
            }
            MetricsKind::PercentileRanks => {
                for (_, cut) in &metrics.cut_values {
                    query.non_schema_fields.push(format!(
                        "count(if({quoted}<={cut:.6}, 1, NULL))/count(*)*100"
                    ));
                }
            }
            MetricsKind::TopHits => self.shape_top_hits(&mut query, &metrics),
            MetricsKind::TopMetrics => self.shape_top_metrics(&mut query, &metrics),
        }

        query.kind = match metrics.kind {
            MetricsKind::Sum => ResultKind::Sum,
            MetricsKind::Min => ResultKind::Min,
            MetricsKind::Max => ResultKind::Max,
            MetricsKind::Avg => ResultKind::Avg,
            MetricsKind::Cardinality => ResultKind::Cardinality,
            MetricsKind::ValueCount => ResultKind::ValueCount,
            MetricsKind::Stats => ResultKind::Stats,
            MetricsKind::Quantile => ResultKind::Quantile,
            MetricsKind::PercentileRanks => ResultKind::PercentileRanks {
                cut_names: metrics.cut_values.iter().map(|(n, _)| n.clone()).collect(),
            },
            MetricsKind::TopHits => ResultKind::TopHits {
                fields: metrics.field_names.clone(),
            },
            MetricsKind::TopMetrics => ResultKind::TopMetrics {
                fields: metrics.field_names.clone(),
            },
        };
        query
    }

    /// Rewrites the FROM into a row-numbered window subquery and bounds
    /// the outer rows with `row_number <= size`. The group-by clause is
    /// dropped: the rows of this entry are individual hits, with the key
    /// columns still selected in front for the reconstructor.
    fn shape_top_hits(&self, query: &mut PlanEntry, metrics: &MetricsAggregation) {
        let dialect = self.ctx.dialect;
        let mut inner_fields = self.group_by.clone();
        inner_fields.extend(
            metrics
                .field_names
                .iter()
                .map(|f| dialect.quote_identifier(f)),
        );
        if !metrics.sort_by.is_empty() {
            inner_fields.push(dialect.quote_identifier(&metrics.sort_by));
        }
        query.from_clause = format!(
            "(SELECT {}, ROW_NUMBER() OVER ({}) AS {} FROM {}{})",
            inner_fields.join(", "),
            self.window_spec(metrics),
            ROW_NUMBER_COLUMN,
            self.from_clause,
            self.inner_where(),
        );
        query.non_schema_fields.extend(
            metrics
                .field_names
                .iter()
                .map(|f| dialect.quote_identifier(f)),
        );
        query.where_expr = cmp::and([
            query.where_expr.clone(),
            row_number_bound(metrics.size),
        ]);
        query.group_by.clear();
    }

    fn shape_top_metrics(&self, query: &mut PlanEntry, metrics: &MetricsAggregation) {
        let dialect = self.ctx.dialect;
        if self.group_by.is_empty() {
            // No partition to window over: a plain sorted, limited scan.
            query.fields = metrics.field_names.clone();
            if !metrics.sort_by.is_empty() {
                query.fields.push(metrics.sort_by.clone());
                query.suffix_clauses.push(format!(
                    "ORDER BY {} {} LIMIT {}",
                    dialect.quote_identifier(&metrics.sort_by),
                    metrics.order,
                    metrics.size
                ));
            } else {
                query.suffix_clauses.push(format!("LIMIT {}", metrics.size));
            }
            return;
        }

        let ordering_func = match metrics.order.as_str() {
            "asc" => "MAX",
            _ => "MIN",
        };
        let mut inner_fields: Vec<String> = metrics.field_names.clone();
        if !metrics.sort_by.is_empty() {
            inner_fields.push(metrics.sort_by.clone());
        }
        for field in &inner_fields {
            let alias = dialect.quote_identifier(&format!("windowed_{field}"));
            query.non_schema_fields.push(format!(
                "{ordering_func}({}) AS {alias}",
                dialect.quote_identifier(field)
            ));
        }
        let mut inner_select = self.group_by.clone();
        inner_select.extend(inner_fields.iter().map(|f| dialect.quote_identifier(f)));
        query.from_clause = format!(
            "(SELECT {}, ROW_NUMBER() OVER ({}) AS {} FROM {}{})",
            inner_select.join(", "),
            self.window_spec(metrics),
            ROW_NUMBER_COLUMN,
            self.from_clause,
            self.inner_where(),
        );
        query.where_expr = cmp::and([
            query.where_expr.clone(),
            row_number_bound(metrics.size),
        ]);
    }

    fn window_spec(&self, metrics: &MetricsAggregation) -> String {
        let mut spec = String::new();
        if !self.group_by.is_empty() {
            spec.push_str("PARTITION BY ");
            spec.push_str(&self.group_by.join(", "));
        }
        if !metrics.sort_by.is_empty() {
            if !spec.is_empty() {
                spec.push(' ');
            }
            spec.push_str(&format!(
                "ORDER BY {} {}",
                self.ctx.dialect.quote_identifier(&metrics.sort_by),
                metrics.order
            ));
        }
        spec
    }

    fn inner_where(&self) -> String {
        if self.where_builder.expr.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_builder.expr.content)
        }
    }
}

fn row_number_bound(size: usize) -> SqlExpr {
    cmp::comparison(
        SqlExpr::atom(ROW_NUMBER_COLUMN.to_string()),
        "<=",
        SqlExpr::atom(size.to_string()),
    )
}

fn agg_field(map: &JsonMap, aggregation: &str) -> Option<String> {
    match map.get("field").and_then(|f| f.as_str()) {
        Some(field) => Some(field.to_string()),
        None => {
            warn!("no field specified for {aggregation} aggregation, using empty");
            None
        }
    }
}

/// Numeric intervals are taken as-is, numeric strings on a best-effort
/// basis; anything unparseable degenerates to 0, which the caller treats
/// like the bare column.
fn histogram_interval(raw: Option<&JsonValue>) -> i64 {
    match raw {
        Some(JsonValue::Number(n)) => n.as_f64().map(|f| f as i64).unwrap_or(0),
        Some(JsonValue::String(s)) => s.parse().unwrap_or_else(|_| {
            warn!("cannot parse histogram interval {s}, using 0");
            0
        }),
        _ => {
            warn!("histogram aggregation without a usable interval, using 0");
            0
        }
    }
}

fn extract_interval_ms(date_histogram: &JsonMap) -> i64 {
    let raw = date_histogram
        .get("fixed_interval")
        .or_else(|| date_histogram.get("calendar_interval"))
        .or_else(|| date_histogram.get("interval"))
        .and_then(|v| v.as_str());
    match raw {
        Some(text) => match parse_interval(text) {
            Ok(interval) => interval.milliseconds(),
            Err(_) => {
                warn!(
                    "cannot parse date_histogram interval {text}, using {}ms",
                    DEFAULT_DATE_HISTOGRAM_INTERVAL_MS
                );
                DEFAULT_DATE_HISTOGRAM_INTERVAL_MS
            }
        },
        None => {
            warn!(
                "date_histogram without interval, using {}ms",
                DEFAULT_DATE_HISTOGRAM_INTERVAL_MS
            );
            DEFAULT_DATE_HISTOGRAM_INTERVAL_MS
        }
    }
}

/// Tries to read `node` as a metrics aggregation. Metrics are leaves: on
/// success the caller emits one entry and stops descending.
fn try_metrics_aggregation(ctx: &QueryContext, node: &JsonMap) -> Option<MetricsAggregation> {
    if node.len() == 1 {
        let (key, value) = node.iter().next()?;
        let kind = match key.as_str() {
            "sum" => Some(MetricsKind::Sum),
            "min" => Some(MetricsKind::Min),
            "max" => Some(MetricsKind::Max),
            "avg" => Some(MetricsKind::Avg),
            "cardinality" => Some(MetricsKind::Cardinality),
            "value_count" => Some(MetricsKind::ValueCount),
            "stats" => Some(MetricsKind::Stats),
            _ => None,
        };
        if let Some(kind) = kind {
            let mut metrics = MetricsAggregation::new(kind);
            match value.as_object().and_then(|m| agg_field(m, key)) {
                Some(field) => metrics.field_names.push(ctx.resolve_field(&field)),
                None => metrics.can_parse = false,
            }
            return Some(metrics);
        }
    }

    if let Some(percentiles) = node.get("percentiles").and_then(|v| v.as_object()) {
        let mut metrics = MetricsAggregation::new(MetricsKind::Quantile);
        match agg_field(percentiles, "percentiles") {
            Some(field) => metrics.field_names.push(ctx.resolve_field(&field)),
            None => metrics.can_parse = false,
        }
        let percents: Vec<f64> = match percentiles.get("percents").and_then(|p| p.as_array()) {
            Some(values) => values.iter().filter_map(|v| v.as_f64()).collect(),
            None => DEFAULT_PERCENTILES.to_vec(),
        };
        metrics.percentiles = percents
            .iter()
            .map(|p| (format_float(*p), p / 100.0))
            .collect();
        return Some(metrics);
    }

    if let Some(top_metrics) = node.get("top_metrics").and_then(|v| v.as_object()) {
        return Some(parse_top_metrics(ctx, top_metrics));
    }

    if let Some(top_hits) = node.get("top_hits").and_then(|v| v.as_object()) {
        let mut metrics = MetricsAggregation::new(MetricsKind::TopHits);
        metrics.size = top_hits
            .get("size")
            .and_then(|s| s.as_u64())
            .unwrap_or(DEFAULT_TOP_HITS_SIZE as u64) as usize;
        let includes = top_hits
            .get("_source")
            .and_then(|s| s.as_object())
            .and_then(|s| s.get("includes"))
            .and_then(|i| i.as_array());
        match includes {
            Some(fields) => {
                metrics.field_names = fields
                    .iter()
                    .filter_map(|f| f.as_str())
                    .map(|f| ctx.resolve_field(f))
                    .collect();
            }
            None => {
                warn!("top_hits without _source.includes");
                metrics.can_parse = false;
            }
        }
        if let Some((sort_by, order)) = parse_sort_spec(top_hits.get("sort")) {
            metrics.sort_by = ctx.resolve_field(&sort_by);
            metrics.order = order;
        }
        return Some(metrics);
    }

    // percentile_ranks carries a field plus the list of cut values.
    if let Some(percentile_ranks) = node.get("percentile_ranks").and_then(|v| v.as_object()) {
        let mut metrics = MetricsAggregation::new(MetricsKind::PercentileRanks);
        match agg_field(percentile_ranks, "percentile_ranks") {
            Some(field) => metrics.field_names.push(ctx.resolve_field(&field)),
            None => metrics.can_parse = false,
        }
        match percentile_ranks.get("values").and_then(|v| v.as_array()) {
            Some(values) => {
                metrics.cut_values = values
                    .iter()
                    .filter_map(|v| v.as_f64())
                    .map(|v| (format_float(v), v))
                    .collect();
            }
            None => {
                warn!("percentile_ranks without values");
                metrics.can_parse = false;
            }
        }
        return Some(metrics);
    }

    None
}

fn parse_top_metrics(ctx: &QueryContext, top_metrics: &JsonMap) -> MetricsAggregation {
    let mut metrics = MetricsAggregation::new(MetricsKind::TopMetrics);
    metrics.size = top_metrics
        .get("size")
        .and_then(|s| s.as_u64())
        .unwrap_or(DEFAULT_TOP_METRICS_SIZE as u64) as usize;

    let specs = match top_metrics.get("metrics") {
        Some(JsonValue::Array(specs)) => specs.clone(),
        Some(other) => vec![other.clone()],
        None => Vec::new(),
    };
    for spec in &specs {
        match spec.as_object().and_then(|m| m.get("field")).and_then(|f| f.as_str()) {
            Some(field) => metrics.field_names.push(ctx.resolve_field(field)),
            None => {
                warn!("top_metrics metric without field");
                metrics.can_parse = false;
            }
        }
    }
    if metrics.field_names.is_empty() {
        warn!("top_metrics without metrics");
        metrics.can_parse = false;
    }
    match parse_sort_spec(top_metrics.get("sort")) {
        Some((sort_by, order)) => {
            metrics.sort_by = ctx.resolve_field(&sort_by);
            metrics.order = order;
        }
        None => {
            warn!("top_metrics without sort");
            metrics.can_parse = false;
        }
    }
    metrics
}

/// Accepts `{"field": "desc"}`, `{"field": {"order": "desc"}}` and the
/// single-element array forms of either.
fn parse_sort_spec(sort: Option<&JsonValue>) -> Option<(String, String)> {
    let sort = match sort? {
        JsonValue::Array(entries) => entries.first()?.clone(),
        other => other.clone(),
    };
    match sort {
        JsonValue::String(field) => Some((field, "asc".to_string())),
        JsonValue::Object(map) => {
            let (field, spec) = map.iter().next()?;
            let order = match spec {
                JsonValue::String(order) => order.clone(),
                JsonValue::Object(inner) => inner
                    .get("order")
                    .and_then(|o| o.as_str())
                    .unwrap_or("asc")
                    .to_string(),
                _ => "asc".to_string(),
            };
            Some((field.clone(), order))
        }
        _ => None,
    }
}

/// `50.0` prints as `50`, `99.9` stays `99.9`; the response folder adds a
/// trailing `.0` where the consumer requires one.
fn format_float(value: f64) -> String {
    format!("{value}")
}
