use serde_json::Value as JsonValue;
use tracing::warn;

use super::aggregations::parse_aggregation_tree;
use super::predicate::{JsonMap, QueryContext, SimpleQuery};
use crate::errors::TranslateError;
use crate::options::Options;
use crate::plan::{PlanEntry, ResultKind, EMPTY_FIELD_SELECTION};
use crate::schema::{PrimitiveSchema, Schema};
use crate::sql::Dialect;

/// Whether a request folds into a hit list or an aggregation tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    Hits,
    Aggregations,
}

/// The translated form of one `_search` body: a flat, ordered list of
/// standalone SQL queries plus what the response assembler needs.
#[derive(Debug)]
pub struct SearchPlan {
    pub entries: Vec<PlanEntry>,
    pub shape: ResponseShape,
    pub track_total_hits: bool,
}

/// Translates `_search` bodies against one schema snapshot. Purely
/// functional over its inputs; a request is walked once, on one task,
/// with no internal synchronization.
pub struct Translator {
    options: Options,
    schema: Schema,
}

impl Translator {
    pub fn new(schema_json: &str, options: Options) -> Result<Self, TranslateError> {
        let primitive = serde_json::from_str::<PrimitiveSchema>(schema_json)
            .map_err(TranslateError::MalformedSchema)?;
        Ok(Translator {
            options,
            schema: Schema::from(primitive),
        })
    }

    pub fn from_schema(schema: Schema, options: Options) -> Self {
        Translator { options, schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.options.dialect.as_ref()
    }

    pub fn translate(&self, table_name: &str, body: &str) -> Result<SearchPlan, TranslateError> {
        let body: JsonValue = serde_json::from_str(body)?;
        self.translate_value(table_name, &body)
    }

    pub fn translate_value(
        &self,
        table_name: &str,
        body: &JsonValue,
    ) -> Result<SearchPlan, TranslateError> {
        let body = body.as_object().ok_or(TranslateError::BodyNotAnObject)?;
        let table = self.schema.table(table_name);
        if table.is_none() {
            warn!("table {table_name} not found in schema, resolving fields verbatim");
        }
        let ctx = QueryContext {
            table,
            dialect: self.options.dialect.as_ref(),
        };

        let where_builder = match body.get("query") {
            Some(JsonValue::Object(query_map)) => ctx.parse_query_map(query_map),
            Some(_) => {
                warn!("query is not an object");
                SimpleQuery::unparseable()
            }
            None => SimpleQuery::default(),
        };
        // Explicit `false` is the only thing that turns tracking off; the
        // numeric threshold forms keep the exact count.
        let track_total_hits = !matches!(body.get("track_total_hits"), Some(JsonValue::Bool(false)));

        let aggs = body.get("aggs").or_else(|| body.get("aggregations"));
        match aggs {
            Some(JsonValue::Object(aggs_map)) => Ok(SearchPlan {
                entries: parse_aggregation_tree(
                    &ctx,
                    table_name.to_string(),
                    where_builder,
                    aggs_map,
                ),
                shape: ResponseShape::Aggregations,
                track_total_hits,
            }),
            Some(_) => {
                warn!("aggs is not an object");
                Err(TranslateError::BodyNotAnObject)
            }
            None => Ok(SearchPlan {
                entries: vec![self.build_hits_entry(&ctx, table_name, where_builder, body)],
                shape: ResponseShape::Hits,
                track_total_hits,
            }),
        }
    }

    /// A request without aggregations becomes a single list query:
    /// selected `_source` columns, the WHERE from `query`, and
    /// `sort`/`size`/`from` as ORDER BY / LIMIT / OFFSET.
    fn build_hits_entry(
        &self,
        ctx: &QueryContext,
        table_name: &str,
        where_builder: SimpleQuery,
        body: &JsonMap,
    ) -> PlanEntry {
        let mut fields = self.source_fields(ctx, body.get("_source"));
        if fields.iter().any(|f| f == "*") {
            // Expand the wildcard while the schema snapshot is at hand so
            // the row schema carries real column names.
            if let Some(table) = ctx.table {
                let mut names: Vec<String> = table.columns.keys().cloned().collect();
                names.sort();
                fields = names;
            }
        }

        let mut suffix_clauses = Vec::new();
        if let Some(order_by) = self.sort_clause(ctx, body.get("sort")) {
            suffix_clauses.push(order_by);
        }
        let size = body
            .get("size")
            .and_then(|s| s.as_u64())
            .unwrap_or(self.options.default_size as u64);
        suffix_clauses.push(format!("LIMIT {size}"));
        if let Some(from) = body.get("from").and_then(|f| f.as_u64()).filter(|f| *f > 0) {
            suffix_clauses.push(format!("OFFSET {from}"));
        }

        PlanEntry {
            fields,
            non_schema_fields: Vec::new(),
            from_clause: table_name.to_string(),
            where_expr: where_builder.expr,
            group_by: Vec::new(),
            suffix_clauses,
            aggregators: Vec::new(),
            kind: ResultKind::Hits,
            key_depth: 0,
            can_parse: where_builder.can_parse,
        }
    }

    fn source_fields(&self, ctx: &QueryContext, source: Option<&JsonValue>) -> Vec<String> {
        match source {
            None | Some(JsonValue::Bool(true)) => vec!["*".to_string()],
            Some(JsonValue::Bool(false)) => vec![EMPTY_FIELD_SELECTION.to_string()],
            Some(JsonValue::String(field)) => vec![ctx.resolve_field(field)],
            Some(JsonValue::Array(fields)) => fields
                .iter()
                .filter_map(|f| f.as_str())
                .map(|f| ctx.resolve_field(f))
                .collect(),
            Some(JsonValue::Object(spec)) => match spec.get("includes").and_then(|i| i.as_array())
            {
                Some(includes) => includes
                    .iter()
                    .filter_map(|f| f.as_str())
                    .map(|f| ctx.resolve_field(f))
                    .collect(),
                None => vec!["*".to_string()],
            },
            Some(_) => vec!["*".to_string()],
        }
    }

    fn sort_clause(&self, ctx: &QueryContext, sort: Option<&JsonValue>) -> Option<String> {
        let entries = match sort? {
            JsonValue::Array(entries) => entries.clone(),
            other => vec![other.clone()],
        };
        let mut parts = Vec::new();
        for entry in &entries {
            match entry {
                JsonValue::String(field) => {
                    parts.push(format!(
                        "{} asc",
                        ctx.dialect.quote_identifier(&ctx.resolve_field(field))
                    ));
                }
                JsonValue::Object(spec) => {
                    for (field, order_spec) in spec {
                        let order = match order_spec {
                            JsonValue::String(order) => order.clone(),
                            JsonValue::Object(inner) => inner
                                .get("order")
                                .and_then(|o| o.as_str())
                                .unwrap_or("asc")
                                .to_string(),
                            _ => "asc".to_string(),
                        };
                        parts.push(format!(
                            "{} {order}",
                            ctx.dialect.quote_identifier(&ctx.resolve_field(field))
                        ));
                    }
                }
                other => warn!("unrecognized sort entry: {other}"),
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(format!("ORDER BY {}", parts.join(", ")))
        }
    }
}
