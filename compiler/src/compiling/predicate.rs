use serde_json::Value as JsonValue;
use tracing::warn;

use skua_parser::ast::DateMath;
use skua_parser::parse_date_math;

use super::date_math::render_date_math;
use crate::schema::{FieldInfo, Table};
use crate::sql::expr::build::{cmp, func};
use crate::sql::{Dialect, SqlExpr};

pub(crate) type JsonMap = serde_json::Map<String, JsonValue>;

/// The result of lowering one `query` subtree: a WHERE fragment, whether
/// everything in the subtree was recognized, and the field name the
/// subtree talks about (when it talks about exactly one).
#[derive(Debug, Clone)]
pub struct SimpleQuery {
    pub expr: SqlExpr,
    pub can_parse: bool,
    pub field_name: String,
}

impl Default for SimpleQuery {
    fn default() -> Self {
        SimpleQuery {
            expr: SqlExpr::default(),
            can_parse: true,
            field_name: String::new(),
        }
    }
}

impl SimpleQuery {
    pub fn new(expr: SqlExpr) -> Self {
        SimpleQuery {
            expr,
            ..Default::default()
        }
    }

    pub fn with_field(expr: SqlExpr, field_name: String) -> Self {
        SimpleQuery {
            expr,
            can_parse: true,
            field_name,
        }
    }

    pub fn unparseable() -> Self {
        SimpleQuery {
            expr: SqlExpr::default(),
            can_parse: false,
            field_name: String::new(),
        }
    }
}

/// Everything the predicate builder and the planner need to look at while
/// walking one request: the table snapshot (if the request names a known
/// table) and the SQL dialect.
pub(crate) struct QueryContext<'a> {
    pub table: Option<&'a Table>,
    pub dialect: &'a dyn Dialect,
}

impl QueryContext<'_> {
    pub fn resolve_field(&self, field_name: &str) -> String {
        match self.table {
            Some(table) => table.resolve_field(field_name),
            None => match field_name.strip_suffix(".keyword") {
                Some(stripped) => {
                    warn!("trimming .keyword from field {field_name}");
                    stripped.to_string()
                }
                None => field_name.to_string(),
            },
        }
    }

    pub fn field_info(&self, field_name: &str) -> FieldInfo {
        match self.table {
            Some(table) => table.field_info(field_name),
            None => FieldInfo::Missing,
        }
    }

    fn quoted_column(&self, resolved: &str) -> SqlExpr {
        SqlExpr::atom(self.dialect.quote_identifier(resolved))
    }

    /// Recursive descent over the `query` map. Unknown node kinds poison
    /// `can_parse` but never abort: the caller still gets a usable (if
    /// weaker) WHERE.
    pub fn parse_query_map(&self, query_map: &JsonMap) -> SimpleQuery {
        let mut combined = SimpleQuery::default();
        for (key, value) in query_map {
            let parsed = match (key.as_str(), value.as_object()) {
                ("match_all", _) => SimpleQuery::default(),
                ("bool", Some(m)) => self.parse_bool(m),
                ("range", Some(m)) => self.parse_range(m),
                ("term", Some(m)) => self.parse_term(m),
                ("terms", Some(m)) => self.parse_terms(m),
                ("match", Some(m)) => self.parse_match(m, false),
                ("match_phrase", Some(m)) => self.parse_match(m, true),
                ("exists", Some(m)) => self.parse_exists(m),
                ("prefix", Some(m)) => self.parse_prefix(m),
                ("wildcard", Some(m)) => self.parse_wildcard(m),
                ("query_string", Some(m)) => self.parse_query_string(m),
                (_, Some(_)) => {
                    warn!("unrecognized query node: {key}");
                    SimpleQuery::unparseable()
                }
                (_, None) => {
                    warn!("query node {key} is not an object");
                    SimpleQuery::unparseable()
                }
            };
            combined = self.combine_wheres(combined, parsed);
        }
        combined
    }

    pub fn parse_bool(&self, bool_map: &JsonMap) -> SimpleQuery {
        let mut members: Vec<SimpleQuery> = Vec::new();
        for occurrence in ["must", "filter"] {
            if let Some(value) = bool_map.get(occurrence) {
                members.extend(self.clause_list(value));
            }
        }
        let mut expr_parts: Vec<SqlExpr> = Vec::new();
        let mut can_parse = true;
        let mut field_name = String::new();

        for member in &members {
            expr_parts.push(member.expr.clone());
        }

        if let Some(should) = bool_map.get("should") {
            let clauses = self.clause_list(should);
            expr_parts.push(cmp::or(clauses.iter().map(|c| c.expr.clone())));
            members.extend(clauses);
        }
        if let Some(must_not) = bool_map.get("must_not") {
            let clauses = self.clause_list(must_not);
            expr_parts.extend(clauses.iter().map(|c| cmp::not(c.expr.clone())));
            members.extend(clauses);
        }

        for member in &members {
            can_parse &= member.can_parse;
            if member.field_name.is_empty() {
                continue;
            }
            if field_name.is_empty() {
                field_name = member.field_name.clone();
            } else if field_name != member.field_name {
                warn!(
                    "combining 2 where clauses with non-empty field names: {field_name}, {}",
                    member.field_name
                );
            }
        }

        SimpleQuery {
            expr: cmp::and(expr_parts),
            can_parse,
            field_name,
        }
    }

    /// `must`/`should`/`must_not` accept both a single clause object and an
    /// array of them.
    fn clause_list(&self, value: &JsonValue) -> Vec<SimpleQuery> {
        match value {
            JsonValue::Array(clauses) => clauses
                .iter()
                .map(|clause| match clause.as_object() {
                    Some(m) => self.parse_query_map(m),
                    None => {
                        warn!("bool clause is not an object");
                        SimpleQuery::unparseable()
                    }
                })
                .collect(),
            JsonValue::Object(m) => vec![self.parse_query_map(m)],
            _ => {
                warn!("bool clause list is neither object nor array");
                vec![SimpleQuery::unparseable()]
            }
        }
    }

    pub fn parse_range(&self, range_map: &JsonMap) -> SimpleQuery {
        let Some((field, spec)) = range_map.iter().next() else {
            warn!("empty range query");
            return SimpleQuery::unparseable();
        };
        let resolved = self.resolve_field(field);
        let column = SqlExpr::atom(self.dialect.quote_identifier(&resolved));
        let Some(spec) = spec.as_object() else {
            warn!("range spec for {field} is not an object");
            return SimpleQuery::unparseable();
        };

        let mut comparisons = Vec::new();
        let mut can_parse = true;
        for (op_name, bound) in spec {
            let op = match op_name.as_str() {
                "gt" => ">",
                "gte" => ">=",
                "lt" => "<",
                "lte" => "<=",
                "format" => continue,
                other => {
                    warn!("unknown range operator: {other}");
                    can_parse = false;
                    continue;
                }
            };
            match self.range_bound(bound) {
                Some(literal) => comparisons.push(cmp::comparison(column.clone(), op, literal)),
                None => {
                    warn!("cannot render range bound for {field}: {bound}");
                    can_parse = false;
                }
            }
        }

        SimpleQuery {
            expr: cmp::and(comparisons),
            can_parse,
            field_name: resolved,
        }
    }

    /// Numbers pass through; strings are date-ish: date-math expressions
    /// render as SQL arithmetic, everything else goes to the database's
    /// best-effort datetime parser.
    fn range_bound(&self, bound: &JsonValue) -> Option<SqlExpr> {
        match bound {
            JsonValue::Number(n) => Some(SqlExpr::atom(n.to_string())),
            JsonValue::String(s) => match parse_date_math(s) {
                Ok(DateMath::PlainDate(_)) | Err(_) => Some(func::parse_date_time_best_effort(
                    SqlExpr::atom(self.dialect.quote_string(s)),
                )),
                Ok(expr) => Some(render_date_math(&expr, self.dialect)),
            },
            _ => None,
        }
    }

    pub fn parse_term(&self, term_map: &JsonMap) -> SimpleQuery {
        let Some((field, spec)) = term_map.iter().next() else {
            warn!("empty term query");
            return SimpleQuery::unparseable();
        };
        let value = match spec {
            JsonValue::Object(m) => m.get("value").unwrap_or(spec),
            other => other,
        };
        let resolved = self.resolve_field(field);
        match self.json_literal(value) {
            Some(literal) => {
                let expr = cmp::eq(self.quoted_column(&resolved), literal);
                SimpleQuery::with_field(expr, resolved)
            }
            None => {
                warn!("term value for {field} is not a scalar");
                SimpleQuery::unparseable()
            }
        }
    }

    pub fn parse_terms(&self, terms_map: &JsonMap) -> SimpleQuery {
        let Some((field, values)) = terms_map.iter().find(|(k, _)| *k != "boost") else {
            warn!("empty terms query");
            return SimpleQuery::unparseable();
        };
        let Some(values) = values.as_array() else {
            warn!("terms values for {field} are not an array");
            return SimpleQuery::unparseable();
        };
        let mut literals = Vec::with_capacity(values.len());
        for value in values {
            match self.json_literal(value) {
                Some(literal) => literals.push(literal),
                None => {
                    warn!("terms value for {field} is not a scalar");
                    return SimpleQuery::unparseable();
                }
            }
        }
        let resolved = self.resolve_field(field);
        let expr = cmp::in_list(self.quoted_column(&resolved), literals);
        SimpleQuery::with_field(expr, resolved)
    }

    fn parse_match(&self, match_map: &JsonMap, phrase: bool) -> SimpleQuery {
        let Some((field, spec)) = match_map.iter().next() else {
            warn!("empty match query");
            return SimpleQuery::unparseable();
        };
        let text = match spec {
            JsonValue::String(s) => s.clone(),
            JsonValue::Object(m) => match m.get("query").and_then(|q| q.as_str()) {
                Some(s) => s.to_string(),
                None => {
                    warn!("match query for {field} has no text");
                    return SimpleQuery::unparseable();
                }
            },
            other => other.to_string(),
        };
        let resolved = self.resolve_field(field);
        let column = self.quoted_column(&resolved);
        let expr = if phrase {
            self.contains(column, &text)
        } else {
            cmp::or(
                text.split_whitespace()
                    .map(|word| self.contains(column.clone(), word)),
            )
        };
        SimpleQuery::with_field(expr, resolved)
    }

    fn contains(&self, column: SqlExpr, text: &str) -> SqlExpr {
        cmp::ilike(
            column,
            SqlExpr::atom(self.dialect.quote_string(&format!("%{text}%"))),
        )
    }

    fn parse_exists(&self, exists_map: &JsonMap) -> SimpleQuery {
        let Some(field) = exists_map.get("field").and_then(|f| f.as_str()) else {
            warn!("exists query without field");
            return SimpleQuery::unparseable();
        };
        let resolved = self.resolve_field(field);
        let column = self.quoted_column(&resolved);
        let expr = match self.field_info(&resolved) {
            FieldInfo::Array => func::not_empty(column),
            FieldInfo::Scalar | FieldInfo::Missing => cmp::is_not_null(column),
        };
        SimpleQuery::with_field(expr, resolved)
    }

    fn parse_prefix(&self, prefix_map: &JsonMap) -> SimpleQuery {
        let Some((field, spec)) = prefix_map.iter().next() else {
            warn!("empty prefix query");
            return SimpleQuery::unparseable();
        };
        let value = match spec {
            JsonValue::Object(m) => m.get("value").and_then(|v| v.as_str()),
            other => other.as_str(),
        };
        let Some(value) = value else {
            warn!("prefix value for {field} is not a string");
            return SimpleQuery::unparseable();
        };
        let resolved = self.resolve_field(field);
        let pattern = SqlExpr::atom(self.dialect.quote_string(&format!("{value}%")));
        let expr = cmp::ilike(self.quoted_column(&resolved), pattern);
        SimpleQuery::with_field(expr, resolved)
    }

    fn parse_wildcard(&self, wildcard_map: &JsonMap) -> SimpleQuery {
        let Some((field, spec)) = wildcard_map.iter().next() else {
            warn!("empty wildcard query");
            return SimpleQuery::unparseable();
        };
        let value = match spec {
            JsonValue::Object(m) => m.get("value").and_then(|v| v.as_str()),
            other => other.as_str(),
        };
        let Some(value) = value else {
            warn!("wildcard value for {field} is not a string");
            return SimpleQuery::unparseable();
        };
        let resolved = self.resolve_field(field);
        let pattern = value.replace('*', "%").replace('?', "_");
        let pattern = SqlExpr::atom(self.dialect.quote_string(&pattern));
        let expr = cmp::ilike(self.quoted_column(&resolved), pattern);
        SimpleQuery::with_field(expr, resolved)
    }

    /// Lucene-lite: `field:value` tokens joined with `AND`/`OR`. Anything
    /// fancier than that is out of the conservative subset.
    fn parse_query_string(&self, qs_map: &JsonMap) -> SimpleQuery {
        let Some(query) = qs_map.get("query").and_then(|q| q.as_str()) else {
            warn!("query_string without query text");
            return SimpleQuery::unparseable();
        };
        let mut or_groups = Vec::new();
        for group in query.split(" OR ") {
            let mut and_terms = Vec::new();
            for token in group.split(" AND ") {
                let token = token.trim();
                let Some((field, value)) = token.split_once(':') else {
                    warn!("query_string token without field: {token}");
                    return SimpleQuery::unparseable();
                };
                let value = value.trim().trim_matches('"');
                let literal = if value.parse::<f64>().is_ok() {
                    SqlExpr::atom(value.to_string())
                } else {
                    SqlExpr::atom(self.dialect.quote_string(value))
                };
                let resolved = self.resolve_field(field.trim());
                and_terms.push(cmp::eq(self.quoted_column(&resolved), literal));
            }
            or_groups.push(cmp::and(and_terms));
        }
        SimpleQuery::new(cmp::or(or_groups))
    }

    /// Conjoin two lowered predicates. When both sides carry a field name
    /// the left one wins and a warning is logged; downstream consumers key
    /// on that name, so silently merging would hide the ambiguity.
    pub fn combine_wheres(&self, left: SimpleQuery, right: SimpleQuery) -> SimpleQuery {
        let can_parse = left.can_parse && right.can_parse;
        if !left.field_name.is_empty() && !right.field_name.is_empty() {
            warn!(
                "combining 2 where clauses with non-empty field names: {}, {}",
                left.field_name, right.field_name
            );
        }
        let field_name = if !left.field_name.is_empty() {
            left.field_name
        } else {
            right.field_name
        };
        let expr = if left.expr.is_empty() {
            right.expr
        } else if right.expr.is_empty() {
            left.expr
        } else {
            cmp::and([left.expr, right.expr])
        };
        SimpleQuery {
            expr,
            can_parse,
            field_name,
        }
    }

    fn json_literal(&self, value: &JsonValue) -> Option<SqlExpr> {
        match value {
            JsonValue::String(s) => Some(SqlExpr::atom(self.dialect.quote_string(s))),
            JsonValue::Number(n) => Some(SqlExpr::atom(n.to_string())),
            JsonValue::Bool(b) => Some(SqlExpr::atom(b.to_string())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ClickHouse;
    use serde_json::json;

    fn ctx_sql(query: serde_json::Value) -> (SimpleQuery, String) {
        let dialect = ClickHouse();
        let ctx = QueryContext {
            table: None,
            dialect: &dialect,
        };
        let parsed = ctx.parse_query_map(query.as_object().expect("query must be an object"));
        let sql = parsed.expr.content.clone();
        (parsed, sql)
    }

    #[test]
    fn term_query() {
        let (parsed, sql) = ctx_sql(json!({"term": {"service": "api"}}));
        assert_eq!(sql, r#""service" = 'api'"#);
        assert!(parsed.can_parse);
        assert_eq!(parsed.field_name, "service");
    }

    #[test]
    fn term_query_with_value_object() {
        let (_, sql) = ctx_sql(json!({"term": {"status": {"value": 500}}}));
        assert_eq!(sql, r#""status" = 500"#);
    }

    #[test]
    fn terms_query() {
        let (_, sql) = ctx_sql(json!({"terms": {"level": ["warn", "error"]}}));
        assert_eq!(sql, r#""level" IN ('warn', 'error')"#);
    }

    #[test]
    fn numeric_range() {
        let (_, sql) = ctx_sql(json!({"range": {"status": {"gte": 500, "lt": 600}}}));
        assert_eq!(sql, r#""status" >= 500 AND "status" < 600"#);
    }

    #[test]
    fn datetime_range_uses_best_effort_parser() {
        let (_, sql) = ctx_sql(json!({"range": {"@timestamp": {"gte": "2024-01-29T18:17:40.045Z"}}}));
        assert_eq!(
            sql,
            r#""@timestamp" >= parseDateTime64BestEffort('2024-01-29T18:17:40.045Z')"#
        );
    }

    #[test]
    fn date_math_range_renders_arithmetic() {
        let (_, sql) = ctx_sql(json!({"range": {"@timestamp": {"gte": "now-1d/d"}}}));
        assert_eq!(
            sql,
            r#""@timestamp" >= toStartOfDay(now() - toIntervalDay(1))"#
        );
    }

    #[test]
    fn bool_combines_occurrence_types() {
        let (_, sql) = ctx_sql(json!({
            "bool": {
                "must": [{"term": {"service": "api"}}],
                "must_not": [{"term": {"level": "debug"}}],
                "should": [
                    {"term": {"zone": "a"}},
                    {"term": {"zone": "b"}}
                ]
            }
        }));
        assert_eq!(
            sql,
            r#""service" = 'api' AND ("zone" = 'a' OR "zone" = 'b') AND NOT ("level" = 'debug')"#
        );
    }

    #[test]
    fn filter_clause_acts_like_must() {
        let (_, must_sql) = ctx_sql(json!({"bool": {"must": {"term": {"a": 1}}}}));
        let (_, filter_sql) = ctx_sql(json!({"bool": {"filter": {"term": {"a": 1}}}}));
        assert_eq!(must_sql, filter_sql);
    }

    #[test]
    fn match_splits_words() {
        let (_, sql) = ctx_sql(json!({"match": {"message": "connection refused"}}));
        assert_eq!(
            sql,
            r#""message" iLIKE '%connection%' OR "message" iLIKE '%refused%'"#
        );
    }

    #[test]
    fn match_phrase_keeps_whole_text() {
        let (_, sql) = ctx_sql(json!({"match_phrase": {"message": "connection refused"}}));
        assert_eq!(sql, r#""message" iLIKE '%connection refused%'"#);
    }

    #[test]
    fn keyword_suffix_resolves_before_quoting() {
        let (parsed, sql) = ctx_sql(json!({"term": {"service.keyword": "api"}}));
        assert_eq!(sql, r#""service" = 'api'"#);
        assert_eq!(parsed.field_name, "service");
    }

    #[test]
    fn exists_query() {
        let (_, sql) = ctx_sql(json!({"exists": {"field": "trace_id"}}));
        assert_eq!(sql, r#""trace_id" IS NOT NULL"#);
    }

    #[test]
    fn wildcard_translates_globs() {
        let (_, sql) = ctx_sql(json!({"wildcard": {"host": {"value": "web-*"}}}));
        assert_eq!(sql, r#""host" iLIKE 'web-%'"#);
    }

    #[test]
    fn query_string_field_tokens() {
        let (parsed, sql) = ctx_sql(json!({"query_string": {"query": "level:error AND service:api"}}));
        assert_eq!(sql, r#""level" = 'error' AND "service" = 'api'"#);
        assert!(parsed.can_parse);
    }

    #[test]
    fn unknown_node_degrades_instead_of_failing() {
        let (parsed, _) = ctx_sql(json!({"fuzzy": {"message": "x"}}));
        assert!(!parsed.can_parse);
    }

    #[test]
    fn combine_keeps_left_field_name() {
        let dialect = ClickHouse();
        let ctx = QueryContext {
            table: None,
            dialect: &dialect,
        };
        let left = SimpleQuery::with_field(
            SqlExpr::atom("a = 1".to_string()),
            "a".to_string(),
        );
        let right = SimpleQuery::with_field(
            SqlExpr::atom("b = 2".to_string()),
            "b".to_string(),
        );
        let combined = ctx.combine_wheres(left, right);
        assert_eq!(combined.field_name, "a");
        assert!(combined.can_parse);
    }
}
