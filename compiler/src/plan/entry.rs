use super::kind::ResultKind;
use super::row::{ColumnSlot, ScanKind};
use crate::sql::SqlExpr;

/// Alias of the window-function column used by `top_hits`/`top_metrics`.
pub const ROW_NUMBER_COLUMN: &str = "row_number";
/// `SELECT ''` is valid, hence the quotes in the sentinel itself.
pub const EMPTY_FIELD_SELECTION: &str = "''";

/// One step of the root-to-leaf path of user-chosen aggregation names that
/// locates a plan entry in the response tree. `empty` means the level is a
/// structural ancestor only: it added no group-by of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregator {
    pub name: String,
    pub empty: bool,
}

impl Aggregator {
    pub fn empty(name: impl Into<String>) -> Self {
        Aggregator {
            name: name.into(),
            empty: true,
        }
    }
}

/// One SQL query plus the metadata required to place its rows into the
/// response. Entries are immutable once the planner emits them, and each
/// is executable standalone.
#[derive(Debug, Clone, Default)]
pub struct PlanEntry {
    /// Schema fields of the SELECT list; quoted at render time unless `*`
    /// or the empty-selection sentinel.
    pub fields: Vec<String>,
    /// Raw SQL select expressions: group-by keys, aggregate calls, window
    /// columns. Emitted verbatim after `fields`.
    pub non_schema_fields: Vec<String>,
    /// A table reference or a parenthesized subquery.
    pub from_clause: String,
    pub where_expr: SqlExpr,
    /// Raw SQL fragments, not plain column names: bucket aggregations may
    /// inject `floor(x/i)*i AS x` here.
    pub group_by: Vec<String>,
    /// Raw tail fragments: `ORDER BY …`, `LIMIT n`.
    pub suffix_clauses: Vec<String>,
    pub aggregators: Vec<Aggregator>,
    pub kind: ResultKind,
    /// Number of group-by key columns at the front of each result row.
    /// Usually `group_by.len()`; window aggregations keep their key
    /// columns selected after dropping the GROUP BY clause.
    pub key_depth: usize,
    /// False when some subtree of the DSL was unrecognized. The entry is
    /// still emitted so partial results remain possible.
    pub can_parse: bool,
}

impl PlanEntry {
    /// The ordered `(kind, name)` description of one result row. This is
    /// the contract between the planner and both the executor (scan slot
    /// types) and the reconstructor (positional access).
    pub fn row_schema(&self) -> Vec<ColumnSlot> {
        let mut slots = Vec::with_capacity(self.fields.len() + self.non_schema_fields.len());
        for field in &self.fields {
            slots.push(ColumnSlot {
                kind: ScanKind::Dynamic,
                name: field.clone(),
            });
        }
        let keys = self.key_depth;
        for (i, raw) in self.non_schema_fields.iter().enumerate() {
            let kind = if i < keys {
                match self.kind {
                    ResultKind::DateHistogram { .. } if i == keys - 1 => ScanKind::Int,
                    _ => ScanKind::Dynamic,
                }
            } else {
                self.metric_scan_kind()
            };
            slots.push(ColumnSlot {
                kind,
                name: display_name(raw),
            });
        }
        slots
    }

    fn metric_scan_kind(&self) -> ScanKind {
        match self.kind {
            ResultKind::Count
            | ResultKind::ValueCount
            | ResultKind::Cardinality
            | ResultKind::Histogram
            | ResultKind::DateHistogram { .. }
            | ResultKind::Terms => ScanKind::UInt,
            ResultKind::Quantile => ScanKind::FloatArray,
            ResultKind::PercentileRanks { .. } => ScanKind::Float,
            _ => ScanKind::Dynamic,
        }
    }
}

/// The observable name of a select expression: its alias when one was
/// given, the expression text otherwise, with identifier quoting removed.
pub fn display_name(raw_sql: &str) -> String {
    let named = match raw_sql.rsplit_once(" AS ") {
        Some((_, alias)) => alias,
        None => raw_sql,
    };
    named.trim_matches(|c| c == '"' || c == '`').to_string()
}
