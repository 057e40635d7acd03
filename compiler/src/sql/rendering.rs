use itertools::Itertools;

use super::dialect::Dialect;
use crate::plan::{PlanEntry, EMPTY_FIELD_SELECTION};

pub trait Render {
    fn render(&self, dialect: &dyn Dialect) -> String;
}

impl Render for PlanEntry {
    /// Deterministic serialization:
    /// `SELECT <fields>[, <non-schema fields>] FROM <from> [WHERE <where>]
    /// [GROUP BY (<gb>)] [<suffix clauses>]`.
    fn render(&self, dialect: &dyn Dialect) -> String {
        let select_list = self
            .fields
            .iter()
            .map(|f| {
                if f == "*" || f == EMPTY_FIELD_SELECTION {
                    f.clone()
                } else {
                    dialect.quote_identifier(f)
                }
            })
            .chain(self.non_schema_fields.iter().cloned())
            .join(", ");

        let mut sql = format!("SELECT {} FROM {}", select_list, self.from_clause);
        if !self.where_expr.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_expr.content);
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY (");
            sql.push_str(&self.group_by.iter().join(", "));
            sql.push(')');
        }
        for clause in &self.suffix_clauses {
            sql.push(' ');
            sql.push_str(clause);
        }
        sql
    }
}
