use itertools::Itertools;

use super::{SqlExpr, SqlExprPrecedence};

fn binary_op(a: SqlExpr, op: &str, b: SqlExpr, precedence: SqlExprPrecedence) -> SqlExpr {
    SqlExpr {
        content: format!(
            "{} {} {}",
            a.for_precedence(precedence),
            op,
            b.for_precedence(precedence)
        ),
        precedence,
    }
}

pub fn sql_func(name: &str, args: impl IntoIterator<Item = SqlExpr>) -> SqlExpr {
    SqlExpr::atom(format!("{}({})", name, args.into_iter().join(", ")))
}

pub mod cmp {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Conjunction {
        And,
        Or,
    }

    /// A set of conditions joined by `AND` or `OR`. Empty members are
    /// dropped so an absent WHERE combines as a no-op.
    pub fn condition_set(
        conditions: impl IntoIterator<Item = SqlExpr>,
        conjunction: Conjunction,
    ) -> SqlExpr {
        let separator = match conjunction {
            Conjunction::And => " AND ",
            Conjunction::Or => " OR ",
        };
        let precedence = match conjunction {
            Conjunction::And => SqlExprPrecedence::LogicalAnd,
            Conjunction::Or => SqlExprPrecedence::LogicalOr,
        };
        SqlExpr {
            content: conditions
                .into_iter()
                .filter(|e| !e.is_empty())
                .map(|c| c.for_precedence(precedence).content)
                .join(separator),
            precedence,
        }
    }

    pub fn and(conditions: impl IntoIterator<Item = SqlExpr>) -> SqlExpr {
        condition_set(conditions, Conjunction::And)
    }

    pub fn or(conditions: impl IntoIterator<Item = SqlExpr>) -> SqlExpr {
        condition_set(conditions, Conjunction::Or)
    }

    pub fn not(a: SqlExpr) -> SqlExpr {
        if a.is_empty() {
            return a;
        }
        SqlExpr::atom(format!("NOT ({})", a.content))
    }

    pub fn comparison(a: SqlExpr, op: &str, b: SqlExpr) -> SqlExpr {
        binary_op(a, op, b, SqlExprPrecedence::Comparison)
    }

    pub fn eq(a: SqlExpr, b: SqlExpr) -> SqlExpr {
        comparison(a, "=", b)
    }

    pub fn ilike(a: SqlExpr, b: SqlExpr) -> SqlExpr {
        comparison(a, "iLIKE", b)
    }

    pub fn in_list(a: SqlExpr, list: impl IntoIterator<Item = SqlExpr>) -> SqlExpr {
        SqlExpr {
            content: format!(
                "{} IN ({})",
                a.for_precedence(SqlExprPrecedence::Comparison),
                list.into_iter().join(", ")
            ),
            precedence: SqlExprPrecedence::Comparison,
        }
    }

    pub fn is_not_null(a: SqlExpr) -> SqlExpr {
        SqlExpr {
            content: format!("{} IS NOT NULL", a.content),
            precedence: SqlExprPrecedence::Comparison,
        }
    }
}

/// The columnar-database function surface the serializer leans on. Porting
/// to another SQL target means substituting these.
pub mod func {
    use super::*;

    pub fn parse_date_time_best_effort(literal: SqlExpr) -> SqlExpr {
        sql_func("parseDateTime64BestEffort", [literal])
    }

    pub fn not_empty(a: SqlExpr) -> SqlExpr {
        sql_func("notEmpty", [a])
    }
}
