use tracing::error;

use skua_parser::ast::{Anchor, DateMath, OffsetUnit, Rounding, Sign};

use crate::sql::{Dialect, SqlExpr};

/// Render a parsed date-math token to SQL. A plain date becomes a quoted
/// literal; an expression becomes `now()`/anchor arithmetic, wrapped in a
/// `toStartOf…` call when rounding is requested.
pub(crate) fn render_date_math(date_math: &DateMath, dialect: &dyn Dialect) -> SqlExpr {
    match date_math {
        DateMath::PlainDate(date) => SqlExpr::atom(dialect.quote_string(&date.to_iso())),
        DateMath::Expr {
            anchor,
            offsets,
            rounding,
        } => {
            let mut body = match anchor {
                Anchor::Now => "now()".to_string(),
                Anchor::Date(date) => format!(
                    "parseDateTime64BestEffort({})",
                    dialect.quote_string(&date.to_iso())
                ),
            };
            for offset in offsets {
                let op = match offset.sign {
                    Sign::Plus => '+',
                    Sign::Minus => '-',
                };
                body = format!(
                    "{body} {op} {}({})",
                    interval_function(offset.unit),
                    offset.amount
                );
            }
            match rounding {
                None => SqlExpr::atom(body),
                Some(rounding) => SqlExpr::atom(format!("{}({body})", rounding_function(*rounding))),
            }
        }
    }
}

fn interval_function(unit: OffsetUnit) -> &'static str {
    match unit {
        OffsetUnit::Seconds => "toIntervalSecond",
        OffsetUnit::Minutes => "toIntervalMinute",
        OffsetUnit::Hours => "toIntervalHour",
        OffsetUnit::Days => "toIntervalDay",
        OffsetUnit::Weeks => "toIntervalWeek",
        OffsetUnit::Months => "toIntervalMonth",
        OffsetUnit::Years => "toIntervalYear",
    }
}

/// `/d`, `/w`, `/M`, `/Y` round down to the start of the period. An
/// unknown rounding character is logged and treated as `/d`.
fn rounding_function(rounding: Rounding) -> &'static str {
    match rounding {
        Rounding::Day => "toStartOfDay",
        Rounding::Week => "toStartOfWeek",
        Rounding::Month => "toStartOfMonth",
        Rounding::Year => "toStartOfYear",
        Rounding::Unknown(c) => {
            error!("unknown rounding character {c} in date math, defaulting to /d");
            "toStartOfDay"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ClickHouse;
    use skua_parser::parse_date_math;

    fn render(input: &str) -> String {
        render_date_math(&parse_date_math(input).unwrap(), &ClickHouse()).content
    }

    #[test]
    fn plain_date_is_a_quoted_literal() {
        assert_eq!(render("2024-04-15"), "'2024-04-15'");
    }

    #[test]
    fn now_minus_day_rounded_to_month() {
        assert_eq!(
            render("now-1d/M"),
            "toStartOfMonth(now() - toIntervalDay(1))"
        );
    }

    #[test]
    fn chained_offsets() {
        assert_eq!(
            render("now-1w+6h"),
            "now() - toIntervalWeek(1) + toIntervalHour(6)"
        );
    }

    #[test]
    fn unknown_rounding_defaults_to_day() {
        assert_eq!(render("now/x"), "toStartOfDay(now())");
    }

    #[test]
    fn date_anchor_goes_through_best_effort_parser() {
        assert_eq!(
            render("2024-01-01||+1M"),
            "parseDateTime64BestEffort('2024-01-01') + toIntervalMonth(1)"
        );
    }
}
