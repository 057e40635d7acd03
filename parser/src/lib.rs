mod parser;

pub mod ast;

use chumsky::prelude::*;
use chumsky::Parser;

/// Parse a date-math token, e.g. `2024-04-15`, `now-1d/M`, `now+6h`.
pub fn parse_date_math(input: &str) -> Result<ast::DateMath, String> {
    parser::date_math()
        .then_ignore(end())
        .parse(input)
        .map_err(|_| format!("invalid date math expression: {input}"))
}

/// Parse a histogram interval token, e.g. `30s`, `1h`, `7d`, `month`.
pub fn parse_interval(input: &str) -> Result<ast::Interval, String> {
    parser::interval()
        .then_ignore(end())
        .parse(input)
        .map_err(|_| format!("invalid interval: {input}"))
}
