/// The seam between the translation core and a concrete SQL target.
///
/// The planner quotes identifiers two ways on purpose: SELECT-list and
/// WHERE identifiers are double-quoted, while identifiers embedded in
/// computed expressions (window subqueries, quantile aliases) are
/// backtick-quoted. Both styles are accepted by the target database and
/// both appear in the SQL it logs, so the distinction is kept observable.
pub trait Dialect {
    /// Quote a column or table for a SELECT list or a comparison.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote an identifier for use inside a computed expression.
    fn quote_expr_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    fn quote_string(&self, string: &str) -> String;
}
