use super::dialect::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickHouse();

impl Dialect for ClickHouse {
    fn quote_identifier(&self, ident: &str) -> String {
        format!(r#""{}""#, ident.replace('\\', r"\\").replace('"', r#"\""#))
    }

    fn quote_expr_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('\\', r"\\").replace('`', r"\`"))
    }

    fn quote_string(&self, string: &str) -> String {
        format!("'{}'", string.replace('\\', r"\\").replace('\'', r"\'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_quoting() {
        let d = ClickHouse();
        assert_eq!(d.quote_identifier("service"), r#""service""#);
        assert_eq!(d.quote_identifier(r#"we"ird"#), r#""we\"ird""#);
        assert_eq!(d.quote_expr_identifier("@timestamp"), "`@timestamp`");
    }

    #[test]
    fn string_quoting() {
        let d = ClickHouse();
        assert_eq!(d.quote_string("api"), "'api'");
        assert_eq!(d.quote_string("o'clock"), r"'o\'clock'");
    }
}
