use std::collections::HashMap;

use tracing::warn;

use super::primitive_schema::PrimitiveSchema;

/// What the resolver knows about a DSL field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldInfo {
    Missing,
    Scalar,
    Array,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub array: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub name: String,
    pub columns: HashMap<String, Column>,
}

impl Table {
    /// Maps a DSL field name to its physical column name. Strips the
    /// `.keyword` compatibility suffix (with a warning). Resolution is
    /// idempotent: an already-resolved name comes back unchanged. Unknown
    /// names pass through raw so the database reports a clean error
    /// instead of silently returning nothing.
    pub fn resolve_field(&self, field_name: &str) -> String {
        let name = match field_name.strip_suffix(".keyword") {
            Some(stripped) => {
                warn!("trimming .keyword from field {field_name}");
                stripped
            }
            None => field_name,
        };
        if !name.is_empty() && !self.columns.contains_key(name) {
            warn!(table = %self.name, field = %name, "field not found in schema, passing through");
        }
        name.to_string()
    }

    pub fn field_info(&self, field_name: &str) -> FieldInfo {
        match self.columns.get(field_name) {
            None => FieldInfo::Missing,
            Some(col) if col.array => FieldInfo::Array,
            Some(_) => FieldInfo::Scalar,
        }
    }
}

/// A read-only snapshot of the table registry. Refreshing swaps a whole
/// new snapshot in; in-flight requests keep the one they started with.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub tables: HashMap<String, Table>,
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }
}

impl From<PrimitiveSchema> for Schema {
    fn from(primitive: PrimitiveSchema) -> Self {
        let tables = primitive
            .tables
            .into_iter()
            .map(|t| {
                let columns = t
                    .columns
                    .into_iter()
                    .map(|c| {
                        (
                            c.name.clone(),
                            Column {
                                name: c.name,
                                array: c.array,
                            },
                        )
                    })
                    .collect();
                (
                    t.name.clone(),
                    Table {
                        name: t.name,
                        columns,
                    },
                )
            })
            .collect();
        Schema { tables }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        let mut columns = HashMap::new();
        for (name, array) in [("service", false), ("tags", true)] {
            columns.insert(
                name.to_string(),
                Column {
                    name: name.to_string(),
                    array,
                },
            );
        }
        Table {
            name: "logs".to_string(),
            columns,
        }
    }

    #[test]
    fn keyword_suffix_is_stripped() {
        assert_eq!(table().resolve_field("service.keyword"), "service");
    }

    #[test]
    fn resolution_is_idempotent() {
        let t = table();
        for name in ["service", "service.keyword", "unknown_field"] {
            let once = t.resolve_field(name);
            assert_eq!(t.resolve_field(&once), once);
        }
    }

    #[test]
    fn unknown_fields_pass_through() {
        assert_eq!(table().resolve_field("no_such"), "no_such");
    }

    #[test]
    fn field_info_classifies() {
        let t = table();
        assert_eq!(t.field_info("service"), FieldInfo::Scalar);
        assert_eq!(t.field_info("tags"), FieldInfo::Array);
        assert_eq!(t.field_info("nope"), FieldInfo::Missing);
    }
}
