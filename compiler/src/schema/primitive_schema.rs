use serde::Deserialize;

/// The schema as described in JSON by the table registry, before being
/// indexed into lookup maps.
#[derive(Debug, Deserialize)]
pub struct PrimitiveSchema {
    pub tables: Vec<PrimitiveTable>,
}

#[derive(Debug, Deserialize)]
pub struct PrimitiveTable {
    pub name: String,
    pub columns: Vec<PrimitiveColumn>,
}

#[derive(Debug, Deserialize)]
pub struct PrimitiveColumn {
    pub name: String,
    #[serde(default)]
    pub array: bool,
}
