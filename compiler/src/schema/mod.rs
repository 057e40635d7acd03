mod primitive_schema;
mod registry;
mod schema;

pub use primitive_schema::PrimitiveSchema;
pub use registry::SchemaRegistry;
pub use schema::{Column, FieldInfo, Schema, Table};
