mod compiling;
mod errors;
mod options;
mod plan;
mod response;
mod schema;
mod sql;
#[cfg(test)]
mod tests;

pub use compiling::{ResponseShape, SearchPlan, Translator};
pub use errors::TranslateError;
pub use options::Options;
pub use plan::{
    display_name, Aggregator, ColumnSlot, DateTimeInterval, PlanEntry, QueryResultCol,
    QueryResultRow, ResultKind, ScanKind, SqlValue, EMPTY_FIELD_SELECTION, ROW_NUMBER_COLUMN,
};
pub use response::{fold_entry, make_async_search_response, make_search_response};
pub use schema::{Column, FieldInfo, PrimitiveSchema, Schema, SchemaRegistry, Table};
pub use sql::{ClickHouse, Dialect, Render, SqlExpr, SqlExprPrecedence};
