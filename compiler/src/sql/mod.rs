mod clickhouse;
mod dialect;
mod rendering;

pub mod expr;

pub use clickhouse::ClickHouse;
pub use dialect::Dialect;
pub use expr::{SqlExpr, SqlExprPrecedence};
pub use rendering::Render;
