mod entry;
mod kind;
mod row;

pub use entry::{display_name, Aggregator, PlanEntry, EMPTY_FIELD_SELECTION, ROW_NUMBER_COLUMN};
pub use kind::{DateTimeInterval, ResultKind};
pub use row::{ColumnSlot, QueryResultCol, QueryResultRow, ScanKind, SqlValue};
