mod backend;
mod execute;
mod scan;

pub use backend::{BackendError, MemoryBackend, RowStream, SqlBackend};
pub use execute::{Executor, QueryFailure, Stage};
