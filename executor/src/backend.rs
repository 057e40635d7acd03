use async_trait::async_trait;
use thiserror::Error;

use skua_compiler::SqlValue;

/// An opaque driver-side failure. The executor only needs its text; the
/// concrete driver keeps its own error taxonomy.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        BackendError(message.into())
    }
}

/// The database driver seam. The hosting proxy supplies the real
/// connection; tests run against [`MemoryBackend`].
///
/// [`MemoryBackend`]: crate::MemoryBackend
#[async_trait]
pub trait SqlBackend: Send + Sync {
    /// Submit a statement and return a stream over its result rows. This
    /// is one of the two suspension points of a request.
    async fn execute(&self, sql: &str) -> Result<Box<dyn RowStream>, BackendError>;
}

/// Row iteration, the second suspension point. Implementations yield raw
/// column values in select-list order.
#[async_trait]
pub trait RowStream: Send {
    async fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, BackendError>;
}

/// A canned backend for tests and offline development: every `execute`
/// pops the next prepared result set, in submission order.
pub struct MemoryBackend {
    results: std::sync::Mutex<std::collections::VecDeque<Vec<Vec<SqlValue>>>>,
    pub executed: std::sync::Mutex<Vec<String>>,
}

impl MemoryBackend {
    pub fn new(results: Vec<Vec<Vec<SqlValue>>>) -> Self {
        MemoryBackend {
            results: std::sync::Mutex::new(results.into()),
            executed: std::sync::Mutex::new(Vec::new()),
        }
    }
}

struct MemoryRows {
    rows: std::collections::VecDeque<Vec<SqlValue>>,
}

#[async_trait]
impl RowStream for MemoryRows {
    async fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, BackendError> {
        Ok(self.rows.pop_front())
    }
}

#[async_trait]
impl SqlBackend for MemoryBackend {
    async fn execute(&self, sql: &str) -> Result<Box<dyn RowStream>, BackendError> {
        self.executed
            .lock()
            .map_err(|_| BackendError::new("executed log poisoned"))?
            .push(sql.to_string());
        let rows = self
            .results
            .lock()
            .map_err(|_| BackendError::new("results poisoned"))?
            .pop_front()
            .ok_or_else(|| BackendError::new(format!("no canned result for: {sql}")))?;
        Ok(Box::new(MemoryRows { rows: rows.into() }))
    }
}
