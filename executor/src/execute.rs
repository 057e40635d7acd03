use std::time::{Duration, Instant};

use futures::future::try_join_all;
use rand::Rng;
use thiserror::Error;
use tracing::{error, warn};

use skua_compiler::{Dialect, PlanEntry, QueryResultRow, Render, SearchPlan, SqlValue};

use crate::backend::{BackendError, SqlBackend};
use crate::scan::scan_row;

const SLOW_QUERY_THRESHOLD: Duration = Duration::from_secs(30);
const SLOW_QUERY_SAMPLE_RATE: f64 = 0.1;

/// Which suspension point a query died at. Submission failures are
/// recoverable per entry; row-iteration failures abort the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Execute,
    Scan,
}

#[derive(Debug, Error)]
#[error("query failed at {stage:?} stage: {cause}")]
pub struct QueryFailure {
    pub stage: Stage,
    pub cause: BackendError,
}

/// Runs plan entries against a backend and scans their rows into the
/// typed shape the response reconstructor expects.
pub struct Executor<B> {
    backend: B,
    dialect: Box<dyn Dialect + Send + Sync>,
}

impl<B: SqlBackend> Executor<B> {
    pub fn new(backend: B, dialect: Box<dyn Dialect + Send + Sync>) -> Self {
        Executor { backend, dialect }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Execute every entry of the plan, concurrently. An entry whose
    /// submission fails contributes an empty row set (the response keeps
    /// an empty bucket at its position); a scan failure aborts the whole
    /// plan.
    pub async fn run_plan(
        &self,
        plan: &SearchPlan,
        table_name: &str,
    ) -> Result<Vec<Vec<QueryResultRow>>, QueryFailure> {
        try_join_all(plan.entries.iter().map(|entry| async move {
            match self.run_entry(entry, table_name).await {
                Ok(rows) => Ok(rows),
                Err(failure) if failure.stage == Stage::Execute => {
                    warn!(
                        "query for {:?} failed, substituting empty result: {failure}",
                        entry.aggregators
                    );
                    Ok(Vec::new())
                }
                Err(failure) => Err(failure),
            }
        }))
        .await
    }

    pub async fn run_entry(
        &self,
        entry: &PlanEntry,
        table_name: &str,
    ) -> Result<Vec<QueryResultRow>, QueryFailure> {
        let sql = entry.render(self.dialect.as_ref());
        let slots = entry.row_schema();
        let started = Instant::now();

        let mut stream = self
            .backend
            .execute(&sql)
            .await
            .map_err(|cause| QueryFailure {
                stage: Stage::Execute,
                cause,
            })?;

        let mut rows = Vec::new();
        loop {
            let raw = stream.next_row().await.map_err(|cause| QueryFailure {
                stage: Stage::Scan,
                cause,
            })?;
            let Some(raw) = raw else {
                break;
            };
            rows.push(
                scan_row(&slots, raw, table_name).map_err(|cause| QueryFailure {
                    stage: Stage::Scan,
                    cause,
                })?,
            );
        }

        let elapsed = started.elapsed();
        if should_explain_query(elapsed) {
            self.explain_query(&sql, elapsed).await;
        }
        Ok(rows)
    }

    async fn explain_query(&self, sql: &str, elapsed: Duration) {
        let explain_sql = format!("EXPLAIN json=1, indexes=1 {sql}");
        let mut stream = match self.backend.execute(&explain_sql).await {
            Ok(stream) => stream,
            Err(cause) => {
                error!("failed to explain slow query: {cause}");
                return;
            }
        };
        match stream.next_row().await {
            Ok(Some(row)) => {
                let explain = match row.first() {
                    Some(SqlValue::Str(text)) => text.replace('\n', "").replace("  ", ""),
                    other => format!("{other:?}"),
                };
                warn!("slow query (time: '{elapsed:?}') query: '{sql}' -> explain: '{explain}'");
            }
            Ok(None) => {}
            Err(cause) => error!("failed to read slow query explain: {cause}"),
        }
    }
}

fn should_explain_query(elapsed: Duration) -> bool {
    elapsed > SLOW_QUERY_THRESHOLD && rand::thread_rng().gen::<f64>() < SLOW_QUERY_SAMPLE_RATE
}
