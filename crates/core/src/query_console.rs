use log::{debug, warn};
use thiserror::Error;

use crate::backend::{BackendError, QueryBackend};
use crate::query_history::{QueryHistory, QueryHistoryItem};
use crate::table_data::QueryResult;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryConsoleError {
    #[error("query backend failed: {0}")]
    Backend(#[source] BackendError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The query text was blank; nothing ran.
    Skipped,
    Completed { row_count: usize, execution_time_ms: u64 },
}

/// Free-form SQL editor state: the text, its latest result and history.
#[derive(Debug, Default)]
pub struct QueryConsole {
    query: String,
    result: Option<QueryResult>,
    is_executing: bool,
    error: Option<String>,
    history: QueryHistory,
}

impl QueryConsole {
    #[must_use]
    pub fn new(history: QueryHistory) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    #[must_use]
    pub fn result(&self) -> Option<&QueryResult> {
        self.result.as_ref()
    }

    pub fn clear_result(&mut self) {
        self.result = None;
    }

    #[must_use]
    pub fn is_executing(&self) -> bool {
        self.is_executing
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    #[must_use]
    pub fn history(&self) -> &QueryHistory {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Runs the current text. Success and failure both land in history.
    pub async fn execute<B>(&mut self, backend: &B) -> Result<QueryOutcome, QueryConsoleError>
    where
        B: QueryBackend + ?Sized,
    {
        let sql = self.query.trim().to_string();
        if sql.is_empty() {
            return Ok(QueryOutcome::Skipped);
        }

        let mut item = QueryHistoryItem::started(sql.clone());
        self.is_executing = true;
        self.error = None;
        debug!("executing query: {sql}");

        let outcome = backend.execute_query(&sql).await;
        self.is_executing = false;

        match outcome {
            Ok(result) => {
                let row_count = result.row_count;
                let execution_time_ms = result.execution_time_ms;
                item.row_count = Some(row_count);
                item.execution_time_ms = Some(execution_time_ms);
                self.history.record(item);
                self.result = Some(result);
                Ok(QueryOutcome::Completed {
                    row_count,
                    execution_time_ms,
                })
            }
            Err(source) => {
                warn!("query failed: {source}");
                item.error = Some(source.to_string());
                self.history.record(item);
                self.error = Some(source.to_string());
                Err(QueryConsoleError::Backend(source))
            }
        }
    }
}
