use async_trait::async_trait;
use thiserror::Error;

use crate::table_data::{QueryResult, RowDelete, RowInsert, RowUpdate, TableData, TableDataRequest};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Remote side of the table editor. Every call is a single request/response
/// and is the unit of atomicity; nothing spans calls.
#[async_trait]
pub trait TableBackend {
    async fn fetch_table_page(&self, request: &TableDataRequest)
        -> Result<TableData, BackendError>;

    async fn update_rows(
        &self,
        schema: &str,
        table: &str,
        updates: &[RowUpdate],
    ) -> Result<(), BackendError>;

    async fn insert_rows(
        &self,
        schema: &str,
        table: &str,
        rows: &[RowInsert],
    ) -> Result<(), BackendError>;

    async fn delete_rows(
        &self,
        schema: &str,
        table: &str,
        deletes: &[RowDelete],
    ) -> Result<(), BackendError>;
}

#[async_trait]
pub trait QueryBackend {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult, BackendError>;
}
