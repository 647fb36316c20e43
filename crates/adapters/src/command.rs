use async_trait::async_trait;
use gridline_core::backend::{BackendError, QueryBackend, TableBackend};
use gridline_core::table_data::{
    QueryResult, RowDelete, RowInsert, RowUpdate, TableData, TableDataRequest,
};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const GET_TABLE_DATA: &str = "get_table_data";
pub const UPDATE_ROWS: &str = "update_rows";
pub const INSERT_ROWS: &str = "insert_rows";
pub const DELETE_ROWS: &str = "delete_rows";
pub const EXECUTE_QUERY: &str = "execute_query";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    /// The command ran and reported a failure, e.g. a database error.
    #[error("{0}")]
    Command(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Named-command boundary to whatever process owns the database connection.
#[async_trait]
pub trait CommandInvoker: Send + Sync {
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, InvokeError>;
}

#[async_trait]
impl<I> CommandInvoker for std::sync::Arc<I>
where
    I: CommandInvoker + ?Sized,
{
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, InvokeError> {
        (**self).invoke(command, args).await
    }
}

#[derive(Serialize)]
struct FetchArgs<'a> {
    request: &'a TableDataRequest,
}

#[derive(Serialize)]
struct UpdateArgs<'a> {
    schema: &'a str,
    table: &'a str,
    updates: &'a [RowUpdate],
}

#[derive(Serialize)]
struct InsertArgs<'a> {
    schema: &'a str,
    table: &'a str,
    rows: &'a [RowInsert],
}

#[derive(Serialize)]
struct DeleteArgs<'a> {
    schema: &'a str,
    table: &'a str,
    deletes: &'a [RowDelete],
}

#[derive(Serialize)]
struct QueryArgs<'a> {
    query: &'a str,
}

/// Table and query backend speaking the command protocol through `I`.
#[derive(Debug, Clone)]
pub struct CommandBackend<I> {
    invoker: I,
}

impl<I: CommandInvoker> CommandBackend<I> {
    #[must_use]
    pub fn new(invoker: I) -> Self {
        Self { invoker }
    }

    #[must_use]
    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    async fn call<A, T>(&self, command: &str, args: &A) -> Result<T, BackendError>
    where
        A: Serialize + Sync,
        T: DeserializeOwned,
    {
        let value = self.send(command, args).await?;
        serde_json::from_value(value).map_err(|error| {
            BackendError::new(format!("invalid response to `{command}`: {error}"))
        })
    }

    async fn send<A>(&self, command: &str, args: &A) -> Result<Value, BackendError>
    where
        A: Serialize + Sync,
    {
        let args = serde_json::to_value(args).map_err(|error| {
            BackendError::new(format!("failed to encode `{command}` arguments: {error}"))
        })?;
        debug!("invoking {command}");
        self.invoker
            .invoke(command, args)
            .await
            .map_err(to_backend_error)
    }
}

#[async_trait]
impl<I: CommandInvoker> TableBackend for CommandBackend<I> {
    async fn fetch_table_page(&self, request: &TableDataRequest) -> Result<TableData, BackendError> {
        self.call(GET_TABLE_DATA, &FetchArgs { request }).await
    }

    async fn update_rows(
        &self,
        schema: &str,
        table: &str,
        updates: &[RowUpdate],
    ) -> Result<(), BackendError> {
        self.send(
            UPDATE_ROWS,
            &UpdateArgs {
                schema,
                table,
                updates,
            },
        )
        .await
        .map(drop)
    }

    async fn insert_rows(
        &self,
        schema: &str,
        table: &str,
        rows: &[RowInsert],
    ) -> Result<(), BackendError> {
        self.send(INSERT_ROWS, &InsertArgs { schema, table, rows })
            .await
            .map(drop)
    }

    async fn delete_rows(
        &self,
        schema: &str,
        table: &str,
        deletes: &[RowDelete],
    ) -> Result<(), BackendError> {
        self.send(
            DELETE_ROWS,
            &DeleteArgs {
                schema,
                table,
                deletes,
            },
        )
        .await
        .map(drop)
    }
}

#[async_trait]
impl<I: CommandInvoker> QueryBackend for CommandBackend<I> {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult, BackendError> {
        self.call(EXECUTE_QUERY, &QueryArgs { query: sql }).await
    }
}

fn to_backend_error(error: InvokeError) -> BackendError {
    BackendError::new(error.to_string())
}
