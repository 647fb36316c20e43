use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server-assigned handle for a row of the currently loaded page.
///
/// Only meaningful until the next fetch; it is not a primary key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RowId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDataRequest {
    pub schema: String,
    pub table: String,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub is_auto_generated: bool,
    pub default_value: Option<String>,
}

impl TableColumnInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            is_primary_key: false,
            is_auto_generated: false,
            default_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub id: RowId,
    pub values: Vec<Value>,
}

impl TableRow {
    #[must_use]
    pub fn new(id: impl Into<RowId>, values: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<TableColumnInfo>,
    pub rows: Vec<TableRow>,
    pub total_count: usize,
    #[serde(default)]
    pub primary_keys: Vec<String>,
    pub has_primary_key: bool,
}

impl TableData {
    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|info| info.name == column)
    }

    #[must_use]
    pub fn column(&self, column: &str) -> Option<&TableColumnInfo> {
        self.columns.iter().find(|info| info.name == column)
    }

    #[must_use]
    pub fn row(&self, row_id: &RowId) -> Option<&TableRow> {
        self.rows.iter().find(|row| &row.id == row_id)
    }

    /// Value currently stored on the server side for `row_id.column`.
    #[must_use]
    pub fn cell(&self, row_id: &RowId, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.row(row_id)?.values.get(index)
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        !self.has_primary_key
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowUpdate {
    pub row_id: RowId,
    pub column: String,
    pub new_value: Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowInsert {
    pub values: HashMap<String, Value>,
}

impl RowInsert {
    #[must_use]
    pub fn new(values: HashMap<String, Value>) -> Self {
        Self { values }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDelete {
    pub row_id: RowId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}
