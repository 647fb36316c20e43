use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::settings::{default_config_dir, SettingsError, DEFAULT_HISTORY_CAPACITY};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryHistoryItem {
    pub id: String,
    pub query: String,
    pub executed_at_unix_ms: u64,
    #[serde(default)]
    pub row_count: Option<usize>,
    #[serde(default)]
    pub execution_time_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl QueryHistoryItem {
    #[must_use]
    pub fn started(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            query: query.into(),
            executed_at_unix_ms: unix_timestamp_millis(),
            row_count: None,
            execution_time_ms: None,
            error: None,
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[must_use]
pub fn unix_timestamp_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// Executed queries, newest first, bounded to `capacity` entries.
#[derive(Debug, Clone)]
pub struct QueryHistory {
    capacity: usize,
    items: VecDeque<QueryHistoryItem>,
}

impl Default for QueryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl QueryHistory {
    /// A capacity of 0 is raised to 1.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Keeps the newest `capacity` of `items`, which are expected newest first.
    #[must_use]
    pub fn from_items(capacity: usize, items: Vec<QueryHistoryItem>) -> Self {
        let mut history = Self::new(capacity);
        history.items = items.into_iter().take(history.capacity).collect();
        history
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn record(&mut self, item: QueryHistoryItem) {
        if self.items.len() == self.capacity {
            self.items.pop_back();
        }
        self.items.push_front(item);
    }

    #[must_use]
    pub fn latest(&self) -> Option<&QueryHistoryItem> {
        self.items.front()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&QueryHistoryItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryHistoryItem> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[derive(Debug, Error)]
pub enum HistoryStoreError {
    #[error("failed to resolve default config path: {0}")]
    Config(#[from] SettingsError),
    #[error("failed to read history file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse history file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to create history directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize history: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write history file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Query history persisted as a pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn load_default() -> Result<Self, HistoryStoreError> {
        Ok(Self {
            path: default_config_dir()?.join("query_history.json"),
        })
    }

    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self, capacity: usize) -> Result<QueryHistory, HistoryStoreError> {
        if !self.path.exists() {
            return Ok(QueryHistory::new(capacity));
        }

        let raw = fs::read_to_string(&self.path).map_err(|source| HistoryStoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(QueryHistory::new(capacity));
        }

        let items: Vec<QueryHistoryItem> =
            serde_json::from_str(&raw).map_err(|source| HistoryStoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(QueryHistory::from_items(capacity, items))
    }

    pub fn save(&self, history: &QueryHistory) -> Result<(), HistoryStoreError> {
        if let Some(parent_dir) = self.path.parent() {
            fs::create_dir_all(parent_dir).map_err(|source| HistoryStoreError::CreateDir {
                path: parent_dir.to_path_buf(),
                source,
            })?;
        }

        let items = history.iter().collect::<Vec<_>>();
        let rendered = serde_json::to_string_pretty(&items)
            .map_err(|source| HistoryStoreError::Serialize { source })?;
        fs::write(&self.path, rendered).map_err(|source| HistoryStoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
