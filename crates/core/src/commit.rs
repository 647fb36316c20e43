use std::fmt;

use log::debug;
use thiserror::Error;

use crate::backend::{BackendError, TableBackend};
use crate::editor_state::InFlightGuard;
use crate::ledger::PendingLedger;
use crate::table_data::{RowDelete, RowInsert, RowUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStep {
    Update,
    Insert,
    Delete,
}

impl fmt::Display for SaveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Update => "updates",
            Self::Insert => "inserts",
            Self::Delete => "deletes",
        };
        f.write_str(label)
    }
}

/// A save that stopped at `step`. Earlier steps may already be applied on
/// the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to apply {step}: {source}")]
pub struct SaveError {
    pub step: SaveStep,
    #[source]
    pub source: BackendError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveCounts {
    pub updated: usize,
    pub inserted: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    pub counts: SaveCounts,
    /// False when the post-save refetch failed; the error is on the state.
    pub refreshed: bool,
}

/// Snapshot of the ledger taken when a save starts, plus the in-flight guard
/// that keeps other operations out until the save is over.
#[derive(Debug)]
pub struct SaveBatch {
    schema: String,
    table: String,
    updates: Vec<RowUpdate>,
    inserts: Vec<RowInsert>,
    deletes: Vec<RowDelete>,
    guard: InFlightGuard,
}

impl SaveBatch {
    #[must_use]
    pub fn from_ledger(
        schema: String,
        table: String,
        ledger: &PendingLedger,
        guard: InFlightGuard,
    ) -> Self {
        let updates = ledger
            .updates()
            .map(|update| RowUpdate {
                row_id: update.row_id.clone(),
                column: update.column.clone(),
                new_value: update.new_value.clone(),
            })
            .collect();
        let deletes = ledger
            .deletes()
            .map(|row_id| RowDelete {
                row_id: row_id.clone(),
            })
            .collect();

        Self {
            schema,
            table,
            updates,
            inserts: ledger.inserts().to_vec(),
            deletes,
            guard,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn updates(&self) -> &[RowUpdate] {
        &self.updates
    }

    #[must_use]
    pub fn inserts(&self) -> &[RowInsert] {
        &self.inserts
    }

    #[must_use]
    pub fn deletes(&self) -> &[RowDelete] {
        &self.deletes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.inserts.is_empty() && self.deletes.is_empty()
    }

    /// Sends updates, then inserts, then deletes, one awaited call each and
    /// skipping empty kinds. Stops at the first failure.
    pub async fn apply<B>(&self, backend: &B) -> Result<SaveCounts, SaveError>
    where
        B: TableBackend + ?Sized,
    {
        let mut counts = SaveCounts::default();

        if !self.updates.is_empty() {
            debug!(
                "sending {} updates to {}.{}",
                self.updates.len(),
                self.schema,
                self.table
            );
            backend
                .update_rows(&self.schema, &self.table, &self.updates)
                .await
                .map_err(|source| SaveError {
                    step: SaveStep::Update,
                    source,
                })?;
            counts.updated = self.updates.len();
        }

        if !self.inserts.is_empty() {
            debug!(
                "sending {} inserts to {}.{}",
                self.inserts.len(),
                self.schema,
                self.table
            );
            backend
                .insert_rows(&self.schema, &self.table, &self.inserts)
                .await
                .map_err(|source| SaveError {
                    step: SaveStep::Insert,
                    source,
                })?;
            counts.inserted = self.inserts.len();
        }

        if !self.deletes.is_empty() {
            debug!(
                "sending {} deletes to {}.{}",
                self.deletes.len(),
                self.schema,
                self.table
            );
            backend
                .delete_rows(&self.schema, &self.table, &self.deletes)
                .await
                .map_err(|source| SaveError {
                    step: SaveStep::Delete,
                    source,
                })?;
            counts.deleted = self.deletes.len();
        }

        Ok(counts)
    }

    pub(crate) fn into_guard(self) -> InFlightGuard {
        self.guard
    }
}
