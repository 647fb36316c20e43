use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::table_data::{RowId, RowInsert};

/// Identifies one cell of the loaded page. Renders as `"{row_id}:{column}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub row_id: RowId,
    pub column: String,
}

impl CellKey {
    #[must_use]
    pub fn new(row_id: impl Into<RowId>, column: impl Into<String>) -> Self {
        Self {
            row_id: row_id.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row_id, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellUpdate {
    pub row_id: RowId,
    pub column: String,
    pub original_value: Value,
    pub new_value: Value,
}

/// A staged change. Deletions are tracked separately as a set of row ids.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingChange<'a> {
    Update(&'a CellUpdate),
    Insert(&'a RowInsert),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingSummary {
    pub updates: usize,
    pub inserts: usize,
    pub deletes: usize,
}

impl PendingSummary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.updates + self.inserts + self.deletes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDisplayState {
    Normal,
    Modified,
    Deleted,
}

/// Uncommitted edits for the loaded page.
#[derive(Debug, Clone, Default)]
pub struct PendingLedger {
    updates: IndexMap<CellKey, CellUpdate>,
    inserts: Vec<RowInsert>,
    deletes: IndexSet<RowId>,
    editing_cell: Option<CellKey>,
}

impl PendingLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `new_value` for the cell. Writing the original value back drops
    /// the entry instead. Ends any inline edit.
    pub fn record_update(
        &mut self,
        row_id: RowId,
        column: impl Into<String>,
        original_value: Value,
        new_value: Value,
    ) {
        let key = CellKey {
            row_id,
            column: column.into(),
        };

        if same_value(&original_value, &new_value) {
            self.updates.shift_remove(&key);
        } else {
            let update = CellUpdate {
                row_id: key.row_id.clone(),
                column: key.column.clone(),
                original_value,
                new_value,
            };
            self.updates.insert(key, update);
        }
        self.editing_cell = None;
    }

    pub fn record_insert(&mut self, insert: RowInsert) {
        self.inserts.push(insert);
    }

    /// Returns how many ids were newly marked.
    pub fn record_deletes<I>(&mut self, row_ids: I) -> usize
    where
        I: IntoIterator<Item = RowId>,
    {
        row_ids
            .into_iter()
            .filter(|row_id| self.deletes.insert(row_id.clone()))
            .count()
    }

    pub fn discard(&mut self) {
        self.updates.clear();
        self.inserts.clear();
        self.deletes.clear();
        self.editing_cell = None;
    }

    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.updates.is_empty() || !self.inserts.is_empty() || !self.deletes.is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> PendingSummary {
        PendingSummary {
            updates: self.updates.len(),
            inserts: self.inserts.len(),
            deletes: self.deletes.len(),
        }
    }

    #[must_use]
    pub fn editing_cell(&self) -> Option<&CellKey> {
        self.editing_cell.as_ref()
    }

    pub fn set_editing_cell(&mut self, cell: Option<CellKey>) {
        self.editing_cell = cell;
    }

    #[must_use]
    pub fn update(&self, key: &CellKey) -> Option<&CellUpdate> {
        self.updates.get(key)
    }

    pub fn updates(&self) -> impl Iterator<Item = &CellUpdate> {
        self.updates.values()
    }

    #[must_use]
    pub fn inserts(&self) -> &[RowInsert] {
        &self.inserts
    }

    pub fn deletes(&self) -> impl Iterator<Item = &RowId> {
        self.deletes.iter()
    }

    #[must_use]
    pub fn is_marked_for_delete(&self, row_id: &RowId) -> bool {
        self.deletes.contains(row_id)
    }

    /// All staged updates and inserts, updates first.
    pub fn changes(&self) -> impl Iterator<Item = PendingChange<'_>> {
        self.updates
            .values()
            .map(PendingChange::Update)
            .chain(self.inserts.iter().map(PendingChange::Insert))
    }

    /// Value the view should show: the staged one if any, else `fetched`.
    #[must_use]
    pub fn displayed_value<'a>(
        &'a self,
        row_id: &RowId,
        column: &str,
        fetched: &'a Value,
    ) -> &'a Value {
        self.updates
            .get(&CellKey::new(row_id.clone(), column))
            .map_or(fetched, |update| &update.new_value)
    }

    #[must_use]
    pub fn row_state(&self, row_id: &RowId) -> RowDisplayState {
        if self.deletes.contains(row_id) {
            RowDisplayState::Deleted
        } else if self.updates.keys().any(|key| &key.row_id == row_id) {
            RowDisplayState::Modified
        } else {
            RowDisplayState::Normal
        }
    }
}

/// Structural equality, except that numbers compare by value so `1` and
/// `1.0` are the same cell content.
#[allow(clippy::float_cmp)]
fn same_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => {
            left == right || matches!((left.as_f64(), right.as_f64()), (Some(l), Some(r)) if l == r)
        }
        _ => left == right,
    }
}
