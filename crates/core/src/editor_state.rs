use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

use crate::backend::BackendError;
use crate::commit::{SaveBatch, SaveError};
use crate::ledger::{CellKey, PendingLedger, RowDisplayState};
use crate::pagination::{NavigationPolicy, Pagination, PaginationError};
use crate::selection::RowSelection;
use crate::settings::EditorSettings;
use crate::table_data::{RowId, RowInsert, TableColumnInfo, TableData, TableDataRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("no table is open for editing")]
    NotInCrudMode,
    #[error("table data has not been loaded yet")]
    NoTableData,
    #[error("table has no primary key and is read-only")]
    ReadOnlyTable,
    #[error("column `{0}` is read-only")]
    ReadOnlyColumn(String),
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    #[error("row `{0}` is not on the loaded page")]
    UnknownRow(RowId),
    #[error("row `{0}` is marked for deletion")]
    RowPendingDeletion(RowId),
    #[error("another table operation is still in flight")]
    OperationInFlight,
    #[error("unsaved changes must be saved or discarded first")]
    UnsavedChanges,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error("failed to load table data: {0}")]
    Fetch(#[source] BackendError),
    #[error(transparent)]
    Save(#[from] SaveError),
}

/// Shared "operation in flight" marker. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct LoadingFlag {
    busy: Arc<AtomicBool>,
}

impl LoadingFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Sets the flag unless it is already set. The flag stays set until the
    /// returned guard is dropped.
    #[must_use]
    pub fn try_acquire(&self) -> Option<InFlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlightGuard {
                busy: Arc::clone(&self.busy),
            })
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrudTarget {
    pub schema: String,
    pub table: String,
}

/// A fetch that has been started but whose outcome is not applied yet.
#[derive(Debug)]
pub struct PendingFetch {
    request: TableDataRequest,
    _guard: InFlightGuard,
}

impl PendingFetch {
    #[must_use]
    pub fn request(&self) -> &TableDataRequest {
        &self.request
    }
}

/// Synchronous state of the table editor. Remote work is split in two
/// phases: a `begin_*` call hands out the request, `finish_*` applies the
/// outcome.
#[derive(Debug)]
pub struct EditorState {
    status: EditorStatus,
    target: Option<CrudTarget>,
    pagination: Pagination,
    page_size_options: Vec<usize>,
    navigation: NavigationPolicy,
    table_data: Option<TableData>,
    is_crud_mode: bool,
    ledger: PendingLedger,
    selection: RowSelection,
    error: Option<String>,
    loading: LoadingFlag,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(Pagination::default(), NavigationPolicy::default())
    }
}

impl EditorState {
    #[must_use]
    pub fn new(pagination: Pagination, navigation: NavigationPolicy) -> Self {
        Self {
            status: EditorStatus::Idle,
            target: None,
            pagination,
            page_size_options: Vec::new(),
            navigation,
            table_data: None,
            is_crud_mode: false,
            ledger: PendingLedger::new(),
            selection: RowSelection::new(),
            error: None,
            loading: LoadingFlag::new(),
        }
    }

    pub fn from_settings(settings: &EditorSettings) -> Result<Self, EditorError> {
        let pagination = Pagination::new(settings.page_size)?;
        ensure_offered_page_size(&settings.page_size_options, settings.page_size)?;
        let mut state = Self::new(pagination, settings.navigation);
        state.page_size_options.clone_from(&settings.page_size_options);
        Ok(state)
    }

    #[must_use]
    pub fn status(&self) -> EditorStatus {
        self.status
    }

    #[must_use]
    pub fn is_crud_mode(&self) -> bool {
        self.is_crud_mode
    }

    #[must_use]
    pub fn target(&self) -> Option<&CrudTarget> {
        self.target.as_ref()
    }

    #[must_use]
    pub fn current_schema(&self) -> Option<&str> {
        self.target.as_ref().map(|target| target.schema.as_str())
    }

    #[must_use]
    pub fn current_table(&self) -> Option<&str> {
        self.target.as_ref().map(|target| target.table.as_str())
    }

    /// Paging position of the open table; `None` outside CRUD mode.
    #[must_use]
    pub fn pagination(&self) -> Option<&Pagination> {
        self.target.as_ref().map(|_| &self.pagination)
    }

    /// Page sizes a caller may switch to; empty allows any size.
    #[must_use]
    pub fn page_size_options(&self) -> &[usize] {
        &self.page_size_options
    }

    #[must_use]
    pub fn navigation_policy(&self) -> NavigationPolicy {
        self.navigation
    }

    pub fn set_navigation_policy(&mut self, navigation: NavigationPolicy) {
        self.navigation = navigation;
    }

    #[must_use]
    pub fn table_data(&self) -> Option<&TableData> {
        self.table_data.as_ref()
    }

    #[must_use]
    pub fn ledger(&self) -> &PendingLedger {
        &self.ledger
    }

    #[must_use]
    pub fn selection(&self) -> &RowSelection {
        &self.selection
    }

    #[must_use]
    pub fn editing_cell(&self) -> Option<&CellKey> {
        self.ledger.editing_cell()
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    #[must_use]
    pub fn loading_flag(&self) -> LoadingFlag {
        self.loading.clone()
    }

    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        self.ledger.has_pending_changes()
    }

    /// True when the loaded table cannot be edited at all.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.table_data.as_ref().is_some_and(TableData::is_read_only)
    }

    #[must_use]
    pub fn is_column_editable(&self, column: &str) -> bool {
        self.table_data.as_ref().is_some_and(|data| {
            !data.is_read_only() && data.column(column).is_some_and(|info| !info.is_auto_generated)
        })
    }

    /// Value the grid shows for a cell, staged edits included.
    #[must_use]
    pub fn cell_value(&self, row_id: &RowId, column: &str) -> Option<&Value> {
        let fetched = self.table_data.as_ref()?.cell(row_id, column)?;
        Some(self.ledger.displayed_value(row_id, column, fetched))
    }

    #[must_use]
    pub fn row_state(&self, row_id: &RowId) -> RowDisplayState {
        self.ledger.row_state(row_id)
    }

    pub fn begin_load(
        &mut self,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<PendingFetch, EditorError> {
        let guard = self.acquire()?;
        let target = CrudTarget {
            schema: schema.into(),
            table: table.into(),
        };
        debug!("loading table {}.{}", target.schema, target.table);

        // Row ids of another table's page must never be sent to this one.
        if self.target.as_ref() != Some(&target) {
            self.table_data = None;
            self.is_crud_mode = false;
        }
        self.pagination.set_page(0);
        self.reset_edits();
        self.error = None;
        self.status = EditorStatus::Loading;
        let request = self.pagination.request(&target.schema, &target.table);
        self.target = Some(target);

        Ok(PendingFetch {
            request,
            _guard: guard,
        })
    }

    /// `Ok(None)` when no table is open.
    pub fn begin_refresh(&mut self) -> Result<Option<PendingFetch>, EditorError> {
        if self.target.is_none() {
            return Ok(None);
        }
        let guard = self.acquire()?;
        Ok(self.refetch(guard))
    }

    pub fn begin_page_change(&mut self, page: usize) -> Result<PendingFetch, EditorError> {
        self.ensure_can_navigate()?;
        let guard = self.acquire()?;
        self.pagination.set_page(page);
        self.refetch(guard).ok_or(EditorError::NotInCrudMode)
    }

    pub fn begin_page_size_change(
        &mut self,
        page_size: usize,
    ) -> Result<PendingFetch, EditorError> {
        self.ensure_can_navigate()?;
        ensure_offered_page_size(&self.page_size_options, page_size)?;
        let guard = self.acquire()?;
        self.pagination.set_page_size(page_size)?;
        self.refetch(guard).ok_or(EditorError::NotInCrudMode)
    }

    /// Applies a fetch outcome. Success replaces the page and clears all
    /// page-scoped edit state; failure keeps whatever was loaded before.
    pub fn finish_fetch(
        &mut self,
        fetch: PendingFetch,
        outcome: Result<TableData, BackendError>,
    ) -> Result<(), EditorError> {
        let PendingFetch { request, _guard } = fetch;
        let is_current = self
            .target
            .as_ref()
            .is_some_and(|target| target.schema == request.schema && target.table == request.table);
        if !is_current {
            debug!(
                "ignoring stale fetch for {}.{}",
                request.schema, request.table
            );
            return Ok(());
        }

        match outcome {
            Ok(table_data) => {
                debug!(
                    "fetched {} rows of {}.{} at offset {}",
                    table_data.rows.len(),
                    request.schema,
                    request.table,
                    request.offset
                );
                self.table_data = Some(table_data);
                self.is_crud_mode = true;
                self.status = EditorStatus::Ready;
                self.error = None;
                self.reset_edits();
                Ok(())
            }
            Err(source) => {
                warn!(
                    "fetching {}.{} failed: {source}",
                    request.schema, request.table
                );
                self.status = EditorStatus::Error;
                self.error = Some(source.to_string());
                Err(EditorError::Fetch(source))
            }
        }
    }

    /// `Ok(None)` when no table is open.
    pub fn begin_save(&mut self) -> Result<Option<SaveBatch>, EditorError> {
        let Some(target) = self.target.clone() else {
            return Ok(None);
        };
        let guard = self.acquire()?;
        self.error = None;
        Ok(Some(SaveBatch::from_ledger(
            target.schema,
            target.table,
            &self.ledger,
            guard,
        )))
    }

    /// Records a failed save. Staged edits stay for a retry or a discard.
    pub fn fail_save(&mut self, batch: SaveBatch, error: &SaveError) {
        warn!("saving {}.{} failed: {error}", batch.schema(), batch.table());
        self.error = Some(error.to_string());
        drop(batch);
    }

    /// Turns a fully applied save into the refetch that picks up server state.
    pub fn finish_save(&mut self, batch: SaveBatch) -> Option<PendingFetch> {
        self.refetch(batch.into_guard())
    }

    pub fn exit_crud_mode(&mut self) {
        debug!("leaving crud mode");
        self.is_crud_mode = false;
        self.table_data = None;
        self.target = None;
        self.status = EditorStatus::Idle;
        self.pagination.set_page(0);
        self.reset_edits();
    }

    /// Leaves CRUD mode without dropping anything yet; used when a free-form
    /// query starts and only its success discards the table.
    pub fn suspend_crud_mode(&mut self) {
        self.is_crud_mode = false;
    }

    pub fn set_editing_cell(&mut self, cell: Option<CellKey>) -> Result<(), EditorError> {
        if let Some(cell) = &cell {
            self.ensure_cell_editable(&cell.row_id, &cell.column)?;
        }
        self.ledger.set_editing_cell(cell);
        Ok(())
    }

    /// Stages a new value for a cell of the loaded page. The original value
    /// is taken from the fetched row.
    pub fn update_cell(
        &mut self,
        row_id: &RowId,
        column: &str,
        new_value: Value,
    ) -> Result<(), EditorError> {
        let original_value = self.ensure_cell_editable(row_id, column)?.clone();
        self.ledger
            .record_update(row_id.clone(), column, original_value, new_value);
        Ok(())
    }

    pub fn add_pending_insert(&mut self, insert: RowInsert) -> Result<(), EditorError> {
        let data = self.editable_table()?;
        for column in insert.values.keys() {
            ensure_column_writable(data.column(column), column)?;
        }
        self.ledger.record_insert(insert);
        Ok(())
    }

    /// Deleted rows cannot be selected; toggling one is a no-op.
    pub fn toggle_row_selection(&mut self, row_id: RowId) -> bool {
        if self.ledger.is_marked_for_delete(&row_id) {
            debug!("ignoring selection of deleted row {row_id}");
            return false;
        }
        self.selection.toggle(row_id)
    }

    pub fn select_all_rows(&mut self) {
        let Some(data) = &self.table_data else {
            return;
        };
        let ledger = &self.ledger;
        self.selection.select_all(
            data.rows
                .iter()
                .map(|row| row.id.clone())
                .filter(|row_id| !ledger.is_marked_for_delete(row_id)),
        );
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Returns how many rows were newly marked.
    pub fn mark_for_delete<I>(&mut self, row_ids: I) -> Result<usize, EditorError>
    where
        I: IntoIterator<Item = RowId>,
    {
        self.editable_table()?;
        let marked = self.ledger.record_deletes(row_ids);
        self.selection.clear();

        let editing_deleted_row = self
            .ledger
            .editing_cell()
            .is_some_and(|cell| self.ledger.is_marked_for_delete(&cell.row_id));
        if editing_deleted_row {
            self.ledger.set_editing_cell(None);
        }
        Ok(marked)
    }

    pub fn mark_selected_for_delete(&mut self) -> Result<usize, EditorError> {
        let selected = self.selection.sorted_ids();
        self.mark_for_delete(selected)
    }

    pub fn discard_changes(&mut self) {
        self.ledger.discard();
    }

    fn acquire(&self) -> Result<InFlightGuard, EditorError> {
        self.loading.try_acquire().ok_or_else(|| {
            warn!("refusing table operation while another is in flight");
            EditorError::OperationInFlight
        })
    }

    fn refetch(&mut self, guard: InFlightGuard) -> Option<PendingFetch> {
        let target = self.target.as_ref()?;
        let request = self.pagination.request(&target.schema, &target.table);
        self.error = None;
        self.status = EditorStatus::Loading;
        Some(PendingFetch {
            request,
            _guard: guard,
        })
    }

    fn ensure_can_navigate(&self) -> Result<(), EditorError> {
        if self.target.is_none() {
            return Err(EditorError::NotInCrudMode);
        }
        if self.navigation == NavigationPolicy::BlockWhenDirty && self.has_pending_changes() {
            warn!("refusing page change with unsaved edits");
            return Err(EditorError::UnsavedChanges);
        }
        Ok(())
    }

    fn editable_table(&self) -> Result<&TableData, EditorError> {
        if self.target.is_none() {
            return Err(EditorError::NotInCrudMode);
        }
        let data = self.table_data.as_ref().ok_or(EditorError::NoTableData)?;
        if data.is_read_only() {
            return Err(EditorError::ReadOnlyTable);
        }
        Ok(data)
    }

    fn ensure_cell_editable(&self, row_id: &RowId, column: &str) -> Result<&Value, EditorError> {
        let data = self.editable_table()?;
        ensure_column_writable(data.column(column), column)?;
        if self.ledger.is_marked_for_delete(row_id) {
            return Err(EditorError::RowPendingDeletion(row_id.clone()));
        }
        data.cell(row_id, column)
            .ok_or_else(|| EditorError::UnknownRow(row_id.clone()))
    }

    fn reset_edits(&mut self) {
        self.ledger.discard();
        self.selection.clear();
    }
}

fn ensure_offered_page_size(options: &[usize], page_size: usize) -> Result<(), PaginationError> {
    if options.is_empty() || options.contains(&page_size) {
        Ok(())
    } else {
        Err(PaginationError::UnsupportedPageSize(page_size))
    }
}

fn ensure_column_writable(
    info: Option<&TableColumnInfo>,
    column: &str,
) -> Result<(), EditorError> {
    match info {
        None => Err(EditorError::UnknownColumn(column.to_string())),
        Some(info) if info.is_auto_generated => Err(EditorError::ReadOnlyColumn(column.to_string())),
        Some(_) => Ok(()),
    }
}
