use log::info;

use crate::backend::TableBackend;
use crate::commit::SaveReport;
use crate::editor_state::{EditorError, EditorState, PendingFetch};
use crate::settings::EditorSettings;

/// Drives an [`EditorState`] against a remote [`TableBackend`].
///
/// Synchronous actions (cell edits, selection, staging deletes) go through
/// [`TableEditor::state_mut`]; anything that talks to the backend is an
/// async method here.
#[derive(Debug)]
pub struct TableEditor<B: TableBackend> {
    backend: B,
    state: EditorState,
}

impl<B: TableBackend> TableEditor<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_state(backend, EditorState::default())
    }

    pub fn from_settings(backend: B, settings: &EditorSettings) -> Result<Self, EditorError> {
        Ok(Self::with_state(backend, EditorState::from_settings(settings)?))
    }

    #[must_use]
    pub fn with_state(backend: B, state: EditorState) -> Self {
        Self { backend, state }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut EditorState {
        &mut self.state
    }

    /// Enters CRUD mode for `schema.table` on its first page.
    pub async fn load_table_data(&mut self, schema: &str, table: &str) -> Result<(), EditorError> {
        let fetch = self.state.begin_load(schema, table)?;
        self.run_fetch(fetch).await
    }

    pub async fn refresh_table_data(&mut self) -> Result<(), EditorError> {
        match self.state.begin_refresh()? {
            Some(fetch) => self.run_fetch(fetch).await,
            None => Ok(()),
        }
    }

    pub async fn set_page(&mut self, page: usize) -> Result<(), EditorError> {
        let fetch = self.state.begin_page_change(page)?;
        self.run_fetch(fetch).await
    }

    pub async fn set_page_size(&mut self, page_size: usize) -> Result<(), EditorError> {
        let fetch = self.state.begin_page_size_change(page_size)?;
        self.run_fetch(fetch).await
    }

    /// Flushes the ledger and refetches the page. Returns `Ok(None)` when no
    /// table is open. On failure the staged edits are kept.
    pub async fn save_changes(&mut self) -> Result<Option<SaveReport>, EditorError> {
        let Some(batch) = self.state.begin_save()? else {
            return Ok(None);
        };

        let counts = match batch.apply(&self.backend).await {
            Ok(counts) => counts,
            Err(error) => {
                self.state.fail_save(batch, &error);
                return Err(EditorError::Save(error));
            }
        };
        info!(
            "saved {}.{}: {} updated, {} inserted, {} deleted",
            batch.schema(),
            batch.table(),
            counts.updated,
            counts.inserted,
            counts.deleted
        );

        let refreshed = match self.state.finish_save(batch) {
            Some(fetch) => self.run_fetch(fetch).await.is_ok(),
            None => false,
        };

        Ok(Some(SaveReport { counts, refreshed }))
    }

    pub fn discard_changes(&mut self) {
        self.state.discard_changes();
    }

    pub fn exit_crud_mode(&mut self) {
        self.state.exit_crud_mode();
    }

    async fn run_fetch(&mut self, fetch: PendingFetch) -> Result<(), EditorError> {
        let outcome = self.backend.fetch_table_page(fetch.request()).await;
        self.state.finish_fetch(fetch, outcome)
    }
}
