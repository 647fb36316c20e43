use log::debug;
use thiserror::Error;

use crate::backend::{QueryBackend, TableBackend};
use crate::editor_state::EditorError;
use crate::query_console::{QueryConsole, QueryConsoleError, QueryOutcome};
use crate::query_history::QueryHistory;
use crate::settings::EditorSettings;
use crate::table_editor::TableEditor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceMode {
    Empty,
    Query,
    Crud,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkspaceError {
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error(transparent)]
    Query(#[from] QueryConsoleError),
}

/// One connection's worth of UI state. The table editor and the query
/// console share a backend and never show results at the same time.
#[derive(Debug)]
pub struct Workspace<B>
where
    B: TableBackend + QueryBackend,
{
    editor: TableEditor<B>,
    console: QueryConsole,
}

impl<B> Workspace<B>
where
    B: TableBackend + QueryBackend,
{
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            editor: TableEditor::new(backend),
            console: QueryConsole::default(),
        }
    }

    /// Builds from settings, seeding the console with previously saved
    /// history trimmed to the configured capacity.
    pub fn from_settings(
        backend: B,
        settings: &EditorSettings,
        history: QueryHistory,
    ) -> Result<Self, WorkspaceError> {
        let items = history.iter().cloned().collect();
        Ok(Self {
            editor: TableEditor::from_settings(backend, settings)?,
            console: QueryConsole::new(QueryHistory::from_items(settings.history_capacity, items)),
        })
    }

    #[must_use]
    pub fn editor(&self) -> &TableEditor<B> {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut TableEditor<B> {
        &mut self.editor
    }

    #[must_use]
    pub fn console(&self) -> &QueryConsole {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut QueryConsole {
        &mut self.console
    }

    #[must_use]
    pub fn mode(&self) -> WorkspaceMode {
        if self.editor.state().is_crud_mode() {
            WorkspaceMode::Crud
        } else if self.console.result().is_some() {
            WorkspaceMode::Query
        } else {
            WorkspaceMode::Empty
        }
    }

    pub async fn open_table(&mut self, schema: &str, table: &str) -> Result<(), WorkspaceError> {
        self.console.clear_result();
        self.editor.load_table_data(schema, table).await?;
        Ok(())
    }

    /// Runs the console's query. The table view is hidden for the duration
    /// and only torn down once the query succeeds.
    pub async fn run_query(&mut self) -> Result<QueryOutcome, WorkspaceError> {
        if self.console.query().trim().is_empty() {
            return Ok(QueryOutcome::Skipped);
        }

        self.editor.state_mut().suspend_crud_mode();
        let outcome = self.console.execute(self.editor.backend()).await?;
        if matches!(outcome, QueryOutcome::Completed { .. }) {
            debug!("query succeeded, dropping table view");
            self.editor.exit_crud_mode();
        }
        Ok(outcome)
    }
}
