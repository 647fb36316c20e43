pub mod backend;
pub mod coercion;
pub mod commit;
pub mod editor_state;
pub mod ledger;
pub mod pagination;
pub mod query_console;
pub mod query_history;
pub mod selection;
pub mod settings;
pub mod table_data;
pub mod table_editor;
pub mod workspace;
