use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use gridline_adapters::{CommandBackend, CommandInvoker, InvokeError};
use gridline_core::backend::TableBackend;
use gridline_core::coercion::parse_cell_input;
use gridline_core::commit::SaveCounts;
use gridline_core::table_data::{RowId, RowInsert, TableDataRequest};
use gridline_core::workspace::{Workspace, WorkspaceMode};
use serde_json::{json, Value};

/// In-memory `users(id, name, age)` table answering the command protocol.
#[derive(Debug)]
struct UsersServer {
    rows: Mutex<BTreeMap<i64, (String, Value)>>,
    commands: Mutex<Vec<String>>,
}

impl UsersServer {
    fn seeded() -> Self {
        let rows = BTreeMap::from([
            (1, ("Alice".to_string(), json!(30))),
            (2, ("Bob".to_string(), json!(25))),
            (3, ("Carol".to_string(), json!(41))),
        ]);
        Self {
            rows: Mutex::new(rows),
            commands: Mutex::new(Vec::new()),
        }
    }

    fn names(&self) -> Vec<String> {
        self.rows
            .lock()
            .expect("rows lock")
            .values()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn page(&self, args: &Value) -> Value {
        let request = &args["request"];
        let limit = request["limit"].as_u64().unwrap_or(50) as usize;
        let offset = request["offset"].as_u64().unwrap_or(0) as usize;
        let rows = self.rows.lock().expect("rows lock");
        let page = rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(id, (name, age))| {
                json!({"id": format!("row-{id}"), "values": [id, name, age]})
            })
            .collect::<Vec<_>>();
        json!({
            "columns": [
                {"name": "id", "data_type": "integer", "is_nullable": false,
                 "is_primary_key": true, "is_auto_generated": true, "default_value": null},
                {"name": "name", "data_type": "text", "is_nullable": false,
                 "is_primary_key": false, "is_auto_generated": false, "default_value": null},
                {"name": "age", "data_type": "integer", "is_nullable": true,
                 "is_primary_key": false, "is_auto_generated": false, "default_value": null}
            ],
            "rows": page,
            "total_count": rows.len(),
            "primary_keys": ["id"],
            "has_primary_key": true
        })
    }
}

fn row_key(row_id: &Value) -> i64 {
    row_id
        .as_str()
        .and_then(|id| id.strip_prefix("row-"))
        .and_then(|id| id.parse().ok())
        .expect("row ids look like row-<n>")
}

#[async_trait]
impl CommandInvoker for UsersServer {
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, InvokeError> {
        self.commands
            .lock()
            .expect("commands lock")
            .push(command.to_string());
        match command {
            "get_table_data" => Ok(self.page(&args)),
            "update_rows" => {
                let mut rows = self.rows.lock().expect("rows lock");
                for update in args["updates"].as_array().expect("updates array") {
                    let row = rows
                        .get_mut(&row_key(&update["row_id"]))
                        .ok_or_else(|| InvokeError::Command("row vanished".to_string()))?;
                    match update["column"].as_str() {
                        Some("name") => {
                            row.0 = update["new_value"].as_str().unwrap_or_default().to_string();
                        }
                        Some("age") => row.1 = update["new_value"].clone(),
                        other => {
                            return Err(InvokeError::Command(format!(
                                "column {other:?} does not exist"
                            )))
                        }
                    }
                }
                Ok(Value::Null)
            }
            "insert_rows" => {
                let mut rows = self.rows.lock().expect("rows lock");
                for insert in args["rows"].as_array().expect("rows array") {
                    let Some(name) = insert["values"]["name"].as_str() else {
                        return Err(InvokeError::Command(
                            "null value in column \"name\" violates not-null constraint"
                                .to_string(),
                        ));
                    };
                    let next_id = rows.keys().next_back().copied().unwrap_or(0) + 1;
                    let age = insert["values"].get("age").cloned().unwrap_or(Value::Null);
                    rows.insert(next_id, (name.to_string(), age));
                }
                Ok(Value::Null)
            }
            "delete_rows" => {
                let mut rows = self.rows.lock().expect("rows lock");
                for delete in args["deletes"].as_array().expect("deletes array") {
                    rows.remove(&row_key(&delete["row_id"]));
                }
                Ok(Value::Null)
            }
            "execute_query" => Ok(json!({
                "columns": [{"name": "count", "data_type": "bigint"}],
                "rows": [[self.rows.lock().expect("rows lock").len()]],
                "row_count": 1,
                "execution_time_ms": 2
            })),
            other => Err(InvokeError::Transport(format!("unknown command {other}"))),
        }
    }
}

fn row(id: &str) -> RowId {
    RowId::from(id)
}

#[tokio::test]
async fn edit_insert_delete_and_save_through_commands() {
    let mut workspace = Workspace::new(CommandBackend::new(UsersServer::seeded()));
    workspace
        .open_table("public", "users")
        .await
        .expect("open should succeed");

    let state = workspace.editor_mut().state_mut();
    let age_column = state
        .table_data()
        .and_then(|data| data.column("age"))
        .cloned()
        .expect("age column");
    state
        .update_cell(&row("row-1"), "age", parse_cell_input("31", &age_column))
        .expect("edit should be staged");
    state
        .update_cell(&row("row-2"), "name", json!("Robert"))
        .expect("edit should be staged");
    state
        .add_pending_insert(RowInsert::new(
            [("name".to_string(), json!("Dave"))].into_iter().collect(),
        ))
        .expect("insert should be staged");
    state.toggle_row_selection(row("row-3"));
    state
        .mark_selected_for_delete()
        .expect("delete should be staged");

    let report = workspace
        .editor_mut()
        .save_changes()
        .await
        .expect("save should succeed")
        .expect("table is open");

    assert_eq!(
        report.counts,
        SaveCounts {
            updated: 2,
            inserted: 1,
            deleted: 1,
        }
    );
    assert!(report.refreshed);

    let server = workspace.editor().backend().invoker();
    assert_eq!(server.names(), vec!["Alice", "Robert", "Dave"]);
    assert_eq!(
        server.commands.lock().expect("commands lock").clone(),
        vec![
            "get_table_data",
            "update_rows",
            "insert_rows",
            "delete_rows",
            "get_table_data",
        ]
    );

    let state = workspace.editor().state();
    assert!(!state.has_pending_changes());
    assert_eq!(
        state.table_data().map(|data| data.total_count),
        Some(3)
    );
    assert_eq!(
        state.cell_value(&row("row-1"), "age"),
        Some(&json!(31))
    );
}

#[tokio::test]
async fn rejected_insert_keeps_everything_staged() {
    let mut workspace = Workspace::new(CommandBackend::new(UsersServer::seeded()));
    workspace
        .open_table("public", "users")
        .await
        .expect("open should succeed");
    workspace
        .editor_mut()
        .state_mut()
        .add_pending_insert(RowInsert::new(
            [("age".to_string(), json!(5))].into_iter().collect(),
        ))
        .expect("insert should be staged");

    let error = workspace
        .editor_mut()
        .save_changes()
        .await
        .expect_err("server rejects the insert");

    assert_eq!(
        error.to_string(),
        "failed to apply inserts: null value in column \"name\" violates not-null constraint"
    );
    assert_eq!(workspace.editor().state().ledger().summary().inserts, 1);
    assert_eq!(workspace.editor().backend().invoker().names().len(), 3);
}

#[tokio::test]
async fn paging_and_query_share_one_backend() {
    let mut workspace = Workspace::new(CommandBackend::new(UsersServer::seeded()));
    workspace
        .open_table("public", "users")
        .await
        .expect("open should succeed");
    workspace
        .editor_mut()
        .set_page_size(2)
        .await
        .expect("page size change should succeed");
    workspace
        .editor_mut()
        .set_page(1)
        .await
        .expect("page change should succeed");

    let rows = workspace
        .editor()
        .state()
        .table_data()
        .map(|data| data.rows.iter().map(|row| row.id.clone()).collect::<Vec<_>>())
        .expect("page loaded");
    assert_eq!(rows, vec![row("row-3")]);

    workspace.console_mut().set_query("SELECT count(*) FROM users");
    workspace.run_query().await.expect("query should run");
    assert_eq!(workspace.mode(), WorkspaceMode::Query);
    assert_eq!(
        workspace.console().result().map(|result| result.rows.clone()),
        Some(vec![vec![json!(3)]])
    );

    let direct = workspace
        .editor()
        .backend()
        .fetch_table_page(&TableDataRequest {
            schema: "public".to_string(),
            table: "users".to_string(),
            limit: 1,
            offset: 0,
        })
        .await
        .expect("direct fetch");
    assert_eq!(direct.rows.len(), 1);
}
