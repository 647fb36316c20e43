//! Turns text typed into the grid or the insert form into cell values.
//!
//! Parsing is lenient on purpose: input that does not fit the column type is
//! kept as the raw string and left for the server to reject.

use std::collections::HashMap;

use serde_json::{Number, Value};

use crate::table_data::{RowInsert, TableColumnInfo};

const DISPLAY_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Integer,
    Float,
    Date,
    Time,
    Timestamp,
    Text,
    Other,
}

impl ColumnKind {
    #[must_use]
    pub fn from_data_type(data_type: &str) -> Self {
        let lower = data_type.trim().to_ascii_lowercase();
        match lower.as_str() {
            "boolean" | "bool" => Self::Boolean,
            "numeric" | "decimal" | "real" => Self::Float,
            "date" => Self::Date,
            "time" => Self::Time,
            "text" => Self::Text,
            _ if lower.contains("timestamp") || lower.contains("datetime") => Self::Timestamp,
            _ if lower.contains("int") => Self::Integer,
            _ if lower.contains("float") || lower.contains("double") => Self::Float,
            _ => Self::Other,
        }
    }
}

/// Parses inline-editor input for `column`.
///
/// `null` in any case becomes SQL NULL; wrap it in single quotes to store the
/// literal text instead.
#[must_use]
pub fn parse_cell_input(input: &str, column: &TableColumnInfo) -> Value {
    if input.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if input.len() > 2 && input.starts_with('\'') && input.ends_with('\'') {
        return Value::String(input[1..input.len() - 1].to_string());
    }
    if input.is_empty() {
        return Value::String(String::new());
    }
    parse_typed(input, ColumnKind::from_data_type(&column.data_type))
}

/// Builds a staged insert from form input keyed by column name.
///
/// Auto-generated columns are skipped. Empty input leaves the column out when
/// it has a server default, and becomes NULL when it is nullable.
#[must_use]
pub fn parse_insert_form(columns: &[TableColumnInfo], inputs: &HashMap<String, String>) -> RowInsert {
    let mut values = HashMap::new();

    for column in columns.iter().filter(|column| !column.is_auto_generated) {
        let input = inputs.get(&column.name).map_or("", String::as_str);

        if input.eq_ignore_ascii_case("null") {
            values.insert(column.name.clone(), Value::Null);
            continue;
        }

        if input.is_empty() {
            if column.default_value.is_some() {
                continue;
            }
            if column.is_nullable {
                values.insert(column.name.clone(), Value::Null);
                continue;
            }
        }

        values.insert(
            column.name.clone(),
            parse_typed(input, ColumnKind::from_data_type(&column.data_type)),
        );
    }

    RowInsert::new(values)
}

fn parse_typed(input: &str, kind: ColumnKind) -> Value {
    match kind {
        ColumnKind::Boolean => Value::Bool(input == "true"),
        ColumnKind::Integer => input
            .parse::<i64>()
            .map_or_else(|_| Value::String(input.to_string()), Value::from),
        ColumnKind::Float => input
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or_else(|| Value::String(input.to_string()), Value::Number),
        ColumnKind::Date
        | ColumnKind::Time
        | ColumnKind::Timestamp
        | ColumnKind::Text
        | ColumnKind::Other => Value::String(input.to_string()),
    }
}

/// Text placed in the inline editor when editing starts.
#[must_use]
pub fn format_for_edit(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Text shown in a grid cell, cut to 200 characters.
#[must_use]
pub fn format_for_display(value: &Value) -> String {
    let text = format_for_edit(value);
    if text.chars().count() <= DISPLAY_LIMIT {
        return text;
    }
    let mut truncated = text.chars().take(DISPLAY_LIMIT).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::{json, Value};

    use super::{
        format_for_display, format_for_edit, parse_cell_input, parse_insert_form, ColumnKind,
    };
    use crate::table_data::TableColumnInfo;

    fn column(name: &str, data_type: &str) -> TableColumnInfo {
        TableColumnInfo::new(name, data_type)
    }

    #[test]
    fn column_kinds_follow_data_type_names() {
        let cases = [
            ("boolean", ColumnKind::Boolean),
            ("BIGINT", ColumnKind::Integer),
            ("smallint", ColumnKind::Integer),
            ("double precision", ColumnKind::Float),
            ("numeric", ColumnKind::Float),
            ("date", ColumnKind::Date),
            ("time", ColumnKind::Time),
            ("timestamp with time zone", ColumnKind::Timestamp),
            ("datetime", ColumnKind::Timestamp),
            ("text", ColumnKind::Text),
            ("character varying", ColumnKind::Other),
            ("interval", ColumnKind::Integer),
        ];
        for (data_type, expected) in cases {
            assert_eq!(ColumnKind::from_data_type(data_type), expected, "{data_type}");
        }
    }

    #[test]
    fn cell_input_special_forms() {
        let name = column("name", "text");
        assert_eq!(parse_cell_input("NULL", &name), Value::Null);
        assert_eq!(parse_cell_input("'NULL'", &name), json!("NULL"));
        assert_eq!(parse_cell_input("''", &name), json!("''"));
        assert_eq!(parse_cell_input("", &name), json!(""));
    }

    #[test]
    fn cell_input_is_typed_by_column_and_falls_back_to_raw_text() {
        let age = column("age", "integer");
        assert_eq!(parse_cell_input("42", &age), json!(42));
        assert_eq!(parse_cell_input("forty", &age), json!("forty"));
        assert_eq!(
            parse_cell_input("99999999999999999999", &age),
            json!("99999999999999999999")
        );

        let price = column("price", "decimal");
        assert_eq!(parse_cell_input("9.5", &price), json!(9.5));
        assert_eq!(parse_cell_input("NaN", &price), json!("NaN"));

        let active = column("active", "boolean");
        assert_eq!(parse_cell_input("true", &active), json!(true));
        assert_eq!(parse_cell_input("yes", &active), json!(false));

        let born = column("born", "date");
        assert_eq!(parse_cell_input("1990-01-01", &born), json!("1990-01-01"));
    }

    #[test]
    fn insert_form_respects_defaults_nullability_and_generated_columns() {
        let mut id = column("id", "serial");
        id.is_auto_generated = true;
        let mut created = column("created_at", "timestamp");
        created.default_value = Some("now()".to_string());
        let mut name = column("name", "text");
        name.is_nullable = false;
        let nickname = column("nickname", "text");
        let age = column("age", "integer");

        let inputs = HashMap::from([
            ("id".to_string(), "7".to_string()),
            ("name".to_string(), String::new()),
            ("age".to_string(), "41".to_string()),
        ]);
        let insert = parse_insert_form(&[id, created, name, nickname, age], &inputs);

        assert!(!insert.values.contains_key("id"));
        assert!(!insert.values.contains_key("created_at"));
        assert_eq!(insert.values.get("name"), Some(&json!("")));
        assert_eq!(insert.values.get("nickname"), Some(&Value::Null));
        assert_eq!(insert.values.get("age"), Some(&json!(41)));
    }

    #[test]
    fn formatting_for_edit_and_display() {
        assert_eq!(format_for_edit(&Value::Null), "");
        assert_eq!(format_for_edit(&json!(true)), "true");
        assert_eq!(format_for_edit(&json!(12.5)), "12.5");
        assert_eq!(format_for_edit(&json!("plain")), "plain");

        let long = "x".repeat(250);
        let shown = format_for_display(&json!(long));
        assert_eq!(shown.len(), 203);
        assert!(shown.ends_with("..."));
    }
}
