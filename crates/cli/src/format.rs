// crates/cli/src/format.rs
//! Plain-text rendering of client state for the terminal.

use serde_json::Value;
use text2sql_types::{
    CatalogSnapshot, ExecutionResult, HistoryEntry, SchemaView, SourceOrigin, UploadOutcome,
};

/// Cells wider than this are cut with an ellipsis.
const MAX_COLUMN_WIDTH: usize = 40;

fn truncate(value: &str, max_width: usize) -> String {
    if value.chars().count() <= max_width {
        return value.to_string();
    }
    let kept: String = value.chars().take(max_width.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Display form of a result cell. `null` prints as `NULL`, strings unquoted.
pub fn cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// ASCII grid with a header rule.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|c| truncate(c, MAX_COLUMN_WIDTH)).collect())
        .collect();
    for row in &rows {
        for (i, value) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(value.chars().count());
        }
    }

    let border = {
        let mut line = String::from("+");
        for w in &widths {
            line.push_str(&"-".repeat(w + 2));
            line.push('+');
        }
        line
    };
    let mut out = Vec::with_capacity(rows.len() + 4);
    out.push(border.clone());
    out.push(render_row(&widths, headers.iter().copied()));
    out.push(border.clone());
    for row in &rows {
        out.push(render_row(&widths, row.iter().map(String::as_str)));
    }
    out.push(border);
    out.join("\n")
}

fn render_row<'a>(widths: &[usize], mut cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = String::from("|");
    for w in widths {
        let value = cells.next().unwrap_or("");
        let pad = w.saturating_sub(value.chars().count());
        line.push(' ');
        line.push_str(value);
        line.push_str(&" ".repeat(pad + 1));
        line.push('|');
    }
    line
}

fn rows_label(count: u64) -> String {
    if count == 1 {
        "1 row".to_string()
    } else {
        format!("{count} rows")
    }
}

/// Result grid plus the backend-reported row count.
pub fn execution_result(result: &ExecutionResult) -> String {
    let headers: Vec<&str> = result.columns.iter().map(String::as_str).collect();
    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(cell).collect())
        .collect();
    let footer = format!("({})", rows_label(result.row_count));
    if headers.is_empty() {
        return footer;
    }
    format!("{}\n{footer}", table(&headers, &rows))
}

pub fn generated(sql: &str, explanation: Option<&str>) -> String {
    let mut out = String::new();
    for line in sql.lines() {
        out.push_str("    ");
        out.push_str(line);
        out.push('\n');
    }
    if let Some(explanation) = explanation.filter(|e| !e.trim().is_empty()) {
        out.push('\n');
        out.push_str("  ");
        out.push_str(explanation.trim());
        out.push('\n');
    }
    out
}

pub fn sources(catalog: &CatalogSnapshot) -> String {
    let rows: Vec<Vec<String>> = catalog
        .sources
        .iter()
        .map(|source| {
            vec![
                if source.active { "*".into() } else { String::new() },
                source.name.clone(),
                source.display_name.clone(),
                match source.origin {
                    SourceOrigin::BuiltIn => "built-in".into(),
                    SourceOrigin::Uploaded => "uploaded".into(),
                },
                source.row_count.map(|n| n.to_string()).unwrap_or_default(),
                source.column_count.map(|n| n.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    format!(
        "{}\nActive: {}",
        table(&["", "name", "display name", "type", "rows", "columns"], &rows),
        catalog.active_label
    )
}

/// Tree of tables; expanded tables list their columns.
pub fn schema(view: &SchemaView) -> String {
    let Some(schema) = view.schema.as_ref() else {
        return if view.loading {
            "Loading schema...".to_string()
        } else {
            "Schema unavailable".to_string()
        };
    };
    if schema.is_empty() {
        return "No tables".to_string();
    }

    let mut out = Vec::new();
    for (table, columns) in &schema.tables {
        let expanded = view.is_expanded(table);
        let marker = if expanded { "v" } else { ">" };
        let count = view
            .row_count_for(table)
            .map(|n| format!(" ({})", rows_label(n)))
            .unwrap_or_default();
        out.push(format!("{marker} {table}{count}"));
        if !expanded {
            continue;
        }
        let width = columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
        for column in columns {
            let key = if column.is_primary_key { "  PK" } else { "" };
            out.push(format!(
                "    {:<width$}  {}{key}",
                column.name, column.data_type
            ));
        }
    }
    out.join("\n")
}

/// History, numbered from 1 for `:load`.
pub fn history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No history yet".to_string();
    }
    let rows: Vec<Vec<String>> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            vec![
                (i + 1).to_string(),
                entry.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                entry.question.clone(),
                entry.sql.clone().unwrap_or_default(),
            ]
        })
        .collect();
    table(&["#", "when", "question", "sql"], &rows)
}

pub fn upload(outcome: &UploadOutcome) -> String {
    let headline = format!(
        "Uploaded {} as `{}`: {}, {} columns",
        outcome.display_name,
        outcome.table_name,
        rows_label(outcome.row_count),
        outcome.column_count
    );
    if outcome.preview.is_empty() {
        return headline;
    }
    let headers: Vec<&str> = outcome.schema.keys().map(String::as_str).collect();
    let rows: Vec<Vec<String>> = outcome
        .preview
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(*h).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();
    format!("{headline}\n{}", table(&headers, &rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use text2sql_types::{ColumnDescriptor, DataSource, SchemaDescription};

    #[test]
    fn test_table_pads_to_widest_cell() {
        let out = table(&["id", "name"], &[vec!["1".into(), "Laptop".into()]]);
        assert_eq!(
            out,
            "+----+--------+\n\
             | id | name   |\n\
             +----+--------+\n\
             | 1  | Laptop |\n\
             +----+--------+"
        );
    }

    #[test]
    fn test_long_cells_are_truncated() {
        let long = "x".repeat(100);
        let out = table(&["v"], &[vec![long]]);
        assert!(out.contains(&format!("{}...", "x".repeat(MAX_COLUMN_WIDTH - 3))));
        assert!(!out.contains(&"x".repeat(MAX_COLUMN_WIDTH)));
    }

    #[test]
    fn test_result_uses_reported_row_count() {
        let result = ExecutionResult {
            columns: vec!["id".into(), "note".into()],
            rows: vec![vec![json!(1), Value::Null]],
            row_count: 1000,
        };
        let out = execution_result(&result);
        assert!(out.contains("| 1  | NULL |"));
        assert!(out.ends_with("(1000 rows)"));
    }

    #[test]
    fn test_schema_lists_columns_of_expanded_tables_only() {
        let mut tables = IndexMap::new();
        tables.insert(
            "products".to_string(),
            vec![ColumnDescriptor {
                name: "id".into(),
                data_type: "INTEGER".into(),
                is_primary_key: true,
            }],
        );
        tables.insert("orders".to_string(), vec![]);
        let mut view = SchemaView {
            schema: Some(SchemaDescription { tables }),
            ..SchemaView::default()
        };
        view.expanded.insert("products".into());
        view.sample_counts.insert("products".into(), 50);

        assert_eq!(
            schema(&view),
            "v products (50 rows)\n    id  INTEGER  PK\n> orders"
        );
    }

    #[test]
    fn test_sources_marks_active() {
        let mut uploaded = DataSource::built_in();
        uploaded.name = "sales_data".into();
        uploaded.display_name = "Sales Data".into();
        uploaded.origin = SourceOrigin::Uploaded;
        uploaded.active = true;
        uploaded.row_count = Some(120);
        let catalog = CatalogSnapshot {
            sources: vec![DataSource::built_in(), uploaded],
            active: "sales_data".into(),
            active_label: "Sales Data".into(),
        };
        let out = sources(&catalog);
        assert!(out.contains("| * | sales_data |"));
        assert!(out.ends_with("Active: Sales Data"));
    }

    #[test]
    fn test_history_numbers_from_one() {
        let entries = vec![HistoryEntry {
            id: "a1".into(),
            question: "Count products".into(),
            sql: None,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
        }];
        let out = history(&entries);
        assert!(out.contains("| 1 | 2026-03-01 08:00 | Count products |"));
    }
}
