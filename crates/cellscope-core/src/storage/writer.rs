//! Writer for .grd file format

use crate::error::Result;
use crate::workbook::Workbook;
use cellscope_engine::engine::{CellType, Value};
use std::fs;
use std::path::Path;

/// Write a Workbook to a .grd file
pub fn write_grd(path: &Path, workbook: &Workbook) -> Result<()> {
    let content = write_grd_content(workbook);
    fs::write(path, content)?;
    Ok(())
}

/// Write a Workbook to a .grd format string
pub fn write_grd_content(workbook: &Workbook) -> String {
    let mut lines = vec!["# Cellscope Workbook".to_string()];

    // Collect and sort cells by position for consistent output
    let mut cells: Vec<_> = workbook
        .grid()
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().contents.clone()))
        .collect();
    cells.sort_by(|(a, _), (b, _)| a.row.cmp(&b.row).then(a.col.cmp(&b.col)));

    for (cell_ref, contents) in cells {
        let value_str = match contents {
            CellType::Empty => continue,
            CellType::Number(n) => n.to_string(),
            CellType::Text(s) => format!("\"{}\"", escape_grd_text(&s)),
            CellType::Script(s) => format!("={}", s),
        };
        lines.push(format!("{}: {}", cell_ref, value_str));
    }

    for (label, target) in workbook.sorted_labels() {
        lines.push(format!("label {}: {}", label, target));
    }

    for (name, value) in workbook.sorted_environment() {
        lines.push(format!("value {}: {}", name, environment_value_str(&value)));
    }

    for function in workbook.functions().user_defined() {
        if let Some(source) = function.source() {
            lines.push(format!("function {}", source));
        }
    }

    lines.join("\n") + "\n"
}

/// Dates, times and lists have no literal form and are stored as their text.
fn environment_value_str(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        Value::Boolean(b) => Value::Boolean(*b).to_string(),
        Value::Reference(target) => format!("={}", target),
        Value::Text(s) => format!("\"{}\"", escape_grd_text(s)),
        other => format!("\"{}\"", escape_grd_text(&other.to_string())),
    }
}

fn escape_grd_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out
}
