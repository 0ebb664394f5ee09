//! Parser for .grd file format

use crate::error::{CoreError, Result};
use crate::workbook::Workbook;
use cellscope_engine::engine::{Cell, CellRef, Reference, Value};
use std::fs;
use std::path::Path;

/// Parse a .grd file into a Workbook
pub fn parse_grd(path: &Path) -> Result<Workbook> {
    let content = fs::read_to_string(path)?;
    parse_grd_content(&content)
}

/// Parse .grd content from a string
pub fn parse_grd_content(content: &str) -> Result<Workbook> {
    let workbook = Workbook::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        let line_num = line_num + 1;

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let at_line = |err: CoreError| match err {
            CoreError::Parse { message, .. } => CoreError::Parse {
                line: line_num,
                message,
            },
            other => CoreError::Parse {
                line: line_num,
                message: other.to_string(),
            },
        };

        if let Some(definition) = line.strip_prefix("function ") {
            workbook.define_function(definition).map_err(at_line)?;
            continue;
        }

        let Some((key, value_str)) = line.split_once(':') else {
            return Err(CoreError::Parse {
                line: line_num,
                message: "Expected 'CELLREF: VALUE' format".to_string(),
            });
        };
        let key = key.trim();
        let value_str = value_str.trim();

        if let Some(label) = key.strip_prefix("label ") {
            workbook.set_label(label.trim(), value_str).map_err(at_line)?;
            continue;
        }

        if let Some(name) = key.strip_prefix("value ") {
            let value = parse_environment_value(value_str, line_num)?;
            workbook
                .set_environment_value(name.trim(), value)
                .map_err(at_line)?;
            continue;
        }

        let cell_ref = CellRef::from_str(key).ok_or_else(|| CoreError::Parse {
            line: line_num,
            message: format!("Invalid cell reference: {}", key),
        })?;

        let cell = parse_cell_value(value_str, line_num)?;
        workbook.set_cell_contents(cell_ref, cell);
    }

    Ok(workbook)
}

/// Parse a cell value string into a Cell
fn parse_cell_value(value: &str, line_num: usize) -> Result<Cell> {
    let value = value.trim();

    if value.is_empty() {
        return Ok(Cell::new_empty());
    }

    // Formula: starts with '='
    if let Some(formula) = value.strip_prefix('=') {
        return Ok(Cell::new_script(formula));
    }

    if let Some(text) = quoted(value) {
        return Ok(Cell::new_text(&unescape_grd_text(text)));
    }

    if let Ok(n) = value.parse::<f64>() {
        return Ok(Cell::new_number(n));
    }

    Err(CoreError::Parse {
        line: line_num,
        message: format!("Invalid value: {}. Use quotes for text.", value),
    })
}

/// Environment values: numbers, quoted text, TRUE/FALSE or `=reference`.
fn parse_environment_value(value: &str, line_num: usize) -> Result<Value> {
    if let Some(target) = value.strip_prefix('=') {
        let reference = Reference::parse(target).map_err(|e| CoreError::Parse {
            line: line_num,
            message: e.to_string(),
        })?;
        return Ok(Value::Reference(reference));
    }
    if let Some(text) = quoted(value) {
        return Ok(Value::Text(unescape_grd_text(text)));
    }
    if value.eq_ignore_ascii_case("true") {
        return Ok(Value::Boolean(true));
    }
    if value.eq_ignore_ascii_case("false") {
        return Ok(Value::Boolean(false));
    }
    value
        .parse::<f64>()
        .map(Value::Number)
        .map_err(|_| CoreError::Parse {
            line: line_num,
            message: format!("Invalid value: {}. Use quotes for text.", value),
        })
}

fn quoted(value: &str) -> Option<&str> {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        Some(&value[1..value.len() - 1])
    } else {
        None
    }
}

fn unescape_grd_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellscope_engine::engine::{CellType, LabelName, ValueName};
    use pretty_assertions::assert_eq;

    fn contents(workbook: &Workbook, cell: &str) -> CellType {
        workbook
            .cell(&CellRef::from_str(cell).unwrap())
            .unwrap()
            .contents
    }

    #[test]
    fn test_parse_cells() {
        let workbook = parse_grd_content(
            r#"
# Test workbook
A1: 42
A2: "He said \"hi\""
A3: =SUM(B2:C3)
"#,
        )
        .unwrap();
        assert_eq!(contents(&workbook, "A1"), CellType::Number(42.0));
        assert_eq!(
            contents(&workbook, "A2"),
            CellType::Text("He said \"hi\"".to_string())
        );
        assert_eq!(
            contents(&workbook, "A3"),
            CellType::Script("SUM(B2:C3)".to_string())
        );
    }

    #[test]
    fn test_parse_labels_values_and_functions() {
        let workbook = parse_grd_content(
            r#"
label Total: B2:C3
value rate: 0.25
value greeting: "hello"
value Hello: =Label123
function DOUBLE(x) = x * 2
"#,
        )
        .unwrap();

        assert_eq!(
            workbook
                .labels()
                .get(&LabelName::new("total").unwrap())
                .map(|t| t.value().clone()),
            Some(Reference::parse("B2:C3").unwrap())
        );
        let env = |name: &str| {
            workbook
                .environment()
                .get(&ValueName::new(name).unwrap())
                .map(|v| v.value().clone())
        };
        assert_eq!(env("rate"), Some(Value::Number(0.25)));
        assert_eq!(env("greeting"), Some(Value::text("hello")));
        assert_eq!(
            env("Hello"),
            Some(Value::Reference(Reference::parse("Label123").unwrap()))
        );
        assert!(workbook.functions().contains("double"));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse_grd_content("A1: 1\nA2: hello").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error at line 2: Invalid value: hello. Use quotes for text."
        );

        let err = parse_grd_content("\n\nlabel 1bad: A1").unwrap_err();
        assert!(matches!(err, CoreError::Parse { line: 3, .. }));

        let err = parse_grd_content("function nope").unwrap_err();
        assert!(matches!(err, CoreError::Parse { line: 1, .. }));

        let err = parse_grd_content("ZZZZ1: 1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error at line 1: Invalid cell reference: ZZZZ1"
        );
    }
}
