//! Cell data structures for the backing store.
//!
//! - [`CellType`] - The type of content in a cell (empty, text, number, or formula)
//! - [`Cell`] - A cell with content and the references its formula mentions
//! - [`Grid`], [`Labels`], [`Environment`] - Thread-safe sparse stores (backed by `DashMap`)

use dashmap::DashMap;
use std::sync::Arc;

use super::cell_ref::CellRef;
use super::deps::extract_dependencies;
use super::reference::{LabelName, Reference, ValueName};
use super::value::Value;

/// The type of content stored in a cell.
#[derive(Clone, Debug, PartialEq)]
pub enum CellType {
    Empty,
    Text(String),
    Number(f64),
    Script(String),
}

/// A cell in the grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub contents: CellType,
    pub depends_on: Vec<Reference>,
}

impl Cell {
    pub fn new_empty() -> Cell {
        Cell {
            contents: CellType::Empty,
            depends_on: vec![],
        }
    }

    pub fn new_text(text: &str) -> Cell {
        Cell {
            contents: CellType::Text(text.to_string()),
            depends_on: vec![],
        }
    }

    pub fn new_number(n: f64) -> Cell {
        Cell {
            contents: CellType::Number(n),
            depends_on: vec![],
        }
    }

    /// Create a new cell containing a formula.
    /// Dependencies are automatically extracted from the formula.
    pub fn new_script(script: &str) -> Cell {
        Cell {
            depends_on: extract_dependencies(script),
            contents: CellType::Script(script.to_string()),
        }
    }

    /// Parse user input and create appropriate cell type.
    /// - Empty string or whitespace -> Empty
    /// - Starts with '=' -> Script (without the '=')
    /// - Quoted string -> Text (without quotes)
    /// - Valid number -> Number
    /// - Otherwise -> Text
    pub fn from_input(input: &str) -> Cell {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Cell::new_empty();
        }

        if let Some(formula) = trimmed.strip_prefix('=') {
            return Cell::new_script(formula);
        }

        if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
            let text = &trimmed[1..trimmed.len() - 1];
            return Cell::new_text(text);
        }

        if let Ok(n) = trimmed.parse::<f64>() {
            return Cell::new_number(n);
        }

        Cell::new_text(trimmed)
    }

    /// Get a display string for the cell content (for editing).
    pub fn to_input_string(&self) -> String {
        match &self.contents {
            CellType::Empty => String::new(),
            CellType::Text(s) => s.clone(),
            CellType::Number(n) => n.to_string(),
            CellType::Script(s) => format!("={}", s),
        }
    }
}

/// Thread-safe sparse grid storage.
pub type Grid = Arc<DashMap<CellRef, Cell>>;

/// Label name to target reference.
pub type Labels = Arc<DashMap<LabelName, Reference>>;

/// Environment values by name.
pub type Environment = Arc<DashMap<ValueName, Value>>;

/// Evaluated formula results (`None` = evaluated to nothing).
pub type ValueCache = Arc<DashMap<CellRef, Option<Value>>>;

/// Formula cells each thread is in the middle of evaluating, outermost first.
pub type EvaluationStack = Arc<DashMap<std::thread::ThreadId, Vec<CellRef>>>;
