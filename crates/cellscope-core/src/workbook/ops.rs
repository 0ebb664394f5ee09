use std::sync::Arc;

use tracing::debug;

use super::Workbook;
use crate::error::{CoreError, Result};
use cellscope_engine::engine::{
    BUILTINS, Cell, CellRef, CellType, ExpressionFunction, LabelName, LambdaFunction, Reference,
    Value, ValueName, format_value,
};

impl Workbook {
    /// Every edit can change any formula's value.
    fn invalidate(&self) {
        if !self.value_cache.is_empty() {
            debug!(cached = self.value_cache.len(), "clearing value cache");
            self.value_cache.clear();
        }
    }

    /// Set a cell from user input: `42`, `"text"`, `=formula` or bare text.
    /// Blank input clears the cell.
    pub fn set_cell(&self, cell: CellRef, input: &str) -> Result<()> {
        let parsed = Cell::from_input(input);
        if parsed.contents == CellType::Empty {
            self.clear_cell(&cell);
            return Ok(());
        }
        if let CellType::Script(formula) = &parsed.contents {
            if formula.trim().is_empty() {
                return Err(CoreError::Parse {
                    line: 1,
                    message: format!("empty formula for {}", cell),
                });
            }
        }
        self.set_cell_contents(cell, parsed);
        Ok(())
    }

    pub fn set_cell_contents(&self, cell_ref: CellRef, cell: Cell) {
        debug!(cell = %cell_ref, contents = %cell.to_input_string(), "set cell");
        self.grid.insert(cell_ref, cell);
        self.invalidate();
    }

    pub fn clear_cell(&self, cell: &CellRef) -> Option<Cell> {
        let removed = self.grid.remove(cell).map(|(_, cell)| cell);
        if removed.is_some() {
            debug!(%cell, "cleared cell");
            self.invalidate();
        }
        removed
    }

    pub fn cell(&self, cell: &CellRef) -> Option<Cell> {
        self.grid.get(cell).map(|entry| entry.value().clone())
    }

    /// Point a label at a cell, range or another label.
    pub fn set_label(&self, label: &str, target: &str) -> Result<()> {
        let label = LabelName::new(label)?;
        let target = Reference::parse(target)?;
        debug!(%label, %target, "set label");
        self.labels.insert(label, target);
        self.invalidate();
        Ok(())
    }

    pub fn remove_label(&self, label: &str) -> Option<Reference> {
        let label = LabelName::new(label).ok()?;
        let removed = self.labels.remove(&label).map(|(_, target)| target);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    /// Labels sorted case-insensitively by name.
    pub fn sorted_labels(&self) -> Vec<(LabelName, Reference)> {
        let mut labels: Vec<(LabelName, Reference)> = self
            .labels
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        labels.sort_by_key(|(label, _)| label.as_str().to_ascii_uppercase());
        labels
    }

    pub fn set_environment_value(&self, name: &str, value: Value) -> Result<()> {
        let name = ValueName::new(name)?;
        debug!(%name, %value, "set environment value");
        self.environment.insert(name, value);
        self.invalidate();
        Ok(())
    }

    pub fn remove_environment_value(&self, name: &str) -> Option<Value> {
        let name = ValueName::new(name).ok()?;
        let removed = self.environment.remove(&name).map(|(_, value)| value);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    /// Environment values sorted by name.
    pub fn sorted_environment(&self) -> Vec<(ValueName, Value)> {
        let mut values: Vec<(ValueName, Value)> = self
            .environment
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));
        values
    }

    /// Define (or redefine) a function: `DOUBLE(x) = x * 2`.
    /// Built-in functions cannot be replaced.
    pub fn define_function(&self, definition: &str) -> Result<()> {
        let function = LambdaFunction::parse(definition)?;
        let name = function.name().to_string();
        if BUILTINS.iter().any(|builtin| builtin.name == name) {
            return Err(CoreError::BuiltinFunction(name));
        }
        debug!(function = %name, "defined function");
        self.functions.register(Arc::new(function));
        self.invalidate();
        Ok(())
    }

    pub fn remove_function(&self, name: &str) -> bool {
        if BUILTINS.iter().any(|b| b.name.eq_ignore_ascii_case(name)) {
            return false;
        }
        let removed = self.functions.remove(name).is_some();
        if removed {
            self.invalidate();
        }
        removed
    }

    /// Evaluate a formula against the workbook.
    pub fn evaluate(&self, formula: &str) -> Result<Option<Value>> {
        Ok(self.context().evaluate(formula)?)
    }

    /// Resolve reference text: `B2`, `B2:C3`, a label or an environment value.
    pub fn resolve_text(&self, text: &str) -> Result<Option<Value>> {
        let reference = match Reference::parse(text)? {
            Reference::Label(label) if !self.labels.contains_key(&label) => {
                match ValueName::new(label.as_str()) {
                    Ok(name) if self.environment.contains_key(&name) => {
                        Reference::NamedValue(name)
                    }
                    _ => Reference::Label(label),
                }
            }
            reference => reference,
        };
        Ok(self.context().resolve_or_fail(&reference)?)
    }

    /// The resolved value of a cell; missing cells are an error.
    pub fn cell_value(&self, cell: &CellRef) -> Result<Option<Value>> {
        Ok(self
            .context()
            .resolve_or_fail(&Reference::Cell(cell.clone()))?)
    }

    /// The text shown for a cell: blank when absent, `#CYCLE!` or `#ERR!` on failure.
    pub fn cell_display(&self, cell: &CellRef) -> String {
        if !self.grid.contains_key(cell) {
            return String::new();
        }
        match self.cell_value(cell) {
            Ok(value) => format_value(&value),
            Err(CoreError::Resolve(err)) if err.is_cycle() => "#CYCLE!".to_string(),
            Err(_) => "#ERR!".to_string(),
        }
    }
}
