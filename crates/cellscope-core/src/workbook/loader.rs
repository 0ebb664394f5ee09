//! The workbook as seen by the resolution engine.

use std::thread::{self, ThreadId};

use tracing::{debug, trace};

use super::Workbook;
use cellscope_engine::engine::{
    CellRef, CellType, EnvironmentValues, LabelMapping, LabelName, LoadedCell, Loader, RangeRef,
    Reference, ResolveError, Result, Value, ValueName, detect_cycle, evaluate_formula,
};

impl Workbook {
    /// The reference a bare name stands for: a label's target, or the
    /// reference an environment value holds.
    pub(crate) fn lookup_name(&self, name: &str) -> Option<Reference> {
        if let Ok(label) = LabelName::new(name) {
            if let Some(target) = self.labels.get(&label) {
                return Some(target.value().clone());
            }
        }
        let name = ValueName::new(name).ok()?;
        match self.environment.get(&name)?.value() {
            Value::Reference(target) => Some(target.clone()),
            _ => None,
        }
    }

    /// A formula consisting of a single reference, e.g. `=Total` or `=B2:C3`.
    ///
    /// Names are labels when a label of that name exists, otherwise
    /// environment values when one exists, otherwise labels.
    fn bare_reference(&self, formula: &str) -> Option<Reference> {
        let reference = Reference::parse(formula).ok()?;
        let Reference::Label(label) = &reference else {
            return Some(reference);
        };
        if self.labels.contains_key(label) {
            return Some(reference);
        }
        match ValueName::new(label.as_str()) {
            Ok(name) if self.environment.contains_key(&name) => Some(Reference::NamedValue(name)),
            _ => Some(reference),
        }
    }

    fn evaluate_cell(&self, cell: &CellRef, formula: &str) -> Result<Option<Value>> {
        if let Some(cached) = self.value_cache.get(cell) {
            trace!(%cell, "cache hit");
            return Ok(cached.value().clone());
        }

        // Indirections are followed (and cycle-checked) by the resolver.
        if let Some(reference) = self.bare_reference(formula) {
            return Ok(Some(Value::Reference(reference)));
        }

        if let Some(path) = detect_cycle(cell, &self.grid, |name: &str| self.lookup_name(name)) {
            let with = path.last().unwrap_or(cell);
            let from = path.len().checked_sub(2).and_then(|i| path.get(i)).unwrap_or(cell);
            return Err(ResolveError::Cycle {
                from: from.to_string(),
                with: with.to_string(),
            });
        }

        // Function bodies are invisible to `detect_cycle`; catch re-entry here.
        let _entered = self.enter_cell(cell)?;
        debug!(%cell, formula, "evaluating cell");
        let value = evaluate_formula(&self.context(), formula)?;
        self.value_cache.insert(cell.clone(), value.clone());
        Ok(value)
    }

    /// Mark `cell` as being evaluated on this thread until the guard drops.
    fn enter_cell(&self, cell: &CellRef) -> Result<EnteredCell<'_>> {
        let thread = thread::current().id();
        let mut stack = self.evaluating.entry(thread).or_default();
        if stack.contains(cell) {
            let from = stack.last().unwrap_or(cell);
            return Err(ResolveError::Cycle {
                from: from.to_string(),
                with: cell.to_string(),
            });
        }
        stack.push(cell.clone());
        Ok(EnteredCell {
            workbook: self,
            thread,
        })
    }
}

struct EnteredCell<'a> {
    workbook: &'a Workbook,
    thread: ThreadId,
}

impl Drop for EnteredCell<'_> {
    fn drop(&mut self) {
        if let Some(mut stack) = self.workbook.evaluating.get_mut(&self.thread) {
            stack.pop();
        }
        self.workbook
            .evaluating
            .remove_if(&self.thread, |_, stack| stack.is_empty());
    }
}

impl Loader for Workbook {
    fn load_cell(&self, cell: &CellRef) -> Result<Option<LoadedCell>> {
        let Some(contents) = self.grid.get(cell).map(|entry| entry.contents.clone()) else {
            return Ok(None);
        };
        let value = match contents {
            CellType::Empty => None,
            CellType::Text(s) => Some(Value::Text(s)),
            CellType::Number(n) => Some(Value::Number(n)),
            CellType::Script(formula) => self.evaluate_cell(cell, &formula)?,
        };
        Ok(Some(LoadedCell::new(cell.clone(), value)))
    }

    fn load_cell_range(&self, range: &RangeRef) -> Result<Vec<LoadedCell>> {
        let present: Vec<CellRef> = self
            .grid
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|cell| range.contains(cell))
            .collect();
        trace!(%range, present = present.len(), "loading range");

        let mut loaded = Vec::with_capacity(present.len());
        for cell in present {
            if let Some(cell) = self.load_cell(&cell)? {
                loaded.push(cell);
            }
        }
        Ok(loaded)
    }

    fn load_label(&self, label: &LabelName) -> Result<Option<LabelMapping>> {
        Ok(self
            .labels
            .get(label)
            .map(|target| LabelMapping::new(label.clone(), target.value().clone())))
    }
}

impl EnvironmentValues for Workbook {
    fn environment_value(&self, name: &ValueName) -> Option<Value> {
        self.environment.get(name).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell(text: &str) -> CellRef {
        CellRef::from_str(text).unwrap()
    }

    #[test]
    fn test_formula_cells_are_cached() {
        let workbook = Workbook::new();
        workbook.set_cell(cell("A1"), "=1 + 2").unwrap();

        let loaded = workbook.load_cell(&cell("A1")).unwrap().unwrap();
        assert_eq!(loaded.value, Some(Value::Number(3.0)));
        assert!(workbook.value_cache.contains_key(&cell("A1")));
    }

    #[test]
    fn test_bare_references_are_loaded_as_references() {
        let workbook = Workbook::new();
        workbook.set_cell(cell("A1"), "=B2:C3").unwrap();
        workbook.set_cell(cell("A2"), "=Total").unwrap();

        assert_eq!(
            workbook.load_cell(&cell("A1")).unwrap().unwrap().value,
            Some(Value::Reference(Reference::parse("B2:C3").unwrap()))
        );
        assert_eq!(
            workbook.load_cell(&cell("A2")).unwrap().unwrap().value,
            Some(Value::Reference(Reference::parse("Total").unwrap()))
        );
    }

    #[test]
    fn test_bare_name_prefers_environment_when_no_label() {
        let workbook = Workbook::new();
        workbook.set_environment_value("rate", Value::Number(0.5)).unwrap();
        workbook.set_cell(cell("A1"), "=rate").unwrap();

        assert_eq!(
            workbook.load_cell(&cell("A1")).unwrap().unwrap().value,
            Some(Value::Reference(Reference::named_value("rate").unwrap()))
        );
    }

    #[test]
    fn test_cell_cycle_is_an_error() {
        let workbook = Workbook::new();
        workbook.set_cell(cell("A1"), "=B1 + 1").unwrap();
        workbook.set_cell(cell("B1"), "=A1 + 1").unwrap();

        let err = workbook.load_cell(&cell("A1")).unwrap_err();
        assert_eq!(err.to_string(), "Cycle detected from B1 with A1");
    }

    #[test]
    fn test_range_load_skips_absent_cells() {
        let workbook = Workbook::new();
        workbook.set_cell(cell("B2"), "\"B2Value\"").unwrap();
        workbook.set_cell(cell("C3"), "123").unwrap();
        workbook.set_cell(cell("Z9"), "1").unwrap();

        let mut loaded = workbook
            .load_cell_range(&RangeRef::from_str("B2:C3").unwrap())
            .unwrap();
        loaded.sort_by(|a, b| a.reference.cmp(&b.reference));
        assert_eq!(
            loaded,
            vec![
                LoadedCell::new(cell("B2"), Some(Value::text("B2Value"))),
                LoadedCell::new(cell("C3"), Some(Value::Number(123.0))),
            ]
        );
    }

    #[test]
    fn test_cell_reentered_through_function_is_a_cycle() {
        let workbook = Workbook::new();
        workbook.define_function("F(x) = A1 + x").unwrap();
        workbook.set_cell(cell("A1"), "=F(1)").unwrap();

        let err = workbook.load_cell(&cell("A1")).unwrap_err();
        assert_eq!(err.to_string(), "Cycle detected from A1 with A1");
        assert!(workbook.evaluating.is_empty());
    }

    #[test]
    fn test_cells_reached_twice_in_sequence_are_not_a_cycle() {
        let workbook = Workbook::new();
        workbook.define_function("TWICE(x) = x + x").unwrap();
        workbook.set_cell(cell("A1"), "2").unwrap();
        workbook.set_cell(cell("B1"), "=A1 * 3").unwrap();
        workbook.set_cell(cell("C1"), "=TWICE(B1) + B1").unwrap();

        let loaded = workbook.load_cell(&cell("C1")).unwrap().unwrap();
        assert_eq!(loaded.value, Some(Value::Number(18.0)));
        assert!(workbook.evaluating.is_empty());
    }
}
