//! Capabilities the resolution engine consumes: a loader for cells, ranges
//! and labels, and a store of environment values.

use std::collections::HashMap;
use std::sync::Arc;

use super::cell_ref::CellRef;
use super::error::Result;
use super::range::RangeRef;
use super::reference::{LabelName, Reference, ValueName};
use super::value::Value;

/// A cell as seen by resolution: its position and evaluated value.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedCell {
    pub reference: CellRef,
    /// The formula's evaluated value; `None` when it evaluated to nothing.
    pub value: Option<Value>,
}

impl LoadedCell {
    pub fn new(reference: CellRef, value: Option<Value>) -> LoadedCell {
        LoadedCell { reference, value }
    }
}

/// Where a label points.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelMapping {
    pub label: LabelName,
    pub target: Reference,
}

impl LabelMapping {
    pub fn new(label: LabelName, target: Reference) -> LabelMapping {
        LabelMapping { label, target }
    }
}

/// Read-only access to a backing cell and label store.
pub trait Loader: Send + Sync {
    fn load_cell(&self, cell: &CellRef) -> Result<Option<LoadedCell>>;

    /// The cells present inside `range`, in any order. Missing cells are
    /// simply absent from the result.
    fn load_cell_range(&self, range: &RangeRef) -> Result<Vec<LoadedCell>>;

    fn load_label(&self, label: &LabelName) -> Result<Option<LabelMapping>>;
}

/// Read-only access to environment values.
pub trait EnvironmentValues: Send + Sync {
    fn environment_value(&self, name: &ValueName) -> Option<Value>;
}

/// An environment with no values.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEnvironment;

impl EnvironmentValues for NoEnvironment {
    fn environment_value(&self, _name: &ValueName) -> Option<Value> {
        None
    }
}

impl EnvironmentValues for HashMap<ValueName, Value> {
    fn environment_value(&self, name: &ValueName) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<T: Loader + ?Sized> Loader for Arc<T> {
    fn load_cell(&self, cell: &CellRef) -> Result<Option<LoadedCell>> {
        (**self).load_cell(cell)
    }

    fn load_cell_range(&self, range: &RangeRef) -> Result<Vec<LoadedCell>> {
        (**self).load_cell_range(range)
    }

    fn load_label(&self, label: &LabelName) -> Result<Option<LabelMapping>> {
        (**self).load_label(label)
    }
}

/// A loader over plain maps, for embedding callers and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryLoader {
    cells: HashMap<CellRef, Option<Value>>,
    labels: HashMap<LabelName, Reference>,
}

impl MemoryLoader {
    pub fn new() -> MemoryLoader {
        MemoryLoader::default()
    }

    pub fn with_cell(mut self, cell: CellRef, value: Option<Value>) -> MemoryLoader {
        self.cells.insert(cell, value);
        self
    }

    pub fn with_label(mut self, label: LabelName, target: Reference) -> MemoryLoader {
        self.labels.insert(label, target);
        self
    }
}

impl Loader for MemoryLoader {
    fn load_cell(&self, cell: &CellRef) -> Result<Option<LoadedCell>> {
        Ok(self
            .cells
            .get(cell)
            .map(|value| LoadedCell::new(cell.clone(), value.clone())))
    }

    fn load_cell_range(&self, range: &RangeRef) -> Result<Vec<LoadedCell>> {
        Ok(self
            .cells
            .iter()
            .filter(|(cell, _)| range.contains(cell))
            .map(|(cell, value)| LoadedCell::new(cell.clone(), value.clone()))
            .collect())
    }

    fn load_label(&self, label: &LabelName) -> Result<Option<LabelMapping>> {
        Ok(self
            .labels
            .get(label)
            .map(|target| LabelMapping::new(label.clone(), target.clone())))
    }
}
