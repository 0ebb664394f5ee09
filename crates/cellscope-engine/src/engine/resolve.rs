//! Reference resolution through the scope chain, the loader and the environment.
//!
//! Resolution order for a reference:
//!
//! 1. Scope frames, innermost first. The first frame with an entry wins,
//!    even when that entry is null.
//! 2. The loader (cells, ranges, labels) or the environment (named values).
//!
//! Labels, reference-valued cells and reference-valued environment entries
//! are followed. Every top-level [`ResolutionEngine::resolve`] call tracks
//! the references it is in the middle of following so a loop fails with a
//! cycle error instead of recursing forever.
//!
//! A range is expanded cell by cell, so local cell bindings and
//! reference-valued cells inside it behave as they do when the cell is
//! resolved on its own. Ranges larger than the engine's cell limit fail
//! before anything is allocated.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use super::cell_ref::CellRef;
use super::error::{ResolveError, Result};
use super::loader::{EnvironmentValues, Loader, NoEnvironment};
use super::range::RangeRef;
use super::reference::Reference;
use super::scope::ScopeFrame;
use super::value::Value;

/// Outcome of resolving a reference.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolved {
    NotFound,
    /// Found; the value may be null.
    Found(Option<Value>),
}

impl Resolved {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolved::Found(_))
    }

    /// The double-optional view: outer = found, inner = non-null.
    pub fn into_option(self) -> Option<Option<Value>> {
        match self {
            Resolved::NotFound => None,
            Resolved::Found(value) => Some(value),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Resolved::Found(Some(value)) => Some(value),
            _ => None,
        }
    }
}

/// Default cap on the number of cells a range may expand to.
pub const MAX_RANGE_CELLS: usize = 1_000_000;

/// Walks references through a scope chain and then the backing stores.
#[derive(Clone)]
pub struct ResolutionEngine {
    scope: Arc<ScopeFrame>,
    loader: Arc<dyn Loader>,
    environment: Arc<dyn EnvironmentValues>,
    max_range_cells: usize,
}

impl ResolutionEngine {
    pub fn new(loader: Arc<dyn Loader>, environment: Arc<dyn EnvironmentValues>) -> Self {
        ResolutionEngine {
            scope: ScopeFrame::root(),
            loader,
            environment,
            max_range_cells: MAX_RANGE_CELLS,
        }
    }

    /// An engine with no environment values.
    pub fn with_loader(loader: Arc<dyn Loader>) -> Self {
        Self::new(loader, Arc::new(NoEnvironment))
    }

    /// The same stores seen through a different scope chain.
    pub fn with_scope(&self, scope: Arc<ScopeFrame>) -> Self {
        ResolutionEngine {
            scope,
            loader: Arc::clone(&self.loader),
            environment: Arc::clone(&self.environment),
            max_range_cells: self.max_range_cells,
        }
    }

    /// Cap the number of cells a range may expand to.
    pub fn with_max_range_cells(mut self, max: usize) -> Self {
        self.max_range_cells = max;
        self
    }

    /// An engine whose innermost frame holds `bindings`.
    pub fn enter_scope(
        &self,
        bindings: impl IntoIterator<Item = (Reference, Option<Value>)>,
    ) -> Self {
        self.with_scope(ScopeFrame::child(&self.scope, bindings))
    }

    pub fn scope(&self) -> &Arc<ScopeFrame> {
        &self.scope
    }

    pub fn loader(&self) -> &Arc<dyn Loader> {
        &self.loader
    }

    pub fn environment(&self) -> &Arc<dyn EnvironmentValues> {
        &self.environment
    }

    pub fn max_range_cells(&self) -> usize {
        self.max_range_cells
    }

    /// Resolve a reference; absence is reported as [`Resolved::NotFound`].
    pub fn resolve(&self, reference: &Reference) -> Result<Resolved> {
        let mut in_progress = Vec::new();
        self.resolve_inner(reference, &mut in_progress)
    }

    /// Resolve a reference, failing with a kind-specific message when absent.
    pub fn resolve_or_fail(&self, reference: &Reference) -> Result<Option<Value>> {
        match self.resolve(reference)? {
            Resolved::Found(value) => Ok(value),
            Resolved::NotFound => Err(reference.not_found()),
        }
    }

    fn resolve_inner(
        &self,
        reference: &Reference,
        in_progress: &mut Vec<Reference>,
    ) -> Result<Resolved> {
        if let Some(local) = self.scope.lookup(reference) {
            trace!(%reference, "resolved from scope");
            return Ok(Resolved::Found(local.clone()));
        }

        match reference {
            Reference::Cell(cell) => self.resolve_cell(reference, cell, in_progress),
            Reference::CellRange(range) => self.materialize_range(range, in_progress),
            Reference::Label(label) => match self.loader.load_label(label)? {
                Some(mapping) => {
                    trace!(%reference, target = %mapping.target, "following label");
                    self.follow(reference, &mapping.target, in_progress)
                }
                None => Ok(Resolved::NotFound),
            },
            Reference::NamedValue(name) => match self.environment.environment_value(name) {
                Some(Value::Reference(target)) => self.follow(reference, &target, in_progress),
                Some(value) => Ok(Resolved::Found(Some(value))),
                None => Ok(Resolved::NotFound),
            },
        }
    }

    fn resolve_cell(
        &self,
        reference: &Reference,
        cell: &CellRef,
        in_progress: &mut Vec<Reference>,
    ) -> Result<Resolved> {
        let Some(loaded) = self.loader.load_cell(cell)? else {
            return Ok(Resolved::NotFound);
        };
        match loaded.value {
            Some(Value::Reference(target)) => self.follow(reference, &target, in_progress),
            value => Ok(Resolved::Found(value)),
        }
    }

    /// Expand a range into a dense row-major list, with `None` wherever
    /// the loader had no cell. Local bindings win per cell and
    /// reference-valued cells are followed.
    fn materialize_range(
        &self,
        range: &RangeRef,
        in_progress: &mut Vec<Reference>,
    ) -> Result<Resolved> {
        let size = range
            .width()
            .checked_mul(range.height())
            .filter(|size| *size <= self.max_range_cells)
            .ok_or_else(|| {
                ResolveError::Evaluation(format!(
                    "Range too large: {} ({} x {} cells, max {})",
                    range,
                    range.width(),
                    range.height(),
                    self.max_range_cells
                ))
            })?;

        let mut loaded: HashMap<CellRef, Option<Value>> = self
            .loader
            .load_cell_range(range)?
            .into_iter()
            .filter(|cell| range.contains(&cell.reference))
            .map(|cell| (cell.reference, cell.value))
            .collect();
        let present = loaded.len();

        let mut values = Vec::with_capacity(size);
        for cell in range.cells() {
            let stored = loaded.remove(&cell).flatten();
            let reference = Reference::Cell(cell);
            if let Some(local) = self.scope.lookup(&reference) {
                values.push(local.clone());
                continue;
            }
            let value = match stored {
                Some(Value::Reference(target)) => {
                    self.follow(&reference, &target, in_progress)?.into_option().flatten()
                }
                value => value,
            };
            values.push(value);
        }
        trace!(%range, present, "materialized range");
        Ok(Resolved::Found(Some(Value::List(values))))
    }

    fn follow(
        &self,
        from: &Reference,
        target: &Reference,
        in_progress: &mut Vec<Reference>,
    ) -> Result<Resolved> {
        // `from` is already in progress when a range contains the cell that points at it.
        if target == from || in_progress.contains(target) || in_progress.contains(from) {
            return Err(ResolveError::Cycle {
                from: from.to_string(),
                with: target.to_string(),
            });
        }
        in_progress.push(from.clone());
        let resolved = self.resolve_inner(target, in_progress);
        in_progress.pop();
        resolved
    }
}

impl std::fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("scope_depth", &self.scope.depth())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::loader::{LabelMapping, LoadedCell, MemoryLoader};
    use crate::engine::reference::{LabelName, ValueName};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cell(text: &str) -> CellRef {
        CellRef::from_str(text).unwrap()
    }

    fn label(text: &str) -> LabelName {
        LabelName::new(text).unwrap()
    }

    fn engine(loader: MemoryLoader) -> ResolutionEngine {
        ResolutionEngine::with_loader(Arc::new(loader))
    }

    /// Counts range loads so tests can check a range is fetched in one call.
    struct CountingLoader {
        inner: MemoryLoader,
        range_loads: AtomicUsize,
        cell_loads: AtomicUsize,
    }

    impl Loader for CountingLoader {
        fn load_cell(&self, cell: &CellRef) -> Result<Option<LoadedCell>> {
            self.cell_loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_cell(cell)
        }

        fn load_cell_range(&self, range: &RangeRef) -> Result<Vec<LoadedCell>> {
            self.range_loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_cell_range(range)
        }

        fn load_label(&self, label: &LabelName) -> Result<Option<LabelMapping>> {
            self.inner.load_label(label)
        }
    }

    #[test]
    fn test_local_binding_wins_over_loader() {
        let loader = MemoryLoader::new().with_cell(cell("B2"), Some(Value::text("from loader")));
        let resolver = engine(loader).enter_scope([(
            Reference::Cell(cell("B2")),
            Some(Value::text("local")),
        )]);

        assert_eq!(
            resolver.resolve(&Reference::Cell(cell("B2"))).unwrap(),
            Resolved::Found(Some(Value::text("local")))
        );
    }

    #[test]
    fn test_local_null_binding_wins_over_loader() {
        let loader = MemoryLoader::new().with_cell(cell("B2"), Some(Value::Number(1.0)));
        let resolver = engine(loader).enter_scope([(Reference::Cell(cell("B2")), None)]);

        assert_eq!(
            resolver.resolve(&Reference::Cell(cell("B2"))).unwrap(),
            Resolved::Found(None)
        );
    }

    #[test]
    fn test_innermost_frame_wins() {
        let name = Reference::named_value("x").unwrap();
        let resolver = engine(MemoryLoader::new())
            .enter_scope([(name.clone(), Some(Value::Number(1.0)))])
            .enter_scope([(name.clone(), Some(Value::Number(2.0)))]);

        assert_eq!(resolver.resolve_or_fail(&name).unwrap(), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_local_label_override_skips_loader_label() {
        let loader = MemoryLoader::new()
            .with_cell(cell("A1"), Some(Value::Number(1.0)))
            .with_label(label("Total"), Reference::Cell(cell("A1")));
        let total = Reference::Label(label("Total"));
        let resolver = engine(loader).enter_scope([(total.clone(), Some(Value::Number(99.0)))]);

        assert_eq!(resolver.resolve_or_fail(&total).unwrap(), Some(Value::Number(99.0)));
    }

    #[test]
    fn test_cell_found_with_null_value() {
        let loader = MemoryLoader::new().with_cell(cell("A1"), None);
        assert_eq!(
            engine(loader).resolve(&Reference::Cell(cell("A1"))).unwrap(),
            Resolved::Found(None)
        );
    }

    #[test]
    fn test_missing_cell_is_not_found() {
        let resolver = engine(MemoryLoader::new());
        assert_eq!(
            resolver.resolve(&Reference::Cell(cell("B2"))).unwrap(),
            Resolved::NotFound
        );

        let err = resolver.resolve_or_fail(&Reference::Cell(cell("B2"))).unwrap_err();
        assert_eq!(err.to_string(), "Cell not found: \"B2\"");
    }

    #[test]
    fn test_missing_label_message() {
        let err = engine(MemoryLoader::new())
            .resolve_or_fail(&Reference::Label(label("Label123")))
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Label not found: \"Label123\"");
    }

    #[test]
    fn test_missing_named_value_message() {
        let err = engine(MemoryLoader::new())
            .resolve_or_fail(&Reference::named_value("Missing").unwrap())
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown reference: \"Missing\"");
    }

    #[test]
    fn test_range_materializes_row_major_with_nulls() {
        let loader = MemoryLoader::new()
            .with_cell(cell("B2"), Some(Value::text("B2Value")))
            .with_cell(cell("C3"), Some(Value::Number(123.0)))
            .with_cell(cell("A1"), Some(Value::text("outside")));
        let range = Reference::parse("B2:C3").unwrap();

        assert_eq!(
            engine(loader).resolve_or_fail(&range).unwrap(),
            Some(Value::List(vec![
                Some(Value::text("B2Value")),
                None,
                None,
                Some(Value::Number(123.0)),
            ]))
        );
    }

    #[test]
    fn test_empty_range_is_found_not_absent() {
        let range = Reference::parse("A1:C1").unwrap();
        assert_eq!(
            engine(MemoryLoader::new()).resolve(&range).unwrap(),
            Resolved::Found(Some(Value::List(vec![None, None, None])))
        );
    }

    #[test]
    fn test_range_is_loaded_in_one_call() {
        let loader = Arc::new(CountingLoader {
            inner: MemoryLoader::new().with_cell(cell("A1"), Some(Value::Number(1.0))),
            range_loads: AtomicUsize::new(0),
            cell_loads: AtomicUsize::new(0),
        });
        let resolver = ResolutionEngine::with_loader(loader.clone());

        resolver.resolve(&Reference::parse("A1:D10").unwrap()).unwrap();
        assert_eq!(loader.range_loads.load(Ordering::SeqCst), 1);
        assert_eq!(loader.cell_loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_label_indirection() {
        let loader = MemoryLoader::new()
            .with_cell(cell("A1"), Some(Value::Number(10.0)))
            .with_label(label("Inner"), Reference::Cell(cell("A1")))
            .with_label(label("Outer"), Reference::Label(label("Inner")));

        assert_eq!(
            engine(loader)
                .resolve_or_fail(&Reference::Label(label("Outer")))
                .unwrap(),
            Some(Value::Number(10.0))
        );
    }

    #[test]
    fn test_label_to_missing_cell_is_not_found() {
        let loader = MemoryLoader::new().with_label(label("Dangling"), Reference::Cell(cell("Z9")));
        assert_eq!(
            engine(loader).resolve(&Reference::Label(label("Dangling"))).unwrap(),
            Resolved::NotFound
        );
    }

    #[test]
    fn test_label_to_range() {
        let loader = MemoryLoader::new()
            .with_cell(cell("A1"), Some(Value::Number(1.0)))
            .with_label(label("Block"), Reference::parse("A1:A2").unwrap());
        assert_eq!(
            engine(loader)
                .resolve_or_fail(&Reference::Label(label("Block")))
                .unwrap(),
            Some(Value::List(vec![Some(Value::Number(1.0)), None]))
        );
    }

    #[test]
    fn test_label_pointing_at_itself_is_a_cycle() {
        let loader = MemoryLoader::new().with_label(label("Loop"), Reference::Label(label("Loop")));
        let err = engine(loader)
            .resolve(&Reference::Label(label("Loop")))
            .unwrap_err();
        assert_eq!(err.to_string(), "Cycle detected from Loop with Loop");
    }

    #[test]
    fn test_named_value_through_label_back_to_itself_is_a_cycle() {
        let hello = Reference::named_value("Hello").unwrap();
        let loader = MemoryLoader::new()
            .with_label(label("Label123"), Reference::Cell(cell("A1")))
            .with_cell(cell("A1"), Some(Value::Reference(hello.clone())));
        let mut environment = HashMap::new();
        environment.insert(
            ValueName::new("Hello").unwrap(),
            Value::Reference(Reference::Label(label("Label123"))),
        );
        let resolver = ResolutionEngine::new(Arc::new(loader), Arc::new(environment));

        let err = resolver.resolve(&hello).unwrap_err();
        assert!(err.is_cycle());
        assert_eq!(err.to_string(), "Cycle detected from A1 with Hello");
    }

    #[test]
    fn test_named_value_bound_to_label_resolves_through_it() {
        let loader = MemoryLoader::new()
            .with_label(label("Label123"), Reference::Cell(cell("A1")))
            .with_cell(cell("A1"), Some(Value::text("target")));
        let mut environment = HashMap::new();
        environment.insert(
            ValueName::new("Hello").unwrap(),
            Value::Reference(Reference::Label(label("Label123"))),
        );
        let resolver = ResolutionEngine::new(Arc::new(loader), Arc::new(environment));

        assert_eq!(
            resolver
                .resolve_or_fail(&Reference::named_value("Hello").unwrap())
                .unwrap(),
            Some(Value::text("target"))
        );
    }

    #[test]
    fn test_cycle_tracking_is_cleared_between_calls() {
        let loader = MemoryLoader::new()
            .with_cell(cell("A1"), Some(Value::Number(5.0)))
            .with_label(label("First"), Reference::Cell(cell("A1")));
        let resolver = engine(loader);
        let first = Reference::Label(label("First"));

        assert!(resolver.resolve(&first).is_ok());
        assert!(resolver.resolve(&first).is_ok());
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        // Two labels sharing a target are followed one after the other, not nested.
        let loader = MemoryLoader::new()
            .with_cell(cell("A1"), Some(Value::Number(5.0)))
            .with_label(label("Left"), Reference::Cell(cell("A1")))
            .with_label(label("Right"), Reference::Cell(cell("A1")));
        let resolver = engine(loader);

        assert!(resolver.resolve(&Reference::Label(label("Left"))).is_ok());
        assert!(resolver.resolve(&Reference::Label(label("Right"))).is_ok());
    }

    #[test]
    fn test_whole_sheet_range_is_rejected() {
        let err = engine(MemoryLoader::new())
            .resolve(&Reference::parse("A1:XFD1048576").unwrap())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Range too large: A1:XFD1048576 (16384 x 1048576 cells, max 1000000)"
        );
    }

    #[test]
    fn test_range_cell_limit_is_configurable() {
        let resolver = engine(MemoryLoader::new()).with_max_range_cells(4);
        assert!(resolver.resolve(&Reference::parse("A1:B2").unwrap()).is_ok());

        let err = resolver
            .enter_scope([(Reference::named_value("x").unwrap(), None)])
            .resolve(&Reference::parse("A1:C2").unwrap())
            .unwrap_err();
        assert_eq!(err.to_string(), "Range too large: A1:C2 (3 x 2 cells, max 4)");
    }

    #[test]
    fn test_range_follows_reference_cells() {
        let loader = MemoryLoader::new()
            .with_cell(cell("A1"), Some(Value::Reference(Reference::Cell(cell("B1")))))
            .with_cell(cell("B1"), Some(Value::Number(5.0)))
            .with_cell(cell("A2"), Some(Value::Reference(Reference::Cell(cell("Z9")))));

        assert_eq!(
            engine(loader)
                .resolve_or_fail(&Reference::parse("A1:A2").unwrap())
                .unwrap(),
            Some(Value::List(vec![Some(Value::Number(5.0)), None]))
        );
    }

    #[test]
    fn test_cell_pointing_at_its_own_range_is_a_cycle() {
        let loader = MemoryLoader::new().with_cell(
            cell("A1"),
            Some(Value::Reference(Reference::parse("A1:A2").unwrap())),
        );
        let err = engine(loader)
            .resolve(&Reference::parse("A1:A2").unwrap())
            .unwrap_err();
        assert_eq!(err.to_string(), "Cycle detected from A1 with A1:A2");
    }

    #[test]
    fn test_range_sees_local_cell_bindings() {
        let loader = MemoryLoader::new()
            .with_cell(cell("B2"), Some(Value::text("B2Value")))
            .with_cell(cell("C3"), Some(Value::Number(123.0)));
        let resolver = engine(loader).enter_scope([
            (Reference::Cell(cell("B2")), Some(Value::text("local"))),
            (Reference::Cell(cell("C2")), Some(Value::Number(1.0))),
        ]);

        assert_eq!(
            resolver
                .resolve_or_fail(&Reference::parse("B2:C3").unwrap())
                .unwrap(),
            Some(Value::List(vec![
                Some(Value::text("local")),
                Some(Value::Number(1.0)),
                None,
                Some(Value::Number(123.0)),
            ]))
        );
    }
}
