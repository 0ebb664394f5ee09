//! Workbook state and logic (UI-agnostic).

mod loader;
mod ops;

use std::sync::Arc;

use cellscope_engine::engine::{
    Environment, EvaluationContext, EvaluationStack, FunctionRegistry, Grid, Labels,
    ResolutionEngine, ValueCache,
};

/// Cells, labels, environment values and user functions.
///
/// All state lives behind `Arc`s, so clones are cheap and share it. Formula
/// cells are evaluated lazily on load and cached until the next mutation.
#[derive(Clone, Debug)]
pub struct Workbook {
    pub(crate) grid: Grid,
    pub(crate) labels: Labels,
    pub(crate) environment: Environment,
    pub(crate) functions: Arc<FunctionRegistry>,
    pub(crate) value_cache: ValueCache,
    pub(crate) evaluating: EvaluationStack,
}

impl Workbook {
    /// An empty workbook with the built-in functions registered.
    pub fn new() -> Self {
        Workbook {
            grid: Grid::default(),
            labels: Labels::default(),
            environment: Environment::default(),
            functions: Arc::new(FunctionRegistry::with_builtins()),
            value_cache: ValueCache::default(),
            evaluating: EvaluationStack::default(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn functions(&self) -> &Arc<FunctionRegistry> {
        &self.functions
    }

    /// An evaluation context resolving against this workbook.
    pub fn context(&self) -> EvaluationContext {
        let resolver = ResolutionEngine::new(Arc::new(self.clone()), Arc::new(self.clone()));
        EvaluationContext::new(resolver, Arc::clone(&self.functions))
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}
