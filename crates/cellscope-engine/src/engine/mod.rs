//! Reference resolution and formula evaluation API.
//!
//! This module provides the computation side of the spreadsheet:
//!
//! - [`CellRef`], [`RangeRef`], [`Reference`] - Cell, range, label and named value references
//! - [`ScopeFrame`] - Immutable chains of local bindings
//! - [`Loader`], [`EnvironmentValues`] - Backing stores consumed by resolution
//! - [`ResolutionEngine`] - Scope-chain resolution with cycle detection
//! - [`EvaluationContext`] - Resolver plus function table, with parameter guards
//! - [`FunctionRegistry`], [`LambdaFunction`] - Built-in and user-defined functions
//! - [`preprocess_formula`], [`evaluate_formula`] - Formula evaluation on Rhai
//! - [`Cell`], [`Grid`], [`detect_cycle`] - Cell storage and cell-to-cell cycle checks

mod cell;
mod cell_ref;
mod context;
mod convert;
mod cycle;
mod deps;
mod error;
mod eval;
mod function;
mod loader;
mod preprocess;
mod range;
mod reference;
mod resolve;
mod scope;
mod value;

pub use cell::{Cell, CellType, Environment, EvaluationStack, Grid, Labels, ValueCache};
pub use cell_ref::{CellRef, MAX_COLUMNS, MAX_ROWS};
pub use context::{EvaluationContext, MAX_CALL_DEPTH};
pub use convert::{Cardinality, FunctionParameter, ParameterKind, convert, convert_arguments};
pub use cycle::detect_cycle;
pub use deps::extract_dependencies;
pub use error::{ResolveError, Result};
pub use eval::{create_engine, evaluate_formula, from_rhai_error};
pub use function::{
    BUILTINS, Builtin, ExpressionFunction, FunctionName, FunctionRegistry, LambdaFunction,
};
pub use loader::{EnvironmentValues, LabelMapping, LoadedCell, Loader, MemoryLoader, NoEnvironment};
pub use preprocess::preprocess_formula;
pub use range::RangeRef;
pub use reference::{LabelName, Reference, ReferenceKind, ValueName};
pub use resolve::{MAX_RANGE_CELLS, ResolutionEngine, Resolved};
pub use scope::ScopeFrame;
pub use value::{Value, format_number, format_value};
