//! Error types for reference resolution and formula evaluation.

use thiserror::Error;

use super::reference::ReferenceKind;

/// Errors raised while resolving references or evaluating formulas.
///
/// `Clone` so the error can travel through Rhai as a runtime value and be
/// recovered with its type intact.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("{}", not_found_message(.kind, .reference))]
    NotFound {
        kind: ReferenceKind,
        reference: String,
    },

    #[error("Cycle detected from {from} with {with}")]
    Cycle { from: String, with: String },

    /// A local binding used where only a function name or label is valid.
    #[error("{0}")]
    InvalidUse(String),

    #[error("Parameter \"{parameter}\": {message}")]
    Conversion { parameter: String, message: String },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("{0}")]
    Evaluation(String),

    #[error("Loader error: {0}")]
    Loader(String),
}

fn not_found_message(kind: &ReferenceKind, reference: &str) -> String {
    match kind {
        ReferenceKind::Cell => format!("Cell not found: \"{}\"", reference),
        ReferenceKind::CellRange => format!("Cell range not found: \"{}\"", reference),
        ReferenceKind::Label => format!("Label not found: \"{}\"", reference),
        ReferenceKind::NamedValue => format!("Unknown reference: \"{}\"", reference),
    }
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, ResolveError::Cycle { .. })
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;
