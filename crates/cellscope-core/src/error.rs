//! Error types for Cellscope core.

use thiserror::Error;

use cellscope_engine::engine::ResolveError;

/// Errors that can occur while editing, evaluating or storing a workbook
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Function {0} is built in and cannot be redefined")]
    BuiltinFunction(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
