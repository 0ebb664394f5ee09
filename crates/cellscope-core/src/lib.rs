//! cellscope-core - Workbook store (cells, labels, environment values) + storage.

pub mod error;
pub mod storage;
pub mod workbook;

pub use error::{CoreError, Result};
pub use workbook::Workbook;

pub use cellscope_engine::engine::{CellRef, Reference, Value};
