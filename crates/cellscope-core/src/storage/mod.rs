//! Workbook storage in the `.grd` text format.
//!
//! ```text
//! # Cellscope Workbook
//! A1: 42
//! A2: "text"
//! A3: =SUM(B2:C3)
//! label Total: B2:C3
//! value rate: 0.25
//! value Hello: =Label123
//! function DOUBLE(x) = x * 2
//! ```

mod parser;
mod writer;

pub use parser::{parse_grd, parse_grd_content};
pub use writer::{write_grd, write_grd_content};
