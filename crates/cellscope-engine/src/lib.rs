//! cellscope_engine - Reference resolution, formula evaluation and parser providers.

pub mod engine;
pub mod provider;
