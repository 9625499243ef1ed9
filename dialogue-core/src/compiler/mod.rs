//! The compile pass: turns the freely-edited multi-root graph into the
//! canonical densely-indexed node array, rewriting edge targets and
//! building the index-remap table along the way.

mod categorize;
mod context;

pub use context::{CompileOutput, Compiler};
