//! Dialogue graph compiler core.
//!
//! Converts a freely-editable, multi-root directed graph of dialogue
//! nodes into a canonical densely-indexed node array: deterministic root
//! ordering, BFS index assignment, orphan-subgraph absorption,
//! primary/secondary edge categorization, and index-remap fixup for the
//! weak references other parts of the data model hold by integer index.
//!
//! The store is an arena addressed by generational handles; the compiler
//! reads and mutates it in place and is single-threaded, synchronous and
//! run-to-completion. See `dialogue-editor` for the owning service that
//! gates when a pass may run.

pub mod compiler;
pub mod diagnostics;
pub mod errors;
pub mod graph;
pub mod remap;
pub mod types;
pub mod validate;

pub use compiler::{CompileOutput, Compiler};
pub use diagnostics::{CompileDiagnostics, CompileWarning};
pub use errors::CompileError;
pub use graph::{DialogueGraph, DialogueNode, Edge, NodeId, NodeKind};
pub use remap::{IndexRemapTable, RemapApplier, RemapSink};
pub use types::{Condition, DenseIndex, GridPos, NodeRef};
