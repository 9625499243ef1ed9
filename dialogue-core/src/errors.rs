//! Typed compile failures.
//!
//! Only internal invariant violations abort a pass. Dangling weak
//! references are diagnostics, never errors (see `diagnostics`).

use crate::graph::NodeId;
use crate::types::DenseIndex;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// A node's pre-compile index does not name that node in the previous
    /// compiled array. Downstream traversal trusts indices unconditionally,
    /// so this is a programming-logic defect, not recoverable input.
    #[error("node {node:?} claims dense index {index}, but the compiled array slot holds {occupant:?}")]
    StaleIndex {
        node: NodeId,
        index: DenseIndex,
        occupant: Option<NodeId>,
    },

    /// Compile was requested while a batch edit has compilation suppressed.
    /// The caller must finish the transaction and compile at its boundary.
    #[error("compilation is suppressed by an active batch edit")]
    Suppressed,
}
