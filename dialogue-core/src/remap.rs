//! The old-index → new-index table built during a compile pass, and the
//! applier that fixes up weak references held by unrelated entities.

use crate::diagnostics::{CompileDiagnostics, W_DANGLING};
use crate::graph::DialogueGraph;
use crate::types::{DenseIndex, NodeRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ─── Table ────────────────────────────────────────────────────

/// One entry per surviving previously-indexed node, *including* nodes whose
/// index did not move. That makes key absence a reliable signal that the
/// old node no longer exists, which the fixup contract depends on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRemapTable {
    entries: BTreeMap<DenseIndex, DenseIndex>,
}

impl IndexRemapTable {
    pub fn record(&mut self, old: DenseIndex, new: DenseIndex) {
        self.entries.insert(old, new);
    }

    pub fn get(&self, old: DenseIndex) -> Option<DenseIndex> {
        self.entries.get(&old).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DenseIndex, DenseIndex)> + '_ {
        self.entries.iter().map(|(&o, &n)| (o, n))
    }

    /// Only the indices that actually moved — the remap events external
    /// consumers care about.
    pub fn changed(&self) -> impl Iterator<Item = (DenseIndex, DenseIndex)> + '_ {
        self.iter().filter(|(o, n)| o != n)
    }
}

// ─── Applier ──────────────────────────────────────────────────

/// Resolves the finalized table against the freshly compiled array once,
/// so every weak-reference holder can be fixed up without re-touching the
/// graph. The new GUID is captured per entry as the secondary validation
/// key to store alongside the rewritten index.
pub struct RemapApplier {
    resolved: BTreeMap<DenseIndex, (DenseIndex, Option<Uuid>)>,
}

impl RemapApplier {
    /// Build from a finalized table. Must run after `set_compiled`.
    pub fn new(table: &IndexRemapTable, graph: &DialogueGraph) -> Self {
        let resolved = table
            .iter()
            .map(|(old, new)| {
                let guid = graph
                    .compiled()
                    .get(new as usize)
                    .and_then(|&id| graph.node(id))
                    .and_then(|n| n.guid);
                (old, (new, guid))
            })
            .collect();
        Self { resolved }
    }

    /// Fix up one weak reference in place.
    ///
    /// Mapped: rewrite the index and re-derive the GUID. Unmapped: the old
    /// node no longer exists — leave the reference untouched and record a
    /// dangling-reference warning. Never a failure.
    pub fn rewrite(&self, reference: &mut NodeRef, diags: &mut CompileDiagnostics, context: &str) {
        match self.resolved.get(&reference.index) {
            Some(&(new, guid)) => {
                reference.index = new;
                reference.guid = guid;
            }
            None => {
                diags.warn(
                    W_DANGLING,
                    format!(
                        "{context}: reference to old index {} no longer maps to a node",
                        reference.index
                    ),
                );
            }
        }
    }
}

/// Implemented by every external holder of index-based weak references
/// (conditions living outside the graph, visited-node ledgers, proxies in
/// other assets). The owning editor injects holders explicitly; there is
/// no globally discoverable registry.
pub trait RemapSink {
    fn apply_remap(&mut self, applier: &RemapApplier, diags: &mut CompileDiagnostics);
}
