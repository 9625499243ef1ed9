//! Primary/secondary edge categorization.
//!
//! Built on the single BFS-predecessor tree recorded by the traversal,
//! not an exact multi-path reachability analysis. That approximation is
//! deliberate: downstream content depends on its specific output, so it
//! is preserved rather than corrected.

use crate::graph::{DialogueGraph, NodeId};
use std::collections::HashSet;

/// Set every edge's categorization bit.
///
/// Edges out of roots are always primary. For an edge `n -> child` of a
/// non-root node, reconstruct child's root-path by walking predecessor
/// links: if the chain terminates at a declared root and passes through
/// `n`, this edge is the path's way of reaching child — primary.
/// Otherwise (another path got there first, a back-edge, or an orphan
/// component with no root-path at all) — secondary.
pub(super) fn categorize_edges(graph: &mut DialogueGraph, pred: &[Option<NodeId>]) {
    let root_set: HashSet<NodeId> = graph.roots().iter().copied().collect();

    let mut updates: Vec<(NodeId, Vec<bool>)> = Vec::new();
    for (id, node) in graph.iter_live() {
        let bits = node
            .edges
            .iter()
            .map(|e| {
                if graph.node(e.target).is_none() {
                    return false; // dead target, already flagged by the traversal
                }
                node.is_root || root_path_passes_through(pred, &root_set, e.target, id)
            })
            .collect();
        updates.push((id, bits));
    }

    for (id, bits) in updates {
        if let Some(node) = graph.node_mut(id) {
            for (edge, primary) in node.edges.iter_mut().zip(bits) {
                edge.primary = primary;
            }
        }
    }
}

/// Walk `child`'s strict ancestors (its predecessor chain, child itself
/// excluded — a self-loop is never its own discovery route). True iff the
/// chain ends at a declared root and contains `parent`.
fn root_path_passes_through(
    pred: &[Option<NodeId>],
    roots: &HashSet<NodeId>,
    child: NodeId,
    parent: NodeId,
) -> bool {
    let mut cur = match pred.get(child.slot()).copied().flatten() {
        Some(p) => p,
        None => return false, // orphan sub-root, declared root, or dead target
    };
    let mut passes = false;
    loop {
        if cur == parent {
            passes = true;
        }
        match pred.get(cur.slot()).copied().flatten() {
            Some(p) => cur = p,
            None => return passes && roots.contains(&cur),
        }
    }
}
