use super::categorize;
use crate::diagnostics::{CompileDiagnostics, W_DEAD_EDGE, W_EDGE_TO_ROOT};
use crate::errors::CompileError;
use crate::graph::{DialogueGraph, NodeId, NodeKind};
use crate::remap::{IndexRemapTable, RemapApplier};
use crate::types::DenseIndex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// Result of one compile pass. The graph itself has been updated in place
/// (compiled array, root order, edge indices, categorization, depths);
/// this carries the transient artifacts consumers need.
#[derive(Clone, Debug)]
pub struct CompileOutput {
    pub remap: IndexRemapTable,
    pub diagnostics: CompileDiagnostics,
    /// SHA-256 over the compiled order, edge indices and categorization.
    /// Two passes over an unchanged graph produce the same fingerprint.
    pub fingerprint: [u8; 32],
    pub node_count: usize,
}

/// The dialogue graph compiler. Stateless between passes; held and passed
/// by the owning editor service rather than discovered globally.
#[derive(Debug, Default)]
pub struct Compiler;

impl Compiler {
    pub fn new() -> Self {
        Self
    }

    /// Run one synchronous pass: root ordering, BFS index assignment,
    /// orphan absorption, edge categorization, in-graph remap fixup.
    ///
    /// `O(V+E)`: each node is enqueued exactly once, each edge inspected
    /// exactly once. Always either completes or fails loudly on an
    /// internal invariant violation.
    pub fn compile(&self, graph: &mut DialogueGraph) -> Result<CompileOutput, CompileError> {
        tracing::debug!(
            nodes = graph.node_count(),
            roots = graph.roots().len(),
            "compile pass start"
        );

        check_precompile_consistency(graph)?;
        assign_missing_guids(graph);
        order_roots_by_position(graph);

        let mut cx = CompilerContext::new(graph);
        cx.seed_roots(graph);
        cx.drain_queue(graph);
        cx.absorb_orphans(graph);

        graph.set_compiled(cx.order.clone());
        categorize::categorize_edges(graph, &cx.pred);

        // The table is final for this pass; fix up weak references held
        // inside the graph itself (edge conditions, proxy targets).
        let applier = RemapApplier::new(&cx.remap, graph);
        apply_in_graph_remap(graph, &applier, &mut cx.diags);

        let output = CompileOutput {
            node_count: cx.order.len(),
            fingerprint: fingerprint(graph),
            remap: cx.remap,
            diagnostics: cx.diags,
        };
        tracing::debug!(
            nodes = output.node_count,
            remapped = output.remap.changed().count(),
            warnings = output.diagnostics.warnings().len(),
            "compile pass done"
        );
        Ok(output)
    }
}

// ─── Pre-pass phases ──────────────────────────────────────────

/// Every live non-root node carrying a pre-compile index must be the node
/// actually stored at that slot of the previous compiled array. A mismatch
/// means program logic corrupted the store; emitting an array from it
/// would poison runtime traversal, so abort instead.
fn check_precompile_consistency(graph: &DialogueGraph) -> Result<(), CompileError> {
    for (id, node) in graph.iter_live() {
        if node.is_root {
            continue;
        }
        if let Some(index) = node.compiled_index {
            let occupant = graph.compiled().get(index as usize).copied();
            if occupant != Some(id) {
                tracing::error!(?id, index, ?occupant, "pre-compile index inconsistency");
                return Err(CompileError::StaleIndex {
                    node: id,
                    index,
                    occupant,
                });
            }
        }
    }
    Ok(())
}

/// GUIDs are assigned lazily on first compile and never reassigned while
/// the node lives.
fn assign_missing_guids(graph: &mut DialogueGraph) {
    let missing: Vec<NodeId> = graph
        .iter_live()
        .filter(|(_, n)| n.guid.is_none())
        .map(|(id, _)| id)
        .collect();
    for id in missing {
        if let Some(node) = graph.node_mut(id) {
            node.guid = Some(Uuid::now_v7());
        }
    }
}

/// Stable sort ascending by horizontal position, ties keeping stored
/// order, so multi-root output follows the left-to-right authoring
/// convention and minor re-layouts don't reshuffle the compiled order.
fn order_roots_by_position(graph: &mut DialogueGraph) {
    let mut roots = graph.roots().to_vec();
    roots.sort_by_key(|&r| graph.node(r).map(|n| n.position.x).unwrap_or(i32::MAX));
    graph.set_roots(roots);
}

// ─── Traversal state ──────────────────────────────────────────

/// Per-pass traversal state, slot-indexed. Dropped when the pass ends;
/// only the remap table and diagnostics outlive it.
struct CompilerContext {
    visited: Vec<bool>,
    /// The single parent that first discovered each node — the spanning
    /// predecessor tree edge categorization is built on.
    pred: Vec<Option<NodeId>>,
    /// Indices captured before the pass mutates anything.
    prev_index: Vec<Option<DenseIndex>>,
    queue: VecDeque<NodeId>,
    next_index: DenseIndex,
    order: Vec<NodeId>,
    remap: IndexRemapTable,
    diags: CompileDiagnostics,
}

impl CompilerContext {
    fn new(graph: &DialogueGraph) -> Self {
        let slots = graph.slot_count();
        let mut prev_index = vec![None; slots];
        for (id, node) in graph.iter_live() {
            if !node.is_root {
                prev_index[id.slot()] = node.compiled_index;
            }
        }
        Self {
            visited: vec![false; slots],
            pred: vec![None; slots],
            prev_index,
            queue: VecDeque::new(),
            next_index: 0,
            order: Vec::new(),
            remap: IndexRemapTable::default(),
            diags: CompileDiagnostics::default(),
        }
    }

    /// Mark every root visited without giving it an array slot, then feed
    /// each root's children into the traversal in root order.
    fn seed_roots(&mut self, graph: &mut DialogueGraph) {
        let roots = graph.roots().to_vec();
        for &r in &roots {
            self.visited[r.slot()] = true;
            if let Some(node) = graph.node_mut(r) {
                node.compiled_index = None;
                node.depth = Some(0);
            }
        }
        for &r in &roots {
            self.process_edges(graph, r);
        }
    }

    /// Dequeue until empty, appending each node at the array position
    /// equal to its assigned index (FIFO order makes the two coincide).
    fn drain_queue(&mut self, graph: &mut DialogueGraph) {
        while let Some(n) = self.queue.pop_front() {
            self.process_edges(graph, n);
            self.order.push(n);
        }
    }

    /// Walk `n`'s outgoing edges in stored order, assigning fresh dense
    /// indices to unvisited targets and rewriting every edge's target
    /// index. An already-visited target (DAG-merge or true cycle, treated
    /// identically) only gets its index rewritten.
    fn process_edges(&mut self, graph: &mut DialogueGraph, n: NodeId) {
        let (parent_depth, edge_count) = match graph.node(n) {
            Some(node) => (node.depth.unwrap_or(0), node.edges.len()),
            None => return,
        };

        for ei in 0..edge_count {
            let target = match graph.node(n).and_then(|node| node.edges.get(ei)) {
                Some(edge) => edge.target,
                None => break,
            };

            enum Target {
                Dead,
                Root,
                Seen(Option<DenseIndex>),
                Fresh,
            }
            let state = match graph.node(target) {
                None => Target::Dead,
                Some(t) if t.is_root => Target::Root,
                Some(t) => {
                    if self.visited[target.slot()] {
                        Target::Seen(t.compiled_index)
                    } else {
                        Target::Fresh
                    }
                }
            };

            let resolved = match state {
                Target::Dead => {
                    self.diags.warn(
                        W_DEAD_EDGE,
                        format!("edge {ei} of {n:?} targets a node that no longer exists"),
                    );
                    None
                }
                Target::Root => {
                    // Roots hold no slot; the edge cannot resolve to an index.
                    self.diags.warn(
                        W_EDGE_TO_ROOT,
                        format!("edge {ei} of {n:?} targets a root node"),
                    );
                    None
                }
                Target::Seen(index) => index,
                Target::Fresh => Some(self.discover(graph, n, target, parent_depth)),
            };

            if let Some(node) = graph.node_mut(n) {
                if let Some(edge) = node.edges.get_mut(ei) {
                    edge.target_index = resolved;
                }
            }
        }
    }

    /// First discovery of `target`: assign the next dense index, record
    /// the remap entry, remember the discovering parent and depth, enqueue.
    fn discover(
        &mut self,
        graph: &mut DialogueGraph,
        parent: NodeId,
        target: NodeId,
        parent_depth: u32,
    ) -> DenseIndex {
        let index = self.next_index;
        self.next_index += 1;
        self.visited[target.slot()] = true;
        if let Some(prev) = self.prev_index[target.slot()] {
            self.remap.record(prev, index);
        }
        self.pred[target.slot()] = Some(parent);
        if let Some(node) = graph.node_mut(target) {
            node.compiled_index = Some(index);
            node.depth = Some(parent_depth + 1);
        }
        self.queue.push_back(target);
        index
    }

    /// Nodes unreachable from any root still get indexed, never dropped.
    /// Each round picks a natural sub-root (no incoming edge from within
    /// the orphan set) or, for a fully cyclic component, the first orphan
    /// in stable arena order, then re-runs the BFS from it.
    fn absorb_orphans(&mut self, graph: &mut DialogueGraph) {
        loop {
            let orphans: Vec<NodeId> = graph
                .iter_live()
                .filter(|(id, n)| !n.is_root && !self.visited[id.slot()])
                .map(|(id, _)| id)
                .collect();
            if orphans.is_empty() {
                return;
            }

            let orphan_set: HashSet<NodeId> = orphans.iter().copied().collect();
            let mut incoming: HashMap<NodeId, usize> = HashMap::new();
            for &m in &orphans {
                if let Some(node) = graph.node(m) {
                    // Self-loops count as incoming from within the set.
                    for e in &node.edges {
                        if orphan_set.contains(&e.target) {
                            *incoming.entry(e.target).or_insert(0) += 1;
                        }
                    }
                }
            }
            let sub_root = orphans
                .iter()
                .copied()
                .find(|id| incoming.get(id).copied().unwrap_or(0) == 0)
                .unwrap_or(orphans[0]);

            let index = self.next_index;
            self.next_index += 1;
            self.visited[sub_root.slot()] = true;
            if let Some(prev) = self.prev_index[sub_root.slot()] {
                self.remap.record(prev, index);
            }
            if let Some(node) = graph.node_mut(sub_root) {
                node.compiled_index = Some(index);
                node.depth = Some(0);
            }
            self.queue.push_back(sub_root);
            self.drain_queue(graph);
        }
    }
}

// ─── Post-pass phases ─────────────────────────────────────────

/// Apply the finalized remap table to index-based weak references stored
/// inside the graph: proxy-node targets and edge conditions.
fn apply_in_graph_remap(
    graph: &mut DialogueGraph,
    applier: &RemapApplier,
    diags: &mut CompileDiagnostics,
) {
    let ids: Vec<NodeId> = graph.iter_live().map(|(id, _)| id).collect();
    for id in ids {
        if let Some(node) = graph.node_mut(id) {
            if let NodeKind::Proxy { target } = &mut node.kind {
                applier.rewrite(target, diags, "proxy node");
            }
            for edge in &mut node.edges {
                for condition in &mut edge.conditions {
                    applier.rewrite(condition.node_ref_mut(), diags, "edge condition");
                }
            }
        }
    }
}

/// SHA-256 over the compiled order, per-node GUIDs, edge target indices
/// and categorization bits. Idempotence check for callers and tests.
fn fingerprint(graph: &DialogueGraph) -> [u8; 32] {
    let mut hasher = Sha256::new();
    let roots = graph.roots().iter();
    for &id in roots.chain(graph.compiled()) {
        if let Some(node) = graph.node(id) {
            if let Some(guid) = node.guid {
                hasher.update(guid.as_bytes());
            }
            for edge in &node.edges {
                hasher.update([u8::from(edge.primary)]);
                hasher.update(edge.target_index.unwrap_or(DenseIndex::MAX).to_le_bytes());
            }
        }
    }
    hasher.finalize().into()
}
