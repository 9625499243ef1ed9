use crate::types::{Condition, DenseIndex, Depth, GridPos};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Handles ──────────────────────────────────────────────────

/// Stable generational handle into the graph arena. A handle to a removed
/// node never resolves again, even if the slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    slot: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn slot(self) -> usize {
        self.slot as usize
    }
}

// ─── Nodes and edges ──────────────────────────────────────────

/// What a dialogue node says or does. Proxy nodes name their jump target
/// purely by dense index (the weak-reference pattern).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeKind {
    Speech { speaker: String, text: String },
    Branch,
    Proxy { target: crate::types::NodeRef },
}

/// One dialogue unit in the editable graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DialogueNode {
    /// Stable identity, assigned lazily on first compile, never reassigned
    /// while the node lives.
    pub guid: Option<Uuid>,
    pub kind: NodeKind,
    /// Declared entry point. Roots are tracked separately and never occupy
    /// a slot in the compiled array.
    pub is_root: bool,
    pub position: GridPos,
    /// Dense index from the last compile pass. Only valid right after one.
    pub compiled_index: Option<DenseIndex>,
    /// BFS depth from the nearest root. Authoring aid for auto-layout.
    pub depth: Option<Depth>,
    /// Outgoing edges, in authored order. Order is significant: the BFS
    /// walks edges in stored order, which decides discovery.
    pub edges: Vec<Edge>,
}

impl DialogueNode {
    fn new(kind: NodeKind, position: GridPos, is_root: bool) -> Self {
        Self {
            guid: None,
            kind,
            is_root,
            position,
            compiled_index: None,
            depth: None,
            edges: Vec::new(),
        }
    }
}

/// Directed edge. `target` is the editor-side handle; `target_index` is the
/// runtime form, rewritten on every compile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Edge {
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_index: Option<DenseIndex>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Primary/secondary categorization bit, set by the compile pass.
    #[serde(default)]
    pub primary: bool,
}

impl Edge {
    fn to(target: NodeId) -> Self {
        Self {
            target,
            target_index: None,
            conditions: Vec::new(),
            primary: false,
        }
    }
}

// ─── The store ────────────────────────────────────────────────

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Slot {
    generation: u32,
    node: Option<DialogueNode>,
}

/// The graph store: an arena of dialogue nodes plus the two compiler
/// outputs — the ordered root list and the compiled node array.
///
/// The compiler reads and mutates this in place; position in `compiled`
/// *is* the node's dense index.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DialogueGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<NodeId>,
    compiled: Vec<NodeId>,
}

impl DialogueGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, node: DialogueNode) -> NodeId {
        if let Some(slot) = self.free.pop() {
            let s = &mut self.slots[slot as usize];
            s.node = Some(node);
            NodeId {
                slot,
                generation: s.generation,
            }
        } else {
            let slot = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                slot,
                generation: 0,
            }
        }
    }

    pub fn add_node(&mut self, kind: NodeKind, position: GridPos) -> NodeId {
        self.insert(DialogueNode::new(kind, position, false))
    }

    /// Add a declared entry point. Root order in the store is authored
    /// order; the compiler re-sorts by horizontal position.
    pub fn add_root(&mut self, position: GridPos) -> NodeId {
        let id = self.insert(DialogueNode::new(NodeKind::Branch, position, true));
        self.roots.push(id);
        id
    }

    /// Remove a node and detach every incoming edge. The compiled array is
    /// left as-is; the next compile pass rebuilds it.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if self.node(id).is_none() {
            return false;
        }
        for slot in &mut self.slots {
            if let Some(node) = slot.node.as_mut() {
                node.edges.retain(|e| e.target != id);
            }
        }
        self.roots.retain(|&r| r != id);
        let s = &mut self.slots[id.slot()];
        s.node = None;
        s.generation = s.generation.wrapping_add(1);
        self.free.push(id.slot);
        true
    }

    pub fn node(&self, id: NodeId) -> Option<&DialogueNode> {
        let s = self.slots.get(id.slot())?;
        if s.generation != id.generation {
            return None;
        }
        s.node.as_ref()
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut DialogueNode> {
        let s = self.slots.get_mut(id.slot())?;
        if s.generation != id.generation {
            return None;
        }
        s.node.as_mut()
    }

    /// Append an unconditioned edge `from -> to`. Returns false if either
    /// handle is stale.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> bool {
        self.connect_with(from, to, Vec::new())
    }

    /// Append an edge `from -> to` carrying enter conditions.
    pub fn connect_with(&mut self, from: NodeId, to: NodeId, conditions: Vec<Condition>) -> bool {
        if self.node(to).is_none() {
            return false;
        }
        match self.node_mut(from) {
            Some(node) => {
                let mut edge = Edge::to(to);
                edge.conditions = conditions;
                node.edges.push(edge);
                true
            }
            None => false,
        }
    }

    /// Remove the first edge `from -> to`, if any.
    pub fn disconnect(&mut self, from: NodeId, to: NodeId) -> bool {
        if let Some(node) = self.node_mut(from) {
            if let Some(pos) = node.edges.iter().position(|e| e.target == to) {
                node.edges.remove(pos);
                return true;
            }
        }
        false
    }

    /// Declared roots, in stored order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// The compiled node array from the last pass. Position is dense index.
    pub fn compiled(&self) -> &[NodeId] {
        &self.compiled
    }

    /// Live nodes in stable arena order (the compiler's deterministic
    /// iteration order), roots included.
    pub fn iter_live(&self) -> impl Iterator<Item = (NodeId, &DialogueNode)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.node.as_ref().map(|n| {
                (
                    NodeId {
                        slot: i as u32,
                        generation: s.generation,
                    },
                    n,
                )
            })
        })
    }

    /// Number of live non-root nodes — the compiled array population.
    pub fn node_count(&self) -> usize {
        self.iter_live().filter(|(_, n)| !n.is_root).count()
    }

    /// Count of live edges targeting `id`.
    pub fn incoming_count(&self, id: NodeId) -> usize {
        self.iter_live()
            .flat_map(|(_, n)| n.edges.iter())
            .filter(|e| e.target == id)
            .count()
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Compiler output: the canonical ordered node array.
    pub fn set_compiled(&mut self, order: Vec<NodeId>) {
        self.compiled = order;
    }

    /// Compiler output: roots in compile order (sorted by position).
    pub fn set_roots(&mut self, order: Vec<NodeId>) {
        self.roots = order;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_never_resolves() {
        let mut g = DialogueGraph::new();
        let a = g.add_node(NodeKind::Branch, GridPos::default());
        assert!(g.remove_node(a));
        assert!(g.node(a).is_none());

        // Slot reuse must not resurrect the old handle.
        let b = g.add_node(NodeKind::Branch, GridPos::default());
        assert!(g.node(a).is_none());
        assert!(g.node(b).is_some());
        assert_ne!(a, b);
    }

    #[test]
    fn remove_detaches_incoming_edges() {
        let mut g = DialogueGraph::new();
        let a = g.add_node(NodeKind::Branch, GridPos::default());
        let b = g.add_node(NodeKind::Branch, GridPos::default());
        assert!(g.connect(a, b));
        assert_eq!(g.incoming_count(b), 1);

        assert!(g.remove_node(b));
        assert!(g.node(a).unwrap().edges.is_empty());
    }

    #[test]
    fn connect_rejects_stale_handles() {
        let mut g = DialogueGraph::new();
        let a = g.add_node(NodeKind::Branch, GridPos::default());
        let b = g.add_node(NodeKind::Branch, GridPos::default());
        g.remove_node(b);
        assert!(!g.connect(a, b));
        assert!(!g.connect(b, a));
    }

    #[test]
    fn removing_a_root_drops_it_from_the_root_list() {
        let mut g = DialogueGraph::new();
        let r = g.add_root(GridPos::new(0, 0));
        assert_eq!(g.roots(), &[r]);
        g.remove_node(r);
        assert!(g.roots().is_empty());
    }
}
