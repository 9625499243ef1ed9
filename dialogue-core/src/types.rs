use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Scalar aliases ───────────────────────────────────────────

/// Dense index: a node's zero-based position in the compiled node array.
pub type DenseIndex = u32;

/// BFS depth in edges from the nearest root. Authoring aid only.
pub type Depth = u32;

// ─── Layout hint ──────────────────────────────────────────────

/// Editor canvas position. `x` drives root ordering (left-to-right);
/// never affects correctness otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

// ─── Weak reference by index ──────────────────────────────────

/// A node named purely by dense index, without ownership. The GUID is a
/// secondary validation key, re-derived every time the index is remapped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub index: DenseIndex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Uuid>,
}

impl NodeRef {
    pub fn new(index: DenseIndex) -> Self {
        Self { index, guid: None }
    }
}

// ─── Edge payload conditions ──────────────────────────────────

/// Enter condition carried on an edge. Holds index-based weak references
/// into the compiled array, fixed up by the remap pass after every compile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Condition {
    /// True once the referenced node has been traversed at runtime.
    NodeVisited { node: NodeRef },
    /// Negation of `NodeVisited`.
    NodeNotVisited { node: NodeRef },
}

impl Condition {
    pub fn node_ref(&self) -> &NodeRef {
        match self {
            Condition::NodeVisited { node } | Condition::NodeNotVisited { node } => node,
        }
    }

    pub fn node_ref_mut(&mut self) -> &mut NodeRef {
        match self {
            Condition::NodeVisited { node } | Condition::NodeNotVisited { node } => node,
        }
    }
}
