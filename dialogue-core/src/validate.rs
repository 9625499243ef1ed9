//! Standalone graph audit for content tooling.
//!
//! Dangling weak references survive compilation on purpose (the compiler
//! leaves them untouched and only warns); this is the tooling that
//! surfaces them, plus general store integrity, to the author. Returns
//! every finding rather than stopping at the first.

use crate::graph::{DialogueGraph, NodeKind};
use crate::types::NodeRef;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub rule: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

/// Audit a graph, typically right after a compile pass.
///
/// - V1: GUIDs must be unique across live nodes.
/// - V2: edge target handles must resolve to live nodes.
/// - V3: weak-reference indices must fall inside the compiled array.
/// - V4: a weak reference's stored GUID must match the node now at its index.
/// - V5: edges must not target declared roots.
/// - V6: the root list must hold live, root-flagged nodes.
pub fn validate_graph(graph: &DialogueGraph) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    // V1
    let mut guid_owners: HashMap<Uuid, usize> = HashMap::new();
    for (_, node) in graph.iter_live() {
        if let Some(guid) = node.guid {
            *guid_owners.entry(guid).or_insert(0) += 1;
        }
    }
    for (guid, count) in guid_owners {
        if count > 1 {
            issues.push(ValidationIssue {
                rule: "V1".to_string(),
                message: format!("GUID {guid} is carried by {count} nodes"),
            });
        }
    }

    for (id, node) in graph.iter_live() {
        for (ei, edge) in node.edges.iter().enumerate() {
            match graph.node(edge.target) {
                None => issues.push(ValidationIssue {
                    rule: "V2".to_string(),
                    message: format!("edge {ei} of {id:?} targets a node that no longer exists"),
                }),
                Some(t) if t.is_root => issues.push(ValidationIssue {
                    rule: "V5".to_string(),
                    message: format!("edge {ei} of {id:?} targets a root node"),
                }),
                Some(_) => {}
            }
            for condition in &edge.conditions {
                check_weak_ref(
                    graph,
                    condition.node_ref(),
                    &format!("condition on edge {ei} of {id:?}"),
                    &mut issues,
                );
            }
        }
        if let NodeKind::Proxy { target } = &node.kind {
            check_weak_ref(graph, target, &format!("proxy node {id:?}"), &mut issues);
        }
    }

    // V6
    for &root in graph.roots() {
        match graph.node(root) {
            None => issues.push(ValidationIssue {
                rule: "V6".to_string(),
                message: format!("root list entry {root:?} no longer exists"),
            }),
            Some(n) if !n.is_root => issues.push(ValidationIssue {
                rule: "V6".to_string(),
                message: format!("root list entry {root:?} is not flagged as a root"),
            }),
            Some(_) => {}
        }
    }

    issues
}

fn check_weak_ref(
    graph: &DialogueGraph,
    reference: &NodeRef,
    context: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let occupant = graph
        .compiled()
        .get(reference.index as usize)
        .and_then(|&id| graph.node(id));
    match occupant {
        None => issues.push(ValidationIssue {
            rule: "V3".to_string(),
            message: format!(
                "{context}: index {} is outside the compiled array",
                reference.index
            ),
        }),
        Some(node) => {
            if let (Some(stored), Some(actual)) = (reference.guid, node.guid) {
                if stored != actual {
                    issues.push(ValidationIssue {
                        rule: "V4".to_string(),
                        message: format!(
                            "{context}: index {} now names node {actual}, reference expected {stored}",
                            reference.index
                        ),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::graph::{DialogueGraph, NodeKind};
    use crate::types::{Condition, GridPos, NodeRef};

    fn compiled_pair() -> (DialogueGraph, crate::graph::NodeId, crate::graph::NodeId) {
        let mut g = DialogueGraph::new();
        let r = g.add_root(GridPos::default());
        let a = g.add_node(NodeKind::Branch, GridPos::default());
        let b = g.add_node(NodeKind::Branch, GridPos::default());
        g.connect(r, a);
        g.connect(a, b);
        Compiler::new().compile(&mut g).unwrap();
        (g, a, b)
    }

    #[test]
    fn clean_compiled_graph_validates() {
        let (g, _, _) = compiled_pair();
        assert!(validate_graph(&g).is_empty());
    }

    #[test]
    fn v1_duplicate_guids() {
        let (mut g, a, b) = compiled_pair();
        let guid = g.node(a).unwrap().guid;
        g.node_mut(b).unwrap().guid = guid;
        let issues = validate_graph(&g);
        assert!(issues.iter().any(|i| i.rule == "V1"));
    }

    #[test]
    fn v3_out_of_range_weak_ref() {
        let (mut g, a, b) = compiled_pair();
        g.disconnect(a, b);
        g.connect_with(
            a,
            b,
            vec![Condition::NodeVisited {
                node: NodeRef::new(99),
            }],
        );
        let issues = validate_graph(&g);
        assert!(issues.iter().any(|i| i.rule == "V3"));
    }

    #[test]
    fn v4_guid_mismatch() {
        let (mut g, a, b) = compiled_pair();
        let wrong = uuid::Uuid::now_v7();
        g.disconnect(a, b);
        g.connect_with(
            a,
            b,
            vec![Condition::NodeVisited {
                node: NodeRef {
                    index: 0,
                    guid: Some(wrong),
                },
            }],
        );
        let issues = validate_graph(&g);
        assert!(issues.iter().any(|i| i.rule == "V4"));
    }

    #[test]
    fn v5_edge_into_root() {
        let mut g = DialogueGraph::new();
        let r = g.add_root(GridPos::default());
        let a = g.add_node(NodeKind::Branch, GridPos::default());
        g.connect(r, a);
        g.connect(a, r);
        let issues = validate_graph(&g);
        assert!(issues.iter().any(|i| i.rule == "V5"));
    }
}
