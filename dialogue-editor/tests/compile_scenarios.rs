//! End-to-end compile scenarios through the editor session.

use dialogue_core::diagnostics::{W_DANGLING, W_EDGE_TO_ROOT};
use dialogue_core::validate::validate_graph;
use dialogue_core::{Condition, DialogueGraph, GridPos, NodeId, NodeKind, NodeRef};
use dialogue_editor::{EditorSession, VisitHistory};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn speech(graph: &mut DialogueGraph, text: &str) -> NodeId {
    graph.add_node(
        NodeKind::Speech {
            speaker: "npc".to_string(),
            text: text.to_string(),
        },
        GridPos::default(),
    )
}

fn index_of(graph: &DialogueGraph, id: NodeId) -> u32 {
    graph.node(id).unwrap().compiled_index.unwrap()
}

fn proxy_target(graph: &DialogueGraph, id: NodeId) -> NodeRef {
    match &graph.node(id).unwrap().kind {
        NodeKind::Proxy { target } => target.clone(),
        other => panic!("expected a proxy node, got {other:?}"),
    }
}

#[test]
fn diamond_lists_the_merge_node_once_with_expected_categorization() {
    init_logging();
    let mut session = EditorSession::new();
    let g = session.graph_mut();
    let r = g.add_root(GridPos::default());
    let a = speech(g, "a");
    let b = speech(g, "b");
    g.connect(r, a);
    g.connect(r, b);
    g.connect(a, b);

    let output = session.compile().unwrap();

    let g = session.graph();
    assert_eq!(output.node_count, 2);
    assert_eq!(g.compiled().iter().filter(|&&id| id == b).count(), 1);
    // R->B is discovered before A->B, so it is the primary route to B.
    assert!(g.node(r).unwrap().edges[1].primary);
    assert!(!g.node(a).unwrap().edges[0].primary);
}

#[test]
fn root_subtrees_compile_left_to_right() {
    init_logging();
    let mut session = EditorSession::new();
    let g = session.graph_mut();
    let right = g.add_root(GridPos::new(100, 0));
    let left = g.add_root(GridPos::new(50, 0));
    let under_right = speech(g, "right");
    let under_left = speech(g, "left");
    g.connect(right, under_right);
    g.connect(left, under_left);

    session.compile().unwrap();

    let g = session.graph();
    assert_eq!(index_of(g, under_left), 0);
    assert_eq!(index_of(g, under_right), 1);
}

#[test]
fn isolated_self_loop_is_absorbed_via_the_cyclic_orphan_branch() {
    init_logging();
    let mut session = EditorSession::new();
    let g = session.graph_mut();
    let r = g.add_root(GridPos::default());
    let a = speech(g, "attached");
    g.connect(r, a);
    let loner = speech(g, "loner");
    g.connect(loner, loner);

    let output = session.compile().unwrap();

    let g = session.graph();
    assert_eq!(output.node_count, 2);
    let idx = index_of(g, loner);
    assert_eq!(g.node(loner).unwrap().edges[0].target_index, Some(idx));
}

#[test]
fn deletion_mid_edit_leaves_stale_references_flagged_not_fixed() {
    init_logging();
    let mut session = EditorSession::new();

    // Chain r -> n0 .. -> n5, plus an extra node conditioned on n5.
    let mut nodes = Vec::new();
    let extra = {
        let g = session.graph_mut();
        let r = g.add_root(GridPos::default());
        let mut prev = r;
        for i in 0..6 {
            let n = speech(g, &format!("n{i}"));
            g.connect(prev, n);
            nodes.push(n);
            prev = n;
        }
        let extra = speech(g, "conditioned");
        g.connect(prev, extra);
        extra
    };
    session.compile().unwrap();
    assert_eq!(index_of(session.graph(), nodes[5]), 5);

    // Condition on the last edge referencing the node at index 5.
    let guid5 = session.graph().node(nodes[5]).unwrap().guid;
    {
        let g = session.graph_mut();
        g.disconnect(nodes[5], extra);
        g.connect_with(
            nodes[5],
            extra,
            vec![Condition::NodeVisited {
                node: NodeRef {
                    index: 5,
                    guid: guid5,
                },
            }],
        );
    }
    session.compile().unwrap();

    // Delete the node at index 5; indices compact; the condition's old
    // index has no remap entry and must stay 5, flagged by diagnostics.
    let mut history = VisitHistory::new();
    history.record(NodeRef {
        index: 5,
        guid: guid5,
    });
    // The condition now lives on an edge of nodes[4] (nodes[5] is gone,
    // taking its edge along) — rebuild it there inside the same batch.
    let (_, output) = session
        .batch(&mut [&mut history], |g| {
            g.remove_node(nodes[5]);
            g.connect_with(
                nodes[4],
                extra,
                vec![Condition::NodeVisited {
                    node: NodeRef {
                        index: 5,
                        guid: guid5,
                    },
                }],
            );
        })
        .unwrap();

    assert!(output.diagnostics.has_rule(W_DANGLING));
    assert!(history.contains_index(5));
    let g = session.graph();
    // remove_node detached n4's old outgoing edge, so the rebuilt
    // conditioned edge is its only one.
    let condition = g.node(nodes[4]).unwrap().edges[0].conditions[0].clone();
    assert_eq!(condition.node_ref().index, 5);
    assert_eq!(condition.node_ref().guid, guid5);
    // The stale reference is exactly what the audit tooling reports.
    let issues = validate_graph(g);
    assert!(issues.iter().any(|i| i.rule == "V4" || i.rule == "V3"));
}

#[test]
fn visit_history_follows_reindexing() {
    init_logging();
    let mut session = EditorSession::new();
    let (r, a, b) = {
        let g = session.graph_mut();
        let r = g.add_root(GridPos::default());
        let a = speech(g, "a");
        let b = speech(g, "b");
        g.connect(r, a);
        g.connect(a, b);
        (r, a, b)
    };
    session.compile().unwrap();
    assert_eq!(index_of(session.graph(), b), 1);

    let mut history = VisitHistory::new();
    history.record(NodeRef {
        index: 1,
        guid: session.graph().node(b).unwrap().guid,
    });

    // Reconnect b directly under the root and drop a: b compacts to 0.
    let (_, output) = session
        .batch(&mut [&mut history], |g| {
            g.connect(r, b);
            g.remove_node(a);
        })
        .unwrap();

    assert_eq!(output.remap.get(1), Some(0));
    assert!(history.contains_index(0));
    assert_eq!(history.entries()[0].guid, session.graph().node(b).unwrap().guid);
}

#[test]
fn proxy_and_condition_references_follow_reindexing() {
    init_logging();
    let mut session = EditorSession::new();
    let (r, a, b) = {
        let g = session.graph_mut();
        let r = g.add_root(GridPos::default());
        let a = speech(g, "a");
        let b = speech(g, "b");
        g.connect(r, a);
        g.connect(a, b);
        (r, a, b)
    };
    session.compile().unwrap();
    assert_eq!(index_of(session.graph(), b), 1);
    let guid_b = session.graph().node(b).unwrap().guid;

    // A jump node and an enter condition, both naming b purely by index.
    let jump = {
        let g = session.graph_mut();
        let jump = g.add_node(
            NodeKind::Proxy {
                target: NodeRef {
                    index: 1,
                    guid: guid_b,
                },
            },
            GridPos::default(),
        );
        g.connect_with(
            r,
            jump,
            vec![Condition::NodeVisited {
                node: NodeRef {
                    index: 1,
                    guid: guid_b,
                },
            }],
        );
        jump
    };

    // The jump node is discovered ahead of b and claims index 1, pushing
    // b to 2: both weak references must follow and re-derive b's GUID.
    let output = session.compile().unwrap();
    assert!(!output.diagnostics.has_rule(W_DANGLING));
    assert_eq!(output.remap.get(1), Some(2));
    assert_eq!(index_of(session.graph(), b), 2);
    let target = proxy_target(session.graph(), jump);
    assert_eq!(target.index, 2);
    assert_eq!(target.guid, guid_b);
    let condition = session.graph().node(r).unwrap().edges[1].conditions[0].clone();
    assert_eq!(condition.node_ref().index, 2);
    assert_eq!(condition.node_ref().guid, guid_b);

    // Deleting a orphans b and compacts indices again; the references
    // keep tracking it.
    let (_, output) = session
        .batch(&mut [], |g| {
            g.remove_node(a);
        })
        .unwrap();
    assert!(!output.diagnostics.has_rule(W_DANGLING));
    assert_eq!(index_of(session.graph(), b), 1);
    let target = proxy_target(session.graph(), jump);
    assert_eq!(target.index, 1);
    assert_eq!(target.guid, guid_b);
    let condition = session.graph().node(r).unwrap().edges[0].conditions[0].clone();
    assert_eq!(condition.node_ref().index, 1);
    assert_eq!(condition.node_ref().guid, guid_b);
}

#[test]
fn recompile_without_edits_is_fully_idempotent() {
    init_logging();
    let mut session = EditorSession::new();
    {
        let g = session.graph_mut();
        let r = g.add_root(GridPos::default());
        let a = speech(g, "a");
        let b = speech(g, "b");
        g.connect(r, a);
        g.connect(r, b);
        g.connect(a, b);
        g.connect(b, a);
    }
    let first = session.compile().unwrap();
    let order: Vec<NodeId> = session.graph().compiled().to_vec();
    let second = session.compile().unwrap();

    assert_eq!(session.graph().compiled(), order.as_slice());
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(second.remap.changed().count(), 0);
}

#[test]
fn edge_into_a_root_is_surfaced_as_a_warning() {
    init_logging();
    let mut session = EditorSession::new();
    {
        let g = session.graph_mut();
        let r = g.add_root(GridPos::default());
        let a = speech(g, "a");
        g.connect(r, a);
        g.connect(a, r);
    }
    let output = session.compile().unwrap();
    assert!(output.diagnostics.has_rule(W_EDGE_TO_ROOT));
}
