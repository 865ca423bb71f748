//! Patch batches reconciled against fixture machines.

use statelit::patch::{BlockOwner, DescriptionOwner};
use statelit::{apply_text_edits, BlockId, EdgeId, LensConfig, NodeId, Patch, PatchError, Reconciler, TransitionSlot};

use crate::common::load;

fn edge_by_event(file: &statelit::SourceFile, event: &str) -> EdgeId {
    let result = file.extract(0).unwrap();
    result
        .digraph
        .edges
        .iter()
        .find(|e| e.path.slot == TransitionSlot::On { event: event.into() })
        .map(|e| e.unique_id)
        .unwrap()
}

fn node(file: &statelit::SourceFile, keys: &[&str]) -> NodeId {
    file.extract(0).unwrap().digraph.node_by_path(keys).unwrap()
}

fn patched(file: &statelit::SourceFile, patches: &[Patch]) -> String {
    let edits = file.reconcile(0, patches, &LensConfig::default()).unwrap();
    apply_text_edits(&file.text, &edits).unwrap()
}

#[test]
fn test_empty_batch_changes_nothing() {
    let file = load("fetch.ts");
    assert!(file.reconcile(0, &[], &LensConfig::default()).unwrap().is_empty());
}

#[test]
fn test_batch_order_does_not_matter() {
    let file = load("fetch.ts");
    let root = node(&file, &[]);
    let loading = node(&file, &["loading"]);
    let retry = edge_by_event(&file, "RETRY");

    let batch = vec![
        Patch::AddEdge {
            edge: EdgeId(100),
            source: loading,
            targets: vec![NodeId(100)],
            slot: TransitionSlot::On {
                event: "CANCEL".into(),
            },
            internal: None,
        },
        Patch::ReplaceNodeKey {
            node: loading,
            key: "fetching".into(),
        },
        Patch::AddNode {
            node: NodeId(100),
            parent: root,
            key: "cancelled".into(),
        },
        Patch::RemoveEdge { edge: retry },
    ];
    let mut reversed = batch.clone();
    reversed.reverse();
    let mut duplicated = batch.clone();
    duplicated.push(batch[1].clone());

    let config = LensConfig::default();
    let first = file.reconcile(0, &batch, &config).unwrap();
    assert_eq!(first, file.reconcile(0, &reversed, &config).unwrap());
    assert_eq!(first, file.reconcile(0, &duplicated, &config).unwrap());

    let out = apply_text_edits(&file.text, &first).unwrap();
    assert!(out.contains("    fetching: {\n"), "{out}");
    assert!(out.contains("CANCEL: 'cancelled'"), "{out}");
    assert!(out.contains("    cancelled: {},\n"), "{out}");
    assert!(!out.contains("RETRY"), "{out}");
}

#[test]
fn test_removing_guard_block_collapses_transition() {
    let file = load("fetch.ts");
    let graph = file.extract(0).unwrap().digraph;
    let retry = graph.edge(edge_by_event(&file, "RETRY"));
    let guard = retry.data.guard.unwrap();

    let out = patched(&file, &[Patch::RemoveBlock { block: guard }]);
    assert!(out.contains("        RETRY: 'loading',\n"), "{out}");
}

#[test]
fn test_block_patches_edit_action_lists() {
    let file = load("fetch.ts");
    let loading = node(&file, &["loading"]);
    let graph = file.extract(0).unwrap().digraph;
    let log_start = graph.node(loading).data.entry[0];

    let out = patched(
        &file,
        &[
            Patch::AddBlock {
                block: BlockId(200),
                owner: BlockOwner::Entry { node: loading },
                index: None,
                source_id: "notify".into(),
            },
            Patch::ReplaceBlockSource {
                block: log_start,
                source_id: "logBegin".into(),
            },
        ],
    );
    assert!(out.contains("entry: ['logBegin', 'notify'],"), "{out}");
}

#[test]
fn test_node_attribute_patches() {
    let file = load("traffic.js");
    let red = node(&file, &["red"]);
    let stop = node(&file, &["red", "stop"]);
    let timer = file
        .extract(0)
        .unwrap()
        .digraph
        .edges_from(red)
        .next()
        .unwrap()
        .unique_id;

    let out = patched(
        &file,
        &[
            Patch::ReplaceNodeInitial {
                node: red,
                initial: Some("wait".into()),
            },
            Patch::ReplaceNodeId {
                node: stop,
                id: Some("halt".into()),
            },
            Patch::ReplaceDescription {
                owner: DescriptionOwner::Edge(timer),
                description: Some("back to green".into()),
            },
        ],
    );
    assert!(out.contains("initial: 'wait',"), "{out}");
    assert!(out.contains("id: 'halt'"), "{out}");
    assert!(out.contains("description: 'back to green'"), "{out}");
}

#[test]
fn test_patches_from_json() {
    let file = load("traffic.js");
    let green = node(&file, &["green"]);
    let json = format!(
        r#"[{{"op":"add_node","node":50,"parent":0,"key":"blinking"}},
            {{"op":"add_edge","edge":50,"source":{},"targets":[50],"slot":{{"type":"on","event":"FAULT"}}}}]"#,
        green.0
    );
    let patches: Vec<Patch> = serde_json::from_str(&json).unwrap();
    let out = patched(&file, &patches);
    assert!(out.contains("blinking: {}"), "{out}");
    assert!(out.contains("FAULT: 'blinking'"), "{out}");
}

#[test]
fn test_reconciler_reports_translated_edits() {
    let file = load("fetch.ts");
    let idle = node(&file, &["idle"]);
    let mut reconciler = Reconciler::new(&file.text, &file.machines[0], &LensConfig::default());
    let edits = reconciler
        .apply(&[Patch::ReplaceNodeKey {
            node: idle,
            key: "waiting".into(),
        }])
        .unwrap();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].kind(), "rename_state");
    assert!(reconciler.editor().digraph().node_by_path(&["waiting"]).is_some());
}

#[test]
fn test_invalid_batches_are_rejected() {
    let file = load("fetch.ts");
    let config = LensConfig::default();
    let idle = node(&file, &["idle"]);

    let err = file
        .reconcile(0, &[Patch::RemoveBlock { block: BlockId(999) }], &config)
        .unwrap_err();
    assert!(matches!(err, statelit::LensError::Patch(PatchError::UnknownBlock(BlockId(999)))));

    let cyclic = [
        Patch::AddNode {
            node: NodeId(70),
            parent: NodeId(71),
            key: "x".into(),
        },
        Patch::AddNode {
            node: NodeId(71),
            parent: NodeId(70),
            key: "y".into(),
        },
    ];
    let err = file.reconcile(0, &cyclic, &config).unwrap_err();
    assert!(matches!(err, statelit::LensError::Patch(PatchError::CyclicParent(_))), "{err}");

    let clash = [Patch::ReplaceNodeKey {
        node: idle,
        key: "loading".into(),
    }];
    let err = file.reconcile(0, &clash, &config).unwrap_err();
    assert!(
        matches!(
            err,
            statelit::LensError::Patch(PatchError::Edit {
                op: "replace_node_key",
                ..
            })
        ),
        "{err}"
    );
}
