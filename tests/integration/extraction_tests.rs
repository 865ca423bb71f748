//! Discovery and digraph extraction over real machine sources.

use statelit::digraph::{BlockProperties, BlockType, EventTypeData, StateType, TransitionSlot};
use statelit::{extract_files_parallel, Dialect, LensConfig, LensError};

use crate::common::{fixture, load};

// =============================================================================
// Discovery
// =============================================================================

#[test]
fn test_setup_form_is_discovered() {
    let file = load("fetch.ts");
    assert_eq!(file.dialect, Dialect::TypeScript);
    assert_eq!(file.machines.len(), 1);

    let machine = &file.machines[0];
    assert_eq!(machine.callee, "createMachine");
    assert!(machine.setup.is_some(), "setup({{...}}) argument should be captured");
    assert!(machine.options.is_none());
}

#[test]
fn test_commonjs_v4_machine_is_discovered() {
    let file = load("traffic.js");
    assert_eq!(file.machines.len(), 1);
    assert_eq!(file.machines[0].callee, "Machine");
}

#[test]
fn test_tsx_dialect_from_extension() {
    let file = load("broken.tsx");
    assert_eq!(file.dialect, Dialect::Tsx);
    assert_eq!(file.machines.len(), 1, "JSX must not hide the machine call");
}

// =============================================================================
// Digraph shape
// =============================================================================

#[test]
fn test_fetch_digraph() {
    let result = load("fetch.ts").extract(0).unwrap();
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);

    let g = &result.digraph;
    let paths: Vec<String> = g.nodes.iter().map(|n| n.path.join(".")).collect();
    assert_eq!(paths, vec!["", "idle", "loading", "success", "failure"]);
    assert_eq!(g.root_node().data.explicit_id.as_deref(), Some("fetch"));
    assert_eq!(g.root_node().data.initial.as_deref(), Some("idle"));

    let success = g.node_by_path(&["success"]).unwrap();
    assert_eq!(g.node(success).data.state_type, StateType::Final);

    let loading = g.node_by_path(&["loading"]).unwrap();
    let slots: Vec<&TransitionSlot> = g.edges_from(loading).map(|e| &e.path.slot).collect();
    assert_eq!(
        slots,
        vec![
            &TransitionSlot::InvokeDone { invoke: 0 },
            &TransitionSlot::InvokeError { invoke: 0 },
        ]
    );
    let done = g.edges_from(loading).next().unwrap();
    assert_eq!(done.targets, vec![success]);
    assert_eq!(done.data.actions.len(), 1);
    assert!(matches!(done.data.event_type_data, EventTypeData::InvocationDone { .. }));
}

#[test]
fn test_fetch_implementations() {
    let result = load("fetch.ts").extract(0).unwrap();
    let imps = &result.digraph.implementations;

    assert!(imps.actions["logStart"].declared);
    assert!(imps.guards["canRetry"].declared);
    assert!(!imps.actors["fetchData"].declared);

    let inline: Vec<_> = imps.actions.values().filter(|a| a.inline).collect();
    assert_eq!(inline.len(), 1);
    assert_eq!(inline[0].name, "assign");

    let loading = result.digraph.node_by_path(&["loading"]).unwrap();
    let invoke = result.digraph.block(result.digraph.node(loading).data.invoke[0]);
    assert_eq!(invoke.block_type, BlockType::Actor);
    assert_eq!(
        invoke.properties,
        BlockProperties::Actor {
            src: "fetchData".into(),
            id: "fetch.loading:invocation[0]".into(),
        }
    );
}

#[test]
fn test_v4_guard_keyword_is_read() {
    let result = load("traffic.js").extract(0).unwrap();
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let g = &result.digraph;
    assert_eq!(g.nodes.len(), 7);
    let red = g.node_by_path(&["red"]).unwrap();
    let timer = g.edges_from(red).next().unwrap();
    let guard = timer.data.guard.expect("cond should be read as a guard");
    assert_eq!(g.block(guard).source_id, "crossingDone");
    assert_eq!(timer.targets, vec![g.node_by_path(&["green"]).unwrap()]);
}

#[test]
fn test_structural_errors_do_not_abort() {
    let result = load("broken.tsx").extract(0).unwrap();

    let mut kinds: Vec<&str> = result.errors.iter().map(|e| e.kind.as_str()).collect();
    kinds.sort_unstable();
    assert_eq!(
        kinds,
        vec!["property_key_unhandled", "target_unresolved", "transition_property_unhandled"]
    );

    // The rest of the machine is still there.
    let g = &result.digraph;
    assert_eq!(g.nodes.len(), 3);
    let open = g.node_by_path(&["open"]).unwrap();
    let close = g.edges_from(open).next().unwrap();
    assert_eq!(close.targets, vec![g.node_by_path(&["closed"]).unwrap()]);
}

#[test]
fn test_digraph_serializes() {
    let result = load("fetch.ts").extract(0).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["digraph"]["nodes"].as_array().unwrap().len(), 5);
    assert!(json["errors"].as_array().unwrap().is_empty());
}

// =============================================================================
// Batch extraction
// =============================================================================

#[test]
fn test_parallel_extraction_isolates_failures() {
    let paths = vec![fixture("fetch.ts"), fixture("missing.ts"), fixture("traffic.js")];
    let results = extract_files_parallel(&paths, &LensConfig::default());
    assert_eq!(results.len(), 3);

    assert_eq!(results[0].0, paths[0]);
    assert_eq!(results[0].1.as_ref().unwrap()[0].digraph.nodes.len(), 5);
    assert!(matches!(results[1].1, Err(LensError::IoWithPath { .. })));
    assert_eq!(results[2].1.as_ref().unwrap()[0].digraph.nodes.len(), 7);
}
