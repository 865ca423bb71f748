//! Machine edits turned into text edits over fixture sources.

use statelit::edit::ActionLocation;
use statelit::{
    apply_text_edits, parse_source, ActionPath, EditError, Flavor, LensConfig, MachineEdit, SourceFile,
    TransitionPath, TransitionSlot,
};

use crate::common::{load, path};

fn on(event: &str, index: usize) -> TransitionPath {
    TransitionPath::new(
        TransitionSlot::On {
            event: event.to_string(),
        },
        index,
    )
}

fn edited(file: &SourceFile, edits: &[MachineEdit]) -> String {
    let text_edits = file.edit(0, edits, &LensConfig::default()).unwrap();
    apply_text_edits(&file.text, &text_edits).unwrap()
}

/// Re-parse `text` and check that its digraph has the given state paths.
fn assert_paths(text: &str, expected: &[&str]) {
    let file = parse_source(text, statelit::Dialect::TypeScript, &LensConfig::default()).unwrap();
    let result = file.extract(0).unwrap();
    let paths: Vec<String> = result.digraph.nodes.iter().map(|n| n.path.join(".")).collect();
    assert_eq!(paths, expected, "{text}");
}

#[test]
fn test_no_edits_is_identity() {
    let file = load("fetch.ts");
    let text_edits = file.edit(0, &[], &LensConfig::default()).unwrap();
    assert!(text_edits.is_empty());
}

#[test]
fn test_entry_promotes_to_array() {
    let file = load("fetch.ts");
    let out = edited(
        &file,
        &[MachineEdit::AddAction {
            path: ActionPath::entry(path(&["loading"]), 1),
            name: "notify".into(),
        }],
    );
    assert!(out.contains("entry: ['logStart', 'notify'],"), "{out}");
}

#[test]
fn test_entry_demotes_back_to_bare_value() {
    let src = "createMachine({\n  entry: ['a', 'b'],\n});";
    let file = parse_source(src, statelit::Dialect::TypeScript, &LensConfig::default()).unwrap();
    let out = edited(
        &file,
        &[MachineEdit::RemoveAction {
            path: ActionPath::entry(vec![], 0),
        }],
    );
    assert_eq!(out, "createMachine({\n  entry: 'b',\n});");
}

#[test]
fn test_rename_propagates_to_references() {
    let file = load("fetch.ts");
    let out = edited(
        &file,
        &[MachineEdit::RenameState {
            path: path(&["loading"]),
            name: "fetching".into(),
        }],
    );
    assert!(out.contains("    fetching: {\n"), "{out}");
    assert!(out.contains("on: { FETCH: 'fetching' },"), "{out}");
    assert!(out.contains("RETRY: { target: 'fetching', guard: 'canRetry' },"), "{out}");
    assert!(!out.contains("loading"), "{out}");
    assert_paths(&out, &["", "idle", "fetching", "success", "failure"]);
}

#[test]
fn test_id_anchored_reference_survives_rename() {
    let src = "createMachine({\n  states: {\n    a: { on: { GO: '#home' } },\n    b: { id: 'home' },\n  },\n});";
    let file = parse_source(src, statelit::Dialect::TypeScript, &LensConfig::default()).unwrap();
    let out = edited(
        &file,
        &[MachineEdit::RenameState {
            path: path(&["b"]),
            name: "start".into(),
        }],
    );
    assert_eq!(
        out,
        "createMachine({\n  states: {\n    a: { on: { GO: '#home' } },\n    start: { id: 'home' },\n  },\n});"
    );
}

#[test]
fn test_guard_removal_collapses_transition() {
    let file = load("fetch.ts");
    let out = edited(
        &file,
        &[MachineEdit::RemoveGuard {
            source: path(&["failure"]),
            transition: on("RETRY", 0),
        }],
    );
    assert!(out.contains("        RETRY: 'loading',\n"), "{out}");
}

#[test]
fn test_guard_keyword_follows_flavor() {
    let traffic = load("traffic.js");
    let out = edited(
        &traffic,
        &[MachineEdit::AddGuard {
            source: path(&["green"]),
            transition: on("TIMER", 0),
            name: "isRush".into(),
        }],
    );
    assert!(out.contains("cond: 'isRush'"), "{out}");
    assert!(!out.contains("guard:"), "{out}");

    let fetch = load("fetch.ts");
    let out = edited(
        &fetch,
        &[MachineEdit::AddGuard {
            source: path(&["idle"]),
            transition: on("FETCH", 0),
            name: "isOnline".into(),
        }],
    );
    assert!(out.contains("guard: 'isOnline'"), "{out}");
    assert!(out.contains("target: 'loading'"), "{out}");
}

#[test]
fn test_forced_flavor_overrides_detection() {
    let fetch = load("fetch.ts");
    let mut config = LensConfig::default();
    config.edit.flavor = Flavor::V4;
    let mut editor = fetch.editor(0, &config).unwrap();
    assert_eq!(editor.flavor(), Flavor::V4);
    editor
        .apply(&MachineEdit::AddGuard {
            source: path(&["idle"]),
            transition: on("FETCH", 0),
            name: "isOnline".into(),
        })
        .unwrap();
    assert!(editor.edited_text().unwrap().contains("cond: 'isOnline'"));
}

#[test]
fn test_reparent_rewrites_moved_targets() {
    let file = load("traffic.js");
    let out = edited(
        &file,
        &[MachineEdit::ReparentState {
            path: path(&["red", "stop"]),
            new_parent: vec![],
        }],
    );
    assert_paths(&out, &["", "green", "yellow", "red", "red.walk", "red.wait", "stop"]);

    let file = parse_source(out.as_str(), statelit::Dialect::TypeScript, &LensConfig::default()).unwrap();
    let result = file.extract(0).unwrap();
    assert!(result.errors.is_empty(), "{:?}\n{out}", result.errors);
}

#[test]
fn test_remove_invoke_drops_its_transitions() {
    let file = load("fetch.ts");
    let out = edited(
        &file,
        &[MachineEdit::RemoveInvoke {
            state: path(&["loading"]),
            index: 0,
        }],
    );
    assert!(!out.contains("invoke"), "{out}");
    assert!(!out.contains("fetchData"), "{out}");
    assert!(out.contains("entry: 'logStart',"), "{out}");
}

#[test]
fn test_editor_digraph_matches_reparsed_text() {
    let file = load("fetch.ts");
    let mut editor = file.editor(0, &LensConfig::default()).unwrap();
    editor
        .apply_all(&[
            MachineEdit::AddState {
                parent: vec![],
                name: "cancelled".into(),
            },
            MachineEdit::AddTransition {
                source: path(&["loading"]),
                slot: TransitionSlot::On {
                    event: "CANCEL".into(),
                },
                target: Some(path(&["cancelled"])),
                external: false,
                guard: None,
            },
            MachineEdit::SetInitialState {
                path: vec![],
                initial: Some("loading".into()),
            },
        ])
        .unwrap();

    let out = editor.edited_text().unwrap();
    let reparsed = parse_source(out.as_str(), statelit::Dialect::TypeScript, &LensConfig::default())
        .unwrap()
        .extract(0)
        .unwrap();
    assert!(reparsed.errors.is_empty(), "{:?}\n{out}", reparsed.errors);

    let draft = editor.digraph();
    assert_eq!(reparsed.digraph.nodes.len(), draft.nodes.len());
    assert_eq!(reparsed.digraph.edges.len(), draft.edges.len());
    assert_eq!(reparsed.digraph.root_node().data.initial.as_deref(), Some("loading"));
}

#[test]
fn test_errors_name_the_missing_piece() {
    let file = load("fetch.ts");
    let mut editor = file.editor(0, &LensConfig::default()).unwrap();

    let err = editor
        .apply(&MachineEdit::RemoveTransition {
            source: path(&["idle"]),
            transition: on("FETCH", 3),
        })
        .unwrap_err();
    assert!(matches!(err, EditError::TransitionNotFound { .. }), "{err}");

    let err = editor
        .apply(&MachineEdit::AddState {
            parent: vec![],
            name: "idle".into(),
        })
        .unwrap_err();
    assert_eq!(
        err,
        EditError::DuplicateState {
            parent: "(root)".into(),
            key: "idle".into(),
        }
    );

    let err = editor
        .apply(&MachineEdit::EditAction {
            path: ActionPath {
                location: ActionLocation::Exit { state: path(&["idle"]) },
                index: 0,
            },
            name: "x".into(),
        })
        .unwrap_err();
    assert!(matches!(err, EditError::ActionNotFound { .. }), "{err}");

    assert_eq!(editor.edited_text().unwrap(), file.text);
}
