//! Target descriptor resolution and emission on extracted machines.

use statelit::resolve::{classify, emit_preserving, emit_target, resolve_target, state_id, DescriptorKind};

use crate::common::load;

#[test]
fn test_descriptor_families() {
    assert_eq!(classify("green"), DescriptorKind::Sibling);
    assert_eq!(classify(".walk"), DescriptorKind::Relative);
    assert_eq!(classify("#light.red"), DescriptorKind::IdAnchored);
}

#[test]
fn test_resolve_in_nested_machine() {
    let g = load("traffic.js").extract(0).unwrap().digraph;
    let walk = g.node_by_path(&["red", "walk"]).unwrap();
    let stop = g.node_by_path(&["red", "stop"]).unwrap();

    assert_eq!(resolve_target(&g, walk, "wait"), g.node_by_path(&["red", "wait"]));
    assert_eq!(resolve_target(&g, walk, "#light.red.stop"), Some(stop));
    assert_eq!(resolve_target(&g, walk, "#light"), Some(g.root));
    assert_eq!(resolve_target(&g, g.root, ".red.stop"), Some(stop));
    assert_eq!(resolve_target(&g, walk, "green"), None);
}

#[test]
fn test_emit_picks_shortest_legal_family() {
    let g = load("traffic.js").extract(0).unwrap().digraph;
    let red = g.node_by_path(&["red"]).unwrap();
    let walk = g.node_by_path(&["red", "walk"]).unwrap();
    let green = g.node_by_path(&["green"]).unwrap();
    let stop = g.node_by_path(&["red", "stop"]).unwrap();

    assert_eq!(emit_target(&g, red, green), "green");
    assert_eq!(emit_target(&g, red, stop), ".stop");
    assert_eq!(emit_target(&g, walk, green), "#light.green");
    assert_eq!(state_id(&g, walk), "light.red.walk");
}

#[test]
fn test_written_descriptors_are_stable() {
    for name in ["fetch.ts", "traffic.js"] {
        let g = load(name).extract(0).unwrap().digraph;
        for edge in &g.edges {
            for (descriptor, target) in edge.target_descriptors.iter().zip(&edge.targets) {
                assert_eq!(resolve_target(&g, edge.source, descriptor), Some(*target));
                assert_eq!(
                    &emit_preserving(&g, edge.source, *target, descriptor),
                    descriptor,
                    "{name}: {descriptor} should be kept as written"
                );
            }
        }
    }
}
