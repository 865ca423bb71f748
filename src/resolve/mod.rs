//! Target descriptor resolution.
//!
//! A transition target can be written three ways:
//!
//! - sibling-relative: `'b'` (or `'b.c'`), looked up from the source's parent
//! - dot-relative: `'.c.d'`, looked up from the source itself
//! - ID-anchored: `'#id'` or `'#id.rest'`, looked up from a state with an id
//!
//! Reading accepts all three. Emitting prefers them in that order and picks
//! the first legal one.

use crate::digraph::{Digraph, NodeId};

/// Implicit id of a root state without an `id` property.
pub const IMPLICIT_ROOT_ID: &str = "(machine)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    Sibling,
    Relative,
    IdAnchored,
}

/// Family of a descriptor as written.
pub fn classify(descriptor: &str) -> DescriptorKind {
    if descriptor.starts_with('#') {
        DescriptorKind::IdAnchored
    } else if descriptor.starts_with('.') {
        DescriptorKind::Relative
    } else {
        DescriptorKind::Sibling
    }
}

/// The root's id: its `id` property, or [`IMPLICIT_ROOT_ID`].
pub fn root_id(graph: &Digraph) -> &str {
    graph
        .root_node()
        .data
        .explicit_id
        .as_deref()
        .unwrap_or(IMPLICIT_ROOT_ID)
}

/// Full id of a state: its `id` property, or the root id followed by the
/// state's path (`(machine).a.b`).
pub fn state_id(graph: &Digraph, node: NodeId) -> String {
    let state = graph.node(node);
    if let Some(id) = &state.data.explicit_id {
        return id.clone();
    }
    if state.path.is_empty() {
        return root_id(graph).to_string();
    }
    format!("{}.{}", root_id(graph), state.path.join("."))
}

fn lookup_id(graph: &Digraph, id: &str) -> Option<NodeId> {
    graph.node_by_explicit_id(id).or_else(|| {
        (graph.root_node().data.explicit_id.is_none() && id == IMPLICIT_ROOT_ID)
            .then_some(graph.root)
    })
}

fn walk<'s>(graph: &Digraph, from: NodeId, segments: impl Iterator<Item = &'s str>) -> Option<NodeId> {
    segments.into_iter().try_fold(from, |cur, key| graph.child_by_key(cur, key))
}

/// Resolve a target descriptor written on `source` to a state.
///
/// Returns `None` for dangling descriptors; callers report them, they never
/// fall back to an unrelated state.
pub fn resolve_target(graph: &Digraph, source: NodeId, descriptor: &str) -> Option<NodeId> {
    match classify(descriptor) {
        DescriptorKind::IdAnchored => {
            let rest = &descriptor[1..];
            if let Some(node) = lookup_id(graph, rest) {
                return Some(node);
            }
            let (id, suffix) = rest.split_once('.')?;
            let anchor = lookup_id(graph, id)?;
            walk(graph, anchor, suffix.split('.'))
        }
        DescriptorKind::Relative => walk(graph, source, descriptor[1..].split('.')),
        DescriptorKind::Sibling => {
            let from = graph.parent(source).unwrap_or(graph.root);
            walk(graph, from, descriptor.split('.'))
        }
    }
}

/// Sibling form, when legal: source is not the root and shares its parent
/// with the target (a self-target qualifies).
pub fn sibling_form(graph: &Digraph, source: NodeId, target: NodeId) -> Option<String> {
    let parent = graph.parent(source)?;
    (graph.parent(target) == Some(parent)).then(|| graph.node(target).data.key.clone())
}

/// Sibling-family text reaching below a sibling (`'b.c'`). Root sources
/// walk from the root itself.
fn sibling_path_form(graph: &Digraph, source: NodeId, target: NodeId) -> Option<String> {
    let base = graph.parent(source).unwrap_or(graph.root);
    if !graph.is_descendant(target, base) {
        return None;
    }
    let depth = graph.node(base).path.len();
    Some(graph.node(target).path[depth..].join("."))
}

/// Dot-relative form, when the target is a strict descendant of the source.
pub fn relative_form(graph: &Digraph, source: NodeId, target: NodeId) -> Option<String> {
    if !graph.is_descendant(target, source) {
        return None;
    }
    let depth = graph.node(source).path.len();
    Some(format!(".{}", graph.node(target).path[depth..].join(".")))
}

/// ID-anchored form using the nearest id found walking up from the target
/// itself. The root always carries an id, implicit or not.
pub fn id_anchored_form(graph: &Digraph, target: NodeId) -> String {
    let anchor = std::iter::once(target)
        .chain(graph.ancestors(target))
        .find(|n| graph.node(*n).data.explicit_id.is_some())
        .unwrap_or(graph.root);
    anchored_at(graph, anchor, target)
}

fn anchored_at(graph: &Digraph, anchor: NodeId, target: NodeId) -> String {
    let id = if anchor == graph.root {
        root_id(graph).to_string()
    } else {
        graph
            .node(anchor)
            .data
            .explicit_id
            .clone()
            .unwrap_or_else(|| state_id(graph, anchor))
    };
    let depth = graph.node(anchor).path.len();
    let suffix = &graph.node(target).path[depth..];
    if suffix.is_empty() {
        format!("#{id}")
    } else {
        format!("#{id}.{}", suffix.join("."))
    }
}

/// Descriptor to write for a new `source -> target` transition.
pub fn emit_target(graph: &Digraph, source: NodeId, target: NodeId) -> String {
    sibling_form(graph, source, target)
        .or_else(|| relative_form(graph, source, target))
        .unwrap_or_else(|| id_anchored_form(graph, target))
}

/// Descriptor to write for an existing target after a structural edit.
///
/// Keeps the family of `previous` (and its anchor, for ID-anchored text)
/// while that is still legal, otherwise falls back to [`emit_target`].
pub fn emit_preserving(graph: &Digraph, source: NodeId, target: NodeId, previous: &str) -> String {
    match classify(previous) {
        DescriptorKind::Sibling => sibling_form(graph, source, target)
            .or_else(|| sibling_path_form(graph, source, target))
            .unwrap_or_else(|| emit_target(graph, source, target)),
        DescriptorKind::Relative => {
            relative_form(graph, source, target).unwrap_or_else(|| emit_target(graph, source, target))
        }
        DescriptorKind::IdAnchored => {
            let rest = &previous[1..];
            if lookup_id(graph, rest) == Some(target) {
                return previous.to_string();
            }
            let anchor_id = rest.split_once('.').map_or(rest, |(id, _)| id);
            match lookup_id(graph, anchor_id) {
                Some(anchor) if graph.is_self_or_descendant(target, anchor) => {
                    anchored_at(graph, anchor, target)
                }
                _ => id_anchored_form(graph, target),
            }
        }
    }
}

/// Whether a transition is internal when no flag is written: it has no
/// targets, or every target is the source or one of its descendants.
pub fn default_internal(graph: &Digraph, source: NodeId, targets: &[NodeId]) -> bool {
    targets
        .iter()
        .all(|t| graph.is_self_or_descendant(*t, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, ExprKind, Property};
    use crate::digraph::extract_config;

    fn state(props: Vec<Property>) -> Expr {
        Expr::object(props)
    }

    fn states(children: Vec<(&str, Expr)>) -> Property {
        Property::new(
            "states",
            Expr::object(
                children
                    .into_iter()
                    .map(|(k, v)| Property::new(k, v))
                    .collect(),
            ),
        )
    }

    fn id(value: &str) -> Property {
        Property::new("id", Expr::synthetic(ExprKind::Str(value.to_string())))
    }

    // root
    //   a
    //     a1 (id: deep)
    //       x
    //         y
    //   b
    fn fixture() -> Digraph {
        let y = state(vec![]);
        let x = state(vec![states(vec![("y", y)])]);
        let a1 = state(vec![id("deep"), states(vec![("x", x)])]);
        let a = state(vec![states(vec![("a1", a1)])]);
        let b = state(vec![]);
        let root = state(vec![states(vec![("a", a), ("b", b)])]);
        extract_config(&root, None, None).digraph
    }

    fn at(graph: &Digraph, path: &[&str]) -> NodeId {
        graph.node_by_path(path).unwrap()
    }

    #[test]
    fn test_resolve_each_family() {
        let g = fixture();
        let a = at(&g, &["a"]);
        assert_eq!(resolve_target(&g, a, "b"), Some(at(&g, &["b"])));
        assert_eq!(resolve_target(&g, a, ".a1.x"), Some(at(&g, &["a", "a1", "x"])));
        assert_eq!(resolve_target(&g, a, "#deep.x.y"), Some(at(&g, &["a", "a1", "x", "y"])));
        assert_eq!(resolve_target(&g, a, "#(machine).b"), Some(at(&g, &["b"])));
        assert_eq!(resolve_target(&g, a, "missing"), None);
        assert_eq!(resolve_target(&g, a, "#nope.b"), None);
    }

    #[test]
    fn test_root_sources_resolve_from_root() {
        let g = fixture();
        assert_eq!(resolve_target(&g, g.root, "a.a1"), Some(at(&g, &["a", "a1"])));
    }

    #[test]
    fn test_emit_prefers_sibling_then_relative() {
        let g = fixture();
        let a = at(&g, &["a"]);
        assert_eq!(emit_target(&g, a, at(&g, &["b"])), "b");
        assert_eq!(emit_target(&g, a, a), "a");
        assert_eq!(emit_target(&g, g.root, at(&g, &["a", "a1", "x", "y"])), ".a.a1.x.y");
    }

    #[test]
    fn test_emit_uses_nearest_id() {
        let g = fixture();
        let b = at(&g, &["b"]);
        assert_eq!(emit_target(&g, b, at(&g, &["a", "a1", "x", "y"])), "#deep.x.y");
        assert_eq!(emit_target(&g, b, at(&g, &["a", "a1"])), "#deep");
        let y = at(&g, &["a", "a1", "x", "y"]);
        assert_eq!(emit_target(&g, y, at(&g, &["b"])), "#(machine).b");
    }

    #[test]
    fn test_emit_preserving_keeps_anchor() {
        let g = fixture();
        let b = at(&g, &["b"]);
        let y = at(&g, &["a", "a1", "x", "y"]);
        assert_eq!(emit_preserving(&g, b, y, "#(machine).a.a1.x.y"), "#(machine).a.a1.x.y");
        assert_eq!(emit_preserving(&g, b, y, "#gone.x.y"), "#deep.x.y");
        // Sibling text keeps its family by walking down from the parent.
        assert_eq!(emit_preserving(&g, b, y, "y"), "a.a1.x.y");
        let a1 = at(&g, &["a", "a1"]);
        assert_eq!(emit_preserving(&g, a1, b, "q"), "#(machine).b");
    }

    #[test]
    fn test_default_internal() {
        let g = fixture();
        let a = at(&g, &["a"]);
        assert!(default_internal(&g, a, &[]));
        assert!(default_internal(&g, a, &[a, at(&g, &["a", "a1"])]));
        assert!(!default_internal(&g, a, &[at(&g, &["b"])]));
    }

    #[test]
    fn test_state_id() {
        let g = fixture();
        assert_eq!(state_id(&g, g.root), "(machine)");
        assert_eq!(state_id(&g, at(&g, &["a"])), "(machine).a");
        assert_eq!(state_id(&g, at(&g, &["a", "a1"])), "deep");
    }
}
