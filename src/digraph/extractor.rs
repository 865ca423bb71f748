//! Digraph extraction from a configuration literal.
//!
//! Two phases:
//! 1. a pre-order walk over `states` creating nodes, then for each node its
//!    blocks and edges, recording target descriptors as raw text
//! 2. target resolution once every node exists, so forward references work
//!
//! Unrecognised shapes never abort the walk; they become
//! [`StructuralError`]s and the property is treated as absent.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use super::errors::{StructuralError, StructuralErrorKind};
use super::types::*;
use crate::ast::{get_value, Expr, ExprKind, Property, Span};
use crate::combinator::shapes::{
    implementation_parser, ImplementationKind, ImplementationRef, MaybeArrayOf, StringLiteral,
    TransitionItem, TransitionItemParser,
};
use crate::combinator::{ExprParser, ParseContext, Union};
use crate::resolve::{resolve_target, root_id};

use StructuralErrorKind::*;

/// Keys with meaning on a state node.
const STATE_KEYS: &[&str] = &[
    "id", "type", "history", "initial", "states", "entry", "onEntry", "exit", "onExit", "invoke",
    "on", "always", "after", "onDone", "tags", "meta", "description", "parallel",
];

/// Keys that are valid on a state (mostly the root) but carry no structure.
const IGNORED_STATE_KEYS: &[&str] = &[
    "context",
    "schema",
    "tsTypes",
    "types",
    "predictableActionArguments",
    "preserveActionOrder",
    "version",
    "output",
    "data",
    "strict",
    "delimiter",
    "key",
    "activities",
    "systemId",
    "input",
    "target",
];

const TRANSITION_KEYS: &[&str] = &[
    "target", "guard", "cond", "actions", "internal", "reenter", "description", "meta", "in",
];

/// Digraph plus the structural errors found while building it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExtractionResult {
    pub digraph: Digraph,
    pub errors: Vec<StructuralError>,
}

/// Extract the digraph of one machine.
///
/// `options` is the second factory argument and `setup` the argument of an
/// enclosing `setup({...})`; both only feed the `declared` flag of
/// implementation entries.
pub fn extract_config(config: &Expr, options: Option<&Expr>, setup: Option<&Expr>) -> ExtractionResult {
    let mut extractor = Extractor::new(DeclaredNames::collect(options, setup));
    extractor.walk_state(config, String::new(), None, Vec::new());
    let result = extractor.finish();
    debug!(
        nodes = result.digraph.nodes.len(),
        edges = result.digraph.edges.len(),
        blocks = result.digraph.blocks.len(),
        errors = result.errors.len(),
        "extracted machine"
    );
    result
}

/// Named properties reduced to their last occurrence, in source order.
/// Unnamed entries (spreads, computed keys) are kept for reporting.
fn effective_props(props: &[Property]) -> Vec<&Property> {
    props
        .iter()
        .enumerate()
        .filter(|(i, p)| match p.name() {
            Some(name) => !props[i + 1..].iter().any(|q| q.name() == Some(name)),
            None => true,
        })
        .map(|(_, p)| p)
        .collect()
}

fn prop_span(prop: &Property) -> Option<Span> {
    prop.key_span.or_else(|| prop.origin.span())
}

// =============================================================================
// Declared implementation names
// =============================================================================

#[derive(Debug, Default)]
struct DeclaredNames {
    actions: FxHashSet<String>,
    guards: FxHashSet<String>,
    actors: FxHashSet<String>,
}

impl DeclaredNames {
    fn collect(options: Option<&Expr>, setup: Option<&Expr>) -> Self {
        let mut names = Self::default();
        for props in [options, setup].into_iter().flatten().filter_map(Expr::as_object) {
            for (key, kind) in [
                ("actions", BlockType::Action),
                ("guards", BlockType::Guard),
                ("services", BlockType::Actor),
                ("actors", BlockType::Actor),
            ] {
                let Some(section) = get_value(props, key).and_then(Expr::as_object) else {
                    continue;
                };
                let set = names.set_mut(kind);
                set.extend(section.iter().filter_map(|p| p.name().map(str::to_string)));
            }
        }
        names
    }

    fn set_mut(&mut self, kind: BlockType) -> &mut FxHashSet<String> {
        match kind {
            BlockType::Action => &mut self.actions,
            BlockType::Guard => &mut self.guards,
            BlockType::Actor => &mut self.actors,
        }
    }

    fn contains(&self, kind: BlockType, name: &str) -> bool {
        match kind {
            BlockType::Action => self.actions.contains(name),
            BlockType::Guard => self.guards.contains(name),
            BlockType::Actor => self.actors.contains(name),
        }
    }
}

// =============================================================================
// Extractor
// =============================================================================

struct PendingTarget {
    edge: EdgeId,
    descriptor: String,
    span: Option<Span>,
}

struct Extractor<'a> {
    ctx: ParseContext,
    declared: DeclaredNames,
    actions: Union<'a, ImplementationRef<'a>>,
    guards: Union<'a, ImplementationRef<'a>>,
    actors: Union<'a, ImplementationRef<'a>>,
    nodes: Vec<StateNode>,
    edges: Vec<Edge>,
    blocks: Vec<Block>,
    children: Vec<Vec<NodeId>>,
    implementations: Implementations,
    pending: Vec<PendingTarget>,
    errors: Vec<StructuralError>,
    root_id: Option<String>,
}

impl<'a> Extractor<'a> {
    fn new(declared: DeclaredNames) -> Self {
        Self {
            ctx: ParseContext::new(),
            declared,
            actions: implementation_parser(ImplementationKind::Action),
            guards: implementation_parser(ImplementationKind::Guard),
            actors: implementation_parser(ImplementationKind::Actor),
            nodes: Vec::new(),
            edges: Vec::new(),
            blocks: Vec::new(),
            children: Vec::new(),
            implementations: Implementations::default(),
            pending: Vec::new(),
            errors: Vec::new(),
            root_id: None,
        }
    }

    fn error(&mut self, kind: StructuralErrorKind, path: &[String], property: Option<&str>, span: Option<Span>) {
        trace!(kind = kind.as_str(), ?property, "structural error");
        self.errors
            .push(StructuralError::new(kind, path, property, span));
    }

    /// Successor keyword wins over its legacy alias; writing both is
    /// reported.
    fn pick_mixed(
        &mut self,
        lookup: &FxHashMap<&str, &'a Property>,
        legacy: &str,
        successor: &str,
        path: &[String],
    ) -> Option<&'a Property> {
        match (lookup.get(legacy), lookup.get(successor)) {
            (Some(old), Some(new)) => {
                self.error(PropertyMixed, path, Some(legacy), prop_span(old));
                Some(*new)
            }
            (Some(only), None) | (None, Some(only)) => Some(*only),
            (None, None) => None,
        }
    }

    // -------------------------------------------------------------------------
    // States
    // -------------------------------------------------------------------------

    fn walk_state(&mut self, expr: &'a Expr, key: String, parent: Option<NodeId>, path: StatePath) {
        let id = NodeId(self.nodes.len());
        self.nodes.push(StateNode {
            unique_id: id,
            parent_id: parent,
            path: path.clone(),
            span: expr.span(),
            data: NodeData {
                key,
                ..NodeData::default()
            },
        });
        self.children.push(Vec::new());
        if let Some(parent) = parent {
            self.children[parent.0].push(id);
        }

        let Some(props) = expr.as_object() else {
            return;
        };

        let mut lookup: FxHashMap<&str, &'a Property> = FxHashMap::default();
        for prop in effective_props(props) {
            match prop.name() {
                Some(name) if STATE_KEYS.contains(&name) => {
                    lookup.insert(name, prop);
                }
                Some(name) if IGNORED_STATE_KEYS.contains(&name) => {}
                name => self.error(PropertyKeyUnhandled, &path, name, prop_span(prop)),
            }
        }

        self.node_attributes(id, &lookup, &path);

        if let Some(prop) = self.pick_mixed(&lookup, "onEntry", "entry", &path) {
            let blocks = self.action_list(BlockParent::Node(id), &prop.value, &path, "entry");
            self.nodes[id.0].data.entry = blocks;
        }
        if let Some(prop) = self.pick_mixed(&lookup, "onExit", "exit", &path) {
            let blocks = self.action_list(BlockParent::Node(id), &prop.value, &path, "exit");
            self.nodes[id.0].data.exit = blocks;
        }
        if let Some(prop) = lookup.get("invoke") {
            self.invokes(id, &prop.value, &path);
        }

        if let Some(prop) = lookup.get("on") {
            self.event_map(id, &prop.value, &path);
        }
        if let Some(prop) = lookup.get("always") {
            self.transitions(id, TransitionSlot::Always, EventTypeData::Always, &prop.value, &path);
        }
        if let Some(prop) = lookup.get("after") {
            self.delay_map(id, &prop.value, &path);
        }
        if let Some(prop) = lookup.get("onDone") {
            self.transitions(id, TransitionSlot::OnDone, EventTypeData::StateDone, &prop.value, &path);
        }

        if let Some(prop) = lookup.get("states") {
            match prop.value.as_object() {
                Some(children) => {
                    for child in effective_props(children) {
                        let Some(child_key) = child.name() else {
                            self.error(PropertyKeyUnhandled, &path, None, prop_span(child));
                            continue;
                        };
                        if !matches!(child.value.kind, ExprKind::Object(_)) {
                            self.error(StatePropertyUnhandled, &path, Some(child_key), child.value.span());
                            continue;
                        }
                        let mut child_path = path.clone();
                        child_path.push(child_key.to_string());
                        self.walk_state(&child.value, child_key.to_string(), Some(id), child_path);
                    }
                }
                None => self.error(StatePropertyUnhandled, &path, Some("states"), prop.value.span()),
            }
        }
    }

    fn node_attributes(&mut self, id: NodeId, lookup: &FxHashMap<&str, &'a Property>, path: &[String]) {
        let mut data = std::mem::take(&mut self.nodes[id.0].data);

        if let Some(prop) = lookup.get("id") {
            match prop.value.as_str() {
                Some(s) => data.explicit_id = Some(s.to_string()),
                None => self.error(StatePropertyUnhandled, path, Some("id"), prop.value.span()),
            }
        }
        if path.is_empty() {
            self.root_id = data.explicit_id.clone();
        }

        if let Some(prop) = lookup.get("type") {
            match prop.value.as_str().and_then(StateType::from_keyword) {
                Some(t) => data.state_type = t,
                None => self.error(StatePropertyUnhandled, path, Some("type"), prop.value.span()),
            }
        } else if let Some(prop) = lookup.get("parallel") {
            match prop.value.kind {
                ExprKind::Bool(true) => data.state_type = StateType::Parallel,
                ExprKind::Bool(false) => {}
                _ => self.error(StatePropertyUnhandled, path, Some("parallel"), prop.value.span()),
            }
        }

        if let Some(prop) = lookup.get("history") {
            match prop.value.as_str() {
                Some("shallow") => data.history = Some(HistoryType::Shallow),
                Some("deep") => data.history = Some(HistoryType::Deep),
                _ => self.error(StatePropertyUnhandled, path, Some("history"), prop.value.span()),
            }
        }
        if data.state_type == StateType::History && data.history.is_none() {
            data.history = Some(HistoryType::Shallow);
        }
        if data.state_type != StateType::History {
            data.history = None;
        }

        if let Some(prop) = lookup.get("initial") {
            let target = match &prop.value.kind {
                ExprKind::Str(s) => Some(s.clone()),
                ExprKind::Object(props) => get_value(props, "target")
                    .and_then(Expr::as_str)
                    .map(str::to_string),
                _ => None,
            };
            match target {
                Some(t) => data.initial = Some(t),
                None => self.error(StatePropertyUnhandled, path, Some("initial"), prop.value.span()),
            }
        }

        if let Some(prop) = lookup.get("tags") {
            let mut ctx = ParseContext::new();
            if let Some(many) = MaybeArrayOf(StringLiteral).parse(&prop.value, &mut ctx) {
                for item in many.items {
                    match item.value {
                        Some(tag) => data.tags.push(tag),
                        None => self.error(StatePropertyUnhandled, path, Some("tags"), item.expr.span()),
                    }
                }
            }
        }

        if let Some(prop) = lookup.get("meta") {
            match prop.value.as_object() {
                Some(entries) => {
                    data.meta_entries = effective_props(entries)
                        .into_iter()
                        .filter_map(|p| p.name().map(|n| (n.to_string(), p.value.to_json())))
                        .collect();
                }
                None => self.error(StatePropertyUnhandled, path, Some("meta"), prop.value.span()),
            }
        }

        if let Some(prop) = lookup.get("description") {
            match prop.value.as_str() {
                Some(s) => data.description = Some(s.to_string()),
                None => self.error(StatePropertyUnhandled, path, Some("description"), prop.value.span()),
            }
        }

        self.nodes[id.0].data = data;
    }

    /// `stateId` used in default invocation ids: explicit id, otherwise the
    /// implicit full id.
    fn state_id(&self, id: NodeId) -> String {
        let node = &self.nodes[id.0];
        if let Some(explicit) = &node.data.explicit_id {
            return explicit.clone();
        }
        let root = self.root_id.as_deref().unwrap_or(crate::resolve::IMPLICIT_ROOT_ID);
        if node.path.is_empty() {
            root.to_string()
        } else {
            format!("{root}.{}", node.path.join("."))
        }
    }

    // -------------------------------------------------------------------------
    // Blocks
    // -------------------------------------------------------------------------

    fn add_block(
        &mut self,
        block_type: BlockType,
        parent: BlockParent,
        reference: &ImplementationRef<'a>,
        actor_id: Option<String>,
        list_index: usize,
    ) -> BlockId {
        let id = BlockId(self.blocks.len());
        let source_id = reference.source_id().to_string();
        let (name, inline, params) = match reference {
            ImplementationRef::Named { name, params } => (name.clone(), false, params.clone()),
            ImplementationRef::Builtin { creator, .. } => (creator.to_string(), true, None),
            ImplementationRef::Inline { id, .. } => (id.clone(), true, None),
        };
        let declared = !inline && self.declared.contains(block_type, &name);

        self.implementations
            .registry_mut(block_type)
            .entry(source_id.clone())
            .or_insert_with(|| ImplementationEntry {
                id: source_id.clone(),
                name,
                kind: block_type,
                inline,
                declared,
            });

        let properties = match actor_id {
            Some(actor_id) => BlockProperties::Actor {
                src: source_id.clone(),
                id: actor_id,
            },
            None => BlockProperties::Implementation {
                type_name: source_id.clone(),
                params,
            },
        };
        self.blocks.push(Block {
            unique_id: id,
            parent_id: parent,
            source_id,
            block_type,
            properties,
            list_index,
        });
        id
    }

    /// `entry`, `exit` or transition `actions`: a single action or an array.
    fn action_list(&mut self, parent: BlockParent, value: &'a Expr, path: &[String], property: &str) -> Vec<BlockId> {
        let many = match MaybeArrayOf(&self.actions).parse(value, &mut self.ctx) {
            Some(many) => many,
            None => return Vec::new(),
        };
        let unhandled = match parent {
            BlockParent::Node(_) => StatePropertyUnhandled,
            BlockParent::Edge(_) => TransitionPropertyUnhandled,
        };
        let mut blocks = Vec::with_capacity(many.items.len());
        for (index, item) in many.items.into_iter().enumerate() {
            match item.value {
                Some(reference) => blocks.push(self.add_block(BlockType::Action, parent, &reference, None, index)),
                None => self.error(unhandled, path, Some(property), item.expr.span()),
            }
        }
        blocks
    }

    fn invokes(&mut self, node: NodeId, value: &'a Expr, path: &[String]) {
        let items: Vec<&'a Expr> = match &value.kind {
            ExprKind::Array(items) => items.iter().collect(),
            _ => vec![value],
        };
        for (index, item) in items.into_iter().enumerate() {
            let Some(props) = item.as_object() else {
                self.error(StatePropertyUnhandled, path, Some("invoke"), item.span());
                continue;
            };

            let invocation_id = match get_value(props, "id") {
                Some(expr) => match expr.as_str() {
                    Some(s) => s.to_string(),
                    None => {
                        self.error(StatePropertyUnhandled, path, Some("invoke.id"), expr.span());
                        format!("{}:invocation[{index}]", self.state_id(node))
                    }
                },
                None => format!("{}:invocation[{index}]", self.state_id(node)),
            };

            let src = get_value(props, "src");
            let reference = src.and_then(|src| {
                if self.actors.matches(src) {
                    self.actors.parse(src, &mut self.ctx)
                } else {
                    None
                }
            });
            match reference {
                Some(reference) => {
                    let block = self.add_block(
                        BlockType::Actor,
                        BlockParent::Node(node),
                        &reference,
                        Some(invocation_id.clone()),
                        index,
                    );
                    self.nodes[node.0].data.invoke.push(block);
                }
                None => {
                    let span = src.and_then(Expr::span).or_else(|| item.span());
                    self.error(StatePropertyUnhandled, path, Some("invoke.src"), span);
                }
            }

            if let Some(on_done) = get_value(props, "onDone") {
                self.transitions(
                    node,
                    TransitionSlot::InvokeDone { invoke: index },
                    EventTypeData::InvocationDone {
                        invocation_id: invocation_id.clone(),
                    },
                    on_done,
                    path,
                );
            }
            if let Some(on_error) = get_value(props, "onError") {
                self.transitions(
                    node,
                    TransitionSlot::InvokeError { invoke: index },
                    EventTypeData::InvocationError { invocation_id },
                    on_error,
                    path,
                );
            }
        }
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    fn event_map(&mut self, source: NodeId, value: &'a Expr, path: &[String]) {
        let Some(events) = value.as_object() else {
            self.error(StatePropertyUnhandled, path, Some("on"), value.span());
            return;
        };
        for prop in effective_props(events) {
            let Some(event) = prop.name() else {
                self.error(PropertyKeyUnhandled, path, Some("on"), prop_span(prop));
                continue;
            };
            let event_data = match event {
                "*" => EventTypeData::Wildcard,
                "" => EventTypeData::Always,
                _ => EventTypeData::Named {
                    event_type: event.to_string(),
                },
            };
            let slot = TransitionSlot::On {
                event: event.to_string(),
            };
            self.transitions(source, slot, event_data, &prop.value, path);
        }
    }

    fn delay_map(&mut self, source: NodeId, value: &'a Expr, path: &[String]) {
        let Some(delays) = value.as_object() else {
            self.error(StatePropertyUnhandled, path, Some("after"), value.span());
            return;
        };
        for prop in effective_props(delays) {
            let Some(delay) = prop.name() else {
                self.error(PropertyKeyUnhandled, path, Some("after"), prop_span(prop));
                continue;
            };
            let slot = TransitionSlot::After {
                delay: delay.to_string(),
            };
            let event_data = EventTypeData::After {
                delay: delay.to_string(),
            };
            self.transitions(source, slot, event_data, &prop.value, path);
        }
    }

    /// One transition slot: a single transition or an array of them.
    fn transitions(
        &mut self,
        source: NodeId,
        slot: TransitionSlot,
        event_data: EventTypeData,
        value: &'a Expr,
        path: &[String],
    ) {
        let Some(many) = MaybeArrayOf(TransitionItemParser).parse(value, &mut self.ctx) else {
            return;
        };
        for (index, item) in many.items.into_iter().enumerate() {
            let Some(parsed) = item.value else {
                self.error(TransitionPropertyUnhandled, path, Some(&slot.to_string()), item.expr.span());
                continue;
            };
            let edge_id = EdgeId(self.edges.len());
            let mut edge = Edge {
                unique_id: edge_id,
                source,
                targets: Vec::new(),
                target_descriptors: Vec::new(),
                path: TransitionPath::new(slot.clone(), index),
                span: item.expr.span(),
                data: EdgeData {
                    event_type_data: event_data.clone(),
                    guard: None,
                    actions: Vec::new(),
                    internal: None,
                    description: None,
                },
            };
            let mut targets = Vec::new();
            match parsed {
                TransitionItem::Target(t) => targets.push((t.to_string(), item.expr.span())),
                TransitionItem::Targetless => {}
                TransitionItem::Object(props) => {
                    self.transition_object(&mut edge, props, &mut targets, path);
                }
            }
            for (descriptor, span) in targets {
                edge.target_descriptors.push(descriptor.clone());
                self.pending.push(PendingTarget {
                    edge: edge_id,
                    descriptor,
                    span,
                });
            }
            self.edges.push(edge);
        }
    }

    fn transition_object(
        &mut self,
        edge: &mut Edge,
        props: &'a [Property],
        targets: &mut Vec<(String, Option<Span>)>,
        path: &[String],
    ) {
        let mut lookup: FxHashMap<&str, &'a Property> = FxHashMap::default();
        for prop in effective_props(props) {
            match prop.name() {
                Some(name) if TRANSITION_KEYS.contains(&name) => {
                    lookup.insert(name, prop);
                }
                name => self.error(PropertyKeyUnhandled, path, name, prop_span(prop)),
            }
        }

        if let Some(prop) = lookup.get("target") {
            match &prop.value.kind {
                ExprKind::Str(s) => targets.push((s.clone(), prop.value.span())),
                ExprKind::Array(items) => {
                    for item in items {
                        match item.as_str() {
                            Some(s) => targets.push((s.to_string(), item.span())),
                            None => self.error(TransitionPropertyUnhandled, path, Some("target"), item.span()),
                        }
                    }
                }
                ExprKind::Null | ExprKind::Undefined => {}
                _ => self.error(TransitionPropertyUnhandled, path, Some("target"), prop.value.span()),
            }
        }

        if let Some(prop) = self.pick_mixed(&lookup, "cond", "guard", path) {
            let reference = if self.guards.matches(&prop.value) {
                self.guards.parse(&prop.value, &mut self.ctx)
            } else {
                None
            };
            match reference {
                Some(reference) => {
                    let block = self.add_block(BlockType::Guard, BlockParent::Edge(edge.unique_id), &reference, None, 0);
                    edge.data.guard = Some(block);
                }
                None => {
                    let name = prop.name().unwrap_or("guard");
                    self.error(TransitionPropertyUnhandled, path, Some(name), prop.value.span());
                }
            }
        }

        if let Some(prop) = lookup.get("actions") {
            edge.data.actions = self.action_list(BlockParent::Edge(edge.unique_id), &prop.value, path, "actions");
        }

        if let Some(prop) = self.pick_mixed(&lookup, "internal", "reenter", path) {
            let reenter = prop.name() == Some("reenter");
            match prop.value.kind {
                ExprKind::Bool(b) => edge.data.internal = Some(if reenter { !b } else { b }),
                _ => {
                    let name = prop.name().unwrap_or("internal");
                    self.error(TransitionPropertyUnhandled, path, Some(name), prop.value.span());
                }
            }
        }

        if let Some(prop) = lookup.get("description") {
            match prop.value.as_str() {
                Some(s) => edge.data.description = Some(s.to_string()),
                None => self.error(TransitionPropertyUnhandled, path, Some("description"), prop.value.span()),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Target resolution
    // -------------------------------------------------------------------------

    fn finish(self) -> ExtractionResult {
        let mut digraph = Digraph {
            root: NodeId(0),
            nodes: self.nodes,
            edges: self.edges,
            blocks: self.blocks,
            implementations: self.implementations,
            children: self.children,
        };
        let mut errors = self.errors;

        for pending in self.pending {
            let source = digraph.edge(pending.edge).source;
            match resolve_target(&digraph, source, &pending.descriptor) {
                Some(target) => digraph.edges[pending.edge.0].targets.push(target),
                None => {
                    let path = digraph.node(source).path.clone();
                    trace!(descriptor = %pending.descriptor, root = root_id(&digraph), "unresolved target");
                    errors.push(StructuralError::new(
                        TargetUnresolved,
                        &path,
                        Some(&pending.descriptor),
                        pending.span,
                    ));
                }
            }
        }

        ExtractionResult { digraph, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::find_machines;
    use crate::config::DiscoveryConfig;
    use crate::lang::{parse, Dialect};

    fn extract(src: &str) -> ExtractionResult {
        let tree = parse(src, Dialect::TypeScript).unwrap();
        let machines = find_machines(&tree, src, Dialect::TypeScript, &DiscoveryConfig::default()).unwrap();
        let m = &machines[0];
        extract_config(&m.config, m.options.as_ref(), m.setup.as_ref())
    }

    fn kinds(result: &ExtractionResult) -> Vec<&'static str> {
        result.errors.iter().map(|e| e.kind.as_str()).collect()
    }

    #[test]
    fn test_single_entry_action() {
        let r = extract("createMachine({ entry: 'bark' });");
        let g = &r.digraph;
        assert_eq!(g.blocks.len(), 1);
        assert_eq!(g.blocks[0].block_type, BlockType::Action);
        assert!(g.implementations.actions.contains_key("bark"));
        assert_eq!(g.root_node().data.entry, vec![BlockId(0)]);
        assert!(r.errors.is_empty());
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let r = extract("createMachine({ entry: 'first', exit: 'x', entry: ['second', 'third'] });");
        let g = &r.digraph;
        let entry: Vec<&str> = g.root_node().data.entry.iter().map(|b| g.block(*b).source_id.as_str()).collect();
        assert_eq!(entry, vec!["second", "third"]);
        assert!(!g.implementations.actions.contains_key("first"));
    }

    #[test]
    fn test_preorder_ids_and_targets() {
        let r = extract(
            r#"createMachine({
  initial: 'a',
  states: {
    a: { on: { NEXT: 'b', DEEP: '.inner' }, states: { inner: {} } },
    b: { on: { BACK: { target: '#(machine).a', actions: 'log' } } },
  },
});"#,
        );
        let g = &r.digraph;
        assert!(r.errors.is_empty(), "{:?}", r.errors);
        let paths: Vec<String> = g.nodes.iter().map(|n| n.path.join(".")).collect();
        assert_eq!(paths, vec!["", "a", "a.inner", "b"]);
        assert_eq!(g.edges.len(), 3);
        assert_eq!(g.edges[0].targets, vec![NodeId(3)]);
        assert_eq!(g.edges[1].targets, vec![NodeId(2)]);
        assert_eq!(g.edges[2].targets, vec![NodeId(1)]);
        assert_eq!(g.edges[2].data.actions.len(), 1);
    }

    #[test]
    fn test_guard_mixed_successor_wins() {
        let r = extract("createMachine({ on: { GO: { target: 'a', cond: 'old', guard: 'new' } }, states: { a: {} } });");
        let g = &r.digraph;
        assert_eq!(kinds(&r), vec!["property_mixed"]);
        let guard = g.edges[0].data.guard.unwrap();
        assert_eq!(g.block(guard).source_id, "new");
        assert!(!g.implementations.guards.contains_key("old"));
    }

    #[test]
    fn test_wildcard_always_and_targetless() {
        let r = extract("createMachine({ on: { '*': undefined, '': { actions: 'tick' } } });");
        let g = &r.digraph;
        assert_eq!(g.edges[0].data.event_type_data, EventTypeData::Wildcard);
        assert!(g.edges[0].targets.is_empty());
        assert_eq!(g.edges[1].data.event_type_data, EventTypeData::Always);
    }

    #[test]
    fn test_unhandled_shapes_are_recorded() {
        let r = extract("createMachine({ entry: [undefined, 'ok'], on: { GO: 42 }, bogus: 1, ...spread });");
        let g = &r.digraph;
        assert_eq!(g.root_node().data.entry.len(), 1);
        assert_eq!(
            kinds(&r),
            vec![
                "property_key_unhandled",
                "property_key_unhandled",
                "state_property_unhandled",
                "transition_property_unhandled",
            ]
        );
    }

    #[test]
    fn test_unresolved_target_is_reported() {
        let r = extract("createMachine({ states: { a: { on: { GO: 'nowhere' } } } });");
        assert_eq!(kinds(&r), vec!["target_unresolved"]);
        assert_eq!(r.errors[0].property.as_deref(), Some("nowhere"));
        assert!(r.digraph.edges[0].targets.is_empty());
        assert_eq!(r.digraph.edges[0].target_descriptors, vec!["nowhere"]);
    }

    #[test]
    fn test_invoke_default_id_and_done_events() {
        let r = extract(
            "createMachine({ id: 'm', states: { load: { invoke: { src: 'fetchUser', onDone: 'ok', onError: 'bad' } }, ok: {}, bad: {} } });",
        );
        let g = &r.digraph;
        let load = g.node_by_path(&["load"]).unwrap();
        let block = g.block(g.node(load).data.invoke[0]);
        assert_eq!(
            block.properties,
            BlockProperties::Actor {
                src: "fetchUser".into(),
                id: "m.load:invocation[0]".into()
            }
        );
        let edges: Vec<&Edge> = g.edges_from(load).collect();
        assert_eq!(
            edges[0].data.event_type_data,
            EventTypeData::InvocationDone {
                invocation_id: "m.load:invocation[0]".into()
            }
        );
        assert_eq!(edges[1].path.slot, TransitionSlot::InvokeError { invoke: 0 });
    }

    #[test]
    fn test_declared_and_inline_implementations() {
        let r = extract(
            "setup({ actions: { track: () => {} } }).createMachine({ entry: ['track', 'other', assign({ n: 1 }), () => {}] });",
        );
        let actions = &r.digraph.implementations.actions;
        assert!(actions["track"].declared);
        assert!(!actions["other"].declared);
        assert_eq!(actions["inline:action-0"].name, "assign");
        assert!(actions["inline:action-1"].inline);
    }

    #[test]
    fn test_state_attributes() {
        let r = extract(
            "createMachine({ type: 'parallel', states: { h: { type: 'history' }, d: { type: 'final', tags: ['x', 'y'], meta: { a: 1 }, description: 'done' } } });",
        );
        let g = &r.digraph;
        assert_eq!(g.root_node().data.state_type, StateType::Parallel);
        let h = g.node(g.node_by_path(&["h"]).unwrap());
        assert_eq!(h.data.history, Some(HistoryType::Shallow));
        let d = g.node(g.node_by_path(&["d"]).unwrap());
        assert_eq!(d.data.tags, vec!["x", "y"]);
        assert_eq!(d.data.meta_entries, vec![("a".to_string(), serde_json::json!(1))]);
        assert_eq!(d.data.description.as_deref(), Some("done"));
    }

    #[test]
    fn test_reenter_and_internal_flags() {
        let r = extract(
            "createMachine({ states: { a: { on: { X: { target: 'a', reenter: true }, Y: { target: 'a', internal: true } } } } });",
        );
        let g = &r.digraph;
        assert_eq!(g.edges[0].data.internal, Some(false));
        assert_eq!(g.edges[1].data.internal, Some(true));
    }
}
