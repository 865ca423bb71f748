//! Digraph data model.
//!
//! Nodes, edges and blocks live in arenas addressed by integer handles.
//! Handles are assigned in pre-order during extraction, so identical input
//! yields identical handles; callers should still treat them as opaque.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::Span;

// =============================================================================
// Handles
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub usize);

/// Ordered list of state keys from the root. The root itself is `[]`.
pub type StatePath = Vec<String>;

// =============================================================================
// Nodes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    #[default]
    Normal,
    Parallel,
    Final,
    History,
}

impl StateType {
    pub fn as_str(self) -> &'static str {
        match self {
            StateType::Normal => "normal",
            StateType::Parallel => "parallel",
            StateType::Final => "final",
            StateType::History => "history",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "atomic" | "compound" | "normal" => Some(StateType::Normal),
            "parallel" => Some(StateType::Parallel),
            "final" => Some(StateType::Final),
            "history" => Some(StateType::History),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryType {
    Shallow,
    Deep,
}

impl HistoryType {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryType::Shallow => "shallow",
            HistoryType::Deep => "deep",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub key: String,
    #[serde(rename = "type")]
    pub state_type: StateType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,
    pub entry: Vec<BlockId>,
    pub exit: Vec<BlockId>,
    pub invoke: Vec<BlockId>,
    pub tags: Vec<String>,
    pub meta_entries: Vec<(String, serde_json::Value)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The `id` property, when written.
    #[serde(rename = "id", skip_serializing_if = "Option::is_none")]
    pub explicit_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateNode {
    pub unique_id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    pub path: StatePath,
    #[serde(skip)]
    pub span: Option<Span>,
    pub data: NodeData,
}

// =============================================================================
// Edges
// =============================================================================

/// Where a transition is declared on its source state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionSlot {
    /// `on: { EVENT: ... }`
    On { event: String },
    /// `always: ...`
    Always,
    /// `after: { DELAY: ... }`
    After { delay: String },
    /// `onDone: ...`
    OnDone,
    /// `invoke[N].onDone`
    InvokeDone { invoke: usize },
    /// `invoke[N].onError`
    InvokeError { invoke: usize },
}

impl fmt::Display for TransitionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionSlot::On { event } => write!(f, "on.{event}"),
            TransitionSlot::Always => f.write_str("always"),
            TransitionSlot::After { delay } => write!(f, "after.{delay}"),
            TransitionSlot::OnDone => f.write_str("onDone"),
            TransitionSlot::InvokeDone { invoke } => write!(f, "invoke.{invoke}.onDone"),
            TransitionSlot::InvokeError { invoke } => write!(f, "invoke.{invoke}.onError"),
        }
    }
}

/// A transition's slot plus its position among the slot's entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionPath {
    pub slot: TransitionSlot,
    pub index: usize,
}

impl TransitionPath {
    pub fn new(slot: TransitionSlot, index: usize) -> Self {
        Self { slot, index }
    }
}

impl fmt::Display for TransitionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.slot, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventTypeData {
    #[serde(rename = "named")]
    Named {
        #[serde(rename = "eventType")]
        event_type: String,
    },
    #[serde(rename = "wildcard")]
    Wildcard,
    #[serde(rename = "always")]
    Always,
    #[serde(rename = "after")]
    After { delay: String },
    #[serde(rename = "state.done")]
    StateDone,
    #[serde(rename = "invocation.done")]
    InvocationDone {
        #[serde(rename = "invocationId")]
        invocation_id: String,
    },
    #[serde(rename = "invocation.error")]
    InvocationError {
        #[serde(rename = "invocationId")]
        invocation_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeData {
    pub event_type_data: EventTypeData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<BlockId>,
    pub actions: Vec<BlockId>,
    /// `Some(true)` for explicit internal, `Some(false)` for explicit
    /// external/reentering, `None` when inferred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub unique_id: EdgeId,
    pub source: NodeId,
    /// Resolved targets; unresolved descriptors are reported, not listed.
    pub targets: Vec<NodeId>,
    /// Target text as written, in order.
    pub target_descriptors: Vec<String>,
    pub path: TransitionPath,
    #[serde(skip)]
    pub span: Option<Span>,
    pub data: EdgeData,
}

// =============================================================================
// Blocks
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Action,
    Guard,
    Actor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum BlockParent {
    Node(NodeId),
    Edge(EdgeId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BlockProperties {
    Implementation {
        #[serde(rename = "type")]
        type_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        params: Option<serde_json::Value>,
    },
    Actor {
        src: String,
        id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub unique_id: BlockId,
    pub parent_id: BlockParent,
    pub source_id: String,
    pub block_type: BlockType,
    pub properties: BlockProperties,
    /// Position in the written list, counting entries that did not parse.
    #[serde(skip)]
    pub list_index: usize,
}

// =============================================================================
// Implementations
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImplementationEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BlockType,
    /// Anonymous implementation written at the call site.
    pub inline: bool,
    /// Provided in the machine options or `setup({...})`.
    pub declared: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Implementations {
    pub actions: BTreeMap<String, ImplementationEntry>,
    pub guards: BTreeMap<String, ImplementationEntry>,
    pub actors: BTreeMap<String, ImplementationEntry>,
}

impl Implementations {
    pub fn registry(&self, kind: BlockType) -> &BTreeMap<String, ImplementationEntry> {
        match kind {
            BlockType::Action => &self.actions,
            BlockType::Guard => &self.guards,
            BlockType::Actor => &self.actors,
        }
    }

    pub fn registry_mut(&mut self, kind: BlockType) -> &mut BTreeMap<String, ImplementationEntry> {
        match kind {
            BlockType::Action => &mut self.actions,
            BlockType::Guard => &mut self.guards,
            BlockType::Actor => &mut self.actors,
        }
    }
}

// =============================================================================
// Digraph
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Digraph {
    pub root: NodeId,
    pub nodes: Vec<StateNode>,
    pub edges: Vec<Edge>,
    pub blocks: Vec<Block>,
    pub implementations: Implementations,
    #[serde(skip)]
    pub(crate) children: Vec<Vec<NodeId>>,
}

impl Digraph {
    #[inline]
    pub fn node(&self, id: NodeId) -> &StateNode {
        &self.nodes[id.0]
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    #[inline]
    pub fn root_node(&self) -> &StateNode {
        self.node(self.root)
    }

    /// Children of `id` in declaration order.
    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.children[id.0]
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent_id
    }

    pub fn child_by_key(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|c| self.node(*c).data.key == key)
    }

    pub fn node_by_path<S: AsRef<str>>(&self, path: &[S]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root, |cur, key| self.child_by_key(cur, key.as_ref()))
    }

    pub fn node_by_explicit_id(&self, id: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|n| n.data.explicit_id.as_deref() == Some(id))
            .map(|n| n.unique_id)
    }

    /// True when `node` is a strict descendant of `ancestor`.
    pub fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut cur = self.parent(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.parent(id);
        }
        false
    }

    #[inline]
    pub fn is_self_or_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        node == ancestor || self.is_descendant(node, ancestor)
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |n| self.parent(*n))
    }

    /// `id` and all its descendants in pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    pub fn edges_from(&self, source: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.source == source)
    }

    pub fn edge_at(&self, source: NodeId, path: &TransitionPath) -> Option<&Edge> {
        self.edges_from(source).find(|e| &e.path == path)
    }

    /// Number of transitions declared in `slot` on `source`.
    pub fn slot_len(&self, source: NodeId, slot: &TransitionSlot) -> usize {
        self.edges_from(source).filter(|e| &e.path.slot == slot).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_display() {
        let path = TransitionPath::new(TransitionSlot::InvokeError { invoke: 2 }, 0);
        assert_eq!(path.to_string(), "invoke.2.onError[0]");
        assert_eq!(
            TransitionSlot::On { event: "GO".into() }.to_string(),
            "on.GO"
        );
    }

    #[test]
    fn test_event_type_serialization() {
        let named = EventTypeData::Named {
            event_type: "GO".into(),
        };
        assert_eq!(
            serde_json::to_value(&named).unwrap(),
            serde_json::json!({"type": "named", "eventType": "GO"})
        );
        let done = EventTypeData::InvocationDone {
            invocation_id: "fetch".into(),
        };
        assert_eq!(
            serde_json::to_value(&done).unwrap(),
            serde_json::json!({"type": "invocation.done", "invocationId": "fetch"})
        );
    }

    #[test]
    fn test_state_type_keywords() {
        assert_eq!(StateType::from_keyword("compound"), Some(StateType::Normal));
        assert_eq!(StateType::from_keyword("history"), Some(StateType::History));
        assert_eq!(StateType::from_keyword("weird"), None);
    }
}
