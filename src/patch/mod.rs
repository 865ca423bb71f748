//! Structural patches over a digraph.
//!
//! A [`Patch`] names nodes, edges and blocks by their digraph handles. New
//! entities are introduced with caller-chosen handles that do not collide
//! with existing ones, and later patches of the same batch may refer to them.
//!
//! A batch is deduplicated and put in a canonical order before it is
//! translated into [`MachineEdit`](crate::edit::MachineEdit)s, so every
//! permutation of the same batch produces the same text edits:
//!
//! 1. node additions, shallowest first
//! 2. node key, parent, id, type and initial replacements
//! 3. edge removals, source/slot/target/flag replacements, edge additions
//! 4. description replacements
//! 5. block removals, source replacements, block additions
//! 6. node removals, deepest first

pub mod reconciler;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::digraph::{BlockId, EdgeId, HistoryType, NodeId, StateType, TransitionSlot};
use crate::error::EditError;

pub use reconciler::{reconcile, Reconciler};

/// List a block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockOwner {
    Entry { node: NodeId },
    Exit { node: NodeId },
    Invoke { node: NodeId },
    Actions { edge: EdgeId },
    Guard { edge: EdgeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum DescriptionOwner {
    Node(NodeId),
    Edge(EdgeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Patch {
    AddNode {
        node: NodeId,
        parent: NodeId,
        key: String,
    },
    RemoveNode {
        node: NodeId,
    },
    ReplaceNodeKey {
        node: NodeId,
        key: String,
    },
    ReplaceNodeParent {
        node: NodeId,
        parent: NodeId,
    },
    ReplaceNodeInitial {
        node: NodeId,
        initial: Option<String>,
    },
    ReplaceNodeType {
        node: NodeId,
        state_type: StateType,
        #[serde(default)]
        history: Option<HistoryType>,
    },
    ReplaceNodeId {
        node: NodeId,
        id: Option<String>,
    },
    ReplaceDescription {
        owner: DescriptionOwner,
        description: Option<String>,
    },
    AddEdge {
        edge: EdgeId,
        source: NodeId,
        #[serde(default)]
        targets: Vec<NodeId>,
        slot: TransitionSlot,
        #[serde(default)]
        internal: Option<bool>,
    },
    RemoveEdge {
        edge: EdgeId,
    },
    ReplaceEdgeSource {
        edge: EdgeId,
        source: NodeId,
    },
    ReplaceEdgeTargets {
        edge: EdgeId,
        targets: Vec<NodeId>,
    },
    ReplaceEdgeSlot {
        edge: EdgeId,
        slot: TransitionSlot,
    },
    ReplaceEdgeInternal {
        edge: EdgeId,
        internal: Option<bool>,
    },
    AddBlock {
        block: BlockId,
        owner: BlockOwner,
        #[serde(default)]
        index: Option<usize>,
        source_id: String,
    },
    RemoveBlock {
        block: BlockId,
    },
    ReplaceBlockSource {
        block: BlockId,
        source_id: String,
    },
}

impl Patch {
    pub fn op(&self) -> &'static str {
        match self {
            Patch::AddNode { .. } => "add_node",
            Patch::RemoveNode { .. } => "remove_node",
            Patch::ReplaceNodeKey { .. } => "replace_node_key",
            Patch::ReplaceNodeParent { .. } => "replace_node_parent",
            Patch::ReplaceNodeInitial { .. } => "replace_node_initial",
            Patch::ReplaceNodeType { .. } => "replace_node_type",
            Patch::ReplaceNodeId { .. } => "replace_node_id",
            Patch::ReplaceDescription { .. } => "replace_description",
            Patch::AddEdge { .. } => "add_edge",
            Patch::RemoveEdge { .. } => "remove_edge",
            Patch::ReplaceEdgeSource { .. } => "replace_edge_source",
            Patch::ReplaceEdgeTargets { .. } => "replace_edge_targets",
            Patch::ReplaceEdgeSlot { .. } => "replace_edge_slot",
            Patch::ReplaceEdgeInternal { .. } => "replace_edge_internal",
            Patch::AddBlock { .. } => "add_block",
            Patch::RemoveBlock { .. } => "remove_block",
            Patch::ReplaceBlockSource { .. } => "replace_block_source",
        }
    }

    fn phase(&self) -> u8 {
        match self {
            Patch::AddNode { .. } => 0,
            Patch::ReplaceNodeKey { .. } => 1,
            Patch::ReplaceNodeParent { .. } => 2,
            Patch::ReplaceNodeId { .. } => 3,
            Patch::ReplaceNodeType { .. } => 4,
            Patch::ReplaceNodeInitial { .. } => 5,
            Patch::RemoveEdge { .. } => 6,
            Patch::ReplaceEdgeSource { .. } => 7,
            Patch::ReplaceEdgeSlot { .. } => 8,
            Patch::ReplaceEdgeTargets { .. } => 9,
            Patch::ReplaceEdgeInternal { .. } => 10,
            Patch::AddEdge { .. } => 11,
            Patch::ReplaceDescription { .. } => 12,
            Patch::RemoveBlock { .. } => 13,
            Patch::ReplaceBlockSource { .. } => 14,
            Patch::AddBlock { .. } => 15,
            Patch::RemoveNode { .. } => 16,
        }
    }
}

/// Deduplicate `patches` and sort them into application order.
///
/// `depth` gives the depth of a node in the patched hierarchy; it orders node
/// additions parents-first and node removals children-first.
pub fn canonical_order(patches: &[Patch], depth: impl Fn(NodeId) -> usize) -> Vec<Patch> {
    let mut out = patches.to_vec();
    out.sort();
    out.dedup();
    out.sort_by_cached_key(|patch| {
        let rank = match patch {
            Patch::AddNode { node, .. } => depth(*node) as i64,
            Patch::RemoveNode { node } => -(depth(*node) as i64),
            _ => 0,
        };
        (patch.phase(), rank)
    });
    out
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("unknown edge {0:?}")]
    UnknownEdge(EdgeId),

    #[error("unknown block {0:?}")]
    UnknownBlock(BlockId),

    #[error("node {0:?} already exists")]
    DuplicateNode(NodeId),

    #[error("edge {0:?} already exists")]
    DuplicateEdge(EdgeId),

    #[error("block {0:?} already exists")]
    DuplicateBlock(BlockId),

    #[error("added nodes form a cycle through node {0:?}")]
    CyclicParent(NodeId),

    #[error("{op} failed: {source}")]
    Edit {
        op: &'static str,
        #[source]
        source: EditError,
    },

    #[error(transparent)]
    Text(#[from] EditError),
}
