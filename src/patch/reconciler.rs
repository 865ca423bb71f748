//! Translation of patch batches into machine edits.
//!
//! The reconciler keeps a small model mapping patch handles to where the
//! addressed entity currently lives in the draft (state path, transition
//! slot and index, list position). Each patch becomes one or two
//! [`MachineEdit`]s and the model is updated to follow the edit.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use super::{canonical_order, BlockOwner, DescriptionOwner, Patch, PatchError};
use crate::ast::MachineLiteral;
use crate::config::LensConfig;
use crate::digraph::{BlockId, Digraph, EdgeId, NodeId, StatePath, TransitionPath, TransitionSlot};
use crate::edit::{ActionPath, MachineEdit, MachineEditor, TextEdit};

type PatchResult<T> = Result<T, PatchError>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct EdgeLoc {
    source: NodeId,
    path: TransitionPath,
}

#[derive(Debug, Default)]
struct Model {
    paths: FxHashMap<NodeId, StatePath>,
    edges: FxHashMap<EdgeId, EdgeLoc>,
    blocks: FxHashMap<BlockId, (BlockOwner, usize)>,
}

impl Model {
    fn from_digraph(graph: &Digraph) -> Self {
        let mut model = Model::default();
        for node in &graph.nodes {
            let id = node.unique_id;
            model.paths.insert(id, node.path.clone());
            let lists = [
                (BlockOwner::Entry { node: id }, &node.data.entry),
                (BlockOwner::Exit { node: id }, &node.data.exit),
                (BlockOwner::Invoke { node: id }, &node.data.invoke),
            ];
            for (owner, blocks) in lists {
                for block in blocks {
                    model.blocks.insert(*block, (owner, graph.block(*block).list_index));
                }
            }
        }
        for edge in &graph.edges {
            let id = edge.unique_id;
            model.edges.insert(
                id,
                EdgeLoc {
                    source: edge.source,
                    path: edge.path.clone(),
                },
            );
            for block in &edge.data.actions {
                let index = graph.block(*block).list_index;
                model.blocks.insert(*block, (BlockOwner::Actions { edge: id }, index));
            }
            if let Some(guard) = edge.data.guard {
                model.blocks.insert(guard, (BlockOwner::Guard { edge: id }, 0));
            }
        }
        model
    }

    fn path(&self, node: NodeId) -> PatchResult<StatePath> {
        self.paths.get(&node).cloned().ok_or(PatchError::UnknownNode(node))
    }

    fn edge(&self, edge: EdgeId) -> PatchResult<EdgeLoc> {
        self.edges.get(&edge).cloned().ok_or(PatchError::UnknownEdge(edge))
    }

    fn block(&self, block: BlockId) -> PatchResult<(BlockOwner, usize)> {
        self.blocks.get(&block).copied().ok_or(PatchError::UnknownBlock(block))
    }

    /// Depth of every node added by `patches`, following parent chains
    /// through other additions of the same batch.
    fn added_depths(&self, patches: &[Patch]) -> PatchResult<FxHashMap<NodeId, usize>> {
        let parents: FxHashMap<NodeId, NodeId> = patches
            .iter()
            .filter_map(|p| match p {
                Patch::AddNode { node, parent, .. } => Some((*node, *parent)),
                _ => None,
            })
            .collect();

        let mut depths = FxHashMap::default();
        for &start in parents.keys() {
            let mut chain = vec![start];
            let mut cur = start;
            let base = loop {
                let parent = parents[&cur];
                if let Some(path) = self.paths.get(&parent) {
                    break path.len();
                }
                if let Some(&d) = depths.get(&parent) {
                    break d;
                }
                if !parents.contains_key(&parent) {
                    return Err(PatchError::UnknownNode(parent));
                }
                if chain.contains(&parent) {
                    return Err(PatchError::CyclicParent(parent));
                }
                chain.push(parent);
                cur = parent;
            };
            for (i, node) in chain.iter().rev().enumerate() {
                depths.insert(*node, base + i + 1);
            }
        }
        Ok(depths)
    }

    fn move_subtree(&mut self, old: &[String], new: &[String]) {
        for path in self.paths.values_mut() {
            if path.starts_with(old) {
                let mut moved = new.to_vec();
                moved.extend_from_slice(&path[old.len()..]);
                *path = moved;
            }
        }
    }

    fn drop_subtree(&mut self, root: &[String]) {
        let removed: FxHashSet<NodeId> = self
            .paths
            .iter()
            .filter(|(_, p)| p.starts_with(root))
            .map(|(n, _)| *n)
            .collect();
        self.paths.retain(|n, _| !removed.contains(n));
        self.edges.retain(|_, e| !removed.contains(&e.source));
    }

    fn slot_len(&self, source: NodeId, slot: &TransitionSlot) -> usize {
        self.edges
            .values()
            .filter(|e| e.source == source && e.path.slot == *slot)
            .count()
    }

    fn detach_edge(&mut self, edge: EdgeId) -> PatchResult<EdgeLoc> {
        let loc = self.edges.remove(&edge).ok_or(PatchError::UnknownEdge(edge))?;
        for other in self.edges.values_mut() {
            if other.source == loc.source && other.path.slot == loc.path.slot && other.path.index > loc.path.index {
                other.path.index -= 1;
            }
        }
        Ok(loc)
    }

    fn attach_edge(&mut self, edge: EdgeId, source: NodeId, slot: TransitionSlot) -> TransitionPath {
        let path = TransitionPath::new(slot.clone(), self.slot_len(source, &slot));
        self.edges.insert(
            edge,
            EdgeLoc {
                source,
                path: path.clone(),
            },
        );
        path
    }

    fn drop_edge_blocks(&mut self, edge: EdgeId) {
        self.blocks.retain(|_, (owner, _)| {
            !matches!(*owner, BlockOwner::Actions { edge: e } | BlockOwner::Guard { edge: e } if e == edge)
        });
    }

    /// Written position of the `n`th block of `owner`.
    fn nth_position(&self, owner: BlockOwner, n: usize) -> Option<usize> {
        let mut positions: Vec<usize> = self
            .blocks
            .values()
            .filter(|(o, _)| *o == owner)
            .map(|(_, i)| *i)
            .collect();
        positions.sort_unstable();
        positions.get(n).copied()
    }

    fn detach_block(&mut self, block: BlockId) -> PatchResult<(BlockOwner, usize)> {
        let (owner, index) = self.blocks.remove(&block).ok_or(PatchError::UnknownBlock(block))?;
        for (o, i) in self.blocks.values_mut() {
            if *o == owner && *i > index {
                *i -= 1;
            }
        }
        if let BlockOwner::Invoke { node } = owner {
            self.forget_invoke(node, index);
        }
        Ok((owner, index))
    }

    /// Removing an invoke entry drops its done/error transitions and shifts
    /// the slots of later entries.
    fn forget_invoke(&mut self, node: NodeId, index: usize) {
        let gone: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|(_, e)| {
                e.source == node
                    && matches!(e.path.slot,
                        TransitionSlot::InvokeDone { invoke } | TransitionSlot::InvokeError { invoke } if invoke == index)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in gone {
            self.edges.remove(&id);
            self.drop_edge_blocks(id);
        }
        for e in self.edges.values_mut() {
            if e.source != node {
                continue;
            }
            match &mut e.path.slot {
                TransitionSlot::InvokeDone { invoke } | TransitionSlot::InvokeError { invoke } if *invoke > index => {
                    *invoke -= 1;
                }
                _ => {}
            }
        }
    }

    fn attach_block(&mut self, block: BlockId, owner: BlockOwner, index: usize) {
        for (o, i) in self.blocks.values_mut() {
            if *o == owner && *i >= index {
                *i += 1;
            }
        }
        self.blocks.insert(block, (owner, index));
    }
}

/// Applies patch batches to one machine.
pub struct Reconciler<'s> {
    editor: MachineEditor<'s>,
    model: Model,
}

impl<'s> Reconciler<'s> {
    pub fn new(source: &'s str, machine: &'s MachineLiteral, config: &LensConfig) -> Self {
        let editor = MachineEditor::new(source, machine, config);
        let model = Model::from_digraph(editor.digraph());
        Self { editor, model }
    }

    pub fn editor(&self) -> &MachineEditor<'s> {
        &self.editor
    }

    /// Apply a batch in canonical order. Returns the machine edits the batch
    /// was translated into.
    pub fn apply(&mut self, patches: &[Patch]) -> PatchResult<Vec<MachineEdit>> {
        let added = self.model.added_depths(patches)?;
        let model = &self.model;
        let ordered = canonical_order(patches, |node| {
            added
                .get(&node)
                .copied()
                .or_else(|| model.paths.get(&node).map(Vec::len))
                .unwrap_or(0)
        });
        debug!(received = patches.len(), unique = ordered.len(), "reconciling patch batch");

        let mut applied = Vec::with_capacity(ordered.len());
        for patch in &ordered {
            self.step(patch, &mut applied)?;
        }
        Ok(applied)
    }

    pub fn text_edits(&self) -> PatchResult<Vec<TextEdit>> {
        Ok(self.editor.text_edits()?)
    }

    fn run(&mut self, op: &'static str, edit: MachineEdit, applied: &mut Vec<MachineEdit>) -> PatchResult<()> {
        trace!(op, kind = edit.kind(), "translated patch");
        self.editor
            .apply(&edit)
            .map_err(|source| PatchError::Edit { op, source })?;
        applied.push(edit);
        Ok(())
    }

    fn step(&mut self, patch: &Patch, applied: &mut Vec<MachineEdit>) -> PatchResult<()> {
        let op = patch.op();
        match patch {
            Patch::AddNode { node, parent, key } => {
                if self.model.paths.contains_key(node) {
                    return Err(PatchError::DuplicateNode(*node));
                }
                let parent = self.model.path(*parent)?;
                let edit = MachineEdit::AddState {
                    parent: parent.clone(),
                    name: key.clone(),
                };
                self.run(op, edit, applied)?;
                let mut path = parent;
                path.push(key.clone());
                self.model.paths.insert(*node, path);
            }
            Patch::RemoveNode { node } => {
                let path = self.model.path(*node)?;
                self.run(op, MachineEdit::RemoveState { path: path.clone() }, applied)?;
                self.model.drop_subtree(&path);
            }
            Patch::ReplaceNodeKey { node, key } => {
                let path = self.model.path(*node)?;
                let edit = MachineEdit::RenameState {
                    path: path.clone(),
                    name: key.clone(),
                };
                self.run(op, edit, applied)?;
                let mut renamed = path.clone();
                if let Some(last) = renamed.last_mut() {
                    *last = key.clone();
                }
                self.model.move_subtree(&path, &renamed);
            }
            Patch::ReplaceNodeParent { node, parent } => {
                let path = self.model.path(*node)?;
                let new_parent = self.model.path(*parent)?;
                let edit = MachineEdit::ReparentState {
                    path: path.clone(),
                    new_parent: new_parent.clone(),
                };
                self.run(op, edit, applied)?;
                let mut moved = new_parent;
                moved.extend(path.last().cloned());
                self.model.move_subtree(&path, &moved);
            }
            Patch::ReplaceNodeInitial { node, initial } => {
                let path = self.model.path(*node)?;
                let edit = MachineEdit::SetInitialState {
                    path,
                    initial: initial.clone(),
                };
                self.run(op, edit, applied)?;
            }
            Patch::ReplaceNodeType {
                node,
                state_type,
                history,
            } => {
                let path = self.model.path(*node)?;
                let edit = MachineEdit::SetStateType {
                    path,
                    state_type: *state_type,
                    history: *history,
                };
                self.run(op, edit, applied)?;
            }
            Patch::ReplaceNodeId { node, id } => {
                let path = self.model.path(*node)?;
                self.run(op, MachineEdit::SetStateId { path, id: id.clone() }, applied)?;
            }
            Patch::ReplaceDescription { owner, description } => {
                let (state, transition) = match owner {
                    DescriptionOwner::Node(node) => (self.model.path(*node)?, None),
                    DescriptionOwner::Edge(edge) => {
                        let loc = self.model.edge(*edge)?;
                        (self.model.path(loc.source)?, Some(loc.path))
                    }
                };
                let edit = MachineEdit::SetDescription {
                    state,
                    transition,
                    description: description.clone(),
                };
                self.run(op, edit, applied)?;
            }
            Patch::AddEdge {
                edge,
                source,
                targets,
                slot,
                internal,
            } => {
                if self.model.edges.contains_key(edge) {
                    return Err(PatchError::DuplicateEdge(*edge));
                }
                let source_path = self.model.path(*source)?;
                let target_paths = targets
                    .iter()
                    .map(|t| self.model.path(*t))
                    .collect::<PatchResult<Vec<_>>>()?;
                let edit = MachineEdit::AddTransition {
                    source: source_path.clone(),
                    slot: slot.clone(),
                    target: target_paths.first().cloned(),
                    external: *internal == Some(false),
                    guard: None,
                };
                self.run(op, edit, applied)?;
                let path = self.model.attach_edge(*edge, *source, slot.clone());
                if target_paths.len() > 1 {
                    let edit = MachineEdit::RetargetTransition {
                        source: source_path,
                        transition: path,
                        targets: target_paths,
                    };
                    self.run(op, edit, applied)?;
                }
            }
            Patch::RemoveEdge { edge } => {
                let loc = self.model.edge(*edge)?;
                let edit = MachineEdit::RemoveTransition {
                    source: self.model.path(loc.source)?,
                    transition: loc.path,
                };
                self.run(op, edit, applied)?;
                self.model.detach_edge(*edge)?;
                self.model.drop_edge_blocks(*edge);
            }
            Patch::ReplaceEdgeSource { edge, source } => {
                let loc = self.model.edge(*edge)?;
                if loc.source == *source {
                    return Ok(());
                }
                let edit = MachineEdit::ReanchorTransition {
                    source: self.model.path(loc.source)?,
                    transition: loc.path.clone(),
                    new_source: self.model.path(*source)?,
                };
                self.run(op, edit, applied)?;
                self.model.detach_edge(*edge)?;
                self.model.attach_edge(*edge, *source, loc.path.slot);
            }
            Patch::ReplaceEdgeTargets { edge, targets } => {
                let loc = self.model.edge(*edge)?;
                let edit = MachineEdit::RetargetTransition {
                    source: self.model.path(loc.source)?,
                    transition: loc.path,
                    targets: targets
                        .iter()
                        .map(|t| self.model.path(*t))
                        .collect::<PatchResult<Vec<_>>>()?,
                };
                self.run(op, edit, applied)?;
            }
            Patch::ReplaceEdgeSlot { edge, slot } => {
                let loc = self.model.edge(*edge)?;
                if loc.path.slot == *slot {
                    return Ok(());
                }
                let edit = MachineEdit::ChangeTransitionEvent {
                    source: self.model.path(loc.source)?,
                    transition: loc.path,
                    slot: slot.clone(),
                };
                self.run(op, edit, applied)?;
                self.model.detach_edge(*edge)?;
                self.model.attach_edge(*edge, loc.source, slot.clone());
            }
            Patch::ReplaceEdgeInternal { edge, internal } => {
                let loc = self.model.edge(*edge)?;
                let edit = MachineEdit::MarkTransitionExternal {
                    source: self.model.path(loc.source)?,
                    transition: loc.path,
                    external: *internal == Some(false),
                };
                self.run(op, edit, applied)?;
            }
            Patch::AddBlock {
                block,
                owner,
                index,
                source_id,
            } => {
                if self.model.blocks.contains_key(block) {
                    return Err(PatchError::DuplicateBlock(*block));
                }
                let len = self.written_len(*owner)?;
                let index = index
                    .and_then(|n| self.model.nth_position(*owner, n))
                    .unwrap_or(len);
                let (edit, position) = match *owner {
                    BlockOwner::Invoke { node } => (
                        MachineEdit::AddInvoke {
                            state: self.model.path(node)?,
                            src: source_id.clone(),
                            id: None,
                        },
                        len,
                    ),
                    BlockOwner::Guard { edge } => {
                        let loc = self.model.edge(edge)?;
                        let edit = MachineEdit::AddGuard {
                            source: self.model.path(loc.source)?,
                            transition: loc.path,
                            name: source_id.clone(),
                        };
                        (edit, 0)
                    }
                    _ => {
                        let path = self.action_path(*owner, index)?;
                        (
                            MachineEdit::AddAction {
                                path,
                                name: source_id.clone(),
                            },
                            index,
                        )
                    }
                };
                self.run(op, edit, applied)?;
                self.model.attach_block(*block, *owner, position);
            }
            Patch::RemoveBlock { block } => {
                let (owner, index) = self.model.block(*block)?;
                let edit = match owner {
                    BlockOwner::Invoke { node } => MachineEdit::RemoveInvoke {
                        state: self.model.path(node)?,
                        index,
                    },
                    BlockOwner::Guard { edge } => {
                        let loc = self.model.edge(edge)?;
                        MachineEdit::RemoveGuard {
                            source: self.model.path(loc.source)?,
                            transition: loc.path,
                        }
                    }
                    _ => MachineEdit::RemoveAction {
                        path: self.action_path(owner, index)?,
                    },
                };
                self.run(op, edit, applied)?;
                self.model.detach_block(*block)?;
            }
            Patch::ReplaceBlockSource { block, source_id } => {
                let (owner, index) = self.model.block(*block)?;
                let edit = match owner {
                    BlockOwner::Invoke { node } => MachineEdit::EditInvoke {
                        state: self.model.path(node)?,
                        index,
                        src: Some(source_id.clone()),
                        id: None,
                    },
                    BlockOwner::Guard { edge } => {
                        let loc = self.model.edge(edge)?;
                        MachineEdit::EditGuard {
                            source: self.model.path(loc.source)?,
                            transition: loc.path,
                            name: source_id.clone(),
                        }
                    }
                    _ => MachineEdit::EditAction {
                        path: self.action_path(owner, index)?,
                        name: source_id.clone(),
                    },
                };
                self.run(op, edit, applied)?;
            }
        }
        Ok(())
    }

    /// Length of the list holding `owner`'s blocks as written, unparsed
    /// entries included.
    fn written_len(&self, owner: BlockOwner) -> PatchResult<usize> {
        Ok(match owner {
            BlockOwner::Invoke { node } => self.editor.invoke_count(&self.model.path(node)?),
            BlockOwner::Guard { .. } => 0,
            _ => self.editor.action_count(&self.action_path(owner, 0)?.location),
        })
    }

    fn action_path(&self, owner: BlockOwner, index: usize) -> PatchResult<ActionPath> {
        Ok(match owner {
            BlockOwner::Entry { node } => ActionPath::entry(self.model.path(node)?, index),
            BlockOwner::Exit { node } => ActionPath::exit(self.model.path(node)?, index),
            BlockOwner::Actions { edge } | BlockOwner::Guard { edge } => {
                let loc = self.model.edge(edge)?;
                ActionPath::transition(self.model.path(loc.source)?, loc.path, index)
            }
            BlockOwner::Invoke { node } => {
                return Err(PatchError::Edit {
                    op: "action_path",
                    source: crate::error::EditError::InvalidEdit(format!(
                        "invoke list of node {} holds actors, not actions",
                        node.0
                    )),
                })
            }
        })
    }
}

/// Apply `patches` to `machine` and return the resulting text edits.
pub fn reconcile(
    source: &str,
    machine: &MachineLiteral,
    config: &LensConfig,
    patches: &[Patch],
) -> PatchResult<Vec<TextEdit>> {
    let mut reconciler = Reconciler::new(source, machine, config);
    reconciler.apply(patches)?;
    reconciler.text_edits()
}
