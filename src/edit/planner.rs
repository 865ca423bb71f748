//! Edit planning.
//!
//! [`MachineEditor`] owns a private copy of the configuration tree. Each
//! [`MachineEdit`] is validated against the digraph of the current draft,
//! applied to a clone of the draft, and the digraph is re-extracted from the
//! result. A failed edit leaves the editor unchanged. Text edits are produced
//! on demand by diffing the draft against the original tree.

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use super::draft::{
    child_states_mut, collapse_transition, effective_key, list_insert, list_item_mut, list_len, list_remove,
    promote_transition, prune_slot_map, remove_pair, set_transition_targets, slot_key, slot_owner_mut,
    state_not_found, state_props, state_props_mut, transition_item, transition_item_mut, transition_not_found,
    transition_targets,
};
use super::ops::{ActionLocation, ActionPath, MachineEdit};
use super::print::Style;
use super::splicer::{apply_text_edits, Splicer, TextEdit};
use crate::ast::{
    get_prop, get_prop_mut, get_value_mut, is_valid_identifier, remove_prop, Expr, ExprKind,
    MachineLiteral, PropKey, Property,
};
use crate::config::{Flavor, LensConfig};
use crate::digraph::{
    extract_config, Digraph, Edge, ExtractionResult, HistoryType, NodeId, StatePath, StateType,
    StructuralError, TransitionPath, TransitionSlot,
};
use crate::error::{display_path, EditError};
use crate::resolve::{default_internal, emit_preserving, emit_target, resolve_target};

type EditResult<T> = Result<T, EditError>;

/// Editing session over one machine literal.
pub struct MachineEditor<'s> {
    source: &'s str,
    original: &'s Expr,
    options: Option<&'s Expr>,
    setup: Option<&'s Expr>,
    draft: Expr,
    extraction: ExtractionResult,
    style: Style,
    flavor: Flavor,
}

impl<'s> MachineEditor<'s> {
    pub fn new(source: &'s str, machine: &'s MachineLiteral, config: &LensConfig) -> Self {
        let flavor = match config.edit.flavor {
            Flavor::Auto => detect_flavor(machine),
            explicit => explicit,
        };
        let style = Style::infer(source, &machine.config, &config.style);
        debug!(index = machine.index, ?flavor, "opening machine for editing");
        Self {
            source,
            original: &machine.config,
            options: machine.options.as_ref(),
            setup: machine.setup.as_ref(),
            draft: machine.config.clone(),
            extraction: extract_config(&machine.config, machine.options.as_ref(), machine.setup.as_ref()),
            style,
            flavor,
        }
    }

    /// Digraph of the current draft.
    pub fn digraph(&self) -> &Digraph {
        &self.extraction.digraph
    }

    pub fn errors(&self) -> &[StructuralError] {
        &self.extraction.errors
    }

    pub fn draft(&self) -> &Expr {
        &self.draft
    }

    /// Resolved keyword flavor, never [`Flavor::Auto`].
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    /// Written length of the action list at `location`, counting entries
    /// that did not parse. A missing list is empty.
    pub fn action_count(&self, location: &ActionLocation) -> usize {
        match location {
            ActionLocation::Entry { state } | ActionLocation::Exit { state } => {
                let (successor, legacy) = match location {
                    ActionLocation::Entry { .. } => ("entry", "onEntry"),
                    _ => ("exit", "onExit"),
                };
                state_props(&self.draft, state).map_or(0, |props| {
                    list_len(props, effective_key(props, successor, legacy).unwrap_or(successor))
                })
            }
            ActionLocation::Transition { source, transition } => transition_item(&self.draft, source, transition)
                .ok()
                .and_then(Expr::as_object)
                .map_or(0, |props| list_len(props, "actions")),
        }
    }

    /// Written length of the `invoke` list of `state`.
    pub fn invoke_count(&self, state: &[String]) -> usize {
        state_props(&self.draft, state).map_or(0, |props| list_len(props, "invoke"))
    }

    pub fn apply(&mut self, edit: &MachineEdit) -> EditResult<()> {
        debug!(kind = edit.kind(), "applying edit");
        let mut draft = self.draft.clone();
        self.plan(&mut draft, edit)?;
        self.extraction = extract_config(&draft, self.options, self.setup);
        self.draft = draft;
        Ok(())
    }

    /// Apply edits in order, stopping at the first failure. Edits applied
    /// before the failure are kept.
    pub fn apply_all(&mut self, edits: &[MachineEdit]) -> EditResult<()> {
        edits.iter().try_for_each(|edit| self.apply(edit))
    }

    /// Text edits turning the original source into the current draft.
    pub fn text_edits(&self) -> EditResult<Vec<TextEdit>> {
        Splicer::new(self.source, self.original, &self.style).diff(&self.draft)
    }

    /// The whole source with [`Self::text_edits`] applied.
    pub fn edited_text(&self) -> EditResult<String> {
        apply_text_edits(self.source, &self.text_edits()?)
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    fn plan(&self, draft: &mut Expr, edit: &MachineEdit) -> EditResult<()> {
        match edit {
            MachineEdit::AddState { parent, name } => self.add_state(draft, parent, name),
            MachineEdit::RemoveState { path } => self.remove_state(draft, path),
            MachineEdit::RenameState { path, name } => self.rename_state(draft, path, name),
            MachineEdit::ReparentState { path, new_parent } => self.reparent_state(draft, path, new_parent),
            MachineEdit::SetInitialState { path, initial } => self.set_initial(draft, path, initial.as_deref()),
            MachineEdit::SetStateId { path, id } => self.set_state_id(draft, path, id.as_deref()),
            MachineEdit::SetStateType {
                path,
                state_type,
                history,
            } => self.set_state_type(draft, path, *state_type, *history),
            MachineEdit::AddTransition {
                source,
                slot,
                target,
                external,
                guard,
            } => self.add_transition(draft, source, slot, target.as_deref(), *external, guard.as_deref()),
            MachineEdit::RemoveTransition { source, transition } => {
                remove_transition_in(draft, source, transition).map(|_| ())
            }
            MachineEdit::RetargetTransition {
                source,
                transition,
                targets,
            } => self.retarget(draft, source, transition, targets),
            MachineEdit::ReanchorTransition {
                source,
                transition,
                new_source,
            } => self.reanchor(draft, source, transition, new_source),
            MachineEdit::ChangeTransitionEvent {
                source,
                transition,
                slot,
            } => self.change_event(draft, source, transition, slot),
            MachineEdit::MarkTransitionExternal {
                source,
                transition,
                external,
            } => self.mark_external(draft, source, transition, *external),
            MachineEdit::AddAction { path, name } => self.add_action(draft, path, name),
            MachineEdit::RemoveAction { path } => self.remove_action(draft, path),
            MachineEdit::EditAction { path, name } => self.edit_action(draft, path, name),
            MachineEdit::AddGuard {
                source,
                transition,
                name,
            } => self.add_guard(draft, source, transition, name),
            MachineEdit::RemoveGuard { source, transition } => self.remove_guard(draft, source, transition),
            MachineEdit::EditGuard {
                source,
                transition,
                name,
            } => self.edit_guard(draft, source, transition, name),
            MachineEdit::AddInvoke { state, src, id } => self.add_invoke(draft, state, src, id.as_deref()),
            MachineEdit::RemoveInvoke { state, index } => {
                let props = state_props_mut(draft, state)?;
                list_remove(props, "invoke", *index)
                    .map(|_| ())
                    .ok_or_else(|| invoke_not_found(state, *index))
            }
            MachineEdit::EditInvoke { state, index, src, id } => {
                self.edit_invoke(draft, state, *index, src.as_deref(), id.as_deref())
            }
            MachineEdit::SetDescription {
                state,
                transition,
                description,
            } => self.set_description(draft, state, transition.as_ref(), description.as_deref()),
        }
    }

    fn node(&self, path: &[String]) -> EditResult<NodeId> {
        self.digraph().node_by_path(path).ok_or_else(|| state_not_found(path))
    }

    fn edge(&self, source: &[String], transition: &TransitionPath) -> EditResult<&Edge> {
        let node = self.node(source)?;
        self.digraph()
            .edge_at(node, transition)
            .ok_or_else(|| transition_not_found(source, transition))
    }

    fn guard_key(&self) -> &'static str {
        match self.flavor {
            Flavor::V4 => "cond",
            _ => "guard",
        }
    }

    // -------------------------------------------------------------------------
    // States
    // -------------------------------------------------------------------------

    fn add_state(&self, draft: &mut Expr, parent: &[String], name: &str) -> EditResult<()> {
        if name.is_empty() || name.contains('.') {
            return Err(EditError::InvalidEdit(format!("invalid state name '{name}'")));
        }
        let node = self.node(parent)?;
        if self.digraph().child_by_key(node, name).is_some() {
            return Err(duplicate(parent, name));
        }
        let props = state_props_mut(draft, parent)?;
        child_states_mut(props)?.push(Property::new(name, Expr::object(Vec::new())));
        Ok(())
    }

    fn remove_state(&self, draft: &mut Expr, path: &[String]) -> EditResult<()> {
        let Some((key, parent_path)) = path.split_last() else {
            return Err(EditError::InvalidEdit("cannot remove the root state".to_string()));
        };
        let graph = self.digraph();
        let node = self.node(path)?;
        let removed: FxHashSet<NodeId> = graph.subtree(node).into_iter().collect();

        let mut removals: Vec<(StatePath, TransitionPath)> = Vec::new();
        for edge in &graph.edges {
            if removed.contains(&edge.source) {
                continue;
            }
            let mut kept = Vec::new();
            let mut dropped = false;
            for descriptor in &edge.target_descriptors {
                match resolve_target(graph, edge.source, descriptor) {
                    Some(t) if removed.contains(&t) => dropped = true,
                    _ => kept.push(descriptor.clone()),
                }
            }
            if !dropped {
                continue;
            }
            let source_path = graph.node(edge.source).path.clone();
            if kept.is_empty() {
                removals.push((source_path, edge.path.clone()));
            } else {
                let item = transition_item_mut(draft, &source_path, &edge.path)?;
                set_transition_targets(item, &kept);
            }
        }
        // Later entries first so earlier indices stay valid.
        removals.sort_by(|a, b| b.1.index.cmp(&a.1.index));
        for (source, transition) in &removals {
            trace!(source = %display_path(source), %transition, "dropping transition into removed state");
            remove_transition_in(draft, source, transition)?;
        }

        let parent = state_props_mut(draft, parent_path)?;
        clear_initial_if(parent, key);
        remove_child(parent, key);
        Ok(())
    }

    fn rename_state(&self, draft: &mut Expr, path: &[String], name: &str) -> EditResult<()> {
        let Some((key, parent_path)) = path.split_last() else {
            return Err(EditError::InvalidEdit("the root state has no key".to_string()));
        };
        let node = self.node(path)?;
        if key == name {
            return Ok(());
        }
        if name.is_empty() || name.contains('.') {
            return Err(EditError::InvalidEdit(format!("invalid state name '{name}'")));
        }
        let graph = self.digraph();
        if let Some(parent) = graph.parent(node) {
            if graph.child_by_key(parent, name).is_some() {
                return Err(duplicate(parent_path, name));
            }
        }

        let parent = state_props_mut(draft, parent_path)?;
        if let Some(initial) = initial_target_mut(parent) {
            if initial.as_str() == key.as_str() {
                *initial = name.to_string();
            }
        }
        let states = get_value_mut(parent, "states")
            .and_then(Expr::as_object_mut)
            .ok_or_else(|| state_not_found(path))?;
        let prop = get_prop_mut(states, key).ok_or_else(|| state_not_found(path))?;
        prop.key = key_for(name);

        let depth = path.len() - 1;
        self.rebase_descriptors(draft, |p| {
            if p.starts_with(path) {
                let mut out = p.to_vec();
                out[depth] = name.to_string();
                out
            } else {
                p.to_vec()
            }
        })
    }

    fn reparent_state(&self, draft: &mut Expr, path: &[String], new_parent: &[String]) -> EditResult<()> {
        let Some((key, parent_path)) = path.split_last() else {
            return Err(EditError::InvalidEdit("cannot move the root state".to_string()));
        };
        let node = self.node(path)?;
        let target_parent = self.node(new_parent)?;
        let graph = self.digraph();
        if graph.is_self_or_descendant(target_parent, node) {
            return Err(EditError::InvalidEdit(format!(
                "cannot move {} into its own subtree",
                display_path(path)
            )));
        }
        if graph.parent(node) == Some(target_parent) {
            return Ok(());
        }
        if graph.child_by_key(target_parent, key).is_some() {
            return Err(duplicate(new_parent, key));
        }

        let parent = state_props_mut(draft, parent_path)?;
        clear_initial_if(parent, key);
        let moved = take_child(parent, key).ok_or_else(|| state_not_found(path))?;
        let destination = state_props_mut(draft, new_parent)?;
        child_states_mut(destination)?.push(moved);

        let depth = path.len() - 1;
        self.rebase_descriptors(draft, |p| {
            if p.starts_with(path) {
                let mut out = new_parent.to_vec();
                out.extend_from_slice(&p[depth..]);
                out
            } else {
                p.to_vec()
            }
        })
    }

    /// Rewrite target descriptors broken by a structural change.
    ///
    /// Every descriptor of the pre-edit digraph is resolved, its target's
    /// path is mapped through `map_path`, and the descriptor is re-emitted in
    /// the new digraph only when it no longer resolves to the mapped state.
    fn rebase_descriptors(&self, draft: &mut Expr, map_path: impl Fn(&[String]) -> StatePath) -> EditResult<()> {
        let old = self.digraph();
        let new = extract_config(draft, self.options, self.setup).digraph;

        for edge in &old.edges {
            let source_path = map_path(&old.node(edge.source).path);
            let Some(new_source) = new.node_by_path(&source_path) else {
                continue;
            };
            let mut descriptors = edge.target_descriptors.clone();
            let mut changed = false;
            for descriptor in descriptors.iter_mut() {
                let Some(target) = resolve_target(old, edge.source, descriptor) else {
                    continue;
                };
                let Some(new_target) = new.node_by_path(&map_path(&old.node(target).path)) else {
                    continue;
                };
                if resolve_target(&new, new_source, descriptor) == Some(new_target) {
                    continue;
                }
                let rewritten = emit_preserving(&new, new_source, new_target, descriptor);
                trace!(from = %descriptor, to = %rewritten, "rewriting target descriptor");
                *descriptor = rewritten;
                changed = true;
            }
            if changed {
                let item = transition_item_mut(draft, &source_path, &edge.path)?;
                set_transition_targets(item, &descriptors);
            }
        }
        Ok(())
    }

    fn set_initial(&self, draft: &mut Expr, path: &[String], initial: Option<&str>) -> EditResult<()> {
        let node = self.node(path)?;
        let props = state_props_mut(draft, path)?;
        match initial {
            Some(key) => {
                if self.digraph().child_by_key(node, key).is_none() {
                    let mut child = path.to_vec();
                    child.push(key.to_string());
                    return Err(state_not_found(&child));
                }
                match initial_target_mut(props) {
                    Some(target) => *target = key.to_string(),
                    None => set_str(props, "initial", key),
                }
            }
            None => {
                remove_prop(props, "initial");
            }
        }
        Ok(())
    }

    fn set_state_id(&self, draft: &mut Expr, path: &[String], id: Option<&str>) -> EditResult<()> {
        let node = self.node(path)?;
        if let Some(id) = id {
            if id.is_empty() {
                return Err(EditError::InvalidEdit("state id cannot be empty".to_string()));
            }
            if self.digraph().node_by_explicit_id(id).is_some_and(|other| other != node) {
                return Err(EditError::InvalidEdit(format!("id '{id}' is already in use")));
            }
        }
        let props = state_props_mut(draft, path)?;
        match id {
            Some(id) => set_str(props, "id", id),
            None => {
                remove_prop(props, "id");
            }
        }
        self.rebase_descriptors(draft, <[String]>::to_vec)
    }

    fn set_state_type(
        &self,
        draft: &mut Expr,
        path: &[String],
        state_type: StateType,
        history: Option<HistoryType>,
    ) -> EditResult<()> {
        self.node(path)?;
        let props = state_props_mut(draft, path)?;
        remove_prop(props, "parallel");
        match state_type {
            StateType::Normal => {
                remove_prop(props, "type");
            }
            other => set_str(props, "type", other.as_str()),
        }
        match (state_type, history) {
            (StateType::History, Some(h)) => set_str(props, "history", h.as_str()),
            _ => {
                remove_prop(props, "history");
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    fn add_transition(
        &self,
        draft: &mut Expr,
        source: &[String],
        slot: &TransitionSlot,
        target: Option<&[String]>,
        external: bool,
        guard: Option<&str>,
    ) -> EditResult<()> {
        let graph = self.digraph();
        let node = self.node(source)?;
        let targets = match target {
            Some(t) => vec![self.node(t)?],
            None => Vec::new(),
        };

        let mut props = Vec::new();
        if let Some(&t) = targets.first() {
            props.push(Property::new("target", Expr::string(emit_target(graph, node, t))));
        }
        if let Some(guard) = guard {
            props.push(Property::new(self.guard_key(), Expr::string(guard)));
        }
        let mut item = Expr::object(props);
        self.sync_flag(&mut item, node, &targets, external);
        if item.as_object().is_some_and(|p| p.is_empty()) {
            item = Expr::synthetic(ExprKind::Undefined);
        }
        collapse_transition(&mut item);

        insert_transition(draft, source, slot, item)
    }

    fn retarget(
        &self,
        draft: &mut Expr,
        source: &[String],
        transition: &TransitionPath,
        targets: &[StatePath],
    ) -> EditResult<()> {
        let graph = self.digraph();
        let node = self.node(source)?;
        let external = self.edge(source, transition)?.data.internal == Some(false);
        let new_targets = targets.iter().map(|t| self.node(t)).collect::<EditResult<Vec<_>>>()?;

        let item = transition_item_mut(draft, source, transition)?;
        let previous = transition_targets(item);
        let descriptors: Vec<String> = new_targets
            .iter()
            .map(|t| {
                previous
                    .iter()
                    .find(|d| resolve_target(graph, node, d) == Some(*t))
                    .cloned()
                    .unwrap_or_else(|| emit_target(graph, node, *t))
            })
            .collect();
        set_transition_targets(item, &descriptors);
        self.sync_flag(item, node, &new_targets, external);
        collapse_transition(item);
        Ok(())
    }

    fn reanchor(
        &self,
        draft: &mut Expr,
        source: &[String],
        transition: &TransitionPath,
        new_source: &[String],
    ) -> EditResult<()> {
        let graph = self.digraph();
        let node = self.node(source)?;
        let new_node = self.node(new_source)?;
        if node == new_node {
            return Ok(());
        }
        let edge = self.edge(source, transition)?;
        let external = edge.data.internal == Some(false);

        let mut item = remove_transition_in(draft, source, transition)?;
        let descriptors: Vec<String> = transition_targets(&item)
            .into_iter()
            .map(|d| match resolve_target(graph, node, &d) {
                Some(t) => emit_target(graph, new_node, t),
                None => d,
            })
            .collect();
        set_transition_targets(&mut item, &descriptors);
        self.sync_flag(&mut item, new_node, &edge.targets, external);
        collapse_transition(&mut item);

        insert_transition(draft, new_source, &transition.slot, item)
    }

    fn change_event(
        &self,
        draft: &mut Expr,
        source: &[String],
        transition: &TransitionPath,
        slot: &TransitionSlot,
    ) -> EditResult<()> {
        self.node(source)?;
        transition_item(draft, source, transition)?;
        if *slot == transition.slot {
            return Ok(());
        }

        // A lone transition under a map key is renamed in place.
        let same_map = matches!(
            (&transition.slot, slot),
            (TransitionSlot::On { .. }, TransitionSlot::On { .. })
                | (TransitionSlot::After { .. }, TransitionSlot::After { .. })
        );
        if same_map {
            let state = state_props_mut(draft, source)?;
            if let Some(owner) = slot_owner_mut(state, &transition.slot, false) {
                let old_key = slot_key(&transition.slot);
                let new_key = slot_key(slot);
                if list_len(owner, old_key) == 1 && get_prop(owner, new_key).is_none() {
                    if let Some(index) = owner.iter().rposition(|p| p.name() == Some(old_key)) {
                        owner[index].key = key_for(new_key);
                        // Shadowed copies would become live again under the old event.
                        remove_prop(owner, old_key);
                        return Ok(());
                    }
                }
            }
        }

        let item = remove_transition_in(draft, source, transition)?;
        insert_transition(draft, source, slot, item)
    }

    fn mark_external(
        &self,
        draft: &mut Expr,
        source: &[String],
        transition: &TransitionPath,
        external: bool,
    ) -> EditResult<()> {
        let node = self.node(source)?;
        let targets = self.edge(source, transition)?.targets.clone();
        let item = transition_item_mut(draft, source, transition)?;
        self.sync_flag(item, node, &targets, external);
        collapse_transition(item);
        Ok(())
    }

    /// Write or drop the reentry flag so it states exactly what the default
    /// does not: a flag appears only for an external transition whose
    /// targets would otherwise make it internal.
    fn sync_flag(&self, item: &mut Expr, source: NodeId, targets: &[NodeId], external: bool) {
        let needed = external && default_internal(self.digraph(), source, targets);
        if !needed {
            if let Some(props) = item.as_object_mut() {
                remove_pair(props, "reenter", "internal");
            }
            return;
        }

        promote_transition(item);
        let Some(props) = item.as_object_mut() else {
            return;
        };
        let keyword = effective_key(props, "reenter", "internal").unwrap_or(match self.flavor {
            Flavor::V4 => "internal",
            _ => "reenter",
        });
        let value = keyword == "reenter";
        match get_value_mut(props, keyword) {
            Some(flag) => {
                if !matches!(flag.kind, ExprKind::Bool(b) if b == value) {
                    *flag = Expr::boolean(value);
                }
            }
            None => props.push(Property::new(keyword, Expr::boolean(value))),
        }
    }

    // -------------------------------------------------------------------------
    // Actions and guards
    // -------------------------------------------------------------------------

    fn with_actions<R>(
        &self,
        draft: &mut Expr,
        location: &ActionLocation,
        create: bool,
        f: impl FnOnce(&mut Vec<Property>, &'static str) -> EditResult<R>,
    ) -> EditResult<R> {
        match location {
            ActionLocation::Entry { state } | ActionLocation::Exit { state } => {
                let (successor, legacy) = match location {
                    ActionLocation::Entry { .. } => ("entry", "onEntry"),
                    _ => ("exit", "onExit"),
                };
                self.node(state)?;
                let props = state_props_mut(draft, state)?;
                let key = effective_key(props, successor, legacy).unwrap_or(successor);
                f(props, key)
            }
            ActionLocation::Transition { source, transition } => {
                self.node(source)?;
                let item = transition_item_mut(draft, source, transition)?;
                if create {
                    promote_transition(item);
                }
                let result = match item.as_object_mut() {
                    Some(props) => f(props, "actions"),
                    None => f(&mut Vec::new(), "actions"),
                };
                collapse_transition(item);
                result
            }
        }
    }

    fn add_action(&self, draft: &mut Expr, path: &ActionPath, name: &str) -> EditResult<()> {
        self.with_actions(draft, &path.location, true, |props, key| {
            if path.index > list_len(props, key) {
                return Err(action_not_found(path));
            }
            list_insert(props, key, Some(path.index), Expr::string(name));
            Ok(())
        })
    }

    fn remove_action(&self, draft: &mut Expr, path: &ActionPath) -> EditResult<()> {
        self.with_actions(draft, &path.location, false, |props, key| {
            list_remove(props, key, path.index)
                .map(|_| ())
                .ok_or_else(|| action_not_found(path))
        })
    }

    fn edit_action(&self, draft: &mut Expr, path: &ActionPath, name: &str) -> EditResult<()> {
        self.with_actions(draft, &path.location, false, |props, key| {
            let item = list_item_mut(props, key, path.index).ok_or_else(|| action_not_found(path))?;
            replace_reference(item, name);
            Ok(())
        })
    }

    fn add_guard(&self, draft: &mut Expr, source: &[String], transition: &TransitionPath, name: &str) -> EditResult<()> {
        self.node(source)?;
        let item = transition_item_mut(draft, source, transition)?;
        promote_transition(item);
        let props = item
            .as_object_mut()
            .ok_or_else(|| transition_not_found(source, transition))?;
        match effective_key(props, "guard", "cond") {
            Some(key) => {
                if let Some(value) = get_value_mut(props, key) {
                    replace_reference(value, name);
                }
            }
            None => props.push(Property::new(self.guard_key(), Expr::string(name))),
        }
        Ok(())
    }

    fn remove_guard(&self, draft: &mut Expr, source: &[String], transition: &TransitionPath) -> EditResult<()> {
        self.node(source)?;
        let item = transition_item_mut(draft, source, transition)?;
        let removed = item
            .as_object_mut()
            .is_some_and(|props| remove_pair(props, "guard", "cond"));
        if !removed {
            return Err(guard_not_found(source, transition));
        }
        collapse_transition(item);
        Ok(())
    }

    fn edit_guard(&self, draft: &mut Expr, source: &[String], transition: &TransitionPath, name: &str) -> EditResult<()> {
        self.node(source)?;
        let item = transition_item_mut(draft, source, transition)?;
        let value = item
            .as_object_mut()
            .and_then(|props| {
                let key = effective_key(props, "guard", "cond")?;
                get_value_mut(props, key)
            })
            .ok_or_else(|| guard_not_found(source, transition))?;
        replace_reference(value, name);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invocations and descriptions
    // -------------------------------------------------------------------------

    fn add_invoke(&self, draft: &mut Expr, state: &[String], src: &str, id: Option<&str>) -> EditResult<()> {
        self.node(state)?;
        let mut props = vec![Property::new("src", Expr::string(src))];
        if let Some(id) = id {
            props.push(Property::new("id", Expr::string(id)));
        }
        let state_props = state_props_mut(draft, state)?;
        list_insert(state_props, "invoke", None, Expr::object(props));
        Ok(())
    }

    fn edit_invoke(
        &self,
        draft: &mut Expr,
        state: &[String],
        index: usize,
        src: Option<&str>,
        id: Option<&str>,
    ) -> EditResult<()> {
        self.node(state)?;
        let props = state_props_mut(draft, state)?;
        let invoke = list_item_mut(props, "invoke", index)
            .and_then(Expr::as_object_mut)
            .ok_or_else(|| invoke_not_found(state, index))?;
        if let Some(src) = src {
            match get_value_mut(invoke, "src") {
                Some(value) => replace_reference(value, src),
                None => invoke.push(Property::new("src", Expr::string(src))),
            }
        }
        if let Some(id) = id {
            set_str(invoke, "id", id);
        }
        Ok(())
    }

    fn set_description(
        &self,
        draft: &mut Expr,
        state: &[String],
        transition: Option<&TransitionPath>,
        description: Option<&str>,
    ) -> EditResult<()> {
        self.node(state)?;
        let Some(transition) = transition else {
            let props = state_props_mut(draft, state)?;
            match description {
                Some(text) => set_str(props, "description", text),
                None => {
                    remove_prop(props, "description");
                }
            }
            return Ok(());
        };

        let item = transition_item_mut(draft, state, transition)?;
        match description {
            Some(text) => {
                promote_transition(item);
                if let Some(props) = item.as_object_mut() {
                    set_str(props, "description", text);
                }
            }
            None => {
                if let Some(props) = item.as_object_mut() {
                    remove_prop(props, "description");
                }
                collapse_transition(item);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn detect_flavor(machine: &MachineLiteral) -> Flavor {
    if machine.setup.is_some() || has_key(&machine.config, &["guard", "reenter"]) {
        Flavor::V5
    } else if machine.callee == "Machine" || has_key(&machine.config, &["cond", "internal", "onEntry", "onExit"]) {
        Flavor::V4
    } else {
        Flavor::V5
    }
}

fn has_key(expr: &Expr, keys: &[&str]) -> bool {
    match &expr.kind {
        ExprKind::Object(props) => props
            .iter()
            .any(|p| p.name().is_some_and(|n| keys.contains(&n)) || has_key(&p.value, keys)),
        ExprKind::Array(items) => items.iter().any(|i| has_key(i, keys)),
        _ => false,
    }
}

fn key_for(name: &str) -> PropKey {
    if is_valid_identifier(name) {
        PropKey::Ident(name.to_string())
    } else {
        PropKey::Str(name.to_string())
    }
}

/// Set a string-valued property, editing an existing string literal in
/// place so its position and quotes are kept.
fn set_str(props: &mut Vec<Property>, key: &str, value: &str) {
    match get_value_mut(props, key) {
        Some(Expr {
            kind: ExprKind::Str(s), ..
        }) => {
            if s.as_str() != value {
                *s = value.to_string();
            }
        }
        Some(other) => *other = Expr::string(value),
        None => props.push(Property::new(key, Expr::string(value))),
    }
}

/// Point an implementation reference at `name`, keeping the `{ type, params }`
/// form when it is used.
fn replace_reference(item: &mut Expr, name: &str) {
    if let ExprKind::Str(s) = &mut item.kind {
        *s = name.to_string();
        return;
    }
    if let Some(props) = item.as_object_mut() {
        if get_prop(props, "type").is_some() {
            set_str(props, "type", name);
            return;
        }
    }
    *item = Expr::string(name);
}

/// The target of `initial`, written either as `'key'` or `{ target: 'key' }`.
fn initial_target_mut(props: &mut [Property]) -> Option<&mut String> {
    let initial = get_value_mut(props, "initial")?;
    let target = if initial.as_object().is_some() {
        get_value_mut(initial.as_object_mut()?, "target")?
    } else {
        initial
    };
    match &mut target.kind {
        ExprKind::Str(s) => Some(s),
        _ => None,
    }
}

fn clear_initial_if(parent: &mut Vec<Property>, key: &str) {
    if initial_target_mut(parent).is_some_and(|target| target.as_str() == key) {
        remove_prop(parent, "initial");
    }
}

/// Detach the effective child property `key`, dropping shadowed duplicates
/// and an emptied `states` object.
fn take_child(parent: &mut Vec<Property>, key: &str) -> Option<Property> {
    let states = get_value_mut(parent, "states")?.as_object_mut()?;
    let index = states.iter().rposition(|p| p.name() == Some(key))?;
    let child = states.remove(index);
    remove_prop(states, key);
    if states.is_empty() {
        remove_prop(parent, "states");
    }
    Some(child)
}

fn remove_child(parent: &mut Vec<Property>, key: &str) {
    take_child(parent, key);
}

fn remove_transition_in(draft: &mut Expr, source: &[String], transition: &TransitionPath) -> EditResult<Expr> {
    let state = state_props_mut(draft, source)?;
    let owner =
        slot_owner_mut(state, &transition.slot, false).ok_or_else(|| transition_not_found(source, transition))?;
    let item = list_remove(owner, slot_key(&transition.slot), transition.index)
        .ok_or_else(|| transition_not_found(source, transition))?;
    prune_slot_map(state, &transition.slot);
    Ok(item)
}

fn insert_transition(draft: &mut Expr, source: &[String], slot: &TransitionSlot, item: Expr) -> EditResult<()> {
    let state = state_props_mut(draft, source)?;
    let owner = slot_owner_mut(state, slot, true).ok_or_else(|| match slot {
        TransitionSlot::InvokeDone { invoke } | TransitionSlot::InvokeError { invoke } => {
            invoke_not_found(source, *invoke)
        }
        _ => EditError::Unsupported(format!("`{slot}` is not stored in an object literal")),
    })?;
    list_insert(owner, slot_key(slot), None, item);
    Ok(())
}

fn duplicate(parent: &[String], key: &str) -> EditError {
    EditError::DuplicateState {
        parent: display_path(parent),
        key: key.to_string(),
    }
}

fn invoke_not_found(state: &[String], index: usize) -> EditError {
    EditError::InvokeNotFound {
        state: display_path(state),
        index,
    }
}

fn action_not_found(path: &ActionPath) -> EditError {
    EditError::ActionNotFound {
        location: path.location.to_string(),
        index: path.index,
    }
}

fn guard_not_found(source: &[String], transition: &TransitionPath) -> EditError {
    EditError::GuardNotFound {
        state: display_path(source),
        transition: transition.to_string(),
    }
}
