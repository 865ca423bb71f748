//! Navigation and shape-preserving mutation of a draft config tree.

use crate::ast::{get_prop, get_value, get_value_mut, remove_prop, set_value, Expr, ExprKind, Property};
use crate::digraph::{TransitionPath, TransitionSlot};
use crate::error::{display_path, EditError};

pub(crate) fn state_not_found(path: &[String]) -> EditError {
    EditError::StateNotFound {
        path: display_path(path),
    }
}

pub(crate) fn transition_not_found(path: &[String], transition: &TransitionPath) -> EditError {
    EditError::TransitionNotFound {
        state: display_path(path),
        transition: transition.to_string(),
    }
}

/// Properties of the state at `path`.
pub(crate) fn state_props<'d>(root: &'d Expr, path: &[String]) -> Result<&'d [Property], EditError> {
    let mut cur = root.as_object().ok_or_else(|| state_not_found(path))?;
    for key in path {
        cur = get_value(cur, "states")
            .and_then(Expr::as_object)
            .and_then(|states| get_value(states, key))
            .and_then(Expr::as_object)
            .ok_or_else(|| state_not_found(path))?;
    }
    Ok(cur)
}

pub(crate) fn state_props_mut<'d>(root: &'d mut Expr, path: &[String]) -> Result<&'d mut Vec<Property>, EditError> {
    let mut cur = root.as_object_mut().ok_or_else(|| state_not_found(path))?;
    for key in path {
        cur = get_value_mut(cur, "states")
            .and_then(Expr::as_object_mut)
            .and_then(|states| get_value_mut(states, key))
            .and_then(Expr::as_object_mut)
            .ok_or_else(|| state_not_found(path))?;
    }
    Ok(cur)
}

/// The `states` object of a state, created when missing.
pub(crate) fn child_states_mut(props: &mut Vec<Property>) -> Result<&mut Vec<Property>, EditError> {
    if get_prop(props, "states").is_none() {
        props.push(Property::new("states", Expr::object(Vec::new())));
    }
    get_value_mut(props, "states")
        .and_then(Expr::as_object_mut)
        .ok_or_else(|| EditError::Unsupported("`states` is not an object literal".to_string()))
}

/// The key in effect for a legacy/successor pair: the successor when
/// present, otherwise the legacy one.
pub(crate) fn effective_key(props: &[Property], successor: &'static str, legacy: &'static str) -> Option<&'static str> {
    if get_prop(props, successor).is_some() {
        Some(successor)
    } else if get_prop(props, legacy).is_some() {
        Some(legacy)
    } else {
        None
    }
}

/// Remove both keys of a legacy/successor pair.
pub(crate) fn remove_pair(props: &mut Vec<Property>, successor: &str, legacy: &str) -> bool {
    let a = remove_prop(props, successor);
    let b = remove_prop(props, legacy);
    a || b
}

// =============================================================================
// One-or-many lists
// =============================================================================

/// Number of entries of a list-valued property: `x` counts as one,
/// `[x, y]` as two.
pub(crate) fn list_len(props: &[Property], key: &str) -> usize {
    match get_value(props, key) {
        None => 0,
        Some(Expr {
            kind: ExprKind::Array(items),
            ..
        }) => items.len(),
        Some(_) => 1,
    }
}

pub(crate) fn list_item<'d>(props: &'d [Property], key: &str, index: usize) -> Option<&'d Expr> {
    let value = get_value(props, key)?;
    match &value.kind {
        ExprKind::Array(items) => items.get(index),
        _ => (index == 0).then_some(value),
    }
}

pub(crate) fn list_item_mut<'d>(props: &'d mut [Property], key: &str, index: usize) -> Option<&'d mut Expr> {
    let value = get_value_mut(props, key)?;
    if value.as_array().is_some() {
        return value.as_array_mut()?.get_mut(index);
    }
    (index == 0).then_some(value)
}

/// Insert `item` at `index` (append when `None` or past the end). A bare
/// value is promoted to an array only when a second entry arrives; the
/// existing element keeps its origin.
pub(crate) fn list_insert(props: &mut Vec<Property>, key: &str, index: Option<usize>, item: Expr) {
    let Some(value) = get_value_mut(props, key) else {
        props.push(Property::new(key, item));
        return;
    };
    match value.as_array_mut() {
        Some(items) => {
            let at = index.map_or(items.len(), |i| i.min(items.len()));
            items.insert(at, item);
        }
        None => {
            let old = std::mem::replace(value, Expr::synthetic(ExprKind::Undefined));
            let items = if index == Some(0) { vec![item, old] } else { vec![old, item] };
            *value = Expr::array(items);
        }
    }
}

/// Remove entry `index`. One remaining entry is demoted to the bare form;
/// no remaining entries removes the property.
pub(crate) fn list_remove(props: &mut Vec<Property>, key: &str, index: usize) -> Option<Expr> {
    let value = get_value_mut(props, key)?;
    let removed = match value.as_array_mut() {
        Some(items) => {
            if index >= items.len() {
                return None;
            }
            let removed = items.remove(index);
            match items.len() {
                0 => {
                    remove_prop(props, key);
                }
                1 => {
                    let last = items.pop()?;
                    *value = last;
                }
                _ => {}
            }
            removed
        }
        None => {
            if index != 0 {
                return None;
            }
            let removed = value.clone();
            remove_prop(props, key);
            removed
        }
    };
    Some(removed)
}

// =============================================================================
// Transition slots
// =============================================================================

fn map_key(slot: &TransitionSlot) -> Option<(&'static str, &str)> {
    match slot {
        TransitionSlot::On { event } => Some(("on", event)),
        TransitionSlot::After { delay } => Some(("after", delay)),
        _ => None,
    }
}

/// Key under which `slot` is stored, within the object returned by
/// [`slot_owner_mut`].
pub(crate) fn slot_key(slot: &TransitionSlot) -> &str {
    match slot {
        TransitionSlot::On { event } => event,
        TransitionSlot::After { delay } => delay,
        TransitionSlot::Always => "always",
        TransitionSlot::OnDone | TransitionSlot::InvokeDone { .. } => "onDone",
        TransitionSlot::InvokeError { .. } => "onError",
    }
}

pub(crate) fn slot_owner<'d>(state: &'d [Property], slot: &TransitionSlot) -> Option<&'d [Property]> {
    match slot {
        TransitionSlot::On { .. } | TransitionSlot::After { .. } => {
            let (map, _) = map_key(slot)?;
            get_value(state, map)?.as_object()
        }
        TransitionSlot::Always | TransitionSlot::OnDone => Some(state),
        TransitionSlot::InvokeDone { invoke } | TransitionSlot::InvokeError { invoke } => {
            list_item(state, "invoke", *invoke)?.as_object()
        }
    }
}

/// Object holding the slot's key: the state itself, its `on`/`after` map or
/// an invoke entry. Maps are created when `create` is set.
pub(crate) fn slot_owner_mut<'d>(
    state: &'d mut Vec<Property>,
    slot: &TransitionSlot,
    create: bool,
) -> Option<&'d mut Vec<Property>> {
    match slot {
        TransitionSlot::On { .. } | TransitionSlot::After { .. } => {
            let (map, _) = map_key(slot)?;
            if create && get_prop(state, map).is_none() {
                state.push(Property::new(map, Expr::object(Vec::new())));
            }
            get_value_mut(state, map)?.as_object_mut()
        }
        TransitionSlot::Always | TransitionSlot::OnDone => Some(state),
        TransitionSlot::InvokeDone { invoke } | TransitionSlot::InvokeError { invoke } => {
            list_item_mut(state, "invoke", *invoke)?.as_object_mut()
        }
    }
}

/// Drop an `on`/`after` map left empty by a removal.
pub(crate) fn prune_slot_map(state: &mut Vec<Property>, slot: &TransitionSlot) {
    if let Some((map, _)) = map_key(slot) {
        if get_value(state, map)
            .and_then(Expr::as_object)
            .is_some_and(|m| m.is_empty())
        {
            remove_prop(state, map);
        }
    }
}

pub(crate) fn transition_item<'d>(root: &'d Expr, source: &[String], path: &TransitionPath) -> Result<&'d Expr, EditError> {
    let state = state_props(root, source)?;
    slot_owner(state, &path.slot)
        .and_then(|owner| list_item(owner, slot_key(&path.slot), path.index))
        .ok_or_else(|| transition_not_found(source, path))
}

pub(crate) fn transition_item_mut<'d>(
    root: &'d mut Expr,
    source: &[String],
    path: &TransitionPath,
) -> Result<&'d mut Expr, EditError> {
    let state = state_props_mut(root, source)?;
    slot_owner_mut(state, &path.slot, false)
        .and_then(|owner| list_item_mut(owner, slot_key(&path.slot), path.index))
        .ok_or_else(|| transition_not_found(source, path))
}

/// Turn a bare transition (`'a'`, `undefined`) into an object literal so
/// properties can be added to it.
pub(crate) fn promote_transition(item: &mut Expr) {
    match item.kind {
        ExprKind::Object(_) => {}
        ExprKind::Str(_) => {
            let target = std::mem::replace(item, Expr::synthetic(ExprKind::Undefined));
            *item = Expr::object(vec![Property::new("target", target)]);
        }
        _ => *item = Expr::object(Vec::new()),
    }
}

/// Collapse `{ target: 'a' }` back to `'a'`.
pub(crate) fn collapse_transition(item: &mut Expr) {
    let collapsible = matches!(
        item.as_object(),
        Some([only]) if only.name() == Some("target") && matches!(only.value.kind, ExprKind::Str(_))
    );
    if collapsible {
        if let Some(mut props) = item.as_object_mut().map(std::mem::take) {
            if let Some(only) = props.pop() {
                *item = only.value;
            }
        }
    }
}

/// Target descriptors written on a transition item.
pub(crate) fn transition_targets(item: &Expr) -> Vec<String> {
    let target = match &item.kind {
        ExprKind::Str(s) => return vec![s.clone()],
        ExprKind::Object(props) => get_value(props, "target"),
        _ => None,
    };
    match target.map(|t| &t.kind) {
        Some(ExprKind::Str(s)) => vec![s.clone()],
        Some(ExprKind::Array(items)) => items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}

/// Rewrite the targets of a transition item, keeping existing string nodes
/// whose text is unchanged.
pub(crate) fn set_transition_targets(item: &mut Expr, descriptors: &[String]) {
    if descriptors.len() == 1 {
        if let ExprKind::Str(s) = &item.kind {
            if *s != descriptors[0] {
                *item = Expr::string(descriptors[0].clone());
            }
            return;
        }
    }
    if descriptors.is_empty() && matches!(item.kind, ExprKind::Str(_)) {
        *item = Expr::synthetic(ExprKind::Undefined);
        return;
    }

    promote_transition(item);
    let Some(props) = item.as_object_mut() else {
        return;
    };
    let existing: Vec<Expr> = match get_value(props, "target").map(|t| &t.kind) {
        Some(ExprKind::Str(_)) => get_value(props, "target").cloned().into_iter().collect(),
        Some(ExprKind::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    let reuse = |text: &str| {
        existing
            .iter()
            .find(|e| e.as_str() == Some(text))
            .cloned()
            .unwrap_or_else(|| Expr::string(text))
    };
    match descriptors {
        [] => {
            remove_prop(props, "target");
        }
        [one] => set_value(props, "target", reuse(one)),
        many => {
            let items: Vec<Expr> = many.iter().map(|d| reuse(d)).collect();
            match get_value_mut(props, "target").and_then(Expr::as_array_mut) {
                Some(array) => *array = items,
                None => set_value(props, "target", Expr::array(items)),
            }
        }
    }
    collapse_transition(item);
    if item.as_object().is_some_and(|p| p.is_empty()) {
        *item = Expr::synthetic(ExprKind::Undefined);
    }
}
