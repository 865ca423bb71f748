//! The closed vocabulary of machine edits.
//!
//! Every edit addresses states by path (ordered keys from the root),
//! transitions by `(source path, TransitionPath)` and actions by
//! [`ActionPath`]. Edits are validated against the digraph extracted from the
//! current draft before anything is changed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digraph::{HistoryType, StatePath, StateType, TransitionPath, TransitionSlot};
use crate::error::display_path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MachineEdit {
    AddState {
        parent: StatePath,
        name: String,
    },
    RemoveState {
        path: StatePath,
    },
    RenameState {
        path: StatePath,
        name: String,
    },
    ReparentState {
        path: StatePath,
        new_parent: StatePath,
    },
    /// `None` removes the `initial` property.
    SetInitialState {
        path: StatePath,
        initial: Option<String>,
    },
    /// `None` removes the `id` property.
    SetStateId {
        path: StatePath,
        id: Option<String>,
    },
    SetStateType {
        path: StatePath,
        state_type: StateType,
        #[serde(default)]
        history: Option<HistoryType>,
    },
    /// Append a transition to `slot` on `source`. `target: None` adds a
    /// targetless transition.
    AddTransition {
        source: StatePath,
        slot: TransitionSlot,
        #[serde(default)]
        target: Option<StatePath>,
        #[serde(default)]
        external: bool,
        #[serde(default)]
        guard: Option<String>,
    },
    RemoveTransition {
        source: StatePath,
        transition: TransitionPath,
    },
    RetargetTransition {
        source: StatePath,
        transition: TransitionPath,
        targets: Vec<StatePath>,
    },
    /// Move a transition to another source state, keeping its slot.
    ReanchorTransition {
        source: StatePath,
        transition: TransitionPath,
        new_source: StatePath,
    },
    /// Move a transition to another slot of the same state.
    ChangeTransitionEvent {
        source: StatePath,
        transition: TransitionPath,
        slot: TransitionSlot,
    },
    MarkTransitionExternal {
        source: StatePath,
        transition: TransitionPath,
        external: bool,
    },
    AddAction {
        path: ActionPath,
        name: String,
    },
    RemoveAction {
        path: ActionPath,
    },
    EditAction {
        path: ActionPath,
        name: String,
    },
    AddGuard {
        source: StatePath,
        transition: TransitionPath,
        name: String,
    },
    RemoveGuard {
        source: StatePath,
        transition: TransitionPath,
    },
    EditGuard {
        source: StatePath,
        transition: TransitionPath,
        name: String,
    },
    AddInvoke {
        state: StatePath,
        src: String,
        #[serde(default)]
        id: Option<String>,
    },
    RemoveInvoke {
        state: StatePath,
        index: usize,
    },
    EditInvoke {
        state: StatePath,
        index: usize,
        #[serde(default)]
        src: Option<String>,
        #[serde(default)]
        id: Option<String>,
    },
    /// Description of a state, or of one of its transitions. `None` removes it.
    SetDescription {
        state: StatePath,
        #[serde(default)]
        transition: Option<TransitionPath>,
        description: Option<String>,
    },
}

impl MachineEdit {
    /// Stable snake_case name of the edit kind.
    pub fn kind(&self) -> &'static str {
        match self {
            MachineEdit::AddState { .. } => "add_state",
            MachineEdit::RemoveState { .. } => "remove_state",
            MachineEdit::RenameState { .. } => "rename_state",
            MachineEdit::ReparentState { .. } => "reparent_state",
            MachineEdit::SetInitialState { .. } => "set_initial_state",
            MachineEdit::SetStateId { .. } => "set_state_id",
            MachineEdit::SetStateType { .. } => "set_state_type",
            MachineEdit::AddTransition { .. } => "add_transition",
            MachineEdit::RemoveTransition { .. } => "remove_transition",
            MachineEdit::RetargetTransition { .. } => "retarget_transition",
            MachineEdit::ReanchorTransition { .. } => "reanchor_transition",
            MachineEdit::ChangeTransitionEvent { .. } => "change_transition_event",
            MachineEdit::MarkTransitionExternal { .. } => "mark_transition_external",
            MachineEdit::AddAction { .. } => "add_action",
            MachineEdit::RemoveAction { .. } => "remove_action",
            MachineEdit::EditAction { .. } => "edit_action",
            MachineEdit::AddGuard { .. } => "add_guard",
            MachineEdit::RemoveGuard { .. } => "remove_guard",
            MachineEdit::EditGuard { .. } => "edit_guard",
            MachineEdit::AddInvoke { .. } => "add_invoke",
            MachineEdit::RemoveInvoke { .. } => "remove_invoke",
            MachineEdit::EditInvoke { .. } => "edit_invoke",
            MachineEdit::SetDescription { .. } => "set_description",
        }
    }
}

/// Where an action list lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionLocation {
    Entry { state: StatePath },
    Exit { state: StatePath },
    Transition { source: StatePath, transition: TransitionPath },
}

/// One action: its list plus the position in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionPath {
    pub location: ActionLocation,
    pub index: usize,
}

impl ActionPath {
    pub fn entry(state: StatePath, index: usize) -> Self {
        Self {
            location: ActionLocation::Entry { state },
            index,
        }
    }

    pub fn exit(state: StatePath, index: usize) -> Self {
        Self {
            location: ActionLocation::Exit { state },
            index,
        }
    }

    pub fn transition(source: StatePath, transition: TransitionPath, index: usize) -> Self {
        Self {
            location: ActionLocation::Transition { source, transition },
            index,
        }
    }
}

impl fmt::Display for ActionLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionLocation::Entry { state } => write!(f, "{}.entry", display_path(state)),
            ActionLocation::Exit { state } => write!(f, "{}.exit", display_path(state)),
            ActionLocation::Transition { source, transition } => {
                write!(f, "{}.{}.actions", display_path(source), transition)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_json_shape() {
        let edit = MachineEdit::AddAction {
            path: ActionPath::entry(vec!["idle".into()], 1),
            name: "doStuff".into(),
        };
        let json = serde_json::to_value(&edit).unwrap();
        assert_eq!(json["type"], "add_action");
        assert_eq!(json["path"]["location"]["type"], "entry");
        assert_eq!(edit.kind(), "add_action");

        let back: MachineEdit = serde_json::from_value(json).unwrap();
        assert_eq!(back, edit);
    }

    #[test]
    fn test_transition_edit_from_json() {
        let edit: MachineEdit = serde_json::from_str(
            r#"{"type":"remove_transition","source":["a"],"transition":{"slot":{"type":"on","event":"GO"},"index":0}}"#,
        )
        .unwrap();
        assert_eq!(
            edit,
            MachineEdit::RemoveTransition {
                source: vec!["a".into()],
                transition: TransitionPath::new(TransitionSlot::On { event: "GO".into() }, 0),
            }
        );
    }

    #[test]
    fn test_action_location_display() {
        let loc = ActionLocation::Transition {
            source: vec!["a".into()],
            transition: TransitionPath::new(TransitionSlot::Always, 2),
        };
        assert_eq!(loc.to_string(), "a.always[2].actions");
    }
}
