//! Structural extraction diagnostics.
//!
//! These never abort extraction. The offending property is treated as absent
//! and an entry is recorded next to the best-effort digraph.

use std::fmt;

use serde::Serialize;

use crate::ast::Span;
use crate::error::display_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralErrorKind {
    /// A state property has a shape extraction does not understand.
    StatePropertyUnhandled,
    /// A transition property has a shape extraction does not understand.
    TransitionPropertyUnhandled,
    /// Both a legacy keyword and its successor were written.
    PropertyMixed,
    /// A computed, spread or unknown key inside a state or transition.
    PropertyKeyUnhandled,
    /// A target descriptor that resolves to no state.
    TargetUnresolved,
}

impl StructuralErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StructuralErrorKind::StatePropertyUnhandled => "state_property_unhandled",
            StructuralErrorKind::TransitionPropertyUnhandled => "transition_property_unhandled",
            StructuralErrorKind::PropertyMixed => "property_mixed",
            StructuralErrorKind::PropertyKeyUnhandled => "property_key_unhandled",
            StructuralErrorKind::TargetUnresolved => "target_unresolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuralError {
    #[serde(rename = "type")]
    pub kind: StructuralErrorKind,
    /// State the problem was found on.
    pub path: Vec<String>,
    /// Property name (or target text for `target_unresolved`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl StructuralError {
    pub fn new(
        kind: StructuralErrorKind,
        path: &[String],
        property: Option<&str>,
        span: Option<Span>,
    ) -> Self {
        Self {
            kind,
            path: path.to_vec(),
            property: property.map(str::to_string),
            span,
        }
    }
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind.as_str(), display_path(&self.path))?;
        if let Some(property) = &self.property {
            write!(f, " ({property})")?;
        }
        Ok(())
    }
}
