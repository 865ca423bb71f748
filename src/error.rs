//! Central error types for statelit.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic
//! `Display` and `From` implementations.
//!
//! Two classes of failure exist. Structural problems found while extracting a
//! machine are *not* errors here: they are recorded as
//! [`StructuralError`](crate::digraph::StructuralError) entries next to a
//! best-effort digraph. Everything in this module is fatal for the call that
//! produced it.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ConfigError;
use crate::patch::PatchError;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum LensError {
    /// IO operation failed with path context
    #[error("IO error at {path}: {error}")]
    IoWithPath {
        error: std::io::Error,
        path: PathBuf,
    },

    /// Failed to parse a source file
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// Tree-sitter setup or query error
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    /// No machine literal at the requested index
    #[error("Machine not found: index {index} (file has {count})")]
    MachineNotFound { index: usize, count: usize },

    /// An edit was rejected by the planner or splicer
    #[error(transparent)]
    Edit(#[from] EditError),

    /// A patch set could not be translated into edits
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// Configuration file error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Convenience type alias for Results using LensError.
pub type Result<T> = std::result::Result<T, LensError>;

impl LensError {
    /// Create an IO error with path context.
    #[inline]
    pub fn io_with_path(error: std::io::Error, path: impl AsRef<Path>) -> Self {
        LensError::IoWithPath {
            error,
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Edit-time programmer errors.
///
/// These indicate that the caller asked for something the current digraph
/// cannot satisfy: a path that does not exist, an index out of range, or a
/// shape the planner cannot rewrite. The requested change is rejected outright.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("state not found: {path}")]
    StateNotFound { path: String },

    #[error("transition not found: {transition} on state {state}")]
    TransitionNotFound { state: String, transition: String },

    #[error("invoke #{index} not found on state {state}")]
    InvokeNotFound { state: String, index: usize },

    #[error("action #{index} not found in {location}")]
    ActionNotFound { location: String, index: usize },

    #[error("no guard on transition {transition} of state {state}")]
    GuardNotFound { state: String, transition: String },

    #[error("state {parent} already has a child named '{key}'")]
    DuplicateState { parent: String, key: String },

    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    #[error("unsupported edit: {0}")]
    Unsupported(String),

    #[error("overlapping text edits at {first_start}..{first_end} and {second_start}..{second_end}")]
    OverlappingEdits {
        first_start: usize,
        first_end: usize,
        second_start: usize,
        second_end: usize,
    },

    #[error("text edit {start}..{end} is outside the source (length {len})")]
    OutOfBounds { start: usize, end: usize, len: usize },
}

/// Render a state path for messages: `a.b.c`, or `(root)` for the empty path.
pub fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "(root)".to_string()
    } else {
        path.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(&[]), "(root)");
        assert_eq!(
            display_path(&["a".to_string(), "b".to_string()]),
            "a.b"
        );
    }

    #[test]
    fn test_edit_error_message() {
        let err = EditError::StateNotFound {
            path: "idle.deep".to_string(),
        };
        assert_eq!(err.to_string(), "state not found: idle.deep");
    }
}
