//! Semantic edits and their text rendering.
//!
//! - [`ops`]: the closed edit vocabulary
//! - [`planner`]: applies edits to a draft of the config tree
//! - [`splicer`]: turns draft-vs-original differences into text edits
//! - [`print`]: quoting and indentation of new text

mod draft;
pub mod ops;
pub mod planner;
pub mod print;
pub mod splicer;

pub use ops::{ActionLocation, ActionPath, MachineEdit};
pub use planner::MachineEditor;
pub use print::Style;
pub use splicer::{apply_text_edits, normalize, TextEdit};
