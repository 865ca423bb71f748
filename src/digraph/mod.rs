//! Hierarchical digraph of a machine.
//!
//! - [`types`]: arena storage of nodes, edges, blocks and implementations
//! - [`extractor`]: building a digraph from a configuration literal
//! - [`errors`]: structural diagnostics recorded during extraction

pub mod errors;
pub mod extractor;
pub mod types;

pub use errors::{StructuralError, StructuralErrorKind};
pub use extractor::{extract_config, ExtractionResult};
pub use types::{
    Block, BlockId, BlockParent, BlockProperties, BlockType, Digraph, Edge, EdgeData, EdgeId,
    EventTypeData, HistoryType, ImplementationEntry, Implementations, NodeData, NodeId, StateNode,
    StatePath, StateType, TransitionPath, TransitionSlot,
};
