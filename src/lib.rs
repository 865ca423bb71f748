//! statelit: state-machine configuration literals as editable graphs.
//!
//! Locates `createMachine({...})`-style calls in TypeScript and JavaScript
//! sources, extracts a hierarchical digraph of states, transitions and
//! implementation blocks, and turns structural edits on that graph back into
//! minimal text edits over the original file.
//!
//! # Layers
//! - [`lang`], [`ast`]: tree-sitter parsing and lowering into an owned tree
//! - [`combinator`]: shape parsers over that tree
//! - [`digraph`]: extraction of the normalized graph
//! - [`resolve`]: reading and writing target descriptors
//! - [`edit`]: the edit vocabulary, planner and text splicer
//! - [`patch`]: id-addressed patch batches reconciled into edits
//!
//! # Example
//! ```no_run
//! use statelit::{parse_source, Dialect, LensConfig};
//!
//! let config = LensConfig::default();
//! let file = parse_source("createMachine({ initial: 'a', states: { a: {} } })", Dialect::TypeScript, &config)?;
//! let result = file.extract(0)?;
//! assert_eq!(result.digraph.nodes.len(), 2);
//! # Ok::<(), statelit::LensError>(())
//! ```

pub mod ast;
pub mod combinator;
pub mod config;
pub mod digraph;
pub mod edit;
mod error;
pub mod lang;
pub mod patch;
pub mod resolve;
pub mod util;

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;

pub use ast::{find_machines, Expr, MachineLiteral, Origin, Span};
pub use config::{discover_and_load_config, Flavor, LensConfig};
pub use digraph::{
    extract_config, BlockId, Digraph, EdgeId, ExtractionResult, NodeId, StatePath, StructuralError,
    TransitionPath, TransitionSlot,
};
pub use edit::{apply_text_edits, ActionPath, MachineEdit, MachineEditor, TextEdit};
pub use error::{display_path, EditError, LensError, Result};
pub use lang::Dialect;
pub use patch::{reconcile, Patch, PatchError, Reconciler};

/// A parsed source file and the machine literals found in it.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: Option<PathBuf>,
    pub text: String,
    pub dialect: Dialect,
    pub machines: Vec<MachineLiteral>,
}

/// Parse `text` and locate its machine literals.
pub fn parse_source(text: impl Into<String>, dialect: Dialect, config: &LensConfig) -> Result<SourceFile> {
    let text = text.into();
    let tree = lang::parse(&text, dialect)?;
    let machines = find_machines(&tree, &text, dialect, &config.discovery)?;
    Ok(SourceFile {
        path: None,
        text,
        dialect,
        machines,
    })
}

/// Read and parse a file; the dialect follows the file extension.
pub fn parse_file(path: &Path, config: &LensConfig) -> Result<SourceFile> {
    let text = std::fs::read_to_string(path).map_err(|e| LensError::io_with_path(e, path))?;
    let mut file = parse_source(text, Dialect::from_path(path), config)?;
    file.path = Some(path.to_path_buf());
    debug!(path = %path.display(), machines = file.machines.len(), "parsed source file");
    Ok(file)
}

impl SourceFile {
    pub fn machine(&self, index: usize) -> Result<&MachineLiteral> {
        self.machines.get(index).ok_or(LensError::MachineNotFound {
            index,
            count: self.machines.len(),
        })
    }

    pub fn extract(&self, index: usize) -> Result<ExtractionResult> {
        let m = self.machine(index)?;
        Ok(extract_config(&m.config, m.options.as_ref(), m.setup.as_ref()))
    }

    /// Extract every machine of the file, in source order.
    pub fn extract_all(&self) -> Vec<ExtractionResult> {
        self.machines
            .iter()
            .map(|m| extract_config(&m.config, m.options.as_ref(), m.setup.as_ref()))
            .collect()
    }

    /// Open an editing session on one machine.
    pub fn editor<'s>(&'s self, index: usize, config: &LensConfig) -> Result<MachineEditor<'s>> {
        Ok(MachineEditor::new(&self.text, self.machine(index)?, config))
    }

    /// Apply `edits` in order and return the text edits they amount to.
    pub fn edit(&self, index: usize, edits: &[MachineEdit], config: &LensConfig) -> Result<Vec<TextEdit>> {
        let mut editor = self.editor(index, config)?;
        editor.apply_all(edits)?;
        Ok(editor.text_edits()?)
    }

    /// Reconcile a patch batch and return the resulting text edits.
    pub fn reconcile(&self, index: usize, patches: &[Patch], config: &LensConfig) -> Result<Vec<TextEdit>> {
        Ok(reconcile(&self.text, self.machine(index)?, config, patches)?)
    }
}

/// Parse and extract many files on the rayon pool.
///
/// Files are independent; one failing file does not affect the others.
pub fn extract_files_parallel(
    paths: &[PathBuf],
    config: &LensConfig,
) -> Vec<(PathBuf, Result<Vec<ExtractionResult>>)> {
    paths
        .par_iter()
        .map(|path| {
            let result = parse_file(path, config).map(|file| file.extract_all());
            (path.clone(), result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_index_out_of_range() {
        let file = parse_source("const x = 1;", Dialect::TypeScript, &LensConfig::default()).unwrap();
        assert!(file.machines.is_empty());
        assert!(matches!(
            file.extract(0),
            Err(LensError::MachineNotFound { index: 0, count: 0 })
        ));
    }

    #[test]
    fn test_extract_two_machines_in_order() {
        let src = "const a = createMachine({ id: 'one' });\nconst b = Machine({ id: 'two', states: { x: {} } });";
        let file = parse_source(src, Dialect::TypeScript, &LensConfig::default()).unwrap();
        let all = file.extract_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].digraph.nodes.len(), 1);
        assert_eq!(all[1].digraph.nodes.len(), 2);
    }
}
