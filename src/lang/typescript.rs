//! TypeScript/JavaScript front end.
//!
//! Selects the tree-sitter grammar for a file, parses it with a cached
//! per-thread parser and compiles queries through a process-wide cache.

use std::cell::RefCell;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tree_sitter::{Language, Node, Parser, Query, Tree};

use crate::error::{LensError, Result};
use crate::util::format_query_error;

/// Grammar used to parse a host file.
///
/// - `TypeScript`: LANGUAGE_TYPESCRIPT (for .ts, .js, .mjs, .cjs, .mts, .cts files)
/// - `Tsx`: LANGUAGE_TSX (for .tsx and .jsx files that may contain JSX syntax)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    TypeScript,
    Tsx,
}

impl Dialect {
    /// Pick the dialect from a file extension. Unknown extensions parse as
    /// plain TypeScript, which accepts all JavaScript without JSX.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsx") | Some("jsx") => Dialect::Tsx,
            _ => Dialect::TypeScript,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::TypeScript => "typescript",
            Dialect::Tsx => "tsx",
        }
    }

    pub fn grammar(self) -> Language {
        match self {
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    fn parser(self) -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar())
            .map_err(|e| LensError::TreeSitter(e.to_string()))?;
        Ok(parser)
    }
}

// =============================================================================
// Parser Caching
// =============================================================================

thread_local! {
    /// One parser per dialect per thread. Parsers are stateful and not `Sync`.
    static PARSER_CACHE: RefCell<FxHashMap<Dialect, Parser>> = RefCell::new(FxHashMap::default());
}

/// Parse `source` with the grammar for `dialect`.
///
/// Syntax errors do not fail the parse: tree-sitter produces ERROR nodes and
/// discovery simply skips calls it cannot recognise.
pub fn parse(source: &str, dialect: Dialect) -> Result<Tree> {
    let cached = PARSER_CACHE.with(|cache| cache.borrow_mut().remove(&dialect));
    let mut parser = match cached {
        Some(mut p) => {
            p.reset();
            p
        }
        None => dialect.parser()?,
    };

    let tree = parser.parse(source, None);
    PARSER_CACHE.with(|cache| {
        cache.borrow_mut().insert(dialect, parser);
    });

    tree.ok_or_else(|| LensError::Parse {
        file: dialect.name().to_string(),
        message: "tree-sitter returned no tree".to_string(),
    })
}

// =============================================================================
// Query Caching
// =============================================================================

type QueryCacheKey = (Dialect, &'static str);

static QUERY_CACHE: Lazy<RwLock<FxHashMap<QueryCacheKey, Arc<Query>>>> =
    Lazy::new(|| RwLock::new(FxHashMap::default()));

/// Get or compile a tree-sitter query for `dialect`.
///
/// `query_kind` names the query in the cache and in error messages.
pub fn cached_query(dialect: Dialect, query_kind: &'static str, query_str: &str) -> Result<Arc<Query>> {
    let key = (dialect, query_kind);
    {
        let cache = QUERY_CACHE.read();
        if let Some(query) = cache.get(&key) {
            return Ok(Arc::clone(query));
        }
    }

    let query = Query::new(&dialect.grammar(), query_str).map_err(|e| {
        LensError::TreeSitter(format_query_error(dialect.name(), query_kind, query_str, &e))
    })?;
    let query = Arc::new(query);

    let mut cache = QUERY_CACHE.write();
    Ok(Arc::clone(cache.entry(key).or_insert(query)))
}

/// Source text covered by `node`.
#[inline]
pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}
