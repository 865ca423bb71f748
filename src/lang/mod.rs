//! Host language front end.
//!
//! Only the TypeScript family is supported: JavaScript parses with the
//! TypeScript grammar and JSX with the TSX grammar.

pub mod typescript;

pub use typescript::{cached_query, parse, Dialect};
