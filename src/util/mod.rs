//! Utility modules for statelit.
//!
//! - [`query_error`]: Tree-sitter query error formatting with rich context
//! - [`text`]: memchr-backed line and trivia scanning used by the splicer

pub mod query_error;
pub mod text;

pub use query_error::format_query_error;
