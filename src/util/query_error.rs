//! Tree-sitter query error formatting.
//!
//! Machine discovery compiles its query at runtime, so a grammar upgrade that
//! renames a node kind surfaces here instead of as a silent "no machines".

use tree_sitter::{QueryError, QueryErrorKind};

/// Lines of query text shown on each side of the failing line.
const CONTEXT: usize = 2;

/// Describe a query compile failure, quoting the query around the failing
/// position.
///
/// ```text
/// machine-call query rejected by the tsx grammar: invalid node type `calle` at 2:14
///      1 | (call_expression
///   >  2 |   function: (calle) @callee
///        |              ^
/// ```
pub fn format_query_error(dialect: &str, query_kind: &str, query_str: &str, error: &QueryError) -> String {
    let mut msg = format!(
        "{query_kind} query rejected by the {dialect} grammar: {}",
        kind_label(&error.kind)
    );
    if !error.message.is_empty() {
        msg.push_str(&format!(" `{}`", error.message.trim()));
    }
    msg.push_str(&format!(" at {}:{}\n", error.row + 1, error.column + 1));

    let first = error.row.saturating_sub(CONTEXT);
    for (row, line) in query_str.lines().enumerate().skip(first).take(2 * CONTEXT + 1) {
        let mark = if row == error.row { '>' } else { ' ' };
        msg.push_str(&format!("  {mark} {:>2} | {line}\n", row + 1));
        if row == error.row {
            msg.push_str(&format!("       | {}^\n", " ".repeat(error.column)));
        }
    }
    msg
}

fn kind_label(kind: &QueryErrorKind) -> &'static str {
    match kind {
        QueryErrorKind::Syntax => "syntax error",
        QueryErrorKind::NodeType => "invalid node type",
        QueryErrorKind::Field => "invalid field name",
        QueryErrorKind::Capture => "invalid capture",
        QueryErrorKind::Predicate => "invalid predicate",
        QueryErrorKind::Structure => "impossible pattern",
        QueryErrorKind::Language => "language mismatch",
    }
}
