//! Finding machine configuration literals in a parsed file.

use streaming_iterator::StreamingIterator;
use tracing::{debug, trace};
use tree_sitter::{Node, QueryCursor, Tree};

use super::lower::{lower_expr, unwrap_expression};
use super::types::{Expr, ExprKind, Span};
use crate::config::DiscoveryConfig;
use crate::error::{LensError, Result};
use crate::lang::typescript::{cached_query, node_text};
use crate::lang::Dialect;

const CALL_QUERY: &str = r#"
(call_expression
  function: (_) @callee
  arguments: (arguments) @args) @call
"#;

/// One machine factory call and its lowered arguments.
#[derive(Debug, Clone)]
pub struct MachineLiteral {
    /// Position among the machines of the file, in source order.
    pub index: usize,
    /// Factory name as matched: `createMachine`, `Machine`, ...
    pub callee: String,
    pub call_span: Span,
    /// The configuration object (first argument).
    pub config: Expr,
    /// Implementation options (second argument), when it is an object literal.
    pub options: Option<Expr>,
    /// Argument of an enclosing `setup({...})` call in the
    /// `setup({...}).createMachine({...})` form.
    pub setup: Option<Expr>,
}

/// Find every machine factory call whose first argument is an object literal.
pub fn find_machines(
    tree: &Tree,
    source: &str,
    dialect: Dialect,
    discovery: &DiscoveryConfig,
) -> Result<Vec<MachineLiteral>> {
    let query = cached_query(dialect, "machine-call", CALL_QUERY)?;
    let callee_idx = capture_index(&query, "callee")?;
    let args_idx = capture_index(&query, "args")?;
    let call_idx = capture_index(&query, "call")?;

    let mut found = Vec::new();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source.as_bytes());

    while let Some(m) = matches.next() {
        let mut callee = None;
        let mut args = None;
        let mut call = None;
        for capture in m.captures {
            if capture.index == callee_idx {
                callee = Some(capture.node);
            } else if capture.index == args_idx {
                args = Some(capture.node);
            } else if capture.index == call_idx {
                call = Some(capture.node);
            }
        }
        let (Some(callee), Some(args), Some(call)) = (callee, args, call) else {
            continue;
        };

        let Some(name) = factory_name(callee, source) else {
            continue;
        };
        if !discovery.factories.iter().any(|f| f == name) {
            continue;
        }

        let arg_nodes: Vec<Node> = {
            let mut walker = args.walk();
            args.named_children(&mut walker)
                .filter(|c| c.kind() != "comment")
                .collect()
        };
        let Some(config_node) = arg_nodes.first().map(|n| unwrap_expression(*n)) else {
            continue;
        };
        if config_node.kind() != "object" {
            trace!(callee = name, "skipping factory call without object literal");
            continue;
        }

        let options = arg_nodes
            .get(1)
            .map(|n| lower_expr(*n, source))
            .filter(|e| matches!(e.kind, ExprKind::Object(_)));
        let setup = setup_argument(callee, source, &discovery.setup_function);

        found.push(MachineLiteral {
            index: 0,
            callee: name.to_string(),
            call_span: Span::new(call.start_byte(), call.end_byte()),
            config: lower_expr(config_node, source),
            options,
            setup,
        });
    }

    found.sort_by_key(|m| m.call_span.start);
    for (i, machine) in found.iter_mut().enumerate() {
        machine.index = i;
    }
    debug!(count = found.len(), dialect = dialect.name(), "located machine literals");
    Ok(found)
}

fn capture_index(query: &tree_sitter::Query, name: &str) -> Result<u32> {
    query
        .capture_index_for_name(name)
        .ok_or_else(|| LensError::TreeSitter(format!("machine-call query has no @{name} capture")))
}

/// `createMachine` for `createMachine(...)`, `x.createMachine(...)` and
/// `setup(...).createMachine(...)`.
fn factory_name<'a>(callee: Node, source: &'a str) -> Option<&'a str> {
    match callee.kind() {
        "identifier" => Some(node_text(callee, source)),
        "member_expression" => callee
            .child_by_field_name("property")
            .map(|p| node_text(p, source)),
        _ => None,
    }
}

fn setup_argument(callee: Node, source: &str, setup_function: &str) -> Option<Expr> {
    if callee.kind() != "member_expression" {
        return None;
    }
    let object = unwrap_expression(callee.child_by_field_name("object")?);
    if object.kind() != "call_expression" {
        return None;
    }
    let function = object.child_by_field_name("function")?;
    if factory_name(function, source)? != setup_function {
        return None;
    }
    let args = object.child_by_field_name("arguments")?;
    let mut walker = args.walk();
    let first = args
        .named_children(&mut walker)
        .find(|c| c.kind() != "comment")?;
    let expr = lower_expr(first, source);
    matches!(expr.kind, ExprKind::Object(_)).then_some(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::get_value;
    use crate::lang::parse;

    fn locate(src: &str) -> Vec<MachineLiteral> {
        let tree = parse(src, Dialect::TypeScript).unwrap();
        find_machines(&tree, src, Dialect::TypeScript, &DiscoveryConfig::default()).unwrap()
    }

    #[test]
    fn test_finds_factories_in_source_order() {
        let src = r#"
const a = Machine({ id: 'a' });
const b = createMachine({ id: 'b' }, { actions: {} });
const c = other({ id: 'c' });
"#;
        let machines = locate(src);
        assert_eq!(machines.len(), 2);
        assert_eq!(machines[0].callee, "Machine");
        assert_eq!(machines[1].index, 1);
        assert!(machines[1].options.is_some());
        let id = get_value(machines[1].config.as_object().unwrap(), "id");
        assert_eq!(id.and_then(Expr::as_str), Some("b"));
    }

    #[test]
    fn test_setup_form() {
        let src = "export const m = setup({ actions: { track: () => {} } }).createMachine({ initial: 'a', states: { a: {} } });";
        let machines = locate(src);
        assert_eq!(machines.len(), 1);
        let setup = machines[0].setup.as_ref().unwrap();
        assert!(get_value(setup.as_object().unwrap(), "actions").is_some());
    }

    #[test]
    fn test_non_object_argument_is_skipped() {
        assert!(locate("const m = createMachine(config);").is_empty());
    }

    #[test]
    fn test_custom_factory_names() {
        let src = "const m = makeFlow({ initial: 'x' });";
        let tree = parse(src, Dialect::TypeScript).unwrap();
        let discovery = DiscoveryConfig {
            factories: vec!["makeFlow".to_string()],
            ..DiscoveryConfig::default()
        };
        let machines = find_machines(&tree, src, Dialect::TypeScript, &discovery).unwrap();
        assert_eq!(machines.len(), 1);
    }
}
