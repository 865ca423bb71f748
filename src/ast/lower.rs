//! Lowering tree-sitter syntax into [`Expr`].
//!
//! Only the shapes a configuration literal can contain get a dedicated
//! variant. Everything else becomes [`ExprKind::Other`] tagged with its node
//! kind so extraction can report it without losing its span.

use tree_sitter::Node;

use super::types::{Expr, ExprKind, Origin, PropKey, Property, Span};
use crate::lang::typescript::node_text;

#[inline]
fn span_of(node: Node) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

/// Strip TypeScript-only wrappers and parentheses around an expression.
///
/// `x as const`, `x satisfies T`, `x!`, `<T>x` and `(x)` all denote the same
/// runtime value as `x`.
pub fn unwrap_expression(mut node: Node) -> Node {
    loop {
        let inner = match node.kind() {
            "parenthesized_expression" | "non_null_expression" => {
                named_children(node).into_iter().next()
            }
            "as_expression" | "satisfies_expression" => {
                named_children(node).into_iter().next()
            }
            "type_assertion" => named_children(node).into_iter().last(),
            _ => None,
        };
        match inner {
            Some(n) => node = n,
            None => return node,
        }
    }
}

/// Lower an expression node.
pub fn lower_expr(node: Node, source: &str) -> Expr {
    let node = unwrap_expression(node);
    let origin = Origin::Source(span_of(node));
    let kind = match node.kind() {
        "object" => ExprKind::Object(lower_object(node, source)),
        "array" => ExprKind::Array(
            named_children(node)
                .into_iter()
                .map(|c| lower_expr(c, source))
                .collect(),
        ),
        "string" => ExprKind::Str(cook_string(node_text(node, source))),
        "template_string" => lower_template(node, source),
        "number" => ExprKind::Number(node_text(node, source).to_string()),
        "true" => ExprKind::Bool(true),
        "false" => ExprKind::Bool(false),
        "null" => ExprKind::Null,
        "undefined" => ExprKind::Undefined,
        "identifier" if node_text(node, source) == "undefined" => ExprKind::Undefined,
        "identifier" => ExprKind::Ident(node_text(node, source).to_string()),
        "member_expression" => lower_member(node, source),
        "call_expression" => lower_call(node, source),
        "arrow_function" | "function_expression" | "function" | "generator_function" => {
            ExprKind::Function
        }
        other => ExprKind::Other(other.to_string()),
    };
    Expr { origin, kind }
}

fn lower_member(node: Node, source: &str) -> ExprKind {
    match (
        node.child_by_field_name("object"),
        node.child_by_field_name("property"),
    ) {
        (Some(object), Some(property)) => ExprKind::Member {
            object: Box::new(lower_expr(object, source)),
            property: node_text(property, source).to_string(),
        },
        _ => ExprKind::Other(node.kind().to_string()),
    }
}

fn lower_call(node: Node, source: &str) -> ExprKind {
    let Some(function) = node.child_by_field_name("function") else {
        return ExprKind::Other(node.kind().to_string());
    };
    let args = node
        .child_by_field_name("arguments")
        .filter(|a| a.kind() == "arguments")
        .map(|a| {
            named_children(a)
                .into_iter()
                .map(|c| lower_expr(c, source))
                .collect()
        })
        .unwrap_or_default();
    ExprKind::Call {
        callee: Box::new(lower_expr(function, source)),
        args,
    }
}

fn lower_template(node: Node, source: &str) -> ExprKind {
    let text = node_text(node, source);
    if named_children(node)
        .iter()
        .any(|c| c.kind() == "template_substitution")
    {
        return ExprKind::Template(text.to_string());
    }
    ExprKind::Str(cook_string(text))
}

fn lower_object(node: Node, source: &str) -> Vec<Property> {
    let mut props = Vec::new();
    for child in named_children(node) {
        let origin = Origin::Source(span_of(child));
        match child.kind() {
            "pair" => {
                let (Some(key), Some(value)) = (
                    child.child_by_field_name("key"),
                    child.child_by_field_name("value"),
                ) else {
                    continue;
                };
                props.push(Property {
                    origin,
                    key: lower_key(key, source),
                    key_span: Some(span_of(key)),
                    value: lower_expr(value, source),
                });
            }
            "shorthand_property_identifier" => {
                let name = node_text(child, source).to_string();
                props.push(Property {
                    origin,
                    key: PropKey::Ident(name.clone()),
                    key_span: Some(span_of(child)),
                    value: Expr {
                        origin,
                        kind: ExprKind::Ident(name),
                    },
                });
            }
            "method_definition" => {
                let Some(name) = child.child_by_field_name("name") else {
                    continue;
                };
                props.push(Property {
                    origin,
                    key: lower_key(name, source),
                    key_span: Some(span_of(name)),
                    value: Expr {
                        origin,
                        kind: ExprKind::Function,
                    },
                });
            }
            "spread_element" => {
                let value = named_children(child)
                    .into_iter()
                    .next()
                    .map(|c| lower_expr(c, source))
                    .unwrap_or(Expr {
                        origin,
                        kind: ExprKind::Other("spread_element".to_string()),
                    });
                props.push(Property {
                    origin,
                    key: PropKey::Spread,
                    key_span: None,
                    value,
                });
            }
            _ => {}
        }
    }
    props
}

fn lower_key(node: Node, source: &str) -> PropKey {
    let text = node_text(node, source);
    match node.kind() {
        "string" => PropKey::Str(cook_string(text)),
        "number" => PropKey::Number(text.to_string()),
        "computed_property_name" => {
            let inner = text
                .strip_prefix('[')
                .and_then(|t| t.strip_suffix(']'))
                .unwrap_or(text);
            PropKey::Computed(inner.trim().to_string())
        }
        _ => PropKey::Ident(text.to_string()),
    }
}

/// Cook a quoted string or substitution-free template literal, including its
/// delimiters, into its runtime value.
pub fn cook_string(raw: &str) -> String {
    let inner = if raw.len() >= 2 {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                push_code_point(&mut out, &hex);
            }
            Some('u') => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                push_code_point(&mut out, &hex);
            }
            // Line continuation.
            Some('\n') => {}
            Some('\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn push_code_point(out: &mut String, hex: &str) {
    match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => out.push(char::REPLACEMENT_CHARACTER),
    }
}
