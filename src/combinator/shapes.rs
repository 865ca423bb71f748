//! Shape parsers for machine configuration literals.
//!
//! The generic shapes (strings, identifiers, objects, arrays, calls) are
//! building blocks; [`implementation_parser`] and [`TransitionItemParser`]
//! assemble them into the parsers the digraph extractor uses.

use serde_json::Value;

use super::{and_then, wrap, ExprParser, ParseContext, Union};
use crate::ast::{get_value, Expr, ExprKind, Property};

// =============================================================================
// Leaf shapes
// =============================================================================

/// String literal (including substitution-free template literals).
pub struct StringLiteral;

impl<'a> ExprParser<'a> for StringLiteral {
    type Output = String;

    fn matches(&self, expr: &'a Expr) -> bool {
        matches!(expr.kind, ExprKind::Str(_))
    }

    fn parse(&self, expr: &'a Expr, _ctx: &mut ParseContext) -> Option<String> {
        expr.as_str().map(str::to_string)
    }
}

/// Bare identifier reference.
pub struct Identifier;

impl<'a> ExprParser<'a> for Identifier {
    type Output = &'a str;

    fn matches(&self, expr: &'a Expr) -> bool {
        matches!(expr.kind, ExprKind::Ident(_))
    }

    fn parse(&self, expr: &'a Expr, _ctx: &mut ParseContext) -> Option<&'a str> {
        match &expr.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }
}

/// Boolean literal.
pub struct BooleanLiteral;

impl<'a> ExprParser<'a> for BooleanLiteral {
    type Output = bool;

    fn matches(&self, expr: &'a Expr) -> bool {
        matches!(expr.kind, ExprKind::Bool(_))
    }

    fn parse(&self, expr: &'a Expr, _ctx: &mut ParseContext) -> Option<bool> {
        match expr.kind {
            ExprKind::Bool(b) => Some(b),
            _ => None,
        }
    }
}

/// Arrow function, function expression or method.
pub struct FunctionLike;

impl<'a> ExprParser<'a> for FunctionLike {
    type Output = &'a Expr;

    fn matches(&self, expr: &'a Expr) -> bool {
        matches!(expr.kind, ExprKind::Function)
    }

    fn parse(&self, expr: &'a Expr, _ctx: &mut ParseContext) -> Option<&'a Expr> {
        Some(expr)
    }
}

/// Fallback that accepts every node. Always the last arm of a union.
pub struct AnyNode;

impl<'a> ExprParser<'a> for AnyNode {
    type Output = &'a Expr;

    fn matches(&self, _expr: &'a Expr) -> bool {
        true
    }

    fn parse(&self, expr: &'a Expr, _ctx: &mut ParseContext) -> Option<&'a Expr> {
        Some(expr)
    }
}

// =============================================================================
// Containers
// =============================================================================

/// Object literal, exposing its property list.
pub struct ObjectShape;

impl<'a> ExprParser<'a> for ObjectShape {
    type Output = &'a [Property];

    fn matches(&self, expr: &'a Expr) -> bool {
        matches!(expr.kind, ExprKind::Object(_))
    }

    fn parse(&self, expr: &'a Expr, _ctx: &mut ParseContext) -> Option<&'a [Property]> {
        expr.as_object()
    }
}

/// Parsed items of an [`ArrayOf`] or [`MaybeArrayOf`].
///
/// Each entry keeps the node it came from; `value` is `None` for items the
/// inner parser rejected so the caller can report them.
#[derive(Debug)]
pub struct Many<'a, O> {
    pub items: Vec<Item<'a, O>>,
    pub is_array: bool,
}

#[derive(Debug)]
pub struct Item<'a, O> {
    pub expr: &'a Expr,
    pub value: Option<O>,
}

/// `[a, b, c]` where every element is parsed by `P`.
pub struct ArrayOf<P>(pub P);

impl<'a, P: ExprParser<'a>> ExprParser<'a> for ArrayOf<P> {
    type Output = Many<'a, P::Output>;

    fn matches(&self, expr: &'a Expr) -> bool {
        matches!(expr.kind, ExprKind::Array(_))
    }

    fn parse(&self, expr: &'a Expr, ctx: &mut ParseContext) -> Option<Self::Output> {
        let items = expr
            .as_array()?
            .iter()
            .map(|item| Item {
                expr: item,
                value: if self.0.matches(item) {
                    self.0.parse(item, ctx)
                } else {
                    None
                },
            })
            .collect();
        Some(Many {
            items,
            is_array: true,
        })
    }
}

/// Either `x` or `[x, ...]`. A singular value that `P` rejects is still
/// returned (with `value: None`) so the caller can report it.
pub struct MaybeArrayOf<P>(pub P);

impl<'a, P: ExprParser<'a>> ExprParser<'a> for MaybeArrayOf<P> {
    type Output = Many<'a, P::Output>;

    fn matches(&self, _expr: &'a Expr) -> bool {
        true
    }

    fn parse(&self, expr: &'a Expr, ctx: &mut ParseContext) -> Option<Self::Output> {
        if matches!(expr.kind, ExprKind::Array(_)) {
            return ArrayOf(&self.0).parse(expr, ctx);
        }
        let value = if self.0.matches(expr) {
            self.0.parse(expr, ctx)
        } else {
            None
        };
        Some(Many {
            items: vec![Item { expr, value }],
            is_array: false,
        })
    }
}

/// Call whose callee name (identifier, or member property) is in `names`.
pub struct NamedCall {
    pub names: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct CallView<'a> {
    pub name: &'a str,
    pub args: &'a [Expr],
}

pub fn callee_name(callee: &Expr) -> Option<&str> {
    match &callee.kind {
        ExprKind::Ident(name) => Some(name),
        ExprKind::Member { property, .. } => Some(property),
        _ => None,
    }
}

impl<'a> ExprParser<'a> for NamedCall {
    type Output = CallView<'a>;

    fn matches(&self, expr: &'a Expr) -> bool {
        match &expr.kind {
            ExprKind::Call { callee, .. } => {
                callee_name(callee).is_some_and(|n| self.names.contains(&n))
            }
            _ => false,
        }
    }

    fn parse(&self, expr: &'a Expr, _ctx: &mut ParseContext) -> Option<CallView<'a>> {
        match &expr.kind {
            ExprKind::Call { callee, args } => Some(CallView {
                name: callee_name(callee)?,
                args,
            }),
            _ => None,
        }
    }
}

// =============================================================================
// Implementation references
// =============================================================================

/// Which registry an implementation reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplementationKind {
    Action,
    Guard,
    Actor,
}

impl ImplementationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImplementationKind::Action => "action",
            ImplementationKind::Guard => "guard",
            ImplementationKind::Actor => "actor",
        }
    }

    /// Creator functions whose calls are inline implementations of this kind.
    pub fn builtins(self) -> &'static [&'static str] {
        match self {
            ImplementationKind::Action => &[
                "assign",
                "send",
                "sendTo",
                "sendParent",
                "raise",
                "log",
                "choose",
                "pure",
                "stop",
                "stopChild",
                "forwardTo",
                "escalate",
                "respond",
                "cancel",
                "emit",
                "enqueueActions",
                "spawnChild",
            ],
            ImplementationKind::Guard => &["and", "or", "not", "stateIn"],
            ImplementationKind::Actor => &[
                "fromPromise",
                "fromCallback",
                "fromObservable",
                "fromEventObservable",
                "fromTransition",
                "createMachine",
            ],
        }
    }
}

/// A parsed action, guard or actor reference.
#[derive(Debug, Clone, PartialEq)]
pub enum ImplementationRef<'a> {
    /// `'name'` or `{ type: 'name', params }`.
    Named { name: String, params: Option<Value> },
    /// A call to one of the kind's builtin creators, e.g. `assign({...})`.
    Builtin {
        id: String,
        creator: &'a str,
        expr: &'a Expr,
    },
    /// Function, identifier or any other call expression.
    Inline { id: String, expr: &'a Expr },
}

impl ImplementationRef<'_> {
    /// Registry key.
    pub fn source_id(&self) -> &str {
        match self {
            ImplementationRef::Named { name, .. } => name,
            ImplementationRef::Builtin { id, .. } | ImplementationRef::Inline { id, .. } => id,
        }
    }
}

/// Parser for one action, guard or actor reference.
///
/// Precedence:
/// 1. string literal (named reference)
/// 2. object with a string `type` (named reference with params)
/// 3. call to a builtin creator of `kind`
/// 4. function, identifier, member expression or other call (inline)
///
/// Anything else, such as `undefined` or a number, does not match.
pub fn implementation_parser<'a>(kind: ImplementationKind) -> Union<'a, ImplementationRef<'a>> {
    let kind_name = kind.as_str();
    Union::new()
        .arm(wrap(StringLiteral, |name, _, _| ImplementationRef::Named {
            name,
            params: None,
        }))
        .arm(and_then(ObjectShape, |props: &'a [Property], _, _| {
            let name = get_value(props, "type")?.as_str()?.to_string();
            let params = get_value(props, "params").map(Expr::to_json);
            Some(ImplementationRef::Named { name, params })
        }))
        .arm(wrap(
            NamedCall {
                names: kind.builtins(),
            },
            move |call: CallView<'a>, expr: &'a Expr, ctx: &mut ParseContext| {
                ImplementationRef::Builtin {
                    id: ctx.inline_id(kind_name, expr),
                    creator: call.name,
                    expr,
                }
            },
        ))
        .arm(InlineImplementation { kind: kind_name })
}

struct InlineImplementation {
    kind: &'static str,
}

impl<'a> ExprParser<'a> for InlineImplementation {
    type Output = ImplementationRef<'a>;

    fn matches(&self, expr: &'a Expr) -> bool {
        matches!(
            expr.kind,
            ExprKind::Function | ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Call { .. }
        )
    }

    fn parse(&self, expr: &'a Expr, ctx: &mut ParseContext) -> Option<ImplementationRef<'a>> {
        Some(ImplementationRef::Inline {
            id: ctx.inline_id(self.kind, expr),
            expr,
        })
    }
}

// =============================================================================
// Transitions
// =============================================================================

/// One entry of a transition slot (`on.EVENT`, `always`, `after.N`, ...).
#[derive(Debug, Clone, Copy)]
pub enum TransitionItem<'a> {
    /// `'target'`
    Target(&'a str),
    /// `undefined` / `null`: a forbidden transition with no target.
    Targetless,
    /// `{ target, guard, actions, ... }`
    Object(&'a [Property]),
}

/// Precedence: string target, then nullish, then object.
pub struct TransitionItemParser;

impl<'a> ExprParser<'a> for TransitionItemParser {
    type Output = TransitionItem<'a>;

    fn matches(&self, expr: &'a Expr) -> bool {
        matches!(
            expr.kind,
            ExprKind::Str(_) | ExprKind::Null | ExprKind::Undefined | ExprKind::Object(_)
        )
    }

    fn parse(&self, expr: &'a Expr, _ctx: &mut ParseContext) -> Option<TransitionItem<'a>> {
        match &expr.kind {
            ExprKind::Str(s) => Some(TransitionItem::Target(s)),
            ExprKind::Null | ExprKind::Undefined => Some(TransitionItem::Targetless),
            ExprKind::Object(props) => Some(TransitionItem::Object(props)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Property;

    fn call(name: &str) -> Expr {
        Expr::synthetic(ExprKind::Call {
            callee: Box::new(Expr::synthetic(ExprKind::Ident(name.to_string()))),
            args: vec![],
        })
    }

    #[test]
    fn test_named_string_action() {
        let expr = Expr::string("bark");
        let parser = implementation_parser(ImplementationKind::Action);
        let mut ctx = ParseContext::new();
        assert_eq!(
            parser.parse(&expr, &mut ctx),
            Some(ImplementationRef::Named {
                name: "bark".to_string(),
                params: None
            })
        );
    }

    #[test]
    fn test_parametrized_object_action() {
        let expr = Expr::object(vec![
            Property::new("type", Expr::string("track")),
            Property::new("params", Expr::object(vec![Property::new("n", Expr::string("x"))])),
        ]);
        let parser = implementation_parser(ImplementationKind::Action);
        let mut ctx = ParseContext::new();
        match parser.parse(&expr, &mut ctx) {
            Some(ImplementationRef::Named { name, params }) => {
                assert_eq!(name, "track");
                assert_eq!(params, Some(serde_json::json!({"n": "x"})));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_builtin_before_inline() {
        let assign = call("assign");
        let custom = call("makeAction");
        let parser = implementation_parser(ImplementationKind::Action);
        let mut ctx = ParseContext::new();
        assert!(matches!(
            parser.parse(&assign, &mut ctx),
            Some(ImplementationRef::Builtin { creator: "assign", .. })
        ));
        match parser.parse(&custom, &mut ctx) {
            Some(ImplementationRef::Inline { id, .. }) => assert_eq!(id, "inline:action-1"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_guard_builtins_differ_from_actions() {
        let not = call("not");
        let assign = call("assign");
        let parser = implementation_parser(ImplementationKind::Guard);
        let mut ctx = ParseContext::new();
        assert!(matches!(parser.parse(&not, &mut ctx), Some(ImplementationRef::Builtin { .. })));
        assert!(matches!(parser.parse(&assign, &mut ctx), Some(ImplementationRef::Inline { .. })));
    }

    #[test]
    fn test_undefined_is_rejected() {
        let expr = Expr::synthetic(ExprKind::Undefined);
        let parser = implementation_parser(ImplementationKind::Action);
        let mut ctx = ParseContext::new();
        assert!(!parser.matches(&expr));
        assert!(parser.parse(&expr, &mut ctx).is_none());
    }

    #[test]
    fn test_maybe_array_singular_and_array() {
        let single = Expr::string("a");
        let arr = Expr::array(vec![Expr::string("a"), Expr::boolean(true)]);
        let mut ctx = ParseContext::new();
        let parser = MaybeArrayOf(StringLiteral);
        let many = parser.parse(&single, &mut ctx).unwrap();
        assert!(!many.is_array);
        assert_eq!(many.items[0].value.as_deref(), Some("a"));

        let many = parser.parse(&arr, &mut ctx).unwrap();
        assert!(many.is_array);
        assert_eq!(many.items.len(), 2);
        assert!(many.items[1].value.is_none());
    }

    #[test]
    fn test_transition_items() {
        let target = Expr::string("a");
        let missing = Expr::synthetic(ExprKind::Undefined);
        let flag = Expr::boolean(true);
        let mut ctx = ParseContext::new();
        let parser = TransitionItemParser;
        assert!(matches!(parser.parse(&target, &mut ctx), Some(TransitionItem::Target("a"))));
        assert!(matches!(parser.parse(&missing, &mut ctx), Some(TransitionItem::Targetless)));
        assert!(!parser.matches(&flag));
    }
}
