//! Pattern-matching parsers over [`Expr`].
//!
//! An [`ExprParser`] answers two questions about a node: does it have my
//! shape (`matches`), and if so what typed value does it hold (`parse`).
//! Parsers compose through [`Union`] (ordered alternatives) and
//! [`WrapResult`] (post-processing). None of this layer knows about state
//! machines; the machine-specific instances live in [`shapes`].

pub mod shapes;

use rustc_hash::FxHashMap;

use crate::ast::{Expr, Origin};

/// A parser recognising one syntactic shape.
pub trait ExprParser<'a> {
    type Output;

    /// Cheap shape test. Must not have side effects.
    fn matches(&self, expr: &'a Expr) -> bool;

    /// Extract a value. Returns `None` when the node does not have the
    /// expected shape after all; callers treat that as "not this parser".
    fn parse(&self, expr: &'a Expr, ctx: &mut ParseContext) -> Option<Self::Output>;
}

impl<'a, P: ExprParser<'a> + ?Sized> ExprParser<'a> for &P {
    type Output = P::Output;

    fn matches(&self, expr: &'a Expr) -> bool {
        (**self).matches(expr)
    }

    fn parse(&self, expr: &'a Expr, ctx: &mut ParseContext) -> Option<Self::Output> {
        (**self).parse(expr, ctx)
    }
}

impl<'a, P: ExprParser<'a> + ?Sized> ExprParser<'a> for Box<P> {
    type Output = P::Output;

    fn matches(&self, expr: &'a Expr) -> bool {
        (**self).matches(expr)
    }

    fn parse(&self, expr: &'a Expr, ctx: &mut ParseContext) -> Option<Self::Output> {
        (**self).parse(expr, ctx)
    }
}

// =============================================================================
// Union
// =============================================================================

/// Ordered alternatives. The first arm that matches *and* parses wins, so
/// arm order is precedence. Every construction site documents its order.
pub struct Union<'a, O> {
    arms: Vec<Box<dyn ExprParser<'a, Output = O> + 'a>>,
}

impl<'a, O> Union<'a, O> {
    pub fn new() -> Self {
        Self { arms: Vec::new() }
    }

    /// Append a lower-precedence arm.
    pub fn arm(mut self, parser: impl ExprParser<'a, Output = O> + 'a) -> Self {
        self.arms.push(Box::new(parser));
        self
    }
}

impl<'a, O> Default for Union<'a, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, O> ExprParser<'a> for Union<'a, O> {
    type Output = O;

    fn matches(&self, expr: &'a Expr) -> bool {
        self.arms.iter().any(|arm| arm.matches(expr))
    }

    fn parse(&self, expr: &'a Expr, ctx: &mut ParseContext) -> Option<O> {
        self.arms
            .iter()
            .filter(|arm| arm.matches(expr))
            .find_map(|arm| arm.parse(expr, ctx))
    }
}

// =============================================================================
// WrapResult
// =============================================================================

/// Post-process a successful parse. `matches` is delegated unchanged.
pub struct WrapResult<P, F> {
    inner: P,
    wrap: F,
}

impl<'a, P, F, O> ExprParser<'a> for WrapResult<P, F>
where
    P: ExprParser<'a>,
    F: Fn(P::Output, &'a Expr, &mut ParseContext) -> O,
{
    type Output = O;

    fn matches(&self, expr: &'a Expr) -> bool {
        self.inner.matches(expr)
    }

    fn parse(&self, expr: &'a Expr, ctx: &mut ParseContext) -> Option<O> {
        let value = self.inner.parse(expr, ctx)?;
        Some((self.wrap)(value, expr, ctx))
    }
}

/// Wrap `inner` so that its output is passed through `wrap`.
pub fn wrap<'a, P, F, O>(inner: P, wrap: F) -> WrapResult<P, F>
where
    P: ExprParser<'a>,
    F: Fn(P::Output, &'a Expr, &mut ParseContext) -> O,
{
    WrapResult { inner, wrap }
}

// =============================================================================
// Sequencing
// =============================================================================

/// Run `first`, then feed its output to `then` which may still reject.
///
/// Used for shapes that are only valid when a nested part also parses, such
/// as `{ type: 'name' }` where `type` must be a string.
pub struct AndThen<P, F> {
    inner: P,
    then: F,
}

impl<'a, P, F, O> ExprParser<'a> for AndThen<P, F>
where
    P: ExprParser<'a>,
    F: Fn(P::Output, &'a Expr, &mut ParseContext) -> Option<O>,
{
    type Output = O;

    fn matches(&self, expr: &'a Expr) -> bool {
        self.inner.matches(expr)
    }

    fn parse(&self, expr: &'a Expr, ctx: &mut ParseContext) -> Option<O> {
        let value = self.inner.parse(expr, ctx)?;
        (self.then)(value, expr, ctx)
    }
}

pub fn and_then<'a, P, F, O>(inner: P, then: F) -> AndThen<P, F>
where
    P: ExprParser<'a>,
    F: Fn(P::Output, &'a Expr, &mut ParseContext) -> Option<O>,
{
    AndThen { inner, then }
}

// =============================================================================
// ParseContext
// =============================================================================

/// Per-extraction side table.
///
/// Inline constructs (arrow functions, `assign(...)` calls, ...) have no name
/// of their own. They get `inline:<kind>-<n>` ids, numbered per kind in the
/// order they are first seen. The table is keyed by node origin, so asking
/// twice for the same node yields the same id.
#[derive(Debug, Default)]
pub struct ParseContext {
    inline_ids: FxHashMap<(&'static str, Origin), String>,
    counters: FxHashMap<&'static str, usize>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inline_id(&mut self, kind: &'static str, expr: &Expr) -> String {
        if let Some(id) = self.inline_ids.get(&(kind, expr.origin)) {
            return id.clone();
        }
        let counter = self.counters.entry(kind).or_insert(0);
        let id = format!("inline:{kind}-{counter}");
        *counter += 1;
        self.inline_ids.insert((kind, expr.origin), id.clone());
        id
    }
}
