//! Owned expression tree for configuration literals.
//!
//! tree-sitter nodes borrow the tree and the source buffer, which makes them
//! unsuitable for the copy-on-write draft the editor mutates. The subset of
//! syntax that a machine configuration can contain is lowered into [`Expr`],
//! where every node carries an [`Origin`]: either the byte span it was lowered
//! from or a synthetic id for nodes the editor created.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Half-open byte range into the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Text covered by this span, or `""` when it falls outside `text`.
    #[inline]
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.start..self.end).unwrap_or("")
    }
}

static NEXT_SYNTHETIC: AtomicU32 = AtomicU32::new(1);

/// Where an expression node came from.
///
/// Identity inside a draft is positional: two nodes are "the same" when they
/// share an origin, regardless of how they were moved around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    Source(Span),
    Synthetic(u32),
}

impl Origin {
    /// A fresh synthetic origin, distinct from every other one in the process.
    pub fn fresh() -> Self {
        Origin::Synthetic(NEXT_SYNTHETIC.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn span(&self) -> Option<Span> {
        match self {
            Origin::Source(span) => Some(*span),
            Origin::Synthetic(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub origin: Origin,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Object(Vec<Property>),
    Array(Vec<Expr>),
    /// String literal, or a template literal without substitutions. Holds the
    /// cooked value.
    Str(String),
    /// Template literal with substitutions, kept as raw text.
    Template(String),
    Number(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    Member {
        object: Box<Expr>,
        property: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Arrow function, function expression or method body.
    Function,
    /// Any other expression, tagged with its tree-sitter kind.
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub origin: Origin,
    pub key: PropKey,
    pub key_span: Option<Span>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropKey {
    Ident(String),
    Str(String),
    Number(String),
    /// `[expr]` keys, holding the raw bracket contents.
    Computed(String),
    /// `...spread` entries. The spread expression is the property value.
    Spread,
}

impl PropKey {
    /// Static name of the key, if it has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            PropKey::Ident(s) | PropKey::Str(s) | PropKey::Number(s) => Some(s),
            PropKey::Computed(_) | PropKey::Spread => None,
        }
    }
}

impl Expr {
    pub fn synthetic(kind: ExprKind) -> Self {
        Self {
            origin: Origin::fresh(),
            kind,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::synthetic(ExprKind::Str(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Self::synthetic(ExprKind::Bool(value))
    }

    pub fn object(props: Vec<Property>) -> Self {
        Self::synthetic(ExprKind::Object(props))
    }

    pub fn array(items: Vec<Expr>) -> Self {
        Self::synthetic(ExprKind::Array(items))
    }

    #[inline]
    pub fn span(&self) -> Option<Span> {
        self.origin.span()
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[Property]> {
        match &self.kind {
            ExprKind::Object(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Vec<Property>> {
        match &mut self.kind {
            ExprKind::Object(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Expr]> {
        match &self.kind {
            ExprKind::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Expr>> {
        match &mut self.kind {
            ExprKind::Array(items) => Some(items),
            _ => None,
        }
    }

    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self.kind, ExprKind::Null | ExprKind::Undefined)
    }

    /// Structural equality ignoring origins.
    pub fn same_shape(&self, other: &Expr) -> bool {
        match (&self.kind, &other.kind) {
            (ExprKind::Object(a), ExprKind::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(x, y)| x.key == y.key && x.value.same_shape(&y.value))
            }
            (ExprKind::Array(a), ExprKind::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_shape(y))
            }
            (
                ExprKind::Member { object: a, property: p },
                ExprKind::Member { object: b, property: q },
            ) => p == q && a.same_shape(b),
            (ExprKind::Call { callee: a, args: x }, ExprKind::Call { callee: b, args: y }) => {
                a.same_shape(b) && x.len() == y.len() && x.iter().zip(y).all(|(l, r)| l.same_shape(r))
            }
            // Opaque nodes are only equal to themselves.
            (ExprKind::Function, ExprKind::Function) | (ExprKind::Other(_), ExprKind::Other(_)) => {
                self.origin == other.origin
            }
            (a, b) => a == b,
        }
    }

    /// JSON rendering of a literal value. Non-literal expressions map to
    /// `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match &self.kind {
            ExprKind::Object(props) => {
                let mut map = serde_json::Map::new();
                for prop in props {
                    if let Some(name) = prop.key.name() {
                        map.insert(name.to_string(), prop.value.to_json());
                    }
                }
                Value::Object(map)
            }
            ExprKind::Array(items) => Value::Array(items.iter().map(Expr::to_json).collect()),
            ExprKind::Str(s) | ExprKind::Template(s) => Value::String(s.clone()),
            ExprKind::Number(n) => match n.parse::<i64>() {
                Ok(i) => Value::from(i),
                Err(_) => n
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map_or_else(|| Value::String(n.clone()), Value::Number),
            },
            ExprKind::Bool(b) => Value::Bool(*b),
            _ => Value::Null,
        }
    }
}

impl Property {
    /// A synthetic `key: value` property.
    pub fn new(key: &str, value: Expr) -> Self {
        let key = if is_valid_identifier(key) {
            PropKey::Ident(key.to_string())
        } else {
            PropKey::Str(key.to_string())
        };
        Self {
            origin: Origin::fresh(),
            key,
            key_span: None,
            value,
        }
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.key.name()
    }
}

// =============================================================================
// Object helpers
// =============================================================================

/// Last property named `key`. Duplicate keys resolve like the host language
/// does: the last occurrence wins.
pub fn get_prop<'a>(props: &'a [Property], key: &str) -> Option<&'a Property> {
    props.iter().rev().find(|p| p.name() == Some(key))
}

pub fn get_prop_mut<'a>(props: &'a mut [Property], key: &str) -> Option<&'a mut Property> {
    props.iter_mut().rev().find(|p| p.name() == Some(key))
}

/// Value of the last property named `key`.
#[inline]
pub fn get_value<'a>(props: &'a [Property], key: &str) -> Option<&'a Expr> {
    get_prop(props, key).map(|p| &p.value)
}

#[inline]
pub fn get_value_mut<'a>(props: &'a mut [Property], key: &str) -> Option<&'a mut Expr> {
    get_prop_mut(props, key).map(|p| &mut p.value)
}

/// Replace the effective value of `key`, or append a new property.
pub fn set_value(props: &mut Vec<Property>, key: &str, value: Expr) {
    match get_prop_mut(props, key) {
        Some(prop) => prop.value = value,
        None => props.push(Property::new(key, value)),
    }
}

/// Remove every occurrence of `key`. Removing only the last one would let an
/// earlier duplicate take effect.
pub fn remove_prop(props: &mut Vec<Property>, key: &str) -> bool {
    let before = props.len();
    props.retain(|p| p.name() != Some(key));
    props.len() != before
}

/// Whether `name` can be written as a bare JavaScript identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_occurrence_wins() {
        let props = vec![
            Property::new("entry", Expr::string("a")),
            Property::new("entry", Expr::string("b")),
        ];
        assert_eq!(get_value(&props, "entry").and_then(Expr::as_str), Some("b"));
    }

    #[test]
    fn test_remove_prop_removes_duplicates() {
        let mut props = vec![
            Property::new("entry", Expr::string("a")),
            Property::new("exit", Expr::string("x")),
            Property::new("entry", Expr::string("b")),
        ];
        assert!(remove_prop(&mut props, "entry"));
        assert_eq!(props.len(), 1);
        assert!(!remove_prop(&mut props, "entry"));
    }

    #[test]
    fn test_property_key_quoting() {
        assert_eq!(Property::new("idle", Expr::string("x")).key, PropKey::Ident("idle".into()));
        assert_eq!(
            Property::new("done.invoke", Expr::string("x")).key,
            PropKey::Str("done.invoke".into())
        );
        assert_eq!(Property::new("", Expr::string("x")).key, PropKey::Str(String::new()));
    }

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("$foo_1"));
        assert!(!is_valid_identifier("1foo"));
        assert!(!is_valid_identifier("a-b"));
        assert!(!is_valid_identifier("*"));
    }

    #[test]
    fn test_same_shape_ignores_origin() {
        let a = Expr::array(vec![Expr::string("x"), Expr::boolean(true)]);
        let b = Expr::array(vec![Expr::string("x"), Expr::boolean(true)]);
        assert_ne!(a.origin, b.origin);
        assert!(a.same_shape(&b));
    }

    #[test]
    fn test_to_json() {
        let obj = Expr::object(vec![
            Property::new("owner", Expr::string("ops")),
            Property::new("retry", Expr::synthetic(ExprKind::Number("3".into()))),
        ]);
        assert_eq!(obj.to_json(), serde_json::json!({"owner": "ops", "retry": 3}));
    }
}
