//! Formatting of newly written text.
//!
//! New fragments follow the machine's own conventions: quote character,
//! indentation unit and trailing commas are inferred from the literal, and
//! `[style]` config entries override the inference.

use crate::ast::{is_valid_identifier, Expr, ExprKind, PropKey};
use crate::config::{QuotePreference, StyleConfig};
use crate::util::text::{comma_after, indent_at, starts_line};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Style {
    pub quote: char,
    pub indent_unit: String,
    pub trailing_comma: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            quote: '\'',
            indent_unit: "  ".to_string(),
            trailing_comma: true,
        }
    }
}

impl Style {
    /// Infer the style of `config` as written in `source`, then apply
    /// overrides from `overrides`.
    pub fn infer(source: &str, config: &Expr, overrides: &StyleConfig) -> Self {
        let mut style = Style::default();

        if let Some(q) = first_quote(source, config) {
            style.quote = q;
        }
        if let Some(unit) = infer_indent_unit(source, config) {
            style.indent_unit = unit;
        }
        if let Some(trailing) = infer_trailing_comma(source, config) {
            style.trailing_comma = trailing;
        }

        match overrides.quote {
            QuotePreference::Auto => {}
            QuotePreference::Single => style.quote = '\'',
            QuotePreference::Double => style.quote = '"',
        }
        if overrides.use_tabs {
            style.indent_unit = "\t".to_string();
        } else if let Some(n) = overrides.indent {
            style.indent_unit = " ".repeat(n);
        }
        if let Some(trailing) = overrides.trailing_comma {
            style.trailing_comma = trailing;
        }
        style
    }

    /// Quote `value` as a string literal.
    pub fn quote(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push(self.quote);
        for c in value.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c == self.quote => {
                    out.push('\\');
                    out.push(c);
                }
                c => out.push(c),
            }
        }
        out.push(self.quote);
        out
    }

    /// Text of a property key.
    pub fn key(&self, key: &PropKey) -> String {
        match key {
            PropKey::Ident(name) if is_valid_identifier(name) => name.clone(),
            PropKey::Ident(name) | PropKey::Str(name) => self.quote(name),
            PropKey::Number(n) => n.clone(),
            PropKey::Computed(inner) => format!("[{inner}]"),
            PropKey::Spread => String::new(),
        }
    }
}

fn first_quote(source: &str, expr: &Expr) -> Option<char> {
    match &expr.kind {
        ExprKind::Str(_) => {
            let c = expr.span()?.slice(source).chars().next()?;
            matches!(c, '\'' | '"').then_some(c)
        }
        ExprKind::Object(props) => props.iter().find_map(|p| first_quote(source, &p.value)),
        ExprKind::Array(items) => items.iter().find_map(|i| first_quote(source, i)),
        _ => None,
    }
}

/// Indentation step between the root object's line and its first own-line
/// property.
fn infer_indent_unit(source: &str, config: &Expr) -> Option<String> {
    let props = config.as_object()?;
    let start = config.span()?.start;
    let base = indent_at(source, start);
    let first = props
        .iter()
        .filter_map(|p| p.origin.span())
        .find(|s| starts_line(source, s.start))?;
    let inner = indent_at(source, first.start);
    inner
        .strip_prefix(base)
        .filter(|unit| !unit.is_empty())
        .map(str::to_string)
}

/// Whether the last property of the root object is followed by a comma.
/// Only meaningful for multi-line objects.
fn infer_trailing_comma(source: &str, config: &Expr) -> Option<bool> {
    let props = config.as_object()?;
    let last = props.last()?.origin.span()?;
    let span = config.span()?;
    if !crate::util::text::spans_lines(source, span.start, span.end) {
        return None;
    }
    Some(comma_after(source, last.end).is_some_and(|p| p <= span.end))
}
