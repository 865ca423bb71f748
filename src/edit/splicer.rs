//! Text splicing: draft tree vs original tree to minimal text edits.
//!
//! The splicer never re-prints the file. It walks the draft alongside the
//! original tree, matching container entries by origin, and emits edits only
//! where they differ:
//!
//! - kept entries are reconciled recursively (key rename, value change)
//! - entries missing from the draft are deleted together with their leading
//!   comment lines and trailing comma/comment
//! - new entries are inserted next to their nearest kept sibling, reusing its
//!   indentation
//!
//! Nodes that moved (a reparented state, a promoted array element) are
//! rendered from their original text with their own nested edits applied.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::print::Style;
use crate::ast::{Expr, ExprKind, Origin, PropKey, Property, Span};
use crate::error::EditError;
use crate::util::text::{
    comma_after, indent_at, item_tail_end, leading_comment_start, line_end, reindent, spans_lines,
    starts_line,
};

/// One text operation over the original buffer (byte offsets).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextEdit {
    Insert {
        position: usize,
        #[serde(rename = "newText")]
        new_text: String,
    },
    Delete {
        start: usize,
        end: usize,
    },
    Replace {
        start: usize,
        end: usize,
        #[serde(rename = "newText")]
        new_text: String,
    },
}

impl TextEdit {
    pub fn start(&self) -> usize {
        match self {
            TextEdit::Insert { position, .. } => *position,
            TextEdit::Delete { start, .. } | TextEdit::Replace { start, .. } => *start,
        }
    }

    pub fn end(&self) -> usize {
        match self {
            TextEdit::Insert { position, .. } => *position,
            TextEdit::Delete { end, .. } | TextEdit::Replace { end, .. } => *end,
        }
    }

    pub fn new_text(&self) -> &str {
        match self {
            TextEdit::Insert { new_text, .. } | TextEdit::Replace { new_text, .. } => new_text,
            TextEdit::Delete { .. } => "",
        }
    }

    fn shifted(&self, by: usize) -> TextEdit {
        match self {
            TextEdit::Insert { position, new_text } => TextEdit::Insert {
                position: position - by,
                new_text: new_text.clone(),
            },
            TextEdit::Delete { start, end } => TextEdit::Delete {
                start: start - by,
                end: end - by,
            },
            TextEdit::Replace {
                start,
                end,
                new_text,
            } => TextEdit::Replace {
                start: start - by,
                end: end - by,
                new_text: new_text.clone(),
            },
        }
    }
}

fn overlap_error(a: &TextEdit, b: &TextEdit) -> EditError {
    EditError::OverlappingEdits {
        first_start: a.start(),
        first_end: a.end(),
        second_start: b.start(),
        second_end: b.end(),
    }
}

fn sorted(edits: &[TextEdit]) -> Vec<TextEdit> {
    let mut edits = edits.to_vec();
    edits.sort_by_key(|e| (e.start(), e.end()));
    edits
}

/// Apply `edits` to `text`.
///
/// Edits are sorted by start offset and spliced right to left so earlier
/// offsets stay valid. Inserts at the same position keep their given order.
/// Overlapping ranges and ranges outside `text` are rejected.
pub fn apply_text_edits(text: &str, edits: &[TextEdit]) -> Result<String, EditError> {
    let edits = sorted(edits);
    for edit in &edits {
        let (start, end) = (edit.start(), edit.end());
        if start > end || end > text.len() || !text.is_char_boundary(start) || !text.is_char_boundary(end) {
            return Err(EditError::OutOfBounds {
                start,
                end,
                len: text.len(),
            });
        }
    }
    for pair in edits.windows(2) {
        if pair[0].end() > pair[1].start() {
            return Err(overlap_error(&pair[0], &pair[1]));
        }
    }

    let mut out = text.to_string();
    for edit in edits.iter().rev() {
        out.replace_range(edit.start()..edit.end(), edit.new_text());
    }
    Ok(out)
}

/// Sort edits ascending, merging overlapping or touching deletes and
/// concatenating inserts at the same position.
pub fn normalize(edits: Vec<TextEdit>) -> Result<Vec<TextEdit>, EditError> {
    let mut out: Vec<TextEdit> = Vec::with_capacity(edits.len());
    for edit in sorted(&edits) {
        let Some(last) = out.last_mut() else {
            out.push(edit);
            continue;
        };
        let overlaps = last.end() > edit.start();
        let same = edit == *last;
        match (&mut *last, &edit) {
            (TextEdit::Delete { end, .. }, TextEdit::Delete { start: s2, end: e2 }) if *s2 <= *end => {
                *end = (*end).max(*e2);
            }
            (
                TextEdit::Insert { position, new_text },
                TextEdit::Insert {
                    position: p2,
                    new_text: t2,
                },
            ) if *position == *p2 => {
                new_text.push_str(t2);
            }
            _ if same => {}
            (last, _) if overlaps => {
                return Err(overlap_error(last, &edit));
            }
            _ => out.push(edit),
        }
    }
    Ok(out)
}

// =============================================================================
// Entries
// =============================================================================

/// One entry of an object or array literal.
#[derive(Clone, Copy)]
enum Entry<'x> {
    Prop(&'x Property),
    Item(&'x Expr),
}

impl Entry<'_> {
    fn origin(&self) -> Origin {
        match self {
            Entry::Prop(p) => p.origin,
            Entry::Item(e) => e.origin,
        }
    }

    fn span(&self) -> Option<Span> {
        self.origin().span()
    }
}

fn entries(expr: &Expr) -> Vec<Entry<'_>> {
    match &expr.kind {
        ExprKind::Object(props) => props.iter().map(Entry::Prop).collect(),
        ExprKind::Array(items) => items.iter().map(Entry::Item).collect(),
        _ => Vec::new(),
    }
}

// =============================================================================
// Splicer
// =============================================================================

/// Diffs a draft against the original tree of one machine.
pub struct Splicer<'s> {
    source: &'s str,
    style: &'s Style,
    original: &'s Expr,
    exprs: FxHashMap<Span, &'s Expr>,
    props: FxHashMap<Span, &'s Property>,
}

impl<'s> Splicer<'s> {
    pub fn new(source: &'s str, original: &'s Expr, style: &'s Style) -> Self {
        let mut splicer = Self {
            source,
            style,
            original,
            exprs: FxHashMap::default(),
            props: FxHashMap::default(),
        };
        splicer.index(original);
        splicer
    }

    fn index(&mut self, expr: &'s Expr) {
        if let Some(span) = expr.span() {
            self.exprs.insert(span, expr);
        }
        match &expr.kind {
            ExprKind::Object(props) => {
                for prop in props {
                    if let Some(span) = prop.origin.span() {
                        self.props.insert(span, prop);
                    }
                    self.index(&prop.value);
                }
            }
            ExprKind::Array(items) => items.iter().for_each(|i| self.index(i)),
            ExprKind::Member { object, .. } => self.index(object),
            ExprKind::Call { callee, args } => {
                self.index(callee);
                args.iter().for_each(|a| self.index(a));
            }
            _ => {}
        }
    }

    /// Normalized edits turning the original text into the draft.
    pub fn diff(&self, draft: &Expr) -> Result<Vec<TextEdit>, EditError> {
        let mut out = Vec::new();
        if draft.origin == self.original.origin {
            self.reconcile_expr(self.original, draft, &mut out)?;
        } else if let Some(span) = self.original.span() {
            let text = self.render(draft, indent_at(self.source, span.start))?;
            out.push(TextEdit::Replace {
                start: span.start,
                end: span.end,
                new_text: text,
            });
        }
        normalize(out)
    }

    fn reconcile_expr(&self, orig: &Expr, draft: &Expr, out: &mut Vec<TextEdit>) -> Result<(), EditError> {
        let Some(span) = orig.span() else {
            return Ok(());
        };
        match (&orig.kind, &draft.kind) {
            (ExprKind::Object(_), ExprKind::Object(_)) | (ExprKind::Array(_), ExprKind::Array(_)) => {
                self.reconcile_list(span, &entries(orig), &entries(draft), draft, out)
            }
            _ if orig.same_shape(draft) => Ok(()),
            _ => {
                let text = self.render(draft, indent_at(self.source, span.start))?;
                out.push(TextEdit::Replace {
                    start: span.start,
                    end: span.end,
                    new_text: text,
                });
                Ok(())
            }
        }
    }

    fn reconcile_list(
        &self,
        container: Span,
        orig: &[Entry<'_>],
        draft: &[Entry<'_>],
        draft_container: &Expr,
        out: &mut Vec<TextEdit>,
    ) -> Result<(), EditError> {
        let positions: FxHashMap<Origin, usize> = orig
            .iter()
            .enumerate()
            .filter(|(_, e)| e.span().is_some())
            .map(|(i, e)| (e.origin(), i))
            .collect();

        // Greedy in-order matching; an entry that moved backwards is treated
        // as deleted and re-inserted.
        let mut kept = vec![false; orig.len()];
        let mut matched: Vec<Option<usize>> = vec![None; draft.len()];
        let mut last: Option<usize> = None;
        for (d, entry) in draft.iter().enumerate() {
            if let Some(&i) = positions.get(&entry.origin()) {
                if last.map_or(true, |l| i > l) {
                    matched[d] = Some(i);
                    kept[i] = true;
                    last = Some(i);
                }
            }
        }

        if !kept.iter().any(|k| *k) {
            if orig.is_empty() && draft.is_empty() {
                return Ok(());
            }
            let text = self.render_fresh(draft_container, indent_at(self.source, container.start))?;
            out.push(TextEdit::Replace {
                start: container.start,
                end: container.end,
                new_text: text,
            });
            return Ok(());
        }

        let multi = spans_lines(self.source, container.start, container.end);

        for (d, m) in matched.iter().enumerate() {
            if let Some(i) = m {
                self.reconcile_entry(orig[*i], draft[d], out)?;
            }
        }

        let appends = matches!(matched.last(), Some(None));
        for i in 0..orig.len() {
            if !kept[i] {
                self.delete_entry(orig, &kept, i, multi && !appends, multi, out);
            }
        }

        let first_kept = kept.iter().position(|k| *k).unwrap_or(0);
        let mut anchor: Option<usize> = None;
        let mut group: Vec<Entry<'_>> = Vec::new();
        for (d, entry) in draft.iter().enumerate() {
            match matched[d] {
                Some(i) => {
                    if !group.is_empty() {
                        self.insert_group(orig, anchor, first_kept, &group, multi, out)?;
                        group.clear();
                    }
                    anchor = Some(i);
                }
                None => group.push(*entry),
            }
        }
        if !group.is_empty() {
            self.insert_group(orig, anchor, first_kept, &group, multi, out)?;
        }
        Ok(())
    }

    fn reconcile_entry(&self, orig: Entry<'_>, draft: Entry<'_>, out: &mut Vec<TextEdit>) -> Result<(), EditError> {
        match (orig, draft) {
            (Entry::Prop(o), Entry::Prop(d)) => {
                if o.key != d.key {
                    if let Some(ks) = o.key_span {
                        let text = match (&o.key, d.key.name()) {
                            (PropKey::Str(_), Some(name)) => self.style.quote(name),
                            _ => self.style.key(&d.key),
                        };
                        // Shorthand `{ foo }` shares its span with the value.
                        let text = if Some(ks) == o.value.span() {
                            format!("{text}: {}", ks.slice(self.source))
                        } else {
                            text
                        };
                        out.push(TextEdit::Replace {
                            start: ks.start,
                            end: ks.end,
                            new_text: text,
                        });
                    }
                }
                if o.value.origin == d.value.origin {
                    self.reconcile_expr(&o.value, &d.value, out)
                } else if let Some(vs) = o.value.span() {
                    let indent = o.origin.span().map_or("", |s| indent_at(self.source, s.start));
                    let text = self.render(&d.value, indent)?;
                    out.push(TextEdit::Replace {
                        start: vs.start,
                        end: vs.end,
                        new_text: text,
                    });
                    Ok(())
                } else {
                    Ok(())
                }
            }
            (Entry::Item(o), Entry::Item(d)) => self.reconcile_expr(o, d, out),
            _ => Ok(()),
        }
    }

    fn delete_entry(
        &self,
        orig: &[Entry<'_>],
        kept: &[bool],
        i: usize,
        fix_comma: bool,
        multi: bool,
        out: &mut Vec<TextEdit>,
    ) {
        let Some(span) = orig[i].span() else {
            return;
        };
        if multi && starts_line(self.source, span.start) {
            let start = leading_comment_start(self.source, span.start);
            let end = item_tail_end(self.source, span.end);
            if end > 0 && self.source.as_bytes()[end - 1] == b'\n' {
                out.push(TextEdit::Delete { start, end });
                // The list had no trailing comma; the new last entry drops its own.
                let last_kept = !(i + 1..orig.len()).any(|j| kept[j]);
                if fix_comma && last_kept && comma_after(self.source, span.end).is_none() {
                    let prev_comma = (0..i)
                        .rev()
                        .find(|j| kept[*j])
                        .and_then(|j| orig[j].span())
                        .and_then(|s| comma_after(self.source, s.end));
                    if let Some(comma_end) = prev_comma {
                        out.push(TextEdit::Delete {
                            start: comma_end - 1,
                            end: comma_end,
                        });
                    }
                }
                return;
            }
        }

        if (i + 1..orig.len()).any(|j| kept[j]) {
            let next = orig[i + 1].span().map_or(span.end, |s| s.start);
            out.push(TextEdit::Delete {
                start: span.start,
                end: next,
            });
        } else if let Some(prev) = (0..i).rev().find(|j| kept[*j]) {
            let prev_end = orig[prev].span().map_or(span.start, |s| s.end);
            out.push(TextEdit::Delete {
                start: prev_end,
                end: span.end,
            });
        } else {
            warn!(start = span.start, "deleting entry without a kept sibling");
            out.push(TextEdit::Delete {
                start: span.start,
                end: span.end,
            });
        }
    }

    fn insert_group(
        &self,
        orig: &[Entry<'_>],
        anchor: Option<usize>,
        first_kept: usize,
        group: &[Entry<'_>],
        multi: bool,
        out: &mut Vec<TextEdit>,
    ) -> Result<(), EditError> {
        let source = self.source;
        let reference = anchor.unwrap_or(first_kept);
        let Some(span) = orig[reference].span() else {
            return Ok(());
        };
        let indent = indent_at(source, span.start);
        let own_line = multi && starts_line(source, span.start);
        let texts = group
            .iter()
            .map(|e| self.render_entry(*e, indent))
            .collect::<Result<Vec<_>, _>>()?;

        let Some(_) = anchor else {
            // Before the first kept entry.
            if own_line {
                let text: String = texts.iter().map(|t| format!("{indent}{t},\n")).collect();
                out.push(TextEdit::Insert {
                    position: leading_comment_start(source, span.start),
                    new_text: text,
                });
            } else {
                let text: String = texts.iter().map(|t| format!("{t}, ")).collect();
                out.push(TextEdit::Insert {
                    position: span.start,
                    new_text: text,
                });
            }
            return Ok(());
        };

        if own_line {
            match comma_after(source, span.end) {
                Some(comma_end) => {
                    let tail = item_tail_end(source, span.end);
                    if tail > 0 && source.as_bytes()[tail - 1] == b'\n' {
                        let text: String = texts.iter().map(|t| format!("{indent}{t},\n")).collect();
                        out.push(TextEdit::Insert {
                            position: tail,
                            new_text: text,
                        });
                    } else {
                        let text: String = texts.iter().map(|t| format!(" {t},")).collect();
                        out.push(TextEdit::Insert {
                            position: comma_end,
                            new_text: text,
                        });
                    }
                    return Ok(());
                }
                None => {
                    let eol = line_end(source, span.end);
                    let rest = source[span.end..eol].trim();
                    if rest.is_empty() || rest.starts_with("//") {
                        out.push(TextEdit::Insert {
                            position: span.end,
                            new_text: ",".to_string(),
                        });
                        let mut text = String::new();
                        for (k, t) in texts.iter().enumerate() {
                            if k > 0 {
                                text.push(',');
                            }
                            text.push('\n');
                            text.push_str(indent);
                            text.push_str(t);
                        }
                        out.push(TextEdit::Insert {
                            position: eol,
                            new_text: text,
                        });
                        return Ok(());
                    }
                }
            }
        }

        let text: String = texts.iter().map(|t| format!(", {t}")).collect();
        out.push(TextEdit::Insert {
            position: span.end,
            new_text: text,
        });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    /// Text for `expr` placed on a line indented with `indent`.
    fn render(&self, expr: &Expr, indent: &str) -> Result<String, EditError> {
        if let Some(span) = expr.span() {
            let reusable = |orig: &&&Expr| {
                matches!(
                    (&orig.kind, &expr.kind),
                    (ExprKind::Object(_), ExprKind::Object(_)) | (ExprKind::Array(_), ExprKind::Array(_))
                ) || orig.same_shape(expr)
            };
            if let Some(orig) = self.exprs.get(&span).filter(reusable) {
                let mut edits = Vec::new();
                self.reconcile_expr(orig, expr, &mut edits)?;
                let text = self.apply_within(span, edits)?;
                return Ok(reindent(&text, indent_at(self.source, span.start), indent));
            }
        }
        self.render_fresh(expr, indent)
    }

    fn render_entry(&self, entry: Entry<'_>, indent: &str) -> Result<String, EditError> {
        match entry {
            Entry::Item(expr) => self.render(expr, indent),
            Entry::Prop(prop) => {
                if let Some(span) = prop.origin.span() {
                    if let Some(orig) = self.props.get(&span) {
                        let mut edits = Vec::new();
                        self.reconcile_entry(Entry::Prop(orig), entry, &mut edits)?;
                        let text = self.apply_within(span, edits)?;
                        return Ok(reindent(&text, indent_at(self.source, span.start), indent));
                    }
                }
                let value = self.render(&prop.value, indent)?;
                Ok(match prop.key {
                    PropKey::Spread => format!("...{value}"),
                    _ => format!("{}: {value}", self.style.key(&prop.key)),
                })
            }
        }
    }

    fn apply_within(&self, span: Span, edits: Vec<TextEdit>) -> Result<String, EditError> {
        let edits = normalize(edits)?;
        let local: Vec<TextEdit> = edits.iter().map(|e| e.shifted(span.start)).collect();
        apply_text_edits(span.slice(self.source), &local)
    }

    /// Render without reusing the node's own source text. Children may still
    /// come from the original.
    fn render_fresh(&self, expr: &Expr, indent: &str) -> Result<String, EditError> {
        let inner = format!("{indent}{}", self.style.indent_unit);
        Ok(match &expr.kind {
            ExprKind::Object(props) => {
                if props.is_empty() {
                    return Ok("{}".to_string());
                }
                let lines = props
                    .iter()
                    .map(|p| self.render_entry(Entry::Prop(p), &inner).map(|t| format!("{inner}{t}")))
                    .collect::<Result<Vec<_>, _>>()?;
                self.block('{', '}', &lines, indent)
            }
            ExprKind::Array(items) => {
                let multi = items.iter().any(|i| matches!(&i.kind, ExprKind::Object(p) if !p.is_empty()));
                if multi {
                    let lines = items
                        .iter()
                        .map(|i| self.render(i, &inner).map(|t| format!("{inner}{t}")))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.block('[', ']', &lines, indent)
                } else {
                    let parts = items
                        .iter()
                        .map(|i| self.render(i, indent))
                        .collect::<Result<Vec<_>, _>>()?;
                    format!("[{}]", parts.join(", "))
                }
            }
            ExprKind::Str(s) => self.style.quote(s),
            ExprKind::Template(raw) => raw.clone(),
            ExprKind::Number(n) => n.clone(),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Null => "null".to_string(),
            ExprKind::Undefined => "undefined".to_string(),
            ExprKind::Ident(name) => name.clone(),
            ExprKind::Member { object, property } => {
                format!("{}.{property}", self.render(object, indent)?)
            }
            ExprKind::Call { callee, args } => {
                let args = args
                    .iter()
                    .map(|a| self.render(a, indent))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("{}({})", self.render(callee, indent)?, args.join(", "))
            }
            ExprKind::Function | ExprKind::Other(_) => expr
                .span()
                .map(|s| s.slice(self.source).to_string())
                .unwrap_or_default(),
        })
    }

    fn block(&self, open: char, close: char, lines: &[String], indent: &str) -> String {
        let mut text = String::new();
        text.push(open);
        text.push('\n');
        for (i, line) in lines.iter().enumerate() {
            text.push_str(line);
            if i + 1 < lines.len() || self.style.trailing_comma {
                text.push(',');
            }
            text.push('\n');
        }
        text.push_str(indent);
        text.push(close);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ins(position: usize, text: &str) -> TextEdit {
        TextEdit::Insert {
            position,
            new_text: text.to_string(),
        }
    }

    fn del(start: usize, end: usize) -> TextEdit {
        TextEdit::Delete { start, end }
    }

    #[test]
    fn test_apply_zero_edits_is_identity() {
        let text = "createMachine({ a: 1 });";
        assert_eq!(apply_text_edits(text, &[]).unwrap(), text);
    }

    #[test]
    fn test_apply_right_to_left() {
        let text = "abcdef";
        let edits = vec![
            ins(0, ">"),
            TextEdit::Replace {
                start: 2,
                end: 4,
                new_text: "XY".into(),
            },
            del(5, 6),
        ];
        assert_eq!(apply_text_edits(text, &edits).unwrap(), ">abXYe");
    }

    #[test]
    fn test_apply_same_position_inserts_keep_order() {
        assert_eq!(apply_text_edits("ab", &[ins(1, "1"), ins(1, "2")]).unwrap(), "a12b");
    }

    #[test]
    fn test_apply_rejects_overlap_and_bounds() {
        let err = apply_text_edits("abcdef", &[del(0, 3), del(2, 4)]).unwrap_err();
        assert!(matches!(err, EditError::OverlappingEdits { .. }));
        let err = apply_text_edits("abc", &[del(2, 9)]).unwrap_err();
        assert!(matches!(err, EditError::OutOfBounds { len: 3, .. }));
        assert!(apply_text_edits("abcdef", &[del(1, 3), ins(2, "x")]).is_err());
    }

    #[test]
    fn test_normalize_merges_deletes_and_inserts() {
        let edits = normalize(vec![del(4, 6), ins(8, "b"), del(0, 4), ins(8, "c"), del(5, 7)]).unwrap();
        assert_eq!(edits, vec![del(0, 7), ins(8, "bc")]);
    }

    #[test]
    fn test_normalize_drops_duplicates_and_rejects_overlap() {
        let replace = |start, end| TextEdit::Replace {
            start,
            end,
            new_text: "z".into(),
        };
        assert_eq!(normalize(vec![replace(1, 3), replace(1, 3)]).unwrap(), vec![replace(1, 3)]);
        let err = normalize(vec![replace(1, 4), del(2, 5)]).unwrap_err();
        assert!(matches!(
            err,
            EditError::OverlappingEdits {
                first_start: 1,
                second_start: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_normalize_insert_at_delete_boundary() {
        let edits = normalize(vec![del(2, 5), ins(2, "x")]).unwrap();
        assert_eq!(edits, vec![ins(2, "x"), del(2, 5)]);
        assert_eq!(apply_text_edits("abcdefg", &edits).unwrap(), "abxfg");
    }

    #[test]
    fn test_text_edit_json() {
        let json = serde_json::to_value(ins(3, "x")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "insert", "position": 3, "newText": "x"}));
    }
}
