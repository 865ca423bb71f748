//! Byte-level line scanning over source text.
//!
//! Thin wrappers around `memchr` used by the splicer to find line boundaries,
//! measure indentation and walk over the trivia (commas, whitespace and
//! comments) that surrounds a property being removed or inserted.
//!
//! All offsets are byte offsets into UTF-8 text. The scanned bytes are ASCII
//! (`\n`, `,`, space, tab, `/`, `*`), so every offset returned lands on a char
//! boundary whenever the input offset does.

use memchr::{memchr, memmem, memrchr};

/// Offset of the first byte of the line containing `pos`.
#[inline]
pub fn line_start(text: &str, pos: usize) -> usize {
    let pos = pos.min(text.len());
    memrchr(b'\n', &text.as_bytes()[..pos]).map_or(0, |i| i + 1)
}

/// Offset of the `\n` ending the line containing `pos`, or `text.len()`.
#[inline]
pub fn line_end(text: &str, pos: usize) -> usize {
    let pos = pos.min(text.len());
    memchr(b'\n', &text.as_bytes()[pos..]).map_or(text.len(), |i| pos + i)
}

/// Leading whitespace of the line containing `pos`.
pub fn indent_at(text: &str, pos: usize) -> &str {
    let start = line_start(text, pos);
    let bytes = text.as_bytes();
    let mut end = start;
    while end < bytes.len() && (bytes[end] == b' ' || bytes[end] == b'\t') {
        end += 1;
    }
    &text[start..end]
}

/// True when only spaces or tabs precede `pos` on its line.
pub fn starts_line(text: &str, pos: usize) -> bool {
    let start = line_start(text, pos);
    text.as_bytes()[start..pos.min(text.len())]
        .iter()
        .all(|b| *b == b' ' || *b == b'\t')
}

/// True when `text[start..end]` contains a line break.
#[inline]
pub fn spans_lines(text: &str, start: usize, end: usize) -> bool {
    memchr(b'\n', &text.as_bytes()[start.min(text.len())..end.min(text.len())]).is_some()
}

/// Skip spaces and tabs (not newlines) forward from `pos`.
pub fn skip_inline_ws(text: &str, mut pos: usize) -> usize {
    let bytes = text.as_bytes();
    while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
        pos += 1;
    }
    pos
}

/// Skip all whitespace including newlines forward from `pos`.
pub fn skip_ws(text: &str, mut pos: usize) -> usize {
    let bytes = text.as_bytes();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Skip whitespace and comments forward from `pos`.
pub fn skip_trivia(text: &str, mut pos: usize) -> usize {
    loop {
        pos = skip_ws(text, pos);
        let rest = &text.as_bytes()[pos..];
        if rest.starts_with(b"//") {
            pos = line_end(text, pos);
        } else if rest.starts_with(b"/*") {
            match memmem::find(&rest[2..], b"*/") {
                Some(i) => pos += i + 4,
                None => return text.len(),
            }
        } else {
            return pos;
        }
    }
}

/// Position just after the comma following `pos`, skipping trivia.
///
/// Returns `None` when the next significant byte is not a comma.
pub fn comma_after(text: &str, pos: usize) -> Option<usize> {
    let next = skip_trivia(text, pos);
    (text.as_bytes().get(next) == Some(&b',')).then_some(next + 1)
}

/// End of the "tail" of an item ending at `pos`.
///
/// The tail is an optional comma, an optional same-line `//` or `/* */`
/// comment and the terminating newline. Anything on the following line
/// belongs to the next sibling.
pub fn item_tail_end(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let mut cur = skip_inline_ws(text, pos);
    if bytes.get(cur) == Some(&b',') {
        cur = skip_inline_ws(text, cur + 1);
    }
    if bytes[cur..].starts_with(b"//") {
        cur = line_end(text, cur);
    } else if bytes[cur..].starts_with(b"/*") {
        if let Some(i) = memmem::find(&bytes[cur + 2..], b"*/") {
            let close = cur + i + 4;
            if !spans_lines(text, cur, close) {
                cur = skip_inline_ws(text, close);
            }
        }
    }
    if bytes.get(cur) == Some(&b'\n') {
        cur + 1
    } else {
        cur
    }
}

/// Start of the standalone comment lines directly above the line at `pos`.
///
/// Walks upward over lines whose only content is a `//` comment or a
/// `/* */` block. A block closing on its own line is followed back to the
/// line that opens it. Blank lines stop the walk so that a comment separated
/// by an empty line stays with whatever precedes it.
pub fn leading_comment_start(text: &str, pos: usize) -> usize {
    let mut start = line_start(text, pos);
    while start > 0 {
        let prev_start = line_start(text, start - 1);
        let line = text[prev_start..start - 1].trim();
        if line.starts_with("//") || (line.starts_with("/*") && line.ends_with("*/")) {
            start = prev_start;
        } else if line.ends_with("*/") {
            match block_comment_open(text, start - 1) {
                Some(open) => start = open,
                None => break,
            }
        } else {
            break;
        }
    }
    start
}

/// Line start of the `/*` opening the block comment that closes before
/// `close`, when that `/*` is the first thing on its line.
fn block_comment_open(text: &str, close: usize) -> Option<usize> {
    let open = memmem::rfind(&text.as_bytes()[..close], b"/*")?;
    let open_line = line_start(text, open);
    starts_line(text, open).then_some(open_line)
}

/// Re-indent every line after the first from `from` to `to`.
///
/// Used when a source fragment is moved into a container nested at a
/// different depth. Lines that do not start with `from` are left alone.
pub fn reindent(fragment: &str, from: &str, to: &str) -> String {
    if from == to || !fragment.contains('\n') {
        return fragment.to_string();
    }
    let mut out = String::with_capacity(fragment.len());
    for (i, line) in fragment.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            match line.strip_prefix(from) {
                Some(rest) => {
                    out.push_str(to);
                    out.push_str(rest);
                }
                None => out.push_str(line),
            }
        } else {
            out.push_str(line);
        }
    }
    out
}
