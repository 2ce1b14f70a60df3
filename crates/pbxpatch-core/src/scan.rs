//! Delimiter-balanced scanning and low-level lexing over manifest text.
//!
//! Every operation that needs the extent of a `{ ... }` block or a `( ... )`
//! list goes through [`scan_balanced_block`]. The scanner tracks nesting
//! depth and ignores delimiters that appear inside `/* ... */` comments,
//! `// ...` line comments and `"..."` strings, so a label such as
//! `/* Exceptions for "{Folder}" */` never closes a block early.
//!
//! All positions are byte offsets. The delimiters the scanner cares about are
//! ASCII, and UTF-8 continuation bytes never collide with ASCII, so byte-wise
//! scanning is safe on arbitrary UTF-8 input.

use crate::{PatchError, Result};

/// Find the end of the block that opens at `open_at`.
///
/// `open_at` must index a `{` or `(`. Returns the offset one past the
/// matching closing delimiter.
///
/// # Errors
///
/// [`PatchError::MalformedDocument`] if `open_at` is not an opening
/// delimiter, or if the input ends (or a comment/string is unterminated)
/// before depth returns to zero.
///
/// ```
/// use pbxpatch_core::scan::scan_balanced_block;
///
/// let text = "a = { b = { c = 1; }; /* } */ };";
/// let end = scan_balanced_block(text, 4).unwrap();
/// assert_eq!(&text[4..end], "{ b = { c = 1; }; /* } */ }");
/// ```
pub fn scan_balanced_block(text: &str, open_at: usize) -> Result<usize> {
    let bytes = text.as_bytes();
    let (open, close) = match bytes.get(open_at) {
        Some(b'{') => (b'{', b'}'),
        Some(b'(') => (b'(', b')'),
        _ => {
            return Err(PatchError::malformed(
                open_at,
                "balanced scan must start at '{' or '('",
            ))
        }
    };

    let mut depth: usize = 0;
    let mut i = open_at;
    while i < bytes.len() {
        if let Some(next) = skip_comment_or_string(bytes, i)? {
            i = next;
            continue;
        }
        let b = bytes[i];
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Ok(i + 1);
            }
        }
        i += 1;
    }

    Err(PatchError::malformed(
        open_at,
        format!("no matching '{}' before end of input", close as char),
    ))
}

// ---------------------------------------------------------------------------
// Lexing helpers
// ---------------------------------------------------------------------------

/// If a comment or quoted string starts at `i`, return the offset just past
/// it. Returns `Ok(None)` when `i` is ordinary text.
pub(crate) fn skip_comment_or_string(bytes: &[u8], i: usize) -> Result<Option<usize>> {
    match bytes.get(i) {
        Some(b'/') => match bytes.get(i + 1) {
            Some(b'*') => {
                let mut j = i + 2;
                while j + 1 < bytes.len() {
                    if bytes[j] == b'*' && bytes[j + 1] == b'/' {
                        return Ok(Some(j + 2));
                    }
                    j += 1;
                }
                Err(PatchError::malformed(i, "unterminated comment"))
            }
            Some(b'/') => {
                let mut j = i + 2;
                while j < bytes.len() && bytes[j] != b'\n' {
                    j += 1;
                }
                Ok(Some(j))
            }
            _ => Ok(None),
        },
        Some(b'"') => {
            let mut j = i + 1;
            while j < bytes.len() {
                match bytes[j] {
                    b'\\' => j += 2,
                    b'"' => return Ok(Some(j + 1)),
                    _ => j += 1,
                }
            }
            Err(PatchError::malformed(i, "unterminated string"))
        }
        _ => Ok(None),
    }
}

/// Whether a block comment starts at `i`.
pub(crate) fn is_block_comment(bytes: &[u8], i: usize) -> bool {
    bytes.get(i) == Some(&b'/') && bytes.get(i + 1) == Some(&b'*')
}

/// Skip whitespace only.
pub(crate) fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Skip whitespace and comments (but not strings).
pub(crate) fn skip_trivia(bytes: &[u8], mut i: usize) -> Result<usize> {
    loop {
        i = skip_whitespace(bytes, i);
        let is_comment = bytes.get(i) == Some(&b'/')
            && matches!(bytes.get(i + 1), Some(b'*') | Some(b'/'));
        if !is_comment {
            return Ok(i);
        }
        // Both comment forms return Some.
        i = skip_comment_or_string(bytes, i)?.unwrap_or(i + 1);
    }
}

/// Read one scalar atom (a quoted string or a bare word) starting at `i`.
///
/// Returns the offset just past the atom, or `Ok(None)` when no atom starts
/// at `i`. Bare words may contain `/` (paths are written unquoted) but stop
/// at the start of a comment.
pub(crate) fn read_atom(bytes: &[u8], i: usize) -> Result<Option<usize>> {
    match bytes.get(i) {
        None => Ok(None),
        Some(b'"') => skip_comment_or_string(bytes, i),
        Some(&b) if is_structural(b) || b.is_ascii_whitespace() => Ok(None),
        Some(_) => {
            if bytes[i] == b'/' && matches!(bytes.get(i + 1), Some(b'*') | Some(b'/')) {
                return Ok(None);
            }
            let mut j = i;
            while j < bytes.len() {
                let b = bytes[j];
                if is_structural(b) || b.is_ascii_whitespace() || b == b'"' {
                    break;
                }
                if b == b'/' && matches!(bytes.get(j + 1), Some(b'*') | Some(b'/')) {
                    break;
                }
                j += 1;
            }
            Ok(Some(j))
        }
    }
}

/// Text of the block comment that starts at `i`, trimmed, plus the offset
/// past it.
pub(crate) fn read_comment(text: &str, i: usize) -> Result<Option<(&str, usize)>> {
    let bytes = text.as_bytes();
    if !is_block_comment(bytes, i) {
        return Ok(None);
    }
    match skip_comment_or_string(bytes, i)? {
        Some(end) => Ok(Some((text[i + 2..end - 2].trim(), end))),
        None => Ok(None),
    }
}

fn is_structural(b: u8) -> bool {
    matches!(b, b'{' | b'}' | b'(' | b')' | b';' | b'=' | b',')
}

/// Whether `b` can be part of a generated token or bare identifier.
pub(crate) fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Strip one pair of surrounding double quotes, if present.
pub(crate) fn unquote(atom: &str) -> &str {
    if atom.len() >= 2 && atom.starts_with('"') && atom.ends_with('"') {
        &atom[1..atom.len() - 1]
    } else {
        atom
    }
}

// ---------------------------------------------------------------------------
// Line geometry
// ---------------------------------------------------------------------------

/// Offset of the first byte of the line containing `pos`.
pub(crate) fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |nl| nl + 1)
}

/// Offset just past the newline that ends the line containing `pos`, or the
/// end of the text when that line is the last one.
pub(crate) fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map_or(text.len(), |nl| pos + nl + 1)
}

/// The run of spaces and tabs that begins at `start`.
pub(crate) fn indentation(text: &str, start: usize) -> &str {
    let rest = &text[start..];
    let width = rest
        .bytes()
        .take_while(|b| *b == b' ' || *b == b'\t')
        .count();
    &rest[..width]
}

/// Whether `text[from..to]` is spaces and tabs only.
pub(crate) fn is_blank(text: &str, from: usize, to: usize) -> bool {
    text[from..to].bytes().all(|b| b == b' ' || b == b'\t')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
