//! Parsed list fields.
//!
//! A list field is a parenthesised, comma-separated sequence of references
//! or literals:
//!
//! ```text
//! exceptions = (
//!     24807B7C2EEB52F1008E3E1E /* Exceptions for "App" folder in "Ext" target */,
//!     Info.plist,
//! );
//! ```
//!
//! [`ListField`] splits the field into discrete [`ListItem`]s so that
//! "is this already listed?" is answered by exact equality on an item's
//! value or label. Substring search would wrongly report `ABC` as present in
//! a list that only holds `ABCD`.

use crate::locate::Span;
use crate::scan::{
    line_start, read_atom, read_comment, scan_balanced_block, skip_comment_or_string,
    skip_trivia, skip_whitespace,
};
use crate::{PatchError, Result};

// ---------------------------------------------------------------------------
// ListItem
// ---------------------------------------------------------------------------

/// One element of a list field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// The reference token or literal, exactly as written (quotes kept).
    pub value: String,
    /// The trailing comment label, if any.
    pub label: Option<String>,
    /// From the first byte of the value to one past the label comment (or
    /// the value when unlabelled). Excludes the separating comma.
    pub span: Span,
    /// Offset of the comma that terminates this item, if it has one.
    pub comma: Option<usize>,
}

impl ListItem {
    /// Whether `key` names this item, by value or by label.
    pub fn matches(&self, key: &str) -> bool {
        self.value == key || self.label.as_deref() == Some(key)
    }
}

/// Split a single item's source text (`TOKEN /* label */`) into value and
/// label.
///
/// # Errors
///
/// [`PatchError::MalformedDocument`] if `text` does not start with a value.
pub fn parse_item_text(text: &str) -> Result<(String, Option<String>)> {
    let text = text.trim();
    let bytes = text.as_bytes();
    let end = read_atom(bytes, 0)?
        .ok_or_else(|| PatchError::malformed(0, format!("list item `{text}` has no value")))?;
    let value = text[..end].to_owned();
    let i = skip_whitespace(bytes, end);
    let label = read_comment(text, i)?.map(|(label, _)| label.to_owned());
    Ok((value, label))
}

// ---------------------------------------------------------------------------
// ListField
// ---------------------------------------------------------------------------

/// A located and parsed list field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListField {
    /// The field's key (`children`, `exceptions`, ...).
    pub name: String,
    /// Offset of the opening `(`.
    pub open: usize,
    /// Offset of the closing `)`.
    pub close: usize,
    /// The items, in document order.
    pub items: Vec<ListItem>,
}

impl ListField {
    /// Parse the list whose `(` is at `open`.
    ///
    /// Items are usually atoms. A dictionary or nested list item (as in
    /// `projectReferences = ( { ProductGroup = ...; }, );`) is kept whole as
    /// the item's value.
    ///
    /// # Errors
    ///
    /// [`PatchError::MalformedDocument`] if the list never closes or an item
    /// is not followed by `,` or `)`.
    pub fn parse(doc: &str, name: &str, open: usize) -> Result<Self> {
        let bytes = doc.as_bytes();
        let close = scan_balanced_block(doc, open)? - 1;
        let mut items = Vec::new();
        let mut i = open + 1;

        loop {
            i = skip_trivia(bytes, i)?;
            if i >= close {
                break;
            }

            let start = i;
            let value_end = match bytes[i] {
                b'{' | b'(' => scan_balanced_block(doc, i)?,
                _ => read_atom(bytes, i)?.ok_or_else(|| {
                    PatchError::malformed(i, format!("expected an item in list '{name}'"))
                })?,
            };
            let value = doc[start..value_end].to_owned();

            let mut end = value_end;
            let mut label = None;
            i = skip_whitespace(bytes, value_end);
            if let Some((text, comment_end)) = read_comment(doc, i)? {
                label = Some(text.to_owned());
                end = comment_end;
                i = skip_whitespace(bytes, comment_end);
            }

            let comma = match bytes.get(i) {
                Some(b',') => {
                    i += 1;
                    Some(i - 1)
                }
                _ if i >= close => None,
                _ => {
                    return Err(PatchError::malformed(
                        i,
                        format!("expected ',' or ')' after item `{value}` in list '{name}'"),
                    ))
                }
            };

            items.push(ListItem {
                value,
                label,
                span: Span::new(start, end),
                comma,
            });
        }

        Ok(Self {
            name: name.to_owned(),
            open,
            close,
            items,
        })
    }

    /// The whole field value, `(` through `)`.
    pub fn span(&self) -> Span {
        Span::new(self.open, self.close + 1)
    }

    /// Whether an item with this exact value or label is listed.
    pub fn contains(&self, key: &str) -> bool {
        self.items.iter().any(|item| item.matches(key))
    }

    /// The first item whose value is exactly `value`.
    pub fn find(&self, value: &str) -> Option<&ListItem> {
        self.items.iter().find(|item| item.value == value)
    }

    /// Item values in order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether items are written one per line (Xcode's usual style) rather
    /// than inline like `(Weak, )`.
    pub fn is_multiline(&self, doc: &str) -> bool {
        doc[self.open..self.close].contains('\n')
    }
}

/// Every list field anywhere in `doc`, in document order.
///
/// A list is a `(` that directly follows `key =`. Parentheses inside
/// comments and strings are ignored.
pub fn all_list_fields(doc: &str) -> Result<Vec<ListField>> {
    let bytes = doc.as_bytes();
    let mut lists = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if let Some(next) = skip_comment_or_string(bytes, i)? {
            i = next;
            continue;
        }
        if bytes[i] == b'(' {
            if let Some(name) = key_before(doc, i) {
                let list = ListField::parse(doc, name, i)?;
                i = list.close + 1;
                lists.push(list);
                continue;
            }
        }
        i += 1;
    }

    Ok(lists)
}

/// The key of `key = (` when the `(` at `open` is a field value.
fn key_before(doc: &str, open: usize) -> Option<&str> {
    let line = &doc[line_start(doc, open)..open];
    let before_eq = line.trim_end().strip_suffix('=')?.trim_end();
    let key_start = before_eq
        .rfind(|c: char| c.is_whitespace() || c == ';' || c == '{')
        .map_or(0, |p| p + 1);
    let key = &before_eq[key_start..];
    (!key.is_empty()).then_some(key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
