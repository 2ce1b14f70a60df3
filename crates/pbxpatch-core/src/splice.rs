//! Text-to-text insertions and removals.
//!
//! Every function here takes the document as `&mut String`, edits it in
//! place, and reports an [`EditOutcome`]. None of them touch the filesystem,
//! and given the same document and arguments they always produce the same
//! text.
//!
//! Edits reuse the formatting of their neighbours: a new list item gets the
//! indentation of the item above it, a new field gets the indentation of the
//! field it is inserted before, and inline lists such as `(Weak, )` stay
//! inline.
//!
//! Spans passed in (an [`Entry`] or [`ListField`]) must have been located in
//! the current text; any edit invalidates them.

use crate::guard::EditOutcome;
use crate::list::{all_list_fields, parse_item_text, ListField};
use crate::locate::{find_entry_by_token, find_marker, Entry};
use crate::scan::{indentation, is_blank, line_end, line_start, read_atom, skip_whitespace};
use crate::{PatchError, Result};

// ---------------------------------------------------------------------------
// List items
// ---------------------------------------------------------------------------

/// Append `item_text` (for example `TOKEN /* label */`) to `field`.
///
/// No-op with [`EditOutcome::AlreadyPresent`] when an item with the same
/// value, or the same label, is already listed.
///
/// # Errors
///
/// [`PatchError::MalformedDocument`] if `item_text` has no value.
pub fn insert_list_item(
    doc: &mut String,
    field: &ListField,
    item_text: &str,
) -> Result<EditOutcome> {
    insert_item(doc, field, item_text, true)
}

/// Append `item_text` to `field` unless an item with the same value is
/// already listed.
///
/// Unlike [`insert_list_item`], a different token carrying the same label
/// does not count: a new `GROUP2 /* Tests */` is still added next to a
/// legacy `GROUP1 /* Tests */`.
pub fn insert_list_value(
    doc: &mut String,
    field: &ListField,
    item_text: &str,
) -> Result<EditOutcome> {
    insert_item(doc, field, item_text, false)
}

fn insert_item(
    doc: &mut String,
    field: &ListField,
    item_text: &str,
    match_label: bool,
) -> Result<EditOutcome> {
    let item_text = item_text.trim();
    let (value, label) = parse_item_text(item_text)?;
    let present = if match_label {
        field.contains(&value) || label.as_deref().is_some_and(|l| field.contains(l))
    } else {
        field.find(&value).is_some()
    };
    if present {
        tracing::debug!(field = %field.name, item = %value, "list item already present");
        return Ok(EditOutcome::AlreadyPresent);
    }

    if field.is_multiline(doc) {
        insert_multiline(doc, field, item_text);
    } else {
        insert_inline(doc, field, item_text);
    }

    tracing::debug!(field = %field.name, item = %value, "inserted list item");
    Ok(EditOutcome::Applied)
}

fn insert_multiline(doc: &mut String, field: &ListField, item_text: &str) {
    let close_line = line_start(doc, field.close);
    let close_alone = is_blank(doc, close_line, field.close);

    let indent = match field.items.last() {
        Some(last) => indentation(doc, line_start(doc, last.span.start)).to_owned(),
        None => format!("{}\t", indentation(doc, close_line)),
    };

    // Insert at the higher offset first so the lower one stays valid.
    if close_alone {
        doc.insert_str(close_line, &format!("{indent}{item_text},\n"));
    } else {
        doc.insert_str(field.close, &format!("\n{indent}{item_text},\n"));
    }
    if let Some(last) = field.items.last() {
        if last.comma.is_none() {
            doc.insert(last.span.end, ',');
        }
    }
}

fn insert_inline(doc: &mut String, field: &ListField, item_text: &str) {
    match field.items.last() {
        None => doc.insert_str(field.close, item_text),
        Some(last) if last.comma.is_some() => {
            doc.insert_str(field.close, &format!("{item_text}, "));
        }
        Some(last) => doc.insert_str(last.span.end, &format!(", {item_text}")),
    }
}

/// Remove the first item of `field` whose value is exactly `token`, with its
/// comma and, when it sits on its own line, the whole line.
pub fn remove_list_item(doc: &mut String, field: &ListField, token: &str) -> Result<EditOutcome> {
    let Some(index) = field.items.iter().position(|item| item.value == token) else {
        return Ok(EditOutcome::Absent);
    };
    let item = &field.items[index];
    let after_item = item.comma.map_or(item.span.end, |c| c + 1);

    let own_line = line_start(doc, item.span.start);
    let rest = line_end(doc, after_item);
    let rest_blank = doc[after_item..rest].trim().is_empty();

    let range = if field.is_multiline(doc) && is_blank(doc, own_line, item.span.start) && rest_blank
    {
        own_line..rest
    } else if item.comma.is_some() {
        item.span.start..skip_spaces(doc, after_item)
    } else if let Some(prev_comma) = index
        .checked_sub(1)
        .and_then(|p| field.items[p].comma)
    {
        prev_comma..item.span.end
    } else {
        item.span.start..item.span.end
    };

    doc.replace_range(range, "");
    tracing::debug!(field = %field.name, item = token, "removed list item");
    Ok(EditOutcome::Applied)
}

/// Remove `token` from every list field in the document.
///
/// Returns how many items were removed.
pub fn remove_references(doc: &mut String, token: &str) -> Result<usize> {
    let mut removed = 0;
    loop {
        let lists = all_list_fields(doc)?;
        let Some(field) = lists.iter().find(|l| l.find(token).is_some()) else {
            break;
        };
        remove_list_item(doc, field, token)?;
        removed += 1;
    }
    if removed > 0 {
        tracing::debug!(token, removed, "removed references");
    }
    Ok(removed)
}

fn skip_spaces(doc: &str, mut i: usize) -> usize {
    let bytes = doc.as_bytes();
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t') {
        i += 1;
    }
    i
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Token that an entry's source text defines.
fn defined_token(entry_text: &str) -> Result<&str> {
    let text = entry_text.trim_start();
    let end = read_atom(text.as_bytes(), 0)?
        .ok_or_else(|| PatchError::malformed(0, "entry text has no leading token"))?;
    Ok(&text[..end])
}

fn entry_defined(doc: &str, entry_text: &str) -> Result<bool> {
    let token = defined_token(entry_text)?;
    match find_entry_by_token(doc, token) {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Insert a whole entry on its own line(s) just before the line holding
/// `section_end_marker`, keeping it grouped with its siblings.
///
/// No-op with [`EditOutcome::AlreadyPresent`] when the entry's token is
/// already defined.
///
/// # Errors
///
/// [`PatchError::NotFound`] if the marker is missing.
pub fn insert_entry(
    doc: &mut String,
    section_end_marker: &str,
    entry_text: &str,
) -> Result<EditOutcome> {
    if entry_defined(doc, entry_text)? {
        return Ok(EditOutcome::AlreadyPresent);
    }
    let marker = find_marker(doc, section_end_marker)?;
    let at = line_start(doc, marker);
    doc.insert_str(at, &format!("{}\n", entry_text.trim_end_matches('\n')));
    tracing::debug!(marker = section_end_marker, "inserted entry");
    Ok(EditOutcome::Applied)
}

/// Insert a whole entry just after the line holding `section_begin_marker`.
///
/// Same idempotency and errors as [`insert_entry`].
pub fn insert_entry_after(
    doc: &mut String,
    section_begin_marker: &str,
    entry_text: &str,
) -> Result<EditOutcome> {
    if entry_defined(doc, entry_text)? {
        return Ok(EditOutcome::AlreadyPresent);
    }
    let marker = find_marker(doc, section_begin_marker)?;
    let at = line_end(doc, marker);
    let text = entry_text.trim_end_matches('\n');
    if at == doc.len() && !doc.ends_with('\n') {
        doc.push('\n');
        doc.push_str(text);
    } else {
        doc.insert_str(at, &format!("{text}\n"));
    }
    tracing::debug!(marker = section_begin_marker, "inserted entry");
    Ok(EditOutcome::Applied)
}

/// Remove the definition of `token`: from its indentation through the
/// closing `};` and line terminator.
pub fn remove_entry(doc: &mut String, token: &str) -> Result<EditOutcome> {
    let entry = match find_entry_by_token(doc, token) {
        Ok(entry) => entry,
        Err(e) if e.is_not_found() => return Ok(EditOutcome::Absent),
        Err(e) => return Err(e),
    };

    let mut end = entry.span.end;
    let semi = skip_whitespace(doc.as_bytes(), end);
    if doc.as_bytes().get(semi) == Some(&b';') {
        end = semi + 1;
    }

    let first_line = line_start(doc, entry.span.start);
    let last_line_end = line_end(doc, end);
    let range = if is_blank(doc, first_line, entry.span.start)
        && doc[end..last_line_end].trim().is_empty()
    {
        first_line..last_line_end
    } else {
        entry.span.start..skip_spaces(doc, end)
    };

    doc.replace_range(range, "");
    tracing::debug!(token, "removed entry");
    Ok(EditOutcome::Applied)
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// Insert a new `key = value;` field into `entry`, just before the field
/// named `before_key`, or before the closing `}` when `before_key` is `None`
/// or not present.
///
/// In a multi-line entry every line of `field_text` is prefixed with the
/// sibling fields' indentation, so a list is written with relative
/// indentation: `"files = (\n\tA /* a */,\n);"`.
///
/// No-op with [`EditOutcome::AlreadyPresent`] when the entry already has a
/// field with the new field's key.
pub fn insert_field(
    doc: &mut String,
    entry: &Entry,
    before_key: Option<&str>,
    field_text: &str,
) -> Result<EditOutcome> {
    let field_text = field_text.trim();
    let key = defined_token(field_text)?;
    let fields = entry.fields(doc)?;
    if fields.iter().any(|f| f.key == key) {
        return Ok(EditOutcome::AlreadyPresent);
    }

    let anchor = before_key.and_then(|k| fields.iter().find(|f| f.key == k));
    let (at_pos, sibling) = match anchor {
        Some(field) => (field.span.start, Some(field.span.start)),
        None => (entry.body.end - 1, fields.last().map(|f| f.span.start)),
    };

    let anchor_line = line_start(doc, at_pos);
    if is_blank(doc, anchor_line, at_pos) {
        let indent = match sibling {
            Some(pos) => indentation(doc, line_start(doc, pos)).to_owned(),
            None => format!("{}\t", indentation(doc, anchor_line)),
        };
        let mut text = String::new();
        for line in field_text.lines() {
            text.push_str(&indent);
            text.push_str(line);
            text.push('\n');
        }
        doc.insert_str(anchor_line, &text);
    } else {
        doc.insert_str(at_pos, &format!("{field_text} "));
    }

    tracing::debug!(entry = %entry.token, field = key, "inserted field");
    Ok(EditOutcome::Applied)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
