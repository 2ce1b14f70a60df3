//! Locating entries, fields and section markers.
//!
//! An entry definition has the shape
//!
//! ```text
//! TOKEN /* optional label */ = { key = value; list = ( ... ); ... };
//! ```
//!
//! Entries are found by token or by label, and their extent is always
//! computed with [`scan_balanced_block`], never by searching for the next
//! `}`. Occurrences of a token or label that are references (inside a list,
//! or as the value of a field) are skipped because they are not followed by
//! `= {`.
//!
//! Nothing in this module knows about Xcode field names; callers pass the
//! keys they care about.

use serde::Serialize;

use crate::list::ListField;
use crate::scan::{
    is_word_byte, read_atom, read_comment, scan_balanced_block, skip_trivia, skip_whitespace,
    unquote,
};
use crate::{PatchError, Result};

// ---------------------------------------------------------------------------
// Span
// ---------------------------------------------------------------------------

/// A half-open byte range `start..end` in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} past end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The text this span covers.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A located entry definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The entry's identifier.
    pub token: String,
    /// The comment label after the token, if any.
    pub label: Option<String>,
    /// From the first byte of the token to one past the closing `}`.
    /// The trailing `;` is not included.
    pub span: Span,
    /// From the opening `{` to one past the closing `}`.
    pub body: Span,
}

/// Value shape of a field inside an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `key = value;` (a bare word or quoted string).
    Scalar,
    /// `key = ( ... );`
    List,
    /// `key = { ... };`
    Dict,
}

/// A top-level `key = value;` field inside an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: String,
    pub kind: FieldKind,
    /// From the first byte of the key to one past the terminating `;`.
    pub span: Span,
    /// The value: the scalar atom, or the whole `( ... )` / `{ ... }` block.
    pub value: Span,
}

impl Entry {
    /// Every top-level field of the entry, in document order.
    ///
    /// Nested dictionaries are reported as one [`FieldKind::Dict`] field;
    /// their contents are not descended into.
    pub fn fields(&self, doc: &str) -> Result<Vec<Field>> {
        let bytes = doc.as_bytes();
        let close = self.body.end - 1;
        let mut fields = Vec::new();
        let mut i = self.body.start + 1;

        loop {
            i = skip_trivia(bytes, i)?;
            if i >= close {
                break;
            }

            let key_end = read_atom(bytes, i)?
                .ok_or_else(|| PatchError::malformed(i, "expected a field name"))?;
            let key = unquote(&doc[i..key_end]).to_owned();
            let key_start = i;

            i = skip_trivia(bytes, key_end)?;
            if bytes.get(i) != Some(&b'=') {
                return Err(PatchError::malformed(
                    i,
                    format!("expected '=' after field '{key}'"),
                ));
            }
            i = skip_trivia(bytes, i + 1)?;

            let (kind, value) = match bytes.get(i) {
                Some(b'(') => (FieldKind::List, Span::new(i, scan_balanced_block(doc, i)?)),
                Some(b'{') => (FieldKind::Dict, Span::new(i, scan_balanced_block(doc, i)?)),
                _ => {
                    let end = read_atom(bytes, i)?.ok_or_else(|| {
                        PatchError::malformed(i, format!("expected a value for field '{key}'"))
                    })?;
                    (FieldKind::Scalar, Span::new(i, end))
                }
            };

            i = skip_trivia(bytes, value.end)?;
            if bytes.get(i) != Some(&b';') {
                return Err(PatchError::malformed(
                    i,
                    format!("expected ';' after field '{key}'"),
                ));
            }
            i += 1;

            fields.push(Field {
                key,
                kind,
                span: Span::new(key_start, i),
                value,
            });
        }

        Ok(fields)
    }

    /// The top-level field named `key`, if present.
    pub fn field(&self, doc: &str, key: &str) -> Result<Option<Field>> {
        Ok(self.fields(doc)?.into_iter().find(|f| f.key == key))
    }

    /// The unquoted value of the top-level scalar field `key`, if present.
    pub fn scalar(&self, doc: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .field(doc, key)?
            .filter(|f| f.kind == FieldKind::Scalar)
            .map(|f| unquote(f.value.slice(doc)).to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Entry lookup
// ---------------------------------------------------------------------------

/// Try to read an entry definition whose token starts at `at`.
///
/// Returns `Ok(None)` when the text at `at` is a token that is not followed
/// by `[/* label */] = {` (a reference rather than a definition).
fn entry_at(doc: &str, at: usize) -> Result<Option<Entry>> {
    let bytes = doc.as_bytes();
    let token_end = match read_atom(bytes, at)? {
        Some(end) => end,
        None => return Ok(None),
    };
    let token = &doc[at..token_end];

    let mut i = skip_whitespace(bytes, token_end);
    let mut label = None;
    if let Some((text, end)) = read_comment(doc, i)? {
        label = Some(text.to_owned());
        i = skip_whitespace(bytes, end);
    }
    if bytes.get(i) != Some(&b'=') {
        return Ok(None);
    }
    i = skip_whitespace(bytes, i + 1);
    if bytes.get(i) != Some(&b'{') {
        return Ok(None);
    }

    let end = scan_balanced_block(doc, i)?;
    Ok(Some(Entry {
        token: token.to_owned(),
        label,
        span: Span::new(at, end),
        body: Span::new(i, end),
    }))
}

/// Find the definition of the entry whose identifier is `token`.
///
/// # Errors
///
/// [`PatchError::NotFound`] if no definition exists;
/// [`PatchError::MalformedDocument`] if the definition's block never closes.
pub fn find_entry_by_token(doc: &str, token: &str) -> Result<Entry> {
    let bytes = doc.as_bytes();
    for (at, _) in doc.match_indices(token) {
        let before = at.checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(at + token.len()).copied();
        if before.is_some_and(is_word_byte) || after.is_some_and(is_word_byte) {
            continue;
        }
        if let Some(entry) = entry_at(doc, at)? {
            if entry.token == token {
                tracing::trace!(token, start = entry.span.start, "located entry by token");
                return Ok(entry);
            }
        }
    }
    Err(PatchError::not_found(format!("entry {token}")))
}

/// Every entry definition labelled `/* label */`, in document order.
pub fn entries_with_label(doc: &str, label: &str) -> Result<Vec<Entry>> {
    let needle = format!("/* {label} */");
    let bytes = doc.as_bytes();
    let mut found = Vec::new();

    for (at, _) in doc.match_indices(&needle) {
        // Walk back over whitespace to the end of the token, then over the
        // token itself.
        let mut token_end = at;
        while token_end > 0 && matches!(bytes[token_end - 1], b' ' | b'\t') {
            token_end -= 1;
        }
        let mut token_start = token_end;
        while token_start > 0 && is_word_byte(bytes[token_start - 1]) {
            token_start -= 1;
        }
        if token_start == token_end {
            continue;
        }
        if let Some(entry) = entry_at(doc, token_start)? {
            if entry.label.as_deref() == Some(label) {
                found.push(entry);
            }
        }
    }

    Ok(found)
}

/// Find the first entry definition labelled `/* label */`.
///
/// # Errors
///
/// [`PatchError::NotFound`] if no entry carries the label (references to it
/// do not count); [`PatchError::MalformedDocument`] if the entry's block
/// never closes.
pub fn find_entry_by_label(doc: &str, label: &str) -> Result<Entry> {
    entries_with_label(doc, label)?
        .into_iter()
        .next()
        .ok_or_else(|| PatchError::not_found(format!("entry labelled \"{label}\"")))
}

// ---------------------------------------------------------------------------
// Fields and markers
// ---------------------------------------------------------------------------

/// Find the list field `field_name = ( ... );` directly inside `entry`.
///
/// # Errors
///
/// [`PatchError::NotFound`] if the entry has no such field;
/// [`PatchError::MalformedDocument`] if the field exists but is not a list.
pub fn find_list_field(doc: &str, entry: &Entry, field_name: &str) -> Result<ListField> {
    let field = entry.field(doc, field_name)?.ok_or_else(|| {
        PatchError::not_found(format!("field '{field_name}' in entry {}", entry.token))
    })?;
    if field.kind != FieldKind::List {
        return Err(PatchError::malformed(
            field.value.start,
            format!("field '{field_name}' in entry {} is not a list", entry.token),
        ));
    }
    ListField::parse(doc, field_name, field.value.start)
}

/// Byte offset of the first occurrence of a marker comment such as
/// `/* End PBXGroup section */`.
pub fn find_marker(doc: &str, marker: &str) -> Result<usize> {
    doc.find(marker)
        .ok_or_else(|| PatchError::not_found(format!("marker `{marker}`")))
}

/// Every entry definition between two marker comments, in document order.
///
/// # Errors
///
/// [`PatchError::NotFound`] if either marker is missing;
/// [`PatchError::MalformedDocument`] if anything other than entry
/// definitions sits between them.
pub fn entries_between(doc: &str, begin_marker: &str, end_marker: &str) -> Result<Vec<Entry>> {
    let begin = find_marker(doc, begin_marker)? + begin_marker.len();
    let end = doc[begin..]
        .find(end_marker)
        .map(|at| begin + at)
        .ok_or_else(|| PatchError::not_found(format!("marker `{end_marker}`")))?;

    let bytes = doc.as_bytes();
    let mut entries = Vec::new();
    let mut i = begin;
    loop {
        // The end marker is itself a comment, so trivia skipping can step
        // over it.
        i = skip_trivia(bytes, i)?;
        if i >= end {
            break;
        }
        let entry = entry_at(doc, i)?
            .ok_or_else(|| PatchError::malformed(i, "expected an entry definition"))?;
        i = skip_whitespace(bytes, entry.span.end);
        if bytes.get(i) == Some(&b';') {
            i += 1;
        }
        entries.push(entry);
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
// !$*UTF8*$!
{
\tobjects = {

/* Begin PBXGroup section */
\t\t24FB38692EDF354B00BA1227 = {
\t\t\tisa = PBXGroup;
\t\t\tchildren = (
\t\t\t\t24FB38742EDF354B00BA1227 /* App */,
\t\t\t\t24FB38752EDF354B00BA1227 /* Products */,
\t\t\t);
\t\t\tsourceTree = \"<group>\";
\t\t};
\t\t24FB38752EDF354B00BA1227 /* Products */ = {
\t\t\tisa = PBXGroup;
\t\t\tchildren = (
\t\t\t);
\t\t\tname = Products;
\t\t\tsourceTree = \"<group>\";
\t\t};
/* End PBXGroup section */

/* Begin PBXFileSystemSynchronizedRootGroup section */
\t\t24FB38742EDF354B00BA1227 /* App */ = {
\t\t\tisa = PBXFileSystemSynchronizedRootGroup;
\t\t\texceptions = (
\t\t\t\tAAAA0000AAAA0000AAAA0000 /* Exceptions for \"App\" folder in \"App} Tests\" target */,
\t\t\t);
\t\t\tpath = App;
\t\t\tsourceTree = \"<group>\";
\t\t};
/* End PBXFileSystemSynchronizedRootGroup section */
\t};
}
";

    // -- 1. Lookup by token ------------------------------------------------

    #[test]
    fn finds_unlabelled_entry_by_token() {
        let entry = find_entry_by_token(DOC, "24FB38692EDF354B00BA1227").unwrap();
        assert_eq!(entry.label, None);
        assert!(entry.span.slice(DOC).ends_with("\t\t}"));
        assert_eq!(entry.scalar(DOC, "isa").unwrap().as_deref(), Some("PBXGroup"));
    }

    #[test]
    fn token_lookup_skips_references() {
        // The first occurrence of the folder token is a reference in the
        // main group's children; the definition comes later.
        let entry = find_entry_by_token(DOC, "24FB38742EDF354B00BA1227").unwrap();
        assert_eq!(entry.label.as_deref(), Some("App"));
        assert_eq!(
            entry.scalar(DOC, "isa").unwrap().as_deref(),
            Some("PBXFileSystemSynchronizedRootGroup")
        );
    }

    #[test]
    fn token_lookup_requires_whole_word() {
        let err = find_entry_by_token(DOC, "24FB38692EDF354B00BA122").unwrap_err();
        assert!(err.is_not_found());
    }

    // -- 2. Lookup by label ------------------------------------------------

    #[test]
    fn finds_entry_by_label_past_references() {
        let entry = find_entry_by_label(DOC, "Products").unwrap();
        assert_eq!(entry.token, "24FB38752EDF354B00BA1227");
        assert_eq!(entry.scalar(DOC, "name").unwrap().as_deref(), Some("Products"));
    }

    #[test]
    fn missing_label_is_not_found() {
        assert!(find_entry_by_label(DOC, "Nope").unwrap_err().is_not_found());
    }

    #[test]
    fn span_ends_at_matching_close_despite_braces_in_comments() {
        let entry = find_entry_by_label(DOC, "App").unwrap();
        let text = entry.span.slice(DOC);
        assert!(text.contains("path = App;"));
        assert!(text.contains("sourceTree"));
        assert!(text.ends_with("\t\t}"));
        assert_eq!(&DOC[entry.span.end..entry.span.end + 1], ";");
    }

    #[test]
    fn entries_with_label_lists_all_definitions() {
        let doc = "A1 /* Dup */ = { isa = X; };\nB2 /* Dup */ = { isa = Y; };\nC3 /* Dup */,\n";
        let entries = entries_with_label(doc, "Dup").unwrap();
        let tokens: Vec<_> = entries.iter().map(|e| e.token.as_str()).collect();
        assert_eq!(tokens, vec!["A1", "B2"]);
    }

    #[test]
    fn unclosed_entry_is_malformed() {
        let doc = "A1 /* Broken */ = {\n\tisa = X;\n\tchildren = (\n\t);\n";
        let err = find_entry_by_label(doc, "Broken").unwrap_err();
        assert!(matches!(err, PatchError::MalformedDocument { .. }));
    }

    // -- 3. Fields ---------------------------------------------------------

    #[test]
    fn lists_top_level_fields_only() {
        let doc = "X = { isa = PBXBuildFile; settings = { ATTRIBUTES = (Weak, ); }; productRef = Y /* P */; };";
        let entry = find_entry_by_token(doc, "X").unwrap();
        let fields = entry.fields(doc).unwrap();
        let keys: Vec<_> = fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["isa", "settings", "productRef"]);
        assert_eq!(fields[1].kind, FieldKind::Dict);
        assert_eq!(entry.scalar(doc, "productRef").unwrap().as_deref(), Some("Y"));
    }

    #[test]
    fn finds_list_field_within_entry() {
        let entry = find_entry_by_token(DOC, "24FB38692EDF354B00BA1227").unwrap();
        let children = find_list_field(DOC, &entry, "children").unwrap();
        let values: Vec<_> = children.items.iter().map(|i| i.value.as_str()).collect();
        assert_eq!(
            values,
            vec!["24FB38742EDF354B00BA1227", "24FB38752EDF354B00BA1227"]
        );
    }

    #[test]
    fn missing_list_field_is_not_found() {
        let entry = find_entry_by_label(DOC, "Products").unwrap();
        let err = find_list_field(DOC, &entry, "fileSystemSynchronizedGroups").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn scalar_field_as_list_is_malformed() {
        let entry = find_entry_by_label(DOC, "Products").unwrap();
        let err = find_list_field(DOC, &entry, "name").unwrap_err();
        assert!(matches!(err, PatchError::MalformedDocument { .. }));
    }

    #[test]
    fn finds_markers() {
        assert!(find_marker(DOC, "/* End PBXGroup section */").is_ok());
        assert!(find_marker(DOC, "/* End PBXBuildFile section */")
            .unwrap_err()
            .is_not_found());
    }

    // -- 4. Sections -------------------------------------------------------

    #[test]
    fn lists_entries_between_markers() {
        let entries = entries_between(
            DOC,
            "/* Begin PBXGroup section */",
            "/* End PBXGroup section */",
        )
        .unwrap();
        let tokens: Vec<_> = entries.iter().map(|e| e.token.as_str()).collect();
        assert_eq!(
            tokens,
            vec!["24FB38692EDF354B00BA1227", "24FB38752EDF354B00BA1227"]
        );
    }

    #[test]
    fn empty_section_has_no_entries() {
        let doc = "/* Begin PBXBuildFile section */\n/* End PBXBuildFile section */\n";
        let entries = entries_between(
            doc,
            "/* Begin PBXBuildFile section */",
            "/* End PBXBuildFile section */",
        )
        .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn single_line_entries_between_markers() {
        let doc = "/* Begin PBXBuildFile section */\n\t\tB1 /* R in Frameworks */ = {isa = PBXBuildFile; productRef = P1 /* R */; };\n\t\tB2 = {isa = PBXBuildFile; };\n/* End PBXBuildFile section */\n";
        let entries = entries_between(
            doc,
            "/* Begin PBXBuildFile section */",
            "/* End PBXBuildFile section */",
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].scalar(doc, "productRef").unwrap().as_deref(), Some("P1"));
    }

    #[test]
    fn missing_section_is_not_found() {
        let err = entries_between(
            DOC,
            "/* Begin PBXBuildFile section */",
            "/* End PBXBuildFile section */",
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }
}
