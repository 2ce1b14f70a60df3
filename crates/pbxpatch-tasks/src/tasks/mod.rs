//! The configured maintenance tasks and the schema vocabulary they share.
//!
//! Everything that knows Xcode's object model lives here: `isa` values,
//! field names and section markers. The core crate only ever sees them as
//! strings passed in.

mod link_package;
mod membership;
mod remove;
mod sync_folder;

pub use link_package::LinkPackageProduct;
pub use membership::TargetMembership;
pub use remove::{RemovePackage, RemoveTarget};
pub use sync_folder::SyncFolder;

use pbxpatch_core::guard::EditOutcome;
use pbxpatch_core::locate::{
    entries_between, entries_with_label, find_entry_by_token, find_list_field, Entry,
};
use pbxpatch_core::splice::{
    insert_entry, insert_field, insert_list_value, remove_entry, remove_references,
};
use pbxpatch_core::{PatchError, Result};

use crate::script::{PatchRun, Progress};

// ---------------------------------------------------------------------------
// Object model vocabulary
// ---------------------------------------------------------------------------

pub(crate) mod isa {
    pub const BUILD_FILE: &str = "PBXBuildFile";
    pub const CONTAINER_ITEM_PROXY: &str = "PBXContainerItemProxy";
    pub const FRAMEWORKS_BUILD_PHASE: &str = "PBXFrameworksBuildPhase";
    pub const SYNCHRONIZED_ROOT_GROUP: &str = "PBXFileSystemSynchronizedRootGroup";
    pub const SYNCHRONIZED_EXCEPTION_SET: &str = "PBXFileSystemSynchronizedBuildFileExceptionSet";
    pub const TARGET_DEPENDENCY: &str = "PBXTargetDependency";
    pub const PACKAGE_PRODUCT_DEPENDENCY: &str = "XCSwiftPackageProductDependency";
    pub const CONFIGURATION_LIST: &str = "XCConfigurationList";
}

/// `/* Begin <isa> section */`
pub(crate) fn section_begin(isa: &str) -> String {
    format!("/* Begin {isa} section */")
}

/// `/* End <isa> section */`
pub(crate) fn section_end(isa: &str) -> String {
    format!("/* End {isa} section */")
}

/// A list item or scalar reference: `TOKEN /* label */`.
pub(crate) fn reference(token: &str, label: &str) -> String {
    format!("{token} /* {label} */")
}

/// Quote a scalar value unless it is made only of characters Xcode writes
/// bare.
pub(crate) fn quote_if_needed(value: &str) -> String {
    let bare = !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'/' | b'.' | b':'));
    if bare {
        value.to_owned()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

/// Whether `entry` has the given `isa`.
pub(crate) fn has_isa(doc: &str, entry: &Entry, isa: &str) -> Result<bool> {
    Ok(entry.scalar(doc, "isa")?.as_deref() == Some(isa))
}

/// The entry defined by `token`, checked to be of kind `isa`.
pub(crate) fn find_with_isa(doc: &str, token: &str, isa: &str) -> Result<Entry> {
    let entry = find_entry_by_token(doc, token)?;
    if has_isa(doc, &entry, isa)? {
        Ok(entry)
    } else {
        Err(PatchError::not_found(format!("{isa} {token}")))
    }
}

/// The first entry labelled `label` whose `isa` matches.
pub(crate) fn find_labelled_with_isa(doc: &str, label: &str, isa: &str) -> Result<Entry> {
    for entry in entries_with_label(doc, label)? {
        if has_isa(doc, &entry, isa)? {
            return Ok(entry);
        }
    }
    Err(PatchError::not_found(format!("{isa} labelled \"{label}\"")))
}

/// Every entry in the `isa` section. A missing section has no entries.
pub(crate) fn entries_of_isa(doc: &str, isa: &str) -> Result<Vec<Entry>> {
    match entries_between(doc, &section_begin(isa), &section_end(isa)) {
        Ok(entries) => Ok(entries),
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Tokens of every `isa` entry whose scalar `key` equals `value`.
pub(crate) fn tokens_where(doc: &str, isa: &str, key: &str, value: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    for entry in entries_of_isa(doc, isa)? {
        if entry.scalar(doc, key)?.as_deref() == Some(value) {
            tokens.push(entry.token);
        }
    }
    Ok(tokens)
}

/// Display name for a located entry: its label, or its token.
pub(crate) fn display_name(entry: &Entry) -> String {
    entry.label.clone().unwrap_or_else(|| entry.token.clone())
}

// ---------------------------------------------------------------------------
// Edit helpers
// ---------------------------------------------------------------------------

/// Insert `entry_text` into its `isa` section, creating the section just
/// before the close of the `objects` dictionary when the manifest has none.
pub(crate) fn insert_into_section(
    doc: &mut String,
    isa: &str,
    entry_text: &str,
) -> Result<EditOutcome> {
    let end = section_end(isa);
    if !doc.contains(&end) {
        let objects = find_entry_by_token(doc, "objects")?;
        let close = objects.body.end - 1;
        let at = doc[..close].rfind('\n').map_or(0, |nl| nl + 1);
        doc.insert_str(at, &format!("\n{}\n{end}\n", section_begin(isa)));
        tracing::debug!(isa, "created section");
    }
    insert_entry(doc, &end, entry_text)
}

/// Add `item` to the list field `field` of the entry `token`, creating the
/// field before `before_key` when the entry has none.
///
/// Presence is decided by the item's value only; another object with the
/// same label does not stand in for it.
pub(crate) fn ensure_listed(
    doc: &mut String,
    token: &str,
    field: &str,
    before_key: Option<&str>,
    item: &str,
) -> Result<EditOutcome> {
    let entry = find_entry_by_token(doc, token)?;
    if entry.field(doc, field)?.is_some() {
        let list = find_list_field(doc, &entry, field)?;
        insert_list_value(doc, &list, item)
    } else {
        let text = format!("{field} = (\n\t{item},\n);");
        insert_field(doc, &entry, before_key, &text)
    }
}

/// Detach `token` from every list field, then delete every definition of
/// it.
///
/// A target token is also a key in the project's `TargetAttributes`
/// dictionary, which reads as a second definition; both go.
///
/// Both steps are optional: a token that is already gone is skipped.
pub(crate) fn purge(run: &mut PatchRun, token: &str, what: &str) -> Result<()> {
    run.optional(&format!("detach {what}"), |cx| {
        let removed = remove_references(cx.doc, token)?;
        let outcome = if removed > 0 {
            EditOutcome::Applied
        } else {
            EditOutcome::Absent
        };
        let detail = match removed {
            0 => format!("{token} not referenced"),
            1 => format!("{token} from 1 list"),
            n => format!("{token} from {n} lists"),
        };
        Ok(Progress::removed(outcome, detail))
    })?;
    run.optional(&format!("delete {what}"), |cx| {
        let mut deleted = 0;
        while remove_entry(cx.doc, token)? == EditOutcome::Applied {
            deleted += 1;
        }
        let (edit, detail) = match deleted {
            0 => (EditOutcome::Absent, token.to_owned()),
            1 => (EditOutcome::Applied, token.to_owned()),
            n => (EditOutcome::Applied, format!("{token}, {n} definitions")),
        };
        Ok(Progress::removed(edit, detail))
    })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
