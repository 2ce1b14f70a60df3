//! pbxpatch core -- schema-agnostic structural text patching for Xcode
//! project manifests.
//!
//! This crate edits a `project.pbxproj` document as raw text. It never builds
//! a full syntax tree; instead it locates entries and list fields with a
//! shared delimiter-balanced scanner and splices text in place, so every byte
//! it does not touch is preserved exactly as Xcode wrote it.
//!
//! # Quick Start
//!
//! ```
//! use pbxpatch_core::prelude::*;
//!
//! let mut doc = String::from(
//!     "\t\tAAAA /* App */ = {\n\t\t\tisa = PBXGroup;\n\t\t\tchildren = (\n\t\t\t\tBBBB /* A.swift */,\n\t\t\t);\n\t\t};\n",
//! );
//!
//! let entry = find_entry_by_label(&doc, "App").unwrap();
//! let children = find_list_field(&doc, &entry, "children").unwrap();
//! let outcome = insert_list_item(&mut doc, &children, "CCCC /* B.swift */").unwrap();
//! assert_eq!(outcome, EditOutcome::Applied);
//! assert!(doc.contains("\t\t\t\tCCCC /* B.swift */,\n\t\t\t);"));
//! ```
//!
//! # Modules
//!
//! - [`identifier`]: fresh 24-character tokens for new entries.
//! - [`document`]: loading, backed-up saving, content hashing.
//! - [`scan`]: the delimiter-balanced scanner every locate operation uses.
//! - [`locate`]: entries, fields and section markers.
//! - [`list`]: parsed list field items with exact membership.
//! - [`splice`]: text-to-text insertions and removals.
//! - [`guard`]: idempotency verdicts and whole-token presence checks.

#![deny(unsafe_code)]

use std::path::PathBuf;

pub mod document;
pub mod guard;
pub mod identifier;
pub mod list;
pub mod locate;
pub mod scan;
pub mod splice;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by manifest patching operations.
///
/// An item that is already present is not an error; see
/// [`guard::EditOutcome::AlreadyPresent`].
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// A file, entry, list field or section marker could not be located.
    #[error("not found: {what}")]
    NotFound {
        /// Human-readable description of what was being looked for.
        what: String,
    },

    /// Balanced scanning ran off the end of the document, or a construct was
    /// not shaped the way the surrounding syntax requires.
    #[error("malformed document at byte {offset}: {reason}")]
    MalformedDocument {
        offset: usize,
        reason: String,
    },

    /// Reading or writing a file failed for a reason other than absence.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A task configuration was unreadable or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A required step failed and the run stopped before saving.
    #[error("aborted at required step '{step}'")]
    Aborted {
        step: String,
    },
}

impl PatchError {
    /// Shorthand for building a [`PatchError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        PatchError::NotFound { what: what.into() }
    }

    /// Shorthand for building a [`PatchError::MalformedDocument`].
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        PatchError::MalformedDocument {
            offset,
            reason: reason.into(),
        }
    }

    /// Whether this error is a recoverable absence rather than a fatal fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PatchError::NotFound { .. })
    }
}

/// Result alias used throughout the pbxpatch crates.
pub type Result<T> = std::result::Result<T, PatchError>;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::document::{backup_path, content_hash, load, save, SaveOutcome};
    pub use crate::guard::{token_in_use, EditOutcome};
    pub use crate::identifier::{is_token, IdGenerator, Token, TOKEN_LEN};
    pub use crate::list::{ListField, ListItem};
    pub use crate::locate::{
        entries_between, entries_with_label, find_entry_by_label, find_entry_by_token,
        find_list_field, find_marker, Entry, Span,
    };
    pub use crate::scan::scan_balanced_block;
    pub use crate::splice::{
        insert_entry, insert_entry_after, insert_field, insert_list_item, insert_list_value,
        remove_entry, remove_list_item, remove_references,
    };
    pub use crate::{PatchError, Result};
}
