//! Loading and saving manifests with backup snapshots.
//!
//! A run loads the manifest once, edits the text in memory, and hands both
//! the original and the edited text to [`save`]. Saving is the system's
//! top-level idempotency contract:
//!
//! - identical text: nothing is written, not even a backup;
//! - changed text: a byte-exact backup of the original is written first,
//!   then the manifest is overwritten in full.
//!
//! Backups are named `<file>.backup_<operation>`. If that name is taken by
//! an earlier run, `.1`, `.2`, ... is appended, so a snapshot is never
//! overwritten. Nothing here ever deletes a backup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{PatchError, Result};

/// Result of [`save`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// The text was unchanged; no file was written.
    Unchanged,
    /// A backup was written and the manifest was overwritten.
    Written {
        /// Where the pre-edit snapshot was written.
        backup: PathBuf,
    },
    /// The text changed but writing was skipped on request.
    DryRun,
}

impl SaveOutcome {
    pub fn wrote(&self) -> bool {
        matches!(self, SaveOutcome::Written { .. })
    }
}

/// Read the whole manifest.
///
/// # Errors
///
/// [`PatchError::NotFound`] if `path` does not exist, [`PatchError::Io`] for
/// any other read failure (including non-UTF-8 content).
pub fn load(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => {
            tracing::debug!(path = %path.display(), bytes = text.len(), "loaded manifest");
            Ok(text)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(PatchError::not_found(format!(
            "manifest '{}'",
            path.display()
        ))),
        Err(source) => Err(PatchError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persist `updated` to `path` if it differs from `original`, writing a
/// backup of `original` first.
///
/// `operation` names the edit that triggered the save and becomes the backup
/// suffix.
pub fn save(path: &Path, original: &str, updated: &str, operation: &str) -> Result<SaveOutcome> {
    if updated == original {
        tracing::debug!(path = %path.display(), "manifest unchanged, nothing written");
        return Ok(SaveOutcome::Unchanged);
    }

    let backup = backup_path(path, operation);
    write(&backup, original)?;
    write(path, updated)?;

    tracing::info!(
        path = %path.display(),
        backup = %backup.display(),
        "manifest saved"
    );
    Ok(SaveOutcome::Written { backup })
}

fn write(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// The first unused backup path for `path` and `operation`.
///
/// ```
/// use std::path::Path;
/// use pbxpatch_core::document::backup_path;
///
/// let manifest = Path::new("/nonexistent/App.xcodeproj/project.pbxproj");
/// let backup = backup_path(manifest, "sync folder");
/// assert_eq!(
///     backup,
///     Path::new("/nonexistent/App.xcodeproj/project.pbxproj.backup_sync_folder")
/// );
/// ```
pub fn backup_path(path: &Path, operation: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = format!("{file_name}.backup_{}", sanitize(operation));

    let first = path.with_file_name(&base);
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| path.with_file_name(format!("{base}.{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

fn sanitize(operation: &str) -> String {
    let cleaned: String = operation
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "patch".to_owned()
    } else {
        cleaned
    }
}

/// BLAKE3 hex digest of a document's text.
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("project.pbxproj")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn unchanged_save_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.pbxproj");
        fs::write(&path, "same").unwrap();

        let outcome = save(&path, "same", "same", "op").unwrap();
        assert_eq!(outcome, SaveOutcome::Unchanged);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn changed_save_writes_backup_then_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.pbxproj");
        fs::write(&path, "before").unwrap();

        let outcome = save(&path, "before", "after", "fix tests").unwrap();
        let SaveOutcome::Written { backup } = outcome else {
            panic!("expected a write");
        };
        assert_eq!(backup, dir.path().join("project.pbxproj.backup_fix_tests"));
        assert_eq!(fs::read_to_string(&backup).unwrap(), "before");
        assert_eq!(fs::read_to_string(&path).unwrap(), "after");
    }

    #[test]
    fn backups_are_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.pbxproj");
        fs::write(&path, "v1").unwrap();

        save(&path, "v1", "v2", "op").unwrap();
        let second = save(&path, "v2", "v3", "op").unwrap();

        let SaveOutcome::Written { backup } = second else {
            panic!("expected a write");
        };
        assert_eq!(backup, dir.path().join("project.pbxproj.backup_op.1"));
        assert_eq!(
            fs::read_to_string(dir.path().join("project.pbxproj.backup_op")).unwrap(),
            "v1"
        );
        assert_eq!(fs::read_to_string(&backup).unwrap(), "v2");
    }

    #[test]
    fn operation_names_are_sanitized() {
        assert_eq!(sanitize("remove target: Ext/1"), "remove_target__Ext_1");
        assert_eq!(sanitize(""), "patch");
    }

    #[test]
    fn hash_tracks_content() {
        assert_eq!(content_hash("a"), content_hash("a"));
        assert_ne!(content_hash("a"), content_hash("b"));
        assert_eq!(content_hash("a").len(), 64);
    }
}
