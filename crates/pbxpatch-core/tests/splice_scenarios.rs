//! End-to-end edit scenarios: load a manifest from disk, splice in memory,
//! save with a backup, and run the same edit again.

use std::fs;
use std::path::{Path, PathBuf};

use pbxpatch_core::prelude::*;

const TARGET: &str = "24807B7C2EEB52F1008E3E1E";

const MANIFEST: &str = "\
// !$*UTF8*$!
{
\tarchiveVersion = 1;
\tobjects = {

/* Begin PBXFileSystemSynchronizedRootGroup section */
\t\t24FB38742EDF354B00BA1227 /* App */ = {
\t\t\tisa = PBXFileSystemSynchronizedRootGroup;
\t\t\texceptions = (
\t\t\t\t24807B8F2EEB52F1008E3E1E /* Exceptions for \"App\" folder in \"{Ext}\" target */,
\t\t\t);
\t\t\tpath = App;
\t\t\tsourceTree = \"<group>\";
\t\t};
/* End PBXFileSystemSynchronizedRootGroup section */

/* Begin PBXNativeTarget section */
\t\t24807B7C2EEB52F1008E3E1E /* Ext */ = {
\t\t\tisa = PBXNativeTarget;
\t\t\tbuildPhases = (
\t\t\t\t24807B792EEB52F1008E3E1E /* Sources */,
\t\t\t);
\t\t\texceptions = (A, B);
\t\t\tname = Ext;
\t\t\tproductName = \"Ext { braces } (parens)\";
\t\t};
/* End PBXNativeTarget section */
\t};
\trootObject = 24FB386A2EDF354B00BA1227 /* Project object */;
}
";

fn write_manifest(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("project.pbxproj");
    fs::write(&path, text).unwrap();
    path
}

fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

/// Load, add `item` to the target's `exceptions`, save. The whole edit a
/// task step would make.
fn add_exception(path: &Path, item: &str) -> SaveOutcome {
    let original = load(path).unwrap();
    let mut doc = original.clone();
    let target = find_entry_by_token(&doc, TARGET).unwrap();
    let list = find_list_field(&doc, &target, "exceptions").unwrap();
    insert_list_item(&mut doc, &list, item).unwrap();
    save(path, &original, &doc, "add exception").unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn appends_to_inline_list_with_one_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(dir.path(), MANIFEST);

    let first = add_exception(&path, "C");
    let SaveOutcome::Written { backup } = first else {
        panic!("expected a write, got {first:?}");
    };
    let updated = fs::read_to_string(&path).unwrap();
    assert!(updated.contains("\t\t\texceptions = (A, B, C);\n"));
    assert_eq!(fs::read_to_string(&backup).unwrap(), MANIFEST);
    assert_eq!(file_count(dir.path()), 2);

    let second = add_exception(&path, "C");
    assert_eq!(second, SaveOutcome::Unchanged);
    assert_eq!(fs::read_to_string(&path).unwrap(), updated);
    assert_eq!(file_count(dir.path()), 2);
}

#[test]
fn only_the_edited_bytes_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(dir.path(), MANIFEST);

    add_exception(&path, "C");
    let updated = fs::read_to_string(&path).unwrap();
    assert_eq!(updated, MANIFEST.replace("(A, B);", "(A, B, C);"));
}

#[test]
fn scan_skips_braces_in_labels_and_strings() {
    let folder = find_entry_by_label(MANIFEST, "App").unwrap();
    let text = folder.span.slice(MANIFEST);
    assert!(text.starts_with("24FB38742EDF354B00BA1227 /* App */ = {"));
    assert!(text.ends_with("sourceTree = \"<group>\";\n\t\t}"));

    let target = find_entry_by_label(MANIFEST, "Ext").unwrap();
    assert_eq!(target.token, TARGET);
    assert!(target
        .span
        .slice(MANIFEST)
        .ends_with("productName = \"Ext { braces } (parens)\";\n\t\t}"));
    assert_eq!(
        target.scalar(MANIFEST, "productName").unwrap().as_deref(),
        Some("Ext { braces } (parens)")
    );
}

#[test]
fn removal_and_reinsertion_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(dir.path(), MANIFEST);

    let original = load(&path).unwrap();
    let mut doc = original.clone();
    let removed = remove_references(&mut doc, "24807B792EEB52F1008E3E1E").unwrap();
    assert_eq!(removed, 1);
    assert!(!token_in_use(&doc, "24807B792EEB52F1008E3E1E"));
    let outcome = save(&path, &original, &doc, "detach sources").unwrap();
    assert!(outcome.wrote());

    let original = load(&path).unwrap();
    let mut doc = original.clone();
    let target = find_entry_by_token(&doc, TARGET).unwrap();
    let phases = find_list_field(&doc, &target, "buildPhases").unwrap();
    assert!(phases.is_empty());
    insert_list_item(&mut doc, &phases, "24807B792EEB52F1008E3E1E /* Sources */").unwrap();
    save(&path, &original, &doc, "detach sources").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), MANIFEST);
    assert!(dir.path().join("project.pbxproj.backup_detach_sources").exists());
    assert!(dir.path().join("project.pbxproj.backup_detach_sources.1").exists());
}

#[test]
fn truncated_manifest_is_malformed_and_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let truncated = &MANIFEST[..MANIFEST.find("/* End PBXNativeTarget").unwrap() - 10];
    let path = write_manifest(dir.path(), truncated);

    let doc = load(&path).unwrap();
    let err = find_entry_by_token(&doc, TARGET).unwrap_err();
    assert!(matches!(err, PatchError::MalformedDocument { .. }), "{err}");
    assert_eq!(fs::read_to_string(&path).unwrap(), truncated);
    assert_eq!(file_count(dir.path()), 1);
}
