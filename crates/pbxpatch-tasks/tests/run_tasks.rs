//! End-to-end runs of every task against an on-disk manifest.

use std::fs;
use std::path::{Path, PathBuf};

use pbxpatch_core::prelude::*;
use pbxpatch_tasks::prelude::*;
use tempfile::TempDir;

const FIXTURE: &str = include_str!("fixtures/project.pbxproj");

const MAIN_GROUP: &str = "24FB38692EDF354B00BA1227";
const APP_FOLDER: &str = "24FB38742EDF354B00BA1227";
const APP_TARGET: &str = "24FB38712EDF354B00BA1227";
const TEST_TARGET: &str = "24FB38822EDF354C00BA1227";
const TEST_FRAMEWORKS: &str = "24FB38802EDF354C00BA1227";
const MESSAGES_TARGET: &str = "24807B7C2EEB52F1008E3E1E";
const OLD_EXTENSION: &str = "245C556C2EE4B61400270A37";
const OLD_EXTENSION_FOLDER: &str = "245C556F2EE4B61400270A37";
const REDUCTIO_PACKAGE: &str = "24D2EBBA2EE304A9004257B4";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn project_with(text: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.pbxproj");
    fs::write(&path, text).unwrap();
    (dir, path)
}

fn project() -> (TempDir, PathBuf) {
    project_with(FIXTURE)
}

fn files_in(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

fn seeded(seed: u64) -> RunOptions {
    RunOptions {
        dry_run: false,
        seed: Some(seed),
    }
}

fn sync_tests_folder() -> SyncFolder {
    SyncFolder {
        folder: "Khandoba Secure DocsTests".into(),
        path: None,
        target: TEST_TARGET.into(),
        main_group: MAIN_GROUP.into(),
    }
}

fn link_testing() -> LinkPackageProduct {
    LinkPackageProduct {
        frameworks_phase: TEST_FRAMEWORKS.into(),
        product: "Testing".into(),
        package: None,
        target: Some(TEST_TARGET.into()),
        weak: true,
    }
}

fn list_values(doc: &str, token: &str, field: &str) -> Vec<String> {
    let entry = find_entry_by_token(doc, token).unwrap();
    find_list_field(doc, &entry, field)
        .unwrap()
        .values()
        .map(str::to_owned)
        .collect()
}

// ---------------------------------------------------------------------------
// 1. Idempotence and backups
// ---------------------------------------------------------------------------

#[test]
fn first_run_applies_and_backs_up_original() {
    let (dir, path) = project();
    let report = execute(&path, &sync_tests_folder(), &seeded(1));

    assert_eq!(report.status, RunStatus::Applied);
    assert_eq!(report.exit_code(), 0);
    let Some(SaveOutcome::Written { backup }) = &report.saved else {
        panic!("expected a write, got {:?}", report.saved);
    };
    assert_eq!(backup, &dir.path().join("project.pbxproj.backup_sync_folder"));
    assert_eq!(fs::read_to_string(backup).unwrap(), FIXTURE);
    assert_eq!(report.before_hash.as_deref(), Some(content_hash(FIXTURE).as_str()));

    let doc = fs::read_to_string(&path).unwrap();
    assert_ne!(doc, FIXTURE);
    assert_eq!(report.after_hash.as_deref(), Some(content_hash(&doc).as_str()));
}

#[test]
fn second_run_writes_nothing() {
    let (dir, path) = project();
    execute(&path, &sync_tests_folder(), &seeded(1));
    let after_first = fs::read_to_string(&path).unwrap();
    let files_after_first = files_in(dir.path());

    let report = execute(&path, &sync_tests_folder(), &seeded(2));
    assert_eq!(report.status, RunStatus::AlreadyCorrect);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.saved, Some(SaveOutcome::Unchanged));
    assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
    assert_eq!(files_in(dir.path()), files_after_first);
    assert_eq!(report.before_hash, report.after_hash);
}

#[test]
fn every_task_is_idempotent() {
    let tasks: Vec<Box<dyn PatchTask>> = vec![
        Box::new(sync_tests_folder()),
        Box::new(link_testing()),
        Box::new(TargetMembership {
            folder: APP_FOLDER.into(),
            folder_name: "Khandoba Secure Docs".into(),
            target: MESSAGES_TARGET.into(),
            target_name: "KhandobaSecureDocsMessageApp MessagesExtension".into(),
            membership_exceptions: vec!["Info.plist".into()],
        }),
        Box::new(RemoveTarget {
            target: OLD_EXTENSION.into(),
            related: vec![OLD_EXTENSION_FOLDER.into()],
        }),
        Box::new(RemovePackage {
            package: REDUCTIO_PACKAGE.into(),
        }),
    ];

    for task in &tasks {
        let (_dir, path) = project();
        let first = execute(&path, task.as_ref(), &seeded(11));
        assert_eq!(first.status, RunStatus::Applied, "{}: {:?}", task.name(), first.error);
        let patched = fs::read_to_string(&path).unwrap();

        let second = execute(&path, task.as_ref(), &seeded(12));
        assert_eq!(second.status, RunStatus::AlreadyCorrect, "{}", task.name());
        assert_eq!(fs::read_to_string(&path).unwrap(), patched, "{}", task.name());
    }
}

#[test]
fn backups_accumulate_across_distinct_edits() {
    let (dir, path) = project();
    execute(&path, &sync_tests_folder(), &seeded(1));
    let after_sync = fs::read_to_string(&path).unwrap();

    // A different folder, same operation name.
    let mut ui = sync_tests_folder();
    ui.folder = "Khandoba Secure DocsUITests".into();
    let report = execute(&path, &ui, &seeded(1));
    let Some(SaveOutcome::Written { backup }) = report.saved else {
        panic!("expected a write");
    };
    assert_eq!(backup, dir.path().join("project.pbxproj.backup_sync_folder.1"));
    assert_eq!(fs::read_to_string(&backup).unwrap(), after_sync);
    assert_eq!(
        fs::read_to_string(dir.path().join("project.pbxproj.backup_sync_folder")).unwrap(),
        FIXTURE
    );
}

// ---------------------------------------------------------------------------
// 2. Failure modes
// ---------------------------------------------------------------------------

#[test]
fn missing_frameworks_phase_aborts_without_writing() {
    let broken = FIXTURE.replace(
        &format!("{TEST_FRAMEWORKS} /* Frameworks */ = {{"),
        "24FB38802EDF354C00BA9999 /* Frameworks */ = {",
    );
    let (dir, path) = project_with(&broken);

    let report = execute(&path, &link_testing(), &seeded(1));
    assert_eq!(report.status, RunStatus::Aborted);
    assert_ne!(report.exit_code(), 0);
    assert!(report.saved.is_none());
    assert!(report.error.as_deref().unwrap().contains("locate Frameworks phase"));
    assert_eq!(report.steps.records().last().unwrap().outcome, StepOutcome::Failed);

    assert_eq!(fs::read_to_string(&path).unwrap(), broken);
    assert_eq!(files_in(dir.path()), 1);
}

#[test]
fn missing_manifest_is_a_fatal_error() {
    let dir = tempfile::tempdir().unwrap();
    let report = execute(&dir.path().join("project.pbxproj"), &sync_tests_folder(), &seeded(1));
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.exit_code(), 2);
    assert!(report.steps.is_empty());
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn malformed_manifest_fails_without_writing() {
    // Truncate inside the target section so the test target never closes.
    let cut = FIXTURE.find("/* End PBXNativeTarget section */").unwrap();
    let truncated = &FIXTURE[..cut - 8];
    let (dir, path) = project_with(truncated);

    let report = execute(&path, &sync_tests_folder(), &seeded(1));
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.steps.records().last().unwrap().outcome, StepOutcome::Error);
    assert_eq!(fs::read_to_string(&path).unwrap(), truncated);
    assert_eq!(files_in(dir.path()), 1);
}

#[test]
fn dry_run_reports_without_touching_disk() {
    let (dir, path) = project();
    let options = RunOptions {
        dry_run: true,
        seed: Some(1),
    };
    let report = execute(&path, &sync_tests_folder(), &options);
    assert_eq!(report.status, RunStatus::Applied);
    assert_eq!(report.saved, Some(SaveOutcome::DryRun));
    assert_ne!(report.before_hash, report.after_hash);
    assert_eq!(fs::read_to_string(&path).unwrap(), FIXTURE);
    assert_eq!(files_in(dir.path()), 1);
}

// ---------------------------------------------------------------------------
// 3. Task results
// ---------------------------------------------------------------------------

#[test]
fn test_target_gets_folder_and_testing_framework() {
    let (_dir, path) = project();
    assert_eq!(execute(&path, &sync_tests_folder(), &seeded(3)).status, RunStatus::Applied);
    assert_eq!(execute(&path, &link_testing(), &seeded(4)).status, RunStatus::Applied);
    let doc = fs::read_to_string(&path).unwrap();

    let folder = find_entry_by_label(&doc, "Khandoba Secure DocsTests").unwrap();
    assert_eq!(
        folder.scalar(&doc, "isa").unwrap().as_deref(),
        Some("PBXFileSystemSynchronizedRootGroup")
    );
    assert_eq!(
        folder.scalar(&doc, "path").unwrap().as_deref(),
        Some("Khandoba Secure DocsTests")
    );
    assert_eq!(list_values(&doc, MAIN_GROUP, "children").last(), Some(&folder.token));
    assert_eq!(
        list_values(&doc, TEST_TARGET, "fileSystemSynchronizedGroups"),
        vec![folder.token.clone()]
    );

    let phase_files = list_values(&doc, TEST_FRAMEWORKS, "files");
    assert_eq!(phase_files.len(), 1);
    let build_file = find_entry_by_token(&doc, &phase_files[0]).unwrap();
    assert_eq!(build_file.label.as_deref(), Some("Testing in Frameworks"));
    let product = build_file.scalar(&doc, "productRef").unwrap().unwrap();
    let dependency = find_entry_by_token(&doc, &product).unwrap();
    assert_eq!(
        dependency.scalar(&doc, "isa").unwrap().as_deref(),
        Some("XCSwiftPackageProductDependency")
    );
    assert_eq!(
        list_values(&doc, TEST_TARGET, "packageProductDependencies"),
        vec![product]
    );
}

#[test]
fn extension_shares_app_folder() {
    let (_dir, path) = project();
    let task = TargetMembership {
        folder: APP_FOLDER.into(),
        folder_name: "Khandoba Secure Docs".into(),
        target: MESSAGES_TARGET.into(),
        target_name: "KhandobaSecureDocsMessageApp MessagesExtension".into(),
        membership_exceptions: vec!["Info.plist".into()],
    };
    let report = execute(&path, &task, &seeded(5));
    assert_eq!(report.status, RunStatus::Applied);
    let doc = fs::read_to_string(&path).unwrap();

    let set = find_entry_by_label(&doc, &task.exception_set_label()).unwrap();
    assert_eq!(set.scalar(&doc, "target").unwrap().as_deref(), Some(MESSAGES_TARGET));
    assert!(list_values(&doc, APP_FOLDER, "exceptions").contains(&set.token));
    assert_eq!(
        list_values(&doc, MESSAGES_TARGET, "fileSystemSynchronizedGroups"),
        vec!["24807B7F2EEB52F1008E3E1E".to_owned(), APP_FOLDER.to_owned()]
    );
}

#[test]
fn old_extension_target_is_removed_cleanly() {
    let (_dir, path) = project();
    let task = RemoveTarget {
        target: OLD_EXTENSION.into(),
        related: vec![OLD_EXTENSION_FOLDER.into()],
    };
    let report = execute(&path, &task, &seeded(0));
    assert_eq!(report.status, RunStatus::Applied);
    let doc = fs::read_to_string(&path).unwrap();

    for gone in [
        OLD_EXTENSION,
        OLD_EXTENSION_FOLDER,
        "245C556D2EE4B61400270A37", // appex
        "245C55A02EE4C0D700270A37", // exception set
        "245C557C2EE4B61400270A37", // embedded appex build file
        "245C557B2EE4B61400270A37", // dependency
        "245C557A2EE4B61400270A37", // proxy
        "245C55842EE4B61400270A37", // configuration list
        "245C55822EE4B61400270A37", // Debug
        "245C55692EE4B61400270A37", // Sources
    ] {
        assert!(!token_in_use(&doc, gone), "{gone} still referenced");
    }
    assert!(report.steps.iter().all(|s| s.name != "check leftover references"));

    // The app target and its own satellites are intact.
    assert!(find_entry_by_token(&doc, APP_TARGET).is_ok());
    assert!(find_entry_by_token(&doc, "245C55812EE4B61400270A37").is_ok());
    assert!(list_values(&doc, APP_TARGET, "dependencies").is_empty());
    assert_eq!(
        list_values(&doc, APP_FOLDER, "exceptions"),
        vec!["24FB38962EDF354C00BA1227".to_owned()]
    );
}

#[test]
fn package_is_removed_with_product_and_build_file() {
    let (_dir, path) = project();
    let report = execute(
        &path,
        &RemovePackage {
            package: REDUCTIO_PACKAGE.into(),
        },
        &seeded(0),
    );
    assert_eq!(report.status, RunStatus::Applied);
    let doc = fs::read_to_string(&path).unwrap();

    assert!(!doc.contains("Reductio"));
    assert!(list_values(&doc, APP_TARGET, "packageProductDependencies").is_empty());
    assert!(list_values(&doc, "24FB386F2EDF354B00BA1227", "files").is_empty());
}

// ---------------------------------------------------------------------------
// 4. Reports
// ---------------------------------------------------------------------------

#[test]
fn report_serializes_for_json_output() {
    let (_dir, path) = project();
    let report = execute(&path, &sync_tests_folder(), &seeded(1));
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["task"], "sync-folder");
    assert_eq!(json["status"], "applied");
    assert_eq!(json["saved"]["status"], "written");
    assert_eq!(json["steps"][0]["name"], "locate target");
    assert_eq!(json["steps"][0]["outcome"], "found");
}

#[test]
fn config_file_drives_a_run() {
    let (dir, path) = project();
    let config_path = dir.path().join("fix.json");
    fs::write(
        &config_path,
        format!(
            r#"{{
  "project": "project.pbxproj",
  "task": {{
    "kind": "remove-package",
    "package": "{REDUCTIO_PACKAGE}"
  }}
}}"#
        ),
    )
    .unwrap();

    let config = PatchConfig::load(&config_path).unwrap();
    assert_eq!(config.project, path);
    let report = execute(&config.project, config.task.as_task(), &seeded(0));
    assert_eq!(report.status, RunStatus::Applied);
    assert!(dir.path().join("project.pbxproj.backup_remove_package").exists());
}
