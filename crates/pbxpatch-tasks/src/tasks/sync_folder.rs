//! `sync-folder`: attach an on-disk folder to a target as a synchronized
//! root group.

use pbxpatch_core::locate::find_entry_by_token;
use pbxpatch_core::Result;
use serde::{Deserialize, Serialize};

use super::{
    display_name, ensure_listed, find_labelled_with_isa, insert_into_section, isa,
    quote_if_needed, reference,
};
use crate::script::{PatchRun, PatchTask, Progress};

/// Make sure a folder is a `PBXFileSystemSynchronizedRootGroup`, shown in the
/// project navigator and compiled by `target`.
///
/// Steps, in order:
///
/// 1. locate the target (required);
/// 2. locate the main group (required);
/// 3. find the folder's group by label, or create it;
/// 4. list the group in the main group's `children`;
/// 5. list the group in the target's `fileSystemSynchronizedGroups`,
///    creating that field before `name` when the target has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncFolder {
    /// Folder name; the group is labelled with it.
    pub folder: String,
    /// Path relative to the project; defaults to `folder`.
    #[serde(default)]
    pub path: Option<String>,
    /// Token of the target that should compile the folder.
    pub target: String,
    /// Token of the project's main group.
    pub main_group: String,
}

impl SyncFolder {
    fn group_text(&self, token: &str) -> String {
        let path = self.path.as_deref().unwrap_or(&self.folder);
        format!(
            "\t\t{} = {{\n\
             \t\t\tisa = {};\n\
             \t\t\tpath = {};\n\
             \t\t\tsourceTree = \"<group>\";\n\
             \t\t}};",
            reference(token, &self.folder),
            isa::SYNCHRONIZED_ROOT_GROUP,
            quote_if_needed(path),
        )
    }
}

impl PatchTask for SyncFolder {
    fn name(&self) -> &str {
        "sync-folder"
    }

    fn operation(&self) -> &str {
        "sync_folder"
    }

    fn apply(&self, run: &mut PatchRun) -> Result<()> {
        run.required("locate target", |cx| {
            let entry = find_entry_by_token(cx.doc, &self.target)?;
            Ok(Progress::found(display_name(&entry), ()))
        })?;
        run.required("locate main group", |cx| {
            let entry = find_entry_by_token(cx.doc, &self.main_group)?;
            Ok(Progress::found(entry.token, ()))
        })?;

        let group = run.required("folder group", |cx| {
            match find_labelled_with_isa(cx.doc, &self.folder, isa::SYNCHRONIZED_ROOT_GROUP) {
                Ok(entry) => Ok(Progress::found(entry.token.clone(), entry.token)),
                Err(e) if e.is_not_found() => {
                    let token = cx.ids.generate_unique(cx.doc).into_string();
                    let text = self.group_text(&token);
                    insert_into_section(cx.doc, isa::SYNCHRONIZED_ROOT_GROUP, &text)?;
                    Ok(Progress::created(token.clone(), token))
                }
                Err(e) => Err(e),
            }
        })?;
        let item = reference(&group, &self.folder);

        run.required("add to main group children", |cx| {
            let edit = ensure_listed(cx.doc, &self.main_group, "children", None, &item)?;
            Ok(Progress::inserted(edit, &group))
        })?;
        run.required("add to target fileSystemSynchronizedGroups", |cx| {
            let edit = ensure_listed(
                cx.doc,
                &self.target,
                "fileSystemSynchronizedGroups",
                Some("name"),
                &item,
            )?;
            Ok(Progress::inserted(edit, &group))
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
