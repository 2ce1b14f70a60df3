//! `target-membership`: share a synchronized folder with another target.

use pbxpatch_core::guard::EditOutcome;
use pbxpatch_core::locate::find_entry_by_token;
use pbxpatch_core::Result;
use serde::{Deserialize, Serialize};

use super::{
    ensure_listed, find_labelled_with_isa, find_with_isa, insert_into_section, isa,
    quote_if_needed, reference,
};
use crate::script::{PatchRun, PatchTask, Progress};

fn default_exceptions() -> Vec<String> {
    vec!["Info.plist".to_owned()]
}

/// Add `folder` to `target` through a build-file exception set, the way
/// Xcode records a synchronized folder that is compiled by a second target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetMembership {
    /// Token of the folder's synchronized root group.
    pub folder: String,
    /// The folder's label.
    pub folder_name: String,
    /// Token of the target gaining membership.
    pub target: String,
    /// The target's label.
    pub target_name: String,
    /// Files in the folder the target must not compile.
    #[serde(default = "default_exceptions")]
    pub membership_exceptions: Vec<String>,
}

impl TargetMembership {
    /// Label of the exception set: `Exceptions for "<folder>" folder in
    /// "<target>" target`.
    pub fn exception_set_label(&self) -> String {
        format!(
            "Exceptions for \"{}\" folder in \"{}\" target",
            self.folder_name, self.target_name
        )
    }

    fn exception_set_text(&self, token: &str) -> String {
        let mut text = format!(
            "\t\t{} = {{\n\t\t\tisa = {};\n\t\t\tmembershipExceptions = (\n",
            reference(token, &self.exception_set_label()),
            isa::SYNCHRONIZED_EXCEPTION_SET,
        );
        for file in &self.membership_exceptions {
            text.push_str(&format!("\t\t\t\t{},\n", quote_if_needed(file)));
        }
        text.push_str(&format!(
            "\t\t\t);\n\t\t\ttarget = {};\n\t\t}};",
            reference(&self.target, &self.target_name)
        ));
        text
    }
}

impl PatchTask for TargetMembership {
    fn name(&self) -> &str {
        "target-membership"
    }

    fn operation(&self) -> &str {
        "target_membership"
    }

    fn apply(&self, run: &mut PatchRun) -> Result<()> {
        run.required("locate folder", |cx| {
            let entry = find_with_isa(cx.doc, &self.folder, isa::SYNCHRONIZED_ROOT_GROUP)?;
            Ok(Progress::found(entry.token, ()))
        })?;
        run.required("locate target", |cx| {
            let entry = find_entry_by_token(cx.doc, &self.target)?;
            Ok(Progress::found(entry.token, ()))
        })?;

        let label = self.exception_set_label();
        let set = run.required("exception set", |cx| {
            match find_labelled_with_isa(cx.doc, &label, isa::SYNCHRONIZED_EXCEPTION_SET) {
                Ok(entry) => Ok(Progress::found(entry.token.clone(), entry.token)),
                Err(e) if e.is_not_found() => {
                    let token = cx.ids.generate_unique(cx.doc).into_string();
                    insert_into_section(
                        cx.doc,
                        isa::SYNCHRONIZED_EXCEPTION_SET,
                        &self.exception_set_text(&token),
                    )?;
                    Ok(Progress::created(token.clone(), token))
                }
                Err(e) => Err(e),
            }
        })?;

        // An existing set may predate some of the configured exceptions.
        run.required("membership exceptions", |cx| {
            let mut added = Vec::new();
            for file in &self.membership_exceptions {
                let item = quote_if_needed(file);
                let edit =
                    ensure_listed(cx.doc, &set, "membershipExceptions", Some("target"), &item)?;
                if edit == EditOutcome::Applied {
                    added.push(file.as_str());
                }
            }
            let edit = if added.is_empty() {
                EditOutcome::AlreadyPresent
            } else {
                EditOutcome::Applied
            };
            Ok(Progress::inserted(edit, added.join(", ")))
        })?;

        run.required("add exception set to folder exceptions", |cx| {
            let item = reference(&set, &label);
            let edit = ensure_listed(cx.doc, &self.folder, "exceptions", Some("path"), &item)?;
            Ok(Progress::inserted(edit, &set))
        })?;
        run.required("add folder to target fileSystemSynchronizedGroups", |cx| {
            let item = reference(&self.folder, &self.folder_name);
            let edit = ensure_listed(
                cx.doc,
                &self.target,
                "fileSystemSynchronizedGroups",
                Some("name"),
                &item,
            )?;
            Ok(Progress::inserted(edit, &self.folder))
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
