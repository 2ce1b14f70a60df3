//! `remove-target` and `remove-package`: detach objects from every list
//! that mentions them, then delete their definitions.
//!
//! Both tasks discover the satellite objects that only exist for the thing
//! being removed (a target's build phases, a package's build files, ...) so
//! a configuration only has to name the root token. Every step is optional:
//! running a removal twice finds nothing the second time and writes nothing.

use pbxpatch_core::guard::token_in_use;
use pbxpatch_core::locate::{find_entry_by_token, find_list_field, Entry};
use pbxpatch_core::{PatchError, Result};
use serde::{Deserialize, Serialize};

use super::{display_name, entries_of_isa, has_isa, isa, purge};
use crate::script::{PatchRun, PatchTask, Progress, StepContext};
use crate::step::StepOutcome;

/// One object scheduled for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Doomed {
    token: String,
    what: String,
}

impl Doomed {
    fn new(token: impl Into<String>, kind: &str, name: &str) -> Self {
        Self {
            token: token.into(),
            what: format!("{kind} {name}"),
        }
    }

    fn from_entry(entry: &Entry, kind: &str) -> Self {
        Self::new(entry.token.clone(), kind, &display_name(entry))
    }
}

fn push_unique(list: &mut Vec<Doomed>, doomed: Doomed) {
    if !list.iter().any(|d| d.token == doomed.token) {
        list.push(doomed);
    }
}

/// Look up `token`, treating absence as `None`.
fn lookup(doc: &str, token: &str) -> Result<Option<Entry>> {
    match find_entry_by_token(doc, token) {
        Ok(entry) => Ok(Some(entry)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Values of the list field `field` of `entry`, or nothing if it has none.
fn list_values(doc: &str, entry: &Entry, field: &str) -> Result<Vec<String>> {
    match find_list_field(doc, entry, field) {
        Ok(list) => Ok(list.values().map(str::to_owned).collect()),
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Delete every scheduled object, satellites first, then report tokens that
/// are still mentioned somewhere (typically as a scalar value in an entry
/// the task did not know about).
fn purge_all(run: &mut PatchRun, doomed: &[Doomed]) -> Result<()> {
    for d in doomed {
        purge(run, &d.token, &d.what)?;
    }
    let leftovers: Vec<&str> = doomed
        .iter()
        .filter(|d| token_in_use(run.document(), &d.token))
        .map(|d| d.token.as_str())
        .collect();
    if !leftovers.is_empty() {
        tracing::warn!(tokens = ?leftovers, "removed tokens are still referenced");
        run.note(
            "check leftover references",
            StepOutcome::Skipped,
            format!("still referenced: {}", leftovers.join(", ")),
        );
    }
    Ok(())
}

fn describe(doomed: &[Doomed]) -> String {
    match doomed.len() {
        0 => "nothing".to_owned(),
        1 => "1 object".to_owned(),
        n => format!("{n} objects"),
    }
}

// ---------------------------------------------------------------------------
// RemoveTarget
// ---------------------------------------------------------------------------

/// Remove a native target and everything that exists only for it: its
/// product, build phases and their build files, configuration list,
/// folder exception sets, and the dependencies other targets hold on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoveTarget {
    /// Token of the target to remove.
    pub target: String,
    /// Extra tokens to remove with it, such as a folder only this target
    /// used.
    #[serde(default)]
    pub related: Vec<String>,
}

impl RemoveTarget {
    fn collect(&self, cx: &mut StepContext<'_>) -> Result<Vec<Doomed>> {
        let doc: &str = cx.doc;
        let mut doomed = Vec::new();

        if let Some(target) = lookup(doc, &self.target)? {
            if let Some(product) = target.scalar(doc, "productReference")? {
                push_unique(&mut doomed, Doomed::new(product.clone(), "product", &product));
                // Copies of the product embedded into a host target.
                for entry in entries_of_isa(doc, isa::BUILD_FILE)? {
                    if entry.scalar(doc, "fileRef")?.as_deref() == Some(product.as_str()) {
                        push_unique(&mut doomed, Doomed::from_entry(&entry, "build file"));
                    }
                }
            }
            for phase in list_values(doc, &target, "buildPhases")? {
                if let Some(phase_entry) = lookup(doc, &phase)? {
                    for file in list_values(doc, &phase_entry, "files")? {
                        push_unique(&mut doomed, Doomed::new(file.clone(), "build file", &file));
                    }
                    push_unique(&mut doomed, Doomed::from_entry(&phase_entry, "build phase"));
                }
            }
            if let Some(list) = target.scalar(doc, "buildConfigurationList")? {
                if let Some(list_entry) = lookup(doc, &list)? {
                    if has_isa(doc, &list_entry, isa::CONFIGURATION_LIST)? {
                        for config in list_values(doc, &list_entry, "buildConfigurations")? {
                            let doomed_config =
                                Doomed::new(config.clone(), "build configuration", &config);
                            push_unique(&mut doomed, doomed_config);
                        }
                        let doomed_list = Doomed::from_entry(&list_entry, "configuration list");
                        push_unique(&mut doomed, doomed_list);
                    }
                }
            }
        }

        for entry in entries_of_isa(doc, isa::SYNCHRONIZED_EXCEPTION_SET)? {
            if entry.scalar(doc, "target")?.as_deref() == Some(self.target.as_str()) {
                push_unique(&mut doomed, Doomed::from_entry(&entry, "exception set"));
            }
        }
        for entry in entries_of_isa(doc, isa::TARGET_DEPENDENCY)? {
            if entry.scalar(doc, "target")?.as_deref() == Some(self.target.as_str()) {
                if let Some(proxy) = entry.scalar(doc, "targetProxy")? {
                    push_unique(&mut doomed, Doomed::new(proxy.clone(), "container proxy", &proxy));
                }
                push_unique(&mut doomed, Doomed::from_entry(&entry, "target dependency"));
            }
        }
        for entry in entries_of_isa(doc, isa::CONTAINER_ITEM_PROXY)? {
            if entry.scalar(doc, "remoteGlobalIDString")?.as_deref() == Some(self.target.as_str()) {
                push_unique(&mut doomed, Doomed::from_entry(&entry, "container proxy"));
            }
        }
        for token in &self.related {
            let what = match lookup(doc, token)? {
                Some(entry) => display_name(&entry),
                None => token.clone(),
            };
            push_unique(&mut doomed, Doomed::new(token.clone(), "related", &what));
        }
        Ok(doomed)
    }
}

impl PatchTask for RemoveTarget {
    fn name(&self) -> &str {
        "remove-target"
    }

    fn operation(&self) -> &str {
        "remove_target"
    }

    fn apply(&self, run: &mut PatchRun) -> Result<()> {
        let name = run
            .optional("locate target", |cx| {
                let entry = find_entry_by_token(cx.doc, &self.target)?;
                let name = display_name(&entry);
                Ok(Progress::found(name.clone(), name))
            })?
            .unwrap_or_else(|| self.target.clone());

        let doomed = run
            .optional("collect satellites", |cx| {
                let doomed = self.collect(cx)?;
                let outcome = if doomed.is_empty() {
                    StepOutcome::Skipped
                } else {
                    StepOutcome::Found
                };
                Ok(Progress::new(outcome, describe(&doomed), doomed))
            })?
            .unwrap_or_default();

        let mut all = doomed;
        all.push(Doomed::new(self.target.clone(), "target", &name));
        purge_all(run, &all)
    }
}

// ---------------------------------------------------------------------------
// RemovePackage
// ---------------------------------------------------------------------------

/// Remove a Swift package reference with its product dependencies and the
/// build files that link those products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemovePackage {
    /// Token of the `XCRemoteSwiftPackageReference` (or local reference).
    pub package: String,
}

impl RemovePackage {
    fn collect(&self, doc: &str) -> Result<Vec<Doomed>> {
        let mut products = Vec::new();
        for entry in entries_of_isa(doc, isa::PACKAGE_PRODUCT_DEPENDENCY)? {
            if entry.scalar(doc, "package")?.as_deref() == Some(self.package.as_str()) {
                products.push(entry);
            }
        }

        let mut doomed = Vec::new();
        for entry in entries_of_isa(doc, isa::BUILD_FILE)? {
            let product_ref = entry.scalar(doc, "productRef")?;
            if products.iter().any(|p| Some(p.token.as_str()) == product_ref.as_deref()) {
                push_unique(&mut doomed, Doomed::from_entry(&entry, "build file"));
            }
        }
        for product in &products {
            push_unique(&mut doomed, Doomed::from_entry(product, "product dependency"));
        }
        Ok(doomed)
    }
}

impl PatchTask for RemovePackage {
    fn name(&self) -> &str {
        "remove-package"
    }

    fn operation(&self) -> &str {
        "remove_package"
    }

    fn apply(&self, run: &mut PatchRun) -> Result<()> {
        let name = run
            .optional("locate package reference", |cx| {
                let entry = find_entry_by_token(cx.doc, &self.package)?;
                let name = display_name(&entry);
                Ok(Progress::found(name.clone(), name))
            })?
            .unwrap_or_else(|| self.package.clone());

        let doomed = run
            .optional("collect products", |cx| {
                let doomed = self.collect(cx.doc)?;
                if doomed.is_empty() && !token_in_use(cx.doc, &self.package) {
                    return Err(PatchError::not_found(format!("package {}", self.package)));
                }
                let outcome = if doomed.is_empty() {
                    StepOutcome::Skipped
                } else {
                    StepOutcome::Found
                };
                Ok(Progress::new(outcome, describe(&doomed), doomed))
            })?
            .unwrap_or_default();

        let mut all = doomed;
        all.push(Doomed::new(self.package.clone(), "package", &name));
        purge_all(run, &all)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
