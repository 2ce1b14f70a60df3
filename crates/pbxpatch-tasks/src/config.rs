//! JSON task configuration.
//!
//! A configuration names the manifest and exactly one task:
//!
//! ```json
//! {
//!   "project": "App.xcodeproj/project.pbxproj",
//!   "task": {
//!     "kind": "sync-folder",
//!     "folder": "AppTests",
//!     "target": "24FB38822EDF354C00BA1227",
//!     "main_group": "24FB38692EDF354B00BA1227"
//!   }
//! }
//! ```
//!
//! Every identifier and name a task needs comes from here; nothing is
//! hard-coded for a particular project.

use std::fs;
use std::path::{Path, PathBuf};

use pbxpatch_core::identifier::is_token;
use pbxpatch_core::{PatchError, Result};
use serde::{Deserialize, Serialize};

use crate::script::PatchTask;
use crate::tasks::{LinkPackageProduct, RemovePackage, RemoveTarget, SyncFolder, TargetMembership};

/// One task, selected by its `"kind"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TaskConfig {
    SyncFolder(SyncFolder),
    TargetMembership(TargetMembership),
    LinkPackageProduct(LinkPackageProduct),
    RemoveTarget(RemoveTarget),
    RemovePackage(RemovePackage),
}

impl TaskConfig {
    /// The configured task, ready to hand to [`crate::script::execute`].
    pub fn as_task(&self) -> &dyn PatchTask {
        match self {
            TaskConfig::SyncFolder(t) => t,
            TaskConfig::TargetMembership(t) => t,
            TaskConfig::LinkPackageProduct(t) => t,
            TaskConfig::RemoveTarget(t) => t,
            TaskConfig::RemovePackage(t) => t,
        }
    }

    /// Check tokens are well formed and names are non-empty.
    pub fn validate(&self) -> Result<()> {
        match self {
            TaskConfig::SyncFolder(t) => {
                check_name("folder", &t.folder)?;
                if let Some(path) = &t.path {
                    check_name("path", path)?;
                }
                check_token("target", &t.target)?;
                check_token("main_group", &t.main_group)
            }
            TaskConfig::TargetMembership(t) => {
                check_token("folder", &t.folder)?;
                check_name("folder_name", &t.folder_name)?;
                check_token("target", &t.target)?;
                check_name("target_name", &t.target_name)?;
                t.membership_exceptions
                    .iter()
                    .try_for_each(|f| check_name("membership_exceptions", f))
            }
            TaskConfig::LinkPackageProduct(t) => {
                check_token("frameworks_phase", &t.frameworks_phase)?;
                check_name("product", &t.product)?;
                if let Some(package) = &t.package {
                    check_token("package", package)?;
                }
                if let Some(target) = &t.target {
                    check_token("target", target)?;
                }
                Ok(())
            }
            TaskConfig::RemoveTarget(t) => {
                check_token("target", &t.target)?;
                t.related.iter().try_for_each(|r| check_token("related", r))
            }
            TaskConfig::RemovePackage(t) => check_token("package", &t.package),
        }
    }
}

fn check_token(field: &str, value: &str) -> Result<()> {
    if is_token(value) {
        Ok(())
    } else {
        Err(PatchError::Config(format!(
            "'{field}' must be an object identifier (letters and digits), got {value:?}"
        )))
    }
}

fn check_name(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(PatchError::Config(format!("'{field}' must not be empty")))
    } else if value.contains("*/") {
        Err(PatchError::Config(format!("'{field}' must not contain '*/'")))
    } else {
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchConfig {
    /// Path to `project.pbxproj`. Relative paths are resolved against the
    /// configuration file's directory by [`PatchConfig::load`].
    pub project: PathBuf,
    pub task: TaskConfig,
}

impl PatchConfig {
    /// Parse a configuration from JSON text and validate it.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: PatchConfig =
            serde_json::from_str(text).map_err(|e| PatchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| PatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json(&text)
            .map_err(|e| PatchError::Config(format!("{}: {e}", path.display())))?;
        if config.project.is_relative() {
            if let Some(dir) = path.parent() {
                config.project = dir.join(&config.project);
            }
        }
        tracing::debug!(
            config = %path.display(),
            project = %config.project.display(),
            task = config.task.as_task().name(),
            "loaded configuration"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.project.as_os_str().is_empty() {
            return Err(PatchError::Config("'project' must not be empty".into()));
        }
        self.task.validate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
