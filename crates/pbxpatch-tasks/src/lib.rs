//! pbxpatch tasks -- configured, idempotent maintenance edits for Xcode
//! project manifests, built on `pbxpatch_core`.
//!
//! A run loads one manifest, executes a task's ordered steps against the
//! in-memory text, and saves once (with a backup) only if something
//! changed. Running the same task again finds every edit in place and
//! writes nothing.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use pbxpatch_tasks::prelude::*;
//!
//! let config = PatchConfig::load(Path::new("fix-tests.json")).unwrap();
//! let report = execute(&config.project, config.task.as_task(), &RunOptions::default());
//! for step in &report.steps {
//!     println!("{step}");
//! }
//! std::process::exit(report.exit_code());
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod script;
pub mod step;
pub mod tasks;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::{PatchConfig, TaskConfig};
    pub use crate::script::{
        execute, PatchRun, PatchTask, Progress, RunOptions, RunReport, RunStatus, StepContext,
    };
    pub use crate::step::{StepLog, StepOutcome, StepRecord};
    pub use crate::tasks::{
        LinkPackageProduct, RemovePackage, RemoveTarget, SyncFolder, TargetMembership,
    };
}
