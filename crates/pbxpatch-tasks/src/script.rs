//! Patch run orchestration.
//!
//! A run follows one fixed pipeline:
//!
//! 1. [`load`] the manifest once.
//! 2. [`PatchTask::apply`] executes the task's steps against a single
//!    in-memory [`PatchRun`], so later steps observe earlier edits.
//! 3. If the text changed, [`save`] writes a backup and the new text.
//!
//! Each step runs on a scratch copy of the document that is committed only
//! when the step succeeds, so a step that fails halfway leaves no partial
//! edit behind. A failed run never reaches step 3: the manifest on disk is
//! either untouched or replaced once, in full.
//!
//! # Example
//!
//! ```
//! use pbxpatch_core::prelude::*;
//! use pbxpatch_tasks::script::{PatchRun, Progress};
//! use pbxpatch_tasks::step::StepOutcome;
//!
//! let doc = "G1 /* Group */ = { children = (A); };".to_owned();
//! let mut run = PatchRun::new(doc, IdGenerator::seeded(1));
//!
//! run.required("add B", |cx| {
//!     let entry = find_entry_by_label(cx.doc, "Group")?;
//!     let field = find_list_field(cx.doc, &entry, "children")?;
//!     let edit = insert_list_item(cx.doc, &field, "B")?;
//!     Ok(Progress::inserted(edit, "B"))
//! })
//! .unwrap();
//!
//! assert_eq!(run.document(), "G1 /* Group */ = { children = (A, B); };");
//! assert_eq!(run.log().records()[0].outcome, StepOutcome::Created);
//! ```

use std::path::{Path, PathBuf};

use pbxpatch_core::document::{content_hash, load, save, SaveOutcome};
use pbxpatch_core::guard::EditOutcome;
use pbxpatch_core::identifier::IdGenerator;
use pbxpatch_core::{PatchError, Result};
use serde::Serialize;

use crate::step::{StepLog, StepOutcome};

// ---------------------------------------------------------------------------
// PatchTask
// ---------------------------------------------------------------------------

/// One configured maintenance task.
pub trait PatchTask {
    /// Short task name for logs and reports (e.g. `"sync-folder"`).
    fn name(&self) -> &str;

    /// Name of the edit, used as the backup file suffix.
    fn operation(&self) -> &str;

    /// Run the task's steps against `run`.
    ///
    /// Returning an error aborts the run; nothing is saved.
    fn apply(&self, run: &mut PatchRun) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// What a step closure reports back: the outcome to log, a short detail,
/// and a value for later steps (typically a token).
#[derive(Debug, Clone)]
pub struct Progress<T> {
    pub outcome: StepOutcome,
    pub detail: String,
    pub value: T,
}

impl<T> Progress<T> {
    pub fn new(outcome: StepOutcome, detail: impl Into<String>, value: T) -> Self {
        Self {
            outcome,
            detail: detail.into(),
            value,
        }
    }

    /// An existing entry was located.
    pub fn found(detail: impl Into<String>, value: T) -> Self {
        Self::new(StepOutcome::Found, detail, value)
    }

    /// Something new was added.
    pub fn created(detail: impl Into<String>, value: T) -> Self {
        Self::new(StepOutcome::Created, detail, value)
    }
}

impl Progress<()> {
    /// Map an insertion's [`EditOutcome`] to a step outcome.
    pub fn inserted(edit: EditOutcome, detail: impl Into<String>) -> Self {
        let outcome = match edit {
            EditOutcome::Applied => StepOutcome::Created,
            EditOutcome::AlreadyPresent => StepOutcome::AlreadyPresent,
            EditOutcome::Absent => StepOutcome::Skipped,
        };
        Self::new(outcome, detail, ())
    }

    /// Map a removal's [`EditOutcome`] to a step outcome.
    pub fn removed(edit: EditOutcome, detail: impl Into<String>) -> Self {
        let outcome = match edit {
            EditOutcome::Applied => StepOutcome::Removed,
            EditOutcome::AlreadyPresent | EditOutcome::Absent => StepOutcome::Skipped,
        };
        Self::new(outcome, detail, ())
    }
}

// ---------------------------------------------------------------------------
// PatchRun
// ---------------------------------------------------------------------------

/// What a step closure may touch.
pub struct StepContext<'a> {
    /// The scratch document for this step.
    pub doc: &'a mut String,
    /// Source of fresh tokens.
    pub ids: &'a mut IdGenerator,
}

/// Whether a step's absence-of-target aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Necessity {
    Required,
    Optional,
}

/// In-memory state of one task run.
pub struct PatchRun {
    original: String,
    doc: String,
    ids: IdGenerator,
    log: StepLog,
}

impl PatchRun {
    pub fn new(original: String, ids: IdGenerator) -> Self {
        Self {
            doc: original.clone(),
            original,
            ids,
            log: StepLog::new(),
        }
    }

    /// The document as edited so far.
    pub fn document(&self) -> &str {
        &self.doc
    }

    /// The document as loaded.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn is_changed(&self) -> bool {
        self.doc != self.original
    }

    pub fn log(&self) -> &StepLog {
        &self.log
    }

    /// Run a step whose target must exist.
    ///
    /// # Errors
    ///
    /// A [`PatchError::NotFound`] from the step is logged as
    /// [`StepOutcome::Failed`] and turned into [`PatchError::Aborted`]. Any
    /// other error is logged as [`StepOutcome::Error`] and returned
    /// unchanged.
    pub fn required<T>(
        &mut self,
        name: &str,
        step: impl FnOnce(&mut StepContext<'_>) -> Result<Progress<T>>,
    ) -> Result<T> {
        match self.run_step(name, Necessity::Required, step)? {
            Some(value) => Ok(value),
            None => Err(PatchError::Aborted {
                step: name.to_owned(),
            }),
        }
    }

    /// Run a step that is skipped when its target is missing.
    ///
    /// # Errors
    ///
    /// Only fatal errors ([`PatchError::MalformedDocument`], I/O) are
    /// returned; [`PatchError::NotFound`] becomes `Ok(None)`.
    pub fn optional<T>(
        &mut self,
        name: &str,
        step: impl FnOnce(&mut StepContext<'_>) -> Result<Progress<T>>,
    ) -> Result<Option<T>> {
        self.run_step(name, Necessity::Optional, step)
    }

    /// Record a step outcome that needs no document access.
    pub fn note(&mut self, name: &str, outcome: StepOutcome, detail: impl Into<String>) {
        self.log.push(name, outcome, detail);
    }

    fn run_step<T>(
        &mut self,
        name: &str,
        necessity: Necessity,
        step: impl FnOnce(&mut StepContext<'_>) -> Result<Progress<T>>,
    ) -> Result<Option<T>> {
        let mut scratch = self.doc.clone();
        let result = {
            let mut cx = StepContext {
                doc: &mut scratch,
                ids: &mut self.ids,
            };
            step(&mut cx)
        };

        match result {
            Ok(progress) => {
                self.doc = scratch;
                self.log.push(name, progress.outcome, progress.detail);
                Ok(Some(progress.value))
            }
            Err(e) if e.is_not_found() => {
                let outcome = match necessity {
                    Necessity::Required => StepOutcome::Failed,
                    Necessity::Optional => StepOutcome::Skipped,
                };
                self.log.push(name, outcome, e.to_string());
                Ok(None)
            }
            Err(e) => {
                self.log.push(name, StepOutcome::Error, e.to_string());
                Err(e)
            }
        }
    }

    /// Split into `(original, edited, log)`.
    pub fn into_parts(self) -> (String, String, StepLog) {
        (self.original, self.doc, self.log)
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Knobs for [`execute`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run every step but never write to disk.
    pub dry_run: bool,
    /// Seed for generated tokens; `None` seeds from OS randomness.
    pub seed: Option<u64>,
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// At least one edit was made (and saved, unless dry-run).
    Applied,
    /// Every step found its target state already in place.
    AlreadyCorrect,
    /// A required step could not locate its target; nothing was written.
    Aborted,
    /// The manifest was missing, malformed or unwritable.
    Failed,
}

impl RunStatus {
    /// Process exit code: `0` for success or already correct, non-zero
    /// otherwise.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Applied | RunStatus::AlreadyCorrect => 0,
            RunStatus::Aborted => 1,
            RunStatus::Failed => 2,
        }
    }
}

/// Everything a run produced, for console or JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub task: String,
    pub operation: String,
    pub path: PathBuf,
    pub status: RunStatus,
    pub steps: StepLog,
    /// `None` when the run never reached the save stage.
    pub saved: Option<SaveOutcome>,
    /// BLAKE3 of the manifest as loaded.
    pub before_hash: Option<String>,
    /// BLAKE3 of the manifest after all edits.
    pub after_hash: Option<String>,
    /// The error that stopped the run, if any.
    pub error: Option<String>,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

/// Load the manifest at `path`, apply `task`, and save if anything changed.
///
/// Never panics on a bad manifest: failures are reported through
/// [`RunReport::status`] and [`RunReport::error`].
pub fn execute(path: &Path, task: &dyn PatchTask, options: &RunOptions) -> RunReport {
    let mut report = RunReport {
        task: task.name().to_owned(),
        operation: task.operation().to_owned(),
        path: path.to_path_buf(),
        status: RunStatus::Failed,
        steps: StepLog::new(),
        saved: None,
        before_hash: None,
        after_hash: None,
        error: None,
    };

    let span = tracing::info_span!("patch", task = task.name(), path = %path.display());
    let _guard = span.enter();

    let original = match load(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "could not load manifest");
            report.error = Some(e.to_string());
            return report;
        }
    };
    report.before_hash = Some(content_hash(&original));

    let ids = options.seed.map_or_else(IdGenerator::new, IdGenerator::seeded);
    let mut run = PatchRun::new(original, ids);
    let applied = task.apply(&mut run);

    let (original, updated, log) = run.into_parts();
    report.steps = log;

    if let Err(e) = applied {
        report.status = match e {
            PatchError::Aborted { .. } => RunStatus::Aborted,
            _ => RunStatus::Failed,
        };
        tracing::error!(error = %e, "run stopped, manifest left untouched");
        report.error = Some(e.to_string());
        return report;
    }
    report.after_hash = Some(content_hash(&updated));

    let changed = updated != original;
    if options.dry_run {
        report.saved = Some(if changed {
            SaveOutcome::DryRun
        } else {
            SaveOutcome::Unchanged
        });
    } else {
        match save(path, &original, &updated, task.operation()) {
            Ok(outcome) => report.saved = Some(outcome),
            Err(e) => {
                tracing::error!(error = %e, "could not save manifest");
                report.error = Some(e.to_string());
                return report;
            }
        }
    }

    report.status = if changed {
        RunStatus::Applied
    } else {
        RunStatus::AlreadyCorrect
    };
    tracing::info!(status = ?report.status, "run finished");
    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
