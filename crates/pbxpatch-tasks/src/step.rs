//! The ordered step log every patch run produces.
//!
//! Each step of a task records one [`StepRecord`]: its name, what happened
//! ([`StepOutcome`]) and a short detail such as the token that was found or
//! created. The log is the human-readable progress signal printed by the CLI
//! and is serialized as part of the JSON run report.

use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// StepOutcome
// ---------------------------------------------------------------------------

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// A required entry already existed and was located.
    Found,
    /// New text was added: an entry, a field or a list item.
    Created,
    /// Text was removed.
    Removed,
    /// The target state already held; nothing changed.
    AlreadyPresent,
    /// An optional step had nothing to act on.
    Skipped,
    /// The step could not locate what it needed.
    Failed,
    /// The manifest could not be read, scanned or written; the run stops.
    Error,
}

impl StepOutcome {
    /// Short phrase used in console output.
    pub fn describe(self) -> &'static str {
        match self {
            StepOutcome::Found => "found existing",
            StepOutcome::Created => "created",
            StepOutcome::Removed => "removed",
            StepOutcome::AlreadyPresent => "skipped, already present",
            StepOutcome::Skipped => "skipped",
            StepOutcome::Failed => "failed to locate",
            StepOutcome::Error => "error",
        }
    }

    fn marker(self) -> char {
        match self {
            StepOutcome::Found | StepOutcome::AlreadyPresent => '=',
            StepOutcome::Created => '+',
            StepOutcome::Removed => '-',
            StepOutcome::Skipped => '~',
            StepOutcome::Failed => '!',
            StepOutcome::Error => 'x',
        }
    }

    /// Whether the step edited the document.
    pub fn changed(self) -> bool {
        matches!(self, StepOutcome::Created | StepOutcome::Removed)
    }
}

// ---------------------------------------------------------------------------
// StepRecord
// ---------------------------------------------------------------------------

/// One entry in the step log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub outcome: StepOutcome,
    pub detail: String,
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (marker, what) = (self.outcome.marker(), self.outcome.describe());
        write!(f, "[{marker}] {}: {what}", self.name)?;
        if !self.detail.is_empty() {
            write!(f, " ({})", self.detail)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StepLog
// ---------------------------------------------------------------------------

/// Ordered record of every step a run executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StepLog {
    records: Vec<StepRecord>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        name: impl Into<String>,
        outcome: StepOutcome,
        detail: impl Into<String>,
    ) {
        let record = StepRecord {
            name: name.into(),
            outcome,
            detail: detail.into(),
        };
        let (step, detail) = (&record.name, &record.detail);
        match outcome {
            StepOutcome::Error => tracing::error!(%step, %detail, "step hit a fatal error"),
            StepOutcome::Failed => tracing::warn!(%step, %detail, "step failed"),
            StepOutcome::Skipped => tracing::info!(%step, %detail, "step skipped"),
            _ => tracing::debug!(%step, ?outcome, %detail, "step done"),
        }
        self.records.push(record);
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of steps that edited the document.
    pub fn changes(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.changed()).count()
    }

    /// The first step that failed or hit an error, if any.
    pub fn first_failure(&self) -> Option<&StepRecord> {
        self.records
            .iter()
            .find(|r| matches!(r.outcome, StepOutcome::Failed | StepOutcome::Error))
    }

}

impl<'a> IntoIterator for &'a StepLog {
    type Item = &'a StepRecord;
    type IntoIter = std::slice::Iter<'a, StepRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
