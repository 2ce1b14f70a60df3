//! Idempotency verdicts.
//!
//! Every splice operation first asks whether the requested state already
//! holds and reports the answer as an [`EditOutcome`] instead of editing
//! twice. A document that already satisfies every step therefore comes out
//! byte-identical, and [`save`](crate::document::save) writes nothing.

use serde::Serialize;

use crate::scan::is_word_byte;

/// What a splice operation did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOutcome {
    /// The document text was changed.
    Applied,
    /// The item or entry being inserted is already there; nothing changed.
    AlreadyPresent,
    /// The item or entry being removed is not there; nothing changed.
    Absent,
}

impl EditOutcome {
    /// Whether the document text changed.
    pub fn changed(self) -> bool {
        self == EditOutcome::Applied
    }
}

/// Whether `token` occurs in `doc` as a whole word.
///
/// Unlike a plain substring search, `ABC` is not considered present in a
/// document that only mentions `ABCD` or `XABC`.
pub fn token_in_use(doc: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let bytes = doc.as_bytes();
    doc.match_indices(token).any(|(at, _)| {
        let before = at.checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(at + token.len()).copied();
        !before.is_some_and(is_word_byte) && !after.is_some_and(is_word_byte)
    })
}
