//! Fresh object identifiers for new manifest entries.
//!
//! Xcode object identifiers are 24-character tokens. Xcode itself derives
//! them from hex digits, but the format accepts any uppercase alphanumeric
//! token of the right length, which is what [`IdGenerator`] draws.
//!
//! The generator is a seeded [`rand_pcg::Pcg64`]: production runs seed it
//! from OS randomness, tests seed it with a fixed value so the generated
//! manifest text is reproducible.

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::Serialize;

use crate::guard::token_in_use;

/// Length of every generated token.
pub const TOKEN_LEN: usize = 24;

const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A generated object identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Whether `s` has the lexical shape of an object identifier: non-empty and
/// made of ASCII letters and digits only.
///
/// Existing manifests use hex identifiers of 24 characters, but hand-edited
/// projects sometimes carry other lengths, so only the alphabet is checked.
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

// ---------------------------------------------------------------------------
// IdGenerator
// ---------------------------------------------------------------------------

/// Source of fresh tokens.
pub struct IdGenerator {
    rng: Pcg64,
}

impl IdGenerator {
    /// A generator seeded from OS randomness.
    pub fn new() -> Self {
        Self::seeded(rand::random())
    }

    /// A generator with a fixed seed, producing a reproducible sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// Draw a token. Always succeeds; uniqueness is not checked.
    pub fn generate(&mut self) -> Token {
        let token: String = (0..TOKEN_LEN)
            .map(|_| ALPHABET[self.rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Token(token)
    }

    /// Draw tokens until one does not already occur in `doc`.
    pub fn generate_unique(&mut self, doc: &str) -> Token {
        loop {
            let token = self.generate();
            if !token_in_use(doc, token.as_str()) {
                return token;
            }
            tracing::warn!(
                token = %token,
                "generated token collides with an existing one, redrawing"
            );
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
