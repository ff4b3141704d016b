//! Session transcript: turns, the append-only store, and the seed context.

use serde::{Deserialize, Serialize};

/// Who produced a turn.
///
/// The Gemini wire format calls the assistant role `"model"`; that rename
/// lives in the Gemini client, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

/// One entry in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }
}

/// Append-only ordered log of turns for one session.
///
/// Turns are never removed or mutated once appended; rendering and request
/// construction both read the same sequence.
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn to the end of the log.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The full ordered sequence, oldest first.
    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[allow(dead_code)] // Paired with len
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Fixed instruction + greeting pair that frames the assistant's behavior.
///
/// Prepended to every model request; the greeting is additionally appended to
/// a fresh transcript so the page opens with it.
#[derive(Debug, Clone)]
pub struct SeedContext {
    pub instruction: Turn,
    pub greeting: Turn,
}

/// Behavioral framing for the nature tour-guide persona.
pub const SEED_INSTRUCTION: &str = "Kamu adalah Pemandu wisata alam. Beri 2 rekomendasi \
     tempat wisata alam yang menarik. Jawaban singkat dan faktual. Tolak pertanyaan non-sejarah.";

/// Opening message shown as the transcript's first entry.
pub const SEED_GREETING: &str =
    "Baik! Masukkan nama kota untuk saya berikan rekomendasi tempat wisata alam yang menarik.";

impl SeedContext {
    pub fn tour_guide() -> Self {
        Self {
            instruction: Turn::user(SEED_INSTRUCTION),
            greeting: Turn::assistant(SEED_GREETING),
        }
    }
}

impl Default for SeedContext {
    fn default() -> Self {
        Self::tour_guide()
    }
}
