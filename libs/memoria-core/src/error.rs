//! Error types for memoria-core.

use thiserror::Error;

/// Result type alias using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors reported by the game engine.
///
/// None of these are fatal: a failed setup leaves the engine in its prior
/// phase, and storage failures surface as events instead of errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("content pool has {available} entries, need at least {required}")]
    InsufficientContentPool { available: usize, required: usize },

    #[error("cannot start a quiz with no flashcards")]
    NoFlashcards,
}
