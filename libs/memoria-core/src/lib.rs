//! Core game library shared by the memoria applications.
//!
//! Provides:
//! - The memory-matching session state machine (`GameSessionEngine`)
//! - Persistence ports implemented by storage backends
//! - Flashcard types and typed-answer quiz sessions
//!
//! The engine is presentation-agnostic: commands go in, events come out,
//! and all timing is delegated to the host through scheduling events.

pub mod error;
pub mod flashcards;
pub mod session;
pub mod store;
pub mod types;

pub use error::{EngineError, Result};
pub use flashcards::{AnswerCheck, Flashcard, QuizSession, QuizSummary};
pub use session::{GameEvent, GameSessionEngine, TimerId, TimerKind};
pub use store::{FlashcardStore, SessionStore, StorageError, StoreResult};
pub use types::{
    Card, Difficulty, GameConfig, GameMode, Phase, SessionSummary, TimeLimits, UserProfile,
    DECK_PAIRS,
};
