//! Persistence ports consumed by the engine and host applications.

use crate::flashcards::Flashcard;
use crate::types::{SessionSummary, UserProfile};
use thiserror::Error;
use uuid::Uuid;

/// Failure in a persistence collaborator. Never fatal to a running session:
/// the engine reports it as an event and keeps its in-memory state.
#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StorageError(pub String);

/// Result type alias for storage operations.
pub type StoreResult<T> = std::result::Result<T, StorageError>;

/// Session persistence contract.
pub trait SessionStore {
    /// Return the player profile, creating a default one if none exists.
    fn fetch_or_create_user(&mut self) -> StoreResult<UserProfile>;

    /// Append the summary and update the player profile (games played,
    /// best time) as one logical unit.
    fn record_session(&mut self, summary: &SessionSummary) -> StoreResult<()>;

    /// Most recent session summaries, newest first.
    fn recent_sessions(&mut self, limit: usize) -> StoreResult<Vec<SessionSummary>>;

    /// Delete all session records and reset profile counters.
    fn reset_scores(&mut self) -> StoreResult<()>;

    /// Delete everything: sessions, profiles and flashcards.
    fn delete_all_user_data(&mut self) -> StoreResult<()>;
}

/// Flashcard persistence contract.
pub trait FlashcardStore {
    fn add_flashcard(&mut self, card: &Flashcard) -> StoreResult<()>;
    fn list_flashcards(&mut self) -> StoreResult<Vec<Flashcard>>;
    fn update_flashcard(&mut self, card: &Flashcard) -> StoreResult<()>;
    fn delete_flashcard(&mut self, id: Uuid) -> StoreResult<()>;
}
