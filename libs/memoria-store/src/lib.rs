//! SQLite persistence for memoria.
//!
//! Implements the core library's `SessionStore` and `FlashcardStore` ports
//! on a local database.

pub mod error;
pub mod repository;
pub mod schema;

pub use error::DbError;
pub use repository::SqliteStore;
