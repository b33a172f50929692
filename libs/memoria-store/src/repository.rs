//! SQLite-backed store implementing the core persistence ports.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use memoria_core::{
    Flashcard, FlashcardStore, GameMode, SessionStore, SessionSummary, StoreResult, UserProfile,
};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

type Result<T> = std::result::Result<T, DbError>;

/// SQLite implementation of `SessionStore` and `FlashcardStore`.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the database at path, creating it if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(super::schema::SCHEMA)?;
        self.conn.execute_batch(super::schema::INIT_SCHEMA_VERSION)?;
        Ok(())
    }

    /// Fetch the profile row, creating a default one if the table is empty.
    /// Runs inside the caller's transaction so concurrent recorders cannot
    /// both create a user.
    fn user_in_tx(tx: &Transaction<'_>) -> Result<UserProfile> {
        let existing = tx
            .query_row(
                "SELECT id, user_name, avatar, games_played, best_time_secs FROM users LIMIT 1",
                [],
                Self::row_to_user,
            )
            .optional()?;

        if let Some(raw) = existing {
            return raw.into_profile();
        }

        let user = UserProfile::default();
        debug!(user = %user.id, "creating default player profile");
        tx.execute(
            "INSERT INTO users (id, user_name, avatar, games_played, best_time_secs)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.user_name,
                user.avatar,
                user.games_played,
                user.best_time_secs
            ],
        )?;
        Ok(user)
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawUser> {
        Ok(RawUser {
            id: row.get(0)?,
            user_name: row.get(1)?,
            avatar: row.get(2)?,
            games_played: row.get(3)?,
            best_time_secs: row.get(4)?,
        })
    }

    fn record_session_impl(&mut self, summary: &SessionSummary) -> Result<()> {
        let tx = self.conn.transaction()?;
        let user = Self::user_in_tx(&tx)?;

        tx.execute(
            "INSERT INTO game_sessions
                 (id, user_id, played_at, mode, final_score, elapsed_secs, time_limit_secs, player_won)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                summary.id.to_string(),
                user.id.to_string(),
                summary.timestamp.to_rfc3339(),
                summary.mode.as_str(),
                summary.final_score,
                summary.elapsed_secs,
                summary.time_limit_secs,
                summary.player_won,
            ],
        )?;

        let best = if summary.player_won
            && (user.best_time_secs == 0.0 || summary.elapsed_secs < user.best_time_secs)
        {
            summary.elapsed_secs
        } else {
            user.best_time_secs
        };
        tx.execute(
            "UPDATE users SET games_played = games_played + 1, best_time_secs = ?1 WHERE id = ?2",
            params![best, user.id.to_string()],
        )?;

        tx.commit()?;
        debug!(session = %summary.id, score = summary.final_score, "session recorded");
        Ok(())
    }

    fn recent_sessions_impl(&self, limit: usize) -> Result<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, played_at, mode, final_score, elapsed_secs, time_limit_secs, player_won
             FROM game_sessions ORDER BY played_at DESC LIMIT ?1",
        )?;
        let raw: Vec<RawSession> = stmt
            .query_map(params![limit], |row| {
                Ok(RawSession {
                    id: row.get(0)?,
                    played_at: row.get(1)?,
                    mode: row.get(2)?,
                    final_score: row.get(3)?,
                    elapsed_secs: row.get(4)?,
                    time_limit_secs: row.get(5)?,
                    player_won: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        raw.into_iter().map(RawSession::into_summary).collect()
    }

    fn list_flashcards_impl(&self) -> Result<Vec<Flashcard>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, question, answer FROM flashcards ORDER BY question")?;
        let raw: Vec<(String, String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<_>>()?;

        raw.into_iter()
            .map(|(id, question, answer)| {
                Ok(Flashcard {
                    id: parse_uuid(&id)?,
                    question,
                    answer,
                })
            })
            .collect()
    }
}

struct RawUser {
    id: String,
    user_name: String,
    avatar: String,
    games_played: u32,
    best_time_secs: f64,
}

impl RawUser {
    fn into_profile(self) -> Result<UserProfile> {
        Ok(UserProfile {
            id: parse_uuid(&self.id)?,
            user_name: self.user_name,
            avatar: self.avatar,
            games_played: self.games_played,
            best_time_secs: self.best_time_secs,
        })
    }
}

struct RawSession {
    id: String,
    played_at: String,
    mode: String,
    final_score: u32,
    elapsed_secs: f64,
    time_limit_secs: Option<f64>,
    player_won: bool,
}

impl RawSession {
    fn into_summary(self) -> Result<SessionSummary> {
        Ok(SessionSummary {
            id: parse_uuid(&self.id)?,
            timestamp: parse_timestamp(&self.played_at)?,
            mode: GameMode::from_str(&self.mode)
                .ok_or_else(|| DbError::InvalidData(format!("unknown mode: {}", self.mode)))?,
            final_score: self.final_score,
            elapsed_secs: self.elapsed_secs,
            time_limit_secs: self.time_limit_secs,
            player_won: self.player_won,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| DbError::InvalidData(format!("bad uuid {s}: {e}")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::InvalidData(format!("bad timestamp {s}: {e}")))
}

impl SessionStore for SqliteStore {
    fn fetch_or_create_user(&mut self) -> StoreResult<UserProfile> {
        let tx = self.conn.transaction().map_err(DbError::from)?;
        let user = Self::user_in_tx(&tx)?;
        tx.commit().map_err(DbError::from)?;
        Ok(user)
    }

    fn record_session(&mut self, summary: &SessionSummary) -> StoreResult<()> {
        self.record_session_impl(summary).map_err(Into::into)
    }

    fn recent_sessions(&mut self, limit: usize) -> StoreResult<Vec<SessionSummary>> {
        self.recent_sessions_impl(limit).map_err(Into::into)
    }

    fn reset_scores(&mut self) -> StoreResult<()> {
        let tx = self.conn.transaction().map_err(DbError::from)?;
        tx.execute("DELETE FROM game_sessions", [])
            .map_err(DbError::from)?;
        tx.execute("UPDATE users SET games_played = 0, best_time_secs = 0", [])
            .map_err(DbError::from)?;
        tx.commit().map_err(DbError::from)?;
        Ok(())
    }

    fn delete_all_user_data(&mut self) -> StoreResult<()> {
        let tx = self.conn.transaction().map_err(DbError::from)?;
        tx.execute("DELETE FROM game_sessions", [])
            .map_err(DbError::from)?;
        tx.execute("DELETE FROM flashcards", [])
            .map_err(DbError::from)?;
        tx.execute("DELETE FROM users", []).map_err(DbError::from)?;
        tx.commit().map_err(DbError::from)?;
        Ok(())
    }
}

impl FlashcardStore for SqliteStore {
    fn add_flashcard(&mut self, card: &Flashcard) -> StoreResult<()> {
        self.conn
            .execute(
                "INSERT INTO flashcards (id, question, answer) VALUES (?1, ?2, ?3)",
                params![card.id.to_string(), card.question, card.answer],
            )
            .map_err(DbError::from)?;
        Ok(())
    }

    fn list_flashcards(&mut self) -> StoreResult<Vec<Flashcard>> {
        self.list_flashcards_impl().map_err(Into::into)
    }

    fn update_flashcard(&mut self, card: &Flashcard) -> StoreResult<()> {
        self.conn
            .execute(
                "UPDATE flashcards SET question = ?1, answer = ?2 WHERE id = ?3",
                params![card.question, card.answer, card.id.to_string()],
            )
            .map_err(DbError::from)?;
        Ok(())
    }

    fn delete_flashcard(&mut self, id: Uuid) -> StoreResult<()> {
        self.conn
            .execute(
                "DELETE FROM flashcards WHERE id = ?1",
                params![id.to_string()],
            )
            .map_err(DbError::from)?;
        Ok(())
    }
}
