//! SQLite schema definitions.

/// Current schema version for migrations.
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema for the local database.
pub const SCHEMA: &str = r#"
-- Player profiles (a single row in practice, keyed for safety)
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    user_name TEXT NOT NULL,
    avatar TEXT NOT NULL,
    games_played INTEGER NOT NULL DEFAULT 0,
    best_time_secs REAL NOT NULL DEFAULT 0
);

-- Finished game sessions
CREATE TABLE IF NOT EXISTS game_sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    played_at TEXT NOT NULL,
    mode TEXT NOT NULL,
    final_score INTEGER NOT NULL,
    elapsed_secs REAL NOT NULL,
    time_limit_secs REAL,
    player_won INTEGER NOT NULL DEFAULT 0
);

-- Flashcards
CREATE TABLE IF NOT EXISTS flashcards (
    id TEXT PRIMARY KEY,
    question TEXT NOT NULL,
    answer TEXT NOT NULL
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_sessions_played_at ON game_sessions(played_at);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON game_sessions(user_id);
"#;

/// Record the schema version if not present.
pub const INIT_SCHEMA_VERSION: &str = r#"
INSERT OR IGNORE INTO schema_version (version) VALUES (1);
"#;
