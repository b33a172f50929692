//! Core types for the memory game.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of content pairs in a deck. Every deck has twice this many cards.
pub const DECK_PAIRS: usize = 6;

/// Play mode for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Practice,
    Timed,
}

impl GameMode {
    /// Get the mode name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Practice => "practice",
            Self::Timed => "timed",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "practice" => Some(Self::Practice),
            "timed" => Some(Self::Timed),
            _ => None,
        }
    }
}

/// Difficulty for timed sessions. Selects the time limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Medium
    }
}

/// Session state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingDifficulty,
    Revealing,
    Playing,
    Resolving,
    Over,
}

/// One card on the board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub content: String,
    pub is_matched: bool,
}

impl Card {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            is_matched: false,
        }
    }
}

/// Immutable record of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub mode: GameMode,
    pub final_score: u32,
    pub elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<f64>,
    pub player_won: bool,
}

/// Player profile, owned by the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub user_name: String,
    pub avatar: String,
    pub games_played: u32,
    /// Fastest winning time in seconds. 0.0 means no win recorded yet.
    pub best_time_secs: f64,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            user_name: "Player".to_string(),
            avatar: "😀".to_string(),
            games_played: 0,
            best_time_secs: 0.0,
        }
    }
}

/// Time limits per difficulty, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeLimits {
    pub easy: f64,
    pub medium: f64,
    pub hard: f64,
}

impl Default for TimeLimits {
    fn default() -> Self {
        Self {
            easy: 120.0,
            medium: 60.0,
            hard: 30.0,
        }
    }
}

impl TimeLimits {
    pub fn for_difficulty(&self, difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Pool of content identifiers decks are drawn from. Must have at
    /// least `DECK_PAIRS` entries.
    pub content_pool: Vec<String>,
    /// How long all cards stay face-up at session start.
    pub preview_duration_secs: f64,
    /// Delay before a flipped pair is resolved.
    pub resolution_delay_secs: f64,
    /// Interval the host should drive `tick` at.
    pub tick_interval_secs: f64,
    pub time_limits: TimeLimits,
    pub match_reward: u32,
    pub mismatch_penalty: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            content_pool: (1..=17).map(|n| n.to_string()).collect(),
            preview_duration_secs: 2.0,
            resolution_delay_secs: 0.5,
            tick_interval_secs: 1.0,
            time_limits: TimeLimits::default(),
            match_reward: 4,
            mismatch_penalty: 1,
        }
    }
}
