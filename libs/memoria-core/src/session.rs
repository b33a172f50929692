//! Memory-game session state machine.
//!
//! The engine owns all game state and mutates it only through commands.
//! Each command returns the events produced by that transition; the host
//! renders from events and snapshot accessors, never from shared state.
//!
//! The engine never sleeps. One-shot delays (preview end, pair resolution)
//! are requested from the host via `TimerScheduled` events and delivered
//! back through `timer_fired`. Timer ids are generation-stamped, so a
//! callback that outlives its session is a silent no-op.

use crate::error::{EngineError, Result};
use crate::store::SessionStore;
use crate::types::{Card, Difficulty, GameConfig, GameMode, Phase, SessionSummary, DECK_PAIRS};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handle for a one-shot delay requested from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(u64);

/// What a scheduled one-shot delay will trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    PreviewEnd,
    Resolve,
}

/// Events emitted by engine transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    PhaseChanged(Phase),
    PreviewStarted,
    PreviewEnded,
    CardFlipped { position: usize, face_up: bool },
    PairResolved { matched: bool, positions: [usize; 2] },
    ScoreChanged(u32),
    SessionEnded(SessionSummary),
    /// Host should call `timer_fired(id)` after `after_secs`.
    TimerScheduled {
        id: TimerId,
        kind: TimerKind,
        after_secs: f64,
    },
    /// Pending one-shot delays are void; the host may drop its handles.
    TimersCancelled,
    /// Host should start calling `tick` at the given interval.
    TickSourceStarted { interval_secs: f64 },
    TickSourceStopped,
    /// Persistence failed; session state is unaffected.
    StorageFailed(String),
}

/// State machine governing one play session from setup through completion.
pub struct GameSessionEngine<S: SessionStore> {
    config: GameConfig,
    mode: GameMode,
    store: S,
    rng: StdRng,
    phase: Phase,
    difficulty: Difficulty,
    time_limit_secs: Option<f64>,
    cards: Vec<Card>,
    revealed: Vec<usize>,
    score: u32,
    elapsed_secs: f64,
    consecutive_sessions: u32,
    next_timer: u64,
    pending_preview: Option<TimerId>,
    pending_resolve: Option<TimerId>,
    ticking: bool,
    player_won: bool,
    summary_recorded: bool,
}

impl<S: SessionStore> GameSessionEngine<S> {
    /// Start a session. Practice mode builds a deck immediately; the first
    /// timed session of a menu visit waits for a difficulty selection.
    pub fn start(mode: GameMode, config: GameConfig, store: S) -> Result<(Self, Vec<GameEvent>)> {
        Self::start_with_rng(mode, config, store, StdRng::from_entropy())
    }

    /// Start with an explicit rng, for deterministic decks.
    pub fn start_with_rng(
        mode: GameMode,
        config: GameConfig,
        store: S,
        rng: StdRng,
    ) -> Result<(Self, Vec<GameEvent>)> {
        let mut engine = Self {
            config,
            mode,
            store,
            rng,
            phase: Phase::AwaitingDifficulty,
            difficulty: Difficulty::default(),
            time_limit_secs: None,
            cards: Vec::new(),
            revealed: Vec::new(),
            score: 0,
            elapsed_secs: 0.0,
            consecutive_sessions: 0,
            next_timer: 0,
            pending_preview: None,
            pending_resolve: None,
            ticking: false,
            player_won: false,
            summary_recorded: false,
        };

        let events = match mode {
            GameMode::Timed => vec![GameEvent::PhaseChanged(Phase::AwaitingDifficulty)],
            GameMode::Practice => engine.setup()?,
        };
        Ok((engine, events))
    }

    /// Pick a difficulty and build the first timed deck. No-op outside the
    /// difficulty prompt.
    pub fn select_difficulty(&mut self, difficulty: Difficulty) -> Result<Vec<GameEvent>> {
        if self.phase != Phase::AwaitingDifficulty {
            return Ok(Vec::new());
        }
        self.difficulty = difficulty;
        self.setup()
    }

    /// Flip the card at `position`. Rejected flips are silent no-ops.
    pub fn flip(&mut self, position: usize) -> Vec<GameEvent> {
        if self.phase != Phase::Playing {
            return Vec::new();
        }
        let Some(card) = self.cards.get(position) else {
            return Vec::new();
        };
        if card.is_matched || self.revealed.len() == 2 {
            return Vec::new();
        }

        // Flipping an already face-up card turns it back down.
        if let Some(i) = self.revealed.iter().position(|&p| p == position) {
            self.revealed.remove(i);
            return vec![GameEvent::CardFlipped {
                position,
                face_up: false,
            }];
        }

        self.revealed.push(position);
        let mut events = vec![GameEvent::CardFlipped {
            position,
            face_up: true,
        }];
        if self.revealed.len() == 2 {
            self.phase = Phase::Resolving;
            events.push(GameEvent::PhaseChanged(Phase::Resolving));
            let id = self.next_timer_id();
            self.pending_resolve = Some(id);
            events.push(GameEvent::TimerScheduled {
                id,
                kind: TimerKind::Resolve,
                after_secs: self.config.resolution_delay_secs,
            });
        }
        events
    }

    /// Advance session time. In timed mode, reaching the limit forces the
    /// session over from any active phase.
    pub fn tick(&mut self, delta_secs: f64) -> Vec<GameEvent> {
        match self.phase {
            Phase::AwaitingDifficulty | Phase::Over => return Vec::new(),
            Phase::Revealing | Phase::Playing | Phase::Resolving => {}
        }
        self.elapsed_secs += delta_secs;
        if self.mode == GameMode::Timed {
            if let Some(limit) = self.time_limit_secs {
                if self.elapsed_secs >= limit {
                    let won = self.all_matched();
                    return self.end_session(won);
                }
            }
        }
        Vec::new()
    }

    /// Deliver a one-shot delay back to the engine. Stale ids are ignored.
    pub fn timer_fired(&mut self, id: TimerId) -> Vec<GameEvent> {
        if self.pending_preview == Some(id) {
            self.pending_preview = None;
            if self.phase == Phase::Revealing {
                self.phase = Phase::Playing;
                debug!("preview over, accepting flips");
                return vec![
                    GameEvent::PreviewEnded,
                    GameEvent::PhaseChanged(Phase::Playing),
                ];
            }
            return Vec::new();
        }
        if self.pending_resolve == Some(id) {
            self.pending_resolve = None;
            if self.phase == Phase::Resolving {
                return self.resolve_pair();
            }
            return Vec::new();
        }
        Vec::new()
    }

    /// Start another session, keeping difficulty and the carried score.
    pub fn play_again(&mut self) -> Result<Vec<GameEvent>> {
        if self.phase != Phase::Over {
            return Ok(Vec::new());
        }
        self.setup()
    }

    /// Start a fresh game: score carry stops, difficulty is kept.
    pub fn new_game(&mut self) -> Result<Vec<GameEvent>> {
        if self.phase != Phase::Over {
            return Ok(Vec::new());
        }
        self.consecutive_sessions = 0;
        self.setup()
    }

    /// Tear down the session on return to the menu or view disposal.
    /// Cancels every pending timer so nothing fires into a dead session.
    pub fn exit_to_menu(&mut self) -> Vec<GameEvent> {
        self.consecutive_sessions = 0;
        let events = self.cancel_timers();
        if self.phase != Phase::Over {
            debug!(phase = ?self.phase, "session abandoned before completion");
        }
        self.phase = Phase::Over;
        events
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn time_limit_secs(&self) -> Option<f64> {
        self.time_limit_secs
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Positions currently face-up pending resolution.
    pub fn revealed(&self) -> &[usize] {
        &self.revealed
    }

    pub fn consecutive_sessions(&self) -> u32 {
        self.consecutive_sessions
    }

    pub fn player_won(&self) -> bool {
        self.player_won
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Build a fresh deck and enter the reveal phase.
    ///
    /// The score resets only when this is the first session since a
    /// menu-level reset (`consecutive_sessions == 0` on entry); Play-Again
    /// carries it forward.
    fn setup(&mut self) -> Result<Vec<GameEvent>> {
        let pool = &self.config.content_pool;
        if pool.len() < DECK_PAIRS {
            return Err(EngineError::InsufficientContentPool {
                available: pool.len(),
                required: DECK_PAIRS,
            });
        }

        let mut contents: Vec<String> = pool
            .choose_multiple(&mut self.rng, DECK_PAIRS)
            .cloned()
            .collect();
        contents.extend(contents.clone());
        contents.shuffle(&mut self.rng);
        self.cards = contents.into_iter().map(Card::new).collect();

        let mut events = Vec::new();
        if self.consecutive_sessions == 0 && self.score != 0 {
            self.score = 0;
            events.push(GameEvent::ScoreChanged(0));
        }
        self.consecutive_sessions += 1;

        if self.mode == GameMode::Timed {
            self.time_limit_secs = Some(self.config.time_limits.for_difficulty(self.difficulty));
        }
        self.elapsed_secs = 0.0;
        self.revealed.clear();
        self.player_won = false;
        self.summary_recorded = false;
        self.phase = Phase::Revealing;

        debug!(
            mode = self.mode.as_str(),
            session = self.consecutive_sessions,
            "deck built, revealing"
        );

        events.push(GameEvent::PhaseChanged(Phase::Revealing));
        events.push(GameEvent::PreviewStarted);
        let id = self.next_timer_id();
        self.pending_preview = Some(id);
        events.push(GameEvent::TimerScheduled {
            id,
            kind: TimerKind::PreviewEnd,
            after_secs: self.config.preview_duration_secs,
        });
        self.ticking = true;
        events.push(GameEvent::TickSourceStarted {
            interval_secs: self.config.tick_interval_secs,
        });
        Ok(events)
    }

    fn resolve_pair(&mut self) -> Vec<GameEvent> {
        debug_assert_eq!(self.revealed.len(), 2);
        let (a, b) = (self.revealed[0], self.revealed[1]);
        let matched = self.cards[a].content == self.cards[b].content;

        if matched {
            self.cards[a].is_matched = true;
            self.cards[b].is_matched = true;
            self.score += self.config.match_reward;
        } else {
            self.score = self.score.saturating_sub(self.config.mismatch_penalty);
        }
        self.revealed.clear();

        let mut events = vec![
            GameEvent::PairResolved {
                matched,
                positions: [a, b],
            },
            GameEvent::ScoreChanged(self.score),
        ];
        if matched && self.all_matched() {
            events.extend(self.end_session(true));
        } else {
            self.phase = Phase::Playing;
            events.push(GameEvent::PhaseChanged(Phase::Playing));
        }
        events
    }

    fn end_session(&mut self, player_won: bool) -> Vec<GameEvent> {
        self.phase = Phase::Over;
        self.player_won = player_won;
        let mut events = self.cancel_timers();

        let summary = SessionSummary {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            mode: self.mode,
            final_score: self.score,
            elapsed_secs: self.elapsed_secs,
            time_limit_secs: self.time_limit_secs,
            player_won,
        };
        info!(
            mode = self.mode.as_str(),
            score = self.score,
            elapsed = self.elapsed_secs,
            won = player_won,
            "session over"
        );

        events.push(GameEvent::PhaseChanged(Phase::Over));
        events.push(GameEvent::SessionEnded(summary.clone()));
        events.extend(self.record_summary(&summary));
        events
    }

    /// Persist the finished session. One attempt per session; failure is
    /// reported as an event and never rolls back game state.
    fn record_summary(&mut self, summary: &SessionSummary) -> Vec<GameEvent> {
        if self.summary_recorded {
            return Vec::new();
        }
        self.summary_recorded = true;
        match self.store.record_session(summary) {
            Ok(()) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "failed to persist session");
                vec![GameEvent::StorageFailed(e.to_string())]
            }
        }
    }

    fn cancel_timers(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let had_pending =
            self.pending_preview.take().is_some() | self.pending_resolve.take().is_some();
        if had_pending {
            events.push(GameEvent::TimersCancelled);
        }
        if self.ticking {
            self.ticking = false;
            events.push(GameEvent::TickSourceStopped);
        }
        events
    }

    fn all_matched(&self) -> bool {
        !self.cards.is_empty() && self.cards.iter().all(|c| c.is_matched)
    }

    fn next_timer_id(&mut self) -> TimerId {
        self.next_timer += 1;
        TimerId(self.next_timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{StorageError, StoreResult};
    use crate::types::UserProfile;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        user: UserProfile,
        sessions: Vec<SessionSummary>,
        fail: bool,
    }

    impl SessionStore for MemoryStore {
        fn fetch_or_create_user(&mut self) -> StoreResult<UserProfile> {
            Ok(self.user.clone())
        }

        fn record_session(&mut self, summary: &SessionSummary) -> StoreResult<()> {
            if self.fail {
                return Err(StorageError("disk unavailable".to_string()));
            }
            self.user.games_played += 1;
            if summary.player_won
                && (self.user.best_time_secs == 0.0
                    || summary.elapsed_secs < self.user.best_time_secs)
            {
                self.user.best_time_secs = summary.elapsed_secs;
            }
            self.sessions.push(summary.clone());
            Ok(())
        }

        fn recent_sessions(&mut self, limit: usize) -> StoreResult<Vec<SessionSummary>> {
            Ok(self.sessions.iter().rev().take(limit).cloned().collect())
        }

        fn reset_scores(&mut self) -> StoreResult<()> {
            self.sessions.clear();
            Ok(())
        }

        fn delete_all_user_data(&mut self) -> StoreResult<()> {
            self.sessions.clear();
            Ok(())
        }
    }

    type Engine = GameSessionEngine<MemoryStore>;

    fn practice_engine() -> Engine {
        let (mut engine, events) = GameSessionEngine::start_with_rng(
            GameMode::Practice,
            GameConfig::default(),
            MemoryStore::default(),
            StdRng::seed_from_u64(7),
        )
        .unwrap();
        skip_preview(&mut engine, &events);
        engine
    }

    fn timed_engine(difficulty: Difficulty) -> Engine {
        let (mut engine, _) = GameSessionEngine::start_with_rng(
            GameMode::Timed,
            GameConfig::default(),
            MemoryStore::default(),
            StdRng::seed_from_u64(7),
        )
        .unwrap();
        let events = engine.select_difficulty(difficulty).unwrap();
        skip_preview(&mut engine, &events);
        engine
    }

    fn scheduled(events: &[GameEvent], kind: TimerKind) -> TimerId {
        events
            .iter()
            .find_map(|e| match e {
                GameEvent::TimerScheduled { id, kind: k, .. } if *k == kind => Some(*id),
                _ => None,
            })
            .expect("expected a scheduled timer")
    }

    fn skip_preview(engine: &mut Engine, setup_events: &[GameEvent]) {
        let id = scheduled(setup_events, TimerKind::PreviewEnd);
        let events = engine.timer_fired(id);
        assert!(events.contains(&GameEvent::PhaseChanged(Phase::Playing)));
    }

    fn matching_pair(engine: &Engine) -> (usize, usize) {
        let cards = engine.cards();
        for i in 0..cards.len() {
            for j in i + 1..cards.len() {
                if !cards[i].is_matched && cards[i].content == cards[j].content {
                    return (i, j);
                }
            }
        }
        unreachable!("deck always contains an unmatched pair while playing")
    }

    fn mismatched_pair(engine: &Engine) -> (usize, usize) {
        let cards = engine.cards();
        for i in 0..cards.len() {
            for j in i + 1..cards.len() {
                if !cards[i].is_matched
                    && !cards[j].is_matched
                    && cards[i].content != cards[j].content
                {
                    return (i, j);
                }
            }
        }
        unreachable!("unfinished deck always contains a mismatch")
    }

    /// Flip a matching pair and run the resolution delay.
    fn make_match(engine: &mut Engine) -> Vec<GameEvent> {
        let (a, b) = matching_pair(engine);
        engine.flip(a);
        let events = engine.flip(b);
        let id = scheduled(&events, TimerKind::Resolve);
        engine.timer_fired(id)
    }

    fn win_game(engine: &mut Engine) -> Vec<GameEvent> {
        let mut last = Vec::new();
        while engine.phase() != Phase::Over {
            last = make_match(engine);
        }
        last
    }

    #[test]
    fn deck_has_six_pairs_each_twice() {
        let engine = practice_engine();
        assert_eq!(engine.cards().len(), DECK_PAIRS * 2);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for card in engine.cards() {
            *counts.entry(card.content.as_str()).or_default() += 1;
        }
        assert_eq!(counts.len(), DECK_PAIRS);
        assert!(counts.values().all(|&n| n == 2));
    }

    #[test]
    fn practice_starts_revealing_then_plays() {
        let (mut engine, events) = GameSessionEngine::start_with_rng(
            GameMode::Practice,
            GameConfig::default(),
            MemoryStore::default(),
            StdRng::seed_from_u64(1),
        )
        .unwrap();
        assert_eq!(engine.phase(), Phase::Revealing);
        assert!(events.contains(&GameEvent::PreviewStarted));
        assert!(events.contains(&GameEvent::TickSourceStarted { interval_secs: 1.0 }));

        // Flips are rejected until the preview delay runs out.
        assert!(engine.flip(0).is_empty());

        let id = scheduled(&events, TimerKind::PreviewEnd);
        let events = engine.timer_fired(id);
        assert!(events.contains(&GameEvent::PreviewEnded));
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn flip_toggles_face_up() {
        let mut engine = practice_engine();
        let events = engine.flip(3);
        assert_eq!(
            events,
            vec![GameEvent::CardFlipped {
                position: 3,
                face_up: true
            }]
        );
        assert_eq!(engine.revealed(), &[3]);

        let events = engine.flip(3);
        assert_eq!(
            events,
            vec![GameEvent::CardFlipped {
                position: 3,
                face_up: false
            }]
        );
        assert!(engine.revealed().is_empty());
    }

    #[test]
    fn third_flip_is_rejected() {
        let mut engine = practice_engine();
        engine.flip(0);
        engine.flip(1);
        assert_eq!(engine.phase(), Phase::Resolving);
        assert!(engine.flip(2).is_empty());
        assert_eq!(engine.revealed().len(), 2);
    }

    #[test]
    fn out_of_range_flip_is_rejected() {
        let mut engine = practice_engine();
        assert!(engine.flip(99).is_empty());
    }

    #[test]
    fn matched_pair_awards_reward() {
        let mut engine = practice_engine();
        let (a, b) = matching_pair(&engine);
        engine.flip(a);
        let events = engine.flip(b);
        assert!(events.contains(&GameEvent::PhaseChanged(Phase::Resolving)));

        let id = scheduled(&events, TimerKind::Resolve);
        let events = engine.timer_fired(id);
        assert!(events.contains(&GameEvent::PairResolved {
            matched: true,
            positions: [a, b]
        }));
        assert!(events.contains(&GameEvent::ScoreChanged(4)));
        assert!(engine.cards()[a].is_matched);
        assert!(engine.cards()[b].is_matched);
        assert!(engine.revealed().is_empty());
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn mismatch_floors_score_at_zero() {
        let mut engine = practice_engine();
        let (a, b) = mismatched_pair(&engine);
        engine.flip(a);
        let events = engine.flip(b);
        let id = scheduled(&events, TimerKind::Resolve);
        let events = engine.timer_fired(id);

        assert!(events.contains(&GameEvent::PairResolved {
            matched: false,
            positions: [a, b]
        }));
        assert_eq!(engine.score(), 0);
        assert!(!engine.cards()[a].is_matched);
        assert!(!engine.cards()[b].is_matched);
        assert!(engine.revealed().is_empty());
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn mismatch_deducts_from_earned_score() {
        let mut engine = practice_engine();
        make_match(&mut engine);
        assert_eq!(engine.score(), 4);

        let (a, b) = mismatched_pair(&engine);
        engine.flip(a);
        let events = engine.flip(b);
        let id = scheduled(&events, TimerKind::Resolve);
        engine.timer_fired(id);
        assert_eq!(engine.score(), 3);
    }

    #[test]
    fn flip_on_matched_card_is_noop() {
        let mut engine = practice_engine();
        let (a, _) = matching_pair(&engine);
        make_match(&mut engine);
        assert!(engine.flip(a).is_empty());
        assert!(engine.revealed().is_empty());
    }

    #[test]
    fn elapsed_accumulates_from_reveal_onwards() {
        let (mut engine, _) = GameSessionEngine::start_with_rng(
            GameMode::Practice,
            GameConfig::default(),
            MemoryStore::default(),
            StdRng::seed_from_u64(1),
        )
        .unwrap();
        assert_eq!(engine.phase(), Phase::Revealing);
        engine.tick(1.0);
        engine.tick(1.0);
        assert_eq!(engine.elapsed_secs(), 2.0);
    }

    #[test]
    fn timed_session_times_out() {
        let mut engine = timed_engine(Difficulty::Hard);
        assert_eq!(engine.time_limit_secs(), Some(30.0));

        let mut events = Vec::new();
        for _ in 0..30 {
            events = engine.tick(1.0);
        }
        assert_eq!(engine.phase(), Phase::Over);
        assert!(!engine.player_won());
        assert!(events.contains(&GameEvent::TickSourceStopped));
        let summary = events
            .iter()
            .find_map(|e| match e {
                GameEvent::SessionEnded(s) => Some(s.clone()),
                _ => None,
            })
            .expect("session end event");
        assert_eq!(summary.mode, GameMode::Timed);
        assert_eq!(summary.time_limit_secs, Some(30.0));
        assert!(!summary.player_won);
        assert_eq!(engine.store().sessions.len(), 1);

        // Terminal phase rejects play commands.
        assert!(engine.flip(0).is_empty());
        assert!(engine.tick(1.0).is_empty());
    }

    #[test]
    fn practice_mode_never_times_out() {
        let mut engine = practice_engine();
        for _ in 0..500 {
            engine.tick(1.0);
        }
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn small_pool_is_a_configuration_error() {
        let config = GameConfig {
            content_pool: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            ..GameConfig::default()
        };

        let result = GameSessionEngine::start_with_rng(
            GameMode::Practice,
            config.clone(),
            MemoryStore::default(),
            StdRng::seed_from_u64(1),
        );
        assert!(matches!(
            result,
            Err(EngineError::InsufficientContentPool {
                available: 4,
                required: DECK_PAIRS
            })
        ));

        // Timed mode reports it at difficulty selection and stays put.
        let (mut engine, _) = GameSessionEngine::start_with_rng(
            GameMode::Timed,
            config,
            MemoryStore::default(),
            StdRng::seed_from_u64(1),
        )
        .unwrap();
        assert!(engine.select_difficulty(Difficulty::Easy).is_err());
        assert_eq!(engine.phase(), Phase::AwaitingDifficulty);
        assert!(engine.cards().is_empty());
    }

    #[test]
    fn play_again_carries_score_forward() {
        let mut engine = timed_engine(Difficulty::Hard);
        make_match(&mut engine);
        assert_eq!(engine.score(), 4);
        for _ in 0..30 {
            engine.tick(1.0);
        }
        assert_eq!(engine.phase(), Phase::Over);
        assert_eq!(engine.consecutive_sessions(), 1);

        let events = engine.play_again().unwrap();
        assert_eq!(engine.phase(), Phase::Revealing);
        assert_eq!(engine.consecutive_sessions(), 2);
        assert_eq!(engine.score(), 4);
        assert_eq!(engine.time_limit_secs(), Some(30.0));
        assert!(engine.cards().iter().all(|c| !c.is_matched));
        assert!(events.contains(&GameEvent::PreviewStarted));
    }

    #[test]
    fn new_game_resets_score_and_streak() {
        let mut engine = timed_engine(Difficulty::Hard);
        make_match(&mut engine);
        for _ in 0..30 {
            engine.tick(1.0);
        }

        let events = engine.new_game().unwrap();
        assert_eq!(engine.consecutive_sessions(), 1);
        assert_eq!(engine.score(), 0);
        assert!(events.contains(&GameEvent::ScoreChanged(0)));
    }

    #[test]
    fn reentry_commands_rejected_while_playing() {
        let mut engine = practice_engine();
        assert!(engine.play_again().unwrap().is_empty());
        assert!(engine.new_game().unwrap().is_empty());
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn winning_ends_session_and_records_once() {
        let mut engine = practice_engine();
        engine.tick(12.5);
        let events = win_game(&mut engine);

        assert_eq!(engine.phase(), Phase::Over);
        assert!(engine.player_won());
        assert_eq!(engine.score(), (DECK_PAIRS as u32) * 4);
        let summary = events
            .iter()
            .find_map(|e| match e {
                GameEvent::SessionEnded(s) => Some(s.clone()),
                _ => None,
            })
            .expect("session end event");
        assert!(summary.player_won);
        assert_eq!(summary.elapsed_secs, 12.5);
        assert_eq!(summary.time_limit_secs, None);

        assert_eq!(engine.store().sessions.len(), 1);
        assert_eq!(engine.store().user.games_played, 1);
        assert_eq!(engine.store().user.best_time_secs, 12.5);

        // Re-entry must not re-record the finished session.
        let setup_events = engine.play_again().unwrap();
        assert_eq!(engine.store().sessions.len(), 1);
        skip_preview(&mut engine, &setup_events);

        engine.tick(8.0);
        win_game(&mut engine);
        assert_eq!(engine.store().sessions.len(), 2);
        assert_eq!(engine.store().user.best_time_secs, 8.0);
    }

    #[test]
    fn stale_timer_is_ignored() {
        let mut engine = practice_engine();
        let (a, b) = matching_pair(&engine);
        engine.flip(a);
        let events = engine.flip(b);
        let id = scheduled(&events, TimerKind::Resolve);

        engine.timer_fired(id);
        let score = engine.score();
        // A duplicate delivery of the same delay does nothing.
        assert!(engine.timer_fired(id).is_empty());
        assert_eq!(engine.score(), score);
    }

    #[test]
    fn preview_timer_from_previous_session_is_ignored() {
        let mut engine = timed_engine(Difficulty::Hard);
        for _ in 0..30 {
            engine.tick(1.0);
        }
        let events = engine.play_again().unwrap();
        let preview = scheduled(&events, TimerKind::PreviewEnd);

        // Fire the fresh preview, then replay it: the second is stale.
        engine.timer_fired(preview);
        assert_eq!(engine.phase(), Phase::Playing);
        assert!(engine.timer_fired(preview).is_empty());
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn exit_to_menu_cancels_pending_timers() {
        let (mut engine, events) = GameSessionEngine::start_with_rng(
            GameMode::Practice,
            GameConfig::default(),
            MemoryStore::default(),
            StdRng::seed_from_u64(9),
        )
        .unwrap();
        let preview = scheduled(&events, TimerKind::PreviewEnd);

        let events = engine.exit_to_menu();
        assert!(events.contains(&GameEvent::TimersCancelled));
        assert!(events.contains(&GameEvent::TickSourceStopped));
        assert_eq!(engine.consecutive_sessions(), 0);
        assert_eq!(engine.phase(), Phase::Over);

        // The cancelled preview must not revive the session.
        assert!(engine.timer_fired(preview).is_empty());
        assert_eq!(engine.phase(), Phase::Over);
    }

    #[test]
    fn storage_failure_is_reported_not_fatal() {
        let store = MemoryStore {
            fail: true,
            ..MemoryStore::default()
        };
        let (mut engine, events) = GameSessionEngine::start_with_rng(
            GameMode::Practice,
            GameConfig::default(),
            store,
            StdRng::seed_from_u64(7),
        )
        .unwrap();
        skip_preview(&mut engine, &events);

        let events = win_game(&mut engine);
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::StorageFailed(_))));
        assert_eq!(engine.phase(), Phase::Over);
        assert_eq!(engine.score(), (DECK_PAIRS as u32) * 4);

        // The next session still starts normally.
        assert!(engine.play_again().is_ok());
        assert_eq!(engine.phase(), Phase::Revealing);
    }

    #[test]
    fn decks_differ_across_sessions() {
        let mut engine = timed_engine(Difficulty::Easy);
        let first: Vec<String> = engine.cards().iter().map(|c| c.content.clone()).collect();
        for _ in 0..120 {
            engine.tick(1.0);
        }
        engine.play_again().unwrap();
        let second: Vec<String> = engine.cards().iter().map(|c| c.content.clone()).collect();
        // Same rng stream, fresh draw: layouts should not repeat.
        assert_ne!(first, second);
    }
}
