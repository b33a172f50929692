//! memoria: memory-matching game with flashcard study, in the terminal.

mod play;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use memoria_core::{Difficulty, Flashcard, FlashcardStore, QuizSession, SessionStore};
use memoria_store::SqliteStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "memoria", version, about = "Memory matching game with flashcard study")]
struct Cli {
    /// Data directory; defaults to the platform data dir.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a memory-matching session.
    Play {
        /// Play against the clock.
        #[arg(long)]
        timed: bool,
        /// Time limit preset for timed mode.
        #[arg(long, value_enum)]
        difficulty: Option<DifficultyArg>,
    },
    /// Manage flashcards.
    Cards {
        #[command(subcommand)]
        action: CardsAction,
    },
    /// Run a typed-answer quiz over your flashcards.
    Quiz,
    /// Show your profile and recent sessions.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Delete all recorded sessions and score counters.
    ResetScores,
    /// Delete all stored data: sessions, profile and flashcards.
    DeleteData,
}

#[derive(Subcommand)]
enum CardsAction {
    /// Add a flashcard.
    Add { question: String, answer: String },
    /// List all flashcards.
    List,
    /// Remove a flashcard by id.
    Remove { id: Uuid },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(d: DifficultyArg) -> Self {
        match d {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = open_store(cli.data_dir)?;

    match cli.command {
        Command::Play { timed, difficulty } => {
            play::run(store, timed, difficulty.map(Into::into))
        }
        Command::Cards { action } => run_cards(store, action),
        Command::Quiz => run_quiz(store),
        Command::Stats { json } => run_stats(store, json),
        Command::ResetScores => run_reset_scores(store),
        Command::DeleteData => run_delete_data(store),
    }
}

fn open_store(data_dir: Option<PathBuf>) -> Result<SqliteStore> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .context("no platform data directory")?
            .join("memoria"),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating data directory {}", dir.display()))?;
    Ok(SqliteStore::open(dir.join("memoria.db"))?)
}

fn run_cards(mut store: SqliteStore, action: CardsAction) -> Result<()> {
    match action {
        CardsAction::Add { question, answer } => {
            let card = Flashcard::new(question, answer);
            store.add_flashcard(&card)?;
            println!("added {}", card.id);
        }
        CardsAction::List => {
            let cards = store.list_flashcards()?;
            if cards.is_empty() {
                println!("no flashcards yet");
            }
            for card in cards {
                println!("{}  Q: {}  A: {}", card.id, card.question, card.answer);
            }
        }
        CardsAction::Remove { id } => {
            store.delete_flashcard(id)?;
            println!("removed {id}");
        }
    }
    Ok(())
}

fn run_quiz(mut store: SqliteStore) -> Result<()> {
    let cards = store.list_flashcards()?;
    let mut rng = rand::thread_rng();
    let mut quiz = QuizSession::new(cards, &mut rng)?;

    while let Some(card) = quiz.current().cloned() {
        println!("\nQ: {}", card.question);
        let typed = play::read_line("your answer (blank to skip) > ")?;
        if typed.is_empty() {
            quiz.skip();
            println!("skipped; the answer was: {}", card.answer);
            continue;
        }
        match quiz.answer(&typed) {
            Some(check) if check.is_correct => println!("correct!"),
            Some(check) => println!(
                "not quite ({}% similar); the answer was: {}",
                (check.similarity * 100.0).round(),
                check.expected
            ),
            None => break,
        }
    }

    let summary = quiz.summary();
    println!(
        "\n{}/{} correct ({:.0}%)",
        summary.correct,
        summary.total,
        summary.accuracy * 100.0
    );
    Ok(())
}

fn run_stats(mut store: SqliteStore, json: bool) -> Result<()> {
    let user = store.fetch_or_create_user()?;
    let sessions = store.recent_sessions(10)?;

    if json {
        let out = serde_json::json!({ "user": user, "recent_sessions": sessions });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} {}", user.avatar, user.user_name);
    println!("games played: {}", user.games_played);
    if user.best_time_secs > 0.0 {
        println!("best time: {:.1}s", user.best_time_secs);
    } else {
        println!("best time: no wins yet");
    }
    for s in sessions {
        println!(
            "{}  {:8}  score {:>3}  {:.1}s  {}",
            s.timestamp.format("%Y-%m-%d %H:%M"),
            s.mode.as_str(),
            s.final_score,
            s.elapsed_secs,
            if s.player_won { "won" } else { "lost" }
        );
    }
    Ok(())
}

fn run_reset_scores(mut store: SqliteStore) -> Result<()> {
    confirm("Reset all scores? This cannot be undone.")?;
    store.reset_scores()?;
    println!("scores reset");
    Ok(())
}

fn run_delete_data(mut store: SqliteStore) -> Result<()> {
    confirm("Delete all information? This cannot be undone.")?;
    store.delete_all_user_data()?;
    println!("all data deleted");
    Ok(())
}

fn confirm(message: &str) -> Result<()> {
    println!("{message}");
    if play::read_line("type 'yes' to confirm > ")? != "yes" {
        bail!("aborted");
    }
    Ok(())
}
