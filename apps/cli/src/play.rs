//! Interactive terminal loop for a game session.
//!
//! The engine owns all rules; this module only renders snapshots, reads
//! input, sleeps out the delays the engine schedules and feeds elapsed
//! wall-clock time back through `tick`.

use anyhow::{bail, Result};
use memoria_core::{
    Difficulty, GameConfig, GameEvent, GameMode, GameSessionEngine, Phase, TimerId, TimerKind,
};
use memoria_store::SqliteStore;
use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

pub fn run(store: SqliteStore, timed: bool, difficulty: Option<Difficulty>) -> Result<()> {
    let mode = if timed {
        GameMode::Timed
    } else {
        GameMode::Practice
    };
    let (mut engine, mut events) =
        GameSessionEngine::start(mode, GameConfig::default(), store)?;

    loop {
        match engine.phase() {
            Phase::AwaitingDifficulty => {
                let choice = match difficulty {
                    Some(d) => d,
                    None => prompt_difficulty()?,
                };
                events = engine.select_difficulty(choice)?;
            }
            Phase::Revealing => {
                println!("\nMemorize the board!");
                render(&engine, true);
                let Some(id) = scheduled(&events, TimerKind::PreviewEnd) else {
                    bail!("engine entered reveal without a preview timer");
                };
                let delay = engine.config().preview_duration_secs;
                thread::sleep(Duration::from_secs_f64(delay));
                engine.tick(delay);
                events = engine.timer_fired(id);
            }
            Phase::Playing => {
                render(&engine, false);
                print_status(&engine);
                let started = Instant::now();
                let input = read_line("flip [1-12], q to quit > ")?;
                let tick_events = engine.tick(started.elapsed().as_secs_f64());
                if engine.phase() == Phase::Over {
                    events = tick_events;
                    continue;
                }
                match input.as_str() {
                    "q" => {
                        engine.exit_to_menu();
                        return Ok(());
                    }
                    other => {
                        if let Ok(n) = other.parse::<usize>() {
                            if n >= 1 {
                                events = engine.flip(n - 1);
                            }
                        }
                    }
                }
            }
            Phase::Resolving => {
                render(&engine, false);
                let Some(id) = scheduled(&events, TimerKind::Resolve) else {
                    bail!("engine entered resolve without a resolution timer");
                };
                let delay = engine.config().resolution_delay_secs;
                thread::sleep(Duration::from_secs_f64(delay));
                engine.tick(delay);
                events = engine.timer_fired(id);
                for event in &events {
                    if let GameEvent::PairResolved { matched, .. } = event {
                        println!("{}", if *matched { "Match!" } else { "No match." });
                    }
                }
            }
            Phase::Over => {
                print_game_over(&engine);
                let input = read_line("[p]lay again, [n]ew game, [q]uit > ")?;
                match input.as_str() {
                    "p" => events = engine.play_again()?,
                    "n" => events = engine.new_game()?,
                    _ => {
                        engine.exit_to_menu();
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn scheduled(events: &[GameEvent], kind: TimerKind) -> Option<TimerId> {
    events.iter().find_map(|e| match e {
        GameEvent::TimerScheduled { id, kind: k, .. } if *k == kind => Some(*id),
        _ => None,
    })
}

fn render(engine: &GameSessionEngine<SqliteStore>, face_up: bool) {
    for (idx, card) in engine.cards().iter().enumerate() {
        let revealed = face_up || card.is_matched || engine.revealed().contains(&idx);
        let cell = if revealed {
            format!("[{:>2}]", card.content)
        } else {
            format!("({:>2})", idx + 1)
        };
        print!(" {cell}");
        if (idx + 1) % 3 == 0 {
            println!();
        }
    }
}

fn print_status(engine: &GameSessionEngine<SqliteStore>) {
    match engine.time_limit_secs() {
        Some(limit) => {
            let remaining = (limit - engine.elapsed_secs()).max(0.0);
            println!("score: {}  time left: {:.0}s", engine.score(), remaining);
        }
        None => println!("score: {}", engine.score()),
    }
}

fn print_game_over(engine: &GameSessionEngine<SqliteStore>) {
    if engine.player_won() {
        println!("\nYou won! score: {}, time: {:.1}s", engine.score(), engine.elapsed_secs());
    } else {
        println!("\nTime's up. score: {}", engine.score());
    }
}

fn prompt_difficulty() -> Result<Difficulty> {
    loop {
        println!("Select difficulty:");
        println!("  [e]asy   (2 minutes)");
        println!("  [m]edium (1 minute)");
        println!("  [h]ard   (30 seconds)");
        match read_line("> ")?.as_str() {
            "e" => return Ok(Difficulty::Easy),
            "m" => return Ok(Difficulty::Medium),
            "h" => return Ok(Difficulty::Hard),
            _ => {}
        }
    }
}

pub fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
