//! Flashcard study support: card type, typed-answer grading and quiz
//! sessions.
//!
//! Grading is whitespace-normalized and case-insensitive; near-misses are
//! accepted when the Levenshtein similarity clears the threshold.

use crate::error::{EngineError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default similarity a typed answer must reach to count as correct.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;

/// A question/answer card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
}

impl Flashcard {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Result of grading one typed answer.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerCheck {
    pub is_correct: bool,
    /// Similarity between 0.0 and 1.0.
    pub similarity: f64,
    /// The answer the card expected (normalized, for display).
    pub expected: String,
}

/// Totals for a finished quiz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuizSummary {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
}

/// One pass over a set of flashcards, shuffled once at the start.
pub struct QuizSession {
    cards: Vec<Flashcard>,
    position: usize,
    correct: usize,
    fuzzy_threshold: f64,
}

impl QuizSession {
    pub fn new(cards: Vec<Flashcard>, rng: &mut impl Rng) -> Result<Self> {
        Self::with_threshold(cards, rng, DEFAULT_FUZZY_THRESHOLD)
    }

    pub fn with_threshold(
        mut cards: Vec<Flashcard>,
        rng: &mut impl Rng,
        fuzzy_threshold: f64,
    ) -> Result<Self> {
        if cards.is_empty() {
            return Err(EngineError::NoFlashcards);
        }
        cards.shuffle(rng);
        Ok(Self {
            cards,
            position: 0,
            correct: 0,
            fuzzy_threshold,
        })
    }

    /// The card currently being asked, or None once the quiz is done.
    pub fn current(&self) -> Option<&Flashcard> {
        self.cards.get(self.position)
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.cards.len()
    }

    pub fn remaining(&self) -> usize {
        self.cards.len() - self.position.min(self.cards.len())
    }

    /// Grade a typed answer against the current card and advance.
    pub fn answer(&mut self, typed: &str) -> Option<AnswerCheck> {
        let card = self.cards.get(self.position)?;
        let check = grade(typed, &card.answer, self.fuzzy_threshold);
        if check.is_correct {
            self.correct += 1;
        }
        self.position += 1;
        Some(check)
    }

    /// Give up on the current card. Counts as wrong.
    pub fn skip(&mut self) -> Option<&Flashcard> {
        if self.position >= self.cards.len() {
            return None;
        }
        let skipped = self.position;
        self.position += 1;
        Some(&self.cards[skipped])
    }

    pub fn summary(&self) -> QuizSummary {
        let answered = self.position;
        QuizSummary {
            total: self.cards.len(),
            correct: self.correct,
            accuracy: if answered == 0 {
                0.0
            } else {
                self.correct as f64 / answered as f64
            },
        }
    }
}

/// Grade a typed answer. Exact matches (after normalization and case
/// folding) short-circuit; otherwise similarity decides.
pub fn grade(typed: &str, expected: &str, fuzzy_threshold: f64) -> AnswerCheck {
    let typed_normalized = normalize(typed).to_lowercase();
    let expected_normalized = normalize(expected);
    let expected_folded = expected_normalized.to_lowercase();

    let similarity = if typed_normalized == expected_folded {
        1.0
    } else {
        similarity(&typed_normalized, &expected_folded)
    };

    AnswerCheck {
        is_correct: similarity >= fuzzy_threshold,
        similarity,
        expected: expected_normalized,
    }
}

/// Trim and collapse runs of whitespace.
fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity in [0, 1] from edit distance over the longer length.
fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Rolling single row keeps this O(min) memory.
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, &ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = diagonal + usize::from(ca != cb);
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(diagonal + 1);
        }
    }
    row[b.len()]
}
