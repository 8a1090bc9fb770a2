use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Integrity problems a single question record can have.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("kanji cannot be empty")]
    EmptyKanji,

    #[error("'{kanji}' needs at least 2 choices (has {count})")]
    TooFewChoices { kanji: String, count: usize },

    #[error("'{kanji}': answer '{answer}' is not one of the choices")]
    AnswerNotInChoices { kanji: String, answer: String },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single multiple-choice item.
///
/// The `kanji` prompt is the identity: two questions with the same kanji are the
/// same question regardless of their choices or explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    kanji: String,
    choices: Vec<String>,
    answer: String,
    explain: String,
}

impl Question {
    /// Build a question without integrity checks.
    ///
    /// Question banks are validated as a whole at load time (see
    /// [`crate::validation`]); use [`Question::try_new`] for one-off records.
    #[must_use]
    pub fn new(
        kanji: impl Into<String>,
        choices: Vec<String>,
        answer: impl Into<String>,
        explain: impl Into<String>,
    ) -> Self {
        Self {
            kanji: kanji.into(),
            choices,
            answer: answer.into(),
            explain: explain.into(),
        }
    }

    /// Build a question, rejecting records a quiz could not be played with.
    ///
    /// # Errors
    ///
    /// Returns the first `QuestionError` found by [`Question::check`].
    pub fn try_new(
        kanji: impl Into<String>,
        choices: Vec<String>,
        answer: impl Into<String>,
        explain: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let question = Self::new(kanji, choices, answer, explain);
        match question.check().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(question),
        }
    }

    /// All integrity problems of this record, in a stable order.
    #[must_use]
    pub fn check(&self) -> Vec<QuestionError> {
        let mut issues = Vec::new();
        if self.kanji.trim().is_empty() {
            issues.push(QuestionError::EmptyKanji);
        }
        if self.choices.len() < 2 {
            issues.push(QuestionError::TooFewChoices {
                kanji: self.kanji.clone(),
                count: self.choices.len(),
            });
        }
        if !self.choices.iter().any(|c| c == &self.answer) {
            issues.push(QuestionError::AnswerNotInChoices {
                kanji: self.kanji.clone(),
                answer: self.answer.clone(),
            });
        }
        issues
    }

    #[must_use]
    pub fn kanji(&self) -> &str {
        &self.kanji
    }

    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    #[must_use]
    pub fn explain(&self) -> &str {
        &self.explain
    }

    /// True when `selected` is exactly the expected answer.
    #[must_use]
    pub fn is_correct(&self, selected: &str) -> bool {
        self.answer == selected
    }

    /// Identity comparison by kanji.
    #[must_use]
    pub fn same_kanji(&self, other: &Question) -> bool {
        self.kanji == other.kanji
    }
}
