use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::question::Question;

/// Question count a stage is authored with. Other sizes load with a warning.
pub const EXPECTED_STAGE_SIZE: usize = 30;

//
// ─── STAGE NUMBER ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to parse stage number from '{raw}'")]
pub struct StageNumberError {
    raw: String,
}

/// Number of a stage. Real stages start at 1; `0` marks a synthetic cross-stage
/// session such as the daily practice set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageNumber(u32);

impl StageNumber {
    /// Sentinel for curated sessions that do not belong to one stage.
    pub const TODAY: StageNumber = StageNumber(0);

    #[must_use]
    pub fn new(number: u32) -> Self {
        Self(number)
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn is_today(&self) -> bool {
        self.0 == 0
    }

    /// The stage that must be cleared before this one unlocks.
    #[must_use]
    pub fn previous(&self) -> Option<StageNumber> {
        self.0.checked_sub(1).map(StageNumber)
    }
}

impl fmt::Debug for StageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StageNumber({})", self.0)
    }
}

impl fmt::Display for StageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StageNumber {
    type Err = StageNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(StageNumber::new)
            .map_err(|_| StageNumberError { raw: s.to_owned() })
    }
}

//
// ─── STAGE ─────────────────────────────────────────────────────────────────────
//

/// A numbered, ordered group of questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(rename = "stage")]
    number: StageNumber,
    questions: Vec<Question>,
}

impl Stage {
    #[must_use]
    pub fn new(number: StageNumber, questions: Vec<Question>) -> Self {
        Self { number, questions }
    }

    /// Synthetic stage `0` wrapping a curated pool.
    #[must_use]
    pub fn today(questions: Vec<Question>) -> Self {
        Self::new(StageNumber::TODAY, questions)
    }

    #[must_use]
    pub fn number(&self) -> StageNumber {
        self.number
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn has_expected_size(&self) -> bool {
        self.questions.len() == EXPECTED_STAGE_SIZE
    }

    /// Questions whose kanji passes `keep`, in stage order.
    pub fn questions_matching<'a, F>(&'a self, mut keep: F) -> impl Iterator<Item = &'a Question>
    where
        F: FnMut(&str) -> bool + 'a,
    {
        self.questions.iter().filter(move |q| keep(q.kanji()))
    }
}

//
// ─── QUIZ DATA ─────────────────────────────────────────────────────────────────
//

/// The whole question bank as shipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizData {
    pub stages: Vec<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unused_questions: Option<Vec<Question>>,
}

impl QuizData {
    #[must_use]
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            stages,
            unused_questions: None,
        }
    }

    #[must_use]
    pub fn stage(&self, number: StageNumber) -> Option<&Stage> {
        self.stages.iter().find(|s| s.number() == number)
    }

    /// Every question of every stage, in stage order.
    pub fn all_questions(&self) -> impl Iterator<Item = &Question> {
        self.stages.iter().flat_map(|s| s.questions().iter())
    }
}
