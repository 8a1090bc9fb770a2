use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::stage::StageNumber;

/// Most recent wrong answers kept per stage.
pub const WRONG_ANSWER_LOG_CAP: usize = 200;

/// One missed answer, kept for the wrong-answer notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongAnswerEntry {
    pub id: Uuid,
    pub kanji: String,
    /// Empty when the selection was not captured.
    pub selected_answer: String,
    pub correct_answer: String,
    pub stage_number: StageNumber,
    pub date: DateTime<Utc>,
}

impl WrongAnswerEntry {
    #[must_use]
    pub fn new(
        stage_number: StageNumber,
        kanji: impl Into<String>,
        selected_answer: impl Into<String>,
        correct_answer: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kanji: kanji.into(),
            selected_answer: selected_answer.into(),
            correct_answer: correct_answer.into(),
            stage_number,
            date,
        }
    }
}

/// Per-stage answer statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStats {
    pub stage_number: StageNumber,
    pub total_attempts: u32,
    pub correct_attempts: u32,
    /// Kanji missed and not answered correctly since, oldest miss first.
    pub wrong_kanji: Vec<String>,
    #[serde(default)]
    pub wrong_answer_log: Vec<WrongAnswerEntry>,
}

impl StageStats {
    #[must_use]
    pub fn new(stage_number: StageNumber) -> Self {
        Self {
            stage_number,
            total_attempts: 0,
            correct_attempts: 0,
            wrong_kanji: Vec::new(),
            wrong_answer_log: Vec::new(),
        }
    }

    /// Share of correct attempts, `0.0` before the first attempt.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        f64::from(self.correct_attempts) / f64::from(self.total_attempts)
    }

    /// Apply one answer: a correct answer clears the kanji from the weak list, a
    /// wrong one adds it (once) and appends to the capped log.
    pub fn apply_answer(
        &mut self,
        kanji: &str,
        was_correct: bool,
        selected_answer: &str,
        correct_answer: &str,
        at: DateTime<Utc>,
    ) {
        self.total_attempts = self.total_attempts.saturating_add(1);

        if was_correct {
            self.correct_attempts = self.correct_attempts.saturating_add(1);
            self.wrong_kanji.retain(|k| k != kanji);
            return;
        }

        if !self.wrong_kanji.iter().any(|k| k == kanji) {
            self.wrong_kanji.push(kanji.to_owned());
        }
        self.wrong_answer_log.push(WrongAnswerEntry::new(
            self.stage_number,
            kanji,
            selected_answer,
            correct_answer,
            at,
        ));
        if self.wrong_answer_log.len() > WRONG_ANSWER_LOG_CAP {
            let overflow = self.wrong_answer_log.len() - WRONG_ANSWER_LOG_CAP;
            self.wrong_answer_log.drain(..overflow);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn wrong_then_correct_clears_weak_kanji() {
        let mut stats = StageStats::new(StageNumber::new(1));
        stats.apply_answer("燎", false, "x", "かがりび", fixed_now());
        stats.apply_answer("燎", false, "y", "かがりび", fixed_now());
        assert_eq!(stats.wrong_kanji, vec!["燎".to_owned()]);
        assert_eq!(stats.wrong_answer_log.len(), 2);

        stats.apply_answer("燎", true, "かがりび", "かがりび", fixed_now());
        assert!(stats.wrong_kanji.is_empty());
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.correct_attempts, 1);
        assert!((stats.accuracy() - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn log_keeps_newest_entries() {
        let mut stats = StageStats::new(StageNumber::new(1));
        for i in 0..(WRONG_ANSWER_LOG_CAP + 5) {
            stats.apply_answer(&format!("k{i}"), false, "", "a", fixed_now());
        }
        assert_eq!(stats.wrong_answer_log.len(), WRONG_ANSWER_LOG_CAP);
        assert_eq!(stats.wrong_answer_log[0].kanji, "k5");
    }

    #[test]
    fn accuracy_is_zero_without_attempts() {
        assert_eq!(StageStats::new(StageNumber::new(4)).accuracy(), 0.0);
    }
}
