use serde::Serialize;

use oni_core::model::{Question, QuizMode, StageNumber};

/// State of the quiz state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "phase")]
pub enum QuizPhase {
    Answering,
    ShowingExplanation,
    ShowingWrongAnswer {
        #[serde(rename = "correct")]
        correct_answer: String,
    },
    StageCleared,
}

impl QuizPhase {
    #[must_use]
    pub fn is_answering(&self) -> bool {
        matches!(self, QuizPhase::Answering)
    }

    #[must_use]
    pub fn is_cleared(&self) -> bool {
        matches!(self, QuizPhase::StageCleared)
    }

    /// Explanation or wrong-answer screen, where `proceed` applies.
    #[must_use]
    pub fn awaits_proceed(&self) -> bool {
        matches!(
            self,
            QuizPhase::ShowingExplanation | QuizPhase::ShowingWrongAnswer { .. }
        )
    }
}

/// Outcome of a single `answer` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AnswerResult {
    Correct,
    Wrong,
    /// The call arrived outside the answering phase and changed nothing.
    Ignored,
}

/// What the caller should do after `request_quit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QuitRequest {
    /// Unfinished session: ask before discarding it.
    ConfirmQuit,
    Leave,
}

/// Immutable view of a session for presentation layers.
///
/// No formatting beyond the two headline strings; callers render the rest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub stage_number: StageNumber,
    pub mode: QuizMode,
    pub phase: QuizPhase,
    pub current: Question,
    pub cleared_count: usize,
    pub goal: usize,
    pub pass_number: u32,
    /// Questions left in the current pass, including the current one while answering.
    pub remaining: usize,
    pub progress_fraction: f64,
    pub last_result: Option<AnswerResult>,
    pub consecutive_correct: u32,
    pub session_xp: u32,
    pub title: String,
    pub clear_title: String,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_cleared(&self) -> bool {
        self.phase.is_cleared()
    }
}

/// Header shown while the session runs.
#[must_use]
pub(crate) fn session_title(stage: StageNumber) -> String {
    if stage.is_today() {
        "今日の10問".to_string()
    } else {
        format!("ステージ {stage}")
    }
}

/// Headline for the cleared screen.
#[must_use]
pub(crate) fn default_clear_title(stage: StageNumber, mode: QuizMode) -> String {
    if stage.is_today() {
        return "今日の10問 完了！".to_string();
    }
    match mode {
        QuizMode::Quick10 => "クイック完了！".to_string(),
        QuizMode::Exam30 => "模試完了！".to_string(),
        QuizMode::WeakFocus => "復習完了！".to_string(),
        QuizMode::SrsReview => "SRS復習完了！".to_string(),
        QuizMode::Normal => format!("ステージ {stage} クリア！"),
    }
}
