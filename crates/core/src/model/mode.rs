use serde::{Deserialize, Serialize};

//
// ─── MODE TRAITS ───────────────────────────────────────────────────────────────
//

/// Behavior switches attached to a [`QuizMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTraits {
    /// Maximum questions drawn for a session; `None` takes the whole pool.
    pub question_limit: Option<usize>,
    /// Permute the pool before the limit is applied.
    pub shuffles_questions: bool,
    /// Wrong answers come back in a later pass, and a clear is persisted.
    pub uses_review_queue: bool,
}

const NORMAL: ModeTraits = ModeTraits {
    question_limit: None,
    shuffles_questions: false,
    uses_review_queue: true,
};

const QUICK10: ModeTraits = ModeTraits {
    question_limit: Some(10),
    shuffles_questions: true,
    uses_review_queue: false,
};

const EXAM30: ModeTraits = ModeTraits {
    question_limit: Some(30),
    shuffles_questions: true,
    uses_review_queue: false,
};

const WEAK_FOCUS: ModeTraits = ModeTraits {
    question_limit: None,
    shuffles_questions: false,
    uses_review_queue: true,
};

const SRS_REVIEW: ModeTraits = ModeTraits {
    question_limit: None,
    shuffles_questions: true,
    uses_review_queue: false,
};

//
// ─── QUIZ MODE ─────────────────────────────────────────────────────────────────
//

/// How a session draws and replays its questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuizMode {
    /// Every question in stage order; wrong answers return until all are correct.
    Normal,
    /// Ten random questions, no replay.
    Quick10,
    /// Thirty random questions, no replay.
    Exam30,
    /// Only previously missed kanji (whole stage when there are none).
    WeakFocus,
    /// Placeholder for spaced repetition. Never offered to learners.
    SrsReview,
}

impl QuizMode {
    pub const ALL: [QuizMode; 5] = [
        QuizMode::Normal,
        QuizMode::Quick10,
        QuizMode::Exam30,
        QuizMode::WeakFocus,
        QuizMode::SrsReview,
    ];

    /// Modes a learner may pick. `SrsReview` is not implemented and never listed.
    pub fn selectable() -> impl Iterator<Item = QuizMode> {
        Self::ALL.into_iter().filter(|m| !m.is_srs_placeholder())
    }

    #[must_use]
    pub fn traits(self) -> &'static ModeTraits {
        match self {
            QuizMode::Normal => &NORMAL,
            QuizMode::Quick10 => &QUICK10,
            QuizMode::Exam30 => &EXAM30,
            QuizMode::WeakFocus => &WEAK_FOCUS,
            QuizMode::SrsReview => &SRS_REVIEW,
        }
    }

    #[must_use]
    pub fn question_limit(self) -> Option<usize> {
        self.traits().question_limit
    }

    #[must_use]
    pub fn shuffles_questions(self) -> bool {
        self.traits().shuffles_questions
    }

    #[must_use]
    pub fn uses_review_queue(self) -> bool {
        self.traits().uses_review_queue
    }

    #[must_use]
    pub fn is_srs_placeholder(self) -> bool {
        self == QuizMode::SrsReview
    }

    /// Weak-focus needs recorded mistakes to be meaningful; every other mode does not.
    #[must_use]
    pub fn is_available_without_weak_points(self) -> bool {
        self != QuizMode::WeakFocus
    }

    /// Stable identifier, matching the serde name.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            QuizMode::Normal => "normal",
            QuizMode::Quick10 => "quick10",
            QuizMode::Exam30 => "exam30",
            QuizMode::WeakFocus => "weakFocus",
            QuizMode::SrsReview => "srsReview",
        }
    }

    /// Parse a mode key. Only selectable modes are accepted.
    #[must_use]
    pub fn from_key(key: &str) -> Option<QuizMode> {
        Self::selectable().find(|m| m.key().eq_ignore_ascii_case(key))
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            QuizMode::Normal => "ノーマル",
            QuizMode::Quick10 => "クイック10問",
            QuizMode::Exam30 => "模試30問",
            QuizMode::WeakFocus => "苦手集中",
            QuizMode::SrsReview => "SRS復習",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            QuizMode::Normal => "全問正解を目指す標準モード。誤答は繰り返し出題されます。",
            QuizMode::Quick10 => "ランダムな10問を素早く解く短時間モード。",
            QuizMode::Exam30 => "ランダム30問。誤答の再出題なし。実力をテストします。",
            QuizMode::WeakFocus => "苦手な問題だけを集中的に練習します。",
            QuizMode::SrsReview => "Coming soon: 間隔反復アルゴリズムによる復習。",
        }
    }
}
