#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use oni_core::Clock;
pub use sessions as session;

pub use error::SessionError;
pub use sessions::{
    AnswerResult, PreparedSession, QuitRequest, QuizLoopService, QuizPhase, QuizSession,
    SessionBuilder, SessionPlan, SessionSnapshot, TodayAction, TodayConfig, TodayCurator,
    build_question_list, dedup_by_kanji,
};
