mod plan;
mod service;
mod today;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use plan::{
    SessionBuilder, SessionPlan, build_question_list, build_question_list_with_rng,
    dedup_by_kanji,
};
pub use service::QuizSession;
pub use today::{PreparedSession, TodayAction, TodayConfig, TodayCurator};
pub use view::{AnswerResult, QuitRequest, QuizPhase, SessionSnapshot};
pub use workflow::QuizLoopService;
