mod mode;
mod question;
mod stage;
mod stats;

pub use mode::{ModeTraits, QuizMode};
pub use question::{Question, QuestionError};
pub use stage::{EXPECTED_STAGE_SIZE, QuizData, Stage, StageNumber, StageNumberError};
pub use stats::{StageStats, WRONG_ANSWER_LOG_CAP, WrongAnswerEntry};
