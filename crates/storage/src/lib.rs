#![forbid(unsafe_code)]

pub mod file_store;
pub mod loader;
pub mod progress;
pub mod repository;
pub mod rewards;

pub use file_store::FileStore;
pub use loader::{DataLoadError, QuizDataLoader};
pub use progress::{ClearedStages, LocalProgress, StudyStatsRepository};
pub use repository::{
    AnswerRecord, InMemoryStore, KeyValueStore, ProgressRecorder, RewardRecorder, StorageError,
};
pub use rewards::{
    GamificationRepository, LevelCurve, LevelState, Rewards, StreakRepository, StreakSnapshot,
    XpConfig, XpEvent,
};
