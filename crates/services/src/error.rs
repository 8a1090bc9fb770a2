//! Shared error types for the services crate.

use thiserror::Error;

use oni_core::model::QuizMode;

/// Errors emitted when starting a quiz session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,
    #[error("quiz mode '{}' is not available", .0.key())]
    ModeUnavailable(QuizMode),
}
