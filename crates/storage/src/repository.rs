use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Duration;
use oni_core::model::StageNumber;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::rewards::XpEvent;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//
// ─── KEY-VALUE STORE ───────────────────────────────────────────────────────────
//

/// Raw bytes by string key. Values are opaque to the store.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value for `key`, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Delete every key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Decode a JSON value stored under `key`.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the bytes are not valid JSON for `T`.
pub fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode `value` as JSON under `key`.
///
/// # Errors
///
/// Returns `StorageError` if encoding or the write fails.
pub fn write_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec(value)?;
    store.set(key, &bytes)
}

/// In-memory store for tests and ephemeral sessions. Clones share contents.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.clear();
        Ok(())
    }
}

//
// ─── RECORDER HOOKS ────────────────────────────────────────────────────────────
//

/// One graded answer as reported by a quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerRecord<'a> {
    pub stage: StageNumber,
    pub kanji: &'a str,
    pub was_correct: bool,
    pub selected_answer: &'a str,
    pub correct_answer: &'a str,
}

/// Sink for session outcomes that outlive a session.
///
/// Calls are fire-and-forget: implementations handle and log their own
/// persistence failures, and sessions never retry.
pub trait ProgressRecorder: Send + Sync {
    fn record_answer(&self, answer: AnswerRecord<'_>);

    fn mark_stage_cleared(&self, stage: StageNumber);

    fn is_stage_cleared(&self, stage: StageNumber) -> bool;

    /// Kanji of `stage` answered wrong and not yet answered right since.
    fn weak_kanji(&self, stage: StageNumber) -> HashSet<String>;
}

/// XP and streak hooks. Optional for sessions.
pub trait RewardRecorder: Send + Sync {
    /// Award XP and return the points actually added.
    fn add_xp(&self, event: XpEvent) -> u32;

    fn record_correct_answer(&self);

    fn add_study_time(&self, elapsed: Duration);
}
