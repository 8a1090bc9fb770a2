//! Stage-clear flags and per-stage answer statistics.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use oni_core::Clock;
use oni_core::model::{Question, Stage, StageNumber, StageStats, WrongAnswerEntry};

use crate::repository::{
    AnswerRecord, KeyValueStore, ProgressRecorder, StorageError, read_json, write_json,
};

const CLEARED_KEY: &str = "clearedStages";
const STATS_KEY: &str = "stageStats_v2";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//
// ─── CLEARED STAGES ────────────────────────────────────────────────────────────
//

/// Set of cleared stages, persisted as a JSON array.
pub struct ClearedStages {
    store: Arc<dyn KeyValueStore>,
    cleared: Mutex<BTreeSet<StageNumber>>,
}

impl ClearedStages {
    /// Load the cleared set. Undecodable data is logged and treated as empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let cleared = match read_json::<BTreeSet<StageNumber>>(store.as_ref(), CLEARED_KEY) {
            Ok(found) => found.unwrap_or_default(),
            Err(StorageError::Serialization(err)) => {
                tracing::warn!(%err, "discarding undecodable cleared stages");
                BTreeSet::new()
            }
            Err(err) => return Err(err),
        };
        Ok(Self {
            store,
            cleared: Mutex::new(cleared),
        })
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the updated set cannot be written.
    pub fn mark_cleared(&self, stage: StageNumber) -> Result<(), StorageError> {
        let mut cleared = lock(&self.cleared);
        if cleared.insert(stage) {
            write_json(self.store.as_ref(), CLEARED_KEY, &*cleared)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_cleared(&self, stage: StageNumber) -> bool {
        lock(&self.cleared).contains(&stage)
    }

    /// Stage 1 is always open; later stages open once their predecessor is cleared.
    #[must_use]
    pub fn is_unlocked(&self, stage: StageNumber) -> bool {
        if stage.value() == 1 {
            return true;
        }
        stage.previous().is_some_and(|prev| self.is_cleared(prev))
    }

    #[must_use]
    pub fn cleared(&self) -> BTreeSet<StageNumber> {
        lock(&self.cleared).clone()
    }

    /// Cleared share of `total_stages`, in `0.0..=1.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn overall_progress(&self, total_stages: usize) -> f64 {
        if total_stages == 0 {
            return 0.0;
        }
        let cleared = lock(&self.cleared).len().min(total_stages);
        cleared as f64 / total_stages as f64
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the key cannot be deleted.
    pub fn reset(&self) -> Result<(), StorageError> {
        lock(&self.cleared).clear();
        self.store.remove(CLEARED_KEY)
    }
}

//
// ─── STUDY STATS ───────────────────────────────────────────────────────────────
//

/// Per-stage attempt counts, weak kanji and the wrong-answer notebook.
pub struct StudyStatsRepository {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
    stats: Mutex<BTreeMap<StageNumber, StageStats>>,
}

impl StudyStatsRepository {
    /// Load statistics. Undecodable data is logged and treated as empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    pub fn load(store: Arc<dyn KeyValueStore>, clock: Clock) -> Result<Self, StorageError> {
        let stats = match read_json::<BTreeMap<StageNumber, StageStats>>(store.as_ref(), STATS_KEY)
        {
            Ok(found) => found.unwrap_or_default(),
            Err(StorageError::Serialization(err)) => {
                tracing::warn!(%err, "discarding undecodable stage stats");
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };
        Ok(Self {
            store,
            clock,
            stats: Mutex::new(stats),
        })
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the updated statistics cannot be written.
    pub fn record(&self, answer: AnswerRecord<'_>) -> Result<(), StorageError> {
        let mut stats = lock(&self.stats);
        stats
            .entry(answer.stage)
            .or_insert_with(|| StageStats::new(answer.stage))
            .apply_answer(
                answer.kanji,
                answer.was_correct,
                answer.selected_answer,
                answer.correct_answer,
                self.clock.now(),
            );
        write_json(self.store.as_ref(), STATS_KEY, &*stats)
    }

    #[must_use]
    pub fn stage_stats(&self, stage: StageNumber) -> Option<StageStats> {
        lock(&self.stats).get(&stage).cloned()
    }

    /// Weak kanji of `stage`, oldest miss first.
    #[must_use]
    pub fn weak_kanji(&self, stage: StageNumber) -> Vec<String> {
        lock(&self.stats)
            .get(&stage)
            .map(|s| s.wrong_kanji.clone())
            .unwrap_or_default()
    }

    /// Questions of `stage` whose kanji is currently weak, in stage order.
    #[must_use]
    pub fn weak_questions(&self, stage: &Stage) -> Vec<Question> {
        let weak: HashSet<String> = self.weak_kanji(stage.number()).into_iter().collect();
        stage
            .questions_matching(move |k| weak.contains(k))
            .cloned()
            .collect()
    }

    /// Weak questions across `stages`, most recently missed first, one per kanji.
    #[must_use]
    pub fn review_ordered(&self, stages: &[Stage]) -> Vec<Question> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for entry in self.recent_wrong_answers(usize::MAX) {
            if !seen.insert(entry.kanji.clone()) {
                continue;
            }
            let still_weak = self
                .weak_kanji(entry.stage_number)
                .iter()
                .any(|k| *k == entry.kanji);
            if !still_weak {
                continue;
            }
            let found = stages
                .iter()
                .filter(|s| s.number() == entry.stage_number)
                .flat_map(|s| s.questions().iter())
                .find(|q| q.kanji() == entry.kanji);
            if let Some(question) = found {
                ordered.push(question.clone());
            }
        }
        ordered
    }

    /// Wrong answers across all stages, newest first.
    #[must_use]
    pub fn recent_wrong_answers(&self, limit: usize) -> Vec<WrongAnswerEntry> {
        let stats = lock(&self.stats);
        let mut all: Vec<_> = stats
            .values()
            .flat_map(|s| s.wrong_answer_log.iter().cloned())
            .collect();
        all.sort_by(|a, b| b.date.cmp(&a.date));
        all.truncate(limit);
        all
    }

    /// Wrong answers of one stage, newest first.
    #[must_use]
    pub fn wrong_answer_log(&self, stage: StageNumber, limit: usize) -> Vec<WrongAnswerEntry> {
        let stats = lock(&self.stats);
        let mut entries = stats
            .get(&stage)
            .map(|s| s.wrong_answer_log.clone())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        entries.truncate(limit);
        entries
    }

    #[must_use]
    pub fn has_weak_points(&self) -> bool {
        lock(&self.stats).values().any(|s| !s.wrong_kanji.is_empty())
    }

    #[must_use]
    pub fn total_correct(&self) -> u64 {
        lock(&self.stats)
            .values()
            .map(|s| u64::from(s.correct_attempts))
            .sum()
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn overall_accuracy(&self) -> f64 {
        let stats = lock(&self.stats);
        let total: u64 = stats.values().map(|s| u64::from(s.total_attempts)).sum();
        let correct: u64 = stats.values().map(|s| u64::from(s.correct_attempts)).sum();
        if total == 0 {
            return 0.0;
        }
        correct as f64 / total as f64
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the key cannot be deleted.
    pub fn reset(&self) -> Result<(), StorageError> {
        lock(&self.stats).clear();
        self.store.remove(STATS_KEY)
    }
}

//
// ─── LOCAL PROGRESS ────────────────────────────────────────────────────────────
//

/// Store-backed `ProgressRecorder` used by the app.
pub struct LocalProgress {
    pub cleared: ClearedStages,
    pub stats: StudyStatsRepository,
}

impl LocalProgress {
    /// # Errors
    ///
    /// Returns `StorageError` if either repository cannot be loaded.
    pub fn open(store: Arc<dyn KeyValueStore>, clock: Clock) -> Result<Self, StorageError> {
        Ok(Self {
            cleared: ClearedStages::load(Arc::clone(&store))?,
            stats: StudyStatsRepository::load(store, clock)?,
        })
    }

    /// Forget cleared stages and statistics.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if either key cannot be deleted.
    pub fn reset(&self) -> Result<(), StorageError> {
        self.cleared.reset()?;
        self.stats.reset()
    }
}

impl ProgressRecorder for LocalProgress {
    fn record_answer(&self, answer: AnswerRecord<'_>) {
        if let Err(err) = self.stats.record(answer) {
            tracing::error!(stage = %answer.stage, kanji = answer.kanji, %err, "failed to persist answer");
        }
    }

    fn mark_stage_cleared(&self, stage: StageNumber) {
        match self.cleared.mark_cleared(stage) {
            Ok(()) => tracing::info!(%stage, "stage cleared"),
            Err(err) => tracing::error!(%stage, %err, "failed to persist stage clear"),
        }
    }

    fn is_stage_cleared(&self, stage: StageNumber) -> bool {
        self.cleared.is_cleared(stage)
    }

    fn weak_kanji(&self, stage: StageNumber) -> HashSet<String> {
        self.stats.weak_kanji(stage).into_iter().collect()
    }
}
