//! XP, levels and the daily streak.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use oni_core::Clock;
use serde::{Deserialize, Serialize};

use crate::repository::{KeyValueStore, RewardRecorder, StorageError, read_json, write_json};

const XP_KEY: &str = "gamification_v2";
const STREAK_KEY: &str = "streak_v2";

/// Correct answers that satisfy the daily goal.
pub const DAILY_GOAL_QUESTIONS: u32 = 10;
/// Study seconds that satisfy the daily goal.
pub const DAILY_GOAL_SECONDS: f64 = 120.0;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn load_or_default<T>(store: &dyn KeyValueStore, key: &str) -> Result<T, StorageError>
where
    T: Default + serde::de::DeserializeOwned,
{
    match read_json::<T>(store, key) {
        Ok(found) => Ok(found.unwrap_or_default()),
        Err(StorageError::Serialization(err)) => {
            tracing::warn!(key, %err, "discarding undecodable reward data");
            Ok(T::default())
        }
        Err(err) => Err(err),
    }
}

//
// ─── XP ────────────────────────────────────────────────────────────────────────
//

/// Ways to earn XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XpEvent {
    CorrectAnswer,
    SessionComplete,
    WrongNoteRetrieved,
    /// Every third consecutive correct answer.
    ComboBonus,
}

/// Points per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpConfig {
    pub correct_answer: u32,
    pub session_complete: u32,
    pub wrong_note_retrieved: u32,
    pub combo_bonus: u32,
}

impl Default for XpConfig {
    fn default() -> Self {
        Self {
            correct_answer: 5,
            session_complete: 20,
            wrong_note_retrieved: 3,
            combo_bonus: 2,
        }
    }
}

impl XpConfig {
    #[must_use]
    pub fn points(&self, event: XpEvent) -> u32 {
        match event {
            XpEvent::CorrectAnswer => self.correct_answer,
            XpEvent::SessionComplete => self.session_complete,
            XpEvent::WrongNoteRetrieved => self.wrong_note_retrieved,
            XpEvent::ComboBonus => self.combo_bonus,
        }
    }
}

/// XP needed to go from a level to the next.
#[derive(Debug, Clone, Copy)]
pub struct LevelCurve {
    required: fn(u32) -> u64,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self {
            required: |level| 60 + u64::from(level.saturating_sub(1)) * 20,
        }
    }
}

impl LevelCurve {
    #[must_use]
    pub fn new(required: fn(u32) -> u64) -> Self {
        Self { required }
    }

    /// XP to advance from `level` (1-based); never below 1.
    #[must_use]
    pub fn required_xp(&self, level: u32) -> u64 {
        (self.required)(level.max(1)).max(1)
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn level_state(&self, total_xp: u64) -> LevelState {
        let mut remaining = total_xp;
        let mut level = 1_u32;
        loop {
            let required = self.required_xp(level);
            if remaining < required {
                return LevelState {
                    level,
                    xp_in_level: remaining,
                    xp_to_next: required,
                    progress: (remaining as f64 / required as f64).clamp(0.0, 1.0),
                };
            }
            remaining -= required;
            level = level.saturating_add(1);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelState {
    pub level: u32,
    pub xp_in_level: u64,
    pub xp_to_next: u64,
    /// Fraction of the current level completed, `0.0..=1.0`.
    pub progress: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct XpData {
    total_xp: u64,
    today_xp: u64,
    last_xp_date: Option<DateTime<Utc>>,
}

/// Accumulated XP with a per-day counter.
pub struct GamificationRepository {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
    config: XpConfig,
    curve: LevelCurve,
    data: Mutex<XpData>,
}

impl GamificationRepository {
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    pub fn load(store: Arc<dyn KeyValueStore>, clock: Clock) -> Result<Self, StorageError> {
        let mut data: XpData = load_or_default(store.as_ref(), XP_KEY)?;
        Self::roll_over(&mut data, clock.today());
        Ok(Self {
            store,
            clock,
            config: XpConfig::default(),
            curve: LevelCurve::default(),
            data: Mutex::new(data),
        })
    }

    #[must_use]
    pub fn with_config(mut self, config: XpConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_level_curve(mut self, curve: LevelCurve) -> Self {
        self.curve = curve;
        self
    }

    fn roll_over(data: &mut XpData, today: NaiveDate) {
        if data.last_xp_date.is_some_and(|last| last.date_naive() < today) {
            data.today_xp = 0;
        }
    }

    /// Award XP for `event` and return the points added.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the new totals cannot be written; nothing is
    /// awarded in that case.
    pub fn add_xp(&self, event: XpEvent) -> Result<u32, StorageError> {
        let points = self.config.points(event);
        let now = self.clock.now();
        let mut data = lock(&self.data);
        let mut next = data.clone();
        Self::roll_over(&mut next, now.date_naive());
        next.total_xp = next.total_xp.saturating_add(u64::from(points));
        next.today_xp = next.today_xp.saturating_add(u64::from(points));
        next.last_xp_date = Some(now);
        write_json(self.store.as_ref(), XP_KEY, &next)?;
        *data = next;
        tracing::info!(points, ?event, total = data.total_xp, "xp awarded");
        Ok(points)
    }

    #[must_use]
    pub fn total_xp(&self) -> u64 {
        lock(&self.data).total_xp
    }

    #[must_use]
    pub fn today_xp(&self) -> u64 {
        let mut data = lock(&self.data).clone();
        Self::roll_over(&mut data, self.clock.today());
        data.today_xp
    }

    #[must_use]
    pub fn level_state(&self) -> LevelState {
        self.curve.level_state(self.total_xp())
    }
}

//
// ─── STREAK ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StreakData {
    current_streak: u32,
    longest_streak: u32,
    /// Day the daily goal was last met.
    last_study_date: Option<NaiveDate>,
    /// Day the `today_*` counters belong to.
    counters_date: Option<NaiveDate>,
    today_completed: bool,
    today_answer_count: u32,
    today_study_seconds: f64,
    /// One freeze per month bridges a single missed day.
    freeze_count: u32,
    freeze_grant_month: Option<String>,
}

impl Default for StreakData {
    fn default() -> Self {
        Self {
            current_streak: 0,
            longest_streak: 0,
            last_study_date: None,
            counters_date: None,
            today_completed: false,
            today_answer_count: 0,
            today_study_seconds: 0.0,
            freeze_count: 1,
            freeze_grant_month: None,
        }
    }
}

impl StreakData {
    /// Bring the record up to `today`. Returns true when a freeze was spent.
    fn roll_over(&mut self, today: NaiveDate) -> bool {
        let month = today.format("%Y-%m").to_string();
        if self.freeze_grant_month.as_deref() != Some(month.as_str()) {
            self.freeze_grant_month = Some(month);
            self.freeze_count = self.freeze_count.max(1);
        }

        let mut froze = false;
        if let (Some(last), Some(yesterday)) = (self.last_study_date, today.pred_opt()) {
            if last < yesterday {
                if self.freeze_count > 0 {
                    self.freeze_count -= 1;
                    self.last_study_date = Some(yesterday);
                    froze = true;
                } else {
                    self.current_streak = 0;
                }
            }
        }

        if self.counters_date != Some(today) {
            self.counters_date = Some(today);
            self.today_completed = false;
            self.today_answer_count = 0;
            self.today_study_seconds = 0.0;
        }
        froze
    }

    fn check_completed(&mut self, today: NaiveDate) {
        if self.today_completed {
            return;
        }
        let met = self.today_answer_count >= DAILY_GOAL_QUESTIONS
            || self.today_study_seconds >= DAILY_GOAL_SECONDS;
        if !met {
            return;
        }
        self.today_completed = true;

        match self.last_study_date {
            Some(last) if last == today => return,
            Some(last) if Some(last) == today.pred_opt() => {
                self.current_streak = self.current_streak.saturating_add(1);
            }
            _ => self.current_streak = 1,
        }
        self.last_study_date = Some(today);
        self.longest_streak = self.longest_streak.max(self.current_streak);
        tracing::info!(streak = self.current_streak, "streak updated");
    }
}

/// Read-only view of the streak for display.
#[derive(Debug, Clone, PartialEq)]
pub struct StreakSnapshot {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub today_completed: bool,
    pub today_answer_count: u32,
    pub today_study_seconds: f64,
    pub freeze_count: u32,
}

/// Consecutive days on which the daily goal was met.
pub struct StreakRepository {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
    data: Mutex<StreakData>,
}

impl StreakRepository {
    /// Load the streak and repair it for today (new-day reset, gap handling).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read or the repaired record
    /// cannot be written.
    pub fn load(store: Arc<dyn KeyValueStore>, clock: Clock) -> Result<Self, StorageError> {
        let mut data: StreakData = load_or_default(store.as_ref(), STREAK_KEY)?;
        if data.roll_over(clock.today()) {
            tracing::info!(remaining = data.freeze_count, "streak freeze consumed");
        }
        write_json(store.as_ref(), STREAK_KEY, &data)?;
        Ok(Self {
            store,
            clock,
            data: Mutex::new(data),
        })
    }

    fn update(&self, apply: impl FnOnce(&mut StreakData, NaiveDate)) -> Result<(), StorageError> {
        let today = self.clock.today();
        let mut data = lock(&self.data);
        let mut next = data.clone();
        if next.roll_over(today) {
            tracing::info!(remaining = next.freeze_count, "streak freeze consumed");
        }
        apply(&mut next, today);
        next.check_completed(today);
        write_json(self.store.as_ref(), STREAK_KEY, &next)?;
        *data = next;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    pub fn record_correct_answer(&self) -> Result<(), StorageError> {
        self.update(|data, _| {
            data.today_answer_count = data.today_answer_count.saturating_add(1);
        })
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    #[allow(clippy::cast_precision_loss)]
    pub fn add_study_time(&self, elapsed: Duration) -> Result<(), StorageError> {
        let seconds = (elapsed.num_milliseconds().max(0) as f64) / 1000.0;
        self.update(|data, _| data.today_study_seconds += seconds)
    }

    #[must_use]
    pub fn snapshot(&self) -> StreakSnapshot {
        let data = lock(&self.data);
        StreakSnapshot {
            current_streak: data.current_streak,
            longest_streak: data.longest_streak,
            today_completed: data.today_completed,
            today_answer_count: data.today_answer_count,
            today_study_seconds: data.today_study_seconds,
            freeze_count: data.freeze_count,
        }
    }
}

//
// ─── REWARDS ───────────────────────────────────────────────────────────────────
//

/// Store-backed `RewardRecorder` combining XP and streak.
pub struct Rewards {
    pub xp: GamificationRepository,
    pub streak: StreakRepository,
}

impl Rewards {
    /// # Errors
    ///
    /// Returns `StorageError` if either repository cannot be loaded.
    pub fn open(store: Arc<dyn KeyValueStore>, clock: Clock) -> Result<Self, StorageError> {
        Ok(Self {
            xp: GamificationRepository::load(Arc::clone(&store), clock)?,
            streak: StreakRepository::load(store, clock)?,
        })
    }
}

impl RewardRecorder for Rewards {
    fn add_xp(&self, event: XpEvent) -> u32 {
        self.xp.add_xp(event).unwrap_or_else(|err| {
            tracing::error!(?event, %err, "failed to persist xp");
            0
        })
    }

    fn record_correct_answer(&self) {
        if let Err(err) = self.streak.record_correct_answer() {
            tracing::error!(%err, "failed to persist streak answer");
        }
    }

    fn add_study_time(&self, elapsed: Duration) {
        if let Err(err) = self.streak.add_study_time(elapsed) {
            tracing::error!(%err, "failed to persist study time");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryStore;
    use oni_core::time::fixed_clock;

    fn shared_store() -> Arc<dyn KeyValueStore> {
        Arc::new(InMemoryStore::new())
    }

    #[test]
    fn default_curve_levels() {
        let curve = LevelCurve::default();
        assert_eq!(curve.required_xp(1), 60);
        assert_eq!(curve.required_xp(2), 80);

        let state = curve.level_state(0);
        assert_eq!((state.level, state.xp_in_level, state.xp_to_next), (1, 0, 60));

        let state = curve.level_state(60 + 80 + 10);
        assert_eq!((state.level, state.xp_in_level, state.xp_to_next), (3, 10, 100));
        assert!((state.progress - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn xp_accumulates_and_today_resets_next_day() {
        let store = shared_store();
        let mut clock = fixed_clock();
        let repo = GamificationRepository::load(Arc::clone(&store), clock).unwrap();
        assert_eq!(repo.add_xp(XpEvent::CorrectAnswer).unwrap(), 5);
        assert_eq!(repo.add_xp(XpEvent::SessionComplete).unwrap(), 20);
        assert_eq!(repo.total_xp(), 25);
        assert_eq!(repo.today_xp(), 25);

        clock.advance(Duration::days(1));
        let reloaded = GamificationRepository::load(store, clock).unwrap();
        assert_eq!(reloaded.total_xp(), 25);
        assert_eq!(reloaded.today_xp(), 0);
    }

    #[test]
    fn custom_points_and_curve_drive_levels() {
        let config = XpConfig {
            wrong_note_retrieved: 10,
            ..XpConfig::default()
        };
        let repo = GamificationRepository::load(shared_store(), fixed_clock())
            .unwrap()
            .with_config(config)
            .with_level_curve(LevelCurve::new(|_| 10));

        assert_eq!(repo.add_xp(XpEvent::WrongNoteRetrieved).unwrap(), 10);
        assert_eq!(repo.add_xp(XpEvent::CorrectAnswer).unwrap(), 5);
        let state = repo.level_state();
        assert_eq!((state.level, state.xp_in_level, state.xp_to_next), (2, 5, 10));
    }

    #[test]
    fn daily_goal_by_answers_starts_streak_once() {
        let repo = StreakRepository::load(shared_store(), fixed_clock()).unwrap();
        for _ in 0..(DAILY_GOAL_QUESTIONS * 2) {
            repo.record_correct_answer().unwrap();
        }
        let snap = repo.snapshot();
        assert!(snap.today_completed);
        assert_eq!(snap.current_streak, 1);
        assert_eq!(snap.longest_streak, 1);
    }

    #[test]
    fn study_time_extends_streak_on_consecutive_days() {
        let store = shared_store();
        let mut clock = fixed_clock();
        StreakRepository::load(Arc::clone(&store), clock)
            .unwrap()
            .add_study_time(Duration::seconds(150))
            .unwrap();

        clock.advance(Duration::days(1));
        let repo = StreakRepository::load(Arc::clone(&store), clock).unwrap();
        assert!(!repo.snapshot().today_completed);
        repo.add_study_time(Duration::seconds(60)).unwrap();
        repo.add_study_time(Duration::seconds(60)).unwrap();
        assert_eq!(repo.snapshot().current_streak, 2);
    }

    #[test]
    fn missed_day_spends_freeze_then_breaks_streak() {
        let store = shared_store();
        let mut clock = fixed_clock();
        StreakRepository::load(Arc::clone(&store), clock)
            .unwrap()
            .add_study_time(Duration::seconds(200))
            .unwrap();

        clock.advance(Duration::days(2));
        let repo = StreakRepository::load(Arc::clone(&store), clock).unwrap();
        let snap = repo.snapshot();
        assert_eq!(snap.freeze_count, 0);
        assert_eq!(snap.current_streak, 1);

        clock.advance(Duration::days(2));
        let repo = StreakRepository::load(store, clock).unwrap();
        assert_eq!(repo.snapshot().current_streak, 0);
    }

    #[test]
    fn rewards_recorder_reports_points() {
        let rewards = Rewards::open(shared_store(), fixed_clock()).unwrap();
        let recorder: &dyn RewardRecorder = &rewards;
        assert_eq!(recorder.add_xp(XpEvent::ComboBonus), 2);
        recorder.record_correct_answer();
        assert_eq!(rewards.streak.snapshot().today_answer_count, 1);
    }
}
