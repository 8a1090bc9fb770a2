use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use oni_core::model::{Question, QuizMode, Stage, StageNumber};
use storage::repository::{ProgressRecorder, RewardRecorder};

use super::service::QuizSession;
use super::today::{PreparedSession, TodayAction, TodayConfig, TodayCurator};
use crate::Clock;
use crate::error::SessionError;

/// Starts sessions with the shared recorders and clock wired in.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    progress: Arc<dyn ProgressRecorder>,
    rewards: Option<Arc<dyn RewardRecorder>>,
    today: TodayCurator,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(clock: Clock, progress: Arc<dyn ProgressRecorder>) -> Self {
        Self {
            clock,
            progress,
            rewards: None,
            today: TodayCurator::default(),
        }
    }

    #[must_use]
    pub fn with_rewards(mut self, rewards: Arc<dyn RewardRecorder>) -> Self {
        self.rewards = Some(rewards);
        self
    }

    #[must_use]
    pub fn with_today_config(mut self, config: TodayConfig) -> Self {
        self.today = TodayCurator::new(config);
        self
    }

    #[must_use]
    pub fn progress(&self) -> &Arc<dyn ProgressRecorder> {
        &self.progress
    }

    /// Modes offered for `stage`. Weak-focus only shows up once the stage has
    /// weak kanji; the SRS placeholder never does.
    #[must_use]
    pub fn available_modes(&self, stage: StageNumber) -> Vec<QuizMode> {
        let has_weak = !self.progress.weak_kanji(stage).is_empty();
        QuizMode::selectable()
            .filter(|mode| has_weak || mode.is_available_without_weak_points())
            .collect()
    }

    /// Start a session over `stage`, looking up its weak kanji first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ModeUnavailable` for the SRS placeholder and
    /// `SessionError::Empty` when nothing is left to ask.
    pub fn start_stage(&self, stage: &Stage, mode: QuizMode) -> Result<QuizSession, SessionError> {
        if mode.is_srs_placeholder() {
            return Err(SessionError::ModeUnavailable(mode));
        }
        let weak = self.progress.weak_kanji(stage.number());
        let session = QuizSession::new(stage, mode, Arc::clone(&self.progress), &weak)?;
        Ok(self.wire(session))
    }

    /// Weak kanji per stage, skipping stages without any.
    #[must_use]
    pub fn weak_by_stage(&self, stages: &[Stage]) -> HashMap<StageNumber, HashSet<String>> {
        stages
            .iter()
            .filter_map(|stage| {
                let weak = self.progress.weak_kanji(stage.number());
                (!weak.is_empty()).then_some((stage.number(), weak))
            })
            .collect()
    }

    /// Deterministic review-or-gentle set for today.
    #[must_use]
    pub fn prepare_today(&self, stages: &[Stage], review_ordered: &[Question]) -> PreparedSession {
        let weak = self.weak_by_stage(stages);
        let prepared = self
            .today
            .build_today_session(stages, &weak, review_ordered);
        tracing::debug!(
            action = ?prepared.action,
            questions = prepared.question_count(),
            "prepared today session"
        );
        prepared
    }

    /// Start a stage-0 session over a prepared list. Review sets also earn
    /// the wrong-note bonus on each correct answer.
    ///
    /// # Errors
    ///
    /// Same as [`QuizLoopService::start_stage`].
    pub fn start_prepared(
        &self,
        prepared: PreparedSession,
        mode: QuizMode,
    ) -> Result<QuizSession, SessionError> {
        let action = prepared.action;
        let session = QuizSession::from_questions(
            StageNumber::TODAY,
            mode,
            prepared.questions,
            Arc::clone(&self.progress),
        )?;
        let session = self.wire(session);
        Ok(match action {
            TodayAction::Review => session.with_wrong_note_bonus(),
            TodayAction::Gentle => session,
        })
    }

    /// Start a stage-0 session over a random blend of weak and fresh questions.
    ///
    /// # Errors
    ///
    /// Same as [`QuizLoopService::start_stage`].
    pub fn start_daily_blend(
        &self,
        stages: &[Stage],
        mode: QuizMode,
    ) -> Result<QuizSession, SessionError> {
        let weak = self.weak_by_stage(stages);
        let cleared: BTreeSet<StageNumber> = stages
            .iter()
            .map(Stage::number)
            .filter(|number| self.progress.is_stage_cleared(*number))
            .collect();
        let stage = self.today.daily_blend_stage(stages, &weak, &cleared);
        let session = QuizSession::new(&stage, mode, Arc::clone(&self.progress), &HashSet::new())?;
        Ok(self.wire(session))
    }

    fn wire(&self, session: QuizSession) -> QuizSession {
        let session = session.with_clock(self.clock);
        match &self.rewards {
            Some(rewards) => session.with_rewards(Arc::clone(rewards)),
            None => session,
        }
    }
}
