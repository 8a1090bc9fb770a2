use chrono::{DateTime, Utc};
use rand::Rng;
use rand::rng;
use rand::seq::SliceRandom;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use oni_core::model::{Question, QuizMode, Stage, StageNumber};
use storage::repository::{AnswerRecord, ProgressRecorder, RewardRecorder};
use storage::rewards::XpEvent;

use super::plan::{SessionBuilder, dedup_by_kanji};
use super::view::{
    AnswerResult, QuitRequest, QuizPhase, SessionSnapshot, default_clear_title, session_title,
};
use crate::Clock;
use crate::error::SessionError;

/// Consecutive correct answers that earn a combo bonus.
const COMBO_STEP: u32 = 3;

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Phase-driven quiz over one stage or curated pool.
///
/// Wrong answers are queued for a further pass in modes with a review queue.
/// The session clears once every distinct kanji was answered correctly, or
/// when the pool runs out in modes without a review queue.
pub struct QuizSession {
    stage_number: StageNumber,
    mode: QuizMode,
    questions: Vec<Question>,
    /// Reset reorders `questions` instead of replaying them.
    reshuffle_on_reset: bool,
    /// Correct answers also earn `XpEvent::WrongNoteRetrieved`.
    wrong_note_bonus: bool,
    pending: VecDeque<Question>,
    review: Vec<Question>,
    cleared: HashSet<String>,
    goal: usize,
    pass_number: u32,
    current: Question,
    phase: QuizPhase,
    last_result: Option<AnswerResult>,
    consecutive_correct: u32,
    session_xp: u32,
    clear_title: String,
    clock: Clock,
    started_at: DateTime<Utc>,
    progress: Arc<dyn ProgressRecorder>,
    rewards: Option<Arc<dyn RewardRecorder>>,
}

impl QuizSession {
    /// Start a session over `stage` in `mode`.
    ///
    /// Stage 0 pools are curated elsewhere and used as given (deduplicated);
    /// other stages go through [`SessionBuilder`] with `weak_kanji`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ModeUnavailable` for the SRS placeholder and
    /// `SessionError::Empty` if no question survives selection.
    pub fn new(
        stage: &Stage,
        mode: QuizMode,
        progress: Arc<dyn ProgressRecorder>,
        weak_kanji: &HashSet<String>,
    ) -> Result<Self, SessionError> {
        if stage.number().is_today() {
            return Self::from_questions(stage.number(), mode, stage.questions().to_vec(), progress);
        }
        let questions = SessionBuilder::new(mode)
            .with_weak_kanji(weak_kanji)
            .build(stage.questions())
            .questions;
        let reshuffle = mode.shuffles_questions();
        Self::start(stage.number(), mode, reshuffle, questions, progress)
    }

    /// Start a session over an already-ordered list, without mode filtering
    /// or shuffling.
    ///
    /// # Errors
    ///
    /// Same as [`QuizSession::new`].
    pub fn from_questions(
        stage_number: StageNumber,
        mode: QuizMode,
        questions: Vec<Question>,
        progress: Arc<dyn ProgressRecorder>,
    ) -> Result<Self, SessionError> {
        let questions = dedup_by_kanji(&questions);
        Self::start(stage_number, mode, false, questions, progress)
    }

    fn start(
        stage_number: StageNumber,
        mode: QuizMode,
        reshuffle_on_reset: bool,
        questions: Vec<Question>,
        progress: Arc<dyn ProgressRecorder>,
    ) -> Result<Self, SessionError> {
        if mode.is_srs_placeholder() {
            return Err(SessionError::ModeUnavailable(mode));
        }
        let Some(first) = questions.first().cloned() else {
            tracing::warn!(stage = %stage_number, mode = mode.key(), "session has no questions");
            return Err(SessionError::Empty);
        };
        let clock = Clock::default();
        let started_at = clock.now();
        tracing::debug!(
            stage = %stage_number,
            mode = mode.key(),
            goal = questions.len(),
            "session started"
        );

        Ok(Self {
            stage_number,
            mode,
            reshuffle_on_reset,
            wrong_note_bonus: false,
            goal: questions.len(),
            pending: questions.iter().cloned().collect(),
            questions,
            review: Vec::new(),
            cleared: HashSet::new(),
            pass_number: 1,
            current: first,
            phase: QuizPhase::Answering,
            last_result: None,
            consecutive_correct: 0,
            session_xp: 0,
            clear_title: default_clear_title(stage_number, mode),
            clock,
            started_at,
            progress,
            rewards: None,
        })
    }

    /// Use `clock` for study-time measurement.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.started_at = clock.now();
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_rewards(mut self, rewards: Arc<dyn RewardRecorder>) -> Self {
        self.rewards = Some(rewards);
        self
    }

    /// Award `XpEvent::WrongNoteRetrieved` on top of the usual XP for each
    /// correct answer. Used when every question is a past mistake.
    #[must_use]
    pub fn with_wrong_note_bonus(mut self) -> Self {
        self.wrong_note_bonus = true;
        self
    }

    #[must_use]
    pub fn with_clear_title(mut self, title: impl Into<String>) -> Self {
        self.clear_title = title.into();
        self
    }

    // ─── Accessors ─────────────────────────────────────────────────────────────

    #[must_use]
    pub fn stage_number(&self) -> StageNumber {
        self.stage_number
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn phase(&self) -> &QuizPhase {
        &self.phase
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.current
    }

    /// Questions the session was built with, in their first-pass order.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn goal(&self) -> usize {
        self.goal
    }

    #[must_use]
    pub fn cleared_count(&self) -> usize {
        self.cleared.len()
    }

    #[must_use]
    pub fn pass_number(&self) -> u32 {
        self.pass_number
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Kanji waiting for the next pass.
    #[must_use]
    pub fn review_queue(&self) -> Vec<&str> {
        self.review.iter().map(Question::kanji).collect()
    }

    #[must_use]
    pub fn is_cleared(&self) -> bool {
        self.phase.is_cleared()
    }

    #[must_use]
    pub fn session_xp(&self) -> u32 {
        self.session_xp
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_fraction(&self) -> f64 {
        if self.goal == 0 {
            return 0.0;
        }
        self.cleared.len() as f64 / self.goal as f64
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stage_number: self.stage_number,
            mode: self.mode,
            phase: self.phase.clone(),
            current: self.current.clone(),
            cleared_count: self.cleared.len(),
            goal: self.goal,
            pass_number: self.pass_number,
            remaining: self.pending.len(),
            progress_fraction: self.progress_fraction(),
            last_result: self.last_result,
            consecutive_correct: self.consecutive_correct,
            session_xp: self.session_xp,
            title: session_title(self.stage_number),
            clear_title: self.clear_title.clone(),
        }
    }

    // ─── Commands ──────────────────────────────────────────────────────────────

    /// Answer the current question with `selected`.
    ///
    /// Ignored outside the answering phase.
    pub fn answer(&mut self, selected: &str) -> AnswerResult {
        if !self.phase.is_answering() {
            return AnswerResult::Ignored;
        }

        let question = self.current.clone();
        let was_correct = question.is_correct(selected);
        self.progress.record_answer(AnswerRecord {
            stage: self.stage_number,
            kanji: question.kanji(),
            was_correct,
            selected_answer: selected,
            correct_answer: question.answer(),
        });
        self.pending.pop_front();

        let result = if was_correct {
            self.on_correct(&question);
            AnswerResult::Correct
        } else {
            self.on_wrong(question);
            AnswerResult::Wrong
        };
        self.last_result = Some(result);
        result
    }

    fn on_correct(&mut self, question: &Question) {
        self.consecutive_correct += 1;
        self.cleared.insert(question.kanji().to_owned());
        self.award(XpEvent::CorrectAnswer);
        if self.wrong_note_bonus {
            self.award(XpEvent::WrongNoteRetrieved);
        }
        if self.consecutive_correct % COMBO_STEP == 0 {
            self.award(XpEvent::ComboBonus);
        }
        if let Some(rewards) = &self.rewards {
            rewards.record_correct_answer();
        }

        if self.cleared.len() >= self.goal {
            self.finish();
        } else {
            self.phase = QuizPhase::ShowingExplanation;
        }
    }

    fn on_wrong(&mut self, question: Question) {
        self.consecutive_correct = 0;
        let correct_answer = question.answer().to_owned();
        if self.mode.uses_review_queue() && !self.review.iter().any(|q| q.same_kanji(&question)) {
            tracing::debug!(kanji = question.kanji(), "queued for review");
            self.review.push(question);
        }
        self.phase = QuizPhase::ShowingWrongAnswer { correct_answer };
    }

    /// Leave the explanation or wrong-answer screen.
    ///
    /// Ignored while answering or after the clear.
    pub fn proceed(&mut self) {
        if !self.phase.awaits_proceed() {
            return;
        }
        self.last_result = None;

        if let Some(next) = self.pending.front() {
            self.current = next.clone();
            self.phase = QuizPhase::Answering;
            return;
        }

        if self.review.is_empty() || !self.mode.uses_review_queue() {
            self.finish();
            return;
        }

        self.pending = std::mem::take(&mut self.review).into();
        self.pass_number += 1;
        tracing::debug!(
            stage = %self.stage_number,
            pass = self.pass_number,
            questions = self.pending.len(),
            "review pass started"
        );
        if let Some(next) = self.pending.front() {
            self.current = next.clone();
        }
        self.phase = QuizPhase::Answering;
    }

    /// Start over on the questions the session was built with.
    ///
    /// The question set and `goal` never change. Shuffling modes get a new
    /// order; everything else replays the original order.
    pub fn reset_game(&mut self) {
        self.reset_game_with_rng(&mut rng());
    }

    /// [`QuizSession::reset_game`] with a caller-supplied RNG.
    pub fn reset_game_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order = self.questions.clone();
        if self.reshuffle_on_reset {
            order.shuffle(rng);
        }
        let Some(first) = order.first().cloned() else {
            return;
        };

        self.pending = order.into();
        self.review.clear();
        self.cleared.clear();
        self.pass_number = 1;
        self.current = first;
        self.phase = QuizPhase::Answering;
        self.last_result = None;
        self.consecutive_correct = 0;
        self.session_xp = 0;
        self.started_at = self.clock.now();
        tracing::debug!(stage = %self.stage_number, "session reset");
    }

    /// Whether leaving now needs confirmation.
    #[must_use]
    pub fn request_quit(&self) -> QuitRequest {
        if self.phase.is_cleared() {
            QuitRequest::Leave
        } else {
            QuitRequest::ConfirmQuit
        }
    }

    /// Persist the clear when the mode allows it and award completion rewards.
    fn finish(&mut self) {
        let persists = self.mode.uses_review_queue() && !self.stage_number.is_today();
        if persists {
            self.progress.mark_stage_cleared(self.stage_number);
        }
        self.award(XpEvent::SessionComplete);
        if let Some(rewards) = &self.rewards {
            let elapsed = self.clock.now() - self.started_at;
            rewards.add_study_time(elapsed);
        }
        self.phase = QuizPhase::StageCleared;
        tracing::info!(
            stage = %self.stage_number,
            mode = self.mode.key(),
            passes = self.pass_number,
            persisted = persists,
            xp = self.session_xp,
            "session cleared"
        );
    }

    fn award(&mut self, event: XpEvent) {
        if let Some(rewards) = &self.rewards {
            self.session_xp += rewards.add_xp(event);
        }
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("stage_number", &self.stage_number)
            .field("mode", &self.mode)
            .field("phase", &self.phase)
            .field("current", &self.current.kanji())
            .field("cleared", &self.cleared.len())
            .field("goal", &self.goal)
            .field("pass_number", &self.pass_number)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use oni_core::time::fixed_clock;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Mutex;

    #[derive(Default)]
    struct SpyRecorder {
        answers: Mutex<Vec<(StageNumber, String, bool)>>,
        cleared: Mutex<Vec<StageNumber>>,
        weak: Mutex<HashSet<String>>,
    }

    impl SpyRecorder {
        fn answers(&self) -> Vec<(StageNumber, String, bool)> {
            self.answers.lock().unwrap().clone()
        }

        fn cleared(&self) -> Vec<StageNumber> {
            self.cleared.lock().unwrap().clone()
        }
    }

    impl ProgressRecorder for SpyRecorder {
        fn record_answer(&self, answer: AnswerRecord<'_>) {
            self.answers.lock().unwrap().push((
                answer.stage,
                answer.kanji.to_owned(),
                answer.was_correct,
            ));
        }

        fn mark_stage_cleared(&self, stage: StageNumber) {
            self.cleared.lock().unwrap().push(stage);
        }

        fn is_stage_cleared(&self, stage: StageNumber) -> bool {
            self.cleared.lock().unwrap().contains(&stage)
        }

        fn weak_kanji(&self, _stage: StageNumber) -> HashSet<String> {
            self.weak.lock().unwrap().clone()
        }
    }

    #[derive(Default)]
    struct SpyRewards {
        events: Mutex<Vec<XpEvent>>,
        correct: Mutex<u32>,
        study: Mutex<Vec<chrono::Duration>>,
    }

    impl RewardRecorder for SpyRewards {
        fn add_xp(&self, event: XpEvent) -> u32 {
            self.events.lock().unwrap().push(event);
            match event {
                XpEvent::CorrectAnswer => 5,
                XpEvent::SessionComplete => 20,
                XpEvent::WrongNoteRetrieved => 3,
                XpEvent::ComboBonus => 2,
            }
        }

        fn record_correct_answer(&self) {
            *self.correct.lock().unwrap() += 1;
        }

        fn add_study_time(&self, elapsed: chrono::Duration) {
            self.study.lock().unwrap().push(elapsed);
        }
    }

    fn q(kanji: &str, answer: &str) -> Question {
        Question::new(kanji, vec![answer.into(), "はずれ".into()], answer, "")
    }

    fn sample_stage() -> Stage {
        Stage::new(
            StageNumber::new(1),
            vec![q("燎", "かがりび"), q("逞", "たくましい"), q("慧", "さとい")],
        )
    }

    fn session(mode: QuizMode) -> (QuizSession, Arc<SpyRecorder>) {
        let spy = Arc::new(SpyRecorder::default());
        let session = QuizSession::new(&sample_stage(), mode, spy.clone(), &HashSet::new())
            .unwrap()
            .with_clock(fixed_clock());
        (session, spy)
    }

    fn unshuffled_session(mode: QuizMode) -> (QuizSession, Arc<SpyRecorder>) {
        let spy = Arc::new(SpyRecorder::default());
        let stage = sample_stage();
        let session = QuizSession::from_questions(
            stage.number(),
            mode,
            stage.questions().to_vec(),
            spy.clone(),
        )
        .unwrap();
        (session, spy)
    }

    #[test]
    fn normal_mode_requeues_wrong_answer_and_persists_clear() {
        let (mut s, spy) = session(QuizMode::Normal);

        assert_eq!(s.current_question().kanji(), "燎");
        assert_eq!(s.answer("はずれ"), AnswerResult::Wrong);
        assert_eq!(
            s.phase(),
            &QuizPhase::ShowingWrongAnswer {
                correct_answer: "かがりび".into()
            }
        );
        assert_eq!(s.cleared_count(), 0);

        s.proceed();
        assert_eq!(s.current_question().kanji(), "逞");
        assert_eq!(s.answer("たくましい"), AnswerResult::Correct);
        s.proceed();
        assert_eq!(s.answer("さとい"), AnswerResult::Correct);
        assert_eq!(s.phase(), &QuizPhase::ShowingExplanation);
        assert_eq!(s.cleared_count(), 2);

        s.proceed();
        assert_eq!(s.pass_number(), 2);
        assert_eq!(s.current_question().kanji(), "燎");
        assert!(s.review_queue().is_empty());

        assert_eq!(s.answer("かがりび"), AnswerResult::Correct);
        assert!(s.is_cleared());
        assert_eq!(spy.cleared(), vec![StageNumber::new(1)]);
        assert_eq!(spy.answers().len(), 4);
    }

    #[test]
    fn exam_mode_never_requeues_or_persists() {
        let (mut s, spy) = unshuffled_session(QuizMode::Exam30);

        s.answer("はずれ");
        assert!(s.review_queue().is_empty());
        s.proceed();
        assert_eq!(s.current_question().kanji(), "逞");
        s.answer("たくましい");
        s.proceed();
        s.answer("さとい");
        assert_eq!(s.phase(), &QuizPhase::ShowingExplanation);
        s.proceed();

        assert!(s.is_cleared());
        assert_eq!(s.pass_number(), 1);
        assert!(spy.cleared().is_empty());
        let asked: Vec<_> = spy.answers().into_iter().map(|(_, k, _)| k).collect();
        assert_eq!(asked, vec!["燎", "逞", "慧"]);
    }

    #[test]
    fn wrong_kanji_is_queued_once_per_pass() {
        let (mut s, _) = session(QuizMode::Normal);
        s.answer("はずれ");
        s.proceed();
        s.answer("はずれ");
        s.proceed();
        s.answer("はずれ");
        assert_eq!(s.review_queue(), vec!["燎", "逞", "慧"]);

        s.proceed();
        assert_eq!(s.pass_number(), 2);
        s.answer("はずれ");
        s.proceed();
        assert_eq!(s.current_question().kanji(), "逞");
        assert_eq!(s.review_queue(), vec!["燎"]);
    }

    #[test]
    fn stage_zero_never_persists_clear() {
        let spy = Arc::new(SpyRecorder::default());
        let pool = vec![q("燎", "かがりび"), q("逞", "たくましい")];
        let mut s =
            QuizSession::from_questions(StageNumber::TODAY, QuizMode::Normal, pool, spy.clone())
                .unwrap();
        s.answer("かがりび");
        s.proceed();
        s.answer("たくましい");

        assert!(s.is_cleared());
        assert!(spy.cleared().is_empty());
        assert_eq!(spy.answers()[0].0, StageNumber::TODAY);
        assert_eq!(s.snapshot().title, "今日の10問");
    }

    #[test]
    fn calls_out_of_phase_are_ignored() {
        let (mut s, spy) = session(QuizMode::Normal);
        s.proceed();
        assert_eq!(s.current_question().kanji(), "燎");
        assert!(s.phase().is_answering());

        s.answer("かがりび");
        assert_eq!(s.answer("たくましい"), AnswerResult::Ignored);
        assert_eq!(spy.answers().len(), 1);
    }

    #[test]
    fn cleared_session_ignores_everything_and_quits_freely() {
        let (mut s, spy) = session(QuizMode::Normal);
        assert_eq!(s.request_quit(), QuitRequest::ConfirmQuit);
        s.answer("かがりび");
        s.proceed();
        s.answer("たくましい");
        s.proceed();
        s.answer("さとい");
        assert!(s.is_cleared());

        assert_eq!(s.answer("かがりび"), AnswerResult::Ignored);
        s.proceed();
        assert!(s.is_cleared());
        assert_eq!(s.request_quit(), QuitRequest::Leave);
        assert_eq!(s.request_quit(), QuitRequest::Leave);
        assert_eq!(spy.cleared().len(), 1);
    }

    #[test]
    fn weak_focus_without_weak_kanji_uses_whole_stage() {
        let spy = Arc::new(SpyRecorder::default());
        let stage = Stage::new(
            StageNumber::new(2),
            vec![q("燎", "かがりび"), q("逞", "たくましい")],
        );
        let s = QuizSession::new(&stage, QuizMode::WeakFocus, spy, &HashSet::new()).unwrap();
        assert_eq!(s.goal(), 2);
    }

    #[test]
    fn weak_focus_targets_weak_kanji() {
        let spy = Arc::new(SpyRecorder::default());
        let weak: HashSet<String> = ["慧".to_string()].into();
        let mut s = QuizSession::new(&sample_stage(), QuizMode::WeakFocus, spy.clone(), &weak)
            .unwrap();
        assert_eq!(s.goal(), 1);
        s.answer("さとい");
        assert!(s.is_cleared());
        assert_eq!(spy.cleared(), vec![StageNumber::new(1)]);
    }

    #[test]
    fn empty_stage_is_an_error() {
        let spy = Arc::new(SpyRecorder::default());
        let stage = Stage::new(StageNumber::new(4), Vec::new());
        let err = QuizSession::new(&stage, QuizMode::Normal, spy, &HashSet::new()).unwrap_err();
        assert_eq!(err, SessionError::Empty);
    }

    #[test]
    fn srs_review_is_refused() {
        let spy = Arc::new(SpyRecorder::default());
        let err = QuizSession::new(&sample_stage(), QuizMode::SrsReview, spy, &HashSet::new())
            .unwrap_err();
        assert_eq!(err, SessionError::ModeUnavailable(QuizMode::SrsReview));
    }

    #[test]
    fn reset_restores_first_pass() {
        let (mut s, _) = session(QuizMode::Normal);
        s.answer("はずれ");
        s.proceed();
        s.answer("たくましい");
        s.reset_game();

        assert_eq!(s.current_question().kanji(), "燎");
        assert_eq!(s.cleared_count(), 0);
        assert_eq!(s.pass_number(), 1);
        assert_eq!(s.remaining(), 3);
        assert!(s.review_queue().is_empty());
        assert!(s.phase().is_answering());
    }

    /// Answer every question correctly and return the kanji in asking order.
    fn play_through(s: &mut QuizSession) -> Vec<String> {
        let mut asked = Vec::new();
        while !s.is_cleared() {
            let current = s.current_question().clone();
            asked.push(current.kanji().to_owned());
            s.answer(current.answer());
            s.proceed();
        }
        asked
    }

    #[test]
    fn weak_focus_reset_keeps_built_questions_after_healing() {
        let spy = Arc::new(SpyRecorder::default());
        spy.weak.lock().unwrap().insert("慧".to_string());
        let weak = spy.weak_kanji(StageNumber::new(1));
        let mut s = QuizSession::new(&sample_stage(), QuizMode::WeakFocus, spy.clone(), &weak)
            .unwrap();
        assert_eq!(s.answer("さとい"), AnswerResult::Correct);
        spy.weak.lock().unwrap().clear();

        s.reset_game();
        assert_eq!(s.goal(), 1);
        assert_eq!(s.remaining(), 1);
        assert_eq!(s.current_question().kanji(), "慧");
        assert_eq!(play_through(&mut s), vec!["慧"]);
    }

    #[test]
    fn shuffling_reset_keeps_kanji_set_and_goal() {
        let questions: Vec<Question> = (0..14).map(|i| q(&format!("k{i}"), "a")).collect();
        let stage = Stage::new(StageNumber::new(5), questions);
        let spy = Arc::new(SpyRecorder::default());
        let mut s = QuizSession::new(&stage, QuizMode::Quick10, spy, &HashSet::new()).unwrap();
        assert_eq!(s.goal(), 10);
        let mut first: Vec<String> = s.questions().iter().map(|q| q.kanji().to_owned()).collect();

        s.answer("a");
        s.proceed();
        s.reset_game_with_rng(&mut StdRng::seed_from_u64(11));

        assert_eq!(s.goal(), 10);
        assert_eq!(s.cleared_count(), 0);
        assert_eq!(s.remaining(), 10);
        let mut replayed = play_through(&mut s);
        first.sort_unstable();
        replayed.sort_unstable();
        assert_eq!(first, replayed);
    }

    #[test]
    fn wrong_note_bonus_adds_xp_per_correct_answer() {
        let spy = Arc::new(SpyRecorder::default());
        let rewards = Arc::new(SpyRewards::default());
        let pool = vec![q("燎", "かがりび"), q("逞", "たくましい")];
        let mut s = QuizSession::from_questions(StageNumber::TODAY, QuizMode::Normal, pool, spy)
            .unwrap()
            .with_rewards(rewards.clone())
            .with_wrong_note_bonus();

        s.answer("はずれ");
        s.proceed();
        s.answer("たくましい");

        let retrieved = rewards
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == XpEvent::WrongNoteRetrieved)
            .count();
        assert_eq!(retrieved, 1);
        assert_eq!(s.session_xp(), 5 + 3);
    }

    #[test]
    fn rewards_follow_answers_and_clear() {
        let spy = Arc::new(SpyRecorder::default());
        let rewards = Arc::new(SpyRewards::default());
        let mut s = QuizSession::new(&sample_stage(), QuizMode::Normal, spy, &HashSet::new())
            .unwrap()
            .with_clock(fixed_clock())
            .with_rewards(rewards.clone());

        s.answer("かがりび");
        s.proceed();
        s.answer("たくましい");
        s.proceed();
        s.answer("さとい");

        let events = rewards.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                XpEvent::CorrectAnswer,
                XpEvent::CorrectAnswer,
                XpEvent::CorrectAnswer,
                XpEvent::ComboBonus,
                XpEvent::SessionComplete,
            ]
        );
        assert_eq!(s.session_xp(), 5 * 3 + 2 + 20);
        assert_eq!(*rewards.correct.lock().unwrap(), 3);
        assert_eq!(
            rewards.study.lock().unwrap().clone(),
            vec![chrono::Duration::zero()]
        );
        assert_eq!(s.snapshot().session_xp, 37);
    }

    #[test]
    fn snapshot_reports_progress() {
        let (mut s, _) = session(QuizMode::Normal);
        s.answer("かがりび");
        let snap = s.snapshot();
        assert_eq!(snap.cleared_count, 1);
        assert_eq!(snap.goal, 3);
        assert_eq!(snap.remaining, 2);
        assert_eq!(snap.last_result, Some(AnswerResult::Correct));
        assert_eq!(snap.consecutive_correct, 1);
        assert!((snap.progress_fraction - 1.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(snap.clear_title, "ステージ 1 クリア！");

        s.proceed();
        assert_eq!(s.snapshot().last_result, None);
    }
}
