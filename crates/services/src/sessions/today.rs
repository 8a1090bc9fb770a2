use rand::Rng;
use rand::rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

use oni_core::model::{Question, Stage, StageNumber};

use super::plan::dedup_by_kanji;

/// Limits for cross-stage daily sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TodayConfig {
    pub target_count: usize,
    pub max_weak_slots: usize,
}

impl Default for TodayConfig {
    fn default() -> Self {
        Self {
            target_count: 10,
            max_weak_slots: 5,
        }
    }
}

/// Which kind of daily session was prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TodayAction {
    /// Revisit weak kanji, newest mistakes first.
    Review,
    /// No weak kanji: an easy run through the stages in order.
    Gentle,
}

/// Curated question list for a stage-0 session.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSession {
    pub action: TodayAction,
    pub questions: Vec<Question>,
}

impl PreparedSession {
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Wrap the questions as the stage-0 sentinel stage.
    #[must_use]
    pub fn into_stage(self) -> Stage {
        Stage::today(self.questions)
    }
}

/// Builds cross-stage practice sets.
///
/// [`TodayCurator::build_today_session`] is deterministic;
/// [`TodayCurator::build_daily_blend`] samples randomly on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TodayCurator {
    config: TodayConfig,
}

impl TodayCurator {
    #[must_use]
    pub fn new(config: TodayConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> TodayConfig {
        self.config
    }

    /// Review session when any weak kanji shows up in `review_ordered`,
    /// otherwise a gentle session over all stages in stage order.
    #[must_use]
    pub fn build_today_session(
        &self,
        all_stages: &[Stage],
        weak_by_stage: &HashMap<StageNumber, HashSet<String>>,
        review_ordered: &[Question],
    ) -> PreparedSession {
        let weak: HashSet<&str> = weak_by_stage
            .values()
            .flat_map(|set| set.iter().map(String::as_str))
            .collect();

        if !weak.is_empty() {
            let matches = review_ordered.iter().filter(|q| weak.contains(q.kanji()));
            let questions = take_unique(matches, self.config.max_weak_slots);
            if !questions.is_empty() {
                return PreparedSession {
                    action: TodayAction::Review,
                    questions,
                };
            }
        }

        let mut ordered: Vec<&Stage> = all_stages.iter().collect();
        ordered.sort_by_key(|stage| stage.number());
        let pool = ordered.into_iter().flat_map(|stage| stage.questions());
        PreparedSession {
            action: TodayAction::Gentle,
            questions: take_unique(pool, self.config.target_count),
        }
    }

    /// Random blend of weak questions and fresh ones from uncleared stages.
    #[must_use]
    pub fn build_daily_blend(
        &self,
        all_stages: &[Stage],
        weak_by_stage: &HashMap<StageNumber, HashSet<String>>,
        cleared: &BTreeSet<StageNumber>,
    ) -> Vec<Question> {
        self.build_daily_blend_with_rng(all_stages, weak_by_stage, cleared, &mut rng())
    }

    /// Up to `max_weak_slots` weak questions, topped up to `target_count`
    /// from uncleared stages (all stages once everything is cleared), shuffled.
    pub fn build_daily_blend_with_rng<R: Rng + ?Sized>(
        &self,
        all_stages: &[Stage],
        weak_by_stage: &HashMap<StageNumber, HashSet<String>>,
        cleared: &BTreeSet<StageNumber>,
        rng: &mut R,
    ) -> Vec<Question> {
        let TodayConfig {
            target_count,
            max_weak_slots,
        } = self.config;

        let mut weak_pool: Vec<Question> = all_stages
            .iter()
            .flat_map(|stage| {
                let weak = weak_by_stage.get(&stage.number());
                stage
                    .questions()
                    .iter()
                    .filter(move |q| weak.is_some_and(|set| set.contains(q.kanji())))
            })
            .cloned()
            .collect();
        weak_pool = dedup_by_kanji(&weak_pool);
        weak_pool.shuffle(rng);
        weak_pool.truncate(max_weak_slots.min(target_count));

        let used: HashSet<String> = weak_pool.iter().map(|q| q.kanji().to_owned()).collect();
        let uncleared: Vec<&Stage> = all_stages
            .iter()
            .filter(|stage| !cleared.contains(&stage.number()))
            .collect();
        let source: Vec<&Stage> = if uncleared.is_empty() {
            all_stages.iter().collect()
        } else {
            uncleared
        };

        let fresh: Vec<&Question> = source
            .iter()
            .flat_map(|stage| stage.questions())
            .filter(|q| !used.contains(q.kanji()))
            .collect();
        let mut fill = dedup_by_kanji(fresh);
        fill.shuffle(rng);
        fill.truncate(target_count - weak_pool.len());

        let mut combined = weak_pool;
        combined.extend(fill);
        combined.shuffle(rng);
        combined.truncate(target_count);
        combined
    }

    /// Daily blend as a stage-0 stage, falling back to the head of the
    /// first stage when the blend comes up empty.
    #[must_use]
    pub fn daily_blend_stage(
        &self,
        all_stages: &[Stage],
        weak_by_stage: &HashMap<StageNumber, HashSet<String>>,
        cleared: &BTreeSet<StageNumber>,
    ) -> Stage {
        let pool = self.build_daily_blend(all_stages, weak_by_stage, cleared);
        if !pool.is_empty() {
            return Stage::today(pool);
        }
        let fallback = all_stages
            .first()
            .map(|stage| take_unique(stage.questions(), self.config.target_count))
            .unwrap_or_default();
        Stage::today(fallback)
    }
}

/// First `cap` questions with distinct kanji.
fn take_unique<'a, I>(questions: I, cap: usize) -> Vec<Question>
where
    I: IntoIterator<Item = &'a Question>,
{
    let mut seen = HashSet::new();
    questions
        .into_iter()
        .filter(|q| seen.insert(q.kanji().to_owned()))
        .take(cap)
        .cloned()
        .collect()
}
