use rand::Rng;
use rand::rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

use oni_core::model::{Question, QuizMode};

/// Keep the first question for each kanji, preserving relative order.
pub fn dedup_by_kanji<'a, I>(questions: I) -> Vec<Question>
where
    I: IntoIterator<Item = &'a Question>,
{
    let mut seen = HashSet::new();
    questions
        .into_iter()
        .filter(|q| seen.insert(q.kanji().to_owned()))
        .cloned()
        .collect()
}

/// Ordered question list for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub questions: Vec<Question>,
    /// Weak-focus found nothing weak in the pool and used the whole pool.
    pub fell_back_to_pool: bool,
}

impl SessionPlan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Selects and orders the questions a session starts with.
///
/// Steps, in order: dedup by kanji, weak-focus filter (falling back to the
/// deduplicated pool when nothing matches), shuffle for shuffling modes, then
/// the mode's question limit.
pub struct SessionBuilder<'a> {
    mode: QuizMode,
    weak_kanji: Option<&'a HashSet<String>>,
}

impl<'a> SessionBuilder<'a> {
    #[must_use]
    pub fn new(mode: QuizMode) -> Self {
        Self {
            mode,
            weak_kanji: None,
        }
    }

    /// Kanji considered weak; only consulted by `QuizMode::WeakFocus`.
    #[must_use]
    pub fn with_weak_kanji(mut self, weak_kanji: &'a HashSet<String>) -> Self {
        self.weak_kanji = Some(weak_kanji);
        self
    }

    /// Build with the thread-local RNG.
    #[must_use]
    pub fn build(self, pool: &[Question]) -> SessionPlan {
        self.build_with_rng(pool, &mut rng())
    }

    pub fn build_with_rng<R: Rng + ?Sized>(self, pool: &[Question], rng: &mut R) -> SessionPlan {
        let mut questions = dedup_by_kanji(pool);
        let mut fell_back_to_pool = false;

        if self.mode == QuizMode::WeakFocus {
            let weak: Vec<Question> = match self.weak_kanji {
                Some(weak) => questions
                    .iter()
                    .filter(|q| weak.contains(q.kanji()))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            };
            if weak.is_empty() {
                fell_back_to_pool = true;
                tracing::debug!("no weak kanji in pool; weak focus uses the whole pool");
            } else {
                questions = weak;
            }
        }

        if self.mode.shuffles_questions() {
            questions.shuffle(rng);
        }

        if let Some(limit) = self.mode.question_limit() {
            questions.truncate(limit);
        }

        SessionPlan {
            questions,
            fell_back_to_pool,
        }
    }
}

/// Question list for `mode` drawn from `pool`.
#[must_use]
pub fn build_question_list(
    mode: QuizMode,
    pool: &[Question],
    weak_kanji: &HashSet<String>,
) -> Vec<Question> {
    SessionBuilder::new(mode)
        .with_weak_kanji(weak_kanji)
        .build(pool)
        .questions
}

/// Like [`build_question_list`] with a caller-supplied RNG.
pub fn build_question_list_with_rng<R: Rng + ?Sized>(
    mode: QuizMode,
    pool: &[Question],
    weak_kanji: &HashSet<String>,
    rng: &mut R,
) -> Vec<Question> {
    SessionBuilder::new(mode)
        .with_weak_kanji(weak_kanji)
        .build_with_rng(pool, rng)
        .questions
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn q(kanji: &str) -> Question {
        Question::new(kanji, vec!["a".into(), "b".into()], "a", "")
    }

    fn pool(n: usize) -> Vec<Question> {
        (0..n).map(|i| q(&format!("k{i}"))).collect()
    }

    fn kanji(questions: &[Question]) -> Vec<&str> {
        questions.iter().map(Question::kanji).collect()
    }

    fn weak(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn normal_keeps_pool_order_and_drops_duplicates() {
        let pool = vec![q("燎"), q("逞"), q("燎"), q("慧")];
        let list = build_question_list(QuizMode::Normal, &pool, &HashSet::new());
        assert_eq!(kanji(&list), vec!["燎", "逞", "慧"]);
    }

    #[test]
    fn weak_focus_filters_in_pool_order() {
        let pool = vec![q("燎"), q("逞"), q("慧"), q("逞")];
        let list = build_question_list(QuizMode::WeakFocus, &pool, &weak(&["慧", "逞"]));
        assert_eq!(kanji(&list), vec!["逞", "慧"]);
    }

    #[test]
    fn weak_focus_without_weak_kanji_matches_normal() {
        let pool = vec![q("燎"), q("逞"), q("燎")];
        let plan = SessionBuilder::new(QuizMode::WeakFocus)
            .with_weak_kanji(&HashSet::new())
            .build(&pool);
        assert!(plan.fell_back_to_pool);
        let normal = build_question_list(QuizMode::Normal, &pool, &HashSet::new());
        assert_eq!(plan.questions, normal);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn weak_focus_with_unrelated_weak_kanji_falls_back() {
        let pool = vec![q("燎"), q("逞")];
        let list = build_question_list(QuizMode::WeakFocus, &pool, &weak(&["鬱"]));
        assert_eq!(kanji(&list), vec!["燎", "逞"]);
    }

    #[test]
    fn quick10_caps_and_dedups() {
        let mut source = pool(25);
        source.extend(pool(25));
        let mut rng = StdRng::seed_from_u64(7);
        let list = build_question_list_with_rng(QuizMode::Quick10, &source, &HashSet::new(), &mut rng);
        assert_eq!(list.len(), 10);
        let distinct: HashSet<_> = list.iter().map(Question::kanji).collect();
        assert_eq!(distinct.len(), 10);
    }

    #[test]
    fn exam30_takes_everything_when_pool_is_small() {
        let source = pool(12);
        let mut rng = StdRng::seed_from_u64(1);
        let list = build_question_list_with_rng(QuizMode::Exam30, &source, &HashSet::new(), &mut rng);
        assert_eq!(list.len(), 12);
        let mut got: Vec<_> = kanji(&list);
        got.sort_unstable();
        let mut want: Vec<_> = kanji(&source);
        want.sort_unstable();
        assert_eq!(got, want);
    }

    #[test]
    fn same_seed_same_order() {
        let source = pool(40);
        let a = build_question_list_with_rng(
            QuizMode::Exam30,
            &source,
            &HashSet::new(),
            &mut StdRng::seed_from_u64(42),
        );
        let b = build_question_list_with_rng(
            QuizMode::Exam30,
            &source,
            &HashSet::new(),
            &mut StdRng::seed_from_u64(42),
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 30);
    }

    #[test]
    fn empty_pool_builds_empty_list() {
        for mode in QuizMode::ALL {
            assert!(build_question_list(mode, &[], &HashSet::new()).is_empty());
        }
    }
}
