//! Integrity checks for a loaded question bank.
//!
//! Sessions assume their pool is valid; these checks run once at load time and
//! report human-readable issues instead of failing on the first one.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::model::{EXPECTED_STAGE_SIZE, QuestionError, QuizData, StageNumber};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Loading continues; the issue is logged.
    Warning,
    /// The bank cannot be used.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    Question(QuestionError),
    DuplicateKanji { kanji: String },
    ReusedAcrossStages { kanji: String, first_stage: StageNumber },
    UnexpectedStageSize { count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub stage: StageNumber,
    pub kind: IssueKind,
}

impl ValidationIssue {
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self.kind {
            IssueKind::Question(_) | IssueKind::DuplicateKanji { .. } => Severity::Error,
            IssueKind::ReusedAcrossStages { .. } | IssueKind::UnexpectedStageSize { .. } => {
                Severity::Warning
            }
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {}: ", self.stage)?;
        match &self.kind {
            IssueKind::Question(err) => write!(f, "{err}"),
            IssueKind::DuplicateKanji { kanji } => write!(f, "duplicate kanji '{kanji}'"),
            IssueKind::ReusedAcrossStages { kanji, first_stage } => {
                write!(f, "kanji '{kanji}' already used in stage {first_stage}")
            }
            IssueKind::UnexpectedStageSize { count } => {
                write!(f, "has {count} questions, expected {EXPECTED_STAGE_SIZE}")
            }
        }
    }
}

/// Issues found in a question bank, in stage order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity() == Severity::Warning)
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Error messages only, one line each.
    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        self.errors().map(ToString::to_string).collect()
    }

    /// Every issue as a message, one line each.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

/// Check every stage of `data`.
#[must_use]
pub fn validate_quiz_data(data: &QuizData) -> ValidationReport {
    let mut issues = Vec::new();
    let mut first_seen: HashMap<&str, StageNumber> = HashMap::new();

    for stage in &data.stages {
        let number = stage.number();

        if !stage.has_expected_size() {
            issues.push(ValidationIssue {
                stage: number,
                kind: IssueKind::UnexpectedStageSize { count: stage.len() },
            });
        }

        let mut in_stage: HashSet<&str> = HashSet::new();
        for question in stage.questions() {
            issues.extend(question.check().into_iter().map(|err| ValidationIssue {
                stage: number,
                kind: IssueKind::Question(err),
            }));

            let kanji = question.kanji();
            if kanji.trim().is_empty() {
                continue;
            }
            if !in_stage.insert(kanji) {
                issues.push(ValidationIssue {
                    stage: number,
                    kind: IssueKind::DuplicateKanji {
                        kanji: kanji.to_owned(),
                    },
                });
                continue;
            }
            match first_seen.get(kanji) {
                Some(&first_stage) if first_stage != number => issues.push(ValidationIssue {
                    stage: number,
                    kind: IssueKind::ReusedAcrossStages {
                        kanji: kanji.to_owned(),
                        first_stage,
                    },
                }),
                Some(_) => {}
                None => {
                    first_seen.insert(kanji, number);
                }
            }
        }
    }

    ValidationReport { issues }
}
