//! Loading the question bank from JSON files.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use oni_core::model::{Question, QuizData, Stage};
use oni_core::validation::validate_quiz_data;
use thiserror::Error;

const UNUSED_QUESTIONS_FILE: &str = "unused_questions.json";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DataLoadError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("no stage files in {0}")]
    NoStages(PathBuf),

    #[error("failed to parse {file}: {source}")]
    Decoding {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("question bank failed validation:\n{}", .0.join("\n"))]
    Validation(Vec<String>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reads `stage<N>.json` files (and an optional `unused_questions.json`)
/// into a validated [`QuizData`].
pub struct QuizDataLoader;

impl QuizDataLoader {
    /// Load every `stage<N>.json` under `dir`, ordered by `N`.
    ///
    /// # Errors
    ///
    /// Returns `DataLoadError` when the directory is unreadable, holds no stage
    /// files, a stage cannot be decoded, or validation finds errors.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<QuizData, DataLoadError> {
        let dir = dir.as_ref();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DataLoadError::FileNotFound(dir.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<(u32, PathBuf)> = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if let Some(n) = path.file_name().and_then(|n| n.to_str()).and_then(stage_file_number)
            {
                files.push((n, path));
            }
        }
        if files.is_empty() {
            return Err(DataLoadError::NoStages(dir.to_path_buf()));
        }
        files.sort_by_key(|(n, _)| *n);

        let mut stages = Vec::with_capacity(files.len());
        for (_, path) in &files {
            let raw = fs::read_to_string(path)?;
            stages.push(Self::parse_stage(&raw, &display_name(path))?);
        }

        let unused_questions = Self::load_unused(&dir.join(UNUSED_QUESTIONS_FILE));
        Self::finish(QuizData {
            stages,
            unused_questions,
        })
    }

    /// Load a single bundle file shaped like `{"stages": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns `DataLoadError` when the file is missing, undecodable or invalid.
    pub fn from_bundle(path: impl AsRef<Path>) -> Result<QuizData, DataLoadError> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DataLoadError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let data: QuizData =
            serde_json::from_str(&raw).map_err(|source| DataLoadError::Decoding {
                file: display_name(path),
                source,
            })?;
        Self::finish(data)
    }

    /// Decode one stage document. `name` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns `DataLoadError::Decoding` if `raw` is not a stage document.
    pub fn parse_stage(raw: &str, name: &str) -> Result<Stage, DataLoadError> {
        let stage: Stage = serde_json::from_str(raw).map_err(|source| DataLoadError::Decoding {
            file: name.to_owned(),
            source,
        })?;
        tracing::debug!(file = name, stage = %stage.number(), questions = stage.len(), "parsed stage");
        Ok(stage)
    }

    fn load_unused(path: &Path) -> Option<Vec<Question>> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(questions) => Some(questions),
            Err(err) => {
                tracing::warn!(file = %path.display(), %err, "ignoring undecodable unused questions");
                None
            }
        }
    }

    fn finish(data: QuizData) -> Result<QuizData, DataLoadError> {
        let report = validate_quiz_data(&data);
        for warning in report.warnings() {
            tracing::warn!("{warning}");
        }
        if report.has_errors() {
            return Err(DataLoadError::Validation(report.error_messages()));
        }
        tracing::info!(stages = data.stages.len(), "question bank loaded");
        Ok(data)
    }
}

/// `stage12.json` -> `Some(12)`.
fn stage_file_number(name: &str) -> Option<u32> {
    name.strip_prefix("stage")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_json(number: u32, kanji: &[&str]) -> String {
        let questions: Vec<String> = kanji
            .iter()
            .map(|k| {
                format!(r#"{{"kanji":"{k}","choices":["a","b"],"answer":"a","explain":""}}"#)
            })
            .collect();
        format!(r#"{{"stage":{number},"questions":[{}]}}"#, questions.join(","))
    }

    #[test]
    fn stage_file_names() {
        assert_eq!(stage_file_number("stage1.json"), Some(1));
        assert_eq!(stage_file_number("stage10.json"), Some(10));
        assert_eq!(stage_file_number("stage.json"), None);
        assert_eq!(stage_file_number("unused_questions.json"), None);
    }

    #[test]
    fn loads_stages_in_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stage10.json"), stage_json(10, &["鬱"])).unwrap();
        fs::write(dir.path().join("stage2.json"), stage_json(2, &["燎", "逞"])).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(
            dir.path().join(UNUSED_QUESTIONS_FILE),
            r#"[{"kanji":"翳","choices":["a","b"],"answer":"b","explain":""}]"#,
        )
        .unwrap();

        let data = QuizDataLoader::from_dir(dir.path()).unwrap();
        let numbers: Vec<u32> = data.stages.iter().map(|s| s.number().value()).collect();
        assert_eq!(numbers, vec![2, 10]);
        assert_eq!(data.unused_questions.map(|q| q.len()), Some(1));
    }

    #[test]
    fn rejects_duplicate_kanji() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stage1.json"), stage_json(1, &["燎", "燎"])).unwrap();
        let err = QuizDataLoader::from_dir(dir.path()).unwrap_err();
        match err {
            DataLoadError::Validation(issues) => {
                assert_eq!(issues, vec!["stage 1: duplicate kanji '燎'".to_owned()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reports_missing_directory_and_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            QuizDataLoader::from_dir(dir.path().join("nope")),
            Err(DataLoadError::FileNotFound(_))
        ));
        assert!(matches!(
            QuizDataLoader::from_dir(dir.path()),
            Err(DataLoadError::NoStages(_))
        ));
    }

    #[test]
    fn decoding_error_names_the_file() {
        let err = QuizDataLoader::parse_stage("{", "stage9.json").unwrap_err();
        assert!(err.to_string().starts_with("failed to parse stage9.json"));
    }

    #[test]
    fn bundle_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiz.json");
        fs::write(&path, format!(r#"{{"stages":[{}]}}"#, stage_json(1, &["慧"]))).unwrap();
        let data = QuizDataLoader::from_bundle(&path).unwrap();
        assert_eq!(data.stages[0].questions()[0].kanji(), "慧");
    }
}
