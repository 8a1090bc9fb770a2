use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use oni_core::model::{QuizData, QuizMode, Stage, StageNumber};
use oni_core::validation::validate_quiz_data;
use services::{Clock, QuizLoopService, QuizSession};
use storage::repository::KeyValueStore;
use storage::{FileStore, LocalProgress, QuizDataLoader, Rewards};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod play;

use config::{AppConfig, Overrides};
use play::{Outcome, run_session};

const RECENT_MISSES: usize = 5;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidStage { raw: String },
    InvalidMode { raw: String },
    MissingStage,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidStage { raw } => write!(f, "invalid stage number: {raw}"),
            ArgsError::InvalidMode { raw } => write!(f, "invalid --mode value: {raw}"),
            ArgsError::MissingStage => write!(f, "play requires a stage number"),
        }
    }
}

impl std::error::Error for ArgsError {}

/// Problems detected after the data is loaded.
#[derive(Debug)]
enum CommandError {
    NoSuchStage(StageNumber),
    StageLocked(StageNumber),
    ModeNotOffered { mode: QuizMode, stage: StageNumber },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::NoSuchStage(stage) => write!(f, "stage {stage} does not exist"),
            CommandError::StageLocked(stage) => {
                write!(f, "stage {stage} is locked; clear the previous stage first")
            }
            CommandError::ModeNotOffered { mode, stage } => {
                write!(f, "mode {} is not available for stage {stage}", mode.key())
            }
        }
    }
}

impl std::error::Error for CommandError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  onitan [--data <dir>] [--store <dir>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  stages                       list stages, clears and modes");
    eprintln!("  validate                     check the question bank");
    eprintln!("  play <stage> [--mode <key>]  play a stage (default mode: normal)");
    eprintln!("  today [--blend] [--mode <key>]");
    eprintln!("                               today's practice; --blend mixes in new questions");
    eprintln!("  stats                        accuracy, XP, streak and recent mistakes");
    eprintln!("  reset                        forget all progress");
    eprintln!();
    eprintln!("Modes: normal, quick10, exam30, weakFocus");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {}, {}", config::DATA_DIR_ENV, config::STORE_DIR_ENV);
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Stages,
    Validate,
    Play { stage: StageNumber, mode: QuizMode },
    Today { blend: bool, mode: QuizMode },
    Stats,
    Reset,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    overrides: Overrides,
    command: Command,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let mut args = args.into_iter();
        let mut overrides = Overrides::default();
        let mut words = Vec::new();
        let mut mode = None;
        let mut blend = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--data" => {
                    overrides.data_dir = Some(PathBuf::from(require_value(&mut args, "--data")?));
                }
                "--store" => {
                    overrides.store_dir = Some(PathBuf::from(require_value(&mut args, "--store")?));
                }
                "--mode" => {
                    let raw = require_value(&mut args, "--mode")?;
                    mode = Some(QuizMode::from_key(&raw).ok_or(ArgsError::InvalidMode { raw })?);
                }
                "--blend" => blend = true,
                "--help" | "-h" => return Ok(None),
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => words.push(arg),
            }
        }

        let mut words = words.into_iter();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let mode = mode.unwrap_or(QuizMode::Normal);
        let command = match name.as_str() {
            "stages" => Command::Stages,
            "validate" => Command::Validate,
            "play" => {
                let raw = words.next().ok_or(ArgsError::MissingStage)?;
                let stage = raw
                    .parse::<StageNumber>()
                    .map_err(|_| ArgsError::InvalidStage { raw: raw.clone() })?;
                if stage.is_today() {
                    return Err(ArgsError::InvalidStage { raw });
                }
                Command::Play { stage, mode }
            }
            "today" => Command::Today { blend, mode },
            "stats" => Command::Stats,
            "reset" => Command::Reset,
            _ => return Err(ArgsError::UnknownCommand(name)),
        };
        if let Some(extra) = words.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Some(Self { overrides, command }))
    }
}

/// Store-backed recorders plus the session service on top of them.
struct Workspace {
    progress: Arc<LocalProgress>,
    rewards: Arc<Rewards>,
    service: QuizLoopService,
}

impl Workspace {
    fn open(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let clock = Clock::default();
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.store_dir)?);
        let progress = Arc::new(LocalProgress::open(Arc::clone(&store), clock)?);
        let rewards = Arc::new(Rewards::open(store, clock)?);
        let service = QuizLoopService::new(clock, progress.clone()).with_rewards(rewards.clone());
        Ok(Self {
            progress,
            rewards,
            service,
        })
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let Some(args) = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?
    else {
        print_usage();
        return Ok(());
    };
    let config = AppConfig::load(args.overrides);

    match args.command {
        Command::Validate => validate(&config),
        Command::Stages => {
            let data = QuizDataLoader::from_dir(&config.data_dir)?;
            let workspace = Workspace::open(&config)?;
            list_stages(&data, &workspace);
            Ok(())
        }
        Command::Play { stage, mode } => {
            let data = QuizDataLoader::from_dir(&config.data_dir)?;
            let workspace = Workspace::open(&config)?;
            let stage_data = data.stage(stage).ok_or(CommandError::NoSuchStage(stage))?;
            if !workspace.progress.cleared.is_unlocked(stage) {
                return Err(CommandError::StageLocked(stage).into());
            }
            if !workspace.service.available_modes(stage).contains(&mode) {
                return Err(CommandError::ModeNotOffered { mode, stage }.into());
            }
            let mut session = workspace.service.start_stage(stage_data, mode)?;
            play(&mut session)
        }
        Command::Today { blend, mode } => {
            let data = QuizDataLoader::from_dir(&config.data_dir)?;
            let workspace = Workspace::open(&config)?;
            let mut session = if blend {
                workspace.service.start_daily_blend(&data.stages, mode)?
            } else {
                let review = workspace.progress.stats.review_ordered(&data.stages);
                let prepared = workspace.service.prepare_today(&data.stages, &review);
                workspace.service.start_prepared(prepared, mode)?
            };
            play(&mut session)
        }
        Command::Stats => {
            let data = QuizDataLoader::from_dir(&config.data_dir)?;
            let workspace = Workspace::open(&config)?;
            print_stats(&data, &workspace);
            Ok(())
        }
        Command::Reset => {
            let workspace = Workspace::open(&config)?;
            workspace.progress.reset()?;
            println!("progress cleared");
            Ok(())
        }
    }
}

fn validate(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let data = QuizDataLoader::from_dir(&config.data_dir)?;
    let report = validate_quiz_data(&data);
    for warning in report.warnings() {
        println!("warning: {warning}");
    }
    let questions = data.stages.iter().map(Stage::len).sum::<usize>();
    println!("ok: {} stages, {questions} questions", data.stages.len());
    Ok(())
}

fn play(session: &mut QuizSession) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout().lock();
    match run_session(session, &mut input, &mut out)? {
        Outcome::Cleared { passes, xp } => tracing::info!(passes, xp, "session finished"),
        Outcome::Quit => tracing::info!("session abandoned"),
    }
    Ok(())
}

fn list_stages(data: &QuizData, workspace: &Workspace) {
    for stage in &data.stages {
        let number = stage.number();
        let status = if workspace.progress.cleared.is_cleared(number) {
            "cleared"
        } else if workspace.progress.cleared.is_unlocked(number) {
            "open"
        } else {
            "locked"
        };
        let modes: Vec<_> = workspace
            .service
            .available_modes(number)
            .into_iter()
            .map(QuizMode::key)
            .collect();
        println!(
            "stage {:>3}  {:>2} questions  {status:<7}  {}",
            number.value(),
            stage.len(),
            modes.join(", ")
        );
    }
}

fn print_stats(data: &QuizData, workspace: &Workspace) {
    let stats = &workspace.progress.stats;
    let overall = workspace.progress.cleared.overall_progress(data.stages.len());
    println!("cleared:  {:.0}%", overall * 100.0);
    println!(
        "accuracy: {:.0}% ({} correct)",
        stats.overall_accuracy() * 100.0,
        stats.total_correct()
    );

    let level = workspace.rewards.xp.level_state();
    println!(
        "level:    {} ({}/{} XP, today {} XP)",
        level.level,
        level.xp_in_level,
        level.xp_to_next,
        workspace.rewards.xp.today_xp()
    );

    let streak = workspace.rewards.streak.snapshot();
    println!(
        "streak:   {} days (best {}, freezes {}), today {} answers / {:.0}s{}",
        streak.current_streak,
        streak.longest_streak,
        streak.freeze_count,
        streak.today_answer_count,
        streak.today_study_seconds,
        if streak.today_completed { " ✓" } else { "" }
    );

    let misses = stats.recent_wrong_answers(RECENT_MISSES);
    if !misses.is_empty() {
        println!("recent mistakes:");
        for entry in misses {
            println!(
                "  stage {:>3}  {}  {} -> {}",
                entry.stage_number.value(),
                entry.kanji, entry.selected_answer, entry.correct_answer
            );
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "app=info,services=info,storage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Args>, ArgsError> {
        Args::parse(args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn play_takes_stage_and_mode() {
        let args = parse(&["--store", "/tmp/s", "play", "3", "--mode", "exam30"])
            .unwrap()
            .unwrap();
        assert_eq!(
            args.command,
            Command::Play {
                stage: StageNumber::new(3),
                mode: QuizMode::Exam30
            }
        );
        assert_eq!(args.overrides.store_dir, Some(PathBuf::from("/tmp/s")));
    }

    #[test]
    fn srs_review_is_not_a_mode() {
        let err = parse(&["play", "1", "--mode", "srsReview"]).unwrap_err();
        assert!(matches!(err, ArgsError::InvalidMode { .. }));
    }

    #[test]
    fn stage_zero_cannot_be_played_directly() {
        assert!(matches!(
            parse(&["play", "0"]).unwrap_err(),
            ArgsError::InvalidStage { .. }
        ));
    }

    #[test]
    fn today_defaults_to_normal_mode() {
        let args = parse(&["today", "--blend"]).unwrap().unwrap();
        assert_eq!(
            args.command,
            Command::Today {
                blend: true,
                mode: QuizMode::Normal
            }
        );
    }

    #[test]
    fn no_command_shows_usage() {
        assert!(parse(&[]).unwrap().is_none());
        assert!(parse(&["--help"]).unwrap().is_none());
    }

    #[test]
    fn bad_arguments_are_reported() {
        assert!(matches!(
            parse(&["play"]).unwrap_err(),
            ArgsError::MissingStage
        ));
        assert!(matches!(
            parse(&["dance"]).unwrap_err(),
            ArgsError::UnknownCommand(_)
        ));
        assert!(matches!(
            parse(&["--data"]).unwrap_err(),
            ArgsError::MissingValue { flag: "--data" }
        ));
        assert!(matches!(
            parse(&["stats", "extra"]).unwrap_err(),
            ArgsError::UnknownArg(_)
        ));
    }
}
