//! Line-based quiz loop over stdin/stdout.

use std::io::{self, BufRead, Write};

use services::{AnswerResult, QuitRequest, QuizPhase, QuizSession};

/// How a terminal session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Cleared { passes: u32, xp: u32 },
    Quit,
}

/// Drive `session` until it clears or the player leaves.
///
/// A choice is picked by its number or typed out. `q` asks to quit; end of
/// input quits without asking.
///
/// # Errors
///
/// Returns any I/O error from `input` or `out`.
pub fn run_session<R: BufRead, W: Write>(
    session: &mut QuizSession,
    input: &mut R,
    out: &mut W,
) -> io::Result<Outcome> {
    let title = session.snapshot().title;
    writeln!(out, "== {title} ({}) ==", session.mode().display_name())?;

    loop {
        if session.is_cleared() {
            let snap = session.snapshot();
            writeln!(out, "{}", snap.clear_title)?;
            writeln!(out, "全{}問クリア  +{} XP", snap.goal, snap.session_xp)?;
            return Ok(Outcome::Cleared {
                passes: snap.pass_number,
                xp: snap.session_xp,
            });
        }

        let snap = session.snapshot();
        let question = snap.current;
        writeln!(out)?;
        writeln!(
            out,
            "[{}/{}] 周回{}  {}",
            snap.cleared_count, snap.goal, snap.pass_number, question.kanji()
        )?;
        for (i, choice) in question.choices().iter().enumerate() {
            writeln!(out, "  {}. {choice}", i + 1)?;
        }
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = read_line(input)? else {
            return Ok(Outcome::Quit);
        };
        if line.eq_ignore_ascii_case("q") {
            if confirm_quit(session, input, out)? {
                return Ok(Outcome::Quit);
            }
            continue;
        }

        let selected = pick_choice(question.choices(), &line);
        match session.answer(selected) {
            AnswerResult::Correct => {
                writeln!(out, "○ 正解")?;
                if session.phase() == &QuizPhase::ShowingExplanation
                    && !question.explain().is_empty()
                {
                    writeln!(out, "  {}", question.explain())?;
                }
            }
            AnswerResult::Wrong => {
                if let QuizPhase::ShowingWrongAnswer { correct_answer } = session.phase() {
                    writeln!(out, "× 正解は「{correct_answer}」")?;
                }
            }
            AnswerResult::Ignored => {}
        }
        session.proceed();
    }
}

fn confirm_quit<R: BufRead, W: Write>(
    session: &QuizSession,
    input: &mut R,
    out: &mut W,
) -> io::Result<bool> {
    match session.request_quit() {
        QuitRequest::Leave => Ok(true),
        QuitRequest::ConfirmQuit => {
            write!(out, "中断しますか？ 進捗は保存されません (y/N) ")?;
            out.flush()?;
            Ok(read_line(input)?.is_none_or(|answer| answer.eq_ignore_ascii_case("y")))
        }
    }
}

/// Numbered pick (1-based) or the literal text.
fn pick_choice<'a>(choices: &'a [String], line: &'a str) -> &'a str {
    line.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| choices.get(i))
        .map_or(line, String::as_str)
}

fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
