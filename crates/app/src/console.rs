use exam_core::model::{ExamDefinition, ExamId};
use exam_core::scoring::ScoreReport;
use exam_core::session::{Outcome, Phase, SessionSnapshot, Transition};
use services::{DriverConfig, ExamSessionService, ServiceError, SessionDriver};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// One line typed by the test-taker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Answer(String),
    Next,
    Submit { force: bool },
    Quit,
    Help,
}

impl ConsoleInput {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        match line {
            "n" | "next" => Some(Self::Next),
            "s" | "submit" => Some(Self::Submit { force: false }),
            "s!" | "submit!" => Some(Self::Submit { force: true }),
            "q" | "quit" => Some(Self::Quit),
            "h" | "help" | "?" => Some(Self::Help),
            _ => line
                .strip_prefix("a ")
                .map(|text| Self::Answer(text.trim().to_owned())),
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  a <text>  answer the current question");
    println!("  n         next question (locks the current one)");
    println!("  s         submit (warns about unanswered questions)");
    println!("  s!        submit even with unanswered questions");
    println!("  q         abandon the exam");
}

fn print_instructions(exam: &ExamDefinition) {
    println!("{} ({}, {})", exam.title(), exam.subject(), exam.class_name());
    println!(
        "{} questions. Attempt {} of {}.",
        exam.question_count(),
        exam.attempts().next_attempt_number(),
        exam.attempts().max
    );
    println!("Each question has its own timer and the whole exam has one more.");
    println!("You cannot go back to a question once you leave it.");
    println!("Skipping open questions shortens the time for the ones that follow.");
    println!();
    print_help();
    println!();
}

fn print_question(exam: &ExamDefinition, snap: &SessionSnapshot) {
    let Some(index) = snap.current_index else {
        return;
    };
    let Some(question) = exam.question(index) else {
        return;
    };
    println!();
    println!(
        "Question {}/{} [{}] ({}s, {}s left in exam)",
        index + 1,
        snap.question_count,
        question.kind(),
        snap.question_time_left,
        snap.total_time_left
    );
    println!("  {}", question.text());
    for option in question.options() {
        println!("   - {option}");
    }
}

fn print_score(score: &ScoreReport) {
    println!(
        "Score: {}/{} ({:.1}%), {}",
        score.score,
        score.max_score,
        score.percentage,
        score.rating.label()
    );
    if score.pending_review > 0 {
        println!("{} answer(s) await manual review.", score.pending_review);
    }
}

/// Interactive exam run on stdin/stdout.
///
/// # Errors
///
/// Returns an error if the exam cannot be loaded or stdin fails.
pub async fn run_exam(
    service: &ExamSessionService,
    exam_id: ExamId,
    config: DriverConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = service.load_exam(exam_id).await?;
    let exam = session.exam().clone();
    let session_id = session.id();
    let (handle, task) = SessionDriver::spawn(session, service.workflow(), service.clock(), config);

    print_instructions(&exam);
    println!("Press Enter to start.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    if lines.next_line().await?.is_none() {
        return Ok(());
    }
    report(handle.start().await);

    let mut updates = handle.subscribe();
    let mut shown = updates.borrow_and_update().clone();
    print_question(&exam, &shown);

    while !shown.phase.is_final() {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = updates.borrow_and_update().clone();
                if snap.current_index != shown.current_index {
                    print_question(&exam, &snap);
                } else if let Some(left) = countdown_notice(&shown, &snap) {
                    println!("[{left}s left]");
                }
                shown = snap;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let Some(input) = ConsoleInput::parse(&line) else {
                    println!("Unknown command, type `h` for help.");
                    continue;
                };
                let current = handle.snapshot().current_index.unwrap_or(0);
                let result = match input {
                    ConsoleInput::Answer(text) => handle.answer(current, text).await,
                    ConsoleInput::Next => handle.advance(current).await,
                    ConsoleInput::Submit { force } => handle.submit(force).await,
                    ConsoleInput::Quit => handle.abandon().await,
                    ConsoleInput::Help => {
                        print_help();
                        continue;
                    }
                };
                report(result);
                let snap = handle.snapshot();
                if snap.current_index != shown.current_index {
                    print_question(&exam, &snap);
                }
                shown = snap;
            }
        }
    }

    drop(updates);
    drop(handle);
    let session = task.await?;
    debug!(session_id = %session_id, phase = %session.phase(), "session finished");

    match session.phase() {
        Phase::Terminated(Outcome::Success) => {
            if let Some(receipt) = session.receipt() {
                println!();
                if receipt.payload.reason.is_automatic() {
                    println!("Time ran out.");
                }
                println!(
                    "Submitted as attempt #{} ({}), {}s used.",
                    receipt.payload.attempt_number, receipt.payload.reason, receipt.payload.time_spent_secs
                );
                print_score(&receipt.score);
            }
        }
        Phase::Terminated(Outcome::Abandoned) => println!("Exam abandoned. No attempt recorded."),
        phase => println!("Session ended while {phase}."),
    }
    Ok(())
}

/// Seconds to announce for `snap`, every ten seconds of exam time.
///
/// A snapshot already shown after a command reply is not announced again.
fn countdown_notice(shown: &SessionSnapshot, snap: &SessionSnapshot) -> Option<u32> {
    if snap == shown || snap.phase != Phase::InProgress || snap.total_time_left % 10 != 0 {
        return None;
    }
    Some(snap.total_time_left)
}

fn report(result: Result<Transition, ServiceError>) {
    match result {
        Ok(Transition::Answered { index }) => println!("Answer saved for question {}.", index + 1),
        Ok(Transition::IncompleteWarning { unanswered }) => {
            let list: Vec<String> = unanswered.iter().map(|i| (i + 1).to_string()).collect();
            println!(
                "Unanswered: {}. Type `s!` to submit anyway.",
                list.join(", ")
            );
        }
        Ok(Transition::Ignored) => println!("Nothing to do right now."),
        Ok(_) => {}
        Err(ServiceError::SubmissionFailed(err)) => {
            println!("Submission failed: {err}. Type `s` to retry.");
        }
        Err(err) => println!("{err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::demo_exam;
    use exam_core::TimingPolicy;
    use exam_core::session::ExamSession;
    use exam_core::time::fixed_now;

    #[test]
    fn parses_console_commands() {
        assert_eq!(
            ConsoleInput::parse("a  Mercury "),
            Some(ConsoleInput::Answer("Mercury".into()))
        );
        assert_eq!(ConsoleInput::parse("n"), Some(ConsoleInput::Next));
        assert_eq!(ConsoleInput::parse("s"), Some(ConsoleInput::Submit { force: false }));
        assert_eq!(ConsoleInput::parse(" s! "), Some(ConsoleInput::Submit { force: true }));
        assert_eq!(ConsoleInput::parse("q"), Some(ConsoleInput::Quit));
        assert_eq!(ConsoleInput::parse("answer"), None);
    }

    #[test]
    fn countdown_is_announced_once_per_snapshot() {
        let now = fixed_now();
        let exam = demo_exam(ExamId::new(1), now).unwrap();
        let mut session = ExamSession::open(exam, TimingPolicy::standard(), now).unwrap();
        session.start(now).unwrap();
        while session.snapshot().total_time_left % 10 != 0 {
            session.tick(now).unwrap();
        }
        let snap = session.snapshot();

        let mut earlier = snap.clone();
        earlier.total_time_left += 1;
        assert_eq!(
            countdown_notice(&earlier, &snap),
            Some(snap.total_time_left)
        );
        assert_eq!(countdown_notice(&snap, &snap), None);

        session.tick(now).unwrap();
        assert_eq!(countdown_notice(&snap, &session.snapshot()), None);
    }
}
