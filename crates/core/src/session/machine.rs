use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{
    AnswerValue, AttemptId, AttemptPayload, ExamDefinition, SessionId, SubmitReason,
};
use crate::scoring::ScoreReport;
use crate::timing::TimingPolicy;

use super::SessionError;
use super::answers::AnswerStore;
use super::countdown::{Countdown, CountdownTick};
use super::navigation::NavigationGuard;
use super::snapshot::SessionSnapshot;

//
// ─── PHASES ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// Submission failed; the payload is retained and `submit` retries it.
    Error,
    /// Session given up without producing an attempt.
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "outcome")]
pub enum Phase {
    Idle,
    Instructions,
    InProgress,
    Submitting,
    Terminated(Outcome),
}

impl Phase {
    /// Terminated states that ignore every further command.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(
            self,
            Phase::Terminated(Outcome::Success | Outcome::Abandoned)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => f.write_str("idle"),
            Phase::Instructions => f.write_str("showing instructions"),
            Phase::InProgress => f.write_str("in progress"),
            Phase::Submitting => f.write_str("submitting"),
            Phase::Terminated(Outcome::Success) => f.write_str("submitted"),
            Phase::Terminated(Outcome::Error) => f.write_str("submission failed"),
            Phase::Terminated(Outcome::Abandoned) => f.write_str("abandoned"),
        }
    }
}

//
// ─── COMMANDS / TRANSITIONS ────────────────────────────────────────────────────
//

/// Everything that can change a session, from the host or from the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Answer { index: usize, value: AnswerValue },
    Advance { index: usize },
    Submit { force: bool },
    /// One second elapsed.
    Tick,
    Abandon,
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Answer { .. } => "answer",
            Command::Advance { .. } => "advance",
            Command::Submit { .. } => "submit",
            Command::Tick => "tick",
            Command::Abandon => "abandon",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Transition {
    Loaded,
    Started {
        total_allowance_secs: u32,
        question_allowance_secs: Option<u32>,
    },
    Answered {
        index: usize,
    },
    Advanced {
        from: usize,
        to: usize,
        allowance_secs: u32,
        reduction_secs: u32,
        timed_out: bool,
    },
    Ticked {
        question_time_left: u32,
        total_time_left: u32,
    },
    /// Submit refused: unanswered questions remain. Re-issue with `force`.
    IncompleteWarning {
        unanswered: Vec<usize>,
    },
    /// Entered `Submitting`; the payload is ready for the sink.
    SubmissionReady {
        reason: SubmitReason,
    },
    Submitted {
        attempt_id: AttemptId,
    },
    SubmissionFailed,
    Abandoned,
    /// Command had no effect in the current phase.
    Ignored,
}

impl Transition {
    #[must_use]
    pub fn needs_submission(&self) -> bool {
        matches!(self, Transition::SubmissionReady { .. })
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub attempt_id: AttemptId,
    pub payload: AttemptPayload,
    pub score: ScoreReport,
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Mutable per-attempt state. Only `ExamSession` mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    phase: Phase,
    nav: NavigationGuard,
    answers: AnswerStore,
    adaptive_reduction_secs: u32,
    question_timer: Countdown,
    exam_timer: Countdown,
}

impl SessionState {
    fn new(question_count: usize) -> Self {
        Self {
            phase: Phase::Idle,
            nav: NavigationGuard::new(question_count),
            answers: AnswerStore::new(),
            adaptive_reduction_secs: 0,
            question_timer: Countdown::default(),
            exam_timer: Countdown::default(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.nav.current()
    }

    #[must_use]
    pub fn navigation(&self) -> &NavigationGuard {
        &self.nav
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    #[must_use]
    pub fn adaptive_reduction_secs(&self) -> u32 {
        self.adaptive_reduction_secs
    }

    #[must_use]
    pub fn question_time_left(&self) -> u32 {
        self.question_timer.remaining()
    }

    #[must_use]
    pub fn total_time_left(&self) -> u32 {
        self.exam_timer.remaining()
    }

    #[must_use]
    pub fn timers_running(&self) -> bool {
        self.question_timer.is_running() || self.exam_timer.is_running()
    }

    fn stop_timers(&mut self) {
        self.question_timer.stop();
        self.exam_timer.stop();
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Finite-state machine for one timed exam attempt.
///
/// All mutation goes through [`ExamSession::dispatch`]; callers must serialize
/// commands (user input and clock ticks) onto a single timeline.
pub struct ExamSession {
    id: SessionId,
    exam: ExamDefinition,
    policy: TimingPolicy,
    attempt_number: u32,
    total_allowance_secs: u32,
    state: SessionState,
    pending: Option<AttemptPayload>,
    receipt: Option<SubmissionReceipt>,
    last_error: Option<String>,
}

impl ExamSession {
    /// Create an idle session for `exam`.
    #[must_use]
    pub fn new(exam: ExamDefinition, policy: TimingPolicy) -> Self {
        let attempt_number = exam.attempts().next_attempt_number();
        let state = SessionState::new(exam.question_count());
        Self {
            id: SessionId::random(),
            exam,
            policy,
            attempt_number,
            total_allowance_secs: 0,
            state,
            pending: None,
            receipt: None,
            last_error: None,
        }
    }

    /// Create a session and run the load gate in one step.
    ///
    /// # Errors
    ///
    /// Returns `ExamUnavailable` or `MaxAttemptsReached` when the exam cannot be taken at `now`.
    pub fn open(
        exam: ExamDefinition,
        policy: TimingPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(exam, policy);
        session.load(now)?;
        Ok(session)
    }

    /// `Idle -> Instructions` if the exam is active, open at `now`, and has attempts left.
    ///
    /// # Errors
    ///
    /// Returns `ExamUnavailable`, `MaxAttemptsReached`, or `InvalidPhase` outside `Idle`.
    pub fn load(&mut self, now: DateTime<Utc>) -> Result<Transition, SessionError> {
        if self.state.phase != Phase::Idle {
            return Err(SessionError::InvalidPhase {
                command: "load",
                phase: self.state.phase,
            });
        }
        self.exam.check_available(now)?;
        self.state.phase = Phase::Instructions;
        Ok(Transition::Loaded)
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn exam(&self) -> &ExamDefinition {
        &self.exam
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    #[must_use]
    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    #[must_use]
    pub fn total_allowance_secs(&self) -> u32 {
        self.total_allowance_secs
    }

    /// Payload frozen on entering `Submitting`; kept after a failed submission.
    #[must_use]
    pub fn pending_payload(&self) -> Option<&AttemptPayload> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(self)
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<Transition, SessionError> {
        self.dispatch(Command::Start, now)
    }

    /// Record `raw` for the question at `index`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAnswer` for a blank value, plus the errors of [`ExamSession::dispatch`].
    /// Once submitting or terminated the value is not inspected.
    pub fn answer(
        &mut self,
        index: usize,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, SessionError> {
        if self.ignores_answers() {
            return Ok(Transition::Ignored);
        }
        let value = AnswerValue::new(raw)?;
        self.dispatch(Command::Answer { index, value }, now)
    }

    /// Phases in which `answer` is a no-op regardless of its input.
    #[must_use]
    pub fn ignores_answers(&self) -> bool {
        matches!(self.state.phase, Phase::Submitting | Phase::Terminated(_))
    }

    pub fn advance(&mut self, index: usize, now: DateTime<Utc>) -> Result<Transition, SessionError> {
        self.dispatch(Command::Advance { index }, now)
    }

    pub fn submit(&mut self, force: bool, now: DateTime<Utc>) -> Result<Transition, SessionError> {
        self.dispatch(Command::Submit { force }, now)
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<Transition, SessionError> {
        self.dispatch(Command::Tick, now)
    }

    pub fn abandon(&mut self, now: DateTime<Utc>) -> Result<Transition, SessionError> {
        self.dispatch(Command::Abandon, now)
    }

    /// Single entry point for every state change.
    ///
    /// # Errors
    ///
    /// - `InvalidPhase` when the command makes no sense before the session is running.
    /// - `InvalidNavigation` when `answer`/`advance` target a non-current index.
    ///
    /// Commands after a final `Terminated` state return `Ok(Transition::Ignored)`.
    pub fn dispatch(
        &mut self,
        command: Command,
        now: DateTime<Utc>,
    ) -> Result<Transition, SessionError> {
        let phase = self.state.phase;
        if phase.is_final() {
            return Ok(Transition::Ignored);
        }

        match (phase, command) {
            (_, Command::Tick) if phase != Phase::InProgress => Ok(Transition::Ignored),
            (Phase::Instructions, Command::Start) => Ok(self.begin()),
            (
                Phase::Idle | Phase::Instructions | Phase::InProgress | Phase::Terminated(_),
                Command::Abandon,
            ) => {
                self.state.stop_timers();
                self.state.phase = Phase::Terminated(Outcome::Abandoned);
                Ok(Transition::Abandoned)
            }
            (Phase::InProgress, Command::Answer { index, value }) => {
                let index = self.state.nav.ensure_current(index)?;
                self.state.answers.record(index, value);
                Ok(Transition::Answered { index })
            }
            (Phase::InProgress, Command::Advance { index }) => {
                let index = self.state.nav.ensure_current(index)?;
                Ok(self.leave_question(index, false, now))
            }
            (Phase::InProgress, Command::Submit { force }) => {
                let unanswered = self.state.answers.unanswered(self.exam.question_count());
                if !unanswered.is_empty() && !force {
                    return Ok(Transition::IncompleteWarning { unanswered });
                }
                let reason = if unanswered.is_empty() {
                    SubmitReason::UserSubmitted
                } else {
                    SubmitReason::UserForced
                };
                Ok(self.enter_submitting(reason, now))
            }
            (Phase::InProgress, Command::Tick) => Ok(self.on_tick(now)),
            (Phase::Terminated(Outcome::Error), Command::Submit { .. }) => Ok(self.retry()),
            (Phase::Submitting | Phase::Terminated(_), _) => Ok(Transition::Ignored),
            (phase, command) => Err(SessionError::InvalidPhase {
                command: command.name(),
                phase,
            }),
        }
    }

    /// `Submitting -> Terminated(Success)`.
    ///
    /// # Errors
    ///
    /// Returns `NotSubmitting` unless a submission is in flight.
    pub fn complete_submission(
        &mut self,
        attempt_id: AttemptId,
    ) -> Result<Transition, SessionError> {
        if self.state.phase != Phase::Submitting {
            return Err(SessionError::NotSubmitting);
        }
        let payload = self.pending.take().ok_or(SessionError::NotSubmitting)?;
        let score = ScoreReport::grade(&self.exam, &payload.answers);
        self.receipt = Some(SubmissionReceipt {
            attempt_id,
            payload,
            score,
        });
        self.last_error = None;
        self.state.answers = AnswerStore::new();
        self.state.phase = Phase::Terminated(Outcome::Success);
        Ok(Transition::Submitted { attempt_id })
    }

    /// `Submitting -> Terminated(Error)`, keeping the payload for a retry.
    ///
    /// # Errors
    ///
    /// Returns `NotSubmitting` unless a submission is in flight.
    pub fn fail_submission(&mut self, reason: impl Into<String>) -> Result<Transition, SessionError> {
        if self.state.phase != Phase::Submitting {
            return Err(SessionError::NotSubmitting);
        }
        self.last_error = Some(reason.into());
        self.state.phase = Phase::Terminated(Outcome::Error);
        Ok(Transition::SubmissionFailed)
    }

    fn begin(&mut self) -> Transition {
        let questions = self.exam.questions();
        self.total_allowance_secs = if questions.is_empty() {
            self.exam.duration_minutes().saturating_mul(60)
        } else {
            questions
                .iter()
                .map(|q| self.policy.allowance(q, 0))
                .fold(0_u32, u32::saturating_add)
        };

        self.state.exam_timer.reset(self.total_allowance_secs);
        self.state.nav.enter_first();
        let question_allowance_secs = self.exam.question(0).map(|q| self.policy.allowance(q, 0));
        if let Some(secs) = question_allowance_secs {
            self.state.question_timer.reset(secs);
        }
        self.state.phase = Phase::InProgress;

        Transition::Started {
            total_allowance_secs: self.total_allowance_secs,
            question_allowance_secs,
        }
    }

    fn on_tick(&mut self, now: DateTime<Utc>) -> Transition {
        // Exam timer first: its expiry preempts whatever the question timer does.
        if self.state.exam_timer.tick() == CountdownTick::Expired {
            return self.enter_submitting(SubmitReason::ExamTimeExpired, now);
        }

        match (self.state.question_timer.tick(), self.state.nav.current()) {
            (CountdownTick::Expired, Some(index)) => self.leave_question(index, true, now),
            _ => Transition::Ticked {
                question_time_left: self.state.question_time_left(),
                total_time_left: self.state.total_time_left(),
            },
        }
    }

    fn leave_question(&mut self, from: usize, timed_out: bool, now: DateTime<Utc>) -> Transition {
        if self.state.nav.is_last() {
            let reason = if timed_out {
                SubmitReason::QuestionTimeExpired
            } else {
                SubmitReason::LastQuestion
            };
            return self.enter_submitting(reason, now);
        }

        if let Some(left) = self.exam.question(from) {
            self.state.adaptive_reduction_secs = self.policy.next_reduction(
                self.state.adaptive_reduction_secs,
                left,
                self.state.answers.is_answered(from),
            );
        }

        let Some(to) = self.state.nav.step() else {
            return Transition::Ignored;
        };
        let allowance_secs = self
            .exam
            .question(to)
            .map_or(0, |q| self.policy.allowance(q, self.state.adaptive_reduction_secs));
        self.state.question_timer.reset(allowance_secs);

        Transition::Advanced {
            from,
            to,
            allowance_secs,
            reduction_secs: self.state.adaptive_reduction_secs,
            timed_out,
        }
    }

    fn enter_submitting(&mut self, reason: SubmitReason, now: DateTime<Utc>) -> Transition {
        self.state.stop_timers();
        let payload = AttemptPayload::build(
            self.exam.id(),
            self.attempt_number,
            self.state.answers.to_slots(self.exam.question_count()),
            self.total_allowance_secs,
            self.state.total_time_left(),
            now,
            reason,
        );
        self.pending = Some(payload);
        self.state.phase = Phase::Submitting;
        Transition::SubmissionReady { reason }
    }

    fn retry(&mut self) -> Transition {
        match self.pending.as_ref() {
            Some(payload) => {
                let reason = payload.reason;
                self.state.phase = Phase::Submitting;
                Transition::SubmissionReady { reason }
            }
            None => Transition::Ignored,
        }
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("id", &self.id)
            .field("exam_id", &self.exam.id())
            .field("phase", &self.state.phase)
            .field("current", &self.state.nav.current())
            .field("answers_len", &self.state.answers.len())
            .field("question_time_left", &self.state.question_time_left())
            .field("total_time_left", &self.state.total_time_left())
            .field("reduction", &self.state.adaptive_reduction_secs)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AttemptQuota, AvailabilityWindow, ExamDraft, ExamId, ExamStatus, Question, QuestionDraft,
        QuestionId, QuestionKind,
    };
    use crate::session::NavState;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn mcq(id: u64) -> Question {
        QuestionDraft::new(QuestionId::new(id), QuestionKind::MultipleChoice, format!("Q{id}"), "A")
            .with_options(["A", "B", "C", "D"])
            .validate()
            .unwrap()
    }

    fn open(id: u64, kind: QuestionKind) -> Question {
        QuestionDraft::new(QuestionId::new(id), kind, format!("Q{id}"), "true")
            .validate()
            .unwrap()
    }

    fn exam_with(questions: Vec<Question>) -> ExamDefinition {
        let now = fixed_now();
        ExamDraft {
            id: ExamId::new(7),
            title: "Unit".into(),
            subject: "Physics".into(),
            class_name: "11C".into(),
            questions,
            duration_minutes: 1,
            attempts: AttemptQuota { current: 0, max: 3 },
            window: AvailabilityWindow {
                start: now - Duration::hours(1),
                end: now + Duration::hours(1),
            },
            status: ExamStatus::Active,
        }
        .validate()
        .unwrap()
    }

    fn started(questions: Vec<Question>) -> ExamSession {
        let mut session =
            ExamSession::open(exam_with(questions), TimingPolicy::standard(), fixed_now()).unwrap();
        session.start(fixed_now()).unwrap();
        session
    }

    fn tick_n(session: &mut ExamSession, n: u32) -> Transition {
        let mut last = Transition::Ignored;
        for _ in 0..n {
            last = session.tick(fixed_now()).unwrap();
        }
        last
    }

    #[test]
    fn load_rejects_unavailable_exam() {
        let mut draft_exam = exam_with(vec![mcq(1)]);
        let err = ExamSession::open(
            draft_exam.clone(),
            TimingPolicy::standard(),
            fixed_now() + Duration::days(1),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::ExamUnavailable(_)));

        draft_exam = ExamDraft {
            id: draft_exam.id(),
            title: draft_exam.title().into(),
            subject: String::new(),
            class_name: String::new(),
            questions: draft_exam.questions().to_vec(),
            duration_minutes: 1,
            attempts: AttemptQuota { current: 3, max: 3 },
            window: draft_exam.window(),
            status: ExamStatus::Active,
        }
        .validate()
        .unwrap();
        let err = ExamSession::open(draft_exam, TimingPolicy::standard(), fixed_now()).unwrap_err();
        assert_eq!(err, SessionError::MaxAttemptsReached { max: 3 });
    }

    #[test]
    fn load_moves_idle_to_instructions() {
        let mut session = ExamSession::new(exam_with(vec![mcq(1)]), TimingPolicy::standard());
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.load(fixed_now()).unwrap(), Transition::Loaded);
        assert_eq!(session.phase(), Phase::Instructions);
        assert!(session.load(fixed_now()).is_err());
    }

    #[test]
    fn commands_before_start_are_rejected() {
        let mut session =
            ExamSession::open(exam_with(vec![mcq(1)]), TimingPolicy::standard(), fixed_now())
                .unwrap();
        let err = session.answer(0, "A", fixed_now()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidPhase {
                command: "answer",
                phase: Phase::Instructions
            }
        ));
        assert_eq!(session.tick(fixed_now()).unwrap(), Transition::Ignored);
    }

    #[test]
    fn start_initializes_timers_and_visits_first_question() {
        let session = started(vec![mcq(1), open(2, QuestionKind::FillInBlank)]);
        assert_eq!(session.phase(), Phase::InProgress);
        assert_eq!(session.total_allowance_secs(), 40);
        assert_eq!(session.state().total_time_left(), 40);
        assert_eq!(session.state().question_time_left(), 30);
        assert_eq!(session.state().current_index(), Some(0));
        assert!(session.state().navigation().is_visited(0));
    }

    #[test]
    fn three_mcq_walkthrough() {
        let mut session = started(vec![mcq(1), mcq(2), mcq(3)]);
        assert_eq!(session.total_allowance_secs(), 90);

        // Skip Q1 unanswered: multiple-choice is exempt from the penalty.
        tick_n(&mut session, 4);
        session.advance(0, fixed_now()).unwrap();
        assert_eq!(session.state().adaptive_reduction_secs(), 0);

        session.answer(1, "B", fixed_now()).unwrap();
        tick_n(&mut session, 3);
        session.advance(1, fixed_now()).unwrap();

        session.answer(2, "A", fixed_now()).unwrap();
        let t = session.advance(2, fixed_now()).unwrap();
        assert_eq!(
            t,
            Transition::SubmissionReady {
                reason: SubmitReason::LastQuestion
            }
        );
        assert_eq!(session.phase(), Phase::Submitting);

        let payload = session.pending_payload().unwrap();
        assert_eq!(payload.time_spent_secs, 90 - session.state().total_time_left());
        assert_eq!(payload.time_spent_secs, 7);
        assert!(payload.answers[0].is_none());
        assert_eq!(payload.answered_count(), 2);
    }

    #[test]
    fn single_open_question_auto_submits_with_no_answers() {
        let mut session = started(vec![open(1, QuestionKind::FillInBlank)]);
        assert_eq!(session.total_allowance_secs(), 10);

        let t = tick_n(&mut session, 9);
        assert!(matches!(t, Transition::Ticked { .. }));
        let t = session.tick(fixed_now()).unwrap();
        assert!(t.needs_submission());
        assert_eq!(session.phase(), Phase::Submitting);

        let payload = session.pending_payload().unwrap();
        assert_eq!(payload.answers, vec![None]);
        assert_eq!(payload.time_spent_secs, 10);
    }

    #[test]
    fn question_timeout_advances_and_penalizes_open_question() {
        let mut session = started(vec![
            open(1, QuestionKind::ShortAnswer),
            open(2, QuestionKind::ShortAnswer),
        ]);
        let t = tick_n(&mut session, 10);
        assert_eq!(
            t,
            Transition::Advanced {
                from: 0,
                to: 1,
                allowance_secs: 9,
                reduction_secs: 1,
                timed_out: true
            }
        );
        assert_eq!(session.state().question_time_left(), 9);
        assert_eq!(session.phase(), Phase::InProgress);
    }

    #[test]
    fn explicit_skip_and_timeout_penalize_alike() {
        let mut session = started(vec![
            open(1, QuestionKind::Descriptive),
            open(2, QuestionKind::Descriptive),
            open(3, QuestionKind::Descriptive),
        ]);
        session.advance(0, fixed_now()).unwrap();
        assert_eq!(session.state().adaptive_reduction_secs(), 1);
        tick_n(&mut session, 9);
        assert_eq!(session.state().adaptive_reduction_secs(), 2);
        assert_eq!(session.state().question_time_left(), 8);
    }

    #[test]
    fn answered_open_question_is_not_penalized() {
        let mut session = started(vec![
            open(1, QuestionKind::TrueFalse),
            open(2, QuestionKind::TrueFalse),
        ]);
        session.answer(0, "true", fixed_now()).unwrap();
        session.advance(0, fixed_now()).unwrap();
        assert_eq!(session.state().adaptive_reduction_secs(), 0);
    }

    #[test]
    fn reduction_is_bounded_and_non_decreasing() {
        let questions = (1..=9).map(|id| open(id, QuestionKind::FillInBlank)).collect();
        let mut session = started(questions);
        let mut previous = 0;
        for index in 0..8 {
            session.advance(index, fixed_now()).unwrap();
            let reduction = session.state().adaptive_reduction_secs();
            assert!(reduction >= previous);
            assert!(reduction <= 5);
            previous = reduction;
        }
        assert_eq!(previous, 5);
        assert_eq!(session.state().question_time_left(), 5);
    }

    #[test]
    fn navigation_is_one_way() {
        let mut session = started(vec![mcq(1), mcq(2), mcq(3)]);
        session.answer(0, "A", fixed_now()).unwrap();
        session.advance(0, fixed_now()).unwrap();

        let err = session.answer(0, "B", fixed_now()).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidNavigation {
                requested: 0,
                current: Some(1)
            }
        );
        assert!(session.advance(0, fixed_now()).is_err());
        assert!(session.answer(2, "B", fixed_now()).is_err());
        assert_eq!(session.state().answers().get(0).unwrap().as_str(), "A");
        assert_eq!(session.state().current_index(), Some(1));
        assert_eq!(
            session.state().navigation().states(),
            vec![NavState::Locked, NavState::Current, NavState::Unreachable]
        );
    }

    #[test]
    fn answer_does_not_touch_timers_or_index() {
        let mut session = started(vec![mcq(1), mcq(2)]);
        tick_n(&mut session, 5);
        session.answer(0, "C", fixed_now()).unwrap();
        session.answer(0, "D", fixed_now()).unwrap();
        assert_eq!(session.state().question_time_left(), 25);
        assert_eq!(session.state().total_time_left(), 55);
        assert_eq!(session.state().current_index(), Some(0));
        assert_eq!(session.state().answers().get(0).unwrap().as_str(), "D");
    }

    #[test]
    fn blank_answer_is_rejected() {
        let mut session = started(vec![mcq(1)]);
        assert!(matches!(
            session.answer(0, "  ", fixed_now()),
            Err(SessionError::InvalidAnswer(_))
        ));
        assert!(session.state().answers().is_empty());
    }

    #[test]
    fn incomplete_submit_warns_then_force_goes_through() {
        let mut session = started(vec![mcq(1), mcq(2)]);
        session.answer(0, "A", fixed_now()).unwrap();

        let t = session.submit(false, fixed_now()).unwrap();
        assert_eq!(t, Transition::IncompleteWarning { unanswered: vec![1] });
        assert_eq!(session.phase(), Phase::InProgress);

        let t = session.submit(true, fixed_now()).unwrap();
        assert_eq!(
            t,
            Transition::SubmissionReady {
                reason: SubmitReason::UserForced
            }
        );
    }

    #[test]
    fn exam_timer_preempts_question_timer() {
        let mut session = started(vec![
            open(1, QuestionKind::ShortAnswer),
            mcq(2),
        ]);
        // Spend the first question, then stall on the MCQ until the exam runs out.
        tick_n(&mut session, 10);
        assert_eq!(session.state().current_index(), Some(1));
        let t = tick_n(&mut session, 30);
        assert_eq!(
            t,
            Transition::SubmissionReady {
                reason: SubmitReason::ExamTimeExpired
            }
        );
        assert_eq!(session.pending_payload().unwrap().time_spent_secs, 40);
    }

    #[test]
    fn exam_timer_wins_when_both_expire_on_same_tick() {
        let mut session = started(vec![open(1, QuestionKind::FillInBlank)]);
        let t = tick_n(&mut session, 10);
        assert_eq!(
            t,
            Transition::SubmissionReady {
                reason: SubmitReason::ExamTimeExpired
            }
        );
    }

    #[test]
    fn timers_stop_on_submitting_and_stale_ticks_are_ignored() {
        let mut session = started(vec![mcq(1), mcq(2)]);
        session.submit(true, fixed_now()).unwrap();
        assert!(!session.state().timers_running());

        let left = session.state().total_time_left();
        assert_eq!(session.tick(fixed_now()).unwrap(), Transition::Ignored);
        assert_eq!(session.state().total_time_left(), left);
        assert_eq!(session.phase(), Phase::Submitting);
    }

    #[test]
    fn successful_submission_is_final_and_idempotent() {
        let mut session = started(vec![mcq(1)]);
        session.answer(0, "A", fixed_now()).unwrap();
        session.submit(false, fixed_now()).unwrap();

        let t = session.complete_submission(AttemptId::new(11)).unwrap();
        assert_eq!(t, Transition::Submitted { attempt_id: AttemptId::new(11) });
        assert_eq!(session.phase(), Phase::Terminated(Outcome::Success));

        let receipt = session.receipt().unwrap();
        assert_eq!(receipt.score.score, 10);
        assert!(session.state().answers().is_empty());

        assert_eq!(session.submit(false, fixed_now()).unwrap(), Transition::Ignored);
        assert_eq!(session.tick(fixed_now()).unwrap(), Transition::Ignored);
        assert_eq!(session.complete_submission(AttemptId::new(12)), Err(SessionError::NotSubmitting));
        assert_eq!(session.receipt().unwrap().attempt_id, AttemptId::new(11));
    }

    #[test]
    fn failed_submission_retries_identical_payload() {
        let mut session = started(vec![mcq(1), mcq(2)]);
        session.answer(0, "B", fixed_now()).unwrap();
        session.submit(true, fixed_now()).unwrap();
        let first = session.pending_payload().unwrap().clone();

        session.fail_submission("sink offline").unwrap();
        assert_eq!(session.phase(), Phase::Terminated(Outcome::Error));
        assert_eq!(session.last_error(), Some("sink offline"));

        // Later wall-clock time must not alter the frozen payload.
        let t = session
            .submit(false, fixed_now() + Duration::minutes(5))
            .unwrap();
        assert!(t.needs_submission());
        assert_eq!(session.phase(), Phase::Submitting);
        assert_eq!(session.pending_payload().unwrap(), &first);
    }

    #[test]
    fn abandon_terminates_without_attempt() {
        let mut session = started(vec![mcq(1)]);
        assert_eq!(session.abandon(fixed_now()).unwrap(), Transition::Abandoned);
        assert_eq!(session.phase(), Phase::Terminated(Outcome::Abandoned));
        assert!(session.pending_payload().is_none());
        assert!(!session.state().timers_running());
        assert_eq!(session.start(fixed_now()).unwrap(), Transition::Ignored);
    }

    #[test]
    fn blank_answer_after_termination_is_ignored() {
        let mut session = started(vec![mcq(1)]);
        session.abandon(fixed_now()).unwrap();
        assert_eq!(session.answer(0, " ", fixed_now()).unwrap(), Transition::Ignored);

        let mut session = started(vec![mcq(1)]);
        session.submit(true, fixed_now()).unwrap();
        assert_eq!(session.answer(0, "", fixed_now()).unwrap(), Transition::Ignored);
        session.fail_submission("sink offline").unwrap();
        assert_eq!(session.answer(0, "  ", fixed_now()).unwrap(), Transition::Ignored);
        assert_eq!(session.phase(), Phase::Terminated(Outcome::Error));
    }

    #[test]
    fn empty_exam_uses_duration() {
        let mut session = started(Vec::new());
        assert_eq!(session.total_allowance_secs(), 60);
        assert_eq!(session.state().current_index(), None);
        assert!(session.advance(0, fixed_now()).is_err());

        let t = tick_n(&mut session, 60);
        assert_eq!(
            t,
            Transition::SubmissionReady {
                reason: SubmitReason::ExamTimeExpired
            }
        );
    }

    #[test]
    fn time_spent_is_within_bounds_for_every_submit_path() {
        for ticks in [0, 1, 15, 39, 40] {
            let mut session = started(vec![open(1, QuestionKind::ShortAnswer), mcq(2)]);
            tick_n(&mut session, ticks);
            if session.phase() == Phase::InProgress {
                session.submit(true, fixed_now()).unwrap();
            }
            let spent = session.pending_payload().unwrap().time_spent_secs;
            assert!(spent <= session.total_allowance_secs());
            assert_eq!(spent, ticks);
        }
    }
}
