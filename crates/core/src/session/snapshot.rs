use serde::{Deserialize, Serialize};

use crate::model::{AnswerValue, AttemptId, ExamId, SessionId};
use crate::scoring::ScoreReport;

use super::machine::{ExamSession, Phase};
use super::navigation::NavState;

/// Read-only projection of a session for hosts and UIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub exam_id: ExamId,
    pub phase: Phase,
    pub current_index: Option<usize>,
    pub question_count: usize,
    pub nav: Vec<NavState>,
    pub question_time_left: u32,
    pub total_time_left: u32,
    pub total_allowance_secs: u32,
    pub adaptive_reduction_secs: u32,
    pub answers: Vec<Option<AnswerValue>>,
    pub attempt_id: Option<AttemptId>,
    pub score: Option<ScoreReport>,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn capture(session: &ExamSession) -> Self {
        let state = session.state();
        let question_count = session.exam().question_count();
        let receipt = session.receipt();
        Self {
            session_id: session.id(),
            exam_id: session.exam().id(),
            phase: state.phase(),
            current_index: state.current_index(),
            question_count,
            nav: state.navigation().states(),
            question_time_left: state.question_time_left(),
            total_time_left: state.total_time_left(),
            total_allowance_secs: session.total_allowance_secs(),
            adaptive_reduction_secs: state.adaptive_reduction_secs(),
            answers: state.answers().to_slots(question_count),
            attempt_id: receipt.map(|r| r.attempt_id),
            score: receipt.map(|r| r.score.clone()),
            last_error: session.last_error().map(str::to_owned),
        }
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Terminated(_))
    }
}
