mod answers;
mod countdown;
mod machine;
mod navigation;
mod snapshot;

use thiserror::Error;

use crate::model::{QuestionError, Unavailable};

pub use answers::AnswerStore;
pub use countdown::{Countdown, CountdownTick};
pub use machine::{Command, ExamSession, Outcome, Phase, SessionState, SubmissionReceipt, Transition};
pub use navigation::{NavState, NavigationGuard};
pub use snapshot::SessionSnapshot;

/// Errors emitted by the exam session state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("exam unavailable: {0}")]
    ExamUnavailable(Unavailable),

    #[error("maximum attempts ({max}) reached")]
    MaxAttemptsReached { max: u32 },

    #[error("question {requested} is not the current question ({current:?})")]
    InvalidNavigation {
        requested: usize,
        current: Option<usize>,
    },

    #[error("`{command}` is not accepted while {phase}")]
    InvalidPhase { command: &'static str, phase: Phase },

    #[error(transparent)]
    InvalidAnswer(#[from] QuestionError),

    #[error("session is not awaiting a submission result")]
    NotSubmitting,
}

impl From<Unavailable> for SessionError {
    fn from(reason: Unavailable) -> Self {
        match reason {
            Unavailable::MaxAttemptsReached { max } => SessionError::MaxAttemptsReached { max },
            other => SessionError::ExamUnavailable(other),
        }
    }
}
