use thiserror::Error;

use crate::model::{ExamError, QuestionError};
use crate::session::SessionError;
use crate::timing::TimingPolicyError;

/// Umbrella error for callers that do not care which layer failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Timing(#[from] TimingPolicyError),
}
