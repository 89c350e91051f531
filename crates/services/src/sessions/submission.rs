use std::sync::Arc;

use exam_core::session::{ExamSession, Phase, SessionError, Transition};
use storage::repository::{AttemptRepository, ExamRepository};
use tracing::{info, warn};

use crate::error::ServiceError;

/// Hands a frozen attempt payload to the sink and settles the session.
#[derive(Clone)]
pub struct SubmissionWorkflow {
    exams: Arc<dyn ExamRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl SubmissionWorkflow {
    #[must_use]
    pub fn new(exams: Arc<dyn ExamRepository>, attempts: Arc<dyn AttemptRepository>) -> Self {
        Self { exams, attempts }
    }

    /// Submit the session's pending payload.
    ///
    /// On success the session moves to `Terminated(Success)` and the exam's
    /// attempt counter is bumped best-effort. On failure the session moves to
    /// `Terminated(Error)` with its payload kept, so a later `submit` resends it.
    ///
    /// # Errors
    ///
    /// - `ServiceError::Session(NotSubmitting)` if no submission is in flight.
    /// - `ServiceError::SubmissionFailed` if the sink rejects the attempt.
    pub async fn finalize(&self, session: &mut ExamSession) -> Result<Transition, ServiceError> {
        if session.phase() != Phase::Submitting {
            return Err(SessionError::NotSubmitting.into());
        }
        let payload = session
            .pending_payload()
            .cloned()
            .ok_or(SessionError::NotSubmitting)?;

        match self.attempts.submit_attempt(&payload).await {
            Ok(attempt_id) => {
                let transition = session.complete_submission(attempt_id)?;
                info!(
                    session_id = %session.id(),
                    exam_id = %payload.exam_id,
                    attempt_id = %attempt_id,
                    reason = %payload.reason,
                    time_spent_secs = payload.time_spent_secs,
                    "attempt submitted"
                );
                if let Err(err) = self.exams.increment_attempts(payload.exam_id).await {
                    warn!(
                        exam_id = %payload.exam_id,
                        error = %err,
                        "failed to increment attempt count"
                    );
                }
                Ok(transition)
            }
            Err(err) => {
                warn!(
                    session_id = %session.id(),
                    exam_id = %payload.exam_id,
                    error = %err,
                    "attempt submission failed"
                );
                session.fail_submission(err.to_string())?;
                Err(ServiceError::SubmissionFailed(err))
            }
        }
    }
}
