use std::sync::Arc;

use exam_core::TimingPolicy;
use exam_core::model::{Attempt, ExamId};
use exam_core::session::ExamSession;
use storage::repository::{AttemptRepository, ExamRepository};
use tracing::{debug, info};

use super::driver::{DriverConfig, SessionDriver, SessionHandle};
use super::submission::SubmissionWorkflow;
use crate::Clock;
use crate::error::ServiceError;

/// Loads exams into sessions and hands them to a driver.
#[derive(Clone)]
pub struct ExamSessionService {
    clock: Clock,
    policy: TimingPolicy,
    exams: Arc<dyn ExamRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl ExamSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        exams: Arc<dyn ExamRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            clock,
            policy: TimingPolicy::standard(),
            exams,
            attempts,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: TimingPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Fetch an exam and open a session on it (phase `Instructions`).
    ///
    /// # Errors
    ///
    /// - `ServiceError::ExamNotFound` if the exam source has no such exam.
    /// - `ServiceError::Session` with `ExamUnavailable` or `MaxAttemptsReached`
    ///   when the exam cannot be taken now.
    /// - `ServiceError::Storage` if the exam source fails.
    pub async fn load_exam(&self, exam_id: ExamId) -> Result<ExamSession, ServiceError> {
        let exam = self
            .exams
            .get_exam(exam_id)
            .await?
            .ok_or(ServiceError::ExamNotFound(exam_id))?;
        debug!(exam_id = %exam_id, questions = exam.question_count(), "exam fetched");

        let session = ExamSession::open(exam, self.policy, self.clock.now())?;
        info!(
            session_id = %session.id(),
            exam_id = %exam_id,
            attempt = session.attempt_number(),
            "session opened"
        );
        Ok(session)
    }

    #[must_use]
    pub fn workflow(&self) -> SubmissionWorkflow {
        SubmissionWorkflow::new(Arc::clone(&self.exams), Arc::clone(&self.attempts))
    }

    /// Load `exam_id` and spawn a driver for it on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Same as [`ExamSessionService::load_exam`].
    pub async fn open_driven(
        &self,
        exam_id: ExamId,
        config: DriverConfig,
    ) -> Result<(SessionHandle, tokio::task::JoinHandle<ExamSession>), ServiceError> {
        let session = self.load_exam(exam_id).await?;
        Ok(SessionDriver::spawn(session, self.workflow(), self.clock, config))
    }

    /// Attempts previously persisted for `exam_id`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the sink cannot be read.
    pub async fn list_attempts(&self, exam_id: ExamId) -> Result<Vec<Attempt>, ServiceError> {
        Ok(self.attempts.list_attempts(exam_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use exam_core::model::{
        AttemptQuota, AvailabilityWindow, ExamDraft, ExamStatus, QuestionDraft, QuestionId,
        QuestionKind,
    };
    use exam_core::session::{Phase, SessionError};
    use exam_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    async fn service_with(attempts: AttemptQuota, status: ExamStatus) -> ExamSessionService {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        let exam = ExamDraft {
            id: ExamId::new(1),
            title: "Chemistry".into(),
            subject: "Science".into(),
            class_name: "10B".into(),
            questions: vec![
                QuestionDraft::new(QuestionId::new(1), QuestionKind::ShortAnswer, "H2O?", "water")
                    .validate()
                    .unwrap(),
            ],
            duration_minutes: 5,
            attempts,
            window: AvailabilityWindow {
                start: now - Duration::hours(1),
                end: now + Duration::hours(1),
            },
            status,
        }
        .validate()
        .unwrap();
        repo.upsert_exam(&exam).await.unwrap();
        ExamSessionService::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo))
    }

    #[tokio::test]
    async fn load_exam_opens_session_in_instructions() {
        let service = service_with(AttemptQuota { current: 1, max: 3 }, ExamStatus::Active).await;
        let session = service.load_exam(ExamId::new(1)).await.unwrap();
        assert_eq!(session.phase(), Phase::Instructions);
        assert_eq!(session.attempt_number(), 2);
    }

    #[tokio::test]
    async fn load_exam_reports_missing_exam() {
        let service = service_with(AttemptQuota { current: 0, max: 1 }, ExamStatus::Active).await;
        let err = service.load_exam(ExamId::new(2)).await.unwrap_err();
        assert!(matches!(err, ServiceError::ExamNotFound(id) if id == ExamId::new(2)));
    }

    #[tokio::test]
    async fn load_exam_surfaces_precondition_errors() {
        let service = service_with(AttemptQuota { current: 1, max: 1 }, ExamStatus::Active).await;
        assert!(matches!(
            service.load_exam(ExamId::new(1)).await,
            Err(ServiceError::Session(SessionError::MaxAttemptsReached { max: 1 }))
        ));

        let service = service_with(AttemptQuota { current: 0, max: 1 }, ExamStatus::Draft).await;
        assert!(matches!(
            service.load_exam(ExamId::new(1)).await,
            Err(ServiceError::Session(SessionError::ExamUnavailable(_)))
        ));
    }
}
