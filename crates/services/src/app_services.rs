use std::sync::Arc;

use exam_core::TimingPolicy;
use storage::repository::{AttemptRepository, ExamRepository, Storage};

use crate::Clock;
use crate::error::AppServicesError;
use crate::sessions::ExamSessionService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    exam_sessions: Arc<ExamSessionService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        policy: TimingPolicy,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, policy))
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, policy: TimingPolicy) -> Self {
        let exam_sessions = Arc::new(
            ExamSessionService::new(
                clock,
                Arc::clone(&storage.exams),
                Arc::clone(&storage.attempts),
            )
            .with_policy(policy),
        );
        Self {
            storage,
            exam_sessions,
        }
    }

    #[must_use]
    pub fn exam_sessions(&self) -> Arc<ExamSessionService> {
        Arc::clone(&self.exam_sessions)
    }

    #[must_use]
    pub fn exams(&self) -> Arc<dyn ExamRepository> {
        Arc::clone(&self.storage.exams)
    }

    #[must_use]
    pub fn attempts(&self) -> Arc<dyn AttemptRepository> {
        Arc::clone(&self.storage.attempts)
    }
}
