//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::ExamId;
use exam_core::session::SessionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by exam session services and the session driver.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("exam {0} not found")]
    ExamNotFound(ExamId),
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The sink rejected the attempt. The session keeps its payload for a retry.
    #[error("submission failed: {0}")]
    SubmissionFailed(#[source] StorageError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("session driver has stopped")]
    DriverClosed,
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
