use async_trait::async_trait;
use exam_core::model::{Attempt, AttemptId, AttemptPayload, ExamDefinition, ExamId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Source of exam definitions (the content service).
#[async_trait]
pub trait ExamRepository: Send + Sync {
    /// Persist or replace an exam together with its questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the exam cannot be stored.
    async fn upsert_exam(&self, exam: &ExamDefinition) -> Result<(), StorageError>;

    /// Fetch an exam by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for adapter failures; a missing exam is `Ok(None)`.
    async fn get_exam(&self, id: ExamId) -> Result<Option<ExamDefinition>, StorageError>;

    /// Bump the used-attempt counter after a successful submission.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the exam does not exist.
    async fn increment_attempts(&self, id: ExamId) -> Result<(), StorageError>;
}

/// Submission sink for finished attempts.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Persist a finished attempt and return its ID.
    ///
    /// Idempotent on `(exam_id, attempt_number)`: resubmitting the same attempt
    /// returns the ID stored the first time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn submit_attempt(&self, payload: &AttemptPayload) -> Result<AttemptId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_attempt(&self, id: AttemptId) -> Result<Attempt, StorageError>;

    /// Attempts for an exam, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for adapter failures.
    async fn list_attempts(&self, exam_id: ExamId) -> Result<Vec<Attempt>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    exams: Arc<Mutex<HashMap<ExamId, ExamDefinition>>>,
    attempts: Arc<Mutex<Vec<Attempt>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl ExamRepository for InMemoryRepository {
    async fn upsert_exam(&self, exam: &ExamDefinition) -> Result<(), StorageError> {
        let mut guard = self.exams.lock().map_err(poisoned)?;
        guard.insert(exam.id(), exam.clone());
        Ok(())
    }

    async fn get_exam(&self, id: ExamId) -> Result<Option<ExamDefinition>, StorageError> {
        let guard = self.exams.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn increment_attempts(&self, id: ExamId) -> Result<(), StorageError> {
        let mut guard = self.exams.lock().map_err(poisoned)?;
        let exam = guard.remove(&id).ok_or(StorageError::NotFound)?;
        let used = exam.attempts().current.saturating_add(1);
        guard.insert(id, exam.with_attempts_used(used));
        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn submit_attempt(&self, payload: &AttemptPayload) -> Result<AttemptId, StorageError> {
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        if let Some(existing) = guard.iter().find(|a| {
            a.exam_id == payload.exam_id && a.attempt_number == payload.attempt_number
        }) {
            return Ok(existing.id);
        }
        let id = AttemptId::new(guard.len() as u64 + 1);
        guard.push(Attempt::from_payload(id, payload.clone()));
        Ok(id)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Attempt, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_attempts(&self, exam_id: ExamId) -> Result<Vec<Attempt>, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .filter(|a| a.exam_id == exam_id)
            .cloned()
            .collect())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub exams: Arc<dyn ExamRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
}
