use exam_core::model::{Attempt, AttemptId, AttemptPayload, ExamId};

use super::SqliteRepository;
use super::mapping::{answers_to_json, attempt_id_from_i64, conn, id_to_i64, map_attempt_row};
use crate::repository::{AttemptRepository, StorageError};

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn submit_attempt(&self, payload: &AttemptPayload) -> Result<AttemptId, StorageError> {
        let exam_id = id_to_i64("exam_id", payload.exam_id.value())?;
        let attempt_number = i64::from(payload.attempt_number);

        // A duplicate (exam_id, attempt_number) keeps the first row; the lookup
        // below then returns its id.
        sqlx::query(
            r"
            INSERT INTO attempts (exam_id, attempt_number, answers, time_spent_secs, submitted_at, reason)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(exam_id, attempt_number) DO NOTHING
            ",
        )
        .bind(exam_id)
        .bind(attempt_number)
        .bind(answers_to_json(&payload.answers)?)
        .bind(i64::from(payload.time_spent_secs))
        .bind(payload.submitted_at)
        .bind(payload.reason.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;

        let id: i64 = sqlx::query_scalar(
            r"
            SELECT id FROM attempts
            WHERE exam_id = ?1 AND attempt_number = ?2
            ",
        )
        .bind(exam_id)
        .bind(attempt_number)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        attempt_id_from_i64(id)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Attempt, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, exam_id, attempt_number, answers, time_spent_secs, submitted_at, reason
            FROM attempts WHERE id = ?1
            ",
        )
        .bind(id_to_i64("attempt_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_attempt_row(&row)
    }

    async fn list_attempts(&self, exam_id: ExamId) -> Result<Vec<Attempt>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, exam_id, attempt_number, answers, time_spent_secs, submitted_at, reason
            FROM attempts
            WHERE exam_id = ?1
            ORDER BY attempt_number ASC
            ",
        )
        .bind(id_to_i64("exam_id", exam_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut attempts = Vec::with_capacity(rows.len());
        for row in rows {
            attempts.push(map_attempt_row(&row)?);
        }
        Ok(attempts)
    }
}
