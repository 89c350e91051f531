use exam_core::model::{
    AttemptQuota, AvailabilityWindow, ExamDefinition, ExamDraft, ExamId, ExamStatus,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    conn, exam_id_from_i64, i64_to_u32, id_to_i64, map_question_row, ser,
};
use crate::repository::{ExamRepository, StorageError};

#[async_trait::async_trait]
impl ExamRepository for SqliteRepository {
    async fn upsert_exam(&self, exam: &ExamDefinition) -> Result<(), StorageError> {
        let exam_id = id_to_i64("exam_id", exam.id().value())?;
        let attempts = exam.attempts();
        let window = exam.window();

        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO exams (id, title, subject, class_name, duration_minutes, attempts_current, attempts_max, window_start, window_end, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                subject = excluded.subject,
                class_name = excluded.class_name,
                duration_minutes = excluded.duration_minutes,
                attempts_current = excluded.attempts_current,
                attempts_max = excluded.attempts_max,
                window_start = excluded.window_start,
                window_end = excluded.window_end,
                status = excluded.status
            ",
        )
        .bind(exam_id)
        .bind(exam.title())
        .bind(exam.subject())
        .bind(exam.class_name())
        .bind(i64::from(exam.duration_minutes()))
        .bind(i64::from(attempts.current))
        .bind(i64::from(attempts.max))
        .bind(window.start)
        .bind(window.end)
        .bind(exam.status().as_str())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // Question sets are replaced wholesale so removed questions do not linger.
        sqlx::query("DELETE FROM questions WHERE exam_id = ?1")
            .bind(exam_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, question) in exam.questions().iter().enumerate() {
            let options = serde_json::to_string(question.options()).map_err(ser)?;
            sqlx::query(
                r"
                INSERT INTO questions (exam_id, id, position, text, kind, options, correct_answer, points, time_limit_secs, difficulty)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ",
            )
            .bind(exam_id)
            .bind(id_to_i64("question_id", question.id().value())?)
            .bind(id_to_i64("position", position as u64)?)
            .bind(question.text())
            .bind(question.kind().as_str())
            .bind(options)
            .bind(question.correct_answer())
            .bind(i64::from(question.points()))
            .bind(question.time_limit_secs().map(i64::from))
            .bind(question.difficulty().as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_exam(&self, id: ExamId) -> Result<Option<ExamDefinition>, StorageError> {
        let exam_id = id_to_i64("exam_id", id.value())?;
        let row = sqlx::query(
            r"
            SELECT id, title, subject, class_name, duration_minutes, attempts_current, attempts_max, window_start, window_end, status
            FROM exams WHERE id = ?1
            ",
        )
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let question_rows = sqlx::query(
            r"
            SELECT id, text, kind, options, correct_answer, points, time_limit_secs, difficulty
            FROM questions
            WHERE exam_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut questions = Vec::with_capacity(question_rows.len());
        for q in &question_rows {
            questions.push(map_question_row(q)?);
        }

        exam_from_row(&row, questions).map(Some)
    }

    async fn increment_attempts(&self, id: ExamId) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE exams SET attempts_current = attempts_current + 1
            WHERE id = ?1
            ",
        )
        .bind(id_to_i64("exam_id", id.value())?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

fn exam_from_row(
    row: &SqliteRow,
    questions: Vec<exam_core::model::Question>,
) -> Result<ExamDefinition, StorageError> {
    let status: ExamStatus = row
        .try_get::<String, _>("status")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    ExamDraft {
        id: exam_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        subject: row.try_get("subject").map_err(ser)?,
        class_name: row.try_get("class_name").map_err(ser)?,
        questions,
        duration_minutes: i64_to_u32(
            "duration_minutes",
            row.try_get::<i64, _>("duration_minutes").map_err(ser)?,
        )?,
        attempts: AttemptQuota {
            current: i64_to_u32(
                "attempts_current",
                row.try_get::<i64, _>("attempts_current").map_err(ser)?,
            )?,
            max: i64_to_u32(
                "attempts_max",
                row.try_get::<i64, _>("attempts_max").map_err(ser)?,
            )?,
        },
        window: AvailabilityWindow {
            start: row.try_get("window_start").map_err(ser)?,
            end: row.try_get("window_end").map_err(ser)?,
        },
        status,
    }
    .validate()
    .map_err(ser)
}
