use exam_core::model::{
    AnswerValue, Attempt, AttemptId, Difficulty, ExamId, Question, QuestionDraft, QuestionId,
    QuestionKind, SubmitReason,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn exam_id_from_i64(v: i64) -> Result<ExamId, StorageError> {
    Ok(ExamId::new(i64_to_u64("exam_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn attempt_id_from_i64(v: i64) -> Result<AttemptId, StorageError> {
    Ok(AttemptId::new(i64_to_u64("attempt_id", v)?))
}

pub(crate) fn parse_submit_reason(s: &str) -> Result<SubmitReason, StorageError> {
    match s {
        "last_question" => Ok(SubmitReason::LastQuestion),
        "exam_time_expired" => Ok(SubmitReason::ExamTimeExpired),
        "question_time_expired" => Ok(SubmitReason::QuestionTimeExpired),
        "user_submitted" => Ok(SubmitReason::UserSubmitted),
        "user_forced" => Ok(SubmitReason::UserForced),
        _ => Err(StorageError::Serialization(format!("invalid reason: {s}"))),
    }
}

/// Answers are stored as a JSON array with `null` for unanswered slots.
pub(crate) fn answers_to_json(answers: &[Option<AnswerValue>]) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(ser)
}

pub(crate) fn answers_from_json(raw: &str) -> Result<Vec<Option<AnswerValue>>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let kind: QuestionKind = row
        .try_get::<String, _>("kind")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let difficulty: Difficulty = row
        .try_get::<String, _>("difficulty")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let options: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("options").map_err(ser)?).map_err(ser)?;
    let time_limit_secs = row
        .try_get::<Option<i64>, _>("time_limit_secs")
        .map_err(ser)?
        .map(|v| i64_to_u32("time_limit_secs", v))
        .transpose()?;

    QuestionDraft {
        id: question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        text: row.try_get("text").map_err(ser)?,
        kind,
        options,
        correct_answer: row.try_get("correct_answer").map_err(ser)?,
        points: Some(i64_to_u32(
            "points",
            row.try_get::<i64, _>("points").map_err(ser)?,
        )?),
        time_limit_secs,
        difficulty,
    }
    .validate()
    .map_err(ser)
}

pub(crate) fn map_attempt_row(row: &SqliteRow) -> Result<Attempt, StorageError> {
    let reason_str: String = row.try_get("reason").map_err(ser)?;
    let answers_raw: String = row.try_get("answers").map_err(ser)?;

    Ok(Attempt {
        id: attempt_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        exam_id: exam_id_from_i64(row.try_get::<i64, _>("exam_id").map_err(ser)?)?,
        attempt_number: i64_to_u32(
            "attempt_number",
            row.try_get::<i64, _>("attempt_number").map_err(ser)?,
        )?,
        answers: answers_from_json(&answers_raw)?,
        time_spent_secs: i64_to_u32(
            "time_spent_secs",
            row.try_get::<i64, _>("time_spent_secs").map_err(ser)?,
        )?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
        reason: parse_submit_reason(&reason_str)?,
    })
}
