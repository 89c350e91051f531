use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ids::{AttemptId, ExamId};
use crate::model::question::AnswerValue;

/// What pushed the session into submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitReason {
    /// Advanced past the final question.
    LastQuestion,
    ExamTimeExpired,
    /// The final question's own timer ran out.
    QuestionTimeExpired,
    UserSubmitted,
    /// User confirmed submission with unanswered questions.
    UserForced,
}

impl SubmitReason {
    #[must_use]
    pub fn is_automatic(self) -> bool {
        matches!(
            self,
            SubmitReason::ExamTimeExpired | SubmitReason::QuestionTimeExpired
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SubmitReason::LastQuestion => "last_question",
            SubmitReason::ExamTimeExpired => "exam_time_expired",
            SubmitReason::QuestionTimeExpired => "question_time_expired",
            SubmitReason::UserSubmitted => "user_submitted",
            SubmitReason::UserForced => "user_forced",
        }
    }
}

impl fmt::Display for SubmitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload handed to the submission sink.
///
/// Frozen when the session enters `Submitting`; a retry after a failed
/// submission resends this exact value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptPayload {
    pub exam_id: ExamId,
    /// 1-based; together with `exam_id` this is the sink's idempotency key.
    pub attempt_number: u32,
    /// One slot per question, `None` for questions left unanswered.
    pub answers: Vec<Option<AnswerValue>>,
    pub time_spent_secs: u32,
    pub submitted_at: DateTime<Utc>,
    pub reason: SubmitReason,
}

impl AttemptPayload {
    /// Compose the payload. Time spent saturates into `0..=total_allowance_secs`.
    #[must_use]
    pub fn build(
        exam_id: ExamId,
        attempt_number: u32,
        answers: Vec<Option<AnswerValue>>,
        total_allowance_secs: u32,
        total_time_left_secs: u32,
        submitted_at: DateTime<Utc>,
        reason: SubmitReason,
    ) -> Self {
        Self {
            exam_id,
            attempt_number,
            answers,
            time_spent_secs: total_allowance_secs.saturating_sub(total_time_left_secs),
            submitted_at,
            reason,
        }
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Persisted attempt, as returned by the submission sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub exam_id: ExamId,
    pub attempt_number: u32,
    pub answers: Vec<Option<AnswerValue>>,
    pub time_spent_secs: u32,
    pub submitted_at: DateTime<Utc>,
    pub reason: SubmitReason,
}

impl Attempt {
    #[must_use]
    pub fn from_payload(id: AttemptId, payload: AttemptPayload) -> Self {
        Self {
            id,
            exam_id: payload.exam_id,
            attempt_number: payload.attempt_number,
            answers: payload.answers,
            time_spent_secs: payload.time_spent_secs,
            submitted_at: payload.submitted_at,
            reason: payload.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn time_spent_never_exceeds_allowance() {
        let payload = AttemptPayload::build(
            ExamId::new(1),
            1,
            vec![None],
            90,
            120,
            fixed_now(),
            SubmitReason::UserForced,
        );
        assert_eq!(payload.time_spent_secs, 0);

        let payload = AttemptPayload::build(
            ExamId::new(1),
            1,
            vec![None],
            90,
            0,
            fixed_now(),
            SubmitReason::ExamTimeExpired,
        );
        assert_eq!(payload.time_spent_secs, 90);
    }

    #[test]
    fn answers_serialize_with_gaps() {
        let payload = AttemptPayload::build(
            ExamId::new(3),
            2,
            vec![Some(AnswerValue::new("a").unwrap()), None],
            20,
            5,
            fixed_now(),
            SubmitReason::LastQuestion,
        );
        let json = serde_json::to_value(&payload.answers).unwrap();
        assert_eq!(json, serde_json::json!(["a", null]));
        assert_eq!(payload.answered_count(), 1);
    }

    #[test]
    fn only_timer_expiry_is_automatic() {
        assert!(SubmitReason::ExamTimeExpired.is_automatic());
        assert!(SubmitReason::QuestionTimeExpired.is_automatic());
        assert!(!SubmitReason::LastQuestion.is_automatic());
        assert!(!SubmitReason::UserForced.is_automatic());
    }
}
