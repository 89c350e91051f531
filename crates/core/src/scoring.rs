//! Informational scoring shown to the test-taker right after submission.
//!
//! Not authoritative: the persisted result comes from the submission sink.

use serde::{Deserialize, Serialize};

use crate::model::{AnswerValue, ExamDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl Rating {
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Rating::Excellent
        } else if percentage >= 75.0 {
            Rating::Good
        } else if percentage >= 50.0 {
            Rating::Fair
        } else {
            Rating::NeedsImprovement
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Rating::Excellent => "Excellent",
            Rating::Good => "Good",
            Rating::Fair => "Fair",
            Rating::NeedsImprovement => "Needs improvement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub score: u32,
    /// Sum of points over auto-gradable questions.
    pub max_score: u32,
    pub correct: usize,
    pub answered: usize,
    /// Descriptive questions with an answer awaiting manual grading.
    pub pending_review: usize,
    pub percentage: f64,
    pub rating: Rating,
}

impl ScoreReport {
    /// Grade `answers` (one slot per question, in exam order) against `exam`.
    #[must_use]
    pub fn grade(exam: &ExamDefinition, answers: &[Option<AnswerValue>]) -> Self {
        let mut score = 0_u32;
        let mut max_score = 0_u32;
        let mut correct = 0;
        let mut answered = 0;
        let mut pending_review = 0;

        for (index, question) in exam.questions().iter().enumerate() {
            let answer = answers.get(index).and_then(Option::as_ref);
            if answer.is_some() {
                answered += 1;
            }

            if !question.kind().is_auto_gradable() {
                if answer.is_some() {
                    pending_review += 1;
                }
                continue;
            }

            max_score = max_score.saturating_add(question.points());
            if answer.is_some_and(|value| question.is_correct(value)) {
                score = score.saturating_add(question.points());
                correct += 1;
            }
        }

        let percentage = if max_score == 0 {
            0.0
        } else {
            (f64::from(score) / f64::from(max_score) * 100.0 * 10.0).round() / 10.0
        };

        Self {
            score,
            max_score,
            correct,
            answered,
            pending_review,
            percentage,
            rating: Rating::from_percentage(percentage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AttemptQuota, AvailabilityWindow, ExamDraft, ExamId, ExamStatus, QuestionDraft,
        QuestionId, QuestionKind,
    };
    use crate::time::fixed_now;

    fn exam() -> ExamDefinition {
        let now = fixed_now();
        ExamDraft {
            id: ExamId::new(1),
            title: "Mixed".into(),
            subject: "General".into(),
            class_name: "10B".into(),
            questions: vec![
                QuestionDraft::new(QuestionId::new(1), QuestionKind::MultipleChoice, "Q1", "B")
                    .with_options(["A", "B", "C"])
                    .validate()
                    .unwrap(),
                QuestionDraft::new(QuestionId::new(2), QuestionKind::TrueFalse, "Q2", "true")
                    .with_points(20)
                    .validate()
                    .unwrap(),
                QuestionDraft::new(QuestionId::new(3), QuestionKind::Descriptive, "Q3", "essay")
                    .validate()
                    .unwrap(),
            ],
            duration_minutes: 5,
            attempts: AttemptQuota { current: 0, max: 1 },
            window: AvailabilityWindow { start: now, end: now },
            status: ExamStatus::Active,
        }
        .validate()
        .unwrap()
    }

    fn answer(raw: &str) -> Option<AnswerValue> {
        Some(AnswerValue::new(raw).unwrap())
    }

    #[test]
    fn grades_auto_gradable_questions_only() {
        let report = ScoreReport::grade(&exam(), &[answer("b"), answer("false"), answer("long text")]);
        assert_eq!(report.score, 10);
        assert_eq!(report.max_score, 30);
        assert_eq!(report.correct, 1);
        assert_eq!(report.answered, 3);
        assert_eq!(report.pending_review, 1);
        assert!((report.percentage - 33.3).abs() < f64::EPSILON);
        assert_eq!(report.rating, Rating::NeedsImprovement);
    }

    #[test]
    fn empty_answers_score_zero() {
        let report = ScoreReport::grade(&exam(), &[]);
        assert_eq!(report.score, 0);
        assert_eq!(report.answered, 0);
        assert_eq!(report.pending_review, 0);
    }

    #[test]
    fn rating_thresholds() {
        assert_eq!(Rating::from_percentage(90.0), Rating::Excellent);
        assert_eq!(Rating::from_percentage(75.0), Rating::Good);
        assert_eq!(Rating::from_percentage(50.0), Rating::Fair);
        assert_eq!(Rating::from_percentage(49.9), Rating::NeedsImprovement);
    }
}
