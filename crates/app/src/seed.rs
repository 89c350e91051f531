use chrono::{DateTime, Duration, Utc};
use exam_core::model::{
    AttemptQuota, AvailabilityWindow, Difficulty, ExamDefinition, ExamDraft, ExamId, ExamStatus,
    QuestionDraft, QuestionId, QuestionKind,
};

/// Demonstration exam covering every question kind, open for 30 days from `now`.
pub fn demo_exam(id: ExamId, now: DateTime<Utc>) -> Result<ExamDefinition, exam_core::Error> {
    let questions = vec![
        QuestionDraft::new(
            QuestionId::new(1),
            QuestionKind::MultipleChoice,
            "Which planet is closest to the sun?",
            "Mercury",
        )
        .with_options(["Venus", "Mercury", "Mars", "Earth"])
        .with_difficulty(Difficulty::Easy)
        .validate()?,
        QuestionDraft::new(
            QuestionId::new(2),
            QuestionKind::TrueFalse,
            "Light travels faster than sound.",
            "true",
        )
        .validate()?,
        QuestionDraft::new(
            QuestionId::new(3),
            QuestionKind::FillInBlank,
            "Water boils at ___ degrees Celsius at sea level.",
            "100",
        )
        .validate()?,
        QuestionDraft::new(
            QuestionId::new(4),
            QuestionKind::ShortAnswer,
            "Name the gas plants absorb from the air.",
            "carbon dioxide",
        )
        .with_points(15)
        .validate()?,
        QuestionDraft::new(
            QuestionId::new(5),
            QuestionKind::Descriptive,
            "Explain why the moon has phases.",
            "Graded manually",
        )
        .with_time_limit(45)
        .with_difficulty(Difficulty::Hard)
        .validate()?,
    ];

    Ok(ExamDraft {
        id,
        title: "General Science Check".into(),
        subject: "Science".into(),
        class_name: "Demo".into(),
        questions,
        duration_minutes: 10,
        attempts: AttemptQuota { current: 0, max: 3 },
        window: AvailabilityWindow {
            start: now - Duration::hours(1),
            end: now + Duration::days(30),
        },
        status: ExamStatus::Active,
    }
    .validate()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::time::fixed_now;

    #[test]
    fn demo_exam_is_available_right_away() {
        let exam = demo_exam(ExamId::new(1), fixed_now()).unwrap();
        assert_eq!(exam.question_count(), 5);
        assert_eq!(exam.check_available(fixed_now()), Ok(()));
    }
}
