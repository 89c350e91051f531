use chrono::Duration;
use exam_core::model::{
    AnswerValue, AttemptPayload, AttemptQuota, AvailabilityWindow, Difficulty, ExamDefinition,
    ExamDraft, ExamId, ExamStatus, QuestionDraft, QuestionId, QuestionKind, SubmitReason,
};
use exam_core::time::fixed_now;
use storage::repository::{AttemptRepository, ExamRepository, StorageError};
use storage::sqlite::SqliteRepository;

fn build_exam(id: u64) -> ExamDefinition {
    let now = fixed_now();
    ExamDraft {
        id: ExamId::new(id),
        title: "Geography".into(),
        subject: "Social studies".into(),
        class_name: "7B".into(),
        questions: vec![
            QuestionDraft::new(
                QuestionId::new(10),
                QuestionKind::MultipleChoice,
                "Largest ocean?",
                "Pacific",
            )
            .with_options(["Atlantic", "Pacific", "Indian"])
            .with_points(5)
            .validate()
            .unwrap(),
            QuestionDraft::new(QuestionId::new(3), QuestionKind::TrueFalse, "Nile is in Africa", "true")
                .with_time_limit(12)
                .with_difficulty(Difficulty::Easy)
                .validate()
                .unwrap(),
            QuestionDraft::new(QuestionId::new(7), QuestionKind::Descriptive, "Describe a delta", "n/a")
                .validate()
                .unwrap(),
        ],
        duration_minutes: 15,
        attempts: AttemptQuota { current: 0, max: 2 },
        window: AvailabilityWindow {
            start: now - Duration::hours(1),
            end: now + Duration::hours(1),
        },
        status: ExamStatus::Active,
    }
    .validate()
    .unwrap()
}

fn payload(exam_id: ExamId, attempt_number: u32) -> AttemptPayload {
    AttemptPayload::build(
        exam_id,
        attempt_number,
        vec![Some(AnswerValue::new("Pacific").unwrap()), None, None],
        40,
        15,
        fixed_now(),
        SubmitReason::UserForced,
    )
}

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_exam_and_question_order() {
    let repo = connect("memdb_exam_roundtrip").await;
    let exam = build_exam(1);
    repo.upsert_exam(&exam).await.unwrap();

    let fetched = repo.get_exam(exam.id()).await.unwrap().expect("exam");
    assert_eq!(fetched, exam);
    let ids: Vec<u64> = fetched.questions().iter().map(|q| q.id().value()).collect();
    assert_eq!(ids, vec![10, 3, 7]);
    assert_eq!(fetched.questions()[1].time_limit_secs(), Some(12));

    assert!(repo.get_exam(ExamId::new(404)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_upsert_replaces_questions() {
    let repo = connect("memdb_exam_upsert").await;
    let exam = build_exam(1);
    repo.upsert_exam(&exam).await.unwrap();

    let trimmed = ExamDraft {
        id: exam.id(),
        title: "Geography v2".into(),
        subject: exam.subject().into(),
        class_name: exam.class_name().into(),
        questions: exam.questions()[..1].to_vec(),
        duration_minutes: exam.duration_minutes(),
        attempts: exam.attempts(),
        window: exam.window(),
        status: exam.status(),
    }
    .validate()
    .unwrap();
    repo.upsert_exam(&trimmed).await.unwrap();

    let fetched = repo.get_exam(exam.id()).await.unwrap().unwrap();
    assert_eq!(fetched.title(), "Geography v2");
    assert_eq!(fetched.question_count(), 1);
}

#[tokio::test]
async fn sqlite_attempts_are_idempotent_per_attempt_number() {
    let repo = connect("memdb_attempts").await;
    let exam = build_exam(1);
    repo.upsert_exam(&exam).await.unwrap();

    let first = repo.submit_attempt(&payload(exam.id(), 1)).await.unwrap();
    let again = repo.submit_attempt(&payload(exam.id(), 1)).await.unwrap();
    assert_eq!(first, again);

    let second = repo.submit_attempt(&payload(exam.id(), 2)).await.unwrap();
    assert_ne!(first, second);

    let stored = repo.get_attempt(first).await.unwrap();
    assert_eq!(stored.answers, payload(exam.id(), 1).answers);
    assert_eq!(stored.time_spent_secs, 25);
    assert_eq!(stored.reason, SubmitReason::UserForced);

    let listed = repo.list_attempts(exam.id()).await.unwrap();
    assert_eq!(
        listed.iter().map(|a| a.attempt_number).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[tokio::test]
async fn sqlite_rejects_attempt_for_unknown_exam() {
    let repo = connect("memdb_attempt_fk").await;
    let err = repo
        .submit_attempt(&payload(ExamId::new(9), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_increments_attempt_counter() {
    let repo = connect("memdb_increment").await;
    let exam = build_exam(1);
    repo.upsert_exam(&exam).await.unwrap();

    repo.increment_attempts(exam.id()).await.unwrap();
    let fetched = repo.get_exam(exam.id()).await.unwrap().unwrap();
    assert_eq!(fetched.attempts(), AttemptQuota { current: 1, max: 2 });

    assert!(matches!(
        repo.increment_attempts(ExamId::new(2)).await,
        Err(StorageError::NotFound)
    ));
}
