mod attempt;
mod exam;
mod ids;
mod question;

pub use ids::{AttemptId, ExamId, ParseIdError, QuestionId, SessionId};

pub use attempt::{Attempt, AttemptPayload, SubmitReason};
pub use exam::{
    AttemptQuota, AvailabilityWindow, ExamDefinition, ExamDraft, ExamError, ExamStatus,
    Unavailable,
};
pub use question::{
    AnswerValue, DEFAULT_POINTS, Difficulty, Question, QuestionDraft, QuestionError, QuestionKind,
};
