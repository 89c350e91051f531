use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;

/// Points awarded for a question when the content service does not specify any.
pub const DEFAULT_POINTS: u32 = 10;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("correct answer cannot be empty")]
    EmptyCorrectAnswer,

    #[error("multiple-choice questions need at least two options")]
    TooFewOptions,

    #[error("only multiple-choice questions may carry options")]
    UnexpectedOptions,

    #[error("correct answer is not one of the options")]
    AnswerNotInOptions,

    #[error("true/false answer must be `true` or `false`")]
    InvalidTrueFalseAnswer,

    #[error("custom time limit must be > 0")]
    InvalidTimeLimit,

    #[error("unknown question kind: {0}")]
    UnknownKind(String),

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),

    #[error("answer cannot be empty")]
    EmptyAnswer,
}

//
// ─── KIND / DIFFICULTY ─────────────────────────────────────────────────────────
//

/// Shape of a question, which drives both its base time allowance and grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice,
    FillInBlank,
    TrueFalse,
    ShortAnswer,
    Descriptive,
}

impl QuestionKind {
    #[must_use]
    pub fn is_multiple_choice(self) -> bool {
        matches!(self, QuestionKind::MultipleChoice)
    }

    /// Descriptive answers need a human grader.
    #[must_use]
    pub fn is_auto_gradable(self) -> bool {
        !matches!(self, QuestionKind::Descriptive)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple-choice",
            QuestionKind::FillInBlank => "fill-in-blank",
            QuestionKind::TrueFalse => "true-false",
            QuestionKind::ShortAnswer => "short-answer",
            QuestionKind::Descriptive => "descriptive",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionKind {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple-choice" => Ok(QuestionKind::MultipleChoice),
            "fill-in-blank" => Ok(QuestionKind::FillInBlank),
            "true-false" => Ok(QuestionKind::TrueFalse),
            "short-answer" => Ok(QuestionKind::ShortAnswer),
            "descriptive" => Ok(QuestionKind::Descriptive),
            other => Err(QuestionError::UnknownKind(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(QuestionError::UnknownDifficulty(other.to_owned())),
        }
    }
}

//
// ─── ANSWER VALUE ──────────────────────────────────────────────────────────────
//

/// A submitted answer. Always non-blank and stored trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnswerValue(String);

impl AnswerValue {
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyAnswer` if the value is blank.
    pub fn new(raw: impl Into<String>) -> Result<Self, QuestionError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QuestionError::EmptyAnswer);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a reference answer.
    #[must_use]
    pub fn matches(&self, expected: &str) -> bool {
        self.0.to_lowercase() == expected.trim().to_lowercase()
    }
}

impl TryFrom<String> for AnswerValue {
    type Error = QuestionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AnswerValue> for String {
    fn from(value: AnswerValue) -> Self {
        value.0
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Unvalidated question as received from the content service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub id: QuestionId,
    pub text: String,
    pub kind: QuestionKind,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub points: Option<u32>,
    pub time_limit_secs: Option<u32>,
    pub difficulty: Difficulty,
}

impl QuestionDraft {
    #[must_use]
    pub fn new(
        id: QuestionId,
        kind: QuestionKind,
        text: impl Into<String>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            kind,
            options: Vec::new(),
            correct_answer: correct_answer.into(),
            points: None,
            time_limit_secs: None,
            difficulty: Difficulty::default(),
        }
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_points(mut self, points: u32) -> Self {
        self.points = Some(points);
        self
    }

    #[must_use]
    pub fn with_time_limit(mut self, secs: u32) -> Self {
        self.time_limit_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Validate the draft into an immutable `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when text/answer are blank, options do not fit the
    /// question kind, or the custom time limit is zero.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let text = self.text.trim().to_owned();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }
        let correct_answer = self.correct_answer.trim().to_owned();
        if correct_answer.is_empty() {
            return Err(QuestionError::EmptyCorrectAnswer);
        }

        let options: Vec<String> = self
            .options
            .into_iter()
            .map(|opt| opt.trim().to_owned())
            .filter(|opt| !opt.is_empty())
            .collect();

        match self.kind {
            QuestionKind::MultipleChoice => {
                if options.len() < 2 {
                    return Err(QuestionError::TooFewOptions);
                }
                if !options
                    .iter()
                    .any(|opt| opt.eq_ignore_ascii_case(&correct_answer))
                {
                    return Err(QuestionError::AnswerNotInOptions);
                }
            }
            _ if !options.is_empty() => return Err(QuestionError::UnexpectedOptions),
            QuestionKind::TrueFalse => {
                let lowered = correct_answer.to_ascii_lowercase();
                if lowered != "true" && lowered != "false" {
                    return Err(QuestionError::InvalidTrueFalseAnswer);
                }
            }
            _ => {}
        }

        if self.time_limit_secs == Some(0) {
            return Err(QuestionError::InvalidTimeLimit);
        }

        Ok(Question {
            id: self.id,
            text,
            kind: self.kind,
            options,
            correct_answer,
            points: self.points.unwrap_or(DEFAULT_POINTS),
            time_limit_secs: self.time_limit_secs,
            difficulty: self.difficulty,
        })
    }
}

/// Immutable question within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    text: String,
    kind: QuestionKind,
    options: Vec<String>,
    correct_answer: String,
    points: u32,
    time_limit_secs: Option<u32>,
    difficulty: Difficulty,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    /// Custom allowance that overrides the adaptive policy when present.
    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.time_limit_secs
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Whether `answer` earns this question's points.
    ///
    /// Always `false` for descriptive questions.
    #[must_use]
    pub fn is_correct(&self, answer: &AnswerValue) -> bool {
        self.kind.is_auto_gradable() && answer.matches(&self.correct_answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq() -> QuestionDraft {
        QuestionDraft::new(QuestionId::new(1), QuestionKind::MultipleChoice, "2+2?", "4")
            .with_options(["3", "4", "5"])
    }

    #[test]
    fn multiple_choice_requires_options() {
        let err = QuestionDraft::new(QuestionId::new(1), QuestionKind::MultipleChoice, "Q", "A")
            .validate()
            .unwrap_err();
        assert_eq!(err, QuestionError::TooFewOptions);
    }

    #[test]
    fn multiple_choice_answer_must_be_an_option() {
        let err = QuestionDraft::new(QuestionId::new(1), QuestionKind::MultipleChoice, "Q", "9")
            .with_options(["1", "2"])
            .validate()
            .unwrap_err();
        assert_eq!(err, QuestionError::AnswerNotInOptions);
    }

    #[test]
    fn open_questions_reject_options() {
        let err = QuestionDraft::new(QuestionId::new(1), QuestionKind::ShortAnswer, "Q", "A")
            .with_options(["x", "y"])
            .validate()
            .unwrap_err();
        assert_eq!(err, QuestionError::UnexpectedOptions);
    }

    #[test]
    fn true_false_answer_is_checked() {
        let err = QuestionDraft::new(QuestionId::new(1), QuestionKind::TrueFalse, "Q", "maybe")
            .validate()
            .unwrap_err();
        assert_eq!(err, QuestionError::InvalidTrueFalseAnswer);
    }

    #[test]
    fn defaults_points_and_difficulty() {
        let q = mcq().validate().unwrap();
        assert_eq!(q.points(), DEFAULT_POINTS);
        assert_eq!(q.difficulty(), Difficulty::Medium);
        assert_eq!(q.time_limit_secs(), None);
    }

    #[test]
    fn zero_time_limit_is_rejected() {
        let err = mcq().with_time_limit(0).validate().unwrap_err();
        assert_eq!(err, QuestionError::InvalidTimeLimit);
    }

    #[test]
    fn answer_value_is_trimmed_and_non_blank() {
        assert_eq!(AnswerValue::new("  Paris ").unwrap().as_str(), "Paris");
        assert_eq!(AnswerValue::new("   ").unwrap_err(), QuestionError::EmptyAnswer);
    }

    #[test]
    fn grading_is_case_insensitive_and_skips_descriptive() {
        let q = QuestionDraft::new(QuestionId::new(2), QuestionKind::FillInBlank, "Capital?", "Paris")
            .validate()
            .unwrap();
        assert!(q.is_correct(&AnswerValue::new("paris").unwrap()));

        let essay = QuestionDraft::new(QuestionId::new(3), QuestionKind::Descriptive, "Why?", "Because")
            .validate()
            .unwrap();
        assert!(!essay.is_correct(&AnswerValue::new("Because").unwrap()));
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            QuestionKind::MultipleChoice,
            QuestionKind::FillInBlank,
            QuestionKind::TrueFalse,
            QuestionKind::ShortAnswer,
            QuestionKind::Descriptive,
        ] {
            assert_eq!(kind.as_str().parse::<QuestionKind>().unwrap(), kind);
        }
    }
}
