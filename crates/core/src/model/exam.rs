use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::ExamId;
use crate::model::question::Question;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("exam title cannot be empty")]
    EmptyTitle,

    #[error("availability window ends before it starts")]
    InvalidWindow,

    #[error("attempt quota must allow at least one attempt")]
    InvalidAttemptQuota,

    #[error("duplicate question id {0}")]
    DuplicateQuestion(u64),

    #[error("exam without questions needs a duration")]
    MissingDuration,

    #[error("unknown exam status: {0}")]
    UnknownStatus(String),
}

/// Why an exam cannot be started right now.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Unavailable {
    #[error("exam is {0}, not active")]
    NotActive(ExamStatus),

    #[error("exam opens at {0}")]
    NotYetOpen(DateTime<Utc>),

    #[error("exam closed at {0}")]
    Closed(DateTime<Utc>),

    #[error("all {max} attempts used")]
    MaxAttemptsReached { max: u32 },
}

//
// ─── STATUS / QUOTA / WINDOW ───────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamStatus {
    Draft,
    Scheduled,
    Active,
    Completed,
}

impl ExamStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExamStatus::Draft => "draft",
            ExamStatus::Scheduled => "scheduled",
            ExamStatus::Active => "active",
            ExamStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamStatus {
    type Err = ExamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ExamStatus::Draft),
            "scheduled" => Ok(ExamStatus::Scheduled),
            "active" => Ok(ExamStatus::Active),
            "completed" => Ok(ExamStatus::Completed),
            other => Err(ExamError::UnknownStatus(other.to_owned())),
        }
    }
}

/// Attempts used so far against the maximum allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptQuota {
    pub current: u32,
    pub max: u32,
}

impl AttemptQuota {
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.current >= self.max
    }

    /// Sequence number the next attempt will carry (1-based).
    #[must_use]
    pub fn next_attempt_number(&self) -> u32 {
        self.current.saturating_add(1)
    }
}

/// Inclusive time range during which sessions may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AvailabilityWindow {
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

//
// ─── EXAM DEFINITION ───────────────────────────────────────────────────────────
//

/// Unvalidated exam definition as received from the content service.
#[derive(Debug, Clone)]
pub struct ExamDraft {
    pub id: ExamId,
    pub title: String,
    pub subject: String,
    pub class_name: String,
    pub questions: Vec<Question>,
    pub duration_minutes: u32,
    pub attempts: AttemptQuota,
    pub window: AvailabilityWindow,
    pub status: ExamStatus,
}

impl ExamDraft {
    /// # Errors
    ///
    /// Returns `ExamError` if the title is blank, the window is inverted, the
    /// quota allows no attempts, question ids repeat, or an empty exam has no
    /// duration to fall back on.
    pub fn validate(self) -> Result<ExamDefinition, ExamError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(ExamError::EmptyTitle);
        }
        if self.window.end < self.window.start {
            return Err(ExamError::InvalidWindow);
        }
        if self.attempts.max == 0 {
            return Err(ExamError::InvalidAttemptQuota);
        }
        if self.questions.is_empty() && self.duration_minutes == 0 {
            return Err(ExamError::MissingDuration);
        }

        let mut seen = HashSet::with_capacity(self.questions.len());
        for question in &self.questions {
            if !seen.insert(question.id()) {
                return Err(ExamError::DuplicateQuestion(question.id().value()));
            }
        }

        Ok(ExamDefinition {
            id: self.id,
            title,
            subject: self.subject.trim().to_owned(),
            class_name: self.class_name.trim().to_owned(),
            questions: self.questions,
            duration_minutes: self.duration_minutes,
            attempts: self.attempts,
            window: self.window,
            status: self.status,
        })
    }
}

/// Immutable exam as loaded for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamDefinition {
    id: ExamId,
    title: String,
    subject: String,
    class_name: String,
    questions: Vec<Question>,
    duration_minutes: u32,
    attempts: AttemptQuota,
    window: AvailabilityWindow,
    status: ExamStatus,
}

impl ExamDefinition {
    #[must_use]
    pub fn id(&self) -> ExamId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    #[must_use]
    pub fn attempts(&self) -> AttemptQuota {
        self.attempts
    }

    #[must_use]
    pub fn window(&self) -> AvailabilityWindow {
        self.window
    }

    #[must_use]
    pub fn status(&self) -> ExamStatus {
        self.status
    }

    /// Copy of this exam with `current` attempts used. For storage adapters.
    #[must_use]
    pub fn with_attempts_used(mut self, current: u32) -> Self {
        self.attempts.current = current;
        self
    }

    /// Check status, window and quota for a session starting at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first gate that blocks the session.
    pub fn check_available(&self, now: DateTime<Utc>) -> Result<(), Unavailable> {
        if self.status != ExamStatus::Active {
            return Err(Unavailable::NotActive(self.status));
        }
        if now < self.window.start {
            return Err(Unavailable::NotYetOpen(self.window.start));
        }
        if now > self.window.end {
            return Err(Unavailable::Closed(self.window.end));
        }
        if self.attempts.is_exhausted() {
            return Err(Unavailable::MaxAttemptsReached {
                max: self.attempts.max,
            });
        }
        Ok(())
    }
}
