//! Per-question time allowances.
//!
//! Non-multiple-choice questions lose a second of allowance for every earlier
//! open-ended question the test-taker left unanswered, down to a floor.
//! Multiple-choice allowances are never reduced.

use thiserror::Error;

use crate::model::{Question, QuestionKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimingPolicyError {
    #[error("minimum allowance must be > 0")]
    InvalidFloor,

    #[error("base allowance ({base}s) is below the minimum ({floor}s)")]
    BaseBelowFloor { base: u32, floor: u32 },
}

/// Parameters of the adaptive timing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingPolicy {
    multiple_choice_secs: u32,
    open_secs: u32,
    floor_secs: u32,
    max_reduction_secs: u32,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl TimingPolicy {
    /// 30s for multiple-choice, 10s otherwise, never below 5s, reduction capped at 5s.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            multiple_choice_secs: 30,
            open_secs: 10,
            floor_secs: 5,
            max_reduction_secs: 5,
        }
    }

    /// # Errors
    ///
    /// Returns `TimingPolicyError` if the floor is zero or exceeds a base allowance.
    pub fn new(
        multiple_choice_secs: u32,
        open_secs: u32,
        floor_secs: u32,
        max_reduction_secs: u32,
    ) -> Result<Self, TimingPolicyError> {
        if floor_secs == 0 {
            return Err(TimingPolicyError::InvalidFloor);
        }
        for base in [multiple_choice_secs, open_secs] {
            if base < floor_secs {
                return Err(TimingPolicyError::BaseBelowFloor {
                    base,
                    floor: floor_secs,
                });
            }
        }
        Ok(Self {
            multiple_choice_secs,
            open_secs,
            floor_secs,
            max_reduction_secs,
        })
    }

    #[must_use]
    pub fn base_secs(&self, kind: QuestionKind) -> u32 {
        if kind.is_multiple_choice() {
            self.multiple_choice_secs
        } else {
            self.open_secs
        }
    }

    #[must_use]
    pub fn max_reduction_secs(&self) -> u32 {
        self.max_reduction_secs
    }

    /// Seconds granted to `question` given the session's accumulated reduction.
    ///
    /// A custom time limit on the question wins over the computed value.
    #[must_use]
    pub fn allowance(&self, question: &Question, reduction_secs: u32) -> u32 {
        if let Some(custom) = question.time_limit_secs() {
            return custom;
        }
        let kind = question.kind();
        let reduction = if kind.is_multiple_choice() {
            0
        } else {
            reduction_secs.min(self.max_reduction_secs)
        };
        self.base_secs(kind)
            .saturating_sub(reduction)
            .max(self.floor_secs)
    }

    /// Reduction after leaving a question; grows by one only for an unanswered
    /// non-multiple-choice question and never exceeds the cap.
    #[must_use]
    pub fn next_reduction(&self, current: u32, left: &Question, answered: bool) -> u32 {
        if answered || left.kind().is_multiple_choice() {
            return current;
        }
        current.saturating_add(1).min(self.max_reduction_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionDraft, QuestionId};

    fn question(kind: QuestionKind) -> Question {
        let draft = QuestionDraft::new(QuestionId::new(1), kind, "Q", "true");
        let draft = if kind.is_multiple_choice() {
            draft.with_options(["true", "false"])
        } else {
            draft
        };
        draft.validate().unwrap()
    }

    #[test]
    fn base_allowances() {
        let policy = TimingPolicy::standard();
        assert_eq!(policy.allowance(&question(QuestionKind::MultipleChoice), 0), 30);
        assert_eq!(policy.allowance(&question(QuestionKind::TrueFalse), 0), 10);
        assert_eq!(policy.allowance(&question(QuestionKind::Descriptive), 0), 10);
    }

    #[test]
    fn reduction_skips_multiple_choice() {
        let policy = TimingPolicy::standard();
        assert_eq!(policy.allowance(&question(QuestionKind::MultipleChoice), 5), 30);
        assert_eq!(policy.allowance(&question(QuestionKind::FillInBlank), 3), 7);
    }

    #[test]
    fn allowance_never_drops_below_floor() {
        let policy = TimingPolicy::standard();
        assert_eq!(policy.allowance(&question(QuestionKind::ShortAnswer), 5), 5);
        assert_eq!(policy.allowance(&question(QuestionKind::ShortAnswer), 50), 5);
    }

    #[test]
    fn custom_time_limit_overrides_policy() {
        let policy = TimingPolicy::standard();
        let q = QuestionDraft::new(QuestionId::new(9), QuestionKind::ShortAnswer, "Q", "A")
            .with_time_limit(45)
            .validate()
            .unwrap();
        assert_eq!(policy.allowance(&q, 5), 45);
    }

    #[test]
    fn next_reduction_is_capped_and_only_for_unanswered_open_questions() {
        let policy = TimingPolicy::standard();
        let open = question(QuestionKind::FillInBlank);
        let mcq = question(QuestionKind::MultipleChoice);

        assert_eq!(policy.next_reduction(0, &open, false), 1);
        assert_eq!(policy.next_reduction(0, &open, true), 0);
        assert_eq!(policy.next_reduction(2, &mcq, false), 2);
        assert_eq!(policy.next_reduction(5, &open, false), 5);
    }

    #[test]
    fn custom_policy_is_validated() {
        assert_eq!(
            TimingPolicy::new(30, 10, 0, 5).unwrap_err(),
            TimingPolicyError::InvalidFloor
        );
        assert_eq!(
            TimingPolicy::new(30, 4, 5, 5).unwrap_err(),
            TimingPolicyError::BaseBelowFloor { base: 4, floor: 5 }
        );
        assert!(TimingPolicy::new(60, 20, 5, 10).is_ok());
    }
}
