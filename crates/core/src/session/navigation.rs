use serde::{Deserialize, Serialize};

use super::SessionError;

/// How a question index appears to the test-taker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavState {
    /// Already passed; can no longer be answered or revisited.
    Locked,
    Current,
    Unreachable,
}

/// One-way cursor over the question list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationGuard {
    len: usize,
    current: usize,
    visited: Vec<bool>,
}

impl NavigationGuard {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            len,
            current: 0,
            visited: vec![false; len],
        }
    }

    /// Mark the first question visited. No-op for an empty exam.
    pub fn enter_first(&mut self) {
        if let Some(first) = self.visited.first_mut() {
            *first = true;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `None` when the exam has no questions.
    #[must_use]
    pub fn current(&self) -> Option<usize> {
        (self.current < self.len).then_some(self.current)
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.len > 0 && self.current + 1 == self.len
    }

    #[must_use]
    pub fn is_visited(&self, index: usize) -> bool {
        self.visited.get(index).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.iter().filter(|v| **v).count()
    }

    #[must_use]
    pub fn state(&self, index: usize) -> NavState {
        match index.cmp(&self.current) {
            std::cmp::Ordering::Equal if index < self.len => NavState::Current,
            std::cmp::Ordering::Less if self.is_visited(index) => NavState::Locked,
            _ => NavState::Unreachable,
        }
    }

    #[must_use]
    pub fn states(&self) -> Vec<NavState> {
        (0..self.len).map(|index| self.state(index)).collect()
    }

    /// Accept a command only if it targets the current index.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidNavigation` for any other index.
    pub fn ensure_current(&self, requested: usize) -> Result<usize, SessionError> {
        match self.current() {
            Some(current) if current == requested => Ok(current),
            current => Err(SessionError::InvalidNavigation { requested, current }),
        }
    }

    /// Move to the next index and mark it visited.
    ///
    /// Returns the new index, or `None` if already on the last question
    /// (the cursor does not move in that case).
    pub fn step(&mut self) -> Option<usize> {
        if self.current + 1 >= self.len {
            return None;
        }
        self.current += 1;
        self.visited[self.current] = true;
        Some(self.current)
    }
}
