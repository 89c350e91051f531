use std::collections::BTreeMap;

use crate::model::AnswerValue;

/// Answers recorded during a session, keyed by question index.
///
/// Entries are never removed. The machine only writes the current index, so
/// an entry becomes immutable once its question is left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerStore {
    entries: BTreeMap<usize, AnswerValue>,
}

impl AnswerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, index: usize, value: AnswerValue) {
        self.entries.insert(index, value);
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&AnswerValue> {
        self.entries.get(&index)
    }

    #[must_use]
    pub fn is_answered(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indices in `0..question_count` without an answer.
    #[must_use]
    pub fn unanswered(&self, question_count: usize) -> Vec<usize> {
        (0..question_count)
            .filter(|index| !self.entries.contains_key(index))
            .collect()
    }

    /// One slot per question, `None` where nothing was recorded.
    #[must_use]
    pub fn to_slots(&self, question_count: usize) -> Vec<Option<AnswerValue>> {
        (0..question_count)
            .map(|index| self.entries.get(&index).cloned())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &AnswerValue)> {
        self.entries.iter().map(|(index, value)| (*index, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_keep_gaps_for_skipped_questions() {
        let mut store = AnswerStore::new();
        store.record(1, AnswerValue::new("x").unwrap());

        let slots = store.to_slots(3);
        assert_eq!(slots.len(), 3);
        assert!(slots[0].is_none());
        assert_eq!(slots[1].as_ref().map(AnswerValue::as_str), Some("x"));
        assert_eq!(store.unanswered(3), vec![0, 2]);
    }
}
