use serde::{Deserialize, Serialize};

use crate::ItemId;

/// Result of a capacity-bounded insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The candidate did not beat the current minimum; nothing changed.
    Skipped,
    /// Inserted with room to spare.
    Inserted,
    /// Inserted by evicting the entry with this id.
    Evicted(ItemId),
}

/// Fixed-capacity list of `(id, score)` pairs kept in descending score
/// order. Persisted as a plain pair array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedList {
    entries: Vec<(ItemId, f64)>,
}

impl RankedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.entries.iter().any(|&(other, _)| other == id)
    }

    pub fn score_of(&self, id: ItemId) -> Option<f64> {
        self.entries
            .iter()
            .find(|&&(other, _)| other == id)
            .map(|&(_, score)| score)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.entries.iter().map(|&(id, _)| id)
    }

    /// At most `n` highest-scored entries.
    pub fn top(&self, n: usize) -> &[(ItemId, f64)] {
        &self.entries[..self.entries.len().min(n)]
    }

    /// Attempt to insert `(id, score)` keeping at most `capacity`
    /// entries. When the list is full, the candidate must strictly
    /// beat the current minimum; ties never evict.
    pub fn insert(&mut self, id: ItemId, score: f64, capacity: usize) -> InsertOutcome {
        if capacity == 0 {
            return InsertOutcome::Skipped;
        }
        if self.entries.len() >= capacity {
            // Last entry holds the minimum score.
            let (min_id, min_score) = self.entries[self.entries.len() - 1];
            if score <= min_score {
                return InsertOutcome::Skipped;
            }
            self.entries.pop();
            self.insert_sorted(id, score);
            return InsertOutcome::Evicted(min_id);
        }
        self.insert_sorted(id, score);
        InsertOutcome::Inserted
    }

    /// Remove the entry with matching id; returns whether one existed.
    pub fn remove(&mut self, id: ItemId) -> bool {
        match self.entries.iter().position(|&(other, _)| other == id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    fn insert_sorted(&mut self, id: ItemId, score: f64) {
        // Equal scores keep existing entries first.
        let pos = self.entries.partition_point(|&(_, s)| s >= score);
        self.entries.insert(pos, (id, score));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_in_descending_order() {
        let mut list = RankedList::new();
        assert_eq!(list.insert(1, 0.2, 3), InsertOutcome::Inserted);
        assert_eq!(list.insert(2, 0.4, 3), InsertOutcome::Inserted);
        assert_eq!(list.insert(3, 0.3, 3), InsertOutcome::Inserted);
        let ids: Vec<_> = list.ids().collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn evicts_minimum_when_full() {
        let mut list = RankedList::new();
        list.insert(1, 0.4, 2);
        list.insert(2, 0.3, 2);
        assert_eq!(list.insert(3, 0.35, 2), InsertOutcome::Evicted(2));
        let ids: Vec<_> = list.ids().collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn rejects_when_not_beating_minimum() {
        let mut list = RankedList::new();
        list.insert(1, 0.4, 2);
        list.insert(2, 0.3, 2);
        assert_eq!(list.insert(3, 0.2, 2), InsertOutcome::Skipped);
        assert!(!list.contains(3));
    }

    #[test]
    fn ties_never_evict() {
        let mut list = RankedList::new();
        list.insert(1, 0.4, 2);
        list.insert(2, 0.3, 2);
        assert_eq!(list.insert(3, 0.3, 2), InsertOutcome::Skipped);
        assert!(list.contains(2));
    }

    #[test]
    fn equal_scores_keep_existing_entries_first() {
        let mut list = RankedList::new();
        list.insert(1, 0.3, 3);
        list.insert(2, 0.3, 3);
        let ids: Vec<_> = list.ids().collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn remove_is_a_noop_for_unknown_id() {
        let mut list = RankedList::new();
        list.insert(1, 0.4, 2);
        assert!(!list.remove(9));
        assert!(list.remove(1));
        assert!(list.is_empty());
    }

    #[test]
    fn zero_capacity_never_inserts() {
        let mut list = RankedList::new();
        assert_eq!(list.insert(1, 0.9, 0), InsertOutcome::Skipped);
        assert!(list.is_empty());
    }
}
