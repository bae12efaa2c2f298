use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};

use crate::{Index, ItemId, Timestamp, Token};

/// Opaque online topic-inference model, fed one document at a time.
pub trait TopicModel {
    fn update(&mut self, doc: &[Token]);
}

/// Membership tracker around an incrementally trained topic model.
/// Does not rank. Deleting a record drops the membership only; the
/// model has no unlearn operation, a known limitation. Persistence is
/// a no-op: the collection is rebuilt from the primary index on
/// restart.
pub struct TopicModelIndex<M: TopicModel> {
    model: M,
    members: HashMap<ItemId, Timestamp>,
}

impl<M: TopicModel> TopicModelIndex<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            members: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: TopicModel> Index for TopicModelIndex<M> {
    fn add(&mut self, id: ItemId, tokens: Vec<Token>, timestamp: Timestamp) {
        self.model.update(&tokens);
        self.members.insert(id, timestamp);
        info!(id, total = self.members.len(), "topic fed to model");
    }

    fn delete(&mut self, id: ItemId) {
        self.members.remove(&id);
        debug!(id, total = self.members.len(), "topic membership dropped");
    }

    fn save(&mut self, _dir: &Path) -> Result<usize> {
        Ok(0)
    }

    fn load(&mut self, _dir: &Path) -> Result<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingModel {
        updates: usize,
    }

    impl TopicModel for CountingModel {
        fn update(&mut self, _doc: &[Token]) {
            self.updates += 1;
        }
    }

    #[test]
    fn feeds_model_and_tracks_membership() {
        let mut index = TopicModelIndex::new(CountingModel::default());
        index.add(1, vec!["alpha".into()], 100);
        index.add(2, vec!["beta".into()], 200);
        assert_eq!(index.model().updates, 2);
        assert!(index.contains(1));

        index.delete(1);
        assert!(!index.contains(1));
        // No unlearn: the model keeps both updates.
        assert_eq!(index.model().updates, 2);
    }

    #[test]
    fn persistence_is_a_noop() {
        let mut index = TopicModelIndex::new(CountingModel::default());
        index.add(1, vec!["alpha".into()], 100);
        let dir = std::path::Path::new("/nonexistent");
        assert_eq!(index.save(dir).unwrap(), 0);
        assert_eq!(index.load(dir).unwrap(), 0);
        assert!(index.contains(1));
    }
}
