use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dict::Dictionary;
use crate::persist::{self, DiskRecord};
use crate::ranked::{InsertOutcome, RankedList};
use crate::score::{cosine, decay_weight};
use crate::{Index, ItemId, Timestamp, Token};

/// Tuning knobs for the primary collection. All externally supplied;
/// see the ingestor's config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityParams {
    /// Per-day decay base in (0, 1].
    pub time_decay: f64,
    /// Scores below this are noise and never stored.
    pub irrelevant_thresh: f64,
    /// Scores above this signal near-duplicate content, also never stored.
    pub duplicate_thresh: f64,
    /// Ranked-list capacity.
    pub max_recoms: usize,
    /// Records per on-disk shard directory.
    pub shard_size: u64,
}

impl Default for SimilarityParams {
    fn default() -> Self {
        Self {
            time_decay: 0.9,
            irrelevant_thresh: 0.05,
            duplicate_thresh: 0.5,
            max_recoms: 20,
            shard_size: 1000,
        }
    }
}

impl SimilarityParams {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.time_decay > 0.0 && self.time_decay <= 1.0,
            "time_decay must lie in (0, 1], got {}",
            self.time_decay
        );
        anyhow::ensure!(
            self.irrelevant_thresh <= self.duplicate_thresh,
            "acceptance band is empty: [{}, {}]",
            self.irrelevant_thresh,
            self.duplicate_thresh
        );
        anyhow::ensure!(self.shard_size > 0, "shard_size must be positive");
        Ok(())
    }
}

/// One discussion thread in the primary collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRecord {
    pub timestamp: Timestamp,
    pub tokens: Vec<Token>,
    /// Related threads, descending by decayed similarity.
    pub related: RankedList,
    /// Ids of records whose `related` list contains this record.
    /// Maintained only for cascade deletion, never for scoring.
    pub appears_in: HashSet<ItemId>,
    /// Ids of curated topics whose ranked list contains this record.
    pub appears_in_special: HashSet<ItemId>,
    #[serde(skip)]
    pub dirty: bool,
}

impl DiskRecord for TopicRecord {
    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }
}

/// Primary recommendation structure: per thread, a bounded ranked list
/// of related threads scored by content similarity times directional
/// time decay, with mutual back-references kept consistent across
/// every insert, eviction and delete.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    params: SimilarityParams,
    dictionary: Dictionary,
    records: HashMap<ItemId, TopicRecord>,
    /// Ids deleted since the last flush; their on-disk files still
    /// exist and must go before anything else is written.
    tombstones: Vec<ItemId>,
}

impl SimilarityIndex {
    pub fn new(params: SimilarityParams) -> Self {
        Self {
            params,
            dictionary: Dictionary::new(),
            records: HashMap::new(),
            tombstones: Vec::new(),
        }
    }

    pub fn params(&self) -> &SimilarityParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn get(&self, id: ItemId) -> Option<&TopicRecord> {
        self.records.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ItemId) -> Option<&mut TopicRecord> {
        self.records.get_mut(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.records.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &TopicRecord)> + '_ {
        self.records.iter().map(|(&id, record)| (id, record))
    }

    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.records.values().map(|r| r.timestamp).min()
    }

    pub fn latest_timestamp(&self) -> Option<Timestamp> {
        self.records.values().map(|r| r.timestamp).max()
    }

    fn in_band(&self, score: f64) -> bool {
        score >= self.params.irrelevant_thresh && score <= self.params.duplicate_thresh
    }

    /// Ids of records strictly older than `cutoff`.
    pub fn ids_before(&self, cutoff: Timestamp) -> Vec<ItemId> {
        self.records
            .iter()
            .filter(|(_, r)| r.timestamp < cutoff)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Retention sweep: delete every record older than `cutoff`.
    /// Each deletion is individually atomic, so interrupting between
    /// two deletions leaves no inconsistency. Returns the deleted ids
    /// so the caller can cascade into cross-collection indexes.
    pub fn remove_before(&mut self, cutoff: Timestamp) -> Vec<ItemId> {
        let expired = self.ids_before(cutoff);
        for &id in &expired {
            self.delete(id);
        }
        expired
    }

    /// Read-only probe: score `tokens` against every record and return
    /// a capacity-bounded ranked list without touching any state.
    pub fn find_most_similar(&self, tokens: &[Token]) -> RankedList {
        let bow = self.dictionary.doc_to_bow(tokens);
        let mut hits = RankedList::new();
        for (&id, record) in &self.records {
            let sim = cosine(&bow, &self.dictionary.doc_to_bow(&record.tokens));
            if self.in_band(sim) {
                hits.insert(id, sim, self.params.max_recoms);
            }
        }
        hits
    }

    /// Score the new record against every existing one and splice it
    /// into their ranked lists (and them into its own), maintaining
    /// back-references and dirty bits on every touched side. The score
    /// phase is read-only; mutations happen serially afterwards.
    fn update_pairwise(&mut self, id: ItemId, timestamp: Timestamp) {
        let bow = self
            .dictionary
            .doc_to_bow(&self.records[&id].tokens);
        let candidates: Vec<(ItemId, Timestamp, f64)> = self
            .records
            .iter()
            .filter(|(&other, _)| other != id)
            .map(|(&other, record)| {
                let sim = cosine(&bow, &self.dictionary.doc_to_bow(&record.tokens));
                (other, record.timestamp, sim)
            })
            .collect();

        let (cap, decay) = (self.params.max_recoms, self.params.time_decay);
        for (other, other_ts, sim) in candidates {
            // The new record enters `other`'s list weighted by its age
            // relative to `other`, and vice versa.
            let score_for_other = sim * decay_weight(decay, other_ts, timestamp);
            if self.in_band(score_for_other) {
                let outcome = self
                    .records
                    .get_mut(&other)
                    .map(|r| r.related.insert(id, score_for_other, cap))
                    .unwrap_or(InsertOutcome::Skipped);
                self.apply_backrefs(outcome, other, id);
            }

            let score_for_new = sim * decay_weight(decay, timestamp, other_ts);
            if self.in_band(score_for_new) {
                let outcome = self
                    .records
                    .get_mut(&id)
                    .map(|r| r.related.insert(other, score_for_new, cap))
                    .unwrap_or(InsertOutcome::Skipped);
                self.apply_backrefs(outcome, id, other);
            }
        }
    }

    /// After `candidate` was offered to `owner`'s list, fix up the
    /// dirty bit on the owner and the back-reference sets on the
    /// candidate and on any evicted entry.
    fn apply_backrefs(&mut self, outcome: InsertOutcome, owner: ItemId, candidate: ItemId) {
        let evicted = match outcome {
            InsertOutcome::Skipped => return,
            InsertOutcome::Inserted => None,
            InsertOutcome::Evicted(evicted) => Some(evicted),
        };
        if let Some(record) = self.records.get_mut(&owner) {
            record.dirty = true;
        }
        if let Some(record) = self.records.get_mut(&candidate) {
            record.appears_in.insert(owner);
            record.dirty = true;
        }
        if let Some(evicted) = evicted {
            if let Some(record) = self.records.get_mut(&evicted) {
                record.appears_in.remove(&owner);
                record.dirty = true;
            }
        }
    }
}

impl Index for SimilarityIndex {
    fn add(&mut self, id: ItemId, tokens: Vec<Token>, timestamp: Timestamp) {
        if tokens.is_empty() {
            // Degenerate content can neither give nor receive
            // recommendations; no record is created at all.
            info!(id, "topic has no usable content, not recommendable");
            return;
        }
        self.dictionary.add_document(&tokens);
        // A pending tombstone for this id is superseded by the fresh
        // dirty record; keeping it could drop the new file later.
        self.tombstones.retain(|&t| t != id);
        self.records.insert(
            id,
            TopicRecord {
                timestamp,
                tokens,
                related: RankedList::new(),
                appears_in: HashSet::new(),
                appears_in_special: HashSet::new(),
                dirty: true,
            },
        );
        self.update_pairwise(id, timestamp);
        info!(id, total = self.records.len(), "topic added");
    }

    fn delete(&mut self, id: ItemId) {
        let Some(record) = self.records.remove(&id) else {
            debug!(id, "delete of unknown topic ignored");
            return;
        };
        // Records listing the deleted topic lose their entry; the list
        // simply shrinks until a later add refills it.
        for referrer in &record.appears_in {
            if let Some(other) = self.records.get_mut(referrer) {
                other.related.remove(id);
                other.dirty = true;
            }
        }
        // Records the deleted topic listed no longer have it as a
        // referrer.
        for listed in record.related.ids() {
            if let Some(other) = self.records.get_mut(&listed) {
                other.appears_in.remove(&id);
                other.dirty = true;
            }
        }
        self.tombstones.push(id);
        info!(id, total = self.records.len(), "topic deleted");
    }

    fn save(&mut self, dir: &Path) -> Result<usize> {
        // Stale files go first, so a delete followed by a re-add of the
        // same id is not clobbered when the fresh record lands.
        let shard = Some(self.params.shard_size);
        self.tombstones
            .retain(|&id| !persist::remove_record_file(dir, id, shard));
        let written = persist::save_records(&mut self.records, dir, shard)?;
        debug!(written, dir = %dir.display(), "similarity index flushed");
        Ok(written)
    }

    fn load(&mut self, dir: &Path) -> Result<usize> {
        self.records = persist::load_records(dir, Some(self.params.shard_size))?;
        self.tombstones.clear();
        self.dictionary = Dictionary::new();
        for record in self.records.values() {
            self.dictionary.add_document(&record.tokens);
        }
        info!(loaded = self.records.len(), dir = %dir.display(), "similarity index loaded");
        Ok(self.records.len())
    }
}
