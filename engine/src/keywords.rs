use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dict::Dictionary;
use crate::persist::{self, DiskRecord};
use crate::ranked::{InsertOutcome, RankedList};
use crate::score::decay_weight;
use crate::similarity::SimilarityIndex;
use crate::{Index, ItemId, Timestamp, Token};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordParams {
    /// Per-day decay base in (0, 1].
    pub time_decay: f64,
    /// Profile size: top-N keywords kept per curated topic.
    pub num_keywords: usize,
    /// Ranked-list capacity.
    pub max_recoms: usize,
}

impl Default for KeywordParams {
    fn default() -> Self {
        Self {
            time_decay: 0.9,
            num_keywords: 10,
            max_recoms: 20,
        }
    }
}

/// One curated ("special") topic: a keyword-weight profile matched
/// against the whole primary collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialRecord {
    pub timestamp: Timestamp,
    pub tokens: Vec<Token>,
    /// Token -> weight, top `num_keywords` entries. Keyed by token
    /// string so the profile survives dictionary rebuilds.
    pub keywords: HashMap<Token, f64>,
    /// Primary-collection threads matching this profile, descending by
    /// decayed relevance.
    pub related: RankedList,
    #[serde(skip)]
    pub dirty: bool,
}

impl DiskRecord for SpecialRecord {
    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }
}

/// Cross-collection index: a small curated set of topics, each
/// represented by a tf-idf keyword profile over the curated
/// collection's own dictionary, matched against every thread in the
/// primary collection. The primary records' `appears_in_special` sets
/// are the back-references for cascade deletion.
///
/// Profile recompute on add is a full pass over both collections; that
/// is acceptable only because the curated set is small by
/// construction. The primary collection must never be indexed this way.
pub struct KeywordIndex {
    params: KeywordParams,
    dictionary: Dictionary,
    records: HashMap<ItemId, SpecialRecord>,
    target: Arc<RwLock<SimilarityIndex>>,
    tombstones: Vec<ItemId>,
}

impl KeywordIndex {
    pub fn new(params: KeywordParams, target: Arc<RwLock<SimilarityIndex>>) -> Self {
        Self {
            params,
            dictionary: Dictionary::new(),
            records: HashMap::new(),
            target,
            tombstones: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&SpecialRecord> {
        self.records.get(&id)
    }

    /// Recompute every profile: augmented term frequency
    /// (0.5 + 0.5 * tf / max_tf) times smoothed idf (ln(1 + N / df))
    /// over the curated collection, top `num_keywords` kept. Called
    /// whenever the shared dictionary may have grown, which shifts the
    /// idf of every existing profile.
    fn update_keywords(&mut self) {
        let bows: HashMap<ItemId, Vec<(u32, u32)>> = self
            .records
            .iter()
            .map(|(&id, record)| (id, self.dictionary.doc_to_bow(&record.tokens)))
            .collect();
        let mut df: HashMap<u32, u32> = HashMap::new();
        for bow in bows.values() {
            for &(token_id, _) in bow {
                *df.entry(token_id).or_insert(0) += 1;
            }
        }
        let num_docs = self.records.len() as f64;
        for (id, record) in self.records.iter_mut() {
            let bow = &bows[id];
            let max_tf = bow.iter().map(|&(_, tf)| tf).max().unwrap_or(0);
            record.dirty = true;
            if max_tf == 0 {
                record.keywords = HashMap::new();
                continue;
            }
            let mut weights: Vec<(u32, f64)> = bow
                .iter()
                .map(|&(token_id, tf)| {
                    let tf_aug = 0.5 + 0.5 * f64::from(tf) / f64::from(max_tf);
                    let idf = (1.0 + num_docs / f64::from(df[&token_id])).ln();
                    (token_id, tf_aug * idf)
                })
                .collect();
            weights.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            weights.truncate(self.params.num_keywords);
            record.keywords = weights
                .into_iter()
                .filter_map(|(token_id, weight)| {
                    self.dictionary
                        .token(token_id)
                        .map(|token| (token.to_string(), weight))
                })
                .collect();
        }
    }

    /// Sum of profile weights over the tokens of a candidate document,
    /// with repetitions, decayed by the candidate's age relative to
    /// the profile owner.
    fn relevance(
        &self,
        keywords: &HashMap<Token, f64>,
        owner_ts: Timestamp,
        tokens: &[Token],
        candidate_ts: Timestamp,
    ) -> f64 {
        let raw: f64 = tokens.iter().filter_map(|t| keywords.get(t)).sum();
        raw * decay_weight(self.params.time_decay, owner_ts, candidate_ts)
    }

    /// A new thread arrived in the primary collection: score it
    /// against every curated profile. No profile recompute is needed
    /// since the curated dictionary did not change.
    pub fn update_on_new_topic(&mut self, id: ItemId, tokens: &[Token], timestamp: Timestamp) {
        if tokens.is_empty() {
            return;
        }
        let cap = self.params.max_recoms;
        let mut target = self.target.write();
        for (&special_id, record) in self.records.iter_mut() {
            let score = {
                let raw: f64 = tokens.iter().filter_map(|t| record.keywords.get(t)).sum();
                raw * decay_weight(self.params.time_decay, record.timestamp, timestamp)
            };
            if score <= 0.0 {
                continue;
            }
            match record.related.insert(id, score, cap) {
                InsertOutcome::Skipped => {}
                outcome => {
                    record.dirty = true;
                    if let Some(topic) = target.get_mut(id) {
                        topic.appears_in_special.insert(special_id);
                        topic.dirty = true;
                    }
                    if let InsertOutcome::Evicted(evicted) = outcome {
                        if let Some(topic) = target.get_mut(evicted) {
                            topic.appears_in_special.remove(&special_id);
                            topic.dirty = true;
                        }
                    }
                }
            }
        }
    }

    /// A primary-collection thread is going away: drop it from every
    /// curated ranked list. Scans the (small) curated collection
    /// directly, so it is correct whether it runs before or after the
    /// thread's own deletion.
    pub fn update_on_delete_topic(&mut self, id: ItemId) {
        for record in self.records.values_mut() {
            if record.related.remove(id) {
                record.dirty = true;
            }
        }
        let mut target = self.target.write();
        if let Some(topic) = target.get_mut(id) {
            if !topic.appears_in_special.is_empty() {
                topic.appears_in_special.clear();
                topic.dirty = true;
            }
        }
    }
}

impl Index for KeywordIndex {
    fn add(&mut self, id: ItemId, tokens: Vec<Token>, timestamp: Timestamp) {
        if tokens.is_empty() {
            info!(id, "special topic has no usable content, skipped");
            return;
        }
        self.dictionary.add_document(&tokens);
        self.tombstones.retain(|&t| t != id);
        self.records.insert(
            id,
            SpecialRecord {
                timestamp,
                tokens,
                keywords: HashMap::new(),
                related: RankedList::new(),
                dirty: true,
            },
        );
        // The dictionary grew, so every profile's weights shifted.
        self.update_keywords();

        // Match the new profile against the whole primary collection.
        let cap = self.params.max_recoms;
        let mut target = self.target.write();
        let candidates: Vec<(ItemId, Timestamp, f64)> = {
            let record = &self.records[&id];
            target
                .iter()
                .map(|(topic_id, topic)| {
                    let score = self.relevance(
                        &record.keywords,
                        record.timestamp,
                        &topic.tokens,
                        topic.timestamp,
                    );
                    (topic_id, topic.timestamp, score)
                })
                .collect()
        };
        let record = self.records.get_mut(&id).expect("record just inserted");
        for (topic_id, _, score) in candidates {
            if score <= 0.0 {
                continue;
            }
            match record.related.insert(topic_id, score, cap) {
                InsertOutcome::Skipped => {}
                outcome => {
                    if let Some(topic) = target.get_mut(topic_id) {
                        topic.appears_in_special.insert(id);
                        topic.dirty = true;
                    }
                    if let InsertOutcome::Evicted(evicted) = outcome {
                        if let Some(topic) = target.get_mut(evicted) {
                            topic.appears_in_special.remove(&id);
                            topic.dirty = true;
                        }
                    }
                }
            }
        }
        drop(target);
        info!(id, total = self.records.len(), "special topic added");
    }

    fn delete(&mut self, id: ItemId) {
        let Some(record) = self.records.remove(&id) else {
            debug!(id, "delete of unknown special topic ignored");
            return;
        };
        let mut target = self.target.write();
        for topic_id in record.related.ids() {
            if let Some(topic) = target.get_mut(topic_id) {
                topic.appears_in_special.remove(&id);
                topic.dirty = true;
            }
        }
        self.tombstones.push(id);
        info!(id, total = self.records.len(), "special topic deleted");
    }

    fn save(&mut self, dir: &Path) -> Result<usize> {
        // Flat layout: the curated collection stays small.
        self.tombstones
            .retain(|&id| !persist::remove_record_file(dir, id, None));
        let written = persist::save_records(&mut self.records, dir, None)?;
        debug!(written, dir = %dir.display(), "keyword index flushed");
        Ok(written)
    }

    fn load(&mut self, dir: &Path) -> Result<usize> {
        self.records = persist::load_records(dir, None)?;
        self.tombstones.clear();
        self.dictionary = Dictionary::new();
        for record in self.records.values() {
            self.dictionary.add_document(&record.tokens);
        }
        info!(loaded = self.records.len(), dir = %dir.display(), "keyword index loaded");
        Ok(self.records.len())
    }
}
