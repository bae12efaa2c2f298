use std::collections::HashMap;

use crate::Token;

/// Append-only token <-> id mapping shared by all records of one
/// collection. Growing it never invalidates existing ids, so cached
/// bag-of-words vectors stay valid across adds. Never persisted; it is
/// rebuilt from loaded token lists.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    ids: HashMap<Token, u32>,
    tokens: Vec<Token>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    /// Register every token of `doc`, assigning fresh ids to unseen ones.
    pub fn add_document(&mut self, doc: &[Token]) {
        for token in doc {
            if !self.ids.contains_key(token) {
                let id = self.tokens.len() as u32;
                self.ids.insert(token.clone(), id);
                self.tokens.push(token.clone());
            }
        }
    }

    /// Sparse `(token_id, count)` vector sorted by id. Tokens not in
    /// the dictionary are skipped, which makes this usable for
    /// read-only probes against a frozen dictionary.
    pub fn doc_to_bow(&self, doc: &[Token]) -> Vec<(u32, u32)> {
        let mut counts: HashMap<u32, u32> = HashMap::new();
        for token in doc {
            if let Some(&id) = self.ids.get(token) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        let mut bow: Vec<(u32, u32)> = counts.into_iter().collect();
        bow.sort_unstable_by_key(|&(id, _)| id);
        bow
    }
}
