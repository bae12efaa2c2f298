pub mod dict;
pub mod inference;
pub mod keywords;
pub mod persist;
pub mod ranked;
pub mod score;
pub mod similarity;

use std::path::Path;

use anyhow::Result;

/// Externally assigned thread/topic identifier.
pub type ItemId = u64;
/// Post time in epoch seconds.
pub type Timestamp = i64;
/// One preprocessed token; tokenization happens upstream.
pub type Token = String;

pub use ranked::{InsertOutcome, RankedList};

/// Common lifecycle shared by every index variant. `save` flushes
/// dirty records only and clears their dirty bits; `load` replaces the
/// in-memory state from disk. Both return the number of files touched.
pub trait Index {
    fn add(&mut self, id: ItemId, tokens: Vec<Token>, timestamp: Timestamp);
    fn delete(&mut self, id: ItemId);
    fn save(&mut self, dir: &Path) -> Result<usize>;
    fn load(&mut self, dir: &Path) -> Result<usize>;
}
