use std::sync::Arc;

use engine::keywords::{KeywordIndex, KeywordParams};
use engine::similarity::{SimilarityIndex, SimilarityParams};
use engine::{Index, Token};
use parking_lot::RwLock;
use tempfile::tempdir;

const DAY: i64 = 86_400;

fn toks(words: &[&str]) -> Vec<Token> {
    words.iter().map(|w| (*w).to_string()).collect()
}

fn target_with_threads() -> Arc<RwLock<SimilarityIndex>> {
    let mut target = SimilarityIndex::new(SimilarityParams::default());
    target.add(100, toks(&["rust", "borrow", "checker"]), 0);
    target.add(101, toks(&["gardening", "tomato", "soil"]), 0);
    target.add(102, toks(&["rust", "async", "runtime"]), DAY);
    Arc::new(RwLock::new(target))
}

/// Cross-collection consistency: t in S.related iff S in
/// target[t].appears_in_special.
fn assert_consistent(index: &KeywordIndex, target: &Arc<RwLock<SimilarityIndex>>) {
    let target = target.read();
    let mut listed: Vec<(u64, u64)> = Vec::new();
    for (topic_id, record) in target.iter() {
        for &special in &record.appears_in_special {
            listed.push((special, topic_id));
        }
    }
    for (special, topic_id) in &listed {
        let record = index.get(*special).expect("back-reference to unknown special");
        assert!(
            record.related.contains(*topic_id),
            "special {special} no longer lists topic {topic_id}"
        );
    }
    // And the other direction.
    for (topic_id, record) in target.iter() {
        for special in listed.iter().filter(|(_, t)| *t == topic_id).map(|(s, _)| s) {
            assert!(record.appears_in_special.contains(special));
        }
    }
}

#[test]
fn curated_add_matches_the_target_collection() {
    let target = target_with_threads();
    let mut index = KeywordIndex::new(KeywordParams::default(), target.clone());
    index.add(7, toks(&["rust", "memory", "safety"]), DAY);

    let special = index.get(7).unwrap();
    assert!(!special.keywords.is_empty());
    assert!(special.keywords.len() <= 10);
    assert!(special.related.contains(100));
    assert!(special.related.contains(102));
    assert!(!special.related.contains(101));

    let guard = target.read();
    assert!(guard.get(100).unwrap().appears_in_special.contains(&7));
    assert!(guard.get(102).unwrap().appears_in_special.contains(&7));
    assert!(guard.get(101).unwrap().appears_in_special.is_empty());
    drop(guard);
    assert_consistent(&index, &target);
}

#[test]
fn older_targets_are_decayed() {
    let target = target_with_threads();
    let mut index = KeywordIndex::new(KeywordParams::default(), target.clone());
    index.add(7, toks(&["rust", "memory", "safety"]), DAY);

    let special = index.get(7).unwrap();
    // Thread 100 is a day older than the profile, thread 102 is
    // contemporary; equal raw relevance, so decay decides the order.
    let older = special.related.score_of(100).unwrap();
    let contemporary = special.related.score_of(102).unwrap();
    assert!((older - contemporary * 0.9).abs() < 1e-9);
}

#[test]
fn new_topics_flow_into_curated_lists() {
    let target = target_with_threads();
    let mut index = KeywordIndex::new(KeywordParams::default(), target.clone());
    index.add(7, toks(&["rust", "memory", "safety"]), DAY);

    let tokens = toks(&["rust", "embedded"]);
    target.write().add(103, tokens.clone(), 2 * DAY);
    index.update_on_new_topic(103, &tokens, 2 * DAY);

    assert!(index.get(7).unwrap().related.contains(103));
    assert!(target
        .read()
        .get(103)
        .unwrap()
        .appears_in_special
        .contains(&7));
    assert_consistent(&index, &target);
}

#[test]
fn empty_new_topic_is_a_noop() {
    let target = target_with_threads();
    let mut index = KeywordIndex::new(KeywordParams::default(), target.clone());
    index.add(7, toks(&["rust", "memory", "safety"]), DAY);
    let before = index.get(7).unwrap().related.len();

    index.update_on_new_topic(104, &[], 2 * DAY);
    assert_eq!(index.get(7).unwrap().related.len(), before);
}

#[test]
fn irrelevant_topics_are_never_stored() {
    let target = target_with_threads();
    let mut index = KeywordIndex::new(KeywordParams::default(), target.clone());
    index.add(7, toks(&["rust", "memory", "safety"]), DAY);

    // No token overlap with the profile: zero relevance, no entry.
    let tokens = toks(&["knitting", "wool"]);
    target.write().add(105, tokens.clone(), DAY);
    index.update_on_new_topic(105, &tokens, DAY);

    assert!(!index.get(7).unwrap().related.contains(105));
    assert!(target.read().get(105).unwrap().appears_in_special.is_empty());
}

#[test]
fn deleted_topics_leave_curated_lists() {
    let target = target_with_threads();
    let mut index = KeywordIndex::new(KeywordParams::default(), target.clone());
    index.add(7, toks(&["rust", "memory", "safety"]), DAY);
    assert!(index.get(7).unwrap().related.contains(100));

    index.update_on_delete_topic(100);
    target.write().delete(100);

    assert!(!index.get(7).unwrap().related.contains(100));
    assert_consistent(&index, &target);
}

#[test]
fn deleting_a_special_clears_target_back_references() {
    let target = target_with_threads();
    let mut index = KeywordIndex::new(KeywordParams::default(), target.clone());
    index.add(7, toks(&["rust", "memory", "safety"]), DAY);
    index.delete(7);

    assert!(index.is_empty());
    let guard = target.read();
    for (_, record) in guard.iter() {
        assert!(record.appears_in_special.is_empty());
    }
}

#[test]
fn profiles_are_recomputed_when_the_collection_grows() {
    let target = target_with_threads();
    let mut index = KeywordIndex::new(KeywordParams::default(), target.clone());
    index.add(7, toks(&["rust", "memory", "safety"]), DAY);
    let special = index.get(7).unwrap();
    let rust = *special.keywords.get("rust").unwrap();
    let memory = *special.keywords.get("memory").unwrap();
    assert!((rust - memory).abs() < 1e-12);

    // A second curated topic sharing "rust" shifts the idf balance:
    // tokens unique to one profile now outweigh the shared one.
    index.add(8, toks(&["rust", "compiler", "errors"]), DAY);
    let special = index.get(7).unwrap();
    let rust = *special.keywords.get("rust").unwrap();
    let memory = *special.keywords.get("memory").unwrap();
    assert!(memory > rust);
    assert_consistent(&index, &target);
}

#[test]
fn profile_is_capped_to_num_keywords() {
    let target = target_with_threads();
    let params = KeywordParams {
        num_keywords: 2,
        ..KeywordParams::default()
    };
    let mut index = KeywordIndex::new(params, target);
    index.add(
        7,
        toks(&["rust", "rust", "rust", "memory", "memory", "safety", "tooling"]),
        DAY,
    );

    let special = index.get(7).unwrap();
    assert_eq!(special.keywords.len(), 2);
    // The most frequent token survives the cap.
    assert!(special.keywords.contains_key("rust"));
}

#[test]
fn flat_save_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let target = target_with_threads();
    let mut index = KeywordIndex::new(KeywordParams::default(), target.clone());
    index.add(7, toks(&["rust", "memory", "safety"]), DAY);
    index.add(8, toks(&["gardening", "compost"]), 2 * DAY);

    let written = index.save(dir.path()).unwrap();
    assert_eq!(written, 2);
    assert!(dir.path().join("7").is_file());
    assert_eq!(index.save(dir.path()).unwrap(), 0);

    let mut reloaded = KeywordIndex::new(KeywordParams::default(), target);
    assert_eq!(reloaded.load(dir.path()).unwrap(), 2);
    let original = index.get(7).unwrap();
    let loaded = reloaded.get(7).unwrap();
    assert_eq!(loaded.related, original.related);
    assert_eq!(loaded.keywords, original.keywords);
    assert_eq!(loaded.tokens, original.tokens);
    assert!(!loaded.dirty);
}
