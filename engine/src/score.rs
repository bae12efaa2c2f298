use crate::Timestamp;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Multiplicative time-decay factor for a candidate entering the
/// ranked list of `owner`. Candidates older than the owner are
/// down-weighted by `base^(days elapsed)`; newer candidates are never
/// boosted (the factor is capped at 1). Decay is directional: the two
/// stored scores of one pair call this with the arguments swapped.
pub fn decay_weight(base: f64, owner_ts: Timestamp, candidate_ts: Timestamp) -> f64 {
    let days = (owner_ts - candidate_ts) as f64 / SECONDS_PER_DAY;
    base.powf(days).min(1.0)
}

/// Cosine similarity between two sparse bag-of-words vectors sorted by
/// token id. Empty or zero-norm vectors score 0.
pub fn cosine(a: &[(u32, u32)], b: &[(u32, u32)]) -> f64 {
    let mut dot = 0.0f64;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += f64::from(a[i].1) * f64::from(b[j].1);
                i += 1;
                j += 1;
            }
        }
    }
    if dot == 0.0 {
        return 0.0;
    }
    let norm = |v: &[(u32, u32)]| {
        v.iter()
            .map(|&(_, c)| f64::from(c) * f64::from(c))
            .sum::<f64>()
            .sqrt()
    };
    let (na, nb) = (norm(a), norm(b));
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn older_candidates_decay() {
        let day = SECONDS_PER_DAY as Timestamp;
        let factor = decay_weight(0.5, 2 * day, 0);
        assert!((factor - 0.25).abs() < 1e-12);
    }

    #[test]
    fn newer_candidates_are_not_boosted() {
        let day = SECONDS_PER_DAY as Timestamp;
        assert_eq!(decay_weight(0.5, 0, 3 * day), 1.0);
        assert_eq!(decay_weight(0.5, day, day), 1.0);
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![(0, 2), (3, 1)];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_of_disjoint_vectors_is_zero() {
        let a = vec![(0, 1), (1, 1)];
        let b = vec![(2, 1), (3, 1)];
        assert_eq!(cosine(&a, &b), 0.0);
    }

    #[test]
    fn cosine_handles_empty_input() {
        let a: Vec<(u32, u32)> = Vec::new();
        let b = vec![(0, 1)];
        assert_eq!(cosine(&a, &b), 0.0);
    }

    #[test]
    fn cosine_partial_overlap() {
        // ["apple","banana"] vs ["apple","cherry"]: dot 1, norms sqrt(2).
        let a = vec![(0, 1), (1, 1)];
        let b = vec![(0, 1), (2, 1)];
        assert!((cosine(&a, &b) - 0.5).abs() < 1e-12);
    }
}
