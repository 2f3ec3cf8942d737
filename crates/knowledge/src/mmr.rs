//! Maximal marginal relevance selection.
//!
//! Greedily picks the candidate that maximizes
//! `lambda * sim(query, c) - (1 - lambda) * max(sim(c, selected))`,
//! trading relevance against redundancy with what is already chosen.

use crate::store::cosine_similarity;

/// Select up to `k` candidate indices by maximal marginal relevance.
///
/// `lambda` of 1.0 is pure relevance, 0.0 pure diversity. The first pick is
/// always the most relevant candidate. Ties keep the earlier candidate, so
/// the result is deterministic for a given input order.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[Vec<f32>],
    k: usize,
    lambda: f32,
) -> Vec<usize> {
    let k = k.min(candidates.len());
    if k == 0 {
        return Vec::new();
    }

    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query, c))
        .collect();

    let mut selected: Vec<usize> = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;

        for (slot, &candidate) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&chosen| cosine_similarity(&candidates[candidate], &candidates[chosen]))
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if selected.is_empty() { 0.0 } else { redundancy };

            let score = lambda * relevance[candidate] - (1.0 - lambda) * redundancy;
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((slot, score));
            }
        }

        match best {
            Some((slot, _)) => selected.push(remaining.remove(slot)),
            None => break,
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_pick_is_most_relevant() {
        let query = vec![1.0, 0.0];
        let candidates = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]];
        let picked = maximal_marginal_relevance(&query, &candidates, 1, 0.5);
        assert_eq!(picked, vec![1]);
    }

    #[test]
    fn test_duplicates_are_penalized() {
        let query = vec![1.0, 0.0, 0.0];
        let candidates = vec![
            vec![0.8, 0.6, 0.0],
            vec![0.8, 0.6, 0.0],
            vec![0.6, 0.0, 0.8],
        ];

        // Pure relevance would take both copies
        assert_eq!(
            maximal_marginal_relevance(&query, &candidates, 2, 1.0),
            vec![0, 1]
        );
        // Balanced selection prefers the different vector second
        assert_eq!(
            maximal_marginal_relevance(&query, &candidates, 2, 0.5),
            vec![0, 2]
        );
    }

    #[test]
    fn test_k_larger_than_candidates() {
        let candidates = vec![vec![1.0], vec![0.5]];
        let picked = maximal_marginal_relevance(&[1.0], &candidates, 5, 0.5);
        assert_eq!(picked.len(), 2);
        assert!(maximal_marginal_relevance(&[1.0], &[], 3, 0.5).is_empty());
    }
}
