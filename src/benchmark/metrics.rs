//! Retrieval quality metrics.

use std::collections::HashSet;

/// Compute recall@k: fraction of true k-nearest neighbors that were retrieved.
///
/// recall@k = |retrieved ∩ ground_truth| / k
///
/// # Returns
///
/// Recall value in [0.0, 1.0]
pub fn recall_at_k(ground_truth: &[u32], retrieved: &[u32], k: usize) -> f32 {
    if k == 0 || ground_truth.is_empty() {
        return 0.0;
    }

    let gt_set: HashSet<u32> = ground_truth.iter().take(k).copied().collect();
    let retrieved_set: HashSet<u32> = retrieved.iter().take(k).copied().collect();

    let intersection = gt_set.intersection(&retrieved_set).count();
    intersection as f32 / gt_set.len().min(k) as f32
}

/// Mean recall@k across queries.
pub fn mean_recall(ground_truths: &[Vec<u32>], retrievals: &[Vec<u32>], k: usize) -> f32 {
    if ground_truths.is_empty() {
        return 0.0;
    }

    let total: f32 = ground_truths
        .iter()
        .zip(retrievals.iter())
        .map(|(gt, ret)| recall_at_k(gt, ret, k))
        .sum();

    total / ground_truths.len() as f32
}

/// Mean of the raw candidate counts of a batch.
pub fn mean_collisions(counts: impl IntoIterator<Item = usize>) -> f64 {
    let (sum, n) = counts
        .into_iter()
        .fold((0usize, 0usize), |(s, n), c| (s + c, n + 1));
    if n == 0 {
        0.0
    } else {
        sum as f64 / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recall_perfect() {
        assert_eq!(recall_at_k(&[1, 2, 3], &[3, 2, 1], 3), 1.0);
    }

    #[test]
    fn test_recall_partial() {
        assert!((recall_at_k(&[1, 2, 3, 4], &[1, 9, 3, 8], 4) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_recall_empty() {
        assert_eq!(recall_at_k(&[], &[1], 3), 0.0);
        assert_eq!(recall_at_k(&[1], &[], 3), 0.0);
    }

    #[test]
    fn test_mean_recall() {
        let gts = vec![vec![1, 2], vec![3, 4]];
        let rets = vec![vec![1, 2], vec![5, 6]];
        assert!((mean_recall(&gts, &rets, 2) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_mean_collisions() {
        assert_eq!(mean_collisions(Vec::new()), 0.0);
        assert_eq!(mean_collisions([2, 4, 6]), 4.0);
    }
}
