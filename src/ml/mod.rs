//! Price regression model

mod decision_tree;
mod random_forest;

pub use decision_tree::{DecisionTree, TreeNode};
pub use random_forest::RandomForest;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Shuffled train/test partition of `0..n`.
///
/// The test side gets `ceil(n * test_ratio)` rows, leaving at least one
/// training row whenever `n > 1`.
pub fn train_test_split(n: usize, test_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_size = ((n as f64) * test_ratio).ceil() as usize;
    let test_size = test_size.min(n.saturating_sub(1));
    let test = indices.split_off(n - test_size);
    (indices, test)
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes_and_disjoint() {
        let (train, test) = train_test_split(50, 0.2, 42);
        assert_eq!(train.len(), 40);
        assert_eq!(test.len(), 10);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_seeded() {
        assert_eq!(train_test_split(30, 0.2, 1), train_test_split(30, 0.2, 1));
        assert_ne!(train_test_split(30, 0.2, 1).1, train_test_split(30, 0.2, 2).1);
    }

    #[test]
    fn test_mae() {
        assert_eq!(mean_absolute_error(&[1.0, 2.0, 3.0], &[2.0, 2.0, 1.0]), 1.0);
        assert_eq!(mean_absolute_error(&[], &[]), 0.0);
    }
}
