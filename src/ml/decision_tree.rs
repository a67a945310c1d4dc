//! Regression tree grown by variance reduction

use crate::config::ForestConfig;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Relative gain a split must exceed
const MIN_GAIN: f64 = 1e-12;

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Fitted regression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
}

struct Grower<'a> {
    features: &'a [Vec<f64>],
    targets: &'a [f64],
    params: &'a ForestConfig,
    n_features: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl DecisionTree {
    /// Grow a tree over the rows named by `indices` (repeats allowed)
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[f64],
        indices: Vec<usize>,
        params: &ForestConfig,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let n_features = features.first().map(|row| row.len()).unwrap_or(0);
        let grower = Grower {
            features,
            targets,
            params,
            n_features,
        };
        Self {
            root: grower.grow(indices, 0, rng),
        }
    }

    pub fn predict_one(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

impl Grower<'_> {
    fn grow(&self, indices: Vec<usize>, depth: usize, rng: &mut ChaCha8Rng) -> TreeNode {
        let n = indices.len();
        let mean = if n == 0 {
            0.0
        } else {
            indices.iter().map(|&i| self.targets[i]).sum::<f64>() / n as f64
        };
        let sse: f64 = indices.iter().map(|&i| (self.targets[i] - mean).powi(2)).sum();

        let leaf = TreeNode::Leaf {
            value: mean,
            n_samples: n,
        };

        if depth >= self.params.max_depth
            || n < self.params.min_samples_split.max(2)
            || n < 2 * self.params.min_samples_leaf.max(1)
            || sse <= MIN_GAIN
        {
            return leaf;
        }

        let best = match self.best_split(&indices, sse, rng) {
            Some(best) => best,
            None => return leaf,
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.features[i][best.feature] <= best.threshold);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.grow(left, depth + 1, rng)),
            right: Box::new(self.grow(right, depth + 1, rng)),
        }
    }

    /// Sorted sweep per candidate feature using running sums
    fn best_split(&self, indices: &[usize], parent_sse: f64, rng: &mut ChaCha8Rng) -> Option<BestSplit> {
        let mut candidates: Vec<usize> = (0..self.n_features).collect();
        candidates.shuffle(rng);
        let max_features = self
            .params
            .max_features
            .unwrap_or(self.n_features)
            .clamp(1, self.n_features.max(1));
        candidates.truncate(max_features);

        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let total_sum: f64 = indices.iter().map(|&i| self.targets[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.targets[i].powi(2)).sum();

        // running sums carry rounding noise proportional to the target scale
        let tolerance = MIN_GAIN * total_sq.max(1.0);
        let mut best: Option<BestSplit> = None;
        let mut order = indices.to_vec();

        for feature in candidates {
            order.sort_by(|&a, &b| self.features[a][feature].total_cmp(&self.features[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 1..n {
                let y = self.targets[order[pos - 1]];
                left_sum += y;
                left_sq += y * y;

                if pos < min_leaf || n - pos < min_leaf {
                    continue;
                }
                let lo = self.features[order[pos - 1]][feature];
                let hi = self.features[order[pos]][feature];
                if lo >= hi {
                    continue;
                }

                let n_left = pos as f64;
                let n_right = (n - pos) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / n_left)
                    + (right_sq - right_sum * right_sum / n_right);

                if parent_sse - sse > tolerance && best.as_ref().map_or(true, |b| sse < b.sse) {
                    best = Some(BestSplit {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        sse,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_step_function_is_learned() {
        let features: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..40).map(|i| if i < 20 { 10.0 } else { 50.0 }).collect();
        let params = ForestConfig {
            max_depth: 3,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let tree = DecisionTree::fit(&features, &targets, (0..40).collect(), &params, &mut rng);

        assert_eq!(tree.predict_one(&[3.0]), 10.0);
        assert_eq!(tree.predict_one(&[35.0]), 50.0);
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let features: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 1.0]).collect();
        let targets = vec![4.2; 10];
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let tree = DecisionTree::fit(
            &features,
            &targets,
            (0..10).collect(),
            &ForestConfig::default(),
            &mut rng,
        );

        assert_eq!(tree.depth(), 1);
        assert!((tree.predict_one(&[100.0, 0.0]) - 4.2).abs() < 1e-12);
    }

    #[test]
    fn test_depth_limit_respected() {
        let features: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..64).map(|i| (i * i) as f64).collect();
        let params = ForestConfig {
            max_depth: 4,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let tree = DecisionTree::fit(&features, &targets, (0..64).collect(), &params, &mut rng);
        assert!(tree.depth() <= 5);
    }
}
