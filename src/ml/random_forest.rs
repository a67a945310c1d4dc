//! Bagged ensemble of regression trees

use super::decision_tree::DecisionTree;
use crate::config::ForestConfig;
use crate::error::{AppError, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Random forest regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    seed: u64,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit `config.n_trees` trees, each on its own bootstrap sample
    pub fn fit(features: &[Vec<f64>], targets: &[f64], config: &ForestConfig, seed: u64) -> Result<Self> {
        if features.is_empty() {
            return Err(AppError::Training("cannot fit on an empty dataset".into()));
        }
        if features.len() != targets.len() {
            return Err(AppError::Training(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }

        let n_features = features[0].len();
        if n_features == 0 {
            return Err(AppError::Training("feature rows are empty".into()));
        }
        if let Some(row) = features.iter().position(|r| r.len() != n_features) {
            return Err(AppError::Training(format!(
                "row {} has {} features, expected {}",
                row,
                features[row].len(),
                n_features
            )));
        }
        if features.iter().flatten().chain(targets).any(|v| !v.is_finite()) {
            return Err(AppError::Training("non-finite value in training data".into()));
        }

        let n = features.len();
        let trees = (0..config.n_trees)
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(features, targets, sample, config, &mut rng)
            })
            .collect();

        Ok(Self {
            config: config.clone(),
            seed,
            n_features,
            trees,
        })
    }

    /// Average of the per-tree predictions
    pub fn predict_one(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(AppError::Validation(format!(
                "expected {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        if self.trees.is_empty() {
            return Err(AppError::Training("forest has no trees".into()));
        }
        let total: f64 = self.trees.iter().map(|t| t.predict_one(row)).sum();
        Ok(total / self.trees.len() as f64)
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict_one(row)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::mean_absolute_error;

    fn linear_dataset() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..120)
            .map(|i| vec![i as f64, ((i * 7) % 13) as f64])
            .collect();
        let targets = features.iter().map(|r| 3.0 * r[0] + 5.0).collect();
        (features, targets)
    }

    #[test]
    fn test_forest_fits_trend() {
        let (features, targets) = linear_dataset();
        let config = ForestConfig {
            n_trees: 15,
            ..Default::default()
        };

        let forest = RandomForest::fit(&features, &targets, &config, 42).unwrap();
        assert_eq!(forest.n_trees(), 15);

        let predictions = forest.predict(&features).unwrap();
        let mae = mean_absolute_error(&targets, &predictions);
        assert!(mae < 10.0, "in-sample MAE too high: {}", mae);
    }

    #[test]
    fn test_same_seed_same_model() {
        let (features, targets) = linear_dataset();
        let config = ForestConfig {
            n_trees: 5,
            ..Default::default()
        };

        let a = RandomForest::fit(&features, &targets, &config, 9).unwrap();
        let b = RandomForest::fit(&features, &targets, &config, 9).unwrap();
        let probe = vec![61.5, 4.0];
        assert_eq!(a.predict_one(&probe).unwrap(), b.predict_one(&probe).unwrap());
    }

    #[test]
    fn test_rejects_bad_input() {
        let config = ForestConfig::default();
        assert!(RandomForest::fit(&[], &[], &config, 1).is_err());
        assert!(RandomForest::fit(&[vec![1.0], vec![1.0, 2.0]], &[1.0, 2.0], &config, 1).is_err());
        assert!(RandomForest::fit(&[vec![f64::NAN]], &[1.0], &config, 1).is_err());

        let small = ForestConfig {
            n_trees: 2,
            ..Default::default()
        };
        let forest = RandomForest::fit(&[vec![1.0], vec![2.0]], &[1.0, 2.0], &small, 1).unwrap();
        assert!(matches!(forest.predict_one(&[1.0, 2.0]), Err(AppError::Validation(_))));
    }
}
