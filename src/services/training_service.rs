//! Training Service
//!
//! Trains and persists one price model per commodity. Each commodity is its
//! own unit of work: a failure is recorded and the next commodity proceeds.

use crate::config::TrainingConfig;
use crate::error::Result;
use crate::ml::{mean_absolute_error, train_test_split, RandomForest};
use crate::store::models::{feature_names, FeatureRow};
use crate::store::{ModelArtifact, ModelStore};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// Held-out metrics of a trained commodity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommodityMetrics {
    pub mae: f64,
    pub rows: usize,
}

/// Why a commodity was not trained
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    InsufficientData { rows: usize, required: usize },
    /// Requested in the allow-list but absent from the feature table
    NotInFeatureTable,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedCommodity {
    pub commodity: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommodityFailure {
    pub commodity: String,
    pub error: String,
}

/// Outcome of one orchestrator pass; only `trained` carries metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingReport {
    pub trained: BTreeMap<String, CommodityMetrics>,
    pub skipped: Vec<SkippedCommodity>,
    pub failed: Vec<CommodityFailure>,
}

impl TrainingReport {
    pub fn summary(&self) -> String {
        format!(
            "{} trained, {} skipped, {} failed",
            self.trained.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}

/// Training orchestration service
pub struct TrainingService;

impl TrainingService {
    /// Train every commodity in `features`, or only those in `allow` when it
    /// is non-empty.
    pub fn train_all(
        features: &[FeatureRow],
        config: &TrainingConfig,
        n_lags: usize,
        allow: &[String],
        store: &ModelStore,
    ) -> TrainingReport {
        let mut groups: BTreeMap<&str, Vec<&FeatureRow>> = BTreeMap::new();
        for row in features {
            if allow.is_empty() || allow.iter().any(|c| c == &row.commodity) {
                groups.entry(row.commodity.as_str()).or_default().push(row);
            }
        }

        let mut report = TrainingReport::default();
        for commodity in allow {
            if !groups.contains_key(commodity.as_str()) {
                info!("Skipping {}: no feature rows", commodity);
                report.skipped.push(SkippedCommodity {
                    commodity: commodity.clone(),
                    reason: SkipReason::NotInFeatureTable,
                });
            }
        }

        // commodities whose names sanitize to the same model slot
        let mut slots: HashMap<String, &str> = HashMap::new();

        for (commodity, rows) in groups {
            if rows.len() < config.min_rows {
                info!(
                    "Skipping {}: only {} rows (need {})",
                    commodity,
                    rows.len(),
                    config.min_rows
                );
                report.skipped.push(SkippedCommodity {
                    commodity: commodity.to_string(),
                    reason: SkipReason::InsufficientData {
                        rows: rows.len(),
                        required: config.min_rows,
                    },
                });
                continue;
            }

            if let Some(owner) = slots.insert(ModelStore::slot_name(commodity), commodity) {
                warn!("Training {} failed: model slot already used by {}", commodity, owner);
                report.failed.push(CommodityFailure {
                    commodity: commodity.to_string(),
                    error: format!(
                        "model slot {} already used by {}",
                        ModelStore::slot_name(commodity),
                        owner
                    ),
                });
                continue;
            }

            match Self::train_commodity(commodity, &rows, config, n_lags, store) {
                Ok(metrics) => {
                    info!("Trained {} on {} rows, test MAE {:.2}", commodity, metrics.rows, metrics.mae);
                    report.trained.insert(commodity.to_string(), metrics);
                }
                Err(e) => {
                    warn!("Training {} failed: {}", commodity, e);
                    report.failed.push(CommodityFailure {
                        commodity: commodity.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!("Training finished: {}", report.summary());
        report
    }

    /// Fit on the training split, score the held-out split, overwrite the slot
    pub fn train_commodity(
        commodity: &str,
        rows: &[&FeatureRow],
        config: &TrainingConfig,
        n_lags: usize,
        store: &ModelStore,
    ) -> Result<CommodityMetrics> {
        let x: Vec<Vec<f64>> = rows.iter().map(|r| r.feature_vector()).collect();
        let y: Vec<f64> = rows.iter().map(|r| r.price).collect();

        let (train_idx, test_idx) = train_test_split(rows.len(), config.test_ratio, config.seed);
        let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
        let y_train: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();
        let x_test: Vec<Vec<f64>> = test_idx.iter().map(|&i| x[i].clone()).collect();
        let y_test: Vec<f64> = test_idx.iter().map(|&i| y[i]).collect();

        let forest = RandomForest::fit(&x_train, &y_train, &config.forest, config.seed)?;
        let predicted = forest.predict(&x_test)?;
        let mae = mean_absolute_error(&y_test, &predicted);

        let artifact = ModelArtifact {
            commodity: commodity.to_string(),
            n_lags,
            feature_names: feature_names(n_lags),
            trained_at: Utc::now(),
            rows: rows.len(),
            test_mae: mae,
            forest,
        };
        store.save(&artifact)?;

        Ok(CommodityMetrics { mae, rows: rows.len() })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ForestConfig;
    use crate::store::models::WeatherFeatures;
    use chrono::{Duration, NaiveDate};
    use tempfile::tempdir;

    pub(crate) fn feature_rows(commodity: &str, n: usize, n_lags: usize) -> Vec<FeatureRow> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series: Vec<f64> = (0..n + n_lags).map(|i| 100.0 + (i % 7) as f64 * 3.0).collect();
        (0..n)
            .map(|i| {
                let t = i + n_lags;
                FeatureRow {
                    commodity: commodity.to_string(),
                    date: start + Duration::days(t as i64),
                    lags: (1..=n_lags).map(|k| series[t - k]).collect(),
                    weather: WeatherFeatures {
                        temp_max: 30.0 + (i % 5) as f64,
                        temp_min: 20.0,
                        precip_mm: (i % 3) as f64,
                        wind_speed: 9.0,
                    },
                    price: series[t],
                }
            })
            .collect()
    }

    fn quick_config() -> TrainingConfig {
        TrainingConfig {
            forest: ForestConfig {
                n_trees: 8,
                max_depth: 6,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_min_rows_boundary() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        let mut features = feature_rows("Maize", 49, 3);
        features.extend(feature_rows("Wheat", 50, 3));

        let report = TrainingService::train_all(&features, &quick_config(), 3, &[], &store);

        assert_eq!(report.trained.keys().collect::<Vec<_>>(), vec!["Wheat"]);
        assert_eq!(report.trained["Wheat"].rows, 50);
        assert!(report.trained["Wheat"].mae.is_finite());
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::InsufficientData { rows: 49, required: 50 }
        );
        assert!(store.exists("Wheat"));
        assert!(!store.exists("Maize"));
    }

    #[test]
    fn test_failure_is_isolated_per_commodity() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        // a directory in the slot makes the save fail
        std::fs::create_dir_all(store.slot_path("Onion")).unwrap();

        let mut features = feature_rows("Onion", 60, 2);
        features.extend(feature_rows("Potato", 60, 2));
        features.extend(feature_rows("Tomato", 60, 2));

        let report = TrainingService::train_all(&features, &quick_config(), 2, &[], &store);

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].commodity, "Onion");
        assert!(!report.trained.contains_key("Onion"));
        assert!(store.exists("Potato"));
        assert!(store.exists("Tomato"));
    }

    #[test]
    fn test_shared_slot_is_reported_as_failure() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        let mut features = feature_rows("Green Chilli", 55, 2);
        features.extend(feature_rows("Green_Chilli", 55, 2));

        let report = TrainingService::train_all(&features, &quick_config(), 2, &[], &store);

        assert_eq!(report.trained.keys().collect::<Vec<_>>(), vec!["Green Chilli"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].commodity, "Green_Chilli");
        assert!(report.failed[0].error.contains("Green Chilli"));
        assert_eq!(store.load("Green Chilli").unwrap().commodity, "Green Chilli");
    }

    #[test]
    fn test_allow_list_filters_and_reports_absent() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        let mut features = feature_rows("Rice", 55, 2);
        features.extend(feature_rows("Barley", 55, 2));

        let allow = vec!["Rice".to_string(), "Saffron".to_string()];
        let report = TrainingService::train_all(&features, &quick_config(), 2, &allow, &store);

        assert_eq!(report.trained.len(), 1);
        assert!(report.trained.contains_key("Rice"));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].commodity, "Saffron");
        assert_eq!(report.skipped[0].reason, SkipReason::NotInFeatureTable);
        assert!(!store.exists("Barley"));
    }

    #[test]
    fn test_artifact_records_layout() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path()).unwrap();
        let features = feature_rows("Green Chilli", 50, 4);
        let rows: Vec<&FeatureRow> = features.iter().collect();

        TrainingService::train_commodity("Green Chilli", &rows, &quick_config(), 4, &store).unwrap();

        let artifact = store.load("Green Chilli").unwrap();
        assert_eq!(artifact.n_lags, 4);
        assert_eq!(artifact.feature_names.len(), 8);
        assert_eq!(artifact.forest.n_features(), 8);
        assert_eq!(artifact.rows, 50);
    }
}
