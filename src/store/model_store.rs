//! Per-commodity model slots

use crate::error::{AppError, Result};
use crate::ml::RandomForest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persisted model plus the metadata needed to rebuild its input vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub commodity: String,
    pub n_lags: usize,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub rows: usize,
    pub test_mae: f64,
    pub forest: RandomForest,
}

/// Directory of `price_rf_<commodity>.json` slots
pub struct ModelStore {
    models_dir: PathBuf,
}

impl ModelStore {
    pub fn new(models_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(models_dir)?;
        Ok(Self {
            models_dir: models_dir.to_path_buf(),
        })
    }

    /// Slot file name; spaces and path separators become underscores
    pub fn slot_name(commodity: &str) -> String {
        let sanitized: String = commodity
            .chars()
            .map(|c| match c {
                ' ' | '/' | '\\' => '_',
                other => other,
            })
            .collect();
        format!("price_rf_{}.json", sanitized)
    }

    pub fn slot_path(&self, commodity: &str) -> PathBuf {
        self.models_dir.join(Self::slot_name(commodity))
    }

    pub fn exists(&self, commodity: &str) -> bool {
        self.slot_path(commodity).is_file()
    }

    /// Overwrite the slot for `artifact.commodity`
    pub fn save(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        let path = self.slot_path(&artifact.commodity);
        let json = serde_json::to_vec(artifact)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    pub fn load(&self, commodity: &str) -> Result<ModelArtifact> {
        let path = self.slot_path(commodity);
        if !path.is_file() {
            return Err(AppError::ModelMissing(commodity.to_string()));
        }
        let raw = std::fs::read(&path)?;
        let artifact: ModelArtifact = serde_json::from_slice(&raw)?;
        if artifact.commodity != commodity {
            // two names can sanitize to the same slot
            return Err(AppError::ModelMissing(commodity.to_string()));
        }
        Ok(artifact)
    }
}
