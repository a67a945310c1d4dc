//! Pipeline configuration
//!
//! Everything the scheduler needs is enumerated here and passed in at
//! construction: coordinates, commodity list, cadence, dataset locations
//! and the header-probing table used by the price normalizer.

use crate::error::{AppError, Result};
use crate::store::{region_slug, RECENT_SLUG};
use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming a JSON config file
pub const CONFIG_ENV: &str = "AGROVISION_CONFIG";
/// Overrides `data_dir`
pub const DATA_DIR_ENV: &str = "AGROVISION_DATA_DIR";
/// Overrides `models_dir`
pub const MODELS_DIR_ENV: &str = "AGROVISION_MODELS_DIR";

/// Longest archive window accepted, about a century
pub const MAX_HISTORY_DAYS: u32 = 36_600;
/// Longest forecast window the provider serves
pub const MAX_FORECAST_DAYS: u32 = 16;

/// Top-level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding canonical and derived datasets
    pub data_dir: PathBuf,
    /// Directory holding one model slot per commodity
    pub models_dir: PathBuf,
    /// Run-status record; defaults to `<data_dir>/retrain_status.json`
    pub status_file: Option<PathBuf>,
    /// Bundled static price dataset used when no live source is configured
    pub fallback_price_csv: PathBuf,
    /// Live price source (file path or http(s) URL)
    pub price_source: Option<String>,
    /// Request timeout for a live price source
    pub source_timeout_secs: u64,
    pub columns: ColumnMap,
    pub weather: WeatherConfig,
    /// Commodities to train; empty trains everything present
    pub commodities: Vec<String>,
    /// Commodity -> region name used by the weather join
    pub commodity_regions: BTreeMap<String, String>,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
    pub cadence: Cadence,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            models_dir: PathBuf::from("models"),
            status_file: None,
            fallback_price_csv: PathBuf::from("Agriculture_price_dataset.csv"),
            price_source: None,
            source_timeout_secs: 20,
            columns: ColumnMap::default(),
            weather: WeatherConfig::default(),
            commodities: Vec::new(),
            commodity_regions: BTreeMap::new(),
            features: FeatureConfig::default(),
            training: TrainingConfig::default(),
            cadence: Cadence::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `AGROVISION_CONFIG` if set, then apply directory overrides
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var(MODELS_DIR_ENV) {
            config.models_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.features.n_lags == 0 {
            return Err(AppError::Config("features.n_lags must be at least 1".into()));
        }
        if !(self.training.test_ratio > 0.0 && self.training.test_ratio < 1.0) {
            return Err(AppError::Config(format!(
                "training.test_ratio must be in (0, 1), got {}",
                self.training.test_ratio
            )));
        }
        if self.training.forest.n_trees == 0 {
            return Err(AppError::Config("training.forest.n_trees must be at least 1".into()));
        }
        if self.columns.price.is_empty() {
            return Err(AppError::Config("columns.price needs at least one candidate".into()));
        }
        if self.weather.history_days > MAX_HISTORY_DAYS {
            return Err(AppError::Config(format!(
                "weather.history_days must be at most {}, got {}",
                MAX_HISTORY_DAYS, self.weather.history_days
            )));
        }
        if !(1..=MAX_FORECAST_DAYS).contains(&self.weather.forecast_days) {
            return Err(AppError::Config(format!(
                "weather.forecast_days must be in 1..={}, got {}",
                MAX_FORECAST_DAYS, self.weather.forecast_days
            )));
        }
        if self.weather.timeout_secs == 0 || self.source_timeout_secs == 0 {
            return Err(AppError::Config("request timeouts must be at least 1 second".into()));
        }

        let mut slugs: BTreeMap<String, &str> = BTreeMap::new();
        for location in &self.weather.regions {
            let slug = region_slug(&location.name);
            if slug == RECENT_SLUG {
                return Err(AppError::Config(format!(
                    "region '{}' would overwrite the default-location weather file",
                    location.name
                )));
            }
            if let Some(other) = slugs.insert(slug, &location.name) {
                return Err(AppError::Config(format!(
                    "regions '{}' and '{}' share one weather file",
                    other, location.name
                )));
            }
        }

        self.cadence.timezone()?;
        for (commodity, region) in &self.commodity_regions {
            let known = self.weather.default_location.name == *region
                || self.weather.regions.iter().any(|r| r.name == *region);
            if !known {
                return Err(AppError::Config(format!(
                    "commodity '{}' mapped to unknown region '{}'",
                    commodity, region
                )));
            }
        }
        Ok(())
    }

    pub fn status_path(&self) -> PathBuf {
        self.status_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("retrain_status.json"))
    }
}

/// Ordered header candidates per canonical price field.
///
/// Candidates are matched case-sensitively, first hit wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub date: Vec<String>,
    pub price: Vec<String>,
    pub commodity: Vec<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            date: owned(&["date", "Date", "Price Date", "PRICE DATE"]),
            price: owned(&["Modal_Price", "Price", "Max_Price", "Min_Price"]),
            commodity: owned(&["Commodity", "Crop", "Product"]),
        }
    }
}

/// A named coordinate pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Weather source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Location fetched when `weather_recent.csv` is absent
    pub default_location: Location,
    /// Additional regions refreshed into `weather_<region>.csv`
    pub regions: Vec<Location>,
    /// Trailing window requested from the archive
    pub history_days: u32,
    pub archive_url: String,
    pub forecast_url: String,
    /// Fixed window returned by the forecast fallback
    pub forecast_days: u32,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            default_location: Location {
                name: "mumbai".to_string(),
                latitude: 19.0760,
                longitude: 72.8777,
            },
            regions: Vec::new(),
            history_days: 365,
            archive_url: "https://archive-api.open-meteo.com/v1/archive".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            forecast_days: 7,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub n_lags: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { n_lags: 7 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Commodities with fewer feature rows are skipped
    pub min_rows: usize,
    pub test_ratio: f64,
    pub seed: u64,
    pub forest: ForestConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_rows: 50,
            test_ratio: 0.2,
            seed: 42,
            forest: ForestConfig::default(),
        }
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split (all when None)
    pub max_features: Option<usize>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 12,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

/// Wall-clock cadence of the retraining job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "every", rename_all = "lowercase")]
pub enum Cadence {
    Daily {
        at: NaiveTime,
        timezone: String,
    },
    Weekly {
        weekday: Weekday,
        at: NaiveTime,
        timezone: String,
    },
}

impl Cadence {
    pub fn at(&self) -> NaiveTime {
        match self {
            Cadence::Daily { at, .. } | Cadence::Weekly { at, .. } => *at,
        }
    }

    /// IANA zone the wall-clock time is expressed in
    pub fn timezone(&self) -> Result<Tz> {
        let name = match self {
            Cadence::Daily { timezone, .. } | Cadence::Weekly { timezone, .. } => timezone,
        };
        name.parse::<Tz>()
            .map_err(|e| AppError::Config(format!("unknown timezone '{}': {}", name, e)))
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Cadence::Weekly {
            weekday: Weekday::Mon,
            at: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or(NaiveTime::MIN),
            timezone: "Asia/Kolkata".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_validate() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.features.n_lags, 7);
        assert_eq!(config.training.min_rows, 50);
        assert_eq!(config.status_path(), PathBuf::from("data/retrain_status.json"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(
            &path,
            r#"{
                "data_dir": "/srv/agro/data",
                "features": { "n_lags": 3 },
                "cadence": { "every": "daily", "at": "02:30:00", "timezone": "UTC" },
                "columns": { "price": ["Rate"] }
            }"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/agro/data"));
        assert_eq!(config.features.n_lags, 3);
        assert_eq!(config.columns.price, vec!["Rate".to_string()]);
        // untouched candidate lists stay at their defaults
        assert_eq!(config.columns.commodity[0], "Commodity");
        assert_eq!(config.training.forest.n_trees, 200);
        assert!(matches!(config.cadence, Cadence::Daily { .. }));
    }

    #[test]
    fn test_rejects_unknown_region_mapping() {
        let mut config = PipelineConfig::default();
        config
            .commodity_regions
            .insert("Wheat".to_string(), "atlantis".to_string());
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let mut config = PipelineConfig::default();
        config.cadence = Cadence::Daily {
            at: NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
            timezone: "Mars/Olympus".to_string(),
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_rejects_unbounded_windows() {
        let mut config = PipelineConfig::default();
        config.weather.history_days = 200_000_000;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.weather.history_days = MAX_HISTORY_DAYS;
        config.validate().unwrap();

        config.weather.forecast_days = 0;
        assert!(config.validate().is_err());
        config.weather.forecast_days = MAX_FORECAST_DAYS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_colliding_region_files() {
        let region = |name: &str| Location {
            name: name.to_string(),
            latitude: 28.6,
            longitude: 77.2,
        };

        let mut config = PipelineConfig::default();
        config.weather.regions = vec![region("Recent")];
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.weather.regions = vec![region("New Delhi"), region("new-delhi")];
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.weather.regions = vec![region("New Delhi"), region("Pune")];
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_zero_lags() {
        let mut config = PipelineConfig::default();
        config.features.n_lags = 0;
        assert!(config.validate().is_err());
    }
}
