//! Local dataset store
//!
//! Canonical and derived datasets live as CSV files under one data
//! directory. Every write replaces the whole file.

pub mod models;
mod model_store;
mod status;

pub use model_store::{ModelArtifact, ModelStore};
pub use status::{RunStatus, StatusRecord, StatusStore};

use crate::error::{AppError, Result};
use chrono::NaiveDate;
use csv::{Reader, Writer};
use models::{
    feature_names, FeatureRow, MergedRow, PriceRecord, WeatherFeatures, WeatherRecord,
    WEATHER_FEATURES,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const PRICES_FILE: &str = "market_prices_real.csv";
pub const WEATHER_RECENT_FILE: &str = "weather_recent.csv";
pub const MERGED_FILE: &str = "merged_prices_weather.csv";
pub const FEATURES_FILE: &str = "prices_model_ready.csv";

/// File-backed dataset store
pub struct DatasetStore {
    data_dir: PathBuf,
}

impl DatasetStore {
    /// Open the store, creating the data directory if needed
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn prices_path(&self) -> PathBuf {
        self.data_dir.join(PRICES_FILE)
    }

    pub fn weather_recent_path(&self) -> PathBuf {
        self.data_dir.join(WEATHER_RECENT_FILE)
    }

    pub fn region_weather_path(&self, region: &str) -> PathBuf {
        self.data_dir.join(format!("weather_{}.csv", region_slug(region)))
    }

    pub fn has_prices(&self) -> bool {
        self.prices_path().exists()
    }

    pub fn has_weather(&self) -> bool {
        self.weather_recent_path().exists()
    }

    /// Persist canonical prices.
    ///
    /// Duplicate (date, commodity) pairs resolve to the last occurrence.
    /// Output is sorted by date, then commodity.
    pub fn write_prices(&self, records: &[PriceRecord]) -> Result<usize> {
        let deduped = dedupe_prices(records);
        write_rows(&self.prices_path(), &deduped)?;
        tracing::info!(
            "Saved {} prices to {:?} ({} duplicates collapsed)",
            deduped.len(),
            self.prices_path(),
            records.len() - deduped.len()
        );
        Ok(deduped.len())
    }

    pub fn read_prices(&self) -> Result<Vec<PriceRecord>> {
        let path = self.prices_path();
        if !path.exists() {
            return Err(AppError::MissingDataset(format!("{}", path.display())));
        }
        read_rows(&path)
    }

    pub fn write_weather_recent(&self, records: &[WeatherRecord]) -> Result<PathBuf> {
        let path = self.weather_recent_path();
        write_rows(&path, records)?;
        tracing::info!("Saved {} weather rows to {:?}", records.len(), path);
        Ok(path)
    }

    pub fn write_region_weather(&self, region: &str, records: &[WeatherRecord]) -> Result<PathBuf> {
        let path = self.region_weather_path(region);
        write_rows(&path, records)?;
        tracing::info!("Saved {} weather rows for {} to {:?}", records.len(), region, path);
        Ok(path)
    }

    /// Weather files to merge, in load order
    pub fn weather_files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.data_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("weather_") && n.ends_with(".csv"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            files.push(self.weather_recent_path());
        }
        Ok(files)
    }

    /// Concatenate every weather file in load order
    pub fn read_weather(&self) -> Result<Vec<WeatherRecord>> {
        let mut all = Vec::new();
        for path in self.weather_files()? {
            if !path.exists() {
                return Err(AppError::MissingDataset(format!("{}", path.display())));
            }
            let mut records: Vec<WeatherRecord> = read_rows(&path)?;
            tracing::debug!("Loaded {} weather rows from {:?}", records.len(), path);
            all.append(&mut records);
        }
        Ok(all)
    }

    pub fn write_merged(&self, rows: &[MergedRow]) -> Result<PathBuf> {
        let path = self.data_dir.join(MERGED_FILE);
        write_rows(&path, rows)?;
        Ok(path)
    }

    /// Persist the feature-ready table with flat `lag_k` columns
    pub fn write_features(&self, rows: &[FeatureRow], n_lags: usize) -> Result<PathBuf> {
        let path = self.data_dir.join(FEATURES_FILE);
        let mut writer = Writer::from_writer(File::create(&path)?);

        let mut header = vec!["commodity".to_string(), "date".to_string()];
        header.extend(feature_names(n_lags));
        header.push("price".to_string());
        writer.write_record(&header)?;

        for row in rows {
            if row.lags.len() != n_lags {
                return Err(AppError::Validation(format!(
                    "feature row for {} on {} has {} lags, expected {}",
                    row.commodity,
                    row.date,
                    row.lags.len(),
                    n_lags
                )));
            }
            let mut record = vec![row.commodity.clone(), row.date.to_string()];
            record.extend(row.feature_vector().iter().map(|v| v.to_string()));
            record.push(row.price.to_string());
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(path)
    }

    /// Read back the feature-ready table written by `write_features`
    pub fn read_features(&self, n_lags: usize) -> Result<Vec<FeatureRow>> {
        let path = self.data_dir.join(FEATURES_FILE);
        if !path.exists() {
            return Err(AppError::MissingDataset(format!("{}", path.display())));
        }

        let mut reader = Reader::from_path(&path)?;
        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| AppError::Schema(format!("{} lacks column '{}'", path.display(), name)))
        };

        let commodity_idx = column("commodity")?;
        let date_idx = column("date")?;
        let price_idx = column("price")?;
        let lag_idx = (1..=n_lags)
            .map(|k| column(format!("lag_{}", k).as_str()))
            .collect::<Result<Vec<_>>>()?;
        let weather_idx = WEATHER_FEATURES
            .iter()
            .map(|&name| column(name))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let number = |idx: usize| -> Result<f64> {
                record
                    .get(idx)
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .ok_or_else(|| {
                        AppError::Validation(format!("non-numeric cell at row {}, column {}", line + 1, idx))
                    })
            };

            let date: NaiveDate = record
                .get(date_idx)
                .and_then(crate::dates::parse_date)
                .ok_or_else(|| AppError::Validation(format!("bad date at row {}", line + 1)))?;

            rows.push(FeatureRow {
                commodity: record.get(commodity_idx).unwrap_or_default().to_string(),
                date,
                lags: lag_idx.iter().map(|&i| number(i)).collect::<Result<Vec<_>>>()?,
                weather: WeatherFeatures {
                    temp_max: number(weather_idx[0])?,
                    temp_min: number(weather_idx[1])?,
                    precip_mm: number(weather_idx[2])?,
                    wind_speed: number(weather_idx[3])?,
                },
                price: number(price_idx)?,
            });
        }

        Ok(rows)
    }
}

/// Slug of `weather_recent.csv`; no configured region may produce it
pub const RECENT_SLUG: &str = "recent";

/// File-name slug of a region: lowercase, non-alphanumerics as `_`
pub fn region_slug(region: &str) -> String {
    region
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Last-write-wins on (date, commodity), ordered by date then commodity
pub fn dedupe_prices(records: &[PriceRecord]) -> Vec<PriceRecord> {
    let mut latest: BTreeMap<(NaiveDate, &str), f64> = BTreeMap::new();
    for record in records {
        latest.insert((record.date, record.commodity.as_str()), record.price);
    }
    latest
        .into_iter()
        .map(|((date, commodity), price)| PriceRecord {
            date,
            commodity: commodity.to_string(),
            price,
        })
        .collect()
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = Writer::from_writer(File::create(path)?);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = Reader::from_path(path)?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}
