//! Canonical dataset rows

use crate::dates::parse_date;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Weather columns used as model features, in feature-vector order
pub const WEATHER_FEATURES: [&str; 4] = ["temp_max", "temp_min", "precip_mm", "wind_speed"];

/// Lenient date deserializer for CSV cells
pub(crate) fn deserialize_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("unparseable date '{}'", raw)))
}

/// Cleaned market price observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    pub commodity: String,
    pub price: f64,
}

/// Daily weather observation; absent upstream fields stay `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub temp_max: Option<f64>,
    #[serde(default)]
    pub temp_min: Option<f64>,
    #[serde(default)]
    pub precip_mm: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
}

impl WeatherRecord {
    /// All feature fields present and finite
    pub fn features(&self) -> Option<WeatherFeatures> {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        Some(WeatherFeatures {
            temp_max: finite(self.temp_max)?,
            temp_min: finite(self.temp_min)?,
            precip_mm: finite(self.precip_mm)?,
            wind_speed: finite(self.wind_speed)?,
        })
    }
}

/// Price row left-joined with the weather row sharing its date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    pub commodity: String,
    pub price: f64,
    pub region: Option<String>,
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub precip_mm: Option<f64>,
    pub wind_speed: Option<f64>,
}

impl MergedRow {
    pub fn weather_features(&self) -> Option<WeatherFeatures> {
        WeatherRecord {
            date: self.date,
            region: None,
            temp_max: self.temp_max,
            temp_min: self.temp_min,
            precip_mm: self.precip_mm,
            wind_speed: self.wind_speed,
        }
        .features()
    }
}

/// Fully populated weather feature block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherFeatures {
    pub temp_max: f64,
    pub temp_min: f64,
    pub precip_mm: f64,
    pub wind_speed: f64,
}

impl WeatherFeatures {
    pub fn to_array(self) -> [f64; 4] {
        [self.temp_max, self.temp_min, self.precip_mm, self.wind_speed]
    }
}

/// Training row: `lags[k - 1]` is the price `k` observations earlier
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub commodity: String,
    pub date: NaiveDate,
    pub lags: Vec<f64>,
    pub weather: WeatherFeatures,
    /// Target price on `date`
    pub price: f64,
}

impl FeatureRow {
    /// Lags followed by weather, matching `feature_names`
    pub fn feature_vector(&self) -> Vec<f64> {
        let mut features = Vec::with_capacity(self.lags.len() + WEATHER_FEATURES.len());
        features.extend_from_slice(&self.lags);
        features.extend_from_slice(&self.weather.to_array());
        features
    }
}

/// Column names of a feature vector built with `n_lags` lags
pub fn feature_names(n_lags: usize) -> Vec<String> {
    (1..=n_lags)
        .map(|k| format!("lag_{}", k))
        .chain(WEATHER_FEATURES.iter().map(|s| s.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_names_order() {
        assert_eq!(
            feature_names(2),
            vec!["lag_1", "lag_2", "temp_max", "temp_min", "precip_mm", "wind_speed"]
        );
    }

    #[test]
    fn test_weather_features_require_every_field() {
        let mut record = WeatherRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            region: None,
            temp_max: Some(31.0),
            temp_min: Some(22.0),
            precip_mm: Some(0.0),
            wind_speed: None,
        };
        assert!(record.features().is_none());

        record.wind_speed = Some(f64::NAN);
        assert!(record.features().is_none());

        record.wind_speed = Some(12.5);
        assert_eq!(record.features().unwrap().to_array(), [31.0, 22.0, 0.0, 12.5]);
    }
}
