//! Prediction Service
//!
//! Consumer side of the model store: rebuilds a feature vector from recent
//! prices and a weather reading, then asks the commodity's model.

use crate::error::{AppError, Result};
use crate::store::models::WeatherFeatures;
use crate::store::ModelStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Price used to pad when no history is supplied
pub const DEFAULT_PAD_PRICE: f64 = 1000.0;

/// Weather reading supplied by the caller; every field is required
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherInput {
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub precip_mm: Option<f64>,
    pub wind_speed: Option<f64>,
}

impl WeatherInput {
    fn require(self) -> Result<WeatherFeatures> {
        let field = |name: &str, value: Option<f64>| {
            value
                .filter(|v| v.is_finite())
                .ok_or_else(|| AppError::Validation(format!("missing weather field '{}'", name)))
        };
        Ok(WeatherFeatures {
            temp_max: field("temp_max", self.temp_max)?,
            temp_min: field("temp_min", self.temp_min)?,
            precip_mm: field("precip_mm", self.precip_mm)?,
            wind_speed: field("wind_speed", self.wind_speed)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub commodity: String,
    pub predicted_price: f64,
}

/// Prediction service
pub struct PredictionService;

impl PredictionService {
    /// Lag vector from oldest-first `recent` prices: `lags[0]` is the latest.
    ///
    /// Short histories are left-padded with their earliest price; an empty
    /// history is all `DEFAULT_PAD_PRICE`.
    pub fn lag_vector(recent: &[f64], n_lags: usize) -> Vec<f64> {
        let pad = recent.first().copied().unwrap_or(DEFAULT_PAD_PRICE);
        let window = &recent[recent.len().saturating_sub(n_lags)..];

        let mut padded = vec![pad; n_lags - window.len()];
        padded.extend_from_slice(window);
        padded.reverse();
        padded
    }

    pub fn predict_price(
        store: &ModelStore,
        commodity: &str,
        recent: &[f64],
        weather: WeatherInput,
    ) -> Result<Prediction> {
        let weather = weather.require()?;
        let artifact = store.load(commodity)?;

        let mut row = Self::lag_vector(recent, artifact.n_lags);
        row.extend_from_slice(&weather.to_array());
        debug!("Predicting {} from {:?}", commodity, row);

        let predicted_price = artifact.forest.predict_one(&row)?;
        Ok(Prediction {
            commodity: commodity.to_string(),
            predicted_price,
        })
    }
}
