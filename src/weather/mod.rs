//! Remote weather sources
//!
//! The fetcher only sees the `WeatherApi` trait; the Open-Meteo adapter is
//! the production implementation.

pub mod open_meteo;

pub use open_meteo::OpenMeteoApi;

use crate::config::Location;
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

/// Daily block of a time-series response; arrays are index-aligned to `time`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DailySeries {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_sum: Vec<Option<f64>>,
    #[serde(default, alias = "wind_speed_10m_max")]
    pub windspeed_10m_max: Vec<Option<f64>>,
}

/// Top-level response; a missing `daily` block means zero rows
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DailyResponse {
    #[serde(default)]
    pub daily: Option<DailySeries>,
}

/// Result of a request that reached the server
#[derive(Debug, Clone)]
pub enum ApiReply {
    Success(DailyResponse),
    /// Non-2xx status
    Rejected { status: u16, body: String },
}

/// A daily weather time-series provider with archive and forecast endpoints.
///
/// Transport failures (connect, timeout, undecodable body) are returned as
/// `Err`; HTTP-level refusals as `ApiReply::Rejected`.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Observations for the inclusive `[start, end]` window
    async fn archive(&self, location: &Location, start: NaiveDate, end: NaiveDate) -> Result<ApiReply>;

    /// Fixed near-term window of `days` days
    async fn forecast(&self, location: &Location, days: u32) -> Result<ApiReply>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_daily_block() {
        let response: DailyResponse = serde_json::from_str(r#"{"latitude": 19.07}"#).unwrap();
        assert!(response.daily.is_none());
    }

    #[test]
    fn test_missing_arrays_default_empty() {
        let response: DailyResponse = serde_json::from_str(
            r#"{"daily": {"time": ["2024-01-01"], "temperature_2m_max": [30.5], "wind_speed_10m_max": [null]}}"#,
        )
        .unwrap();
        let daily = response.daily.unwrap();
        assert_eq!(daily.temperature_2m_max, vec![Some(30.5)]);
        assert!(daily.precipitation_sum.is_empty());
        assert_eq!(daily.windspeed_10m_max, vec![None]);
    }
}
