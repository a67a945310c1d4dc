//! Open-Meteo adapter

use super::{ApiReply, DailyResponse, WeatherApi};
use crate::config::{Location, WeatherConfig};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::time::Duration;

const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum,windspeed_10m_max";

/// Open-Meteo archive + forecast client
pub struct OpenMeteoApi {
    client: Client,
    archive_url: String,
    forecast_url: String,
}

impl OpenMeteoApi {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("agrovision-pipeline")
            .build()?;

        Ok(Self {
            client,
            archive_url: config.archive_url.clone(),
            forecast_url: config.forecast_url.clone(),
        })
    }

    async fn get(&self, url: &str, params: &[(&str, String)]) -> Result<ApiReply> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(ApiReply::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DailyResponse = response
            .json()
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("{}: undecodable body: {}", url, e)))?;
        Ok(ApiReply::Success(parsed))
    }
}

#[async_trait]
impl WeatherApi for OpenMeteoApi {
    fn name(&self) -> &'static str {
        "open-meteo"
    }

    async fn archive(&self, location: &Location, start: NaiveDate, end: NaiveDate) -> Result<ApiReply> {
        let params = [
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("start_date", start.to_string()),
            ("end_date", end.to_string()),
            ("timezone", "UTC".to_string()),
        ];
        self.get(&self.archive_url, &params).await
    }

    async fn forecast(&self, location: &Location, days: u32) -> Result<ApiReply> {
        let params = [
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("forecast_days", days.to_string()),
            ("timezone", "auto".to_string()),
        ];
        self.get(&self.forecast_url, &params).await
    }
}
