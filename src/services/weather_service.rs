//! Weather Service
//!
//! Fetches trailing daily weather windows from a `WeatherApi`, falling back
//! to the provider's forecast endpoint when the archive refuses the request.

use crate::config::Location;
use crate::dates::parse_date;
use crate::error::{AppError, Result};
use crate::state::PipelineState;
use crate::store::models::WeatherRecord;
use crate::weather::{ApiReply, DailySeries, WeatherApi};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Which endpoint produced a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherOrigin {
    Archive,
    Forecast,
}

/// Normalized weather window
#[derive(Debug, Clone)]
pub struct WeatherFetch {
    pub origin: WeatherOrigin,
    pub records: Vec<WeatherRecord>,
}

/// Outcome of refreshing one region file
#[derive(Debug, Clone, Serialize)]
pub struct RegionRefresh {
    pub region: String,
    pub rows: usize,
    pub origin: WeatherOrigin,
    pub path: PathBuf,
}

/// Weather fetch service
pub struct WeatherService;

impl WeatherService {
    /// Archive window for `days` trailing days: `[yesterday - days, yesterday]`
    pub fn archive_window(today: NaiveDate, days: u32) -> Result<(NaiveDate, NaiveDate)> {
        let window = today
            .checked_sub_signed(Duration::days(1))
            .and_then(|end| Some((end.checked_sub_signed(Duration::days(i64::from(days)))?, end)));
        window.ok_or_else(|| {
            AppError::Validation(format!("a {}-day window before {} is out of range", days, today))
        })
    }

    /// Fetch a trailing window ending yesterday.
    ///
    /// A non-success archive reply switches to the forecast endpoint, whose
    /// window is `forecast_days` long regardless of `days`. Transport errors
    /// and a refused forecast are returned as `SourceUnavailable`.
    pub async fn fetch(
        api: &dyn WeatherApi,
        location: &Location,
        days: u32,
        forecast_days: u32,
        today: NaiveDate,
    ) -> Result<WeatherFetch> {
        let (start, end) = Self::archive_window(today, days)?;
        info!(
            "Fetching weather for {} ({}, {}) from {} to {} via {}",
            location.name,
            location.latitude,
            location.longitude,
            start,
            end,
            api.name()
        );

        let (origin, reply) = match api.archive(location, start, end).await? {
            ApiReply::Rejected { status, .. } => {
                warn!("Archive API failed ({}), using forecast fallback", status);
                (WeatherOrigin::Forecast, api.forecast(location, forecast_days).await?)
            }
            success => (WeatherOrigin::Archive, success),
        };

        let daily = match reply {
            ApiReply::Success(response) => response.daily.unwrap_or_default(),
            ApiReply::Rejected { status, body } => {
                return Err(AppError::SourceUnavailable(format!(
                    "forecast fallback for {} returned {}: {}",
                    location.name,
                    status,
                    body.chars().take(200).collect::<String>()
                )));
            }
        };

        let records = Self::normalize(&daily, Some(&location.name));
        info!("Got {} weather records for {}", records.len(), location.name);
        Ok(WeatherFetch { origin, records })
    }

    /// Convert index-aligned daily arrays into records, one per date.
    ///
    /// Short or missing arrays yield `None` fields; unparseable dates are
    /// skipped; a repeated date keeps its last row.
    pub fn normalize(daily: &DailySeries, region: Option<&str>) -> Vec<WeatherRecord> {
        let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

        let mut by_date: BTreeMap<NaiveDate, WeatherRecord> = BTreeMap::new();
        for (i, raw) in daily.time.iter().enumerate() {
            let Some(date) = parse_date(raw) else {
                continue;
            };
            by_date.insert(
                date,
                WeatherRecord {
                    date,
                    region: region.map(str::to_string),
                    temp_max: at(&daily.temperature_2m_max, i),
                    temp_min: at(&daily.temperature_2m_min, i),
                    precip_mm: at(&daily.precipitation_sum, i),
                    wind_speed: at(&daily.windspeed_10m_max, i),
                },
            );
        }
        by_date.into_values().collect()
    }

    /// Fetch the default location into `weather_recent.csv`
    pub async fn refresh_recent(state: &PipelineState, today: NaiveDate) -> Result<RegionRefresh> {
        let weather = &state.config.weather;
        let fetched = Self::fetch(
            state.weather_api.as_ref(),
            &weather.default_location,
            weather.history_days,
            weather.forecast_days,
            today,
        )
        .await?;
        let path = state.datasets.write_weather_recent(&fetched.records)?;

        Ok(RegionRefresh {
            region: weather.default_location.name.clone(),
            rows: fetched.records.len(),
            origin: fetched.origin,
            path,
        })
    }

    /// Fetch every configured region into its own `weather_<region>.csv`.
    ///
    /// Regions are independent: one failing region is logged and reported,
    /// the rest are still written.
    pub async fn fetch_regions(
        state: &PipelineState,
        today: NaiveDate,
    ) -> Vec<(String, Result<RegionRefresh>)> {
        let weather = &state.config.weather;
        let mut outcomes = Vec::with_capacity(weather.regions.len());

        for location in &weather.regions {
            let outcome = async {
                let fetched = Self::fetch(
                    state.weather_api.as_ref(),
                    location,
                    weather.history_days,
                    weather.forecast_days,
                    today,
                )
                .await?;
                let path = state.datasets.write_region_weather(&location.name, &fetched.records)?;
                Ok::<_, AppError>(RegionRefresh {
                    region: location.name.clone(),
                    rows: fetched.records.len(),
                    origin: fetched.origin,
                    path,
                })
            }
            .await;

            if let Err(e) = &outcome {
                warn!("Weather refresh for {} failed: {}", location.name, e);
            }
            outcomes.push((location.name.clone(), outcome));
        }

        outcomes
    }
}
