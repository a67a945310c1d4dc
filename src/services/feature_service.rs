//! Feature Service
//!
//! Joins prices onto weather by calendar date, then turns each commodity's
//! chronological price series into lagged training rows.

use crate::error::Result;
use crate::state::PipelineState;
use crate::store::models::{FeatureRow, MergedRow, PriceRecord, WeatherRecord};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Row counts of one feature build
#[derive(Debug, Clone, Serialize)]
pub struct FeatureBuild {
    pub price_rows: usize,
    pub merged_rows: usize,
    pub feature_rows: usize,
    pub commodities: usize,
}

/// Feature construction service
pub struct FeatureService;

impl FeatureService {
    /// Left join of prices onto weather by date.
    ///
    /// A commodity present in `commodity_regions` only sees weather rows of
    /// its region; every other commodity takes the first row for the date in
    /// load order. Unmatched prices keep empty weather fields.
    pub fn merge(
        prices: &[PriceRecord],
        weather: &[WeatherRecord],
        commodity_regions: &BTreeMap<String, String>,
    ) -> Vec<MergedRow> {
        let mut by_date: HashMap<NaiveDate, &WeatherRecord> = HashMap::new();
        let mut by_region: HashMap<(&str, NaiveDate), &WeatherRecord> = HashMap::new();
        for record in weather {
            by_date.entry(record.date).or_insert(record);
            if let Some(region) = record.region.as_deref() {
                by_region.entry((region, record.date)).or_insert(record);
            }
        }

        prices
            .iter()
            .map(|price| {
                let matched = match commodity_regions.get(&price.commodity) {
                    Some(region) => by_region.get(&(region.as_str(), price.date)).copied(),
                    None => by_date.get(&price.date).copied(),
                };
                MergedRow {
                    date: price.date,
                    commodity: price.commodity.clone(),
                    price: price.price,
                    region: matched.and_then(|w| w.region.clone()),
                    temp_max: matched.and_then(|w| w.temp_max),
                    temp_min: matched.and_then(|w| w.temp_min),
                    precip_mm: matched.and_then(|w| w.precip_mm),
                    wind_speed: matched.and_then(|w| w.wind_speed),
                }
            })
            .collect()
    }

    /// Lagged rows for every commodity, ordered by (date, commodity).
    ///
    /// `lag_k` is the price `k` observations earlier in the commodity's own
    /// series. Rows without a full lag window or full weather are dropped.
    pub fn build_lags(merged: &[MergedRow], n_lags: usize) -> Vec<FeatureRow> {
        let mut series: BTreeMap<&str, Vec<&MergedRow>> = BTreeMap::new();
        for row in merged {
            series.entry(row.commodity.as_str()).or_default().push(row);
        }

        let mut rows = Vec::new();
        let mut dropped = 0usize;
        for (commodity, mut observations) in series {
            observations.sort_by_key(|r| r.date);

            for (i, row) in observations.iter().enumerate() {
                let weather = match row.weather_features() {
                    Some(w) if i >= n_lags => w,
                    _ => {
                        dropped += 1;
                        continue;
                    }
                };
                let lags = (1..=n_lags).map(|k| observations[i - k].price).collect();
                rows.push(FeatureRow {
                    commodity: commodity.to_string(),
                    date: row.date,
                    lags,
                    weather,
                    price: row.price,
                });
            }
        }

        if dropped > 0 {
            debug!("{} merged rows lacked lags or weather", dropped);
        }
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.commodity.cmp(&b.commodity)));
        rows
    }

    /// Read canonical datasets, persist the merged table and the feature table
    pub fn build(state: &PipelineState) -> Result<(Vec<FeatureRow>, FeatureBuild)> {
        let prices = state.datasets.read_prices()?;
        let weather = state.datasets.read_weather()?;
        let n_lags = state.config.features.n_lags;

        let merged = Self::merge(&prices, &weather, &state.config.commodity_regions);
        state.datasets.write_merged(&merged)?;

        let features = Self::build_lags(&merged, n_lags);
        state.datasets.write_features(&features, n_lags)?;

        let mut commodities: Vec<&str> = features.iter().map(|f| f.commodity.as_str()).collect();
        commodities.sort_unstable();
        commodities.dedup();

        let summary = FeatureBuild {
            price_rows: prices.len(),
            merged_rows: merged.len(),
            feature_rows: features.len(),
            commodities: commodities.len(),
        };
        info!(
            "Built {} feature rows for {} commodities from {} prices",
            summary.feature_rows, summary.commodities, summary.price_rows
        );
        Ok((features, summary))
    }
}
