//! Price Service
//!
//! Normalizes raw market-price sheets of unknown column naming into the
//! canonical (date, commodity, price) table and persists it.

use crate::config::ColumnMap;
use crate::dates::parse_date;
use crate::error::{AppError, Result};
use crate::state::PipelineState;
use crate::store::models::PriceRecord;
use chrono::{Duration, NaiveDate};
use csv::{ReaderBuilder, StringRecord};
use reqwest::Client;
use serde::Serialize;
use std::io::Read;
use tracing::{info, warn};

/// Commodity assigned when the source has no commodity column
pub const UNKNOWN_COMMODITY: &str = "Unknown";

/// Header positions chosen for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    /// `None` means dates are synthesized
    pub date: Option<usize>,
    pub price: usize,
    /// `None` means every row is `Unknown`
    pub commodity: Option<usize>,
}

/// Summary of one ingest
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub source: String,
    pub clean_rows: usize,
    /// After (date, commodity) de-duplication
    pub persisted_rows: usize,
}

/// Price normalization service
pub struct PriceService;

impl PriceService {
    /// Probe the header row against the candidate lists, first match wins
    pub fn resolve_columns(headers: &StringRecord, columns: &ColumnMap) -> Result<ResolvedColumns> {
        let find = |candidates: &[String]| {
            candidates
                .iter()
                .find_map(|name| headers.iter().position(|h| h.trim() == name.as_str()))
        };

        let price = find(&columns.price).ok_or_else(|| {
            AppError::Schema(format!(
                "no price column found (looked for {}; headers were {})",
                columns.price.join(", "),
                headers.iter().collect::<Vec<_>>().join(", ")
            ))
        })?;

        Ok(ResolvedColumns {
            date: find(&columns.date),
            price,
            commodity: find(&columns.commodity),
        })
    }

    /// Normalize a raw CSV stream.
    ///
    /// Rows with an unparseable date, an empty commodity, or a price that is
    /// not a positive number are dropped. Output is stably sorted by date.
    pub fn normalize_reader<R: Read>(
        reader: R,
        columns: &ColumnMap,
        today: NaiveDate,
    ) -> Result<Vec<PriceRecord>> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.clone();
        let resolved = Self::resolve_columns(&headers, columns)?;

        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        let total = rows.len();

        if resolved.date.is_none() {
            warn!("No date column found, generating {} sequential dates ending {}", total, today);
        }
        if resolved.commodity.is_none() {
            warn!("No commodity column found, labelling every row '{}'", UNKNOWN_COMMODITY);
        }

        let mut records: Vec<PriceRecord> = rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let date = match resolved.date {
                    Some(idx) => parse_date(row.get(idx)?)?,
                    None => today - Duration::days((total - 1 - i) as i64),
                };

                let commodity = match resolved.commodity {
                    Some(idx) => {
                        let value = row.get(idx)?.trim();
                        if value.is_empty() {
                            return None;
                        }
                        value.to_string()
                    }
                    None => UNKNOWN_COMMODITY.to_string(),
                };

                let price = row.get(resolved.price)?.trim().parse::<f64>().ok()?;
                if !price.is_finite() || price <= 0.0 {
                    return None;
                }

                Some(PriceRecord {
                    date,
                    commodity,
                    price,
                })
            })
            .collect();

        records.sort_by_key(|r| r.date);

        if records.len() < total {
            info!("Dropped {} of {} price rows during cleaning", total - records.len(), total);
        }
        Ok(records)
    }

    /// Load and normalize a file path or http(s) URL.
    ///
    /// Remote sources are bounded by the client's timeout; a stalled or
    /// refusing server is `SourceUnavailable`.
    pub async fn load_source(
        client: &Client,
        source: &str,
        columns: &ColumnMap,
        today: NaiveDate,
    ) -> Result<Vec<PriceRecord>> {
        info!("Loading price data from: {}", source);

        match url::Url::parse(source) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                let response = client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| AppError::SourceUnavailable(format!("{}: {}", url, e)))?;
                if !response.status().is_success() {
                    return Err(AppError::SourceUnavailable(format!(
                        "{} returned {}",
                        url,
                        response.status()
                    )));
                }
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| AppError::SourceUnavailable(format!("{}: {}", url, e)))?;
                Self::normalize_reader(body.as_ref(), columns, today)
            }
            _ => {
                let file = std::fs::File::open(source).map_err(|e| {
                    AppError::MissingDataset(format!("price source {}: {}", source, e))
                })?;
                Self::normalize_reader(file, columns, today)
            }
        }
    }

    /// Normalize `source` and overwrite the canonical price dataset
    pub async fn ingest(state: &PipelineState, source: &str, today: NaiveDate) -> Result<IngestResult> {
        let records = Self::load_source(&state.http, source, &state.config.columns, today).await?;
        let persisted_rows = state.datasets.write_prices(&records)?;

        Ok(IngestResult {
            source: source.to_string(),
            clean_rows: records.len(),
            persisted_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 10).unwrap()
    }

    fn normalize(csv: &str) -> Result<Vec<PriceRecord>> {
        PriceService::normalize_reader(csv.as_bytes(), &ColumnMap::default(), today())
    }

    #[test]
    fn test_agmarknet_headers() {
        let csv = "\
State,Commodity,Price Date,Min_Price,Max_Price,Modal_Price
UP,Wheat,02/07/2024,2000,2300,2150
UP,Wheat,01/07/2024,1900,2200,2100
UP,Onion,01/07/2024,1000,1400,NR
";
        let records = normalize(csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        // Modal_Price outranks Min/Max
        assert_eq!(records[0].price, 2100.0);
        assert_eq!(records[1].price, 2150.0);
        assert!(records.iter().all(|r| r.commodity == "Wheat"));
    }

    #[test]
    fn test_price_priority_falls_through() {
        let csv = "date,Crop,Min_Price,Max_Price\n2024-07-01,Rice,30,40\n";
        let records = normalize(csv).unwrap();
        assert_eq!(records[0].price, 40.0);
        assert_eq!(records[0].commodity, "Rice");
    }

    #[test]
    fn test_missing_price_column_is_schema_error() {
        let csv = "date,Commodity,Arrivals\n2024-07-01,Wheat,120\n";
        assert!(matches!(normalize(csv), Err(AppError::Schema(_))));
    }

    #[test]
    fn test_header_match_is_case_sensitive() {
        let csv = "date,Commodity,PRICE\n2024-07-01,Wheat,120\n";
        assert!(matches!(normalize(csv), Err(AppError::Schema(_))));
    }

    #[test]
    fn test_synthesized_dates_and_unknown_commodity() {
        let csv = "Price\n10\n11\n12\n";
        let records = normalize(csv).unwrap();
        let dates: Vec<_> = records.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-07-08", "2024-07-09", "2024-07-10"]);
        assert!(records.iter().all(|r| r.commodity == UNKNOWN_COMMODITY));
    }

    #[test]
    fn test_bad_rows_dropped() {
        let csv = "\
Date,Product,Price
2024-07-03,Maize,abc
not a date,Maize,20
2024-07-01,,21
2024-07-02,Maize,-5
2024-07-04,Maize,22.5
";
        let records = normalize(csv).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, 22.5);
    }

    #[test]
    fn test_configurable_candidates() {
        let columns = ColumnMap {
            date: vec!["Arrival_Date".into()],
            price: vec!["Rate".into()],
            commodity: vec!["Item".into()],
        };
        let csv = "Arrival_Date,Item,Rate\n05/07/2024,Tomato,18\n";
        let records = PriceService::normalize_reader(csv.as_bytes(), &columns, today()).unwrap();
        assert_eq!(
            records,
            vec![PriceRecord {
                date: NaiveDate::from_ymd_opt(2024, 7, 5).unwrap(),
                commodity: "Tomato".into(),
                price: 18.0,
            }]
        );
    }

    #[tokio::test]
    async fn test_load_source_missing_file() {
        let result =
            PriceService::load_source(&Client::new(), "/nonexistent/prices.csv", &ColumnMap::default(), today())
                .await;
        assert!(matches!(result, Err(AppError::MissingDataset(_))));
    }

    #[tokio::test]
    async fn test_stalled_server_times_out() {
        // accepts connections but never answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().flatten() {
                held.push(stream);
            }
        });

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(1))
            .build()
            .unwrap();
        let source = format!("http://127.0.0.1:{}/prices.csv", port);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(15),
            PriceService::load_source(&client, &source, &ColumnMap::default(), today()),
        )
        .await
        .expect("load_source should give up on its own");
        assert!(matches!(result, Err(AppError::SourceUnavailable(_))));
    }
}
