//! Retraining scheduler
//!
//! One long-lived loop: an immediate run at start, then one run per cadence
//! tick. A run walks Idle -> EnsuringPrerequisites -> Merging -> Training ->
//! RecordingStatus -> Idle. Any error that escapes a stage fails the run,
//! never the loop.

use super::cadence::duration_until_next_run;
use crate::error::{AppError, Result};
use crate::services::{FeatureService, PriceService, TrainingReport, TrainingService, WeatherService};
use crate::state::PipelineState;
use crate::store::{RunStatus, StatusRecord};
use chrono::{Local, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Current stage of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerPhase {
    Idle,
    EnsuringPrerequisites,
    Merging,
    Training,
    RecordingStatus,
}

/// Result of one scheduled run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    /// Present when the run reached the end of training
    pub report: Option<TrainingReport>,
    /// `None` if the status file itself could not be written
    pub record: Option<StatusRecord>,
}

/// Periodic retraining job
pub struct RetrainScheduler {
    state: Arc<PipelineState>,
    phase: RwLock<SchedulerPhase>,
}

impl RetrainScheduler {
    pub fn new(state: Arc<PipelineState>) -> Self {
        Self {
            state,
            phase: RwLock::new(SchedulerPhase::Idle),
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.read()
    }

    fn enter(&self, phase: SchedulerPhase) {
        let previous = std::mem::replace(&mut *self.phase.write(), phase);
        info!("Scheduler {:?} -> {:?}", previous, phase);
    }

    /// Make sure the canonical price and weather datasets exist
    pub async fn ensure_prerequisites(&self, today: NaiveDate) -> Result<()> {
        let state = self.state.as_ref();
        let config = &state.config;

        if state.datasets.has_prices() {
            info!("Using existing price dataset {:?}", state.datasets.prices_path());
        } else {
            let source = match &config.price_source {
                Some(source) => source.clone(),
                None if config.fallback_price_csv.exists() => {
                    config.fallback_price_csv.to_string_lossy().into_owned()
                }
                None => {
                    return Err(AppError::MissingDataset(format!(
                        "no price dataset, no live source and no fallback at {}",
                        config.fallback_price_csv.display()
                    )));
                }
            };
            let ingest = PriceService::ingest(state, &source, today).await?;
            info!("Ingested {} price rows from {}", ingest.persisted_rows, ingest.source);
        }

        if state.datasets.has_weather() {
            info!("Using existing weather dataset {:?}", state.datasets.weather_recent_path());
        } else {
            let refresh = WeatherService::refresh_recent(state, today).await?;
            info!("Fetched {} weather rows ({:?})", refresh.rows, refresh.origin);
            for (region, outcome) in WeatherService::fetch_regions(state, today).await {
                if let Ok(refresh) = outcome {
                    info!("Fetched {} weather rows for {}", refresh.rows, region);
                }
            }
        }

        Ok(())
    }

    async fn execute(&self, today: NaiveDate) -> Result<TrainingReport> {
        let state = self.state.as_ref();

        self.enter(SchedulerPhase::EnsuringPrerequisites);
        self.ensure_prerequisites(today).await?;

        self.enter(SchedulerPhase::Merging);
        let (features, _) = FeatureService::build(state)?;

        self.enter(SchedulerPhase::Training);
        let report = TrainingService::train_all(
            &features,
            &state.config.training,
            state.config.features.n_lags,
            &state.config.commodities,
            &state.models,
        );
        Ok(report)
    }

    /// Execute one full run and overwrite the status record
    pub async fn run_once(&self) -> RunOutcome {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("retrain_run", run_id = %run_id);

        async {
            info!("Retraining started");
            let today = Local::now().date_naive();

            let (status, report) = match self.execute(today).await {
                Ok(report) => {
                    info!("Retraining completed: {}", report.summary());
                    (RunStatus::Success, Some(report))
                }
                Err(e) => {
                    error!("Retraining failed: {} (retryable: {})", e, e.is_retryable());
                    (RunStatus::Failed(e.to_string()), None)
                }
            };

            self.enter(SchedulerPhase::RecordingStatus);
            let record = match self.state.status.write(&status, Local::now().naive_local()) {
                Ok(record) => Some(record),
                Err(e) => {
                    error!("Failed to record run status: {}", e);
                    None
                }
            };
            self.enter(SchedulerPhase::Idle);

            RunOutcome {
                run_id: run_id.clone(),
                status,
                report,
                record,
            }
        }
        .instrument(span)
        .await
    }

    /// Run now, then on every cadence tick until Ctrl-C
    pub async fn run_forever(self: Arc<Self>) -> Result<()> {
        info!("Retrain scheduler started with cadence {:?}", self.state.config.cadence);
        self.run_once().await;

        loop {
            let wait = duration_until_next_run(&self.state.config.cadence, Utc::now())?;
            info!(
                "Next retraining in {} hours {} minutes",
                wait.as_secs() / 3600,
                (wait.as_secs() % 3600) / 60
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.run_once().await;
                }
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        warn!("Failed to listen for shutdown signal: {}", e);
                    }
                    info!("Retrain scheduler stopping");
                    return Ok(());
                }
            }
        }
    }
}
