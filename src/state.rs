//! Pipeline state management

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::store::{DatasetStore, ModelStore, StatusStore};
use crate::weather::{OpenMeteoApi, WeatherApi};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Long-lived handles shared by every pipeline stage
pub struct PipelineState {
    /// Validated configuration
    pub config: Arc<PipelineConfig>,

    /// Canonical CSV datasets
    pub datasets: Arc<DatasetStore>,

    /// Per-commodity model slots
    pub models: Arc<ModelStore>,

    /// Last-run status record
    pub status: Arc<StatusStore>,

    /// Remote weather provider
    pub weather_api: Arc<dyn WeatherApi>,

    /// Client for live price sources
    pub http: Client,
}

impl PipelineState {
    /// Create state backed by the Open-Meteo provider
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let api = OpenMeteoApi::new(&config.weather)?;
        Self::with_weather_api(config, Arc::new(api))
    }

    /// Create state with an explicit weather provider
    pub fn with_weather_api(config: PipelineConfig, weather_api: Arc<dyn WeatherApi>) -> Result<Self> {
        config.validate()?;

        let datasets = Arc::new(DatasetStore::new(&config.data_dir)?);
        let models = Arc::new(ModelStore::new(&config.models_dir)?);
        let status = Arc::new(StatusStore::new(&config.status_path())?);
        let http = Client::builder()
            .timeout(Duration::from_secs(config.source_timeout_secs))
            .user_agent("agrovision-pipeline")
            .build()?;

        tracing::info!("Data directory: {:?}", config.data_dir);
        tracing::info!("Models directory: {:?}", config.models_dir);

        Ok(Self {
            config: Arc::new(config),
            datasets,
            models,
            status,
            weather_api,
            http,
        })
    }
}
