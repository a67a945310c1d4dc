//! AgroVision Pipeline - Commodity Price Retraining
//!
//! Scheduled ETL-to-model pipeline: normalizes market price sheets, fetches
//! daily weather, builds lagged features and retrains one price model per
//! commodity.

pub mod config;
pub mod dates;
pub mod error;
pub mod ml;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod store;
pub mod weather;

pub use config::PipelineConfig;
pub use error::{AppError, Result};
pub use scheduler::RetrainScheduler;
pub use state::PipelineState;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agrovision_pipeline=info,agrovision=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
