//! Services Layer
//!
//! Pipeline stages shared by the CLI and the retraining scheduler.
//!
//! # Architecture
//!
//! ```text
//! CLI commands ───────┐
//!                     ├──> Services --> DatasetStore / ModelStore / WeatherApi
//! RetrainScheduler ───┘
//! ```
//!
//! # Services
//!
//! - `PriceService` - Normalize raw price sheets into the canonical table
//! - `WeatherService` - Fetch trailing weather windows with forecast fallback
//! - `FeatureService` - Merge prices with weather and build lag features
//! - `TrainingService` - Train and persist one model per commodity
//! - `PredictionService` - Load a commodity model and predict a price

pub mod price_service;
pub mod weather_service;
pub mod feature_service;
pub mod training_service;
pub mod prediction_service;

pub use price_service::{IngestResult, PriceService};
pub use weather_service::{RegionRefresh, WeatherOrigin, WeatherService};
pub use feature_service::{FeatureBuild, FeatureService};
pub use training_service::{CommodityMetrics, SkipReason, TrainingReport, TrainingService};
pub use prediction_service::{Prediction, PredictionService, WeatherInput};
