use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use agrovision_pipeline::error::ErrorResponse;
use agrovision_pipeline::services::{
    FeatureService, PredictionService, PriceService, TrainingService, WeatherInput, WeatherService,
};
use agrovision_pipeline::{init_tracing, PipelineConfig, PipelineState, RetrainScheduler};
use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "agrovision", version, about = "Commodity price retraining pipeline")]
struct Cli {
    /// JSON config file (defaults to $AGROVISION_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs immediately, then on every cadence tick until Ctrl-C.
    Run,
    /// Executes a single retraining run and prints its outcome.
    Once,
    /// Normalizes a raw price sheet into the canonical dataset.
    IngestPrices {
        /// File path or http(s) URL; defaults to the configured source
        #[arg(long)]
        source: Option<String>,
    },
    /// Refreshes the default-location and per-region weather files.
    FetchWeather,
    /// Rebuilds features from the stored datasets and retrains models.
    Train,
    /// Predicts a price with a stored commodity model.
    Predict {
        #[arg(long)]
        commodity: String,
        /// Recent prices, oldest first
        #[arg(long, value_delimiter = ',')]
        recent: Vec<f64>,
        #[arg(long)]
        temp_max: Option<f64>,
        #[arg(long)]
        temp_min: Option<f64>,
        #[arg(long)]
        precip_mm: Option<f64>,
        #[arg(long)]
        wind_speed: Option<f64>,
    },
    /// Shows the last recorded run status.
    Status,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::from_env().context("loading config from environment")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config)?;
    let state = Arc::new(PipelineState::new(config).context("initializing pipeline state")?);
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Run => {
            let scheduler = Arc::new(RetrainScheduler::new(state));
            scheduler.run_forever().await?;
        }
        Commands::Once => {
            let outcome = RetrainScheduler::new(state).run_once().await;
            print_json(&outcome)?;
            if !outcome.status.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::IngestPrices { source } => {
            let source = source
                .or_else(|| state.config.price_source.clone())
                .unwrap_or_else(|| state.config.fallback_price_csv.to_string_lossy().into_owned());
            let result = PriceService::ingest(&state, &source, today)
                .await
                .with_context(|| format!("ingesting prices from {}", source))?;
            print_json(&result)?;
        }
        Commands::FetchWeather => {
            let recent = WeatherService::refresh_recent(&state, today)
                .await
                .context("fetching default-location weather")?;
            print_json(&recent)?;
            let mut failed = false;
            for (_, outcome) in WeatherService::fetch_regions(&state, today).await {
                match outcome {
                    Ok(refresh) => print_json(&refresh)?,
                    Err(e) => {
                        failed = true;
                        print_json(&ErrorResponse::from(e))?;
                    }
                }
            }
            if failed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Train => {
            let (features, build) = FeatureService::build(&state).context("building features")?;
            print_json(&build)?;
            let report = TrainingService::train_all(
                &features,
                &state.config.training,
                state.config.features.n_lags,
                &state.config.commodities,
                &state.models,
            );
            print_json(&report)?;
        }
        Commands::Predict {
            commodity,
            recent,
            temp_max,
            temp_min,
            precip_mm,
            wind_speed,
        } => {
            let weather = WeatherInput {
                temp_max,
                temp_min,
                precip_mm,
                wind_speed,
            };
            match PredictionService::predict_price(&state.models, &commodity, &recent, weather) {
                Ok(prediction) => print_json(&prediction)?,
                Err(e) => {
                    print_json(&ErrorResponse::from(e))?;
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Status => match state.status.read()? {
            Some(record) => print_json(&record)?,
            None => println!("no run recorded at {}", state.status.path().display()),
        },
    }

    Ok(ExitCode::SUCCESS)
}
