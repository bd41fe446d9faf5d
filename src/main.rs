use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use wxhist_core::{AlertChannel, AlertKind, AppError, Config, ConfigError, Coordinates, DateRange};
use wxhist_location::{CurrentWeatherResolver, LocationSession, SystemLocator};
use wxhist_services::{DirectorySink, HttpBackend, ReportPipeline, WeatherBackend};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    wxhist_core::init()?;
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let err = AppError::from(ConfigError::Invalid(format!("{:#}", e)));
            tracing::error!("{}", err);
            eprintln!("error: {}", err.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };
    tracing::info!("Using backend at {}", config.api.base_url);

    let backend = Arc::new(HttpBackend::new(&config.api.base_url, &config.timeouts)?);
    let alerts = AlertChannel::new();

    match cli.command {
        Commands::Report {
            location,
            start,
            end,
            output,
        } => {
            let dir = output.unwrap_or_else(|| config.report.output_dir.clone());
            let sink = Arc::new(DirectorySink::new(dir));
            let pipeline = ReportPipeline::new(backend, sink, alerts.clone())
                .with_download_retry(config.report.download_retry);
            let range = DateRange { start, end };
            let location = location.unwrap_or_default();

            if let Ok(outcome) = pipeline.generate(&location, &range).await {
                for artifact in &outcome.saved {
                    println!("{}: {}", artifact.kind, artifact.path.display());
                }
            }
        }
        Commands::Search { text } => {
            let session = open_session(backend, &alerts, &config);
            let places = session.search().search(&text).await.unwrap_or_default();
            if places.is_empty() {
                println!("{}", session.search().hint(&text));
            }
            for place in places {
                println!("{}  ({}, {})", place.display_name, place.lat, place.lon);
            }
        }
        Commands::Here => {
            let session = open_session(backend, &alerts, &config);
            if let Ok(Some(selection)) = session.use_my_location().await {
                println!("{}", selection.name);
            }
        }
        Commands::Weather { lat, lon } => {
            let at = Coordinates::new(lat, lon).context("Coordinates out of range")?;
            show_weather(backend, at, &config).await;
        }
    }

    Ok(report_alert(&alerts))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load_validated_from(path)?.0),
        None => Ok(Config::load_validated()?.0),
    }
}

fn open_session(
    backend: Arc<HttpBackend>,
    alerts: &AlertChannel,
    config: &Config,
) -> LocationSession<HttpBackend, SystemLocator> {
    LocationSession::new(backend, Arc::new(SystemLocator), alerts.clone(), config)
}

async fn show_weather<B: WeatherBackend>(backend: Arc<B>, at: Coordinates, config: &Config) {
    let weather = CurrentWeatherResolver::new(backend, &config.weather);
    match weather.resolve(at).await {
        Some(info) => {
            println!("{:.1}°C ({})", info.temp, info.band().description());
            println!("Humidity: {}%", info.humidity);
            println!("Precipitation: {} mm", info.precipitation);
            println!("Wind: {} m/s", info.wind_speed);
            println!("Observed: {}", info.time);
        }
        None => println!("Current weather is unavailable"),
    }
}

/// Print the outstanding alert, if any, and map it to the exit status.
fn report_alert(alerts: &AlertChannel) -> ExitCode {
    match alerts.current() {
        Some(alert) if alert.kind == AlertKind::Error => {
            eprintln!("error: {}", alert.message);
            ExitCode::FAILURE
        }
        Some(alert) => {
            println!("{}", alert.message);
            ExitCode::SUCCESS
        }
        None => ExitCode::SUCCESS,
    }
}
