//! Shared foundations for wxhist: configuration, errors, the alert slot and the
//! timing/supersede primitives the location and report flows are built on.

pub mod alert;
pub mod config;
pub mod debounce;
pub mod error;
pub mod geo;
pub mod report_state;
pub mod supersede;

pub use alert::{Alert, AlertChannel, AlertKind, AutoDismiss};
pub use config::{
    ApiConfig, Config, DownloadRetryPolicy, GeolocationConfig, ReportConfig, ReverseConfig,
    SearchConfig, TimeoutConfig, UiConfig, WeatherConfig,
};
pub use debounce::Debouncer;
pub use error::{
    AppError, ConfigError, ErrorCode, NetworkError, PermissionError, ReqwestErrorExt,
    ValidationError, REPORT_GENERATED,
};
pub use geo::{CoordinateKey, Coordinates, DateRange};
pub use report_state::{ArtifactKind, ReportOpState};
pub use supersede::{RequestSlot, Ticket};

use anyhow::Result;

/// Initialize logging. Safe to call more than once.
pub fn init() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    tracing::info!("wxhist core initialized");
    Ok(())
}
