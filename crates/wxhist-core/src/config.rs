use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "WXHIST_API_URL";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Report service endpoint
    #[serde(default)]
    pub api: ApiConfig,

    /// Per-request-class timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Place search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Reverse geocoding settings
    #[serde(default)]
    pub reverse: ReverseConfig,

    /// Device position settings
    #[serde(default)]
    pub geolocation: GeolocationConfig,

    /// Current weather settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Report generation and download settings
    #[serde(default)]
    pub report: ReportConfig,

    /// Presentation timings the core exposes
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the weather backend (endpoints live under `/api`)
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_request_secs")]
    pub default_secs: u64,
    #[serde(default = "default_download_secs")]
    pub download_secs: u64,
    #[serde(default = "default_geocoding_secs")]
    pub geocoding_secs: u64,
    #[serde(default = "default_position_secs")]
    pub position_secs: u64,
}

fn default_request_secs() -> u64 {
    30
}

fn default_download_secs() -> u64 {
    60
}

fn default_geocoding_secs() -> u64 {
    60
}

fn default_position_secs() -> u64 {
    10
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_secs: default_request_secs(),
            download_secs: default_download_secs(),
            geocoding_secs: default_geocoding_secs(),
            position_secs: default_position_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.default_secs)
    }

    pub fn download(&self) -> Duration {
        Duration::from_secs(self.download_secs)
    }

    pub fn geocoding(&self) -> Duration {
        Duration::from_secs(self.geocoding_secs)
    }

    pub fn position(&self) -> Duration {
        Duration::from_secs(self.position_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Quiet period before typed text is searched
    pub debounce_ms: u64,
    /// Shorter input never reaches the network
    pub min_length: usize,
    /// How long a result set is reused for an identical query
    pub stale_secs: u64,
    /// Extra attempts after the first failure
    pub retries: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            min_length: 3,
            stale_secs: 60,
            retries: 2,
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseConfig {
    pub retries: u32,
}

impl Default for ReverseConfig {
    fn default() -> Self {
        Self { retries: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationConfig {
    /// Oldest cached device fix the silent path accepts
    pub max_cached_age_secs: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            max_cached_age_secs: 300,
        }
    }
}

impl GeolocationConfig {
    pub fn max_cached_age(&self) -> Duration {
        Duration::from_secs(self.max_cached_age_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// How long current conditions are reused for the same coordinates
    pub stale_secs: u64,
    pub retries: u32,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            stale_secs: 300,
            retries: 1,
        }
    }
}

impl WeatherConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_secs)
    }
}

/// What to do when an artifact download fails after the report was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadRetryPolicy {
    /// Surface the failure; the user regenerates.
    #[default]
    None,
    /// Retry the failed download this many extra times.
    Retry(u32),
}

impl DownloadRetryPolicy {
    pub fn extra_attempts(self) -> u32 {
        match self {
            DownloadRetryPolicy::None => 0,
            DownloadRetryPolicy::Retry(n) => n,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Where downloaded reports are saved
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub download_retry: DownloadRetryPolicy,
}

fn default_output_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            download_retry: DownloadRetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Alerts are cleared after this long
    pub alert_auto_hide_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            alert_auto_hide_ms: 6000,
        }
    }
}

impl UiConfig {
    pub fn alert_auto_hide(&self) -> Duration {
        Duration::from_millis(self.alert_auto_hide_ms)
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            config
        };

        config.apply_env();
        Ok(config)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::load()?.checked()
    }

    /// Load configuration from an explicit path, apply environment overrides and
    /// validate it the same way as [`Config::load_validated`].
    pub fn load_validated_from(path: &Path) -> Result<(Self, ValidationResult)> {
        let mut config = Self::load_from(path)?;
        config.apply_env();
        config.checked()
    }

    fn checked(self) -> Result<(Self, ValidationResult)> {
        let validation = self.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((self, validation))
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.is_empty() {
                tracing::debug!("Using {} from environment", API_URL_ENV);
                self.api.base_url = url;
            }
        }
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.api.base_url, "api.base_url", &mut result);

        for (field, secs) in [
            ("timeouts.default_secs", self.timeouts.default_secs),
            ("timeouts.download_secs", self.timeouts.download_secs),
            ("timeouts.geocoding_secs", self.timeouts.geocoding_secs),
            ("timeouts.position_secs", self.timeouts.position_secs),
        ] {
            if secs == 0 {
                result.add_error(field, "Timeout must be greater than 0");
            }
        }

        if self.search.min_length == 0 {
            result.add_warning(
                "search.min_length",
                "Every keystroke will be searched (min_length is 0)",
            );
        }

        if self.search.debounce_ms > 5000 {
            result.add_warning(
                "search.debounce_ms",
                "Search debounce is unusually long (>5s)",
            );
        }

        if self.search.retries > 5 {
            result.add_warning("search.retries", "More than 5 search retries");
        }

        if self.report.output_dir.exists() && !self.report.output_dir.is_dir() {
            result.add_error(
                "report.output_dir",
                format!(
                    "Path is not a directory: {}",
                    self.report.output_dir.display()
                ),
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("wxhist");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_defaults_match_service_contract() {
        let config = Config::default();
        assert_eq!(config.timeouts.request(), Duration::from_secs(30));
        assert_eq!(config.timeouts.download(), Duration::from_secs(60));
        assert_eq!(config.timeouts.geocoding(), Duration::from_secs(60));
        assert_eq!(config.timeouts.position(), Duration::from_secs(10));
        assert_eq!(config.search.debounce(), Duration::from_millis(300));
        assert_eq!(config.search.min_length, 3);
        assert_eq!(config.search.retries, 2);
        assert_eq!(config.report.download_retry, DownloadRetryPolicy::None);
        assert_eq!(config.ui.alert_auto_hide(), Duration::from_secs(6));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.api.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "api.base_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.api.base_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = Config::default();
        config.timeouts.position_secs = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "timeouts.position_secs"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [api]
            base_url = "https://weather.example.com"

            [report]
            download_retry = { retry = 2 }
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://weather.example.com");
        assert_eq!(config.search.min_length, 3);
        assert_eq!(config.report.download_retry, DownloadRetryPolicy::Retry(2));
        assert_eq!(config.report.download_retry.extra_attempts(), 2);
    }

    #[test]
    fn test_explicit_file_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [timeouts]
            default_secs = 0
            "#,
        )
        .unwrap();

        let err = Config::load_validated_from(&path).unwrap_err();
        assert!(err.to_string().contains("timeouts.default_secs"));
    }

    #[test]
    fn test_explicit_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.search.min_length = 4;
        config.save_to(&path).unwrap();

        let (loaded, validation) = Config::load_validated_from(&path).unwrap();
        assert_eq!(loaded.search.min_length, 4);
        assert!(validation.errors.is_empty());
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
