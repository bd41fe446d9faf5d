//! Centralized error types for wxhist.
//!
//! This module provides a typed error hierarchy that:
//! - Normalizes every collaborator failure into one `NetworkError`
//! - Provides user-friendly messages suitable for the alert channel
//! - Preserves full error context for debugging/logging

use serde::Deserialize;
use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get an alert-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Validation(e) => e.user_message().to_string(),
            AppError::Permission(e) => e.code().message().to_string(),
            AppError::Config(e) => e.user_message().to_string(),
            AppError::Io(_) => "A file operation failed. Please try again.".to_string(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.".to_string(),
        }
    }
}

/// Domain error codes surfaced through the alert channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SearchTimeout,
    SearchFailed,
    ReverseTimeout,
    ReverseFailed,
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    NotSupported,
    MissingLocation,
    DownloadFailed,
    GenerationFailed,
}

impl ErrorCode {
    /// Stable identifier, e.g. `SEARCH_TIMEOUT`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::SearchTimeout => "SEARCH_TIMEOUT",
            ErrorCode::SearchFailed => "SEARCH_FAILED",
            ErrorCode::ReverseTimeout => "REVERSE_TIMEOUT",
            ErrorCode::ReverseFailed => "REVERSE_FAILED",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::PositionUnavailable => "POSITION_UNAVAILABLE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::NotSupported => "NOT_SUPPORTED",
            ErrorCode::MissingLocation => "MISSING_LOCATION",
            ErrorCode::DownloadFailed => "DOWNLOAD_FAILED",
            ErrorCode::GenerationFailed => "GENERATION_FAILED",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::SearchTimeout => {
                "Location search timed out. Please try again or use a simpler search term."
            }
            ErrorCode::SearchFailed => {
                "Location service is temporarily unavailable. Please try again later."
            }
            ErrorCode::ReverseTimeout => "Location lookup timed out. Please try again.",
            ErrorCode::ReverseFailed => "Failed to get location. Please try again.",
            ErrorCode::PermissionDenied => {
                "Location access denied. Please enable location services."
            }
            ErrorCode::PositionUnavailable => "Location information is unavailable.",
            ErrorCode::Timeout => "Location request timed out.",
            ErrorCode::NotSupported => "Geolocation is not supported on this device.",
            ErrorCode::MissingLocation => "Please select a location and date range",
            ErrorCode::DownloadFailed => "Failed to download file. Please try again.",
            ErrorCode::GenerationFailed => "Error generating report. Please try again.",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const REPORT_GENERATED: &str = "Reports generated and downloaded successfully!";

/// Network-related errors. Every collaborator failure is normalized into one of these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Request timed out")]
    Timeout,

    #[error("No response from server: {0}")]
    NoResponse(String),

    #[error("Server error: {status} - {message:?}")]
    Server {
        status: u16,
        message: Option<String>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    /// Human-readable message. Server-supplied text wins over the canned messages.
    pub fn user_message(&self) -> String {
        match self {
            NetworkError::Timeout => "Request timed out. Please try again.".to_string(),
            NetworkError::NoResponse(_) => {
                "No response from server. Please try again.".to_string()
            }
            NetworkError::Server {
                message: Some(m), ..
            } if !m.is_empty() => m.clone(),
            NetworkError::Server { status, .. } => format!("Server error: {}", status),
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again.".to_string()
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, NetworkError::Timeout)
    }

    /// Builds a server error from a status code and the raw response body,
    /// picking `message` then `error` out of a JSON body when present.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: Option<String>,
            error: Option<String>,
        }

        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .filter(|m| !m.is_empty());

        NetworkError::Server { status, message }
    }
}

/// Input validation failures; these block before any network call.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Location is missing")]
    MissingLocation,

    #[error("Date range is incomplete")]
    MissingDateRange,
}

impl ValidationError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::MissingLocation
    }

    pub fn user_message(&self) -> &'static str {
        self.code().message()
    }
}

/// Device geolocation failures. Never retried automatically.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Location permission denied")]
    Denied,

    #[error("Position unavailable")]
    Unavailable,

    #[error("Position request timed out")]
    Timeout,

    #[error("Geolocation not supported")]
    NotSupported,
}

impl PermissionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PermissionError::Denied => ErrorCode::PermissionDenied,
            PermissionError::Unavailable => ErrorCode::PositionUnavailable,
            PermissionError::Timeout => ErrorCode::Timeout,
            PermissionError::NotSupported => ErrorCode::NotSupported,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::Server {
                status: status.as_u16(),
                message: None,
            }
        } else {
            NetworkError::NoResponse(self.to_string())
        }
    }
}
