//! Weather backend trait.
//!
//! This module defines the `WeatherBackend` trait that abstracts over the remote
//! services the core talks to (geocoding, reverse geocoding, current weather,
//! report generation and file download). The HTTP implementation lives in
//! [`crate::client`]; tests supply scripted fakes.

use std::future::Future;

use wxhist_core::{Coordinates, NetworkError};

use crate::types::{DownloadedFile, PlaceCandidate, ReportArtifacts, ReportRequest, WeatherInfo};

/// Result type for backend operations. Every failure is already normalized.
pub type BackendResult<T> = Result<T, NetworkError>;

/// Trait for weather backends.
///
/// Implementations must be shareable across tasks; callers hold them in an `Arc`.
pub trait WeatherBackend: Send + Sync + 'static {
    /// Search places matching free text, best match first.
    fn geocode(&self, query: &str) -> impl Future<Output = BackendResult<Vec<PlaceCandidate>>> + Send;

    /// Resolve coordinates to a place name.
    fn reverse_geocode(&self, at: Coordinates) -> impl Future<Output = BackendResult<String>> + Send;

    /// Current conditions at the given coordinates.
    fn current_weather(&self, at: Coordinates) -> impl Future<Output = BackendResult<WeatherInfo>> + Send;

    /// Ask the service to build the Excel and PDF reports.
    fn generate_report(
        &self,
        request: &ReportRequest,
    ) -> impl Future<Output = BackendResult<ReportArtifacts>> + Send;

    /// Fetch a generated file by name.
    fn download(&self, filename: &str) -> impl Future<Output = BackendResult<DownloadedFile>> + Send;
}
