//! HTTP implementation of [`WeatherBackend`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use tracing::instrument;
use wxhist_core::{Coordinates, NetworkError, ReqwestErrorExt, TimeoutConfig};

use crate::backend::{BackendResult, WeatherBackend};
use crate::types::{
    DownloadedFile, PlaceCandidate, ReportArtifacts, ReportRequest, ReverseGeocodeResponse,
    WeatherInfo,
};

const USER_AGENT: &str = "wxhist/0.1.0";

/// Talks to the weather backend over HTTP.
///
/// Each request class gets its own client so the timeouts stay independent:
/// regular API calls, geocoding lookups and file downloads.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    api: Arc<Client>,
    geocoding: Arc<Client>,
    files: Arc<Client>,
}

impl HttpBackend {
    /// Create a backend rooted at `base_url` (endpoints live under `/api`).
    pub fn new(base_url: &str, timeouts: &TimeoutConfig) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api: Arc::new(build_client(timeouts.request())?),
            geocoding: Arc::new(build_client(timeouts.geocoding())?),
            files: Arc::new(build_client(timeouts.download())?),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Turn a non-success response into a normalized error.
    async fn check_response(response: Response) -> BackendResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = NetworkError::from_response_body(status.as_u16(), &body);
        tracing::debug!("Backend returned {}: {}", status, err);
        Err(err)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
        let response = Self::check_response(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to create HTTP client")
}

impl WeatherBackend for HttpBackend {
    #[instrument(skip(self), level = "debug")]
    async fn geocode(&self, query: &str) -> BackendResult<Vec<PlaceCandidate>> {
        let response = self
            .geocoding
            .get(self.endpoint("geocode"))
            .query(&[("q", query)])
            .send()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        Self::read_json(response).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn reverse_geocode(&self, at: Coordinates) -> BackendResult<String> {
        let response = self
            .geocoding
            .get(self.endpoint("reverse-geocode"))
            .query(&[("lat", at.lat()), ("lon", at.lon())])
            .send()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        let body: ReverseGeocodeResponse = Self::read_json(response).await?;
        Ok(body.location)
    }

    #[instrument(skip(self), level = "debug")]
    async fn current_weather(&self, at: Coordinates) -> BackendResult<WeatherInfo> {
        let response = self
            .api
            .get(self.endpoint("current-weather"))
            .query(&[("lat", at.lat()), ("lon", at.lon())])
            .send()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        Self::read_json(response).await
    }

    #[instrument(skip(self), level = "info")]
    async fn generate_report(&self, request: &ReportRequest) -> BackendResult<ReportArtifacts> {
        let response = self
            .api
            .post(self.endpoint("weather-data"))
            .json(request)
            .send()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        Self::read_json(response).await
    }

    #[instrument(skip(self), level = "info")]
    async fn download(&self, filename: &str) -> BackendResult<DownloadedFile> {
        let url = self.endpoint(&format!("download/{}", urlencoding::encode(filename)));
        let response = self
            .files
            .get(url)
            .send()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;
        let response = Self::check_response(response).await?;

        let saved_name = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(content_disposition_filename)
            .unwrap_or_else(|| filename.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        tracing::info!("Downloaded {} ({} bytes)", saved_name, bytes.len());
        Ok(DownloadedFile {
            filename: saved_name,
            bytes: bytes.to_vec(),
        })
    }
}

/// Extract a safe file name from a `Content-Disposition` header value.
///
/// Only the final path component survives, so a hostile header cannot escape the
/// download directory.
pub fn content_disposition_filename(value: &str) -> Option<String> {
    let raw = value.split(';').map(str::trim).find_map(|part| {
        let (key, val) = part.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("filename") {
            Some(val.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })?;

    let normalized = raw.replace('\\', "/");
    let name = Path::new(&normalized).file_name()?.to_str()?.to_string();
    if name.is_empty() || name == ".." {
        None
    } else {
        Some(name)
    }
}
