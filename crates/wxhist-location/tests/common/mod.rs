//! Scripted collaborators for location tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use wxhist_core::{Coordinates, NetworkError, PermissionError};
use wxhist_location::{DeviceLocator, PermissionState, Position, PositionOptions};
use wxhist_services::{
    BackendResult, DownloadedFile, PlaceCandidate, ReportArtifacts, ReportRequest, WeatherBackend,
    WeatherInfo,
};

/// Backend answering location lookups from a script. Every call is recorded.
#[derive(Default)]
pub struct ScriptedBackend {
    calls: Mutex<Vec<String>>,
    geocode_delays: HashMap<String, Duration>,
    reverse_name: Option<String>,
    reverse_failure: Option<NetworkError>,
    reverse_delay: Duration,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            reverse_name: Some("London, England".to_string()),
            ..Self::default()
        }
    }

    pub fn slow_geocode(mut self, query: &str, delay: Duration) -> Self {
        self.geocode_delays.insert(query.to_string(), delay);
        self
    }

    pub fn failing_reverse(mut self, err: NetworkError) -> Self {
        self.reverse_failure = Some(err);
        self
    }

    pub fn slow_reverse(mut self, delay: Duration) -> Self {
        self.reverse_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }
}

pub fn place(name: &str, lat: &str, lon: &str) -> PlaceCandidate {
    PlaceCandidate {
        display_name: name.to_string(),
        lat: lat.to_string(),
        lon: lon.to_string(),
    }
}

impl WeatherBackend for ScriptedBackend {
    async fn geocode(&self, query: &str) -> BackendResult<Vec<PlaceCandidate>> {
        self.calls.lock().push(format!("geocode:{}", query));
        if let Some(delay) = self.geocode_delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        Ok(vec![place(query, "51.5073", "-0.1276")])
    }

    async fn reverse_geocode(&self, at: Coordinates) -> BackendResult<String> {
        self.calls
            .lock()
            .push(format!("reverse:{},{}", at.lat(), at.lon()));
        tokio::time::sleep(self.reverse_delay).await;
        if let Some(err) = &self.reverse_failure {
            return Err(err.clone());
        }
        Ok(self.reverse_name.clone().unwrap_or_default())
    }

    async fn current_weather(&self, at: Coordinates) -> BackendResult<WeatherInfo> {
        self.calls
            .lock()
            .push(format!("weather:{},{}", at.lat(), at.lon()));
        Ok(WeatherInfo {
            temp: 12.0,
            humidity: 80.0,
            precipitation: 0.2,
            wind_speed: 4.0,
            time: "2024-05-01T12:00".to_string(),
        })
    }

    async fn generate_report(&self, _request: &ReportRequest) -> BackendResult<ReportArtifacts> {
        Err(NetworkError::NoResponse("not scripted".into()))
    }

    async fn download(&self, _filename: &str) -> BackendResult<DownloadedFile> {
        Err(NetworkError::NoResponse("not scripted".into()))
    }
}

/// Device that always reports the same position.
pub struct FixedLocator {
    pub permission: PermissionState,
    pub position: Result<Position, PermissionError>,
    pub requests: Mutex<usize>,
}

impl FixedLocator {
    pub fn at(lat: f64, lon: f64, permission: PermissionState) -> Self {
        Self {
            permission,
            position: Ok(Position { lat, lon }),
            requests: Mutex::new(0),
        }
    }

    pub fn request_count(&self) -> usize {
        *self.requests.lock()
    }
}

impl DeviceLocator for FixedLocator {
    fn is_supported(&self) -> bool {
        true
    }

    async fn permission(&self) -> PermissionState {
        self.permission
    }

    async fn current_position(&self, _options: PositionOptions) -> Result<Position, PermissionError> {
        *self.requests.lock() += 1;
        self.position
    }
}
