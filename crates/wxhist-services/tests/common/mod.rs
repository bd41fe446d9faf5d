//! Shared fakes for pipeline tests.

#![allow(dead_code)]

use std::collections::HashMap;
use parking_lot::Mutex;

use wxhist_core::{Coordinates, NetworkError};
use wxhist_services::{
    BackendResult, DownloadedFile, PlaceCandidate, ReportArtifacts, ReportRequest, WeatherBackend,
    WeatherInfo,
};

/// Backend that answers report calls from a script and records every call.
pub struct ScriptedBackend {
    pub calls: Mutex<Vec<String>>,
    pub requests: Mutex<Vec<ReportRequest>>,
    generate: Result<ReportArtifacts, NetworkError>,
    download_failures: HashMap<String, NetworkError>,
}

impl ScriptedBackend {
    pub fn succeeding(excel: &str, pdf: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            generate: Ok(ReportArtifacts {
                message: Some("Reports generated".to_string()),
                excel_report: excel.to_string(),
                pdf_report: pdf.to_string(),
            }),
            download_failures: HashMap::new(),
        }
    }

    pub fn failing_generate(err: NetworkError) -> Self {
        Self {
            generate: Err(err),
            ..Self::succeeding("unused.xlsx", "unused.pdf")
        }
    }

    pub fn failing_download(mut self, filename: &str, err: NetworkError) -> Self {
        self.download_failures.insert(filename.to_string(), err);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

impl WeatherBackend for ScriptedBackend {
    async fn geocode(&self, query: &str) -> BackendResult<Vec<PlaceCandidate>> {
        self.record(format!("geocode:{}", query));
        Ok(Vec::new())
    }

    async fn reverse_geocode(&self, at: Coordinates) -> BackendResult<String> {
        self.record(format!("reverse:{},{}", at.lat(), at.lon()));
        Ok("Nowhere".to_string())
    }

    async fn current_weather(&self, at: Coordinates) -> BackendResult<WeatherInfo> {
        self.record(format!("weather:{},{}", at.lat(), at.lon()));
        Err(NetworkError::NoResponse("not scripted".to_string()))
    }

    async fn generate_report(&self, request: &ReportRequest) -> BackendResult<ReportArtifacts> {
        self.record("generate".to_string());
        self.requests.lock().push(request.clone());
        self.generate.clone()
    }

    async fn download(&self, filename: &str) -> BackendResult<DownloadedFile> {
        self.record(format!("download:{}", filename));
        // let other tasks observe the in-flight state
        tokio::task::yield_now().await;
        match self.download_failures.get(filename) {
            Some(err) => Err(err.clone()),
            None => Ok(DownloadedFile {
                filename: filename.to_string(),
                bytes: format!("contents of {}", filename).into_bytes(),
            }),
        }
    }
}
