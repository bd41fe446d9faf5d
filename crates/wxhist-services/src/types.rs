//! Wire types exchanged with the weather backend.

use serde::{Deserialize, Serialize};
use wxhist_core::{ArtifactKind, Coordinates};

/// A geocoder match. Coordinates stay as the strings the service returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub display_name: String,
    pub lat: String,
    pub lon: String,
}

impl PlaceCandidate {
    /// Parsed coordinates, if the strings hold a valid pair.
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::parse(&self.lat, &self.lon)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ReverseGeocodeResponse {
    pub location: String,
}

/// Current conditions at a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherInfo {
    pub temp: f64,
    pub humidity: f64,
    pub precipitation: f64,
    pub wind_speed: f64,
    pub time: String,
}

impl WeatherInfo {
    pub fn band(&self) -> TemperatureBand {
        TemperatureBand::from_celsius(self.temp)
    }
}

/// Coarse temperature classification for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureBand {
    Freezing,
    Cold,
    Mild,
    Warm,
    Hot,
}

impl TemperatureBand {
    pub fn from_celsius(temp: f64) -> Self {
        match temp {
            t if t <= 0.0 => Self::Freezing,
            t if t <= 10.0 => Self::Cold,
            t if t <= 20.0 => Self::Mild,
            t if t <= 30.0 => Self::Warm,
            _ => Self::Hot,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Freezing => "Freezing",
            Self::Cold => "Cold",
            Self::Mild => "Mild",
            Self::Warm => "Warm",
            Self::Hot => "Hot",
        }
    }
}

/// Body of the report generation request. Dates use `DD-MM-YYYY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub location: String,
    pub start_date: String,
    pub end_date: String,
}

/// Filenames of the generated report files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportArtifacts {
    #[serde(default)]
    pub message: Option<String>,
    pub excel_report: String,
    pub pdf_report: String,
}

impl ReportArtifacts {
    pub fn filename(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Excel => &self.excel_report,
            ArtifactKind::Pdf => &self.pdf_report,
        }
    }
}

/// A downloaded payload, named by the server's `Content-Disposition` when it sent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}
