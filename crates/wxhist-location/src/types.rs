use serde::{Deserialize, Serialize};
use wxhist_core::{Coordinates, PermissionError};
use wxhist_services::PlaceCandidate;

/// Where the active selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// Text the user typed without picking a candidate
    FreeText,
    /// A geocoder candidate the user picked
    Candidate,
    /// Device position resolved through reverse geocoding
    Device,
}

/// The location a report will be generated for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSelection {
    pub name: String,
    pub coordinates: Option<Coordinates>,
    pub source: SelectionSource,
}

impl LocationSelection {
    pub fn free_text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            coordinates: None,
            source: SelectionSource::FreeText,
        }
    }

    /// Coordinates are attached only when the candidate's strings parse into a valid pair.
    pub fn from_candidate(candidate: &PlaceCandidate) -> Self {
        Self {
            name: candidate.display_name.clone(),
            coordinates: candidate.coordinates(),
            source: SelectionSource::Candidate,
        }
    }

    pub fn from_device(name: impl Into<String>, at: Coordinates) -> Self {
        Self {
            name: name.into(),
            coordinates: Some(at),
            source: SelectionSource::Device,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.trim().is_empty()
    }
}

/// Device location permission as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    #[default]
    Unknown,
    Prompt,
    Granted,
    Denied,
}

/// Progress of the current geolocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GeolocationPhase {
    #[default]
    Idle,
    CheckingPermission,
    AwaitingPosition,
    /// Silent attempt skipped: permission not granted or no device support
    Blocked,
    Resolved(Coordinates),
    Failed(PermissionError),
}

impl GeolocationPhase {
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            GeolocationPhase::CheckingPermission | GeolocationPhase::AwaitingPosition
        )
    }
}
