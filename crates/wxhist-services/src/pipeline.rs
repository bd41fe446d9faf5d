//! Report pipeline: submit a generation request, then fetch and save each
//! artifact strictly in order.
//!
//! Every outcome ends in exactly one alert. A failed download leaves any file
//! already saved on disk; nothing is rolled back.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use wxhist_core::{
    AlertChannel, ArtifactKind, DateRange, DownloadRetryPolicy, ErrorCode, NetworkError,
    ReportOpState, ValidationError, REPORT_GENERATED,
};

use crate::backend::WeatherBackend;
use crate::retry::{with_retry, RetryConfig};
use crate::sink::FileSink;
use crate::types::{DownloadedFile, ReportArtifacts, ReportRequest};

/// Which step of the pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStage {
    Validate,
    Generate,
    Download(ArtifactKind),
    Save(ArtifactKind),
}

/// A file written to the user's device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    pub message: Option<String>,
    pub saved: Vec<SavedArtifact>,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("a report is already being generated")]
    Busy,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("report generation failed: {0}")]
    Generate(NetworkError),

    #[error("{kind} download failed: {source}")]
    Download {
        kind: ArtifactKind,
        source: NetworkError,
        saved: Vec<SavedArtifact>,
    },

    #[error("{kind} could not be saved: {source}")]
    Save {
        kind: ArtifactKind,
        source: std::io::Error,
        saved: Vec<SavedArtifact>,
    },
}

impl ReportError {
    pub fn stage(&self) -> Option<ReportStage> {
        match self {
            ReportError::Busy => None,
            ReportError::Validation(_) => Some(ReportStage::Validate),
            ReportError::Generate(_) => Some(ReportStage::Generate),
            ReportError::Download { kind, .. } => Some(ReportStage::Download(*kind)),
            ReportError::Save { kind, .. } => Some(ReportStage::Save(*kind)),
        }
    }

    /// Files that were saved before the failure.
    pub fn saved(&self) -> &[SavedArtifact] {
        match self {
            ReportError::Download { saved, .. } | ReportError::Save { saved, .. } => saved,
            _ => &[],
        }
    }

    /// One artifact made it to disk, the other did not.
    pub fn is_partial(&self) -> bool {
        !self.saved().is_empty()
    }

    /// Message for the alert channel.
    pub fn user_message(&self) -> String {
        match self {
            ReportError::Busy => "A report is already being generated.".to_string(),
            ReportError::Validation(e) => e.user_message().to_string(),
            ReportError::Generate(NetworkError::Server {
                message: Some(m), ..
            }) if !m.is_empty() => m.clone(),
            ReportError::Generate(_) => ErrorCode::GenerationFailed.message().to_string(),
            ReportError::Download { kind, source, .. } => {
                format!("{} download failed: {}", kind.label(), download_detail(source))
            }
            ReportError::Save { kind, .. } => {
                format!(
                    "{} download failed: {}",
                    kind.label(),
                    ErrorCode::DownloadFailed.message()
                )
            }
        }
    }
}

fn download_detail(err: &NetworkError) -> String {
    match err {
        NetworkError::Timeout => "File download timed out. Please try again.".to_string(),
        NetworkError::NoResponse(_) => {
            "No response from server while downloading file. Please try again.".to_string()
        }
        NetworkError::Server {
            message: Some(m), ..
        } if !m.is_empty() => m.clone(),
        NetworkError::Server { status, .. } => {
            format!("Server error ({}): Failed to download file", status)
        }
        NetworkError::InvalidResponse(_) => ErrorCode::DownloadFailed.message().to_string(),
    }
}

/// Generates a report and saves both artifacts.
pub struct ReportPipeline<B, S> {
    backend: Arc<B>,
    sink: Arc<S>,
    alerts: AlertChannel,
    state: watch::Sender<ReportOpState>,
    download_retry: DownloadRetryPolicy,
}

/// Returns the pipeline to idle however `generate` exits, including cancellation.
struct BusyGuard<'a> {
    state: &'a watch::Sender<ReportOpState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| *s = s.on_finished());
    }
}

impl<B: WeatherBackend, S: FileSink> ReportPipeline<B, S> {
    pub fn new(backend: Arc<B>, sink: Arc<S>, alerts: AlertChannel) -> Self {
        let (state, _rx) = watch::channel(ReportOpState::Idle);
        Self {
            backend,
            sink,
            alerts,
            state,
            download_retry: DownloadRetryPolicy::default(),
        }
    }

    pub fn with_download_retry(mut self, policy: DownloadRetryPolicy) -> Self {
        self.download_retry = policy;
        self
    }

    pub fn is_generating(&self) -> bool {
        self.state.borrow().is_generating()
    }

    pub fn state(&self) -> ReportOpState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReportOpState> {
        self.state.subscribe()
    }

    /// Generate the report for `location` over `range` and save both files.
    ///
    /// Emits exactly one alert per call that gets past the busy check. Dropping the
    /// returned future abandons the run without an alert.
    pub async fn generate(
        &self,
        location: &str,
        range: &DateRange,
    ) -> Result<ReportOutcome, ReportError> {
        let acquired = self.state.send_if_modified(|s| {
            if s.can_start() {
                *s = ReportOpState::Validating;
                true
            } else {
                false
            }
        });
        if !acquired {
            tracing::debug!("Ignoring report request while another is running");
            return Err(ReportError::Busy);
        }
        let _busy = BusyGuard { state: &self.state };

        let result = self.run(location, range).await;
        match &result {
            Ok(_) => self.alerts.success(REPORT_GENERATED),
            Err(e) => {
                tracing::warn!("Report failed at {:?}: {}", e.stage(), e);
                self.alerts.error(e.user_message());
            }
        }
        result
    }

    async fn run(&self, location: &str, range: &DateRange) -> Result<ReportOutcome, ReportError> {
        let request = build_request(location, range)?;
        self.state.send_modify(|s| *s = s.on_validated());

        tracing::info!(
            "Generating report for {} ({} to {})",
            request.location,
            request.start_date,
            request.end_date
        );
        let artifacts: ReportArtifacts = self
            .backend
            .generate_report(&request)
            .await
            .map_err(ReportError::Generate)?;

        let mut saved = Vec::with_capacity(ArtifactKind::ORDER.len());
        for kind in ArtifactKind::ORDER {
            self.state.send_modify(|s| *s = s.on_download(kind));
            let filename = artifacts.filename(kind);

            let file = match self.fetch(filename).await {
                Ok(file) => file,
                Err(source) => {
                    return Err(ReportError::Download {
                        kind,
                        source,
                        saved,
                    })
                }
            };

            match self.sink.save(&file).await {
                Ok(path) => saved.push(SavedArtifact { kind, path }),
                Err(source) => {
                    return Err(ReportError::Save {
                        kind,
                        source,
                        saved,
                    })
                }
            }
        }

        Ok(ReportOutcome {
            message: artifacts.message,
            saved,
        })
    }

    async fn fetch(&self, filename: &str) -> Result<DownloadedFile, NetworkError> {
        let retry = RetryConfig::with_retries(self.download_retry.extra_attempts());
        with_retry(&retry, || self.backend.download(filename)).await
    }
}

fn build_request(location: &str, range: &DateRange) -> Result<ReportRequest, ValidationError> {
    let location = location.trim();
    if location.is_empty() {
        return Err(ValidationError::MissingLocation);
    }

    match (range.wire_start(), range.wire_end()) {
        (Some(start_date), Some(end_date)) => Ok(ReportRequest {
            location: location.to_string(),
            start_date,
            end_date,
        }),
        _ => Err(ValidationError::MissingDateRange),
    }
}
