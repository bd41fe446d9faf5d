//! Weather backend access and the report pipeline.

pub mod backend;
pub mod client;
pub mod pipeline;
pub mod retry;
pub mod sink;
pub mod types;

pub use backend::{BackendResult, WeatherBackend};
pub use client::HttpBackend;
pub use pipeline::{ReportError, ReportOutcome, ReportPipeline, ReportStage, SavedArtifact};
pub use retry::{with_retry, RetryConfig};
pub use sink::{DirectorySink, FileSink};
pub use types::{
    DownloadedFile, PlaceCandidate, ReportArtifacts, ReportRequest, TemperatureBand, WeatherInfo,
};
