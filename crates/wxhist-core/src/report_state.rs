//! Report operation state machine (submit, then download each artifact in turn).
//!
//! Only one report runs at a time. Used by the report pipeline.

/// Report artifacts in the order they are downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Excel,
    Pdf,
}

impl ArtifactKind {
    pub const ORDER: [ArtifactKind; 2] = [ArtifactKind::Excel, ArtifactKind::Pdf];

    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Excel => "Excel report",
            ArtifactKind::Pdf => "PDF report",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportOpState {
    #[default]
    Idle,
    Validating,
    Submitting,
    Downloading(ArtifactKind),
}

impl ReportOpState {
    /// True if a new report can be started.
    pub fn can_start(self) -> bool {
        matches!(self, ReportOpState::Idle)
    }

    pub fn is_generating(self) -> bool {
        !matches!(self, ReportOpState::Idle)
    }

    /// State after the inputs passed validation.
    pub fn on_validated(self) -> Self {
        ReportOpState::Submitting
    }

    /// State when an artifact download begins.
    pub fn on_download(self, kind: ArtifactKind) -> Self {
        ReportOpState::Downloading(kind)
    }

    /// State after the outcome alert has been emitted.
    pub fn on_finished(self) -> Self {
        ReportOpState::Idle
    }
}
