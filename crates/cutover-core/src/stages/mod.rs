//! Pipeline stages and their shared result contract.
//!
//! A stage is a function `ctx, input → StageResult`. Stages never
//! panic across the orchestrator boundary: they return a
//! [`StageFailure`] carrying the evidence gathered so far, and the
//! orchestrator turns that into registry rows, a log artifact and a
//! state transition.

pub mod capture;
pub mod crawl;
pub mod data;
pub mod functional;
pub mod report;
pub mod visual;

use cutover_store::NewArtifact;

/// The fixed stage vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Crawl,
    Capture,
    Visual,
    Functional,
    Data,
    Reasoning,
    Report,
}

impl StageKind {
    /// Display name, used in labels and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Crawl => "Crawl",
            Self::Capture => "Capture",
            Self::Visual => "Visual Diff",
            Self::Functional => "Functional QA",
            Self::Data => "Data Integrity",
            Self::Reasoning => "Reasoning",
            Self::Report => "Report",
        }
    }

    /// Filesystem slug for log artifacts.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::Capture => "capture",
            Self::Visual => "visual",
            Self::Functional => "functional",
            Self::Data => "data",
            Self::Reasoning => "reasoning",
            Self::Report => "report",
        }
    }

    /// Label of the error log artifact for this stage.
    pub fn error_label(&self) -> String {
        format!("{} Error", self.name())
    }

    /// Whether a failure here ends the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Crawl | Self::Capture | Self::Report)
    }
}

/// Successful stage completion: the stage value plus the registry rows
/// for everything it wrote.
pub struct StageOutput<T> {
    pub value: T,
    pub artifacts: Vec<NewArtifact>,
}

/// Stage failure: the message for the log artifact plus whatever
/// evidence was written before things went wrong.
pub struct StageFailure {
    pub message: String,
    pub artifacts: Vec<NewArtifact>,
}

impl StageFailure {
    pub fn new<M: Into<String>>(message: M) -> Self {
        Self {
            message: message.into(),
            artifacts: Vec::new(),
        }
    }

    pub fn with_artifacts<M: Into<String>>(message: M, artifacts: Vec<NewArtifact>) -> Self {
        Self {
            message: message.into(),
            artifacts,
        }
    }
}

/// What every stage returns to the orchestrator.
pub type StageResult<T> = std::result::Result<StageOutput<T>, StageFailure>;

/// Which site a piece of evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Baseline,
    Candidate,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Candidate => "candidate",
        }
    }
}
