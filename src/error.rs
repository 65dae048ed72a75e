//! Error taxonomy for artifact analysis and its advisory collaborators.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while analyzing a single artifact.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("artifact not found: {}: {source}", path.display())]
    ArtifactNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive unreadable: {}: {reason}", path.display())]
    ArchiveUnreadable { path: PathBuf, reason: String },

    #[error("cannot compute payload offset of '{entry}': {reason}")]
    OffsetComputation { entry: String, reason: String },
}

impl AnalysisError {
    pub fn unreadable(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::ArchiveUnreadable {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ArtifactNotFound { .. } => FailureKind::ArtifactNotFound,
            Self::ArchiveUnreadable { .. } => FailureKind::ArchiveUnreadable,
            Self::OffsetComputation { .. } => FailureKind::OffsetComputation,
        }
    }
}

/// Serializable discriminant of [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ArtifactNotFound,
    ArchiveUnreadable,
    OffsetComputation,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::ArtifactNotFound => "artifact not found",
            FailureKind::ArchiveUnreadable => "archive unreadable",
            FailureKind::OffsetComputation => "offset computation error",
        };
        f.write_str(s)
    }
}

/// An advisory collaborator (bundletool, Java, build files) could not be used.
///
/// Never fatal: the matching report section degrades to "skipped".
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("{tool} unavailable: {reason}")]
    Unavailable { tool: &'static str, reason: String },

    #[error("{tool} download failed: {source}")]
    Download {
        tool: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("{tool} failed to run: {source}")]
    Io {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl CollaboratorError {
    pub fn unavailable(tool: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            tool,
            reason: reason.into(),
        }
    }
}
