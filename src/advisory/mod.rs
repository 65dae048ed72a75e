//! Advisory collaborators.
//!
//! Nothing in here can change an artifact's `compatible` verdict. Each
//! collaborator either completes or degrades to [`AdvisoryOutcome::Skipped`].

pub mod build_config;
pub mod bundletool;

pub use build_config::{AdvisorySignalProvider, BuildSignal, BuildSignals, GradleProjectSignals};
pub use bundletool::{BundleValidation, BundleValidator, Bundletool};

use serde::Serialize;
use tracing::info;

use crate::error::CollaboratorError;

/// Result of an advisory step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AdvisoryOutcome<T> {
    Completed { result: T },
    Skipped { reason: String },
}

impl<T> AdvisoryOutcome<T> {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// Convert a collaborator result, logging why it was skipped.
    pub fn from_result(result: Result<T, CollaboratorError>) -> Self {
        match result {
            Ok(result) => Self::Completed { result },
            Err(err) => {
                info!(%err, "advisory check skipped");
                Self::skipped(err.to_string())
            }
        }
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            Self::Completed { result } => Some(result),
            Self::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}
