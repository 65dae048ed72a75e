//! Presentation of batch verdicts.

pub mod console;
pub mod json;

use std::process::ExitCode;

use crate::analyzer::BatchVerdict;

/// Final classification of a run, mapped onto the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    AllCompatible,
    SomeIncompatible,
    CouldNotEvaluate,
}

impl ExitClass {
    /// Any verdicted incompatibility wins over evaluation failures and
    /// unverified libraries.
    pub fn from_verdict(verdict: &BatchVerdict) -> Self {
        if verdict.overall_compatible {
            ExitClass::AllCompatible
        } else if verdict.incompatible_count() > 0 {
            ExitClass::SomeIncompatible
        } else {
            ExitClass::CouldNotEvaluate
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ExitClass::AllCompatible => 0,
            ExitClass::SomeIncompatible => 1,
            ExitClass::CouldNotEvaluate => 2,
        }
    }
}

impl From<ExitClass> for ExitCode {
    fn from(class: ExitClass) -> Self {
        ExitCode::from(class.code())
    }
}

/// Format a byte size into a human-readable string.
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
