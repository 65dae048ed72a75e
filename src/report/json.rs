//! Machine-readable report output.

use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};

use crate::analyzer::BatchVerdict;
use anyhow::{Context, Result};

/// Envelope written for `--json` and `--report`.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub page_size: u64,
    #[serde(flatten)]
    pub verdict: &'a BatchVerdict,
}

impl<'a> JsonReport<'a> {
    pub fn new(verdict: &'a BatchVerdict) -> Self {
        Self {
            tool: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            page_size: crate::analyzer::PAGE_SIZE,
            verdict,
        }
    }
}

pub fn to_json(verdict: &BatchVerdict) -> Result<String> {
    Ok(serde_json::to_string_pretty(&JsonReport::new(verdict))?)
}

pub fn write_json(verdict: &BatchVerdict, path: &Path) -> Result<()> {
    let json = to_json(verdict)?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("failed to write report to {}", path.display()))
}

/// Paths are written lossily; a non-UTF-8 name must not cost the whole report.
pub fn lossy_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

pub fn lossy_paths<S: Serializer>(paths: &[PathBuf], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(paths.iter().map(|p| p.to_string_lossy()))
}
