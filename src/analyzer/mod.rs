//! Artifact alignment analysis.
//!
//! Each artifact moves through `Unopened → Scanning → Classifying →
//! Verdicted`. Opening failures stop at `Unopened`, corrupt directories at
//! `Scanning`; either way the result is a failed [`ArtifactReport`] rather
//! than an error, so one bad artifact never aborts a batch.

pub mod bundle;
pub mod classify;
pub mod elf;
pub mod verdict;

pub use classify::{LibraryRecord, ModuleLibraries, ModuleMap};
pub use verdict::{ArtifactReport, ArtifactStatus, BatchVerdict, EntryAnomaly, Failure};

use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{Instrument, debug, info_span, warn};

use crate::error::AnalysisError;
use crate::zip::{ArchiveEntry, ArchiveScanner};

/// Memory page size native libraries must be aligned to
pub const PAGE_SIZE: u64 = 16384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// `.aab`, expanded into device-specific packages by the store
    Bundle,
    /// `.apk`, installed as-is
    Package,
}

impl ArtifactKind {
    /// Classify by file extension; anything that is not `.aab` is treated as
    /// a directly installable package.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("aab") => ArtifactKind::Bundle,
            _ => ArtifactKind::Package,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArtifactKind::Bundle => "bundle",
            ArtifactKind::Package => "package",
        })
    }
}

/// Progress of one artifact through the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Unopened,
    Scanning,
    Classifying,
    Verdicted,
}

#[derive(Debug, Clone, Copy)]
pub struct AnalyzerOptions {
    /// Read each library's ELF program headers
    pub probe_elf: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self { probe_elf: true }
    }
}

/// Analyze one artifact. Never fails: errors become a failed report.
pub async fn analyze_artifact(path: &Path, options: &AnalyzerOptions) -> ArtifactReport {
    let kind = ArtifactKind::from_path(path);
    let span = info_span!("artifact", path = %path.display(), %kind);

    async move {
        let mut stage = Stage::Unopened;
        match run(path, kind, options, &mut stage).await {
            Ok(report) => {
                debug!(
                    libraries = report.libraries.len(),
                    compatible = report.compatible,
                    "verdicted"
                );
                report
            }
            Err(err) => {
                warn!(?stage, %err, "analysis failed");
                ArtifactReport::failed(path, kind, stage, &err)
            }
        }
    }
    .instrument(span)
    .await
}

async fn run(
    path: &Path,
    kind: ArtifactKind,
    options: &AnalyzerOptions,
    stage: &mut Stage,
) -> Result<ArtifactReport, AnalysisError> {
    let scanner = ArchiveScanner::open(path)?;

    *stage = Stage::Scanning;
    let mut cursor = scanner.entries().await?;
    let mut has_manifest_record = false;
    let mut library_entries: Vec<ArchiveEntry> = Vec::new();
    let mut anomalies = Vec::new();

    while let Some(next) = cursor.next_entry().await {
        match next {
            Ok(entry) => {
                if bundle::is_manifest_record(&entry.name) {
                    has_manifest_record = true;
                }
                if classify::is_native_library(&entry.name) {
                    library_entries.push(entry);
                }
            }
            Err(AnalysisError::OffsetComputation { entry, reason }) => {
                warn!(%entry, %reason, "entry excluded");
                anomalies.push(EntryAnomaly { entry, reason });
            }
            Err(err) => return Err(err),
        }
    }

    *stage = Stage::Classifying;
    let mut libraries = Vec::with_capacity(library_entries.len());
    for entry in &library_entries {
        let mut record = LibraryRecord::classify(entry, kind);
        if options.probe_elf {
            match elf::probe_load_alignment(scanner.reader().as_ref(), entry).await {
                Ok(alignment) => record.load_alignment = alignment,
                Err(err) => debug!(name = %entry.name, %err, "ELF probe failed"),
            }
        }
        if !record.aligned {
            debug!(
                name = %record.path,
                offset = record.effective_offset,
                remainder = record.page_remainder,
                "misaligned library"
            );
        }
        libraries.push(record);
    }

    *stage = Stage::Verdicted;
    Ok(ArtifactReport::verdicted(
        path,
        kind,
        scanner.size(),
        libraries,
        has_manifest_record,
        anomalies,
    ))
}
