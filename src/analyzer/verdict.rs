use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::advisory::{AdvisoryOutcome, BuildSignals, BundleValidation};
use crate::error::{AnalysisError, FailureKind};

use super::bundle::bundle_ready;
use super::classify::{LibraryRecord, ModuleMap, is_native_library};
use super::{ArtifactKind, Stage};

/// Summary state of one artifact, finer than `compatible`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Compatible,
    Incompatible,
    /// Verdicted, but the artifact carries no native code
    NoNativeLibraries,
    /// Native libraries present whose payload offsets could not be computed
    Unverified,
    Failed,
}

/// Why an artifact could not be verdicted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub stage: Stage,
    pub message: String,
}

/// An entry left out of classification because its offset could not be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryAnomaly {
    pub entry: String,
    pub reason: String,
}

/// Analysis outcome for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactReport {
    #[serde(serialize_with = "crate::report::json::lossy_path")]
    pub artifact_path: PathBuf,
    pub artifact_kind: ArtifactKind,
    pub size_bytes: u64,
    pub libraries: Vec<LibraryRecord>,
    #[serde(skip_serializing_if = "ModuleMap::is_empty")]
    pub modules: ModuleMap,
    pub has_manifest_record: bool,
    pub compatible: bool,
    pub status: ArtifactStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<EntryAnomaly>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_validation: Option<AdvisoryOutcome<BundleValidation>>,
}

impl ArtifactReport {
    /// Build the report of a fully scanned artifact.
    ///
    /// Packages are compatible iff every library is aligned (vacuously true
    /// without libraries). Bundles are compatible iff the manifest record is
    /// present and at least one library was found. A native library excluded
    /// as an anomaly keeps the artifact from being compatible, unless a
    /// definite incompatibility already decides it.
    pub fn verdicted(
        artifact_path: &Path,
        artifact_kind: ArtifactKind,
        size_bytes: u64,
        libraries: Vec<LibraryRecord>,
        has_manifest_record: bool,
        anomalies: Vec<EntryAnomaly>,
    ) -> Self {
        let (incompatible, modules) = match artifact_kind {
            ArtifactKind::Package => (libraries.iter().any(|l| !l.aligned), ModuleMap::default()),
            ArtifactKind::Bundle => (!has_manifest_record, ModuleMap::group(&libraries)),
        };
        let unverified = anomalies.iter().any(|a| is_native_library(&a.entry));

        let status = if incompatible {
            ArtifactStatus::Incompatible
        } else if unverified {
            ArtifactStatus::Unverified
        } else if libraries.is_empty() {
            ArtifactStatus::NoNativeLibraries
        } else {
            ArtifactStatus::Compatible
        };
        let compatible = match (status, artifact_kind) {
            (ArtifactStatus::Compatible, _) => true,
            (ArtifactStatus::NoNativeLibraries, ArtifactKind::Package) => true,
            (ArtifactStatus::NoNativeLibraries, ArtifactKind::Bundle) => {
                bundle_ready(has_manifest_record, &libraries)
            }
            _ => false,
        };

        Self {
            artifact_path: artifact_path.to_path_buf(),
            artifact_kind,
            size_bytes,
            libraries,
            modules,
            has_manifest_record,
            compatible,
            status,
            failure: None,
            anomalies,
            bundle_validation: None,
        }
    }

    /// Build the report of an artifact whose analysis stopped at `stage`.
    pub fn failed(
        artifact_path: &Path,
        artifact_kind: ArtifactKind,
        stage: Stage,
        err: &AnalysisError,
    ) -> Self {
        Self {
            artifact_path: artifact_path.to_path_buf(),
            artifact_kind,
            size_bytes: 0,
            libraries: Vec::new(),
            modules: ModuleMap::default(),
            has_manifest_record: false,
            compatible: false,
            status: ArtifactStatus::Failed,
            failure: Some(Failure {
                kind: err.kind(),
                stage,
                message: err.to_string(),
            }),
            anomalies: Vec::new(),
            bundle_validation: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn misaligned(&self) -> impl Iterator<Item = &LibraryRecord> {
        self.libraries.iter().filter(|l| !l.aligned)
    }
}

/// Aggregate over every artifact of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchVerdict {
    pub reports: Vec<ArtifactReport>,
    pub overall_compatible: bool,
    pub build_signals: AdvisoryOutcome<BuildSignals>,
}

impl BatchVerdict {
    pub fn new(reports: Vec<ArtifactReport>, build_signals: AdvisoryOutcome<BuildSignals>) -> Self {
        let overall_compatible = reports.iter().all(|r| r.compatible);
        Self {
            reports,
            overall_compatible,
            build_signals,
        }
    }

    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|r| r.is_failed()).count()
    }

    /// Reports that were verdicted incompatible, excluding failures and
    /// unverified libraries.
    pub fn incompatible_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| !r.compatible)
            .filter(|r| !matches!(r.status, ArtifactStatus::Failed | ArtifactStatus::Unverified))
            .count()
    }

    pub fn unverified_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.status == ArtifactStatus::Unverified)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::{ArchiveEntry, CompressionMethod};

    fn lib(name: &str, payload_offset: u64, kind: ArtifactKind) -> LibraryRecord {
        let header_offset = payload_offset - 30 - name.len() as u64;
        let entry = ArchiveEntry {
            name: name.to_string(),
            header_offset,
            compressed_size: 0,
            uncompressed_size: 0,
            compression_method: CompressionMethod::Stored,
            filename_length: name.len() as u16,
            extra_field_length: 0,
        };
        LibraryRecord::classify(&entry, kind)
    }

    fn package(libs: Vec<LibraryRecord>) -> ArtifactReport {
        ArtifactReport::verdicted(
            Path::new("app.apk"),
            ArtifactKind::Package,
            1,
            libs,
            false,
            vec![],
        )
    }

    fn skipped() -> AdvisoryOutcome<BuildSignals> {
        AdvisoryOutcome::skipped("not checked")
    }

    #[test]
    fn package_without_libraries_is_not_a_failure() {
        let report = package(vec![]);
        assert!(report.compatible);
        assert_eq!(report.status, ArtifactStatus::NoNativeLibraries);
        assert!(report.modules.is_empty());
    }

    #[test]
    fn one_misaligned_library_fails_the_package() {
        let k = ArtifactKind::Package;
        let good = package(vec![
            lib("lib/arm64-v8a/liba.so", 16384, k),
            lib("lib/arm64-v8a/libb.so", 32768, k),
        ]);
        assert!(good.compatible);
        assert_eq!(good.status, ArtifactStatus::Compatible);

        let bad = package(vec![
            lib("lib/arm64-v8a/liba.so", 16384, k),
            lib("lib/arm64-v8a/libb.so", 32770, k),
        ]);
        assert!(!bad.compatible);
        assert_eq!(bad.status, ArtifactStatus::Incompatible);
        let misaligned: Vec<_> = bad.misaligned().map(|l| l.library_name.as_str()).collect();
        assert_eq!(misaligned, ["libb.so"]);
    }

    #[test]
    fn bundle_ignores_byte_offsets() {
        let k = ArtifactKind::Bundle;
        let report = ArtifactReport::verdicted(
            Path::new("app.aab"),
            k,
            1,
            vec![
                lib("base/lib/arm64-v8a/liba.so", 100, k),
                lib("feature/lib/arm64-v8a/libb.so", 1003, k),
            ],
            true,
            vec![],
        );
        assert!(report.compatible);
        assert_eq!(report.modules.len(), 2);
    }

    #[test]
    fn bundle_without_manifest_is_incompatible() {
        let k = ArtifactKind::Bundle;
        let report = ArtifactReport::verdicted(
            Path::new("app.aab"),
            k,
            1,
            vec![lib("base/lib/arm64-v8a/liba.so", 16384, k)],
            false,
            vec![],
        );
        assert!(!report.compatible);
        assert_eq!(report.status, ArtifactStatus::Incompatible);
    }

    fn anomaly(entry: &str) -> EntryAnomaly {
        EntryAnomaly {
            entry: entry.to_string(),
            reason: "Invalid Local File Header signature".to_string(),
        }
    }

    #[test]
    fn excluded_library_is_not_absence_of_native_code() {
        let report = ArtifactReport::verdicted(
            Path::new("app.apk"),
            ArtifactKind::Package,
            1,
            vec![],
            false,
            vec![anomaly("lib/arm64-v8a/libapp.so")],
        );
        assert_eq!(report.status, ArtifactStatus::Unverified);
        assert!(!report.compatible);

        let batch = BatchVerdict::new(vec![report], skipped());
        assert!(!batch.overall_compatible);
        assert_eq!(batch.incompatible_count(), 0);
        assert_eq!(batch.unverified_count(), 1);
    }

    #[test]
    fn misalignment_outranks_unverified_libraries() {
        let k = ArtifactKind::Package;
        let report = ArtifactReport::verdicted(
            Path::new("app.apk"),
            k,
            1,
            vec![lib("lib/arm64-v8a/liba.so", 16388, k)],
            false,
            vec![anomaly("lib/arm64-v8a/libb.so")],
        );
        assert_eq!(report.status, ArtifactStatus::Incompatible);
        assert_eq!(BatchVerdict::new(vec![report], skipped()).incompatible_count(), 1);
    }

    #[test]
    fn non_library_anomalies_are_informational() {
        let k = ArtifactKind::Package;
        let report = ArtifactReport::verdicted(
            Path::new("app.apk"),
            k,
            1,
            vec![lib("lib/arm64-v8a/liba.so", 16384, k)],
            false,
            vec![anomaly("assets/data.bin")],
        );
        assert_eq!(report.status, ArtifactStatus::Compatible);
        assert!(report.compatible);
    }

    #[test]
    fn bundle_with_excluded_library_is_unverified() {
        let k = ArtifactKind::Bundle;
        let report = ArtifactReport::verdicted(
            Path::new("app.aab"),
            k,
            1,
            vec![lib("base/lib/arm64-v8a/liba.so", 100, k)],
            true,
            vec![anomaly("feature/lib/arm64-v8a/libb.so")],
        );
        assert_eq!(report.status, ArtifactStatus::Unverified);
        assert!(!report.compatible);
    }

    #[test]
    fn batch_is_strict_and() {
        let ok = package(vec![]);
        let failed = ArtifactReport::failed(
            Path::new("missing.apk"),
            ArtifactKind::Package,
            Stage::Unopened,
            &AnalysisError::ArtifactNotFound {
                path: "missing.apk".into(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
        );

        assert!(BatchVerdict::new(vec![ok.clone(), ok.clone()], skipped()).overall_compatible);
        assert!(BatchVerdict::new(vec![], skipped()).overall_compatible);

        let batch = BatchVerdict::new(vec![ok.clone(), failed], skipped());
        assert!(!batch.overall_compatible);
        assert_eq!(batch.failed_count(), 1);
        assert_eq!(batch.incompatible_count(), 0);
        assert_eq!(batch.reports[0], ok);
    }

    #[test]
    fn failure_records_stage_and_kind() {
        let err = AnalysisError::unreadable("broken.apk", "Not a valid ZIP file");
        let report =
            ArtifactReport::failed(Path::new("broken.apk"), ArtifactKind::Package, Stage::Scanning, &err);
        let failure = report.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::ArchiveUnreadable);
        assert_eq!(failure.stage, Stage::Scanning);
        assert!(failure.message.contains("broken.apk"));
        assert!(!report.compatible);
    }
}
