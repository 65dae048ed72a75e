//! Human-readable console output.

use crossterm::style::Stylize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::advisory::{AdvisoryOutcome, BuildSignal, BuildSignals, BundleValidation};
use crate::analyzer::{ArtifactKind, ArtifactReport, ArtifactStatus, BatchVerdict, LibraryRecord};

use super::format_size;

/// Lines of bundletool output shown for a failed validation
const VALIDATOR_TAIL: usize = 5;

pub struct ConsoleRenderer {
    /// List every library, not only misaligned ones
    pub verbose: bool,
    /// Realignment tool for remediation hints
    pub zipalign: Option<PathBuf>,
}

impl ConsoleRenderer {
    pub fn render(&self, verdict: &BatchVerdict, out: &mut impl Write) -> io::Result<()> {
        for report in &verdict.reports {
            self.render_artifact(report, out)?;
            writeln!(out)?;
        }
        render_signals(&verdict.build_signals, out)?;
        render_summary(verdict, out)
    }

    fn render_artifact(&self, report: &ArtifactReport, out: &mut impl Write) -> io::Result<()> {
        let name = report.artifact_path.display().to_string();
        let badge = match report.status {
            ArtifactStatus::Compatible => "COMPATIBLE".green().bold(),
            ArtifactStatus::NoNativeLibraries if report.compatible => "NO NATIVE CODE".cyan().bold(),
            ArtifactStatus::NoNativeLibraries | ArtifactStatus::Incompatible => {
                "INCOMPATIBLE".red().bold()
            }
            ArtifactStatus::Unverified => "UNVERIFIED".yellow().bold(),
            ArtifactStatus::Failed => "FAILED".red().bold(),
        };
        writeln!(
            out,
            "{} ({}, {}) {}",
            name.bold(),
            report.artifact_kind,
            format_size(report.size_bytes),
            badge
        )?;

        if let Some(failure) = &report.failure {
            writeln!(
                out,
                "  {} during {:?}: {}",
                failure.kind.to_string().red(),
                failure.stage,
                failure.message
            )?;
            return Ok(());
        }

        match report.artifact_kind {
            ArtifactKind::Package => self.render_package(report, out)?,
            ArtifactKind::Bundle => self.render_bundle(report, out)?,
        }

        for anomaly in &report.anomalies {
            writeln!(
                out,
                "  {} {}: {}",
                "excluded".yellow(),
                anomaly.entry,
                anomaly.reason
            )?;
        }
        Ok(())
    }

    fn render_package(&self, report: &ArtifactReport, out: &mut impl Write) -> io::Result<()> {
        if report.libraries.is_empty() {
            if report.status == ArtifactStatus::NoNativeLibraries {
                writeln!(out, "  no native libraries")?;
            }
            return Ok(());
        }

        let misaligned = report.misaligned().count();
        writeln!(
            out,
            "  {} native libraries, {} misaligned",
            report.libraries.len(),
            misaligned
        )?;
        for library in &report.libraries {
            if self.verbose || !library.aligned {
                render_library(library, out)?;
            }
        }

        if misaligned > 0 {
            writeln!(
                out,
                "  {} {}",
                "hint:".yellow(),
                realign_hint(self.zipalign.as_deref(), &report.artifact_path)
            )?;
        }
        Ok(())
    }

    fn render_bundle(&self, report: &ArtifactReport, out: &mut impl Write) -> io::Result<()> {
        let manifest = if report.has_manifest_record {
            "present".green()
        } else {
            "missing".red()
        };
        writeln!(out, "  manifest record: {manifest}")?;

        if report.modules.is_empty() && report.status != ArtifactStatus::Unverified {
            writeln!(out, "  no native libraries")?;
        }
        for module in report.modules.iter() {
            writeln!(
                out,
                "  module {}: {} native libraries",
                module.name.as_str().bold(),
                module.libraries.len()
            )?;
            if self.verbose {
                for library in &module.libraries {
                    render_library(library, out)?;
                }
            }
        }

        if let Some(validation) = &report.bundle_validation {
            render_validation(validation, out)?;
        }
        Ok(())
    }
}

fn render_library(library: &LibraryRecord, out: &mut impl Write) -> io::Result<()> {
    let state = if library.aligned {
        "aligned".to_string().green()
    } else {
        format!("misaligned (+{})", library.page_remainder).red()
    };
    write!(
        out,
        "    {}  offset {}  {}",
        library.path, library.effective_offset, state
    )?;
    if library.compressed {
        write!(out, "  {}", "compressed".yellow())?;
    }
    match (library.load_alignment, library.load_segments_page_ready()) {
        (Some(align), Some(false)) => {
            write!(out, "  {}", format!("LOAD align {align}").yellow())?
        }
        (Some(align), _) => write!(out, "  LOAD align {align}")?,
        _ => {}
    }
    writeln!(out)
}

fn render_validation(
    validation: &AdvisoryOutcome<BundleValidation>,
    out: &mut impl Write,
) -> io::Result<()> {
    match validation {
        AdvisoryOutcome::Skipped { reason } => {
            writeln!(out, "  bundletool: {} ({reason})", "skipped".dark_grey())
        }
        AdvisoryOutcome::Completed { result } if result.passed => {
            writeln!(out, "  bundletool: {}", "valid".green())
        }
        AdvisoryOutcome::Completed { result } => {
            writeln!(out, "  bundletool: {} (advisory)", "invalid".yellow())?;
            let lines: Vec<&str> = result.output.lines().collect();
            for line in &lines[lines.len().saturating_sub(VALIDATOR_TAIL)..] {
                writeln!(out, "    {line}")?;
            }
            Ok(())
        }
    }
}

fn render_signals(signals: &AdvisoryOutcome<BuildSignals>, out: &mut impl Write) -> io::Result<()> {
    match signals {
        AdvisoryOutcome::Skipped { reason } => writeln!(
            out,
            "Build configuration: {} ({reason})",
            "skipped".dark_grey()
        ),
        AdvisoryOutcome::Completed { result } => {
            writeln!(
                out,
                "Build configuration ({} files, advisory):",
                result.files_scanned.len()
            )?;
            for signal in BuildSignal::ALL {
                let mark = if result.is_set(signal) {
                    "yes".green()
                } else {
                    "no".dark_grey()
                };
                writeln!(out, "  {:<40} {}", signal.description(), mark)?;
            }
            Ok(())
        }
    }
}

fn render_summary(verdict: &BatchVerdict, out: &mut impl Write) -> io::Result<()> {
    let total = verdict.reports.len();
    let failed = verdict.failed_count();
    let incompatible = verdict.incompatible_count();
    let unverified = verdict.unverified_count();
    let overall = if verdict.overall_compatible {
        "ALL COMPATIBLE".green().bold()
    } else if incompatible > 0 {
        "NOT COMPATIBLE".red().bold()
    } else {
        "COULD NOT EVALUATE".red().bold()
    };
    writeln!(out)?;
    writeln!(
        out,
        "{} artifacts: {} compatible, {} incompatible, {} unverified, {} failed: {}",
        total,
        total - failed - incompatible - unverified,
        incompatible,
        unverified,
        failed,
        overall
    )
}

/// Suggested realignment command for a package.
pub fn realign_hint(zipalign: Option<&Path>, artifact: &Path) -> String {
    let tool = zipalign.map_or_else(|| "zipalign".to_string(), |p| p.display().to_string());
    format!(
        "rebuild with AGP 8.5.1+ or realign: {tool} -P 16 -f -v 4 {} <output.apk>",
        artifact.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Stage;
    use crate::error::AnalysisError;
    use crate::zip::{ArchiveEntry, CompressionMethod};

    fn lib(name: &str, payload: u64) -> LibraryRecord {
        let entry = ArchiveEntry {
            name: name.to_string(),
            header_offset: payload - 30 - name.len() as u64,
            compressed_size: 0,
            uncompressed_size: 0,
            compression_method: CompressionMethod::Stored,
            filename_length: name.len() as u16,
            extra_field_length: 0,
        };
        LibraryRecord::classify(&entry, ArtifactKind::Package)
    }

    fn render(verdict: &BatchVerdict, verbose: bool) -> String {
        let renderer = ConsoleRenderer {
            verbose,
            zipalign: Some(PathBuf::from("/sdk/build-tools/35.0.0/zipalign")),
        };
        let mut buf = Vec::new();
        renderer.render(verdict, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn lists_misaligned_libraries_with_hint() {
        let report = ArtifactReport::verdicted(
            Path::new("app.apk"),
            ArtifactKind::Package,
            4096,
            vec![
                lib("lib/arm64-v8a/libok.so", 16384),
                lib("lib/arm64-v8a/libapp.so", 1_048_580),
            ],
            false,
            vec![],
        );
        let text = render(&BatchVerdict::new(vec![report], AdvisoryOutcome::skipped("none")), false);
        assert!(text.contains("lib/arm64-v8a/libapp.so"));
        assert!(text.contains("misaligned (+4)"));
        assert!(!text.contains("libok.so"));
        assert!(text.contains("/sdk/build-tools/35.0.0/zipalign -P 16"));
        assert!(text.contains("1 incompatible"));
    }

    #[test]
    fn verbose_lists_every_library() {
        let report = ArtifactReport::verdicted(
            Path::new("app.apk"),
            ArtifactKind::Package,
            4096,
            vec![lib("lib/arm64-v8a/libok.so", 16384)],
            false,
            vec![],
        );
        let text = render(&BatchVerdict::new(vec![report], AdvisoryOutcome::skipped("none")), true);
        assert!(text.contains("libok.so"));
        assert!(text.contains("aligned"));
    }

    #[test]
    fn excluded_library_is_not_shown_as_missing_native_code() {
        let report = ArtifactReport::verdicted(
            Path::new("app.apk"),
            ArtifactKind::Package,
            4096,
            vec![],
            false,
            vec![crate::analyzer::EntryAnomaly {
                entry: "lib/arm64-v8a/libapp.so".to_string(),
                reason: "Invalid Local File Header signature".to_string(),
            }],
        );
        let text = render(&BatchVerdict::new(vec![report], AdvisoryOutcome::skipped("none")), false);
        assert!(text.contains("UNVERIFIED"));
        assert!(!text.contains("NO NATIVE CODE"));
        assert!(text.contains("excluded"));
        assert!(text.contains("1 unverified"));
        assert!(text.contains("COULD NOT EVALUATE"));
    }

    #[test]
    fn shows_failure_cause() {
        let err = AnalysisError::unreadable("broken.apk", "Not a valid ZIP file");
        let report =
            ArtifactReport::failed(Path::new("broken.apk"), ArtifactKind::Package, Stage::Scanning, &err);
        let text = render(&BatchVerdict::new(vec![report], AdvisoryOutcome::skipped("none")), false);
        assert!(text.contains("broken.apk"));
        assert!(text.contains("Not a valid ZIP file"));
        assert!(text.contains("1 failed"));
    }
}
