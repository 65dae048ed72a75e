//! # aligncheck
//!
//! Checks Android app bundles (`.aab`) and packages (`.apk`) for the 16 KB
//! page-size requirement: every native library (`.so`) must start at an
//! offset that is a multiple of 16384 inside the archive so the loader can
//! map it in place.
//!
//! The payload offset is recomputed from raw zip metadata: the central
//! directory gives the local header position, and the local header's own
//! name and extra field lengths give where the data begins.
//!
//! ## Features
//!
//! - Lazy, re-openable scanning of zip central directories (ZIP64 aware)
//! - Per-library page remainder and alignment verdict
//! - Bundle readiness check (manifest record plus native code, grouped by module)
//! - ELF `PT_LOAD` alignment probe, including DEFLATE-compressed libraries
//! - Advisory bundletool validation and build configuration signals
//! - Bounded-parallel batch analysis with a strict all-or-nothing verdict
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use aligncheck::analyzer::{analyze_artifact, AnalyzerOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let report = analyze_artifact(Path::new("app-release.apk"), &AnalyzerOptions::default()).await;
//!     for library in report.misaligned() {
//!         println!("{} +{}", library.path, library.page_remainder);
//!     }
//!     println!("compatible: {}", report.compatible);
//! }
//! ```

pub mod advisory;
pub mod analyzer;
pub mod batch;
pub mod cli;
pub mod discover;
pub mod env;
pub mod error;
pub mod io;
pub mod report;
pub mod zip;

pub use analyzer::{ArtifactKind, ArtifactReport, BatchVerdict, LibraryRecord, PAGE_SIZE};
pub use batch::BatchRunner;
pub use cli::Cli;
pub use env::RunConfig;
pub use error::{AnalysisError, CollaboratorError};
pub use io::{LocalFileReader, ReadAt};
pub use zip::{ArchiveEntry, ArchiveScanner};
