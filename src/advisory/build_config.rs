//! Build configuration signals.
//!
//! Scans Gradle and NDK build files for settings that matter for 16 KB
//! page support. Text matching only; results are surfaced in reports but
//! never influence a verdict.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

use crate::error::CollaboratorError;

const TOOL: &str = "build configuration";

/// Directories never worth descending into
const SKIPPED_DIRS: &[&str] = &["build", ".gradle", ".git", ".cxx", ".idea", "node_modules"];

const MAX_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildSignal {
    /// `android.bundle.enableUncompressedNativeLibs=true`
    UncompressedNativeLibs,
    /// `useLegacyPackaging = false` in the packaging block
    LegacyPackagingDisabled,
    /// Linker flag `-Wl,-z,max-page-size=16384`
    MaxPageSize16k,
    /// NDK `ANDROID_SUPPORT_FLEXIBLE_PAGE_SIZES=ON`
    FlexiblePageSizes,
}

static UNCOMPRESSED_NATIVE_LIBS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"android\.bundle\.enableUncompressedNativeLibs\s*=\s*true").unwrap()
});
static LEGACY_PACKAGING_DISABLED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"useLegacyPackaging\s*(=\s*)?false").unwrap());
static MAX_PAGE_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"max-page-size\s*=\s*16384").unwrap());
static FLEXIBLE_PAGE_SIZES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ANDROID_SUPPORT_FLEXIBLE_PAGE_SIZES\s*[=\s]\s*(?i:on|true|1)\b").unwrap()
});

impl BuildSignal {
    pub const ALL: [BuildSignal; 4] = [
        BuildSignal::UncompressedNativeLibs,
        BuildSignal::LegacyPackagingDisabled,
        BuildSignal::MaxPageSize16k,
        BuildSignal::FlexiblePageSizes,
    ];

    fn pattern(self) -> &'static Regex {
        match self {
            BuildSignal::UncompressedNativeLibs => &UNCOMPRESSED_NATIVE_LIBS,
            BuildSignal::LegacyPackagingDisabled => &LEGACY_PACKAGING_DISABLED,
            BuildSignal::MaxPageSize16k => &MAX_PAGE_SIZE,
            BuildSignal::FlexiblePageSizes => &FLEXIBLE_PAGE_SIZES,
        }
    }

    /// Whether a build file of this kind can carry the signal.
    fn applies_to(self, kind: BuildFileKind) -> bool {
        use BuildFileKind::*;
        match self {
            BuildSignal::UncompressedNativeLibs => kind == GradleProperties,
            BuildSignal::LegacyPackagingDisabled => kind == GradleScript,
            BuildSignal::MaxPageSize16k | BuildSignal::FlexiblePageSizes => {
                matches!(kind, GradleScript | CMake | NdkMakefile)
            }
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BuildSignal::UncompressedNativeLibs => "uncompressed native libs in bundles",
            BuildSignal::LegacyPackagingDisabled => "legacy JNI packaging disabled",
            BuildSignal::MaxPageSize16k => "linker max-page-size=16384",
            BuildSignal::FlexiblePageSizes => "NDK flexible page sizes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildFileKind {
    GradleProperties,
    GradleScript,
    CMake,
    NdkMakefile,
}

impl BuildFileKind {
    fn of(file_name: &str) -> Option<Self> {
        match file_name {
            "gradle.properties" => Some(Self::GradleProperties),
            "build.gradle" | "build.gradle.kts" => Some(Self::GradleScript),
            "CMakeLists.txt" => Some(Self::CMake),
            "Android.mk" | "Application.mk" => Some(Self::NdkMakefile),
            _ => None,
        }
    }
}

/// Signals found in a project, one flag per [`BuildSignal`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSignals {
    pub flags: BTreeMap<BuildSignal, bool>,
    #[serde(serialize_with = "crate::report::json::lossy_paths")]
    pub files_scanned: Vec<PathBuf>,
}

impl BuildSignals {
    fn empty() -> Self {
        Self {
            flags: BuildSignal::ALL.iter().map(|s| (*s, false)).collect(),
            files_scanned: Vec::new(),
        }
    }

    pub fn is_set(&self, signal: BuildSignal) -> bool {
        self.flags.get(&signal).copied().unwrap_or(false)
    }
}

/// Source of advisory build signals.
pub trait AdvisorySignalProvider: Send + Sync {
    fn signals(&self) -> Result<BuildSignals, CollaboratorError>;
}

/// Reads signals from a Gradle/NDK project tree.
#[derive(Debug, Clone)]
pub struct GradleProjectSignals {
    root: PathBuf,
}

impl GradleProjectSignals {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl AdvisorySignalProvider for GradleProjectSignals {
    fn signals(&self) -> Result<BuildSignals, CollaboratorError> {
        if !self.root.is_dir() {
            return Err(CollaboratorError::unavailable(
                TOOL,
                format!("{} is not a directory", self.root.display()),
            ));
        }

        let mut signals = BuildSignals::empty();
        let walker = WalkDir::new(&self.root)
            .max_depth(MAX_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));

        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(kind) = entry.file_name().to_str().and_then(BuildFileKind::of) else {
                continue;
            };
            let text = match std::fs::read_to_string(entry.path()) {
                Ok(text) => text,
                Err(err) => {
                    debug!(path = %entry.path().display(), %err, "unreadable build file");
                    continue;
                }
            };
            trace!(path = %entry.path().display(), "scanning build file");
            apply_file(&mut signals, kind, &text);
            signals.files_scanned.push(entry.into_path());
        }

        if signals.files_scanned.is_empty() {
            return Err(CollaboratorError::unavailable(
                TOOL,
                format!("no Gradle or NDK build files under {}", self.root.display()),
            ));
        }
        Ok(signals)
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn apply_file(signals: &mut BuildSignals, kind: BuildFileKind, text: &str) {
    for line in text.lines().map(str::trim) {
        if line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        for signal in BuildSignal::ALL {
            if signal.applies_to(kind) && signal.pattern().is_match(line) {
                signals.flags.insert(signal, true);
            }
        }
    }
}
