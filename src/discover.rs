//! Artifact discovery.
//!
//! Explicit file arguments are kept as given, even if missing, so that they
//! produce a failed report instead of silently vanishing. Directories are
//! searched for `.aab`/`.apk` files. Without any argument, the conventional
//! Gradle output directories of the project are searched.

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub const ARTIFACT_EXTENSIONS: [&str; 2] = ["aab", "apk"];

const MAX_DEPTH: usize = 10;

/// Whether the path carries a bundle or package extension.
pub fn is_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ARTIFACT_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

/// Expand CLI inputs into artifact paths, in argument order.
pub fn resolve_inputs(inputs: &[PathBuf], project_dir: &Path) -> Vec<PathBuf> {
    if inputs.is_empty() {
        return discover_build_outputs(project_dir);
    }

    let mut out = Vec::new();
    for input in inputs {
        if input.is_dir() {
            out.extend(find_artifacts(input));
        } else {
            out.push(input.clone());
        }
    }
    dedup_preserving_order(out)
}

/// All artifacts below `dir`, sorted by path.
pub fn find_artifacts(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .max_depth(MAX_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_artifact(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// Artifacts under `**/build/outputs/{bundle,apk}/**` of a project.
pub fn discover_build_outputs(project_dir: &Path) -> Vec<PathBuf> {
    let found: Vec<PathBuf> = find_artifacts(project_dir)
        .into_iter()
        .filter(|p| is_build_output(p.strip_prefix(project_dir).unwrap_or(p)))
        .collect();
    debug!(project = %project_dir.display(), count = found.len(), "discovered build outputs");
    found
}

fn is_build_output(relative: &Path) -> bool {
    let parts: Vec<&str> = relative
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    parts.windows(3).any(|w| {
        w[0] == "build" && w[1] == "outputs" && (w[2] == "bundle" || w[2] == "apk")
    })
}

fn dedup_preserving_order(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    paths.into_iter().filter(|p| seen.insert(p.clone())).collect()
}
