//! Run configuration and environment discovery.
//!
//! Everything the analyzer and its collaborators need from the environment
//! is resolved once into a [`RunConfig`] and shared read-only afterwards.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cli::Cli;

const APP_DIR: &str = "aligncheck";

/// Immutable settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Root for artifact discovery and build configuration checks
    pub project_dir: PathBuf,
    pub sdk_root: Option<PathBuf>,
    /// Realignment tool, used for remediation hints
    pub zipalign: Option<PathBuf>,
    pub java: Option<PathBuf>,
    /// Explicit bundletool jar; otherwise the cached or downloaded copy is used
    pub bundletool_jar: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub download_bundletool: bool,
    pub validate_bundles: bool,
    pub probe_elf: bool,
    /// Artifacts analyzed concurrently
    pub jobs: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            sdk_root: None,
            zipalign: None,
            java: None,
            bundletool_jar: None,
            cache_dir: None,
            download_bundletool: false,
            validate_bundles: false,
            probe_elf: true,
            jobs: 1,
        }
    }
}

impl RunConfig {
    /// Resolve the configuration from CLI flags and the process environment.
    pub fn from_cli(cli: &Cli) -> Self {
        let sdk_root = find_sdk_root();
        let zipalign = find_zipalign(sdk_root.as_deref());
        let java = find_java();
        let jobs = cli.jobs.unwrap_or_else(default_jobs).max(1);

        let config = Self {
            project_dir: cli.project.clone(),
            sdk_root,
            zipalign,
            java,
            bundletool_jar: cli.bundletool.clone(),
            cache_dir: dirs::cache_dir().map(|d| d.join(APP_DIR)),
            download_bundletool: !cli.no_download,
            validate_bundles: !cli.skip_bundletool,
            probe_elf: !cli.no_elf,
            jobs,
        };
        debug!(?config, "resolved run configuration");
        config
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(1, usize::from)
}

/// `ANDROID_HOME`, `ANDROID_SDK_ROOT`, then the Android Studio default locations.
pub fn find_sdk_root() -> Option<PathBuf> {
    let from_env = ["ANDROID_HOME", "ANDROID_SDK_ROOT"]
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .map(PathBuf::from);

    let home = dirs::home_dir();
    let defaults = [
        home.as_ref().map(|h| h.join("Library/Android/sdk")),
        home.as_ref().map(|h| h.join("Android/Sdk")),
        dirs::data_local_dir().map(|d| d.join("Android/Sdk")),
    ];

    from_env
        .chain(defaults.into_iter().flatten())
        .find(|p| p.is_dir())
}

/// Newest `build-tools/<version>/zipalign` of the SDK, else `zipalign` on PATH.
pub fn find_zipalign(sdk_root: Option<&Path>) -> Option<PathBuf> {
    sdk_root
        .and_then(|sdk| newest_build_tool(&sdk.join("build-tools"), exe("zipalign").as_str()))
        .or_else(|| which::which("zipalign").ok())
}

/// `$JAVA_HOME/bin/java`, else `java` on PATH.
pub fn find_java() -> Option<PathBuf> {
    std::env::var_os("JAVA_HOME")
        .map(|home| PathBuf::from(home).join("bin").join(exe("java")))
        .filter(|p| p.is_file())
        .or_else(|| which::which("java").ok())
}

fn exe(name: &str) -> String {
    format!("{name}{}", std::env::consts::EXE_SUFFIX)
}

fn newest_build_tool(build_tools: &Path, tool: &str) -> Option<PathBuf> {
    let mut candidates: Vec<(Vec<u64>, PathBuf)> = std::fs::read_dir(build_tools)
        .ok()?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let path = entry.path().join(tool);
            let version = version_key(entry.file_name().to_str()?);
            path.is_file().then_some((version, path))
        })
        .collect();
    candidates.sort();
    candidates.pop().map(|(_, path)| path)
}

/// Numeric components of a build-tools directory name (`35.0.0-rc1` → `[35, 0, 0, 1]`).
fn version_key(name: &str) -> Vec<u64> {
    name.split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_keys_order_numerically() {
        assert!(version_key("34.0.0") > version_key("9.0.0"));
        assert!(version_key("35.0.1") > version_key("35.0.0"));
        assert_eq!(version_key("35.0.0-rc1"), vec![35, 0, 0, 1]);
    }

    #[test]
    fn picks_newest_build_tools() {
        let sdk = tempfile::tempdir().unwrap();
        let build_tools = sdk.path().join("build-tools");
        for version in ["30.0.3", "34.0.0", "9.0.0", "35.0.0"] {
            std::fs::create_dir_all(build_tools.join(version)).unwrap();
        }
        // 35.0.0 has no zipalign binary
        for version in ["30.0.3", "34.0.0", "9.0.0"] {
            std::fs::write(build_tools.join(version).join(exe("zipalign")), b"").unwrap();
        }

        let found = newest_build_tool(&build_tools, &exe("zipalign")).unwrap();
        assert!(found.starts_with(build_tools.join("34.0.0")));
    }

    #[test]
    fn missing_build_tools_dir_yields_none() {
        let sdk = tempfile::tempdir().unwrap();
        assert!(newest_build_tool(&sdk.path().join("build-tools"), "zipalign").is_none());
    }
}
