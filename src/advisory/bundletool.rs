//! Bundle validation through Google's bundletool.
//!
//! The jar is acquired once per run: an explicitly configured path, a copy in
//! the cache directory, or a fresh download. Downloads land in a temporary
//! file that is only renamed into place once complete, so an interrupted
//! download never leaves a corrupt jar behind.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::env::RunConfig;
use crate::error::CollaboratorError;
use anyhow::{Context, bail};

pub const BUNDLETOOL_VERSION: &str = "1.17.2";

const TOOL: &str = "bundletool";

/// Outcome of one `bundletool validate` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleValidation {
    pub passed: bool,
    pub exit_code: Option<i32>,
    pub output: String,
}

/// Structural validation of a bundle by an external tool.
#[async_trait]
pub trait BundleValidator: Send + Sync {
    async fn validate(&self, bundle: &Path) -> Result<BundleValidation, CollaboratorError>;
}

/// `java -jar bundletool.jar validate --bundle=<path>`
#[derive(Debug, Clone)]
pub struct Bundletool {
    java: PathBuf,
    jar: PathBuf,
}

impl Bundletool {
    pub fn new(java: PathBuf, jar: PathBuf) -> Self {
        Self { java, jar }
    }

    pub fn jar(&self) -> &Path {
        &self.jar
    }

    /// Locate or download the jar and pair it with the Java runtime.
    pub async fn acquire(config: &RunConfig) -> Result<Self, CollaboratorError> {
        let java = config
            .java
            .clone()
            .ok_or_else(|| CollaboratorError::unavailable("java", "no Java runtime found"))?;

        if let Some(jar) = &config.bundletool_jar {
            if !jar.is_file() {
                return Err(CollaboratorError::unavailable(
                    TOOL,
                    format!("{} does not exist", jar.display()),
                ));
            }
            return Ok(Self::new(java, jar.clone()));
        }

        let cache_dir = config
            .cache_dir
            .clone()
            .ok_or_else(|| CollaboratorError::unavailable(TOOL, "no cache directory"))?;
        let jar = cache_dir.join(format!("bundletool-all-{BUNDLETOOL_VERSION}.jar"));
        if jar.is_file() {
            debug!(jar = %jar.display(), "using cached bundletool");
            return Ok(Self::new(java, jar));
        }

        if !config.download_bundletool {
            return Err(CollaboratorError::unavailable(
                TOOL,
                "not cached and downloads are disabled",
            ));
        }

        info!(version = BUNDLETOOL_VERSION, "downloading bundletool");
        download(&download_url(), &jar)
            .await
            .map_err(|source| CollaboratorError::Download { tool: TOOL, source })?;
        Ok(Self::new(java, jar))
    }
}

#[async_trait]
impl BundleValidator for Bundletool {
    async fn validate(&self, bundle: &Path) -> Result<BundleValidation, CollaboratorError> {
        let output = Command::new(&self.java)
            .arg("-jar")
            .arg(&self.jar)
            .arg("validate")
            .arg(format!("--bundle={}", bundle.display()))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CollaboratorError::Io { tool: TOOL, source })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(BundleValidation {
            passed: output.status.success(),
            exit_code: output.status.code(),
            output: text.trim().to_string(),
        })
    }
}

pub fn download_url() -> String {
    format!(
        "https://github.com/google/bundletool/releases/download/{v}/bundletool-all-{v}.jar",
        v = BUNDLETOOL_VERSION
    )
}

async fn download(url: &str, dest: &Path) -> anyhow::Result<()> {
    let dir = dest.parent().context("download destination has no parent")?;
    tokio::fs::create_dir_all(dir).await?;

    let client = Client::builder().timeout(Duration::from_secs(300)).build()?;
    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        bail!("HTTP request failed with status: {}", resp.status());
    }
    let bytes = resp.bytes().await?;
    if !bytes.starts_with(b"PK\x03\x04") {
        bail!("downloaded file is not a jar");
    }

    // Dropping the temp file on any error path deletes it
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    tokio::fs::write(tmp.path(), &bytes).await?;
    tmp.persist(dest)?;
    debug!(dest = %dest.display(), bytes = bytes.len(), "bundletool saved");
    Ok(())
}
