//! Batch analysis.
//!
//! Artifacts are analyzed on a bounded set of tasks, one archive handle per
//! task. Reports are stored by input position, so the verdict lists them in
//! the order they were given regardless of completion order. Dropping the
//! future returned by [`BatchRunner::run`] aborts every in-flight task and
//! closes their archives.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::advisory::{
    AdvisoryOutcome, AdvisorySignalProvider, BuildSignals, BundleValidation, BundleValidator,
    Bundletool,
};
use crate::analyzer::{AnalyzerOptions, ArtifactKind, ArtifactReport, BatchVerdict, Stage};
use crate::env::RunConfig;
use crate::error::AnalysisError;

type SharedValidator = Result<Arc<dyn BundleValidator>, String>;

pub struct BatchRunner {
    config: Arc<RunConfig>,
    validator: OnceCell<SharedValidator>,
    signals: Option<Arc<dyn AdvisorySignalProvider>>,
}

impl BatchRunner {
    pub fn new(config: Arc<RunConfig>) -> Self {
        Self {
            config,
            validator: OnceCell::new(),
            signals: None,
        }
    }

    /// Use this validator instead of acquiring bundletool.
    pub fn with_validator(self, validator: Arc<dyn BundleValidator>) -> Self {
        Self {
            validator: OnceCell::new_with(Some(Ok(validator))),
            ..self
        }
    }

    pub fn with_signal_provider(self, provider: Arc<dyn AdvisorySignalProvider>) -> Self {
        Self {
            signals: Some(provider),
            ..self
        }
    }

    /// Analyze every artifact and fold the reports into one verdict.
    pub async fn run(self: Arc<Self>, artifacts: Vec<PathBuf>) -> BatchVerdict {
        info!(artifacts = artifacts.len(), jobs = self.config.jobs, "starting batch");

        let build_signals = self.build_signals().await;
        let options = AnalyzerOptions {
            probe_elf: self.config.probe_elf,
        };
        let permits = Arc::new(Semaphore::new(self.config.jobs.max(1)));
        let mut slots: Vec<Option<ArtifactReport>> = vec![None; artifacts.len()];
        let mut tasks = JoinSet::new();

        for (index, path) in artifacts.iter().cloned().enumerate() {
            let runner = Arc::clone(&self);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                let mut report = crate::analyzer::analyze_artifact(&path, &options).await;
                if report.artifact_kind == ArtifactKind::Bundle && !report.is_failed() {
                    report.bundle_validation = Some(runner.validate_bundle(&path).await);
                }
                (index, report)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(err) => warn!(%err, "analysis task ended abnormally"),
            }
        }

        let reports = slots
            .into_iter()
            .zip(artifacts)
            .map(|(slot, path)| {
                slot.unwrap_or_else(|| {
                    let err = AnalysisError::unreadable(&path, "analysis task aborted");
                    ArtifactReport::failed(&path, ArtifactKind::from_path(&path), Stage::Scanning, &err)
                })
            })
            .collect();

        let verdict = BatchVerdict::new(reports, build_signals);
        info!(overall_compatible = verdict.overall_compatible, "batch finished");
        verdict
    }

    async fn build_signals(&self) -> AdvisoryOutcome<BuildSignals> {
        let Some(provider) = self.signals.clone() else {
            return AdvisoryOutcome::skipped("build configuration check disabled");
        };
        match tokio::task::spawn_blocking(move || provider.signals()).await {
            Ok(result) => AdvisoryOutcome::from_result(result),
            Err(err) => AdvisoryOutcome::skipped(format!("build configuration check failed: {err}")),
        }
    }

    async fn validate_bundle(&self, path: &std::path::Path) -> AdvisoryOutcome<BundleValidation> {
        if !self.config.validate_bundles {
            return AdvisoryOutcome::skipped("bundle validation disabled");
        }

        let validator = self
            .validator
            .get_or_init(|| async {
                Bundletool::acquire(&self.config)
                    .await
                    .map(|tool| Arc::new(tool) as Arc<dyn BundleValidator>)
                    .map_err(|err| {
                        warn!(%err, "bundle validation unavailable for this run");
                        err.to_string()
                    })
            })
            .await;

        match validator {
            Ok(validator) => AdvisoryOutcome::from_result(validator.validate(path).await),
            Err(reason) => AdvisoryOutcome::skipped(reason.clone()),
        }
    }
}
