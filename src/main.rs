//! Main entry point for the aligncheck CLI application.
//!
//! Resolves the run configuration, discovers artifacts, runs the batch and
//! maps the verdict onto the process exit status.

use anyhow::{Result, bail};
use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use aligncheck::advisory::GradleProjectSignals;
use aligncheck::analyzer::ArtifactKind;
use aligncheck::report::{ExitClass, console::ConsoleRenderer, json};
use aligncheck::{BatchRunner, Cli, RunConfig, discover};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(class) => class.into(),
        Err(err) => {
            eprintln!("aligncheck: {err:#}");
            ExitClass::CouldNotEvaluate.into()
        }
    }
}

/// Run one batch and report it.
///
/// Only environment-level problems (nothing to analyze, interrupted run,
/// unwritable report) surface as errors; per-artifact failures live in the
/// verdict.
async fn run(cli: &Cli) -> Result<ExitClass> {
    let config = Arc::new(RunConfig::from_cli(cli));

    let artifacts = discover::resolve_inputs(&cli.paths, &config.project_dir);
    if artifacts.is_empty() {
        bail!(
            "no .aab or .apk artifacts found under {}",
            config.project_dir.join("**/build/outputs").display()
        );
    }

    let has_bundles = artifacts
        .iter()
        .any(|p| ArtifactKind::from_path(p) == ArtifactKind::Bundle);
    if has_bundles && config.validate_bundles && config.java.is_none() {
        warn!("no Java runtime found; bundle validation will be skipped");
    }

    let runner = Arc::new(
        BatchRunner::new(Arc::clone(&config))
            .with_signal_provider(Arc::new(GradleProjectSignals::new(&config.project_dir))),
    );

    // Dropping the batch future aborts its tasks and closes every archive
    let verdict = tokio::select! {
        verdict = runner.run(artifacts) => verdict,
        _ = tokio::signal::ctrl_c() => bail!("interrupted"),
    };

    if let Some(path) = &cli.report {
        json::write_json(&verdict, path)?;
    }

    if cli.json {
        println!("{}", json::to_json(&verdict)?);
    } else if !cli.is_very_quiet() {
        let renderer = ConsoleRenderer {
            verbose: cli.verbose > 0,
            zipalign: config.zipalign.clone(),
        };
        let mut stdout = std::io::stdout().lock();
        renderer.render(&verdict, &mut stdout)?;
        stdout.flush()?;
    }

    Ok(ExitClass::from_verdict(&verdict))
}
