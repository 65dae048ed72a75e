use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aligncheck")]
#[command(version)]
#[command(about = "Check Android APK/AAB native libraries for 16 KB page alignment", long_about = None)]
#[command(after_help = "Examples:\n  \
  aligncheck app-release.apk              check one package\n  \
  aligncheck --json dist/                 check every .apk/.aab under dist/\n  \
  aligncheck -p ~/src/myapp               check the project's build outputs\n\n\
Exit status: 0 all compatible, 1 some incompatible, 2 could not evaluate")]
pub struct Cli {
    /// APK/AAB files or directories (default: build outputs under the project)
    #[arg(value_name = "ARTIFACT")]
    pub paths: Vec<PathBuf>,

    /// Project root for artifact discovery and build configuration checks
    #[arg(short = 'p', long, value_name = "DIR", default_value = ".")]
    pub project: PathBuf,

    /// Print the report as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON report to a file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Use this bundletool jar for bundle validation
    #[arg(long, value_name = "JAR")]
    pub bundletool: Option<PathBuf>,

    /// Do not validate bundles with bundletool
    #[arg(long)]
    pub skip_bundletool: bool,

    /// Never download bundletool
    #[arg(long)]
    pub no_download: bool,

    /// Do not inspect ELF load segment alignment
    #[arg(long)]
    pub no_elf: bool,

    /// Artifacts analyzed in parallel (default: available CPUs)
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// List every library; repeat for debug logging
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (-qq => no text report)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (q, _) if q > 0 => "error",
            (_, 0 | 1) => "warn",
            (_, 2) => "aligncheck=debug",
            _ => "aligncheck=trace",
        }
    }
}
