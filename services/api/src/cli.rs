use crate::commands::{run_build, run_report, BuildArgs, ReportArgs};
use crate::server;
use case_fusion::config::IngestConfig;
use case_fusion::error::AppError;
use case_fusion::sources::SourceLocation;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "case-fusion",
    about = "Fuse case time series into a per-date datasource and serve it over HTTP",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run one ingestion and write the datasource as JSON
    Build(BuildArgs),
    /// Run one ingestion and print totals and the highest-scoring locations
    Report(ReportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[command(flatten)]
    pub(crate) sources: SourceArgs,
}

/// Per-invocation overrides for the configured ingestion inputs.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct SourceArgs {
    /// Confirmed cases table (URL or file path)
    #[arg(long)]
    pub(crate) confirmed: Option<String>,
    /// Recovered cases table (URL or file path)
    #[arg(long)]
    pub(crate) recovered: Option<String>,
    /// Deceased cases table (URL or file path)
    #[arg(long)]
    pub(crate) deceased: Option<String>,
    /// Population reference CSV
    #[arg(long)]
    pub(crate) population: Option<PathBuf>,
    /// Tests-performed reference CSV
    #[arg(long)]
    pub(crate) testing: Option<PathBuf>,
    /// Upper bound for one ingestion run, in seconds
    #[arg(long)]
    pub(crate) timeout_secs: Option<u64>,
}

impl SourceArgs {
    pub(crate) fn apply(self, config: &mut IngestConfig) {
        if let Some(raw) = self.confirmed {
            config.sources.confirmed = SourceLocation::parse(&raw);
        }
        if let Some(raw) = self.recovered {
            config.sources.recovered = SourceLocation::parse(&raw);
        }
        if let Some(raw) = self.deceased {
            config.sources.deceased = SourceLocation::parse(&raw);
        }
        if let Some(path) = self.population {
            config.population_csv = Some(path);
        }
        if let Some(path) = self.testing {
            config.testing_csv = Some(path);
        }
        if let Some(secs) = self.timeout_secs.filter(|secs| *secs > 0) {
            config.timeout = Duration::from_secs(secs);
        }
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Build(args) => run_build(args).await,
        Command::Report(args) => run_report(args).await,
    }
}
