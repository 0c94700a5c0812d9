use crate::cli::SourceArgs;
use crate::ingest::ingest;
use case_fusion::config::AppConfig;
use case_fusion::error::AppError;
use case_fusion::sources::SourceFetcher;
use case_fusion::telemetry;
use case_fusion::timeseries::{Dataset, Datasource};
use clap::Args;
use std::cmp::Ordering;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct BuildArgs {
    #[command(flatten)]
    pub(crate) sources: SourceArgs,
    /// Write the datasource JSON to this file instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Pretty-print the JSON output
    #[arg(long)]
    pub(crate) pretty: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    #[command(flatten)]
    pub(crate) sources: SourceArgs,
    /// Dataset index to report on (defaults to the latest date)
    #[arg(long)]
    pub(crate) date: Option<usize>,
    /// Number of locations to list, ordered by confirmed cases
    #[arg(long, default_value_t = 10)]
    pub(crate) top: usize,
}

async fn load_datasource(sources: SourceArgs) -> Result<Datasource, AppError> {
    let mut config = AppConfig::load()?;
    sources.apply(&mut config.ingest);
    telemetry::init(&config.telemetry)?;

    ingest(&config.ingest, &SourceFetcher::new()).await
}

pub(crate) async fn run_build(args: BuildArgs) -> Result<(), AppError> {
    let datasource = load_datasource(args.sources).await?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&datasource)?
    } else {
        serde_json::to_string(&datasource)?
    };

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, json).await?;
            info!(path = %path.display(), "datasource written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub(crate) async fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let datasource = load_datasource(args.sources).await?;
    print!("{}", render_report(&datasource, args.date, args.top));
    Ok(())
}

fn selected_dataset(datasource: &Datasource, index: Option<usize>) -> Option<&Dataset> {
    match index {
        Some(index) => datasource.dataset(index),
        None => datasource.latest(),
    }
}

pub(crate) fn render_report(datasource: &Datasource, index: Option<usize>, top: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Case fusion report: {}", datasource.provider);
    let _ = writeln!(
        out,
        "Dates: {}  Locations: {}",
        datasource.datasets.len(),
        datasource.locations().len()
    );
    let _ = writeln!(
        out,
        "Max confirmed (absolute): {:.0}  Max confirmed (per million): {:.2}",
        datasource.absolute_max_value(),
        datasource.ppm_max_value()
    );

    let Some(dataset) = selected_dataset(datasource, index) else {
        let _ = writeln!(
            out,
            "\nNo dataset at index {} ({} dates available)",
            index.unwrap_or_default(),
            datasource.datasets.len()
        );
        return out;
    };

    let totals = &dataset.totals;
    let _ = writeln!(out, "\nTotals for {}", dataset.date.label);
    let _ = writeln!(out, "  Confirmed: {:.0}", totals.total_confirmed);
    let _ = writeln!(out, "  Recovered: {:.0}", totals.total_recovered);
    let _ = writeln!(out, "  Deceased:  {:.0}", totals.total_deceased);
    let _ = writeln!(out, "  Active:    {:.0}", totals.total_active);
    let _ = writeln!(
        out,
        "  Confirmed incl. projection: {:.0}",
        totals.total_confirmed_projected
    );

    let mut ranked: Vec<_> = dataset
        .records()
        .iter()
        .filter(|record| record.absolute.current.confirmed > 0.0)
        .collect();
    ranked.sort_by(|a, b| {
        b.absolute
            .current
            .confirmed
            .partial_cmp(&a.absolute.current.confirmed)
            .unwrap_or(Ordering::Equal)
    });

    if ranked.is_empty() {
        let _ = writeln!(out, "\nNo location has confirmed cases");
        return out;
    }

    let _ = writeln!(out, "\nTop locations");
    for record in ranked.into_iter().take(top) {
        let current = &record.absolute.current;
        let score = record
            .containment_score
            .map(|score| score.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "- {}: confirmed {:.0}, active {:.0}, +{:.0} last day, per million {:.2}, containment {}",
            record.location,
            current.confirmed,
            current.active,
            record.absolute.growth_last_1_day.confirmed,
            record.ppm.current.confirmed,
            score
        );
    }
    out
}
