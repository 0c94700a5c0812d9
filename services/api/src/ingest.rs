use case_fusion::config::IngestConfig;
use case_fusion::error::AppError;
use case_fusion::reference::ReferenceTables;
use case_fusion::sources::SourceFetcher;
use case_fusion::timeseries::{Datasource, DatasourceBuilder, RawTables};
use std::time::Instant;
use tracing::info;

/// One full ingestion run: fetch all three tables, load reference data and
/// build a new datasource, bounded by the configured timeout.
pub(crate) async fn ingest(
    config: &IngestConfig,
    fetcher: &SourceFetcher,
) -> Result<Datasource, AppError> {
    let started = Instant::now();
    let run = async {
        let tables = fetcher.fetch_all(&config.sources).await?;
        build(tables, config).await
    };

    let datasource = tokio::time::timeout(config.timeout, run)
        .await
        .map_err(|_| AppError::Timeout(config.timeout))??;

    info!(
        provider = %datasource.provider,
        datasets = datasource.datasets.len(),
        locations = datasource.locations().len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "ingestion finished"
    );
    Ok(datasource)
}

/// Reference loading and the build run on the blocking pool so the timeout
/// can fire while they are still working.
async fn build(tables: RawTables, config: &IngestConfig) -> Result<Datasource, AppError> {
    let provider = config.provider.clone();
    let population_csv = config.population_csv.clone();
    let testing_csv = config.testing_csv.clone();

    tokio::task::spawn_blocking(move || {
        let reference =
            ReferenceTables::load(population_csv.as_deref(), testing_csv.as_deref())?;
        let datasource = DatasourceBuilder::new(provider).build(&tables, &reference)?;
        Ok::<_, AppError>(datasource)
    })
    .await?
}
