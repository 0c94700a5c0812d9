pub mod derive;
pub mod domain;
pub mod merge;
pub mod parser;
pub mod score;
pub mod summary;

pub use derive::{DerivedMetricsEngine, TestingBaseline};
pub use domain::{
    CaseAttribute, ContainmentScore, Coordinate, Dataset, DatasetTotals, Datasource,
    DatasourceMaxima, DateLabel, GrowthWindow, LocationKey, LocationRecord, MetricBlock,
    TimeWindowedMetrics,
};
pub use merge::{AlignmentError, AlignmentMerger, MergedTables};
pub use parser::{ParseError, ParsedTable, TableParser};
pub use score::ContainmentScorer;

use crate::reference::ReferenceData;
use rayon::prelude::*;
use std::io::Read;
use tracing::{debug, info, warn};

/// Raw text of the three source tables for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTables {
    pub confirmed: String,
    pub recovered: String,
    pub deceased: String,
}

#[derive(Debug)]
pub enum IngestError {
    Parse(ParseError),
    Alignment(AlignmentError),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Parse(err) => write!(f, "failed to parse source table: {}", err),
            IngestError::Alignment(err) => write!(f, "source tables are misaligned: {}", err),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Parse(err) => Some(err),
            IngestError::Alignment(err) => Some(err),
        }
    }
}

impl From<ParseError> for IngestError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<AlignmentError> for IngestError {
    fn from(err: AlignmentError) -> Self {
        Self::Alignment(err)
    }
}

/// Runs parse, merge, derive, score and summarize over one set of tables.
pub struct DatasourceBuilder {
    provider: String,
}

impl DatasourceBuilder {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }

    pub fn build(
        &self,
        tables: &RawTables,
        reference: &dyn ReferenceData,
    ) -> Result<Datasource, IngestError> {
        self.build_from_readers(
            tables.confirmed.as_bytes(),
            tables.recovered.as_bytes(),
            tables.deceased.as_bytes(),
            reference,
        )
    }

    pub fn build_from_readers<C, R, D>(
        &self,
        confirmed: C,
        recovered: R,
        deceased: D,
        reference: &dyn ReferenceData,
    ) -> Result<Datasource, IngestError>
    where
        C: Read,
        R: Read,
        D: Read,
    {
        let confirmed = TableParser::new(CaseAttribute::Confirmed).parse(confirmed)?;
        let recovered = TableParser::new(CaseAttribute::Recovered).parse(recovered)?;
        let deceased = TableParser::new(CaseAttribute::Deceased).parse(deceased)?;
        debug!(
            dates = confirmed.dates.len(),
            confirmed_rows = confirmed.rows.len(),
            recovered_rows = recovered.rows.len(),
            deceased_rows = deceased.rows.len(),
            "source tables parsed"
        );

        let merged = AlignmentMerger::merge(&confirmed, &recovered, &deceased)?;
        Ok(self.assemble(merged, reference))
    }

    fn assemble(&self, merged: MergedTables, reference: &dyn ReferenceData) -> Datasource {
        let MergedTables {
            locations,
            mut datasets,
        } = merged;

        derive::apply_growth(&mut datasets);

        let baseline =
            TestingBaseline::compute(locations.iter().map(|(location, _)| location), reference);
        let missing_population = locations
            .iter()
            .filter(|(location, _)| reference.population(location).is_none())
            .count();
        match baseline {
            Some(baseline) => debug!(
                global_rate = baseline.global_rate,
                locations = baseline.locations,
                "testing baseline computed"
            ),
            None => warn!("no location has both testing and population data; projection skipped"),
        }
        if missing_population > 0 {
            warn!(
                missing_population,
                "locations without population data keep zero per-capita values"
            );
        }

        let engine = DerivedMetricsEngine::new(reference, baseline);
        let scorer = ContainmentScorer;
        datasets.par_iter_mut().for_each(|dataset| {
            engine.derive(dataset);
            scorer.apply(dataset);
            dataset.totals = summary::dataset_totals(dataset.records());
        });

        let maxima = DatasourceMaxima::fold(&datasets);
        info!(
            provider = %self.provider,
            datasets = datasets.len(),
            locations = locations.len(),
            absolute_max_value = maxima.absolute_max_value,
            ppm_max_value = maxima.ppm_max_value,
            "datasource built"
        );

        Datasource::new(self.provider.clone(), datasets, locations, maxima)
    }
}
