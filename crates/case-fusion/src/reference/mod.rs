//! Auxiliary per-location figures consumed by the derivation stage.
//!
//! Both lookups are owned by an external collaborator. A location missing from
//! either table is an expected state: per-capita values stay at zero and no
//! projected confirmed count is produced for it.

use crate::timeseries::LocationKey;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub trait ReferenceData: Send + Sync {
    fn population(&self, location: &LocationKey) -> Option<f64>;
    fn tests_performed(&self, location: &LocationKey) -> Option<f64>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("failed to read reference table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid reference CSV data: {0}")]
    Csv(#[from] csv::Error),
}

/// CSV-backed population and tests-performed lookups.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    population: HashMap<LocationKey, f64>,
    tests: HashMap<LocationKey, f64>,
}

impl ReferenceTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(
        population_csv: Option<&Path>,
        testing_csv: Option<&Path>,
    ) -> Result<Self, ReferenceError> {
        let mut tables = Self::new();

        if let Some(path) = population_csv {
            let file = open(path)?;
            let loaded = tables.read_population(file)?;
            debug!(path = %path.display(), loaded, "population table loaded");
        }

        if let Some(path) = testing_csv {
            let file = open(path)?;
            let loaded = tables.read_tests(file)?;
            debug!(path = %path.display(), loaded, "testing table loaded");
        }

        Ok(tables)
    }

    /// Reads `location,population` rows, returning how many were accepted.
    pub fn read_population<R: Read>(&mut self, reader: R) -> Result<usize, ReferenceError> {
        read_into(reader, &mut self.population, "population")
    }

    /// Reads `location,tests` rows, returning how many were accepted.
    pub fn read_tests<R: Read>(&mut self, reader: R) -> Result<usize, ReferenceError> {
        read_into(reader, &mut self.tests, "tests")
    }

    pub fn with_population(mut self, location: impl Into<LocationKey>, population: f64) -> Self {
        self.population.insert(location.into(), population);
        self
    }

    pub fn with_tests(mut self, location: impl Into<LocationKey>, tests: f64) -> Self {
        self.tests.insert(location.into(), tests);
        self
    }

    pub fn population_len(&self) -> usize {
        self.population.len()
    }

    pub fn tests_len(&self) -> usize {
        self.tests.len()
    }
}

impl ReferenceData for ReferenceTables {
    fn population(&self, location: &LocationKey) -> Option<f64> {
        self.population.get(location).copied()
    }

    fn tests_performed(&self, location: &LocationKey) -> Option<f64> {
        self.tests.get(location).copied()
    }
}

fn open(path: &Path) -> Result<std::fs::File, ReferenceError> {
    std::fs::File::open(path).map_err(|source| ReferenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct ReferenceRow {
    location: String,
    #[serde(
        alias = "population",
        alias = "tests",
        default,
        deserialize_with = "lenient_number"
    )]
    value: Option<f64>,
}

fn read_into<R: Read>(
    reader: R,
    target: &mut HashMap<LocationKey, f64>,
    kind: &'static str,
) -> Result<usize, ReferenceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut accepted = 0;
    let mut skipped = 0;

    for row in csv_reader.deserialize::<ReferenceRow>() {
        let row = row?;
        match row.value.filter(|value| *value > 0.0) {
            Some(value) => {
                target.insert(LocationKey::new(row.location), value);
                accepted += 1;
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(kind, skipped, "reference rows without a positive value were skipped");
    }

    Ok(accepted)
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt
        .and_then(|value| value.trim().replace('_', "").parse::<f64>().ok())
        .filter(|value| value.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_population_and_tests_tables() {
        let mut tables = ReferenceTables::new();
        let population = tables
            .read_population(Cursor::new(
                "location,population\nItaly,60461826\n\"Hubei, China\",58500000\n",
            ))
            .expect("population parses");
        let tests = tables
            .read_tests(Cursor::new("location,tests\nItaly,1000\n"))
            .expect("tests parse");

        assert_eq!(population, 2);
        assert_eq!(tests, 1);
        assert_eq!(
            tables.population(&LocationKey::from("Hubei, China")),
            Some(58_500_000.0)
        );
        assert_eq!(tables.tests_performed(&LocationKey::from("Italy")), Some(1000.0));
        assert!(tables.tests_performed(&LocationKey::from("Spain")).is_none());
    }

    #[test]
    fn skips_blank_zero_and_unparsable_values() {
        let mut tables = ReferenceTables::new();
        let accepted = tables
            .read_population(Cursor::new(
                "location,population\nA,\nB,0\nC,lots\nD,-5\nE,1_000\n",
            ))
            .expect("population parses");

        assert_eq!(accepted, 1);
        assert_eq!(tables.population(&LocationKey::from("E")), Some(1000.0));
        assert!(tables.population(&LocationKey::from("B")).is_none());
    }

    #[test]
    fn load_without_paths_is_empty() {
        let tables = ReferenceTables::load(None, None).expect("empty load succeeds");
        assert_eq!(tables.population_len(), 0);
        assert_eq!(tables.tests_len(), 0);
    }

    #[test]
    fn load_reports_missing_files() {
        let error = ReferenceTables::load(Some(Path::new("./does-not-exist.csv")), None)
            .expect_err("expected io error");
        match error {
            ReferenceError::Io { path, .. } => {
                assert_eq!(path, PathBuf::from("./does-not-exist.csv"))
            }
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
