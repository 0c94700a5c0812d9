use super::domain::{CaseAttribute, Coordinate, Dataset, DateLabel, LocationKey, LocationRecord};
use super::parser::ParsedTable;
use std::collections::{HashMap, HashSet};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlignmentError {
    #[error("expected a {expected} table but received {found}")]
    UnexpectedAttribute {
        expected: CaseAttribute,
        found: CaseAttribute,
    },
    #[error("{attribute} source has {found} date columns, confirmed source has {expected}")]
    ColumnCount {
        attribute: CaseAttribute,
        expected: usize,
        found: usize,
    },
    #[error(
        "{attribute} source date column {index} is '{found}', confirmed source has '{expected}'"
    )]
    DateLabel {
        attribute: CaseAttribute,
        index: usize,
        expected: String,
        found: String,
    },
}

/// Dated snapshots holding only the sourced `current` values.
#[derive(Debug, Clone)]
pub struct MergedTables {
    pub locations: Vec<(LocationKey, Coordinate)>,
    pub datasets: Vec<Dataset>,
}

/// Fuses the confirmed, recovered and deceased parses into one dataset per
/// date column. Every dataset receives a record for every location in the
/// same position, so record `p` names the same location on every date.
pub struct AlignmentMerger {
    positions: HashMap<LocationKey, usize>,
    locations: Vec<(LocationKey, Coordinate)>,
    datasets: Vec<Dataset>,
}

impl AlignmentMerger {
    pub fn new(dates: &[DateLabel]) -> Self {
        Self {
            positions: HashMap::new(),
            locations: Vec::new(),
            datasets: dates.iter().cloned().map(Dataset::new).collect(),
        }
    }

    pub fn merge(
        confirmed: &ParsedTable,
        recovered: &ParsedTable,
        deceased: &ParsedTable,
    ) -> Result<MergedTables, AlignmentError> {
        expect_attribute(confirmed, CaseAttribute::Confirmed)?;
        expect_attribute(recovered, CaseAttribute::Recovered)?;
        expect_attribute(deceased, CaseAttribute::Deceased)?;
        validate_alignment(confirmed, recovered)?;
        validate_alignment(confirmed, deceased)?;

        let mut merger = Self::new(&confirmed.dates);
        for table in [confirmed, recovered, deceased] {
            merger.absorb(table);
        }

        Ok(merger.finish())
    }

    /// Writes the table's values into the `current` block of each record,
    /// leaving the other attributes untouched.
    pub fn absorb(&mut self, table: &ParsedTable) {
        let attribute = table.attribute;
        let mut seen = HashSet::new();

        for row in &table.rows {
            let position = self.position_for(&row.location, row.coordinate);
            if !seen.insert(position) {
                warn!(%attribute, location = %row.location, "duplicate location row; later row wins");
            }

            for (dataset, value) in self.datasets.iter_mut().zip(&row.values) {
                dataset.records[position]
                    .absolute
                    .current
                    .set(attribute, *value);
            }
        }
    }

    pub fn finish(self) -> MergedTables {
        MergedTables {
            locations: self.locations,
            datasets: self.datasets,
        }
    }

    fn position_for(&mut self, location: &LocationKey, coordinate: Coordinate) -> usize {
        if let Some(position) = self.positions.get(location) {
            return *position;
        }

        let position = self.locations.len();
        self.positions.insert(location.clone(), position);
        self.locations.push((location.clone(), coordinate));
        for dataset in &mut self.datasets {
            dataset.records.push(LocationRecord::new(location.clone()));
        }
        position
    }
}

fn expect_attribute(table: &ParsedTable, expected: CaseAttribute) -> Result<(), AlignmentError> {
    if table.attribute == expected {
        Ok(())
    } else {
        Err(AlignmentError::UnexpectedAttribute {
            expected,
            found: table.attribute,
        })
    }
}

fn validate_alignment(reference: &ParsedTable, other: &ParsedTable) -> Result<(), AlignmentError> {
    if reference.dates.len() != other.dates.len() {
        return Err(AlignmentError::ColumnCount {
            attribute: other.attribute,
            expected: reference.dates.len(),
            found: other.dates.len(),
        });
    }

    let mismatch = reference
        .dates
        .iter()
        .zip(&other.dates)
        .enumerate()
        .find(|(_, (expected, found))| expected.label != found.label);

    match mismatch {
        Some((index, (expected, found))) => Err(AlignmentError::DateLabel {
            attribute: other.attribute,
            index,
            expected: expected.label.clone(),
            found: found.label.clone(),
        }),
        None => Ok(()),
    }
}
