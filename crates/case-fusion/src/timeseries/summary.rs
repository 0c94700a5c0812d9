use super::domain::{Dataset, DatasetTotals, DatasourceMaxima, LocationRecord};

/// Sums the absolute `current` block of every record. A projection never
/// lowers a location's contribution to the projected total.
pub fn dataset_totals(records: &[LocationRecord]) -> DatasetTotals {
    records
        .iter()
        .fold(DatasetTotals::default(), |totals, record| {
            let current = &record.absolute.current;
            DatasetTotals {
                total_confirmed: totals.total_confirmed + current.confirmed,
                total_recovered: totals.total_recovered + current.recovered,
                total_deceased: totals.total_deceased + current.deceased,
                total_active: totals.total_active + current.active,
                total_confirmed_projected: totals.total_confirmed_projected
                    + current.confirmed.max(current.projected_or_confirmed()),
            }
        })
}

impl DatasourceMaxima {
    pub fn fold(datasets: &[Dataset]) -> Self {
        datasets
            .iter()
            .flat_map(|dataset| dataset.records())
            .fold(Self::default(), Self::observe)
    }

    fn observe(self, record: &LocationRecord) -> Self {
        let absolute = &record.absolute.current;
        let ppm = &record.ppm.current;
        Self {
            absolute_max_value: self
                .absolute_max_value
                .max(absolute.confirmed)
                .max(absolute.projected_or_confirmed()),
            ppm_max_value: self
                .ppm_max_value
                .max(ppm.confirmed)
                .max(ppm.projected_or_confirmed()),
        }
    }
}
