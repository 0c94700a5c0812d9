use super::domain::{Dataset, GrowthWindow, LocationKey, LocationRecord};
use crate::reference::ReferenceData;

pub const PER_MILLION: f64 = 1_000_000.0;

pub fn per_million(value: f64, population: f64) -> f64 {
    PER_MILLION * value / population
}

/// Fills the absolute growth blocks of every dataset from the `current`
/// values of earlier datasets. Windows reaching before the first column stay
/// at zero.
pub fn apply_growth(datasets: &mut [Dataset]) {
    for index in 1..datasets.len() {
        let (earlier, rest) = datasets.split_at_mut(index);
        let dataset = &mut rest[0];

        for window in GrowthWindow::ALL {
            let days = window.days();
            if index < days {
                continue;
            }

            let baseline = &earlier[index - days];
            for (record, previous) in dataset.records.iter_mut().zip(&baseline.records) {
                *record.absolute.growth_mut(window) =
                    record.absolute.current.since(&previous.absolute.current);
            }
        }
    }
}

/// Global testing rate used to rescale each location's confirmed count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestingBaseline {
    /// Mean tests performed divided by mean population.
    pub global_rate: f64,
    /// Locations that contributed both a testing and a population figure.
    pub locations: usize,
}

impl TestingBaseline {
    pub fn compute<'a, I>(locations: I, reference: &dyn ReferenceData) -> Option<Self>
    where
        I: IntoIterator<Item = &'a LocationKey>,
    {
        let mut tests_sum = 0.0;
        let mut population_sum = 0.0;
        let mut count = 0usize;

        for location in locations {
            if let Some((tests, population)) = testing_profile(reference, location) {
                tests_sum += tests;
                population_sum += population;
                count += 1;
            }
        }

        if count == 0 {
            return None;
        }

        let mean_tests = tests_sum / count as f64;
        let mean_population = population_sum / count as f64;
        Some(Self {
            global_rate: mean_tests / mean_population,
            locations: count,
        })
    }

    /// Factor bringing `location` to the global testing rate, when both its
    /// figures are known.
    pub fn scale_for(&self, reference: &dyn ReferenceData, location: &LocationKey) -> Option<f64> {
        let (tests, population) = testing_profile(reference, location)?;
        let local_rate = tests / population;
        Some(self.global_rate / local_rate)
    }
}

fn testing_profile(reference: &dyn ReferenceData, location: &LocationKey) -> Option<(f64, f64)> {
    let tests = reference
        .tests_performed(location)
        .filter(|value| *value > 0.0)?;
    let population = reference
        .population(location)
        .filter(|value| *value > 0.0)?;
    Some((tests, population))
}

/// Per-date derivation of per-capita, active and projected values.
pub struct DerivedMetricsEngine<'a> {
    reference: &'a dyn ReferenceData,
    baseline: Option<TestingBaseline>,
}

impl<'a> DerivedMetricsEngine<'a> {
    pub fn new(reference: &'a dyn ReferenceData, baseline: Option<TestingBaseline>) -> Self {
        Self {
            reference,
            baseline,
        }
    }

    /// Expects growth to be populated already.
    pub fn derive(&self, dataset: &mut Dataset) {
        for record in &mut dataset.records {
            self.apply_per_capita(record);
            apply_active(record);
            self.apply_projection(record);
        }
    }

    fn apply_per_capita(&self, record: &mut LocationRecord) {
        if let Some(population) = self
            .reference
            .population(&record.location)
            .filter(|value| *value > 0.0)
        {
            record.ppm = record
                .absolute
                .map(|value| per_million(value, population));
        }
    }

    fn apply_projection(&self, record: &mut LocationRecord) {
        let Some(baseline) = self.baseline else {
            return;
        };
        let Some(scale) = baseline.scale_for(self.reference, &record.location) else {
            return;
        };

        for block in record
            .absolute
            .blocks_mut()
            .into_iter()
            .chain(record.ppm.blocks_mut())
        {
            block.confirmed_projected = Some(block.confirmed * scale);
        }
    }
}

pub fn apply_active(record: &mut LocationRecord) {
    for block in record
        .absolute
        .blocks_mut()
        .into_iter()
        .chain(record.ppm.blocks_mut())
    {
        block.derive_active();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceTables;
    use crate::timeseries::domain::{CaseAttribute, DateLabel};

    fn series(values: &[(f64, f64, f64)]) -> Vec<Dataset> {
        values
            .iter()
            .enumerate()
            .map(|(index, (confirmed, recovered, deceased))| {
                let mut dataset = Dataset::new(DateLabel::parse(&format!("day {index}")));
                let mut record = LocationRecord::new(LocationKey::from("Italy"));
                record.absolute.current.set(CaseAttribute::Confirmed, *confirmed);
                record.absolute.current.set(CaseAttribute::Recovered, *recovered);
                record.absolute.current.set(CaseAttribute::Deceased, *deceased);
                dataset.records.push(record);
                dataset
            })
            .collect()
    }

    #[test]
    fn growth_windows_are_zero_before_enough_history() {
        let mut datasets = series(&[
            (1.0, 0.0, 0.0),
            (2.0, 0.0, 0.0),
            (4.0, 1.0, 0.0),
            (8.0, 1.0, 1.0),
            (16.0, 2.0, 1.0),
            (32.0, 3.0, 1.0),
            (64.0, 5.0, 2.0),
            (128.0, 8.0, 3.0),
        ]);
        apply_growth(&mut datasets);

        for (index, dataset) in datasets.iter().enumerate() {
            let metrics = &dataset.records()[0].absolute;
            for window in GrowthWindow::ALL {
                if index < window.days() {
                    assert_eq!(
                        *metrics.growth(window),
                        Default::default(),
                        "window {window:?} at column {index} must be zero"
                    );
                }
            }
        }

        let last = &datasets[7].records()[0].absolute;
        assert_eq!(last.growth_last_1_day.confirmed, 64.0);
        assert_eq!(last.growth_last_3_days.confirmed, 112.0);
        assert_eq!(last.growth_last_7_days.confirmed, 127.0);
        assert_eq!(last.growth_last_7_days.recovered, 8.0);
        assert_eq!(last.growth_last_3_days.deceased, 2.0);
    }

    #[test]
    fn per_capita_and_active_follow_population() {
        let reference = ReferenceTables::new().with_population("Italy", 2_000_000.0);
        let mut datasets = series(&[(10.0, 2.0, 1.0), (30.0, 4.0, 2.0)]);
        apply_growth(&mut datasets);

        let engine = DerivedMetricsEngine::new(&reference, None);
        for dataset in &mut datasets {
            engine.derive(dataset);
        }

        let record = &datasets[1].records()[0];
        assert_eq!(record.absolute.current.active, 24.0);
        assert_eq!(record.absolute.growth_last_1_day.active, 17.0);
        assert_eq!(record.ppm.current.confirmed, per_million(30.0, 2_000_000.0));
        assert_eq!(record.ppm.growth_last_1_day.confirmed, per_million(20.0, 2_000_000.0));
        assert_eq!(
            record.ppm.current.active,
            record.ppm.current.confirmed - record.ppm.current.recovered - record.ppm.current.deceased
        );
        assert!(record.absolute.current.confirmed_projected.is_none());
    }

    #[test]
    fn per_capita_stays_zero_without_population() {
        let reference = ReferenceTables::new();
        let mut datasets = series(&[(10.0, 2.0, 1.0)]);
        let engine = DerivedMetricsEngine::new(&reference, None);
        engine.derive(&mut datasets[0]);

        let record = &datasets[0].records()[0];
        assert_eq!(record.ppm, Default::default());
        assert_eq!(record.absolute.current.active, 7.0);
    }

    #[test]
    fn baseline_is_ratio_of_means() {
        let reference = ReferenceTables::new()
            .with_population("A", 1_000.0)
            .with_tests("A", 100.0)
            .with_population("B", 3_000.0)
            .with_tests("B", 900.0)
            .with_population("C", 5_000.0);
        let locations = [
            LocationKey::from("A"),
            LocationKey::from("B"),
            LocationKey::from("C"),
        ];

        let baseline = TestingBaseline::compute(&locations, &reference).expect("baseline exists");
        assert_eq!(baseline.locations, 2);
        assert_eq!(baseline.global_rate, (1_000.0 / 2.0) / (4_000.0 / 2.0));
        assert!(baseline.scale_for(&reference, &locations[2]).is_none());
    }

    #[test]
    fn baseline_requires_at_least_one_complete_location() {
        let reference = ReferenceTables::new().with_tests("A", 10.0);
        let locations = [LocationKey::from("A")];
        assert!(TestingBaseline::compute(&locations, &reference).is_none());
    }

    #[test]
    fn projection_scales_absolute_and_ppm_independently() {
        let reference = ReferenceTables::new()
            .with_population("Italy", 1_000_000.0)
            .with_tests("Italy", 10_000.0);
        let baseline = TestingBaseline {
            global_rate: 0.02,
            locations: 1,
        };
        let mut datasets = series(&[(50.0, 0.0, 0.0), (80.0, 0.0, 0.0)]);
        apply_growth(&mut datasets);

        let engine = DerivedMetricsEngine::new(&reference, Some(baseline));
        for dataset in &mut datasets {
            engine.derive(dataset);
        }

        let scale = 0.02 / (10_000.0 / 1_000_000.0);
        let record = &datasets[1].records()[0];
        assert_eq!(record.absolute.current.confirmed_projected, Some(80.0 * scale));
        assert_eq!(
            record.absolute.growth_last_1_day.confirmed_projected,
            Some(30.0 * scale)
        );
        assert_eq!(
            record.ppm.current.confirmed_projected,
            Some(record.ppm.current.confirmed * scale)
        );
        assert_eq!(
            record.absolute.growth_last_7_days.confirmed_projected,
            Some(0.0)
        );
    }
}
