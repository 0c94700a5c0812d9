use super::domain::{ContainmentScore, Dataset, GrowthWindow, LocationRecord, TimeWindowedMetrics};

/// Weight of each window's relative growth; the most recent counts most.
const WINDOW_WEIGHTS: [(GrowthWindow, f64); 3] = [
    (GrowthWindow::OneDay, 0.5),
    (GrowthWindow::ThreeDays, 0.3),
    (GrowthWindow::SevenDays, 0.2),
];

/// Lower bound of each bucket, checked from worst score to best.
const SCORE_THRESHOLDS: [(f64, u8); 10] = [
    (1.0, 0),
    (0.5, 1),
    (0.2, 2),
    (0.1, 3),
    (0.05, 4),
    (0.02, 5),
    (0.01, 6),
    (0.005, 7),
    (0.002, 8),
    (0.001, 9),
];

/// Weighted relative growth of confirmed cases, or `None` when the location
/// has no confirmed cases yet.
pub fn relative_growth_index(metrics: &TimeWindowedMetrics) -> Option<f64> {
    let confirmed = metrics.current.confirmed;
    if confirmed == 0.0 {
        return None;
    }

    Some(
        WINDOW_WEIGHTS
            .iter()
            .map(|(window, weight)| weight * metrics.growth(*window).confirmed / confirmed)
            .sum::<f64>(),
    )
}

/// Flat and shrinking growth both land in the best bucket.
pub fn score_for_index(index: f64) -> ContainmentScore {
    SCORE_THRESHOLDS
        .iter()
        .find(|(threshold, _)| index >= *threshold)
        .and_then(|(_, score)| ContainmentScore::new(*score))
        .unwrap_or(ContainmentScore::BEST)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContainmentScorer;

impl ContainmentScorer {
    pub fn score(&self, record: &LocationRecord) -> Option<ContainmentScore> {
        relative_growth_index(&record.absolute).map(score_for_index)
    }

    pub fn apply(&self, dataset: &mut Dataset) {
        for record in &mut dataset.records {
            record.containment_score = self.score(record);
        }
    }
}
