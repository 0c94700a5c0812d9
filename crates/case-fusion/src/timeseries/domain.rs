use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Key identifying a geographic entity, `"{subregion}, {region}"` or `"{region}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LocationKey(String);

impl LocationKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_parts(subregion: &str, region: &str) -> Self {
        let subregion = subregion.trim();
        let region = region.trim();
        if subregion.is_empty() {
            Self(region.to_string())
        } else {
            Self(format!("{subregion}, {region}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocationKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseAttribute {
    Confirmed,
    Recovered,
    Deceased,
    Active,
}

impl CaseAttribute {
    /// Attributes that arrive from a source table; `Active` is always derived.
    pub const SOURCED: [Self; 3] = [Self::Confirmed, Self::Recovered, Self::Deceased];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Recovered => "recovered",
            Self::Deceased => "deceased",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for CaseAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrowthWindow {
    OneDay,
    ThreeDays,
    SevenDays,
}

impl GrowthWindow {
    pub const ALL: [Self; 3] = [Self::OneDay, Self::ThreeDays, Self::SevenDays];

    pub const fn days(self) -> usize {
        match self {
            Self::OneDay => 1,
            Self::ThreeDays => 3,
            Self::SevenDays => 7,
        }
    }
}

/// One measurement of every case-count attribute for a single time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricBlock {
    pub confirmed: f64,
    pub recovered: f64,
    pub deceased: f64,
    pub active: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_projected: Option<f64>,
}

impl MetricBlock {
    pub fn get(&self, attribute: CaseAttribute) -> f64 {
        match attribute {
            CaseAttribute::Confirmed => self.confirmed,
            CaseAttribute::Recovered => self.recovered,
            CaseAttribute::Deceased => self.deceased,
            CaseAttribute::Active => self.active,
        }
    }

    pub fn set(&mut self, attribute: CaseAttribute, value: f64) {
        match attribute {
            CaseAttribute::Confirmed => self.confirmed = value,
            CaseAttribute::Recovered => self.recovered = value,
            CaseAttribute::Deceased => self.deceased = value,
            CaseAttribute::Active => self.active = value,
        }
    }

    /// Projected confirmed count, falling back to the observed count when no
    /// projection exists for the location.
    pub fn projected_or_confirmed(&self) -> f64 {
        self.confirmed_projected.unwrap_or(self.confirmed)
    }

    pub(crate) fn derive_active(&mut self) {
        self.active = self.confirmed - self.recovered - self.deceased;
    }

    /// Change of the sourced attributes since `earlier`.
    pub(crate) fn since(&self, earlier: &MetricBlock) -> MetricBlock {
        let mut delta = MetricBlock::default();
        for attribute in CaseAttribute::SOURCED {
            delta.set(attribute, self.get(attribute) - earlier.get(attribute));
        }
        delta
    }

    pub(crate) fn map(&self, transform: impl Fn(f64) -> f64) -> MetricBlock {
        MetricBlock {
            confirmed: transform(self.confirmed),
            recovered: transform(self.recovered),
            deceased: transform(self.deceased),
            active: transform(self.active),
            confirmed_projected: self.confirmed_projected.map(&transform),
        }
    }
}

/// Cumulative values plus trailing growth over the 1, 3 and 7 day windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindowedMetrics {
    pub current: MetricBlock,
    pub growth_last_1_day: MetricBlock,
    pub growth_last_3_days: MetricBlock,
    pub growth_last_7_days: MetricBlock,
}

impl TimeWindowedMetrics {
    pub fn growth(&self, window: GrowthWindow) -> &MetricBlock {
        match window {
            GrowthWindow::OneDay => &self.growth_last_1_day,
            GrowthWindow::ThreeDays => &self.growth_last_3_days,
            GrowthWindow::SevenDays => &self.growth_last_7_days,
        }
    }

    pub fn growth_mut(&mut self, window: GrowthWindow) -> &mut MetricBlock {
        match window {
            GrowthWindow::OneDay => &mut self.growth_last_1_day,
            GrowthWindow::ThreeDays => &mut self.growth_last_3_days,
            GrowthWindow::SevenDays => &mut self.growth_last_7_days,
        }
    }

    pub fn blocks(&self) -> [&MetricBlock; 4] {
        [
            &self.current,
            &self.growth_last_1_day,
            &self.growth_last_3_days,
            &self.growth_last_7_days,
        ]
    }

    pub fn blocks_mut(&mut self) -> [&mut MetricBlock; 4] {
        let Self {
            current,
            growth_last_1_day,
            growth_last_3_days,
            growth_last_7_days,
        } = self;
        [
            current,
            growth_last_1_day,
            growth_last_3_days,
            growth_last_7_days,
        ]
    }

    pub(crate) fn map(&self, transform: impl Fn(f64) -> f64) -> TimeWindowedMetrics {
        TimeWindowedMetrics {
            current: self.current.map(&transform),
            growth_last_1_day: self.growth_last_1_day.map(&transform),
            growth_last_3_days: self.growth_last_3_days.map(&transform),
            growth_last_7_days: self.growth_last_7_days.map(&transform),
        }
    }
}

/// Discrete containment indicator, 0 (worst) to 10 (best).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ContainmentScore(u8);

impl ContainmentScore {
    pub const WORST: Self = Self(0);
    pub const BEST: Self = Self(10);

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::BEST.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ContainmentScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/10", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    #[serde(skip)]
    pub location: LocationKey,
    pub absolute: TimeWindowedMetrics,
    pub ppm: TimeWindowedMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containment_score: Option<ContainmentScore>,
}

impl LocationRecord {
    pub fn new(location: LocationKey) -> Self {
        Self {
            location,
            absolute: TimeWindowedMetrics::default(),
            ppm: TimeWindowedMetrics::default(),
            containment_score: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetTotals {
    pub total_confirmed: f64,
    pub total_recovered: f64,
    pub total_deceased: f64,
    pub total_active: f64,
    pub total_confirmed_projected: f64,
}

/// Header label of a date column, with the calendar date when it parses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateLabel {
    pub label: String,
    pub date: Option<NaiveDate>,
}

impl DateLabel {
    pub fn parse(raw: &str) -> Self {
        let label = raw.trim().to_string();
        let date = parse_column_date(&label);
        Self { label, date }
    }
}

impl fmt::Display for DateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

fn parse_column_date(value: &str) -> Option<NaiveDate> {
    if value.is_empty() {
        return None;
    }

    // JHU headers look like `1/22/20`.
    if let Ok(date) = NaiveDate::parse_from_str(value, "%m/%d/%y") {
        return Some(date);
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }

    None
}

/// Snapshot of every location for one date column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub date: DateLabel,
    #[serde(rename = "data", serialize_with = "serialize_records")]
    pub(crate) records: Vec<LocationRecord>,
    #[serde(flatten)]
    pub totals: DatasetTotals,
}

impl Dataset {
    pub fn new(date: DateLabel) -> Self {
        Self {
            date,
            records: Vec::new(),
            totals: DatasetTotals::default(),
        }
    }

    /// Records in location insertion order.
    pub fn records(&self) -> &[LocationRecord] {
        &self.records
    }

    pub fn find(&self, location: &LocationKey) -> Option<&LocationRecord> {
        self.records
            .iter()
            .find(|record| &record.location == location)
    }
}

fn serialize_records<S>(records: &[LocationRecord], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(records.len()))?;
    for record in records {
        map.serialize_entry(&record.location, record)?;
    }
    map.end()
}

fn serialize_locations<S>(
    locations: &[(LocationKey, Coordinate)],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(locations.len()))?;
    for (location, coordinate) in locations {
        map.serialize_entry(location, coordinate)?;
    }
    map.end()
}

/// Largest confirmed values observed across every dataset, for display scaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceMaxima {
    pub absolute_max_value: f64,
    pub ppm_max_value: f64,
}

/// Result of one ingestion run: every dated snapshot plus location geometry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Datasource {
    pub provider: String,
    pub datasets: Vec<Dataset>,
    #[serde(serialize_with = "serialize_locations")]
    locations: Vec<(LocationKey, Coordinate)>,
    #[serde(flatten)]
    pub maxima: DatasourceMaxima,
    #[serde(skip)]
    location_index: HashMap<LocationKey, usize>,
}

impl Datasource {
    pub(crate) fn new(
        provider: String,
        datasets: Vec<Dataset>,
        locations: Vec<(LocationKey, Coordinate)>,
        maxima: DatasourceMaxima,
    ) -> Self {
        let location_index = locations
            .iter()
            .enumerate()
            .map(|(position, (location, _))| (location.clone(), position))
            .collect();

        Self {
            provider,
            datasets,
            locations,
            maxima,
            location_index,
        }
    }

    pub fn dataset(&self, index: usize) -> Option<&Dataset> {
        self.datasets.get(index)
    }

    pub fn latest(&self) -> Option<&Dataset> {
        self.datasets.last()
    }

    pub fn locations(&self) -> &[(LocationKey, Coordinate)] {
        &self.locations
    }

    pub fn coordinate(&self, location: &LocationKey) -> Option<Coordinate> {
        self.location_index
            .get(location)
            .map(|position| self.locations[*position].1)
    }

    /// Record of `location` in the dataset at `index`.
    pub fn record(&self, index: usize, location: &LocationKey) -> Option<&LocationRecord> {
        let position = *self.location_index.get(location)?;
        self.datasets.get(index)?.records.get(position)
    }

    /// Every dated record for `location`, oldest first.
    pub fn history<'a>(
        &'a self,
        location: &LocationKey,
    ) -> Option<impl Iterator<Item = (&'a DateLabel, &'a LocationRecord)> + 'a> {
        let position = *self.location_index.get(location)?;
        Some(
            self.datasets
                .iter()
                .filter_map(move |dataset| {
                    dataset.records.get(position).map(|record| (&dataset.date, record))
                }),
        )
    }

    pub fn absolute_max_value(&self) -> f64 {
        self.maxima.absolute_max_value
    }

    pub fn ppm_max_value(&self) -> f64 {
        self.maxima.ppm_max_value
    }
}
