use super::domain::{CaseAttribute, Coordinate, DateLabel, LocationKey};
use csv::ByteRecord;
use std::borrow::Cow;
use std::io::Read;

/// Columns preceding the first date: subregion, region, latitude, longitude.
pub const LEADING_COLUMNS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("{attribute} source is malformed: no header row")]
    MalformedSource { attribute: CaseAttribute },
    /// The underlying reader failed; cell contents never produce this.
    #[error("failed to read {attribute} source: {source}")]
    Csv {
        attribute: CaseAttribute,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub location: LocationKey,
    pub coordinate: Coordinate,
    /// One value per date column, zero-filled where the source cell is
    /// missing or not a number.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub attribute: CaseAttribute,
    pub dates: Vec<DateLabel>,
    pub rows: Vec<ParsedRow>,
}

#[derive(Debug, Clone, Copy)]
pub struct TableParser {
    attribute: CaseAttribute,
}

impl TableParser {
    pub fn new(attribute: CaseAttribute) -> Self {
        Self { attribute }
    }

    pub fn parse<R: Read>(&self, reader: R) -> Result<ParsedTable, ParseError> {
        let attribute = self.attribute;
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = csv_reader.byte_records();

        let header = match records.next() {
            Some(record) => record.map_err(|source| ParseError::Csv { attribute, source })?,
            None => return Err(ParseError::MalformedSource { attribute }),
        };
        if header.is_empty() {
            return Err(ParseError::MalformedSource { attribute });
        }

        let dates: Vec<DateLabel> = header
            .iter()
            .skip(LEADING_COLUMNS)
            .map(|label| DateLabel::parse(&String::from_utf8_lossy(label)))
            .collect();

        let mut rows = Vec::new();
        for record in records {
            let record = record.map_err(|source| ParseError::Csv { attribute, source })?;
            let location = LocationKey::from_parts(&text_field(&record, 0), &text_field(&record, 1));
            let coordinate = Coordinate {
                latitude: parse_cell(numeric_field(&record, 2)),
                longitude: parse_cell(numeric_field(&record, 3)),
            };
            let values = (0..dates.len())
                .map(|column| parse_cell(numeric_field(&record, LEADING_COLUMNS + column)))
                .collect();

            rows.push(ParsedRow {
                location,
                coordinate,
                values,
            });
        }

        Ok(ParsedTable {
            attribute,
            dates,
            rows,
        })
    }
}

fn text_field(record: &ByteRecord, index: usize) -> Cow<'_, str> {
    record
        .get(index)
        .map(String::from_utf8_lossy)
        .unwrap_or(Cow::Borrowed(""))
}

/// A cell that is not valid UTF-8 reads as missing.
fn numeric_field(record: &ByteRecord, index: usize) -> Option<&str> {
    record
        .get(index)
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
}

/// Reads a numeric cell, failing closed to zero.
pub(crate) fn parse_cell(cell: Option<&str>) -> f64 {
    cell.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CONFIRMED: &str = "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20\n\
Hubei,China,30.97,112.27,444,444,549\n\
,Italy,41.87,12.56,0,2,\n";

    #[test]
    fn parses_dates_locations_and_values() {
        let table = TableParser::new(CaseAttribute::Confirmed)
            .parse(Cursor::new(CONFIRMED))
            .expect("table parses");

        assert_eq!(table.attribute, CaseAttribute::Confirmed);
        let labels: Vec<&str> = table.dates.iter().map(|date| date.label.as_str()).collect();
        assert_eq!(labels, vec!["1/22/20", "1/23/20", "1/24/20"]);

        assert_eq!(table.rows.len(), 2);
        let hubei = &table.rows[0];
        assert_eq!(hubei.location.as_str(), "Hubei, China");
        assert_eq!(hubei.coordinate.latitude, 30.97);
        assert_eq!(hubei.coordinate.longitude, 112.27);
        assert_eq!(hubei.values, vec![444.0, 444.0, 549.0]);

        let italy = &table.rows[1];
        assert_eq!(italy.location.as_str(), "Italy");
        assert_eq!(italy.values, vec![0.0, 2.0, 0.0]);
    }

    #[test]
    fn bad_cells_fail_closed_to_zero() {
        let csv = "a,b,c,d,1/22/20,1/23/20,1/24/20\n,France,x,,n/a,7,NaN\n,Spain,1,2,5\n";
        let table = TableParser::new(CaseAttribute::Deceased)
            .parse(csv.as_bytes())
            .expect("table parses");

        let france = &table.rows[0];
        assert_eq!(france.values, vec![0.0, 7.0, 0.0]);
        assert_eq!(france.coordinate, Coordinate::default());

        let spain = &table.rows[1];
        assert_eq!(spain.values, vec![5.0, 0.0, 0.0], "short rows are zero padded");
    }

    #[test]
    fn invalid_utf8_cells_fail_closed_to_zero() {
        let csv: &[u8] = b"a,b,c,d,1/22/20,1/23/20\n,Alpha,1,2,10,\xFF\xFE\nX\xFFY,Beta,\xFF,4,3,5\n";
        let table = TableParser::new(CaseAttribute::Confirmed)
            .parse(csv)
            .expect("invalid utf-8 never aborts the parse");

        assert_eq!(table.rows[0].values, vec![10.0, 0.0]);

        let beta = &table.rows[1];
        assert_eq!(beta.location.as_str(), "X\u{FFFD}Y, Beta");
        assert_eq!(beta.coordinate.latitude, 0.0);
        assert_eq!(beta.coordinate.longitude, 4.0);
        assert_eq!(beta.values, vec![3.0, 5.0]);
    }

    #[test]
    fn cells_beyond_the_header_are_ignored() {
        let csv = "a,b,c,d,1/22/20\n,Chile,0,0,3,99,100\n";
        let table = TableParser::new(CaseAttribute::Recovered)
            .parse(csv.as_bytes())
            .expect("table parses");
        assert_eq!(table.rows[0].values, vec![3.0]);
    }

    #[test]
    fn empty_source_is_malformed() {
        let error = TableParser::new(CaseAttribute::Recovered)
            .parse("".as_bytes())
            .expect_err("missing header must fail");

        match error {
            ParseError::MalformedSource { attribute } => {
                assert_eq!(attribute, CaseAttribute::Recovered)
            }
            other => panic!("expected malformed source, got {other:?}"),
        }
    }

    #[test]
    fn header_without_dates_yields_empty_table() {
        let table = TableParser::new(CaseAttribute::Confirmed)
            .parse("Province/State,Country/Region,Lat,Long\n,Peru,0,0\n".as_bytes())
            .expect("table parses");
        assert!(table.dates.is_empty());
        assert_eq!(table.rows.len(), 1);
        assert!(table.rows[0].values.is_empty());
    }

    #[test]
    fn parse_cell_handles_whitespace_and_missing() {
        assert_eq!(parse_cell(Some(" 12 ")), 12.0);
        assert_eq!(parse_cell(Some("")), 0.0);
        assert_eq!(parse_cell(Some("inf")), 0.0);
        assert_eq!(parse_cell(None), 0.0);
    }
}
