//! Loader for turning tabular text into a RecordTable
//!
//! The dataset arrives as CSV (the research team's export) or as JSON records
//! keyed by the same column names. This is the only place raw text is parsed;
//! a wrong column set fails here, before any analysis runs.

use crate::error::ComputeError;
use crate::table::record::{ObservationRecord, RecordTable, Sex, REQUIRED_COLUMNS};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Loader for observation tables
pub struct TableLoader;

impl TableLoader {
    /// Parse CSV text with a header row
    pub fn parse_csv(data: &str) -> Result<RecordTable, ComputeError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());

        let headers = reader.headers()?.clone();
        check_columns(headers.iter())?;

        let mut records = Vec::new();
        for (idx, row) in reader.deserialize::<RawRow>().enumerate() {
            let raw = row?;
            // header is line 1
            records.push(raw.into_record(idx + 2)?);
        }

        info!(rows = records.len(), "loaded observation table from CSV");
        Ok(RecordTable::new(records))
    }

    /// Parse a JSON array of records
    pub fn parse_array(json: &str) -> Result<RecordTable, ComputeError> {
        let rows: Vec<RawRow> = serde_json::from_str(json)?;
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(idx, raw)| raw.into_record(idx + 1))
            .collect::<Result<Vec<_>, _>>()?;

        info!(rows = records.len(), "loaded observation table from JSON");
        Ok(RecordTable::new(records))
    }

    /// Parse NDJSON (one record per line)
    pub fn parse_ndjson(ndjson: &str) -> Result<RecordTable, ComputeError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawRow>(trimmed) {
                Ok(raw) => records.push(raw.into_record(line_num + 1)?),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }

        info!(rows = records.len(), "loaded observation table from NDJSON");
        Ok(RecordTable::new(records))
    }
}

/// Row as it appears in the source file, before type resolution
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Focal Name")]
    focal_name: String,
    #[serde(rename = "Sex")]
    sex: String,
    #[serde(rename = "Social Group")]
    social_group: String,
    #[serde(rename = "Unified Behavior")]
    behavior: String,
    #[serde(rename = "Percentage")]
    percentage: f64,
}

impl RawRow {
    fn into_record(self, line: usize) -> Result<ObservationRecord, ComputeError> {
        let date = parse_date(&self.date)
            .map_err(|e| ComputeError::DateParseError(format!("line {}: {}", line, e)))?;
        let sex: Sex = self
            .sex
            .parse()
            .map_err(|_| ComputeError::InvalidSex(format!("line {}: {:?}", line, self.sex)))?;

        if !self.percentage.is_finite() {
            return Err(ComputeError::InvalidPercentage(format!(
                "line {}: {}",
                line, self.percentage
            )));
        }
        if !(0.0..=100.0).contains(&self.percentage) {
            warn!(
                line,
                percentage = self.percentage,
                "percentage outside 0-100, keeping as-is"
            );
        }

        Ok(ObservationRecord {
            date,
            focal_name: self.focal_name,
            sex,
            social_group: self.social_group,
            behavior: self.behavior,
            percentage: self.percentage,
        })
    }
}

fn check_columns<'a>(headers: impl Iterator<Item = &'a str>) -> Result<(), ComputeError> {
    let headers: Vec<&str> = headers.collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.contains(col))
        .collect();
    if !missing.is_empty() {
        return Err(ComputeError::MissingColumns(missing.join(", ")));
    }

    let extra: Vec<&str> = headers
        .iter()
        .copied()
        .filter(|h| !REQUIRED_COLUMNS.contains(h))
        .collect();
    if !extra.is_empty() {
        debug!(columns = ?extra, "ignoring extra columns");
    }
    Ok(())
}

/// Resolve a date cell to a calendar date.
///
/// Accepts `YYYY-MM`, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DDTHH:MM:SS` and RFC 3339 timestamps.
pub fn parse_date(value: &str) -> Result<NaiveDate, ComputeError> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }
    parse_month(value)
}

/// Parse `YYYY-MM` into the first day of that month
pub fn parse_month(value: &str) -> Result<NaiveDate, ComputeError> {
    let value = value.trim();
    let (year, month) = value
        .split_once('-')
        .ok_or_else(|| ComputeError::DateParseError(value.to_string()))?;

    let year: i32 = year
        .parse()
        .map_err(|_| ComputeError::DateParseError(value.to_string()))?;
    let month: u32 = month
        .parse()
        .map_err(|_| ComputeError::DateParseError(value.to_string()))?;

    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ComputeError::DateParseError(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_CSV: &str = "\
Date,Focal Name,Sex,Social Group,Unified Behavior,Percentage
2021-01,Bongo,Male,G1,Play,10
2021-02,Bongo,Male,G1,Play,20
2021-01-01,Kiki,Female,G2,Groom,35.5
";

    #[test]
    fn test_parse_csv() {
        let table = TableLoader::parse_csv(SAMPLE_CSV).unwrap();
        assert_eq!(table.len(), 3);

        let first = &table.records()[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(first.focal_name, "Bongo");
        assert_eq!(first.sex, Sex::Male);
        assert_eq!(first.percentage, 10.0);

        assert_eq!(table.records()[2].percentage, 35.5);
    }

    #[test]
    fn test_missing_columns_fail_fast() {
        let csv = "Date,Focal Name,Unified Behavior,Percentage\n2024-01,Chimp,Play,10\n";
        match TableLoader::parse_csv(csv) {
            Err(ComputeError::MissingColumns(cols)) => {
                assert_eq!(cols, "Sex, Social Group");
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_extra_columns_ignored() {
        let csv = "\
Observer,Date,Focal Name,Sex,Social Group,Unified Behavior,Percentage
Ana,2021-03,Bongo,M,G1,Rest,50
";
        let table = TableLoader::parse_csv(csv).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].behavior, "Rest");
    }

    #[test]
    fn test_invalid_sex() {
        let csv = "\
Date,Focal Name,Sex,Social Group,Unified Behavior,Percentage
2021-03,Bongo,Unknown,G1,Rest,50
";
        assert!(matches!(
            TableLoader::parse_csv(csv),
            Err(ComputeError::InvalidSex(_))
        ));
    }

    #[test]
    fn test_invalid_date_names_line() {
        let csv = "\
Date,Focal Name,Sex,Social Group,Unified Behavior,Percentage
2021-03,Bongo,Male,G1,Rest,50
March,Bongo,Male,G1,Rest,50
";
        match TableLoader::parse_csv(csv) {
            Err(ComputeError::DateParseError(msg)) => assert!(msg.starts_with("line 3")),
            other => panic!("expected DateParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_ndjson() {
        let ndjson = r#"
{"Date": "2021-01", "Focal Name": "Bongo", "Sex": "Male", "Social Group": "G1", "Unified Behavior": "Play", "Percentage": 10}

{"Date": "2021-02-01T00:00:00Z", "Focal Name": "Bongo", "Sex": "Male", "Social Group": "G1", "Unified Behavior": "Play", "Percentage": 20}
"#;
        let table = TableLoader::parse_ndjson(ndjson).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.records()[1].date,
            NaiveDate::from_ymd_opt(2021, 2, 1).unwrap()
        );
    }

    #[test]
    fn test_ndjson_error_names_line() {
        let ndjson = "{\"Date\": \"2021-01\"}\n";
        match TableLoader::parse_ndjson(ndjson) {
            Err(ComputeError::ParseError(msg)) => assert!(msg.contains("line 1")),
            other => panic!("expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_array() {
        let json = r#"[
            {"Date": "2021-01", "Focal Name": "Kiki", "Sex": "Female", "Social Group": "G2", "Unified Behavior": "Groom", "Percentage": 30}
        ]"#;
        let table = TableLoader::parse_array(json).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].sex, Sex::Female);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2021, 5, 1).unwrap();
        assert_eq!(parse_date("2021-05").unwrap(), expected);
        assert_eq!(parse_date("2021-05-01").unwrap(), expected);
        assert_eq!(parse_date("2021-05-01 00:00:00").unwrap(), expected);
        assert_eq!(parse_date("2021-05-01T12:30:00+02:00").unwrap(), expected);
        assert!(parse_date("2021-13").is_err());
        assert!(parse_date("not a date").is_err());
    }
}
