//! Observation record definitions
//!
//! One row of the ethogram dataset records the share of observed time a focal
//! individual spent on a unified behavior during one month. The record table
//! is immutable once loaded; every analysis borrows it and produces subset
//! views or owned derived tables.

use crate::error::ComputeError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

/// Columns every loaded table must carry
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "Date",
    "Focal Name",
    "Sex",
    "Social Group",
    "Unified Behavior",
    "Percentage",
];

/// Sex of the focal individual
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::Male, Sex::Female];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            _ => Err(ComputeError::InvalidSex(s.to_string())),
        }
    }
}

/// A single monthly observation of one behavior for one focal individual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Observation period (month granularity; day is usually the 1st)
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    /// Focal individual identifier
    #[serde(rename = "Focal Name")]
    pub focal_name: String,
    #[serde(rename = "Sex")]
    pub sex: Sex,
    #[serde(rename = "Social Group")]
    pub social_group: String,
    /// Normalized behavior category
    #[serde(rename = "Unified Behavior")]
    pub behavior: String,
    /// Share of observed time, 0-100
    #[serde(rename = "Percentage")]
    pub percentage: f64,
}

impl ObservationRecord {
    pub fn new(
        date: NaiveDate,
        focal_name: impl Into<String>,
        sex: Sex,
        social_group: impl Into<String>,
        behavior: impl Into<String>,
        percentage: f64,
    ) -> Self {
        Self {
            date,
            focal_name: focal_name.into(),
            sex,
            social_group: social_group.into(),
            behavior: behavior.into(),
            percentage,
        }
    }

    /// (year, month) of the observation period
    pub fn month(&self) -> (i32, u32) {
        (self.date.year(), self.date.month())
    }
}

/// The loaded ethogram dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordTable {
    records: Vec<ObservationRecord>,
}

impl RecordTable {
    pub fn new(records: Vec<ObservationRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ObservationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ObservationRecord> {
        self.records.iter()
    }

    /// Borrow every row as a subset view
    pub fn view(&self) -> Subset<'_> {
        Subset::from_rows(self.records.iter().collect())
    }

    /// Distinct behaviors sorted lexicographically
    pub fn distinct_behaviors(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.behavior.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Distinct behaviors in order of first appearance
    pub fn behaviors_by_appearance(&self) -> Vec<&str> {
        unique_in_order(self.records.iter().map(|r| r.behavior.as_str()))
    }

    /// Distinct focal individuals in order of first appearance
    pub fn individuals(&self) -> Vec<&str> {
        unique_in_order(self.records.iter().map(|r| r.focal_name.as_str()))
    }

    /// Distinct social groups in order of first appearance
    pub fn social_groups(&self) -> Vec<&str> {
        unique_in_order(self.records.iter().map(|r| r.social_group.as_str()))
    }

    pub fn contains_individual(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.focal_name == name)
    }

    /// Earliest and latest observation date
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.records.iter().map(|r| r.date).min()?;
        let max = self.records.iter().map(|r| r.date).max()?;
        Some((min, max))
    }

    /// Social groups each individual was observed in, across all time
    pub fn groups_by_individual(&self) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut groups: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for record in &self.records {
            groups
                .entry(record.focal_name.as_str())
                .or_default()
                .insert(record.social_group.as_str());
        }
        groups
    }
}

impl FromIterator<ObservationRecord> for RecordTable {
    fn from_iter<I: IntoIterator<Item = ObservationRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RecordTable {
    type Item = &'a ObservationRecord;
    type IntoIter = std::slice::Iter<'a, ObservationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Borrowed view over a selection of table rows, in table order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Subset<'a> {
    rows: Vec<&'a ObservationRecord>,
}

impl<'a> Subset<'a> {
    pub fn from_rows(rows: Vec<&'a ObservationRecord>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[&'a ObservationRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, &'a ObservationRecord>> {
        self.rows.iter().copied()
    }

    pub fn first(&self) -> Option<&'a ObservationRecord> {
        self.rows.first().copied()
    }

    /// Copy the selected rows into an owned table (for export)
    pub fn to_table(&self) -> RecordTable {
        self.rows.iter().map(|r| (*r).clone()).collect()
    }
}

impl<'s, 'a> IntoIterator for &'s Subset<'a> {
    type Item = &'a ObservationRecord;
    type IntoIter = std::iter::Copied<std::slice::Iter<'s, &'a ObservationRecord>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter().copied()
    }
}

fn unique_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    values.filter(|v| seen.insert(*v)).collect()
}
