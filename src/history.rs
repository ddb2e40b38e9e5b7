//! Behavior history extraction
//!
//! Longitudinal series of one behavior, either for a single focal individual
//! (raw rows) or averaged per period across a sex/social-group selection.

use crate::aggregate::MeanAccumulator;
use crate::filter::matches_sex_and_group;
use crate::table::{RecordTable, Sex};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One point of a behavior series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Percentage")]
    pub percentage: f64,
}

impl HistoryPoint {
    pub fn new(date: NaiveDate, percentage: f64) -> Self {
        Self { date, percentage }
    }
}

/// Every row of (`animal`, `behavior`), oldest first.
///
/// Rows sharing a date are kept as separate points, in table order.
pub fn history_for_individual(table: &RecordTable, animal: &str, behavior: &str) -> Vec<HistoryPoint> {
    let mut points: Vec<HistoryPoint> = table
        .iter()
        .filter(|r| r.focal_name == animal && r.behavior == behavior)
        .map(|r| HistoryPoint::new(r.date, r.percentage))
        .collect();
    // stable: duplicates keep table order
    points.sort_by_key(|p| p.date);

    debug!(animal, behavior, points = points.len(), "extracted individual history");
    points
}

/// Mean percentage of `behavior` per date across the selected sexes/groups,
/// oldest first. `None` for either set means no restriction.
pub fn history_for_filter(
    table: &RecordTable,
    sexes: Option<&BTreeSet<Sex>>,
    groups: Option<&BTreeSet<String>>,
    behavior: &str,
) -> Vec<HistoryPoint> {
    let mut by_date: BTreeMap<NaiveDate, MeanAccumulator> = BTreeMap::new();
    for record in table
        .iter()
        .filter(|r| r.behavior == behavior && matches_sex_and_group(r, sexes, groups))
    {
        by_date.entry(record.date).or_default().push(record.percentage);
    }

    let points: Vec<HistoryPoint> = by_date
        .into_iter()
        .filter_map(|(date, acc)| acc.mean().map(|m| HistoryPoint::new(date, m)))
        .collect();

    debug!(behavior, points = points.len(), "extracted filtered history");
    points
}

/// Direction of the most recent change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increased,
    Decreased,
}

/// Change between the last two points of a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub previous: HistoryPoint,
    pub latest: HistoryPoint,
    /// latest − previous
    pub delta: f64,
    pub direction: TrendDirection,
}

/// Trend of the last two points; `None` with fewer than two
pub fn trend(series: &[HistoryPoint]) -> Option<Trend> {
    let [.., previous, latest] = series else {
        return None;
    };
    let delta = latest.percentage - previous.percentage;
    let direction = if delta >= 0.0 {
        TrendDirection::Increased
    } else {
        TrendDirection::Decreased
    };
    Some(Trend {
        previous: *previous,
        latest: *latest,
        delta,
        direction,
    })
}
