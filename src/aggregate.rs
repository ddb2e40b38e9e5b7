//! Aggregation of observation rows into per-behavior means
//!
//! This is the activity budget: the mean share of observed time for each
//! behavior over an arbitrary subset of rows.

use crate::table::ObservationRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Mean percentage of one behavior over a subset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorMean {
    #[serde(rename = "Unified Behavior")]
    pub behavior: String,
    /// `None` when the behavior is part of the requested category domain but
    /// has no rows in the subset
    #[serde(rename = "Percentage")]
    pub percentage: Option<f64>,
}

/// Running sum/count for an arithmetic mean
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    pub(crate) fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub(crate) fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.sum / self.count as f64)
    }
}

/// Mean percentage per behavior, keyed by behavior label
pub fn mean_by_behavior<'a, I>(rows: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a ObservationRecord>,
{
    let mut acc: BTreeMap<&'a str, MeanAccumulator> = BTreeMap::new();
    for record in rows {
        acc.entry(record.behavior.as_str())
            .or_default()
            .push(record.percentage);
    }
    acc.into_iter()
        .filter_map(|(behavior, a)| a.mean().map(|m| (behavior.to_string(), m)))
        .collect()
}

/// Aggregate a subset into behavior means, highest first.
///
/// Without `order`, every behavior present in the subset gets a row; ties are
/// broken by behavior label. With `order`, the deduplicated list (first
/// occurrence wins) is the category domain: listed behaviors with no rows come
/// back with `percentage: None` and sort last, behaviors outside the list are
/// left out, and ties keep the list order.
pub fn aggregate<'a, I>(rows: I, order: Option<&[String]>) -> Vec<BehaviorMean>
where
    I: IntoIterator<Item = &'a ObservationRecord>,
{
    let means = mean_by_behavior(rows);

    let mut result: Vec<BehaviorMean> = match order {
        None => means
            .into_iter()
            .map(|(behavior, mean)| BehaviorMean {
                behavior,
                percentage: Some(mean),
            })
            .collect(),
        Some(order) => dedup_order(order)
            .into_iter()
            .map(|behavior| BehaviorMean {
                percentage: means.get(behavior).copied(),
                behavior: behavior.to_string(),
            })
            .collect(),
    };

    result.sort_by(|a, b| descending_defined_first(a.percentage, b.percentage));
    debug!(behaviors = result.len(), "aggregated behavior means");
    result
}

/// Collapse duplicate labels, keeping the first occurrence
pub fn dedup_order(order: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    order
        .iter()
        .map(String::as_str)
        .filter(|b| seen.insert(*b))
        .collect()
}

/// Behavior labels of an aggregate, in row order
pub fn behavior_order(aggregate: &[BehaviorMean]) -> Vec<String> {
    aggregate.iter().map(|row| row.behavior.clone()).collect()
}

/// Largest defined mean in an aggregate
pub fn max_mean(aggregate: &[BehaviorMean]) -> Option<f64> {
    aggregate
        .iter()
        .filter_map(|row| row.percentage)
        .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

/// Look up means by behavior
pub fn as_lookup(aggregate: &[BehaviorMean]) -> HashMap<&str, f64> {
    aggregate
        .iter()
        .filter_map(|row| row.percentage.map(|p| (row.behavior.as_str(), p)))
        .collect()
}

fn descending_defined_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
