//! Snapshot view: activity budget of one selection at a point in time

use crate::aggregate::{aggregate, BehaviorMean};
use crate::deviation::{deviations, DeviationRow, SocialGroupPolicy};
use crate::error::ComputeError;
use crate::filter::FilterQuery;
use crate::table::{RecordTable, Subset};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Headline counts for a filtered subset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotKpis {
    /// Distinct calendar months
    pub months: usize,
    /// Distinct focal individuals
    pub focals: usize,
    /// Distinct behaviors
    pub behaviors: usize,
}

impl SnapshotKpis {
    pub fn of(subset: &Subset<'_>) -> Self {
        let months: HashSet<(i32, u32)> = subset.iter().map(|r| r.month()).collect();
        let focals: HashSet<&str> = subset.iter().map(|r| r.focal_name.as_str()).collect();
        let behaviors: HashSet<&str> = subset.iter().map(|r| r.behavior.as_str()).collect();
        Self {
            months: months.len(),
            focals: focals.len(),
            behaviors: behaviors.len(),
        }
    }
}

/// Everything the snapshot page shows for one selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub query: FilterQuery,
    pub kpis: SnapshotKpis,
    /// Behavior means, highest first
    pub distribution: Vec<BehaviorMean>,
    /// Largest single-row percentage in the subset (chart y-axis limit)
    pub y_max: Option<f64>,
    /// Present only for an individual selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviations: Option<Vec<DeviationRow>>,
    /// Why deviations are missing for an individual selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation_error: Option<String>,
}

impl Snapshot {
    /// No data for the selection
    pub fn is_empty(&self) -> bool {
        self.distribution.is_empty()
    }
}

/// Build the snapshot for `query`.
///
/// An incomplete selection (individual mode without an individual) or a
/// window with no rows yields an empty snapshot rather than an error. An
/// individual whose rows span several social groups under
/// `SocialGroupPolicy::Reject` keeps its distribution; only the deviations
/// are dropped and the reason lands in `deviation_error`.
pub fn build_snapshot(
    table: &RecordTable,
    query: &FilterQuery,
    policy: SocialGroupPolicy,
) -> Result<Snapshot, ComputeError> {
    let empty = Snapshot {
        query: query.clone(),
        kpis: SnapshotKpis::default(),
        distribution: Vec::new(),
        y_max: None,
        deviations: None,
        deviation_error: None,
    };
    if !query.mode.is_complete() {
        return Ok(empty);
    }

    let subset = query.apply(table);
    if subset.is_empty() {
        return Ok(empty);
    }

    // Chart order comes from the raw rows, highest percentage first
    let mut sorted: Vec<_> = subset.iter().collect();
    sorted.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    let order: Vec<String> = sorted.iter().map(|r| r.behavior.clone()).collect();
    let y_max = sorted.first().map(|r| r.percentage);

    let distribution = aggregate(&subset, Some(order.as_slice()));

    let mut deviation_error = None;
    let deviation_rows = match query.mode.selected_animal() {
        Some(animal) => match deviations(table, &subset, animal, policy) {
            Ok(rows) => Some(rows),
            Err(e @ ComputeError::MixedSocialGroups { .. }) => {
                warn!(animal, error = %e, "deviations skipped");
                deviation_error = Some(e.to_string());
                None
            }
            Err(e) => return Err(e),
        },
        None => None,
    };

    Ok(Snapshot {
        query: query.clone(),
        kpis: SnapshotKpis::of(&subset),
        distribution,
        y_max,
        deviations: deviation_rows,
        deviation_error,
    })
}
