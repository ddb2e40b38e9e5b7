//! Deviation analysis
//!
//! Compares one individual's activity budget in a selected window against
//! three baselines: the individual's own all-time mean, the all-time mean of
//! its social group, and the all-time mean of the whole population. A positive
//! deviation means the behavior was performed more than the baseline.

use crate::aggregate::mean_by_behavior;
use crate::error::ComputeError;
use crate::table::{RecordTable, Subset};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// How to resolve an individual whose filtered rows span several social groups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialGroupPolicy {
    /// Fail with `ComputeError::MixedSocialGroups`
    #[default]
    Reject,
    /// Log a warning and use the group of the first filtered row
    FirstRow,
}

/// One behavior's selected-window mean and its three deviations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationRow {
    #[serde(rename = "Unified Behavior")]
    pub behavior: String,
    /// Mean in the selected window
    #[serde(rename = "Percentage")]
    pub percentage: f64,
    /// Against the individual's all-time mean
    #[serde(rename = "Individual")]
    pub individual: f64,
    /// Against the social group's all-time mean
    #[serde(rename = "Group")]
    pub group: f64,
    /// Against the population's all-time mean
    #[serde(rename = "All")]
    pub all: f64,
}

/// Compute deviation rows for `individual`.
///
/// `filtered` must be non-empty and hold only rows of `individual`. Every
/// behavior in `full` gets a row; behaviors missing from a baseline count as 0.
/// Rows are sorted by selected-window percentage, highest first.
pub fn deviations(
    full: &RecordTable,
    filtered: &Subset<'_>,
    individual: &str,
    policy: SocialGroupPolicy,
) -> Result<Vec<DeviationRow>, ComputeError> {
    if !full.contains_individual(individual) {
        return Err(ComputeError::UnknownIndividual(individual.to_string()));
    }
    let first = filtered
        .first()
        .ok_or_else(|| ComputeError::EmptySubset(format!("no rows for {}", individual)))?;

    if let Some(foreign) = filtered.iter().find(|r| r.focal_name != individual) {
        return Err(ComputeError::ForeignRecords {
            expected: individual.to_string(),
            found: foreign.focal_name.clone(),
        });
    }

    let groups: BTreeSet<&str> = filtered.iter().map(|r| r.social_group.as_str()).collect();
    if groups.len() > 1 {
        let listed = groups.iter().copied().collect::<Vec<_>>().join(", ");
        match policy {
            SocialGroupPolicy::Reject => {
                return Err(ComputeError::MixedSocialGroups {
                    individual: individual.to_string(),
                    groups: listed,
                });
            }
            SocialGroupPolicy::FirstRow => {
                warn!(
                    individual,
                    groups = %listed,
                    using = %first.social_group,
                    "individual changed social group within window"
                );
            }
        }
    }
    let social_group = first.social_group.as_str();

    let all_mean = mean_by_behavior(full);
    let group_mean = mean_by_behavior(full.iter().filter(|r| r.social_group == social_group));
    let historical = mean_by_behavior(full.iter().filter(|r| r.focal_name == individual));
    let selected = mean_by_behavior(filtered);

    let mut rows: Vec<DeviationRow> = full
        .behaviors_by_appearance()
        .into_iter()
        .map(|behavior| {
            let current = filled(&selected, behavior);
            DeviationRow {
                behavior: behavior.to_string(),
                percentage: current,
                individual: finite_or_zero(current - filled(&historical, behavior)),
                group: finite_or_zero(current - filled(&group_mean, behavior)),
                all: finite_or_zero(current - filled(&all_mean, behavior)),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.percentage
            .partial_cmp(&a.percentage)
            .unwrap_or(Ordering::Equal)
    });

    debug!(
        individual,
        social_group,
        behaviors = rows.len(),
        "computed deviations"
    );
    Ok(rows)
}

fn filled(means: &BTreeMap<String, f64>, behavior: &str) -> f64 {
    means.get(behavior).copied().map_or(0.0, finite_or_zero)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterMode, FilterQuery, MonthWindow};
    use crate::table::{ObservationRecord, Sex};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn rec(month: u32, name: &str, group: &str, behavior: &str, pct: f64) -> ObservationRecord {
        ObservationRecord::new(
            NaiveDate::from_ymd_opt(2021, month, 1).unwrap(),
            name,
            Sex::Male,
            group,
            behavior,
            pct,
        )
    }

    fn sample_table() -> RecordTable {
        RecordTable::new(vec![
            rec(1, "Bongo", "G1", "Play", 10.0),
            rec(2, "Bongo", "G1", "Play", 30.0),
            rec(1, "Bongo", "G1", "Rest", 50.0),
            rec(2, "Bongo", "G1", "Rest", 50.0),
            rec(1, "Kiki", "G1", "Play", 40.0),
            rec(1, "Kiki", "G1", "Groom", 20.0),
            rec(1, "Zola", "G2", "Play", 0.0),
            rec(1, "Zola", "G2", "Groom", 60.0),
        ])
    }

    fn select<'a>(table: &'a RecordTable, name: &str, month: u32) -> Subset<'a> {
        FilterQuery::new(
            MonthWindow::month(2021, month).unwrap(),
            FilterMode::individual(name),
        )
        .apply(table)
    }

    fn find<'r>(rows: &'r [DeviationRow], behavior: &str) -> &'r DeviationRow {
        rows.iter().find(|r| r.behavior == behavior).unwrap()
    }

    #[test]
    fn test_three_way_deviations() {
        let table = sample_table();
        let subset = select(&table, "Bongo", 2);
        let rows = deviations(&table, &subset, "Bongo", SocialGroupPolicy::Reject).unwrap();

        // every behavior in the dataset is present
        assert_eq!(rows.len(), 3);

        let play = find(&rows, "Play");
        assert_eq!(play.percentage, 30.0);
        // Bongo all-time Play mean = 20
        assert_eq!(play.individual, 10.0);
        // G1 Play mean = (10 + 30 + 40) / 3
        assert!((play.group - (30.0 - 80.0 / 3.0)).abs() < 1e-9);
        // population Play mean = (10 + 30 + 40 + 0) / 4 = 20
        assert_eq!(play.all, 10.0);
        assert!(play.all > 0.0);
    }

    #[test]
    fn test_absent_behavior_zero_filled() {
        let table = sample_table();
        let subset = select(&table, "Bongo", 2);
        let rows = deviations(&table, &subset, "Bongo", SocialGroupPolicy::Reject).unwrap();

        let groom = find(&rows, "Groom");
        assert_eq!(groom.percentage, 0.0);
        // Bongo never groomed: historical baseline is 0
        assert_eq!(groom.individual, 0.0);
        // G1 Groom mean = 20, population Groom mean = 40
        assert_eq!(groom.group, -20.0);
        assert_eq!(groom.all, -40.0);
    }

    #[test]
    fn test_zero_individual_deviation_when_window_matches_history() {
        let table = sample_table();
        let subset = select(&table, "Bongo", 1);
        let rows = deviations(&table, &subset, "Bongo", SocialGroupPolicy::Reject).unwrap();
        // Rest is 50 in every month
        assert_eq!(find(&rows, "Rest").individual, 0.0);
    }

    #[test]
    fn test_sorted_by_percentage_descending() {
        let table = sample_table();
        let subset = select(&table, "Bongo", 2);
        let rows = deviations(&table, &subset, "Bongo", SocialGroupPolicy::Reject).unwrap();
        let order: Vec<&str> = rows.iter().map(|r| r.behavior.as_str()).collect();
        assert_eq!(order, vec!["Rest", "Play", "Groom"]);
    }

    #[test]
    fn test_unknown_individual() {
        let table = sample_table();
        let subset = select(&table, "Bongo", 2);
        assert!(matches!(
            deviations(&table, &subset, "Nobody", SocialGroupPolicy::Reject),
            Err(ComputeError::UnknownIndividual(_))
        ));
    }

    #[test]
    fn test_empty_subset() {
        let table = sample_table();
        let subset = select(&table, "Bongo", 9);
        assert!(matches!(
            deviations(&table, &subset, "Bongo", SocialGroupPolicy::Reject),
            Err(ComputeError::EmptySubset(_))
        ));
    }

    #[test]
    fn test_foreign_rows_rejected() {
        let table = sample_table();
        let subset = table.view();
        assert!(matches!(
            deviations(&table, &subset, "Bongo", SocialGroupPolicy::Reject),
            Err(ComputeError::ForeignRecords { .. })
        ));
    }

    #[test]
    fn test_mixed_groups_policy() {
        let table = RecordTable::new(vec![
            rec(1, "Bongo", "G1", "Play", 10.0),
            rec(2, "Bongo", "G2", "Play", 30.0),
            rec(1, "Kiki", "G1", "Play", 50.0),
        ]);
        let subset = FilterQuery::new(
            MonthWindow::months((2021, 1), (2021, 2)).unwrap(),
            FilterMode::individual("Bongo"),
        )
        .apply(&table);

        match deviations(&table, &subset, "Bongo", SocialGroupPolicy::Reject) {
            Err(ComputeError::MixedSocialGroups { groups, .. }) => assert_eq!(groups, "G1, G2"),
            other => panic!("expected MixedSocialGroups, got {:?}", other),
        }

        let rows = deviations(&table, &subset, "Bongo", SocialGroupPolicy::FirstRow).unwrap();
        // first row is G1: group Play mean = (10 + 50) / 2 = 30, selected = 20
        assert_eq!(find(&rows, "Play").group, -10.0);
    }
}
