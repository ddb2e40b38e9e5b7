//! Behavior color assignment
//!
//! Colors are assigned once per dataset so the same behavior renders the same
//! way in every view, whatever filter is active.

use crate::error::ComputeError;
use crate::table::RecordTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default qualitative palette (10 colors)
pub const DEFAULT_PALETTE: [&str; 10] = [
    "#636EFA", "#EF553B", "#00CC96", "#AB63FA", "#FFA15A", "#19D3F3", "#FF6692", "#B6E880",
    "#FF97FF", "#FECB52",
];

/// Default palette as owned strings
pub fn default_palette() -> Vec<String> {
    DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
}

/// Behavior → color token mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorMap {
    colors: BTreeMap<String, String>,
}

impl ColorMap {
    /// Build from the full dataset with the default palette
    pub fn build(table: &RecordTable) -> Self {
        Self::assign(table.distinct_behaviors(), &default_palette())
    }

    /// Build from the full dataset with a custom palette
    pub fn with_palette(table: &RecordTable, palette: &[String]) -> Result<Self, ComputeError> {
        if palette.is_empty() {
            return Err(ComputeError::ConfigError("palette is empty".to_string()));
        }
        Ok(Self::assign(table.distinct_behaviors(), palette))
    }

    /// `behaviors` must already be sorted and distinct
    fn assign(behaviors: Vec<String>, palette: &[String]) -> Self {
        let colors = behaviors
            .into_iter()
            .zip(palette.iter().cycle())
            .map(|(behavior, color)| (behavior, color.clone()))
            .collect();
        Self { colors }
    }

    pub fn get(&self, behavior: &str) -> Option<&str> {
        self.colors.get(behavior).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Only the entries for `behaviors` (unknown labels are skipped)
    pub fn restricted_to<'a>(&self, behaviors: impl IntoIterator<Item = &'a str>) -> Self {
        let colors = behaviors
            .into_iter()
            .filter_map(|b| self.colors.get_key_value(b))
            .map(|(b, c)| (b.clone(), c.clone()))
            .collect();
        Self { colors }
    }

    /// Entries in behavior order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.colors.iter().map(|(b, c)| (b.as_str(), c.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ObservationRecord, Sex};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn table_with(behaviors: &[&str]) -> RecordTable {
        behaviors
            .iter()
            .map(|b| {
                ObservationRecord::new(
                    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
                    "Bongo",
                    Sex::Male,
                    "G1",
                    *b,
                    10.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_sorted_assignment() {
        let map = ColorMap::build(&table_with(&["Rest", "Groom", "Play", "Groom"]));
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("Groom"), Some("#636EFA"));
        assert_eq!(map.get("Play"), Some("#EF553B"));
        assert_eq!(map.get("Rest"), Some("#00CC96"));
        assert_eq!(map.get("Feed"), None);
    }

    #[test]
    fn test_palette_wraps_around() {
        let behaviors: Vec<String> = (0..12).map(|i| format!("B{:02}", i)).collect();
        let refs: Vec<&str> = behaviors.iter().map(String::as_str).collect();
        let map = ColorMap::build(&table_with(&refs));

        assert_eq!(map.len(), 12);
        assert_eq!(map.get("B10"), map.get("B00"));
        assert_eq!(map.get("B11"), map.get("B01"));
        assert_ne!(map.get("B09"), map.get("B00"));
    }

    #[test]
    fn test_custom_palette() {
        let palette = vec!["red".to_string(), "blue".to_string()];
        let map = ColorMap::with_palette(&table_with(&["C", "A", "B"]), &palette).unwrap();
        let entries: Vec<(&str, &str)> = map.iter().collect();
        assert_eq!(entries, vec![("A", "red"), ("B", "blue"), ("C", "red")]);
    }

    #[test]
    fn test_restricted_to_keeps_colors() {
        let map = ColorMap::build(&table_with(&["Rest", "Groom", "Play"]));
        let sub = map.restricted_to(["Rest", "Feed"]);
        assert_eq!(sub.len(), 1);
        assert_eq!(sub.get("Rest"), map.get("Rest"));
    }

    #[test]
    fn test_empty_palette_rejected() {
        assert!(matches!(
            ColorMap::with_palette(&table_with(&["A"]), &[]),
            Err(ComputeError::ConfigError(_))
        ));
    }

    proptest! {
        #[test]
        fn color_map_ignores_duplicate_rows(
            behaviors in prop::collection::vec(prop::sample::select(vec!["Play", "Rest", "Groom", "Feed", "Travel"]), 1..40),
            keep in prop::collection::vec(any::<bool>(), 40),
        ) {
            let full = table_with(&behaviors);
            prop_assert_eq!(ColorMap::build(&full), ColorMap::build(&full));

            // drop rows but keep at least one occurrence of every behavior
            let mut seen = std::collections::HashSet::new();
            let thinned: Vec<&str> = behaviors
                .iter()
                .zip(keep.iter())
                .filter(|(b, k)| seen.insert(**b) || **k)
                .map(|(b, _)| *b)
                .collect();
            prop_assert_eq!(ColorMap::build(&table_with(&thinned)), ColorMap::build(&full));
        }
    }
}
