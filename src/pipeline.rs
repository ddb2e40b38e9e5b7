//! Dashboard session
//!
//! Public entry point for the three views. A `Dashboard` owns the loaded table,
//! the color map built from it and the session config; each request recomputes
//! its view from scratch:
//!
//! 1. FilterQuery - select rows by window and individual or sex/group
//! 2. Aggregator / Deviation Analyzer / History Extractor - derive tables
//! 3. Report - attach producer metadata and the relevant colors

use crate::color::ColorMap;
use crate::comparison::{compare, Comparison, ComparisonPanel};
use crate::config::DashboardConfig;
use crate::error::ComputeError;
use crate::filter::{FilterMode, FilterQuery};
use crate::history::{history_for_filter, history_for_individual, trend, HistoryPoint, Trend};
use crate::snapshot::{build_snapshot, Snapshot};
use crate::table::RecordTable;
use crate::types::{Producer, Report};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Request for a behavior history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub behavior: String,
    #[serde(flatten)]
    pub mode: FilterMode,
}

/// Series of one behavior for one selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorHistory {
    pub behavior: String,
    /// Description of the selection the series covers
    pub selection: String,
    pub points: Vec<HistoryPoint>,
    /// Change over the last two points
    pub trend: Option<Trend>,
}

/// The full color map as a report body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorLegend {
    pub behaviors: usize,
    pub assignments: ColorMap,
}

/// Stateful dashboard session over one loaded dataset
pub struct Dashboard {
    table: RecordTable,
    colors: ColorMap,
    config: DashboardConfig,
    producer: Producer,
}

impl Dashboard {
    /// Session with default settings
    pub fn new(table: RecordTable) -> Self {
        let colors = ColorMap::build(&table);
        Self {
            table,
            colors,
            config: DashboardConfig::default(),
            producer: Producer::new(Uuid::new_v4()),
        }
    }

    /// Session with explicit settings
    pub fn with_config(table: RecordTable, config: DashboardConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        let colors = ColorMap::with_palette(&table, &config.palette)?;
        info!(
            rows = table.len(),
            behaviors = colors.len(),
            "dashboard session started"
        );
        Ok(Self {
            table,
            colors,
            config,
            producer: Producer::new(Uuid::new_v4()),
        })
    }

    pub fn table(&self) -> &RecordTable {
        &self.table
    }

    pub fn colors(&self) -> &ColorMap {
        &self.colors
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn producer(&self) -> &Producer {
        &self.producer
    }

    /// Swap in a freshly loaded dataset; colors are rebuilt from it
    pub fn replace_table(&mut self, table: RecordTable) -> Result<(), ComputeError> {
        self.colors = ColorMap::with_palette(&table, &self.config.palette)?;
        self.table = table;
        info!(rows = self.table.len(), "dataset replaced");
        Ok(())
    }

    /// Activity budget (and deviations, for an individual) of one selection
    pub fn snapshot(&self, query: &FilterQuery) -> Result<Report<Snapshot>, ComputeError> {
        let snapshot = build_snapshot(&self.table, query, self.config.social_group_policy)?;
        let colors = self
            .colors
            .restricted_to(snapshot.distribution.iter().map(|b| b.behavior.as_str()));
        Ok(self.report(snapshot, Some(colors)))
    }

    /// Side-by-side comparison of several selections
    pub fn compare(&self, panels: &[ComparisonPanel]) -> Report<Comparison> {
        let comparison = compare(&self.table, panels);
        let colors = self.colors.restricted_to(
            comparison
                .panels
                .iter()
                .flat_map(|p| p.distribution.iter().map(|b| b.behavior.as_str())),
        );
        self.report(comparison, Some(colors))
    }

    /// History of one behavior for an individual or a sex/group selection.
    ///
    /// An individual selection without an individual falls back to the whole
    /// population.
    pub fn history(&self, request: &HistoryRequest) -> Report<BehaviorHistory> {
        let behavior = request.behavior.as_str();
        let (points, selection) = match (&request.mode, request.mode.selected_animal()) {
            (_, Some(animal)) => (
                history_for_individual(&self.table, animal, behavior),
                animal.to_string(),
            ),
            (FilterMode::BySexAndGroup { sexes, groups }, None) => (
                history_for_filter(&self.table, sexes.as_ref(), groups.as_ref(), behavior),
                request.mode.describe(),
            ),
            (FilterMode::ByIndividual { .. }, None) => (
                history_for_filter(&self.table, None, None, behavior),
                FilterMode::everyone().describe(),
            ),
        };

        let history = BehaviorHistory {
            behavior: request.behavior.clone(),
            selection,
            trend: trend(&points),
            points,
        };
        self.report(history, None)
    }

    /// The session's full behavior → color mapping
    pub fn legend(&self) -> Report<ColorLegend> {
        let legend = ColorLegend {
            behaviors: self.colors.len(),
            assignments: self.colors.clone(),
        };
        self.report(legend, None)
    }

    fn report<T>(&self, body: T, colors: Option<ColorMap>) -> Report<T> {
        Report {
            producer: self.producer.clone(),
            computed_at_utc: Utc::now(),
            dataset_rows: self.table.len(),
            colors,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deviation::SocialGroupPolicy;
    use crate::filter::MonthWindow;
    use crate::history::TrendDirection;
    use crate::table::{Sex, TableLoader};
    use pretty_assertions::assert_eq;

    fn sample_csv() -> &'static str {
        "\
Date,Focal Name,Sex,Social Group,Unified Behavior,Percentage
2021-01,Bongo,Male,G1,Play,10
2021-01,Bongo,Male,G1,Rest,60
2021-02,Bongo,Male,G1,Play,20
2021-02,Bongo,Male,G1,Rest,50
2021-01,Kiki,Female,G1,Play,30
2021-02,Kiki,Female,G1,Groom,40
2021-02,Zola,Female,G2,Play,5
2021-03,Bongo,Male,G2,Play,25
"
    }

    fn dashboard() -> Dashboard {
        Dashboard::new(TableLoader::parse_csv(sample_csv()).unwrap())
    }

    #[test]
    fn test_snapshot_report() {
        let dash = dashboard();
        let query = FilterQuery::new(MonthWindow::month(2021, 2).unwrap(), FilterMode::everyone());
        let report = dash.snapshot(&query).unwrap();

        assert_eq!(report.dataset_rows, 8);
        assert_eq!(report.producer.name, crate::PRODUCER_NAME);
        let colors = report.colors.as_ref().unwrap();
        assert_eq!(colors.len(), 3);
        assert_eq!(colors.get("Play"), dash.colors().get("Play"));

        let snapshot = report.into_body();
        assert_eq!(snapshot.kpis.focals, 3);
        assert_eq!(snapshot.distribution[0].behavior, "Rest");
    }

    #[test]
    fn test_snapshot_survives_group_change() {
        let dash = dashboard();
        let query = FilterQuery::new(
            MonthWindow::months((2021, 1), (2021, 3)).unwrap(),
            FilterMode::individual("Bongo"),
        );
        let report = dash.snapshot(&query).unwrap();
        let colors = report.colors.clone().unwrap();
        let snapshot = report.into_body();

        // Play: (10 + 20 + 25) / 3, Rest: (60 + 50) / 2
        let behaviors: Vec<&str> = snapshot
            .distribution
            .iter()
            .map(|b| b.behavior.as_str())
            .collect();
        assert_eq!(behaviors, vec!["Rest", "Play"]);
        assert_eq!(colors.len(), 2);
        assert!(snapshot.deviations.is_none());
        assert!(snapshot
            .deviation_error
            .as_deref()
            .is_some_and(|e| e.contains("Bongo")));

        let config = DashboardConfig {
            social_group_policy: SocialGroupPolicy::FirstRow,
            ..DashboardConfig::default()
        };
        let lenient = Dashboard::with_config(dash.table().clone(), config).unwrap();
        let snapshot = lenient.snapshot(&query).unwrap().into_body();
        assert!(snapshot.deviations.is_some());
        assert!(snapshot.deviation_error.is_none());
    }

    #[test]
    fn test_history_dispatch() {
        let dash = dashboard();

        let individual = dash
            .history(&HistoryRequest {
                behavior: "Play".to_string(),
                mode: FilterMode::individual("Bongo"),
            })
            .into_body();
        assert_eq!(individual.points.len(), 3);
        assert_eq!(individual.selection, "Bongo");
        let t = individual.trend.unwrap();
        assert_eq!(t.delta, 5.0);
        assert_eq!(t.direction, TrendDirection::Increased);

        let females = dash
            .history(&HistoryRequest {
                behavior: "Play".to_string(),
                mode: FilterMode::BySexAndGroup {
                    sexes: Some([Sex::Female].into_iter().collect()),
                    groups: None,
                },
            })
            .into_body();
        let values: Vec<f64> = females.points.iter().map(|p| p.percentage).collect();
        assert_eq!(values, vec![30.0, 5.0]);

        let fallback = dash
            .history(&HistoryRequest {
                behavior: "Play".to_string(),
                mode: FilterMode::ByIndividual { animal: None },
            })
            .into_body();
        let values: Vec<f64> = fallback.points.iter().map(|p| p.percentage).collect();
        // Jan: (10 + 30) / 2, Feb: (20 + 5) / 2, Mar: 25
        assert_eq!(values, vec![20.0, 12.5, 25.0]);
    }

    #[test]
    fn test_compare_report_colors() {
        let dash = dashboard();
        let panels = vec![
            ComparisonPanel::new(FilterQuery::new(
                MonthWindow::month(2021, 1).unwrap(),
                FilterMode::everyone(),
            )),
            ComparisonPanel::new(FilterQuery::new(
                MonthWindow::month(2021, 2).unwrap(),
                FilterMode::everyone(),
            )),
        ];
        let report = dash.compare(&panels);
        assert_eq!(report.colors.as_ref().map(|c| c.len()), Some(2));
        assert_eq!(report.body.report.columns.len(), 2);
    }

    #[test]
    fn test_replace_table_rebuilds_colors() {
        let mut dash = dashboard();
        assert_eq!(dash.legend().body.behaviors, 3);

        let smaller = TableLoader::parse_csv(
            "Date,Focal Name,Sex,Social Group,Unified Behavior,Percentage\n2022-01,Bongo,Male,G1,Feed,40\n",
        )
        .unwrap();
        dash.replace_table(smaller).unwrap();
        assert_eq!(dash.legend().body.behaviors, 1);
        assert_eq!(dash.colors().get("Feed"), Some("#636EFA"));
    }

    #[test]
    fn test_report_serializes_flat() {
        let dash = dashboard();
        let report = dash.legend();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["behaviors"], 3);
        assert!(json["producer"]["instance_id"].is_string());
        assert!(json.get("body").is_none());
    }
}
