//! Side-by-side comparison of several filtered selections
//!
//! Panels share one y-axis limit and one behavior order (taken from the first
//! panel) so bars line up across charts. The report joins every non-empty
//! panel's behavior means into one table with panel-to-panel differences.

use crate::aggregate::{aggregate, as_lookup, behavior_order, max_mean, BehaviorMean};
use crate::filter::{FilterMode, FilterQuery};
use crate::table::RecordTable;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::debug;

/// One comparison column as requested by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonPanel {
    /// Display label; defaults to a description of the selection
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub query: FilterQuery,
}

impl ComparisonPanel {
    pub fn new(query: FilterQuery) -> Self {
        Self { label: None, query }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Explicit label, or selection + date range
    pub fn title(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        let window = &self.query.window;
        let range = format!(
            "{} - {}",
            window.start.format("%B %Y"),
            window.end.format("%B %Y")
        );
        match &self.query.mode {
            FilterMode::ByIndividual { .. } => match self.query.mode.selected_animal() {
                Some(animal) => format!("{} | {}", animal, range),
                None => "Behavior Comparison".to_string(),
            },
            FilterMode::BySexAndGroup { .. } => {
                let dates = if window.start != window.end {
                    range
                } else {
                    window.start.format("%B %Y").to_string()
                };
                format!("{} | Dates: {}", self.query.mode.describe(), dates)
            }
        }
    }
}

/// Computed chart data for one panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelResult {
    pub title: String,
    /// Rows selected by the panel
    pub rows: usize,
    /// Behavior means against the shared order, highest first
    pub distribution: Vec<BehaviorMean>,
}

impl PanelResult {
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// One behavior across all non-empty panels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    #[serde(rename = "Unified Behavior")]
    pub behavior: String,
    /// One mean per report column, 0 where the panel lacks the behavior
    pub values: Vec<f64>,
    /// `values[i] - values[i - 1]` for i = 1..
    pub diffs: Vec<f64>,
}

/// Joined comparison table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    /// `"{title} ({panel number})"` for each non-empty panel
    pub columns: Vec<String>,
    /// `"Diff i-(i+1)"` labels matching `ComparisonRow::diffs`
    pub diff_columns: Vec<String>,
    /// Sorted by the first column, highest first
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Full comparison output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub panels: Vec<PanelResult>,
    /// Behavior order shared by every panel chart
    pub shared_order: Option<Vec<String>>,
    /// Shared y-axis limit
    pub y_max: Option<f64>,
    pub report: ComparisonTable,
}

/// Compare `panels` over `table`.
///
/// Panels with an incomplete selection or no matching rows come back empty
/// and are left out of the joined report.
pub fn compare(table: &RecordTable, panels: &[ComparisonPanel]) -> Comparison {
    let subsets: Vec<_> = panels
        .iter()
        .map(|panel| {
            if panel.query.mode.is_complete() {
                panel.query.apply(table)
            } else {
                Default::default()
            }
        })
        .collect();

    // Unordered means per panel, used for the y-axis and the report
    let own: Vec<Vec<BehaviorMean>> = subsets.iter().map(|s| aggregate(s, None)).collect();

    let shared_order = own
        .first()
        .filter(|first| !first.is_empty())
        .map(|first| behavior_order(first));

    let y_max = own
        .iter()
        .filter_map(|a| max_mean(a))
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

    let results: Vec<PanelResult> = panels
        .iter()
        .zip(&subsets)
        .map(|(panel, subset)| PanelResult {
            title: panel.title(),
            rows: subset.len(),
            distribution: if subset.is_empty() {
                Vec::new()
            } else {
                aggregate(subset, shared_order.as_deref())
            },
        })
        .collect();

    let report = build_report(&results, &own);
    debug!(
        panels = results.len(),
        report_rows = report.rows.len(),
        "built comparison"
    );

    Comparison {
        panels: results,
        shared_order,
        y_max,
        report,
    }
}

fn build_report(results: &[PanelResult], own: &[Vec<BehaviorMean>]) -> ComparisonTable {
    let included: Vec<(usize, &PanelResult, &Vec<BehaviorMean>)> = results
        .iter()
        .zip(own)
        .enumerate()
        .filter(|(_, (panel, _))| !panel.is_empty())
        .map(|(i, (panel, means))| (i, panel, means))
        .collect();

    if included.is_empty() {
        return ComparisonTable::default();
    }

    let columns: Vec<String> = included
        .iter()
        .map(|(i, panel, _)| format!("{} ({})", panel.title, i + 1))
        .collect();
    let diff_columns: Vec<String> = (1..columns.len())
        .map(|i| format!("Diff {}-{}", i, i + 1))
        .collect();

    let lookups: Vec<_> = included.iter().map(|(_, _, means)| as_lookup(means)).collect();
    let behaviors: BTreeSet<&str> = lookups.iter().flat_map(|l| l.keys().copied()).collect();

    let mut rows: Vec<ComparisonRow> = behaviors
        .into_iter()
        .map(|behavior| {
            let values: Vec<f64> = lookups
                .iter()
                .map(|l| l.get(behavior).copied().unwrap_or(0.0))
                .collect();
            let diffs = values.windows(2).map(|w| w[1] - w[0]).collect();
            ComparisonRow {
                behavior: behavior.to_string(),
                values,
                diffs,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.values[0]
            .partial_cmp(&a.values[0])
            .unwrap_or(Ordering::Equal)
    });

    ComparisonTable {
        columns,
        diff_columns,
        rows,
    }
}
