//! ethogram-lens - Behavior analysis core for chimpanzee ethogram data
//!
//! Lens turns a table of monthly behavioral observations into the derived
//! tables behind an exploration dashboard: filter → aggregate → deviation /
//! history analysis, with a stable color per behavior.
//!
//! ## Views
//!
//! - **Snapshot**: activity budget of one selection, plus deviations for an individual
//! - **Comparison**: several selections side by side on a shared axis
//! - **History**: one behavior over time for an individual or a sex/group selection

pub mod aggregate;
pub mod color;
pub mod comparison;
pub mod config;
pub mod deviation;
pub mod error;
pub mod filter;
pub mod history;
pub mod pipeline;
pub mod snapshot;
pub mod table;
pub mod types;

pub use aggregate::{aggregate, BehaviorMean};
pub use color::ColorMap;
pub use comparison::{compare, Comparison, ComparisonPanel};
pub use config::DashboardConfig;
pub use deviation::{deviations, DeviationRow, SocialGroupPolicy};
pub use error::ComputeError;
pub use filter::{filter, FilterMode, FilterQuery, MonthWindow};
pub use history::{history_for_filter, history_for_individual, HistoryPoint};
pub use pipeline::{Dashboard, HistoryRequest};
pub use snapshot::Snapshot;

// Table exports
pub use table::{ObservationRecord, RecordTable, Sex, Subset, TableLoader};

/// Crate version embedded in every report
pub const LENS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "ethogram-lens";
