//! Filter engine
//!
//! Every view selects rows the same way: an inclusive month window, then
//! either a single focal individual or a sex/social-group selection. The
//! engine never fails; invalid or inverted selections just match nothing
//! (or, for an unset individual, apply no individual restriction).

use crate::table::{ObservationRecord, RecordTable, Sex, Subset};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Inclusive date range at month granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthWindow {
    /// First day of the start month
    pub start: NaiveDate,
    /// Last day of the end month
    pub end: NaiveDate,
}

impl MonthWindow {
    /// Window with explicit bounds, taken as-is
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Window covering a single calendar month
    pub fn month(year: i32, month: u32) -> Option<Self> {
        Self::months((year, month), (year, month))
    }

    /// Window from the first day of `from` to the last day of `to`
    pub fn months(from: (i32, u32), to: (i32, u32)) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(from.0, from.1, 1)?;
        let end = last_day_of_month(NaiveDate::from_ymd_opt(to.0, to.1, 1)?)?;
        Some(Self { start, end })
    }

    /// Widen arbitrary dates to whole months
    pub fn covering(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        Self::months((start.year(), start.month()), (end.year(), end.month()))
    }

    /// Window spanning every record of the table
    pub fn all_of(table: &RecordTable) -> Option<Self> {
        let (min, max) = table.date_span()?;
        Self::covering(min, max)
    }

    /// Window over the latest month present in the table
    pub fn latest_month(table: &RecordTable) -> Option<Self> {
        let (_, max) = table.date_span()?;
        Self::month(max.year(), max.month())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Start after end; such a window matches nothing
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    pub fn is_single_month(&self) -> bool {
        self.start.year() == self.end.year() && self.start.month() == self.end.month()
    }
}

fn last_day_of_month(first: NaiveDate) -> Option<NaiveDate> {
    first.checked_add_months(Months::new(1))?.pred_opt()
}

/// Categorical selection applied after the date window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FilterMode {
    /// One focal individual. `None` (or empty) means no restriction.
    ByIndividual {
        #[serde(default)]
        animal: Option<String>,
    },
    /// Sex and social-group sets. `None` means no restriction; an empty set
    /// matches nothing.
    BySexAndGroup {
        #[serde(default)]
        sexes: Option<BTreeSet<Sex>>,
        #[serde(default)]
        groups: Option<BTreeSet<String>>,
    },
}

impl FilterMode {
    pub fn individual(animal: impl Into<String>) -> Self {
        FilterMode::ByIndividual {
            animal: Some(animal.into()),
        }
    }

    /// Sex/group mode with no restriction on either
    pub fn everyone() -> Self {
        FilterMode::BySexAndGroup {
            sexes: None,
            groups: None,
        }
    }

    pub fn sex_and_group(
        sexes: impl IntoIterator<Item = Sex>,
        groups: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        FilterMode::BySexAndGroup {
            sexes: Some(sexes.into_iter().collect()),
            groups: Some(groups.into_iter().map(Into::into).collect()),
        }
    }

    /// The selected individual, if this is an individual selection with a name
    pub fn selected_animal(&self) -> Option<&str> {
        match self {
            FilterMode::ByIndividual { animal } => {
                animal.as_deref().filter(|a| !a.is_empty())
            }
            FilterMode::BySexAndGroup { .. } => None,
        }
    }

    /// False for an individual selection without a chosen individual
    pub fn is_complete(&self) -> bool {
        match self {
            FilterMode::ByIndividual { .. } => self.selected_animal().is_some(),
            FilterMode::BySexAndGroup { .. } => true,
        }
    }

    pub fn matches(&self, record: &ObservationRecord) -> bool {
        match self {
            FilterMode::ByIndividual { .. } => match self.selected_animal() {
                Some(animal) => record.focal_name == animal,
                None => true,
            },
            FilterMode::BySexAndGroup { sexes, groups } => {
                matches_sex_and_group(record, sexes.as_ref(), groups.as_ref())
            }
        }
    }

    /// Short human-readable description of the selection
    pub fn describe(&self) -> String {
        match self {
            FilterMode::ByIndividual { .. } => self
                .selected_animal()
                .unwrap_or("No individual selected")
                .to_string(),
            FilterMode::BySexAndGroup { sexes, groups } => {
                let sex_text = match sexes {
                    Some(s) if !s.is_empty() => s
                        .iter()
                        .map(Sex::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                    _ => "All Sexes".to_string(),
                };
                let group_text = match groups {
                    Some(g) if !g.is_empty() => g.iter().cloned().collect::<Vec<_>>().join(", "),
                    _ => "All Social Groups".to_string(),
                };
                format!("Sex: {} | Groups: {}", sex_text, group_text)
            }
        }
    }
}

/// Sex/group membership shared by the filter engine and the history extractor
pub(crate) fn matches_sex_and_group(
    record: &ObservationRecord,
    sexes: Option<&BTreeSet<Sex>>,
    groups: Option<&BTreeSet<String>>,
) -> bool {
    sexes.map_or(true, |s| s.contains(&record.sex))
        && groups.map_or(true, |g| g.contains(&record.social_group))
}

/// Full selection: date window plus categorical mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterQuery {
    pub window: MonthWindow,
    #[serde(flatten)]
    pub mode: FilterMode,
}

impl FilterQuery {
    pub fn new(window: MonthWindow, mode: FilterMode) -> Self {
        Self { window, mode }
    }

    pub fn matches(&self, record: &ObservationRecord) -> bool {
        self.window.contains(record.date) && self.mode.matches(record)
    }

    /// Apply to a whole table
    pub fn apply<'a>(&self, table: &'a RecordTable) -> Subset<'a> {
        filter_rows(table, self)
    }

    /// Apply to an existing subset (narrowing it further)
    pub fn refine<'a>(&self, subset: &Subset<'a>) -> Subset<'a> {
        filter_rows(subset, self)
    }
}

/// Select the rows that satisfy `query`, preserving input order
pub fn filter_rows<'a, I>(rows: I, query: &FilterQuery) -> Subset<'a>
where
    I: IntoIterator<Item = &'a ObservationRecord>,
{
    let selected: Vec<&ObservationRecord> = rows.into_iter().filter(|r| query.matches(r)).collect();
    debug!(
        rows = selected.len(),
        start = %query.window.start,
        end = %query.window.end,
        "filtered observation rows"
    );
    Subset::from_rows(selected)
}

/// Filter the table by date window and selection mode
pub fn filter<'a>(table: &'a RecordTable, window: MonthWindow, mode: &FilterMode) -> Subset<'a> {
    filter_rows(table, &FilterQuery::new(window, mode.clone()))
}
