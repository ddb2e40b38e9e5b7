//! Output envelope shared by every view
//!
//! Derived tables handed to rendering or export are wrapped with producer
//! metadata so a saved report can be traced back to the session and crate
//! version that computed it.

use crate::color::ColorMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the software instance that produced a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    /// Dashboard session identifier
    pub instance_id: Uuid,
}

impl Producer {
    pub fn new(instance_id: Uuid) -> Self {
        Self {
            name: crate::PRODUCER_NAME.to_string(),
            version: crate::LENS_VERSION.to_string(),
            instance_id,
        }
    }
}

/// A computed view plus provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report<T> {
    pub producer: Producer,
    pub computed_at_utc: DateTime<Utc>,
    /// Rows in the table the view was computed from
    pub dataset_rows: usize,
    /// Colors for the behaviors shown in the view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<ColorMap>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Report<T> {
    pub fn into_body(self) -> T {
        self.body
    }
}
