//! Dashboard configuration
//!
//! Small JSON document controlling the parts of the analysis that are a
//! matter of policy rather than data.

use crate::color::default_palette;
use crate::deviation::SocialGroupPolicy;
use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// Analysis settings for a dashboard session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Ordered color palette, cycled when behaviors outnumber it
    pub palette: Vec<String>,
    /// Handling of individuals whose selected rows span several groups
    pub social_group_policy: SocialGroupPolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            palette: default_palette(),
            social_group_policy: SocialGroupPolicy::default(),
        }
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.palette.is_empty() {
            return Err(ComputeError::ConfigError("palette is empty".to_string()));
        }
        if let Some(blank) = self.palette.iter().position(|c| c.trim().is_empty()) {
            return Err(ComputeError::ConfigError(format!(
                "palette entry {} is blank",
                blank
            )));
        }
        Ok(())
    }

    /// Load and validate from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
