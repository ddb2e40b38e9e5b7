//! Error types for ethogram-lens

use thiserror::Error;

/// Errors that can occur while loading or analysing observation records
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse observation table: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Missing required column(s): {0}")]
    MissingColumns(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Unknown sex value: {0}")]
    InvalidSex(String),

    #[error("Invalid percentage: {0}")]
    InvalidPercentage(String),

    #[error("Individual not present in dataset: {0}")]
    UnknownIndividual(String),

    #[error("Filtered subset is empty: {0}")]
    EmptySubset(String),

    #[error("Filtered subset for {expected} contains records of {found}")]
    ForeignRecords { expected: String, found: String },

    #[error("{individual} spans several social groups in the selected window: {groups}")]
    MixedSocialGroups { individual: String, groups: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
