use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] drift_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Rule identifier cannot be empty")]
    EmptyRuleIdentifier,
    #[error("Sync rule not found for name/id/prefix: {0}")]
    RuleNotFound(String),
    #[error("{0}")]
    AmbiguousRuleId(String),
    #[error("Run ID is not valid: {0}")]
    InvalidRunId(String),
    #[error("Property ID is not valid: {0}")]
    InvalidPropertyId(String),
    #[error("A failed {0} must include --message")]
    MissingFailureMessage(&'static str),
}
