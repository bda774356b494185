//! Sync run model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::models::RuleId;

/// A unique identifier for a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new unique run ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Outcome of a completed sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    /// All pending changes were applied; the rule is in sync
    Succeeded,
    /// The run raised an error
    Failed,
    /// The run completed without a verdict; the rule stays unknown
    Indeterminate,
}

impl RunOutcome {
    /// Stable string form used in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Indeterminate => "indeterminate",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "indeterminate" => Ok(Self::Indeterminate),
            other => Err(Error::InvalidInput(format!("Unknown run outcome: {other}"))),
        }
    }
}

/// One historical execution attempt of a sync rule
///
/// `rule_name` is a value-copy taken when the run started; it may diverge
/// from the rule's current name if the rule was renamed later. A closed run
/// (finished_at set) is immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    /// Unique identifier
    pub id: RunId,
    /// Rule this run executed
    pub rule_id: RuleId,
    /// Rule name captured at start time
    pub rule_name: String,
    /// Start timestamp (Unix ms)
    pub started_at: i64,
    /// Completion timestamp (Unix ms); `None` while the run is open
    pub finished_at: Option<i64>,
    /// Outcome; `None` while the run is open
    pub outcome: Option<RunOutcome>,
    /// Number of changes applied; `None` while the run is open
    pub changes_applied: Option<i64>,
}

impl SyncRun {
    /// Open a new run entry for the given rule, capturing its current name
    #[must_use]
    pub fn start(rule_id: RuleId, rule_name: impl Into<String>) -> Self {
        Self {
            id: RunId::new(),
            rule_id,
            rule_name: rule_name.into(),
            started_at: chrono::Utc::now().timestamp_millis(),
            finished_at: None,
            outcome: None,
            changes_applied: None,
        }
    }

    /// Whether the run has completed and become immutable
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Result reported by the external executor when a run completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub changes_applied: i64,
    /// Required when the outcome is `Failed`
    pub error_message: Option<String>,
}

impl RunReport {
    pub fn new(
        outcome: RunOutcome,
        changes_applied: i64,
        error_message: Option<String>,
    ) -> Result<Self, Error> {
        let error_message = error_message.filter(|m| !m.trim().is_empty());
        if outcome == RunOutcome::Failed && error_message.is_none() {
            return Err(Error::InvalidInput(
                "A failed run must include an error message".into(),
            ));
        }
        Ok(Self {
            outcome,
            changes_applied,
            error_message,
        })
    }
}
