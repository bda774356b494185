//! Sync rule model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::models::RunId;

/// A unique identifier for a sync rule, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(Uuid);

impl RuleId {
    /// Create a new unique rule ID using UUID v7
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

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RuleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Sync state of a rule
///
/// A closed enum rather than loose strings so that adding a state is a
/// compile-time-visible change everywhere the state is matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncState {
    /// No check or run has produced a verdict yet
    Unknown,
    /// Last check or run found no remaining differences
    InSync,
    /// Last check detected drift that a run would apply
    PendingChanges,
    /// Last check or run raised an error
    Failing,
}

impl SyncState {
    /// Stable string form used in the database and on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::InSync => "in-sync",
            Self::PendingChanges => "pending-changes",
            Self::Failing => "failing",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "in-sync" => Ok(Self::InSync),
            "pending-changes" => Ok(Self::PendingChanges),
            "failing" => Ok(Self::Failing),
            other => Err(Error::InvalidInput(format!("Unknown sync state: {other}"))),
        }
    }
}

/// A sync rule: a named policy mapping imported external data onto
/// monitoring configuration objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRule {
    /// Unique identifier
    pub id: RuleId,
    /// Human-chosen unique name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Current lifecycle state
    pub state: SyncState,
    /// Timestamp of the last check/run attempt (Unix ms)
    pub last_attempt: Option<i64>,
    /// Error message from the last failure; set iff state is `Failing`
    pub last_error: Option<String>,
    /// Most recent run, if any (non-owning; runs outlive rule renames)
    pub last_run_id: Option<RunId>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl SyncRule {
    /// Create a new rule in the initial `Unknown` state
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: RuleId::new(),
            name: name.into(),
            description: description.into(),
            state: SyncState::Unknown,
            last_attempt: None,
            last_error: None,
            last_run_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Validated request to create a sync rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSyncRule {
    pub name: String,
    pub description: String,
}

impl NewSyncRule {
    /// Build a request, trimming and validating the name at the boundary
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, Error> {
        let name = normalize_rule_name(&name.into())?;
        Ok(Self {
            name,
            description: description.into(),
        })
    }
}

/// Partial update of a sync rule's identity fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSyncRule {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl UpdateSyncRule {
    pub fn validated(self) -> Result<Self, Error> {
        let name = self.name.map(|n| normalize_rule_name(&n)).transpose()?;
        Ok(Self {
            name,
            description: self.description,
        })
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// Trim a rule name and reject empty ones
pub fn normalize_rule_name(name: &str) -> Result<String, Error> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("Rule name cannot be empty".into()));
    }
    Ok(trimmed.to_string())
}
