//! Sync property model

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::models::RuleId;

/// A unique identifier for a sync property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId(Uuid);

impl PropertyId {
    /// Create a new unique property ID using UUID v7
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

impl Default for PropertyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PropertyId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One field-mapping rule within a sync rule
///
/// `priority` is the operator-controlled position within the rule; lower
/// values render and apply first, ties broken by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProperty {
    /// Unique identifier
    pub id: PropertyId,
    /// Owning rule
    pub rule_id: RuleId,
    /// Field on the destination object this mapping writes
    pub destination_field: String,
    /// Expression over imported columns, e.g. `${hostname}.example.com`
    pub source_expression: String,
    /// Manual sort priority within the rule
    pub priority: i64,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl SyncProperty {
    /// Create a new property for the given rule at the given priority
    #[must_use]
    pub fn new(
        rule_id: RuleId,
        destination_field: impl Into<String>,
        source_expression: impl Into<String>,
        priority: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: PropertyId::new(),
            rule_id,
            destination_field: destination_field.into(),
            source_expression: source_expression.into(),
            priority,
            created_at: now,
            updated_at: now,
        }
    }

    /// Imported columns this property's expression reads
    #[must_use]
    pub fn referenced_columns(&self) -> Vec<String> {
        referenced_columns(&self.source_expression)
    }
}

/// Validated request to create a sync property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSyncProperty {
    pub destination_field: String,
    pub source_expression: String,
}

impl NewSyncProperty {
    pub fn new(
        destination_field: impl Into<String>,
        source_expression: impl Into<String>,
    ) -> Result<Self, Error> {
        let destination_field = destination_field.into().trim().to_string();
        if destination_field.is_empty() {
            return Err(Error::InvalidInput(
                "Destination field cannot be empty".into(),
            ));
        }
        Ok(Self {
            destination_field,
            source_expression: source_expression.into(),
        })
    }
}

/// Partial update of a sync property
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSyncProperty {
    pub destination_field: Option<String>,
    pub source_expression: Option<String>,
}

impl UpdateSyncProperty {
    pub fn validated(self) -> Result<Self, Error> {
        if let Some(field) = &self.destination_field {
            if field.trim().is_empty() {
                return Err(Error::InvalidInput(
                    "Destination field cannot be empty".into(),
                ));
            }
        }
        Ok(Self {
            destination_field: self.destination_field.map(|f| f.trim().to_string()),
            source_expression: self.source_expression,
        })
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.destination_field.is_none() && self.source_expression.is_none()
    }
}

/// Extract `${column}` references from a source expression
///
/// Column names match `[a-zA-Z_][a-zA-Z0-9_.]*` and are returned in order
/// of first appearance, deduplicated.
///
/// # Examples
///
/// ```
/// use drift_core::models::referenced_columns;
///
/// let columns = referenced_columns("${hostname}.${domain}");
/// assert_eq!(columns, vec!["hostname", "domain"]);
/// ```
#[must_use]
pub fn referenced_columns(expression: &str) -> Vec<String> {
    let re = Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_.]*)\}").expect("Invalid regex");
    let mut seen = Vec::new();
    for cap in re.captures_iter(expression) {
        let column = cap[1].to_string();
        if !seen.contains(&column) {
            seen.push(column);
        }
    }
    seen
}
