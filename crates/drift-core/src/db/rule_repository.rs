//! Sync rule repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for priorities

use crate::error::{Error, Result};
use crate::models::{
    NewSyncRule, RuleId, RunId, SyncProperty, SyncRule, SyncState, UpdateSyncRule,
};
use rusqlite::{params, Connection};

use super::in_transaction;

const RULE_COLUMNS: &str = "id, name, description, state, last_attempt, last_error, \
     last_run_id, created_at, updated_at";

/// Trait for sync rule storage operations
///
/// Covers identity and description fields only; state and last-run writes
/// flow through the lifecycle component.
pub trait RuleStore {
    /// Create a new rule in the initial `unknown` state
    fn create(&self, rule: NewSyncRule) -> Result<SyncRule>;

    /// Get a rule by ID
    fn get(&self, id: &RuleId) -> Result<Option<SyncRule>>;

    /// Get a rule by its unique name (case-insensitive)
    fn get_by_name(&self, name: &str) -> Result<Option<SyncRule>>;

    /// List all rules, ordered by name
    fn list(&self) -> Result<Vec<SyncRule>>;

    /// List rule IDs starting with the given prefix, up to `limit`
    ///
    /// Used to resolve short operator-typed identifiers.
    fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>>;

    /// Update a rule's name and/or description
    fn update(&self, id: &RuleId, update: UpdateSyncRule) -> Result<SyncRule>;

    /// Delete a rule and its properties; run history is kept
    fn delete(&self, id: &RuleId) -> Result<()>;

    /// Duplicate a rule and its ordered property set under a new name
    ///
    /// The clone starts in state `unknown` with no run history.
    fn clone_rule(&self, id: &RuleId, new_name: &str) -> Result<SyncRule>;
}

/// `SQLite` implementation of `RuleStore`
pub struct SqliteRuleStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRuleStore<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a rule from a database row
    fn parse_rule(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncRule> {
        let id: String = row.get(0)?;
        let state: String = row.get(3)?;
        let last_run_id: Option<String> = row.get(6)?;
        Ok(SyncRule {
            id: id.parse().unwrap_or_default(),
            name: row.get(1)?,
            description: row.get(2)?,
            state: state.parse().map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    format!("invalid sync state: {state}").into(),
                )
            })?,
            last_attempt: row.get(4)?,
            last_error: row.get(5)?,
            last_run_id: last_run_id.and_then(|id| id.parse().ok()),
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn require(&self, id: &RuleId) -> Result<SyncRule> {
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("Sync rule {id}")))
    }

    fn ensure_name_free(&self, name: &str, exclude: Option<&RuleId>) -> Result<()> {
        if let Some(existing) = self.get_by_name(name)? {
            if exclude != Some(&existing.id) {
                return Err(Error::InvalidInput(format!(
                    "Rule name '{name}' is already in use"
                )));
            }
        }
        Ok(())
    }

    /// Record a state transition, keeping the error-message invariant:
    /// `last_error` is set iff the state is `failing`.
    pub(crate) fn set_state(
        &self,
        id: &RuleId,
        state: SyncState,
        last_attempt: i64,
        last_error: Option<&str>,
    ) -> Result<()> {
        let last_error = match state {
            SyncState::Failing => Some(
                last_error
                    .map(str::trim)
                    .filter(|message| !message.is_empty())
                    .ok_or_else(|| {
                        Error::Integrity(format!(
                            "Rule {id} entering 'failing' without an error message"
                        ))
                    })?,
            ),
            _ => None,
        };

        let now = chrono::Utc::now().timestamp_millis();
        let rows = self.conn.execute(
            "UPDATE sync_rules
             SET state = ?, last_attempt = ?, last_error = ?, updated_at = ?
             WHERE id = ?",
            params![state.as_str(), last_attempt, last_error, now, id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("Sync rule {id}")));
        }

        tracing::debug!(rule = %id, state = %state, "Rule state updated");
        Ok(())
    }

    /// Point the rule at its most recent run
    pub(crate) fn set_last_run(&self, id: &RuleId, run_id: &RunId) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let rows = self.conn.execute(
            "UPDATE sync_rules SET last_run_id = ?, updated_at = ? WHERE id = ?",
            params![run_id.as_str(), now, id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("Sync rule {id}")));
        }

        Ok(())
    }

    fn insert(&self, rule: &SyncRule) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_rules
             (id, name, description, state, last_attempt, last_error, last_run_id,
              created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                rule.id.as_str(),
                rule.name,
                rule.description,
                rule.state.as_str(),
                rule.last_attempt,
                rule.last_error,
                rule.last_run_id.map(|id| id.as_str()),
                rule.created_at,
                rule.updated_at
            ],
        )?;
        Ok(())
    }
}

impl RuleStore for SqliteRuleStore<'_> {
    fn create(&self, rule: NewSyncRule) -> Result<SyncRule> {
        self.ensure_name_free(&rule.name, None)?;

        let rule = SyncRule::new(rule.name, rule.description);
        self.insert(&rule)?;

        tracing::debug!(rule = %rule.id, name = %rule.name, "Rule created");
        Ok(rule)
    }

    fn get(&self, id: &RuleId) -> Result<Option<SyncRule>> {
        let result = self.conn.query_row(
            &format!("SELECT {RULE_COLUMNS} FROM sync_rules WHERE id = ?"),
            params![id.as_str()],
            Self::parse_rule,
        );

        match result {
            Ok(rule) => Ok(Some(rule)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_by_name(&self, name: &str) -> Result<Option<SyncRule>> {
        let result = self.conn.query_row(
            &format!("SELECT {RULE_COLUMNS} FROM sync_rules WHERE name = ? COLLATE NOCASE"),
            params![name],
            Self::parse_rule,
        );

        match result {
            Ok(rule) => Ok(Some(rule)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<SyncRule>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM sync_rules ORDER BY name COLLATE NOCASE"
        ))?;

        let rules = stmt
            .query_map([], Self::parse_rule)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rules)
    }

    fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM sync_rules WHERE id LIKE ? ORDER BY id LIMIT ?",
        )?;

        let ids = stmt
            .query_map(params![format!("{prefix}%"), limit as i64], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ids)
    }

    fn update(&self, id: &RuleId, update: UpdateSyncRule) -> Result<SyncRule> {
        let update = update.validated()?;
        let existing = self.require(id)?;

        if update.is_empty() {
            return Ok(existing);
        }

        let name = update.name.unwrap_or(existing.name);
        let description = update.description.unwrap_or(existing.description);
        self.ensure_name_free(&name, Some(id))?;

        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "UPDATE sync_rules SET name = ?, description = ?, updated_at = ? WHERE id = ?",
            params![name, description, now, id.as_str()],
        )?;

        self.require(id)
    }

    fn delete(&self, id: &RuleId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_rules WHERE id = ?", params![id.as_str()])?;

        if rows == 0 {
            return Err(Error::NotFound(format!("Sync rule {id}")));
        }

        tracing::debug!(rule = %id, "Rule deleted");
        Ok(())
    }

    fn clone_rule(&self, id: &RuleId, new_name: &str) -> Result<SyncRule> {
        let new_name = crate::models::normalize_rule_name(new_name)?;
        let source = self.require(id)?;
        self.ensure_name_free(&new_name, None)?;

        let clone = SyncRule::new(new_name, source.description.clone());

        in_transaction(self.conn, || {
            self.insert(&clone)?;

            let mut stmt = self.conn.prepare(
                "SELECT destination_field, source_expression
                 FROM sync_properties
                 WHERE rule_id = ?
                 ORDER BY priority ASC, id ASC",
            )?;
            let mappings = stmt
                .query_map(params![id.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            for (position, (destination_field, source_expression)) in
                mappings.into_iter().enumerate()
            {
                let property = SyncProperty::new(
                    clone.id,
                    destination_field,
                    source_expression,
                    position as i64 + 1,
                );
                self.conn.execute(
                    "INSERT INTO sync_properties
                     (id, rule_id, destination_field, source_expression, priority,
                      created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                    params![
                        property.id.as_str(),
                        property.rule_id.as_str(),
                        property.destination_field,
                        property.source_expression,
                        property.priority,
                        property.created_at,
                        property.updated_at
                    ],
                )?;
            }

            Ok(())
        })?;

        tracing::debug!(source = %id, clone = %clone.id, "Rule cloned");
        Ok(clone)
    }
}
