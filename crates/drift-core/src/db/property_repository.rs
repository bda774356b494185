//! Sync property repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for priorities

use crate::error::{Error, Result};
use crate::models::{NewSyncProperty, PropertyId, RuleId, SyncProperty, UpdateSyncProperty};
use rusqlite::{params, Connection};

use super::in_transaction;

const PROPERTY_COLUMNS: &str = "id, rule_id, destination_field, source_expression, priority, \
     created_at, updated_at";

/// Trait for the ordered property list of a sync rule
pub trait PropertyList {
    /// Create a new property, appended at the end of the rule's order
    fn create(&self, rule_id: &RuleId, property: NewSyncProperty) -> Result<SyncProperty>;

    /// Get a property belonging to the given rule
    fn get(&self, rule_id: &RuleId, id: &PropertyId) -> Result<Option<SyncProperty>>;

    /// List the rule's properties, priority ascending, ties broken by id
    fn list(&self, rule_id: &RuleId) -> Result<Vec<SyncProperty>>;

    /// Update a property's mapping fields
    fn update(
        &self,
        rule_id: &RuleId,
        id: &PropertyId,
        update: UpdateSyncProperty,
    ) -> Result<SyncProperty>;

    /// Delete a property
    fn delete(&self, rule_id: &RuleId, id: &PropertyId) -> Result<()>;

    /// Move a property to a 1-based position, renumbering the whole list
    ///
    /// All-or-nothing: either every affected sibling shifts by one position
    /// and priorities end up dense, or nothing changes. Returns the
    /// re-ordered list.
    fn move_to(
        &self,
        rule_id: &RuleId,
        id: &PropertyId,
        new_position: usize,
    ) -> Result<Vec<SyncProperty>>;

    /// Whether the rule has any properties; gates whether it is runnable
    fn has_any(&self, rule_id: &RuleId) -> Result<bool>;
}

/// `SQLite` implementation of `PropertyList`
pub struct SqlitePropertyList<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePropertyList<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a property from a database row
    fn parse_property(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncProperty> {
        let id: String = row.get(0)?;
        let rule_id: String = row.get(1)?;
        Ok(SyncProperty {
            id: id.parse().unwrap_or_default(),
            rule_id: rule_id.parse().unwrap_or_default(),
            destination_field: row.get(2)?,
            source_expression: row.get(3)?,
            priority: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn require(&self, rule_id: &RuleId, id: &PropertyId) -> Result<SyncProperty> {
        self.get(rule_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Sync property {id} for rule {rule_id}")))
    }

    fn rule_exists(&self, rule_id: &RuleId) -> Result<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sync_rules WHERE id = ?)",
            params![rule_id.as_str()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(Error::NotFound(format!("Sync rule {rule_id}")));
        }
        Ok(())
    }

    fn next_priority(&self, rule_id: &RuleId) -> Result<i64> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(priority) FROM sync_properties WHERE rule_id = ?",
            params![rule_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0) + 1)
    }

    /// Write dense priorities 1..=n for the given ordering, then verify no
    /// two rows share a position. A duplicate after renumbering means the
    /// renumbering itself is broken and must not be committed.
    fn renumber(&self, rule_id: &RuleId, ordered_ids: &[PropertyId]) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        for (index, property_id) in ordered_ids.iter().enumerate() {
            self.conn.execute(
                "UPDATE sync_properties SET priority = ?, updated_at = ?
                 WHERE id = ? AND rule_id = ?",
                params![
                    index as i64 + 1,
                    now,
                    property_id.as_str(),
                    rule_id.as_str()
                ],
            )?;
        }

        let (total, distinct): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT priority)
             FROM sync_properties WHERE rule_id = ?",
            params![rule_id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if total != distinct {
            return Err(Error::Integrity(format!(
                "Reorder produced duplicate priorities for rule {rule_id}"
            )));
        }

        Ok(())
    }
}

impl PropertyList for SqlitePropertyList<'_> {
    fn create(&self, rule_id: &RuleId, property: NewSyncProperty) -> Result<SyncProperty> {
        self.rule_exists(rule_id)?;

        let priority = self.next_priority(rule_id)?;
        let property = SyncProperty::new(
            *rule_id,
            property.destination_field,
            property.source_expression,
            priority,
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

        Ok(property)
    }

    fn get(&self, rule_id: &RuleId, id: &PropertyId) -> Result<Option<SyncProperty>> {
        let result = self.conn.query_row(
            &format!("SELECT {PROPERTY_COLUMNS} FROM sync_properties WHERE id = ? AND rule_id = ?"),
            params![id.as_str(), rule_id.as_str()],
            Self::parse_property,
        );

        match result {
            Ok(property) => Ok(Some(property)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, rule_id: &RuleId) -> Result<Vec<SyncProperty>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM sync_properties
             WHERE rule_id = ?
             ORDER BY priority ASC, id ASC"
        ))?;

        let properties = stmt
            .query_map(params![rule_id.as_str()], Self::parse_property)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(properties)
    }

    fn update(
        &self,
        rule_id: &RuleId,
        id: &PropertyId,
        update: UpdateSyncProperty,
    ) -> Result<SyncProperty> {
        let update = update.validated()?;
        let existing = self.require(rule_id, id)?;

        if update.is_empty() {
            return Ok(existing);
        }

        let destination_field = update
            .destination_field
            .unwrap_or(existing.destination_field);
        let source_expression = update
            .source_expression
            .unwrap_or(existing.source_expression);

        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "UPDATE sync_properties
             SET destination_field = ?, source_expression = ?, updated_at = ?
             WHERE id = ? AND rule_id = ?",
            params![
                destination_field,
                source_expression,
                now,
                id.as_str(),
                rule_id.as_str()
            ],
        )?;

        self.require(rule_id, id)
    }

    fn delete(&self, rule_id: &RuleId, id: &PropertyId) -> Result<()> {
        let rows = self.conn.execute(
            "DELETE FROM sync_properties WHERE id = ? AND rule_id = ?",
            params![id.as_str(), rule_id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!(
                "Sync property {id} for rule {rule_id}"
            )));
        }

        Ok(())
    }

    fn move_to(
        &self,
        rule_id: &RuleId,
        id: &PropertyId,
        new_position: usize,
    ) -> Result<Vec<SyncProperty>> {
        let properties = self.list(rule_id)?;
        let mut ordered_ids: Vec<PropertyId> = properties.iter().map(|p| p.id).collect();

        let current_index = ordered_ids.iter().position(|pid| pid == id).ok_or_else(|| {
            Error::NotFound(format!("Sync property {id} for rule {rule_id}"))
        })?;

        // 1-based position, clamped to the list bounds
        let target_index = new_position.max(1).min(ordered_ids.len()) - 1;

        if target_index == current_index {
            // Idempotent: nothing moves, no sibling changes
            return Ok(properties);
        }

        let moved = ordered_ids.remove(current_index);
        ordered_ids.insert(target_index, moved);

        in_transaction(self.conn, || self.renumber(rule_id, &ordered_ids))?;

        tracing::debug!(rule = %rule_id, property = %id, position = target_index + 1,
            "Property moved");
        self.list(rule_id)
    }

    fn has_any(&self, rule_id: &RuleId) -> Result<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sync_properties WHERE rule_id = ?)",
            params![rule_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, RuleStore, SqliteRuleStore};
    use crate::models::NewSyncRule;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn create_rule(db: &Database, name: &str) -> RuleId {
        SqliteRuleStore::new(db.connection())
            .create(NewSyncRule::new(name, "").unwrap())
            .unwrap()
            .id
    }

    fn add_property(db: &Database, rule_id: &RuleId, field: &str) -> SyncProperty {
        SqlitePropertyList::new(db.connection())
            .create(
                rule_id,
                NewSyncProperty::new(field, format!("${{{field}}}")).unwrap(),
            )
            .unwrap()
    }

    fn fields(db: &Database, rule_id: &RuleId) -> Vec<String> {
        SqlitePropertyList::new(db.connection())
            .list(rule_id)
            .unwrap()
            .into_iter()
            .map(|p| p.destination_field)
            .collect()
    }

    #[test]
    fn test_create_appends_at_end() {
        let db = setup();
        let rule_id = create_rule(&db, "hosts");

        let first = add_property(&db, &rule_id, "address");
        let second = add_property(&db, &rule_id, "name");

        assert_eq!(first.priority, 1);
        assert_eq!(second.priority, 2);
    }

    #[test]
    fn test_create_rejects_missing_rule() {
        let db = setup();
        let repo = SqlitePropertyList::new(db.connection());

        let error = repo
            .create(
                &RuleId::new(),
                NewSyncProperty::new("address", "${ip}").unwrap(),
            )
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[test]
    fn test_list_orders_by_priority() {
        let db = setup();
        let rule_id = create_rule(&db, "hosts");

        add_property(&db, &rule_id, "address");
        add_property(&db, &rule_id, "name");
        add_property(&db, &rule_id, "zone");

        assert_eq!(fields(&db, &rule_id), vec!["address", "name", "zone"]);
    }

    #[test]
    fn test_get_scoped_to_rule() {
        let db = setup();
        let repo = SqlitePropertyList::new(db.connection());
        let rule_a = create_rule(&db, "hosts");
        let rule_b = create_rule(&db, "services");

        let property = add_property(&db, &rule_a, "address");

        assert!(repo.get(&rule_a, &property.id).unwrap().is_some());
        assert!(repo.get(&rule_b, &property.id).unwrap().is_none());
    }

    #[test]
    fn test_update_changes_mapping() {
        let db = setup();
        let repo = SqlitePropertyList::new(db.connection());
        let rule_id = create_rule(&db, "hosts");
        let property = add_property(&db, &rule_id, "address");

        let updated = repo
            .update(
                &rule_id,
                &property.id,
                UpdateSyncProperty {
                    destination_field: None,
                    source_expression: Some("${ipv6}".into()),
                },
            )
            .unwrap();

        assert_eq!(updated.source_expression, "${ipv6}");
        assert_eq!(updated.destination_field, "address");
        assert_eq!(updated.priority, property.priority);
    }

    #[test]
    fn test_move_last_to_front() {
        let db = setup();
        let repo = SqlitePropertyList::new(db.connection());
        let rule_id = create_rule(&db, "hosts");

        add_property(&db, &rule_id, "a");
        add_property(&db, &rule_id, "b");
        let last = add_property(&db, &rule_id, "c");

        let reordered = repo.move_to(&rule_id, &last.id, 1).unwrap();

        let order: Vec<&str> = reordered
            .iter()
            .map(|p| p.destination_field.as_str())
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);

        let priorities: Vec<i64> = reordered.iter().map(|p| p.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3]);
    }

    #[test]
    fn test_move_preserves_untouched_relative_order() {
        let db = setup();
        let repo = SqlitePropertyList::new(db.connection());
        let rule_id = create_rule(&db, "hosts");

        add_property(&db, &rule_id, "a");
        let second = add_property(&db, &rule_id, "b");
        add_property(&db, &rule_id, "c");
        add_property(&db, &rule_id, "d");

        repo.move_to(&rule_id, &second.id, 4).unwrap();

        assert_eq!(fields(&db, &rule_id), vec!["a", "c", "d", "b"]);
    }

    #[test]
    fn test_move_to_current_position_is_idempotent() {
        let db = setup();
        let repo = SqlitePropertyList::new(db.connection());
        let rule_id = create_rule(&db, "hosts");

        add_property(&db, &rule_id, "a");
        let second = add_property(&db, &rule_id, "b");

        let before = repo.list(&rule_id).unwrap();
        let after = repo.move_to(&rule_id, &second.id, 2).unwrap();

        // No sibling changes, timestamps included
        assert_eq!(before, after);
    }

    #[test]
    fn test_move_clamps_out_of_range_position() {
        let db = setup();
        let repo = SqlitePropertyList::new(db.connection());
        let rule_id = create_rule(&db, "hosts");

        let first = add_property(&db, &rule_id, "a");
        add_property(&db, &rule_id, "b");

        repo.move_to(&rule_id, &first.id, 99).unwrap();
        assert_eq!(fields(&db, &rule_id), vec!["b", "a"]);
    }

    #[test]
    fn test_move_rejects_foreign_property() {
        let db = setup();
        let repo = SqlitePropertyList::new(db.connection());
        let rule_a = create_rule(&db, "hosts");
        let rule_b = create_rule(&db, "services");

        let property = add_property(&db, &rule_a, "address");

        let error = repo.move_to(&rule_b, &property.id, 1).unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[test]
    fn test_delete_keeps_order_of_remaining() {
        let db = setup();
        let repo = SqlitePropertyList::new(db.connection());
        let rule_id = create_rule(&db, "hosts");

        add_property(&db, &rule_id, "a");
        let second = add_property(&db, &rule_id, "b");
        add_property(&db, &rule_id, "c");

        repo.delete(&rule_id, &second.id).unwrap();
        assert_eq!(fields(&db, &rule_id), vec!["a", "c"]);
    }

    #[test]
    fn test_has_any() {
        let db = setup();
        let repo = SqlitePropertyList::new(db.connection());
        let rule_id = create_rule(&db, "hosts");

        assert!(!repo.has_any(&rule_id).unwrap());
        add_property(&db, &rule_id, "address");
        assert!(repo.has_any(&rule_id).unwrap());
    }
}
