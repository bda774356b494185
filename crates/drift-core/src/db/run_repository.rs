//! Sync run history implementation

use crate::error::{Error, Result};
use crate::models::{RuleId, RunId, RunOutcome, SyncRun, SyncRule};
use rusqlite::{params, Connection};

const RUN_COLUMNS: &str =
    "id, rule_id, rule_name, started_at, finished_at, outcome, changes_applied";

/// Trait for the append-only run log of a sync rule
pub trait RunHistory {
    /// Open a new run entry, capturing the rule's current name
    fn record_start(&self, rule: &SyncRule) -> Result<SyncRun>;

    /// Close a run with its outcome, making it immutable
    fn record_result(
        &self,
        run_id: &RunId,
        outcome: RunOutcome,
        changes_applied: i64,
    ) -> Result<SyncRun>;

    /// Get a run by ID
    fn get(&self, run_id: &RunId) -> Result<Option<SyncRun>>;

    /// Most recent closed run for the rule, if any
    fn latest(&self, rule_id: &RuleId) -> Result<Option<SyncRun>>;

    /// Full history for the rule, most recent first (open runs included)
    fn list_all(&self, rule_id: &RuleId) -> Result<Vec<SyncRun>>;
}

/// `SQLite` implementation of `RunHistory`
pub struct SqliteRunHistory<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRunHistory<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a run from a database row
    fn parse_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncRun> {
        let id: String = row.get(0)?;
        let rule_id: String = row.get(1)?;
        let outcome: Option<String> = row.get(5)?;
        let outcome = outcome
            .map(|value| {
                value.parse::<RunOutcome>().map_err(|_| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        format!("invalid run outcome: {value}").into(),
                    )
                })
            })
            .transpose()?;
        Ok(SyncRun {
            id: id.parse().unwrap_or_default(),
            rule_id: rule_id.parse().unwrap_or_default(),
            rule_name: row.get(2)?,
            started_at: row.get(3)?,
            finished_at: row.get(4)?,
            outcome,
            changes_applied: row.get(6)?,
        })
    }

    fn require(&self, run_id: &RunId) -> Result<SyncRun> {
        self.get(run_id)?
            .ok_or_else(|| Error::NotFound(format!("Sync run {run_id}")))
    }
}

impl RunHistory for SqliteRunHistory<'_> {
    fn record_start(&self, rule: &SyncRule) -> Result<SyncRun> {
        let run = SyncRun::start(rule.id, rule.name.clone());

        self.conn.execute(
            "INSERT INTO sync_runs
             (id, rule_id, rule_name, started_at, finished_at, outcome, changes_applied)
             VALUES (?, ?, ?, ?, NULL, NULL, NULL)",
            params![
                run.id.as_str(),
                run.rule_id.as_str(),
                run.rule_name,
                run.started_at
            ],
        )?;

        tracing::debug!(rule = %rule.id, run = %run.id, "Run started");
        Ok(run)
    }

    fn record_result(
        &self,
        run_id: &RunId,
        outcome: RunOutcome,
        changes_applied: i64,
    ) -> Result<SyncRun> {
        let run = self.require(run_id)?;
        if run.is_closed() {
            return Err(Error::Integrity(format!(
                "Sync run {run_id} is already closed and immutable"
            )));
        }

        let finished_at = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "UPDATE sync_runs
             SET finished_at = ?, outcome = ?, changes_applied = ?
             WHERE id = ? AND finished_at IS NULL",
            params![finished_at, outcome.as_str(), changes_applied, run_id.as_str()],
        )?;

        tracing::debug!(run = %run_id, outcome = %outcome, changes = changes_applied,
            "Run closed");
        self.require(run_id)
    }

    fn get(&self, run_id: &RunId) -> Result<Option<SyncRun>> {
        let result = self.conn.query_row(
            &format!("SELECT {RUN_COLUMNS} FROM sync_runs WHERE id = ?"),
            params![run_id.as_str()],
            Self::parse_run,
        );

        match result {
            Ok(run) => Ok(Some(run)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn latest(&self, rule_id: &RuleId) -> Result<Option<SyncRun>> {
        let result = self.conn.query_row(
            &format!(
                "SELECT {RUN_COLUMNS} FROM sync_runs
                 WHERE rule_id = ? AND finished_at IS NOT NULL
                 ORDER BY started_at DESC, id DESC
                 LIMIT 1"
            ),
            params![rule_id.as_str()],
            Self::parse_run,
        );

        match result {
            Ok(run) => Ok(Some(run)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_all(&self, rule_id: &RuleId) -> Result<Vec<SyncRun>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM sync_runs
             WHERE rule_id = ?
             ORDER BY started_at DESC, id DESC"
        ))?;

        let runs = stmt
            .query_map(params![rule_id.as_str()], Self::parse_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(runs)
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

    fn create_rule(db: &Database, name: &str) -> SyncRule {
        SqliteRuleStore::new(db.connection())
            .create(NewSyncRule::new(name, "").unwrap())
            .unwrap()
    }

    #[test]
    fn test_record_start_captures_rule_name() {
        let db = setup();
        let rules = SqliteRuleStore::new(db.connection());
        let runs = SqliteRunHistory::new(db.connection());

        let rule = create_rule(&db, "hosts");
        let run = runs.record_start(&rule).unwrap();
        assert_eq!(run.rule_name, "hosts");
        assert!(!run.is_closed());

        // Renaming the rule afterwards must not touch the captured name
        rules
            .update(
                &rule.id,
                crate::models::UpdateSyncRule {
                    name: Some("hosts v2".into()),
                    description: None,
                },
            )
            .unwrap();

        let stored = runs.get(&run.id).unwrap().unwrap();
        assert_eq!(stored.rule_name, "hosts");
    }

    #[test]
    fn test_record_result_closes_run() {
        let db = setup();
        let runs = SqliteRunHistory::new(db.connection());
        let rule = create_rule(&db, "hosts");

        let run = runs.record_start(&rule).unwrap();
        let closed = runs
            .record_result(&run.id, RunOutcome::Succeeded, 7)
            .unwrap();

        assert!(closed.is_closed());
        assert_eq!(closed.outcome, Some(RunOutcome::Succeeded));
        assert_eq!(closed.changes_applied, Some(7));
    }

    #[test]
    fn test_record_result_twice_is_integrity_error() {
        let db = setup();
        let runs = SqliteRunHistory::new(db.connection());
        let rule = create_rule(&db, "hosts");

        let run = runs.record_start(&rule).unwrap();
        runs.record_result(&run.id, RunOutcome::Succeeded, 1)
            .unwrap();

        let error = runs
            .record_result(&run.id, RunOutcome::Failed, 0)
            .unwrap_err();
        assert!(matches!(error, Error::Integrity(_)));

        // First result must be untouched
        let stored = runs.get(&run.id).unwrap().unwrap();
        assert_eq!(stored.outcome, Some(RunOutcome::Succeeded));
    }

    #[test]
    fn test_record_result_missing_run() {
        let db = setup();
        let runs = SqliteRunHistory::new(db.connection());

        let error = runs
            .record_result(&RunId::new(), RunOutcome::Succeeded, 0)
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[test]
    fn test_latest_ignores_open_runs() {
        let db = setup();
        let runs = SqliteRunHistory::new(db.connection());
        let rule = create_rule(&db, "hosts");

        assert!(runs.latest(&rule.id).unwrap().is_none());

        let first = runs.record_start(&rule).unwrap();
        runs.record_result(&first.id, RunOutcome::Succeeded, 2)
            .unwrap();
        let open = runs.record_start(&rule).unwrap();

        let latest = runs.latest(&rule.id).unwrap().unwrap();
        assert_eq!(latest.id, first.id);
        assert_ne!(latest.id, open.id);
    }

    #[test]
    fn test_list_all_most_recent_first() {
        let db = setup();
        let runs = SqliteRunHistory::new(db.connection());
        let rule = create_rule(&db, "hosts");

        let mut started = Vec::new();
        for changes in 0..3 {
            let run = runs.record_start(&rule).unwrap();
            runs.record_result(&run.id, RunOutcome::Succeeded, changes)
                .unwrap();
            started.push(run.id);
        }

        let history = runs.list_all(&rule.id).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].started_at >= history[1].started_at);
        assert_eq!(history[0].id, started[2]);
    }
}
