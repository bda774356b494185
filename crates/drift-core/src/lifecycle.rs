//! Sync rule lifecycle
//!
//! The status state machine for a sync rule. Check and run outcomes are
//! reported by the external reconciliation executor; this module applies
//! them to the rule's stored state, gates run starts, and answers status
//! queries including the fixed operator-facing message per state.
//!
//! All state and last-run writes go through here; repositories expose the
//! raw writers only crate-internally.

use rusqlite::Connection;

use crate::db::{
    in_transaction, PropertyList, RuleStore, RunHistory, SqlitePropertyList, SqliteRuleStore,
    SqliteRunHistory,
};
use crate::error::{Error, Result};
use crate::models::{RuleId, RunId, RunOutcome, RunReport, SyncRule, SyncRun, SyncState};

/// Outcome of a dry-run check reported by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// No pending differences
    InSync,
    /// Differences found that a run would apply
    ChangesPending,
    /// The check itself raised an error
    Failed {
        /// What went wrong; must be non-empty
        message: String,
    },
}

/// Point-in-time view of a rule's lifecycle state
///
/// `never_run` is distinct from state `Unknown`: a rule can be unknown
/// either because no run ever completed, or because the most recent run
/// reported an indeterminate outcome. The two must not be conflated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleStatus {
    /// The rule as currently stored
    pub rule: SyncRule,
    /// Whether the rule has properties; a rule without any cannot run
    pub has_properties: bool,
    /// True when no run has ever completed for this rule
    pub never_run: bool,
    /// Most recent completed run, if any
    pub last_run: Option<SyncRun>,
    /// Name the rule had when the last run started, when it differs from
    /// the current name
    pub renamed_from: Option<String>,
}

impl RuleStatus {
    /// The one status message for the rule's current state
    ///
    /// Exactly one of four fixed templates. `Failing` requires both a
    /// timestamp and an error message; their absence is a stored-data bug
    /// and surfaces as [`Error::Integrity`].
    pub fn message(&self) -> Result<String> {
        match self.rule.state {
            SyncState::Unknown => Ok(
                "It's currently unknown whether we are in sync with this rule. \
                 You should either check for changes or trigger a new sync run."
                    .to_string(),
            ),
            SyncState::InSync => {
                let at = self.last_attempt_or_integrity_error()?;
                Ok(format!(
                    "This sync rule was last found to be in sync at {at}."
                ))
            }
            SyncState::PendingChanges => Ok(
                "There are pending changes for this sync rule. \
                 You should trigger a new sync run."
                    .to_string(),
            ),
            SyncState::Failing => {
                let at = self.last_attempt_or_integrity_error()?;
                let message = self
                    .rule
                    .last_error
                    .as_deref()
                    .filter(|m| !m.trim().is_empty())
                    .ok_or_else(|| {
                        Error::Integrity(format!(
                            "Rule {} is failing without an error message",
                            self.rule.id
                        ))
                    })?;
                Ok(format!(
                    "This sync rule failed when last checked at {at}: {message}"
                ))
            }
        }
    }

    /// Advisory shown in addition to the state message when the rule has
    /// never completed a run
    #[must_use]
    pub const fn advisory(&self) -> Option<&'static str> {
        if self.never_run {
            Some("This sync rule has never been run before.")
        } else {
            None
        }
    }

    /// Setup hint shown instead of run controls when no properties exist
    #[must_use]
    pub const fn setup_hint(&self) -> Option<&'static str> {
        if self.has_properties {
            None
        } else {
            Some("You must define some sync properties before you can run this sync rule.")
        }
    }

    fn last_attempt_or_integrity_error(&self) -> Result<String> {
        let at = self.rule.last_attempt.ok_or_else(|| {
            Error::Integrity(format!(
                "Rule {} is {} without a last-attempt timestamp",
                self.rule.id, self.rule.state
            ))
        })?;
        Ok(format_timestamp(at))
    }
}

/// The lifecycle service combining rule store, property list, and run
/// history over one connection
pub struct RuleLifecycle<'a> {
    conn: &'a Connection,
    rules: SqliteRuleStore<'a>,
    properties: SqlitePropertyList<'a>,
    runs: SqliteRunHistory<'a>,
}

impl<'a> RuleLifecycle<'a> {
    /// Create a lifecycle service over the given connection
    #[must_use]
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            rules: SqliteRuleStore::new(conn),
            properties: SqlitePropertyList::new(conn),
            runs: SqliteRunHistory::new(conn),
        }
    }

    /// Snapshot the rule's lifecycle state for presentation
    pub fn status(&self, rule_id: &RuleId) -> Result<RuleStatus> {
        let rule = self.require_rule(rule_id)?;
        let has_properties = self.properties.has_any(rule_id)?;

        let last_run = match rule.last_run_id {
            Some(run_id) => self.runs.get(&run_id)?,
            None => self.runs.latest(rule_id)?,
        };
        let never_run = last_run.is_none();
        let renamed_from = last_run
            .as_ref()
            .filter(|run| run.rule_name != rule.name)
            .map(|run| run.rule_name.clone());

        Ok(RuleStatus {
            rule,
            has_properties,
            never_run,
            last_run,
            renamed_from,
        })
    }

    /// Apply a reported check outcome to the rule's state
    pub fn record_check(&self, rule_id: &RuleId, outcome: &CheckOutcome) -> Result<SyncRule> {
        self.require_rule(rule_id)?;
        let now = chrono::Utc::now().timestamp_millis();

        match outcome {
            CheckOutcome::InSync => {
                self.rules.set_state(rule_id, SyncState::InSync, now, None)?;
            }
            CheckOutcome::ChangesPending => {
                self.rules
                    .set_state(rule_id, SyncState::PendingChanges, now, None)?;
            }
            CheckOutcome::Failed { message } => {
                if message.trim().is_empty() {
                    return Err(Error::InvalidInput(
                        "A failed check must include an error message".into(),
                    ));
                }
                self.rules
                    .set_state(rule_id, SyncState::Failing, now, Some(message.as_str()))?;
            }
        }

        self.require_rule(rule_id)
    }

    /// Open a run for the rule
    ///
    /// Rejected with [`Error::Configuration`] when the rule has no
    /// properties; such a rule has nothing to apply.
    pub fn start_run(&self, rule_id: &RuleId) -> Result<SyncRun> {
        let rule = self.require_rule(rule_id)?;

        if !self.properties.has_any(rule_id)? {
            return Err(Error::Configuration(format!(
                "Rule '{}' has no sync properties; define properties before running it",
                rule.name
            )));
        }

        self.runs.record_start(&rule)
    }

    /// Close a run with the executor's report and update the rule's state
    ///
    /// All-or-nothing: closing the run, pointing the rule at it, and the
    /// state transition commit together or not at all. A closed run is
    /// immutable, so a partial write here could never be retried.
    pub fn complete_run(&self, run_id: &RunId, report: RunReport) -> Result<SyncRun> {
        // Validate before touching the store; the report's fields are pub
        // and may not have gone through RunReport::new.
        let error_message = report
            .error_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());
        if report.outcome == RunOutcome::Failed && error_message.is_none() {
            return Err(Error::InvalidInput(
                "A failed run must include an error message".into(),
            ));
        }

        let run = self
            .runs
            .get(run_id)?
            .ok_or_else(|| Error::NotFound(format!("Sync run {run_id}")))?;
        self.require_rule(&run.rule_id)?;

        let closed = in_transaction(self.conn, || {
            let closed = self
                .runs
                .record_result(run_id, report.outcome, report.changes_applied)?;
            let finished_at = closed
                .finished_at
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

            self.rules.set_last_run(&run.rule_id, run_id)?;
            match report.outcome {
                RunOutcome::Succeeded => {
                    self.rules
                        .set_state(&run.rule_id, SyncState::InSync, finished_at, None)?;
                }
                RunOutcome::Indeterminate => {
                    self.rules
                        .set_state(&run.rule_id, SyncState::Unknown, finished_at, None)?;
                }
                RunOutcome::Failed => {
                    self.rules.set_state(
                        &run.rule_id,
                        SyncState::Failing,
                        finished_at,
                        error_message,
                    )?;
                }
            }

            Ok(closed)
        })?;

        tracing::info!(rule = %run.rule_id, run = %run_id, outcome = %report.outcome,
            "Run completed");
        Ok(closed)
    }

    fn require_rule(&self, rule_id: &RuleId) -> Result<SyncRule> {
        self.rules
            .get(rule_id)?
            .ok_or_else(|| Error::NotFound(format!("Sync rule {rule_id}")))
    }
}

/// Render a unix-ms timestamp for status messages
#[must_use]
pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{NewSyncProperty, NewSyncRule};
    use pretty_assertions::assert_eq;
    use rusqlite::params;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn create_rule(db: &Database, name: &str) -> SyncRule {
        SqliteRuleStore::new(db.connection())
            .create(NewSyncRule::new(name, "reconcile hosts").unwrap())
            .unwrap()
    }

    fn add_property(db: &Database, rule_id: &RuleId) {
        SqlitePropertyList::new(db.connection())
            .create(rule_id, NewSyncProperty::new("address", "${ip}").unwrap())
            .unwrap();
    }

    #[test]
    fn test_initial_status_is_unknown_and_never_run() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());
        let rule = create_rule(&db, "hosts");

        let status = lifecycle.status(&rule.id).unwrap();
        assert_eq!(status.rule.state, SyncState::Unknown);
        assert!(status.never_run);
        assert!(status.advisory().is_some());
        assert!(status.message().unwrap().contains("currently unknown"));
    }

    #[test]
    fn test_setup_hint_gates_rules_without_properties() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());
        let rule = create_rule(&db, "hosts");

        let status = lifecycle.status(&rule.id).unwrap();
        assert!(status.setup_hint().is_some());

        add_property(&db, &rule.id);
        let status = lifecycle.status(&rule.id).unwrap();
        assert!(status.setup_hint().is_none());
    }

    #[test]
    fn test_start_run_rejects_rule_without_properties() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());
        let rule = create_rule(&db, "hosts");

        let error = lifecycle.start_run(&rule.id).unwrap_err();
        assert!(matches!(error, Error::Configuration(_)));
    }

    #[test]
    fn test_check_transitions() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());
        let rule = create_rule(&db, "hosts");

        let in_sync = lifecycle
            .record_check(&rule.id, &CheckOutcome::InSync)
            .unwrap();
        assert_eq!(in_sync.state, SyncState::InSync);
        assert!(in_sync.last_attempt.is_some());

        let pending = lifecycle
            .record_check(&rule.id, &CheckOutcome::ChangesPending)
            .unwrap();
        assert_eq!(pending.state, SyncState::PendingChanges);

        let failing = lifecycle
            .record_check(
                &rule.id,
                &CheckOutcome::Failed {
                    message: "import source vanished".into(),
                },
            )
            .unwrap();
        assert_eq!(failing.state, SyncState::Failing);
        assert_eq!(failing.last_error.as_deref(), Some("import source vanished"));

        // Recovering from failing clears the error message
        let recovered = lifecycle
            .record_check(&rule.id, &CheckOutcome::InSync)
            .unwrap();
        assert_eq!(recovered.state, SyncState::InSync);
        assert!(recovered.last_error.is_none());
    }

    #[test]
    fn test_failed_check_requires_message() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());
        let rule = create_rule(&db, "hosts");

        let error = lifecycle
            .record_check(
                &rule.id,
                &CheckOutcome::Failed {
                    message: "  ".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[test]
    fn test_successful_run_reaches_in_sync() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());
        let rule = create_rule(&db, "hosts");
        add_property(&db, &rule.id);

        let run = lifecycle.start_run(&rule.id).unwrap();
        lifecycle
            .complete_run(
                &run.id,
                RunReport::new(RunOutcome::Succeeded, 5, None).unwrap(),
            )
            .unwrap();

        let status = lifecycle.status(&rule.id).unwrap();
        assert_eq!(status.rule.state, SyncState::InSync);
        assert!(!status.never_run);
        assert!(status.advisory().is_none());
        assert_eq!(status.last_run.unwrap().changes_applied, Some(5));
        assert_eq!(status.rule.last_run_id, Some(run.id));
    }

    #[test]
    fn test_failed_run_reaches_failing_and_renders_message() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());
        let rule = create_rule(&db, "hosts");
        add_property(&db, &rule.id);

        let run = lifecycle.start_run(&rule.id).unwrap();
        lifecycle
            .complete_run(
                &run.id,
                RunReport::new(RunOutcome::Failed, 0, Some("timeout talking to API".into()))
                    .unwrap(),
            )
            .unwrap();

        let status = lifecycle.status(&rule.id).unwrap();
        assert_eq!(status.rule.state, SyncState::Failing);

        let message = status.message().unwrap();
        assert!(message.contains("failed when last checked at"));
        assert!(message.contains("timeout talking to API"));
    }

    #[test]
    fn test_indeterminate_run_leaves_unknown_without_advisory() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());
        let rule = create_rule(&db, "hosts");
        add_property(&db, &rule.id);

        let run = lifecycle.start_run(&rule.id).unwrap();
        lifecycle
            .complete_run(
                &run.id,
                RunReport::new(RunOutcome::Indeterminate, 0, None).unwrap(),
            )
            .unwrap();

        // Same state as a never-run rule, but a different fact: a run
        // happened and the advisory must not appear.
        let status = lifecycle.status(&rule.id).unwrap();
        assert_eq!(status.rule.state, SyncState::Unknown);
        assert!(!status.never_run);
        assert!(status.advisory().is_none());
        assert!(status.message().unwrap().contains("currently unknown"));
    }

    #[test]
    fn test_rename_detection_via_captured_run_name() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());
        let rules = SqliteRuleStore::new(db.connection());
        let rule = create_rule(&db, "hosts");
        add_property(&db, &rule.id);

        let run = lifecycle.start_run(&rule.id).unwrap();
        lifecycle
            .complete_run(
                &run.id,
                RunReport::new(RunOutcome::Succeeded, 2, None).unwrap(),
            )
            .unwrap();

        rules
            .update(
                &rule.id,
                crate::models::UpdateSyncRule {
                    name: Some("hosts v2".into()),
                    description: None,
                },
            )
            .unwrap();

        let status = lifecycle.status(&rule.id).unwrap();
        assert_eq!(status.renamed_from.as_deref(), Some("hosts"));
    }

    #[test]
    fn test_each_state_has_exactly_its_template() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());
        let rule = create_rule(&db, "hosts");

        let unknown = lifecycle.status(&rule.id).unwrap().message().unwrap();
        assert!(unknown.contains("currently unknown"));

        lifecycle
            .record_check(&rule.id, &CheckOutcome::ChangesPending)
            .unwrap();
        let pending = lifecycle.status(&rule.id).unwrap().message().unwrap();
        assert!(pending.contains("pending changes"));

        lifecycle
            .record_check(&rule.id, &CheckOutcome::InSync)
            .unwrap();
        let in_sync = lifecycle.status(&rule.id).unwrap().message().unwrap();
        assert!(in_sync.contains("found to be in sync at"));

        lifecycle
            .record_check(
                &rule.id,
                &CheckOutcome::Failed {
                    message: "boom".into(),
                },
            )
            .unwrap();
        let failing = lifecycle.status(&rule.id).unwrap().message().unwrap();
        assert!(failing.contains("failed when last checked at"));
        assert!(failing.contains("boom"));
    }

    #[test]
    fn test_failing_without_stored_message_is_integrity_error() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());
        let rule = create_rule(&db, "hosts");

        // Corrupt the row behind the lifecycle's back
        db.connection()
            .execute(
                "UPDATE sync_rules SET state = 'failing', last_attempt = 123, last_error = NULL
                 WHERE id = ?",
                params![rule.id.as_str()],
            )
            .unwrap();

        let error = lifecycle.status(&rule.id).unwrap().message().unwrap_err();
        assert!(matches!(error, Error::Integrity(_)));
    }

    #[test]
    fn test_failing_without_timestamp_is_integrity_error() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());
        let rule = create_rule(&db, "hosts");

        db.connection()
            .execute(
                "UPDATE sync_rules SET state = 'failing', last_attempt = NULL, last_error = 'x'
                 WHERE id = ?",
                params![rule.id.as_str()],
            )
            .unwrap();

        let error = lifecycle.status(&rule.id).unwrap().message().unwrap_err();
        assert!(matches!(error, Error::Integrity(_)));
    }

    #[test]
    fn test_complete_run_invalid_report_leaves_store_untouched() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());
        let runs = SqliteRunHistory::new(db.connection());
        let rule = create_rule(&db, "hosts");
        add_property(&db, &rule.id);

        let run = lifecycle.start_run(&rule.id).unwrap();

        // Hand-built report bypassing RunReport::new validation
        let error = lifecycle
            .complete_run(
                &run.id,
                RunReport {
                    outcome: RunOutcome::Failed,
                    changes_applied: 0,
                    error_message: None,
                },
            )
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));

        // The run must still be open and the rule unchanged
        let stored = runs.get(&run.id).unwrap().unwrap();
        assert!(!stored.is_closed());
        let status = lifecycle.status(&rule.id).unwrap();
        assert_eq!(status.rule.state, SyncState::Unknown);
        assert!(status.rule.last_run_id.is_none());

        // A corrected report closes the run normally
        lifecycle
            .complete_run(
                &run.id,
                RunReport::new(RunOutcome::Failed, 0, Some("executor crashed".into())).unwrap(),
            )
            .unwrap();
        let status = lifecycle.status(&rule.id).unwrap();
        assert_eq!(status.rule.state, SyncState::Failing);
        assert_eq!(status.rule.last_run_id, Some(run.id));
    }

    #[test]
    fn test_complete_run_unknown_run_id() {
        let db = setup();
        let lifecycle = RuleLifecycle::new(db.connection());

        let error = lifecycle
            .complete_run(
                &RunId::new(),
                RunReport::new(RunOutcome::Succeeded, 0, None).unwrap(),
            )
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }
}
