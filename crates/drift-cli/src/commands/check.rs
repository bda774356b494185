use std::path::Path;

use drift_core::{CheckOutcome, RuleLifecycle};

use crate::cli::CheckOutcomeArg;
use crate::commands::common::{open_database, resolve_rule};
use crate::error::CliError;

pub fn run_check(
    rule_query: &str,
    outcome: CheckOutcomeArg,
    message: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let rule = resolve_rule(rule_query, &db)?;

    let outcome = match outcome {
        CheckOutcomeArg::InSync => CheckOutcome::InSync,
        CheckOutcomeArg::Pending => CheckOutcome::ChangesPending,
        CheckOutcomeArg::Failed => {
            let message = message
                .filter(|m| !m.trim().is_empty())
                .ok_or(CliError::MissingFailureMessage("check"))?;
            CheckOutcome::Failed { message }
        }
    };

    let lifecycle = RuleLifecycle::new(db.connection());
    let updated = lifecycle.record_check(&rule.id, &outcome)?;
    let status = lifecycle.status(&updated.id)?;

    println!("{}", status.message()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use drift_core::db::{Database, RuleStore, SqliteRuleStore};
    use drift_core::models::{NewSyncRule, SyncState};
    use pretty_assertions::assert_eq;

    use super::run_check;
    use crate::cli::CheckOutcomeArg;
    use crate::commands::common::tests::{cleanup_db_files, unique_test_db_path};
    use crate::error::CliError;

    #[test]
    fn run_check_records_pending_changes() {
        let db_path = unique_test_db_path();
        {
            let db = Database::open(&db_path).unwrap();
            SqliteRuleStore::new(db.connection())
                .create(NewSyncRule::new("hosts", "").unwrap())
                .unwrap();
        }

        run_check("hosts", CheckOutcomeArg::Pending, None, &db_path).unwrap();

        let db = Database::open(&db_path).unwrap();
        let rule = SqliteRuleStore::new(db.connection())
            .get_by_name("hosts")
            .unwrap()
            .unwrap();
        assert_eq!(rule.state, SyncState::PendingChanges);
        drop(db);

        cleanup_db_files(&db_path);
    }

    #[test]
    fn run_check_failed_requires_message() {
        let db_path = unique_test_db_path();
        {
            let db = Database::open(&db_path).unwrap();
            SqliteRuleStore::new(db.connection())
                .create(NewSyncRule::new("hosts", "").unwrap())
                .unwrap();
        }

        let error = run_check("hosts", CheckOutcomeArg::Failed, None, &db_path).unwrap_err();
        assert!(matches!(error, CliError::MissingFailureMessage("check")));

        cleanup_db_files(&db_path);
    }
}
