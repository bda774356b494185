use std::path::Path;

use drift_core::db::{RunHistory, SqliteRunHistory};

use crate::commands::common::{
    format_run_lines, open_database, resolve_rule, run_to_list_item, RunListItem,
};
use crate::error::CliError;

pub fn run_history(
    rule_query: &str,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let rule = resolve_rule(rule_query, &db)?;

    let mut runs = SqliteRunHistory::new(db.connection()).list_all(&rule.id)?;
    runs.truncate(limit);

    if as_json {
        let json_items = runs.iter().map(run_to_list_item).collect::<Vec<RunListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if runs.is_empty() {
        println!("Rule '{}' has no run history yet.", rule.name);
    } else {
        for line in format_run_lines(&runs) {
            println!("{line}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use drift_core::db::{Database, PropertyList, RuleStore, SqlitePropertyList, SqliteRuleStore};
    use drift_core::models::{NewSyncProperty, NewSyncRule, RunOutcome, RunReport};
    use drift_core::RuleLifecycle;

    use super::run_history;
    use crate::commands::common::tests::{cleanup_db_files, unique_test_db_path};

    #[test]
    fn run_history_handles_open_and_closed_runs() {
        let db_path = unique_test_db_path();
        {
            let db = Database::open(&db_path).unwrap();
            let rule = SqliteRuleStore::new(db.connection())
                .create(NewSyncRule::new("hosts", "").unwrap())
                .unwrap();
            SqlitePropertyList::new(db.connection())
                .create(&rule.id, NewSyncProperty::new("address", "${ip}").unwrap())
                .unwrap();

            let lifecycle = RuleLifecycle::new(db.connection());
            let run = lifecycle.start_run(&rule.id).unwrap();
            lifecycle
                .complete_run(
                    &run.id,
                    RunReport::new(RunOutcome::Succeeded, 3, None).unwrap(),
                )
                .unwrap();
            lifecycle.start_run(&rule.id).unwrap();
        }

        run_history("hosts", 10, false, &db_path).unwrap();
        run_history("hosts", 10, true, &db_path).unwrap();

        cleanup_db_files(&db_path);
    }
}
