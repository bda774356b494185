use std::path::Path;

use drift_core::db::{RuleStore, SqliteRuleStore};
use drift_core::models::UpdateSyncRule;

use crate::commands::common::{open_database, resolve_rule};
use crate::error::CliError;

pub fn run_edit(
    rule_query: &str,
    name: Option<String>,
    description: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let rule = resolve_rule(rule_query, &db)?;

    let repo = SqliteRuleStore::new(db.connection());
    let updated = repo.update(&rule.id, UpdateSyncRule { name, description })?;

    println!("{}", updated.id);
    Ok(())
}
