use std::path::Path;

use drift_core::db::{RuleStore, SqliteRuleStore};

use crate::commands::common::{open_database, resolve_rule};
use crate::error::CliError;

pub fn run_delete(rule_query: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let rule = resolve_rule(rule_query, &db)?;

    SqliteRuleStore::new(db.connection()).delete(&rule.id)?;
    println!("{}", rule.id);
    Ok(())
}
