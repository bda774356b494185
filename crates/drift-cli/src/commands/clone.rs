use std::path::Path;

use drift_core::db::{RuleStore, SqliteRuleStore};

use crate::commands::common::{open_database, resolve_rule};
use crate::error::CliError;

pub fn run_clone(rule_query: &str, new_name: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let rule = resolve_rule(rule_query, &db)?;

    let clone = SqliteRuleStore::new(db.connection()).clone_rule(&rule.id, new_name)?;
    println!("{}", clone.id);
    Ok(())
}
