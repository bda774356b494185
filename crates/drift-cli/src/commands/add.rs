use std::path::Path;

use drift_core::db::{RuleStore, SqliteRuleStore};
use drift_core::models::NewSyncRule;

use crate::commands::common::open_database;
use crate::error::CliError;

pub fn run_add(name: &str, description: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let repo = SqliteRuleStore::new(db.connection());
    let rule = repo.create(NewSyncRule::new(name, description)?)?;

    println!("{}", rule.id);
    Ok(())
}
