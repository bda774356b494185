use std::path::Path;

use drift_core::db::{RuleStore, SqliteRuleStore};

use crate::commands::common::{
    format_rule_lines, open_database, rule_to_list_item, RuleListItem,
};
use crate::error::CliError;

pub fn run_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let rules = SqliteRuleStore::new(db.connection()).list()?;

    if as_json {
        let json_items = rules
            .iter()
            .map(rule_to_list_item)
            .collect::<Vec<RuleListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_rule_lines(&rules) {
            println!("{line}");
        }
    }

    Ok(())
}
