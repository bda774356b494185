use std::path::Path;

use drift_core::lifecycle::RuleLifecycle;

use crate::commands::common::{format_timestamp, open_database, resolve_rule};
use crate::error::CliError;

/// Render a rule the way the operator sees it: description, gating hints,
/// the state message, and the last run details with rename detection.
pub fn run_show(rule_query: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let rule = resolve_rule(rule_query, &db)?;
    let lifecycle = RuleLifecycle::new(db.connection());
    let status = lifecycle.status(&rule.id)?;

    println!("Sync rule: {}", status.rule.name);
    if !status.rule.description.is_empty() {
        println!("{}", status.rule.description);
    }

    // A rule without properties is not runnable; point at property setup
    // instead of showing sync status.
    if let Some(hint) = status.setup_hint() {
        println!();
        println!("warning: {hint}");
        println!(
            "         try: drift property add '{}' <destination> <expression>",
            status.rule.name
        );
        return Ok(());
    }

    if let Some(advisory) = status.advisory() {
        println!();
        println!("warning: {advisory}");
    }

    println!();
    println!("{}", status.message()?);

    if let Some(last_run) = &status.last_run {
        println!();
        println!("Last sync run details");
        println!("  run:     {}", last_run.id);
        println!("  started: {}", format_timestamp(last_run.started_at));
        if let Some(finished_at) = last_run.finished_at {
            println!("  ended:   {}", format_timestamp(finished_at));
        }
        if let Some(outcome) = last_run.outcome {
            println!("  outcome: {outcome}");
        }
        if let Some(changes) = last_run.changes_applied {
            println!("  changes: {changes}");
        }
        if let Some(former_name) = &status.renamed_from {
            println!();
            println!("It has been renamed since then, its former name was {former_name}.");
        }
    }

    Ok(())
}
