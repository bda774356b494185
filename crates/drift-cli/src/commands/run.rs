use std::path::Path;

use drift_core::models::{RunId, RunOutcome, RunReport};
use drift_core::RuleLifecycle;

use crate::cli::RunOutcomeArg;
use crate::commands::common::{open_database, resolve_rule};
use crate::error::CliError;

pub fn run_start(rule_query: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let rule = resolve_rule(rule_query, &db)?;

    let run = RuleLifecycle::new(db.connection()).start_run(&rule.id)?;
    println!("{}", run.id);
    Ok(())
}

pub fn run_complete(
    run_id: &str,
    outcome: RunOutcomeArg,
    changes: i64,
    message: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let run_id = run_id
        .trim()
        .parse::<RunId>()
        .map_err(|_| CliError::InvalidRunId(run_id.to_string()))?;

    let outcome = match outcome {
        RunOutcomeArg::Succeeded => RunOutcome::Succeeded,
        RunOutcomeArg::Failed => RunOutcome::Failed,
        RunOutcomeArg::Indeterminate => RunOutcome::Indeterminate,
    };
    if outcome == RunOutcome::Failed
        && message.as_deref().is_none_or(|m| m.trim().is_empty())
    {
        return Err(CliError::MissingFailureMessage("run"));
    }

    let db = open_database(db_path)?;
    let lifecycle = RuleLifecycle::new(db.connection());
    let closed = lifecycle.complete_run(&run_id, RunReport::new(outcome, changes, message)?)?;
    let status = lifecycle.status(&closed.rule_id)?;

    println!("{}", status.message()?);
    Ok(())
}
