use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use drift_core::db::{Database, RuleStore, SqliteRuleStore};
pub use drift_core::lifecycle::format_timestamp;
use drift_core::models::{RuleId, SyncProperty, SyncRule, SyncRun};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct RuleListItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub state: String,
    pub last_attempt: Option<i64>,
    pub last_attempt_iso: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PropertyListItem {
    pub id: String,
    pub position: usize,
    pub destination_field: String,
    pub source_expression: String,
    pub referenced_columns: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RunListItem {
    pub id: String,
    pub rule_name: String,
    pub started_at: i64,
    pub started_at_iso: String,
    pub finished_at_iso: Option<String>,
    pub outcome: Option<String>,
    pub changes_applied: Option<i64>,
}

pub fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::debug!(path = %path.display(), "Opening database");
    Ok(Database::open(path)?)
}

/// Resolve a rule from operator input: exact ID, unique name, or unique
/// ID prefix.
pub fn resolve_rule(rule_query: &str, db: &Database) -> Result<SyncRule, CliError> {
    let query = rule_query.trim();
    if query.is_empty() {
        return Err(CliError::EmptyRuleIdentifier);
    }

    let repo = SqliteRuleStore::new(db.connection());

    if let Ok(rule_id) = query.parse::<RuleId>() {
        if let Some(rule) = repo.get(&rule_id)? {
            return Ok(rule);
        }
    }

    if let Some(rule) = repo.get_by_name(query)? {
        return Ok(rule);
    }

    let matching_ids = repo.list_ids_by_prefix(query, 3)?;

    match matching_ids.len() {
        0 => Err(CliError::RuleNotFound(query.to_string())),
        1 => {
            let resolved_id = matching_ids[0]
                .parse::<RuleId>()
                .map_err(|_| CliError::RuleNotFound(query.to_string()))?;
            repo.get(&resolved_id)?
                .ok_or_else(|| CliError::RuleNotFound(query.to_string()))
        }
        _ => {
            let options = matching_ids
                .iter()
                .take(3)
                .map(|id| id.chars().take(13).collect::<String>())
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousRuleId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn rule_to_list_item(rule: &SyncRule) -> RuleListItem {
    RuleListItem {
        id: rule.id.to_string(),
        name: rule.name.clone(),
        description: rule.description.clone(),
        state: rule.state.to_string(),
        last_attempt: rule.last_attempt,
        last_attempt_iso: rule.last_attempt.map(format_timestamp),
    }
}

pub fn property_to_list_item(property: &SyncProperty, position: usize) -> PropertyListItem {
    PropertyListItem {
        id: property.id.to_string(),
        position,
        destination_field: property.destination_field.clone(),
        source_expression: property.source_expression.clone(),
        referenced_columns: property.referenced_columns(),
    }
}

pub fn run_to_list_item(run: &SyncRun) -> RunListItem {
    RunListItem {
        id: run.id.to_string(),
        rule_name: run.rule_name.clone(),
        started_at: run.started_at,
        started_at_iso: format_timestamp(run.started_at),
        finished_at_iso: run.finished_at.map(format_timestamp),
        outcome: run.outcome.map(|outcome| outcome.to_string()),
        changes_applied: run.changes_applied,
    }
}

pub fn format_rule_lines(rules: &[SyncRule]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    rules
        .iter()
        .map(|rule| {
            let id = rule.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let checked = rule.last_attempt.map_or_else(
                || "never checked".to_string(),
                |at| format_relative_time(at, now_ms),
            );
            format!(
                "{short_id:<13}  {:<28}  {:<16}  {checked}",
                rule.name, rule.state
            )
        })
        .collect()
}

pub fn format_property_lines(properties: &[SyncProperty]) -> Vec<String> {
    properties
        .iter()
        .enumerate()
        .map(|(index, property)| {
            let id = property.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            format!(
                "{:>3}  {short_id:<13}  {:<24}  {}",
                index + 1,
                property.destination_field,
                property.source_expression
            )
        })
        .collect()
}

pub fn format_run_lines(runs: &[SyncRun]) -> Vec<String> {
    runs.iter()
        .map(|run| {
            let id = run.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let outcome = run
                .outcome
                .map_or_else(|| "running".to_string(), |outcome| outcome.to_string());
            let changes = run
                .changes_applied
                .map_or_else(String::new, |count| format!("  changes={count}"));
            format!(
                "{short_id:<13}  {}  {outcome:<13}{changes}",
                format_timestamp(run.started_at)
            )
        })
        .collect()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("DRIFT_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("drift")
        .join("drift.db")
}
