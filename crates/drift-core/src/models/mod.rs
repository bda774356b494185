//! Data models for drift

mod property;
mod rule;
mod run;

pub use property::{
    referenced_columns, NewSyncProperty, PropertyId, SyncProperty, UpdateSyncProperty,
};
pub use rule::{normalize_rule_name, NewSyncRule, RuleId, SyncRule, SyncState, UpdateSyncRule};
pub use run::{RunId, RunOutcome, RunReport, SyncRun};
