//! drift-core - Core library for drift
//!
//! This crate contains the sync rule models, storage layer, and the rule
//! status/run lifecycle shared by all drift interfaces.

pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;

pub use error::{Error, Result};
pub use lifecycle::{CheckOutcome, RuleLifecycle, RuleStatus};
pub use models::{RuleId, SyncProperty, SyncRule, SyncRun, SyncState};
