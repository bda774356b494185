//! Database layer for drift

mod connection;
mod migrations;
mod property_repository;
mod rule_repository;
mod run_repository;

pub use connection::Database;
pub use property_repository::{PropertyList, SqlitePropertyList};
pub use rule_repository::{RuleStore, SqliteRuleStore};
pub use run_repository::{RunHistory, SqliteRunHistory};

use crate::error::Result;
use rusqlite::Connection;

/// Run `f` inside an immediate transaction, rolling back on error
///
/// Manual BEGIN/COMMIT because the repositories borrow the connection
/// immutably and `rusqlite::Transaction` requires `&mut`.
pub(crate) fn in_transaction<T>(conn: &Connection, f: impl FnOnce() -> Result<T>) -> Result<T> {
    conn.execute_batch("BEGIN IMMEDIATE")?;
    match f() {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            conn.execute_batch("ROLLBACK").ok();
            Err(error)
        }
    }
}
