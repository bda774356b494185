pub mod add;
pub mod check;
pub mod clone;
pub mod common;
pub mod completions;
pub mod delete;
pub mod edit;
pub mod history;
pub mod list;
pub mod property;
pub mod run;
pub mod show;
