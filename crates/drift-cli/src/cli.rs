use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "drift")]
#[command(about = "Manage sync rules that reconcile imported data into monitoring configuration")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List sync rules with their current state
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a rule: status message, advisories, and last run details
    Show {
        /// Rule name, ID, or unique ID prefix
        rule: String,
    },
    /// Create a new sync rule
    #[command(alias = "new")]
    Add {
        /// Unique rule name
        name: String,
        /// Free-form description
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Edit a rule's name or description
    Edit {
        /// Rule name, ID, or unique ID prefix
        rule: String,
        /// New rule name
        #[arg(long)]
        name: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a rule and its properties (run history is kept)
    Delete {
        /// Rule name, ID, or unique ID prefix
        rule: String,
    },
    /// Clone a rule and its ordered properties under a new name
    Clone {
        /// Rule name, ID, or unique ID prefix
        rule: String,
        /// Name for the clone
        new_name: String,
    },
    /// Manage a rule's ordered sync properties
    Property {
        #[command(subcommand)]
        command: PropertyCommands,
    },
    /// Show a rule's run history, most recent first
    History {
        /// Rule name, ID, or unique ID prefix
        rule: String,
        /// Number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report the outcome of a check performed by the executor
    Check {
        /// Rule name, ID, or unique ID prefix
        rule: String,
        /// What the check found
        #[arg(long, value_enum)]
        outcome: CheckOutcomeArg,
        /// Error message; required when the outcome is failed
        #[arg(long)]
        message: Option<String>,
    },
    /// Start or complete sync runs
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum PropertyCommands {
    /// List a rule's properties in execution order
    List {
        /// Rule name, ID, or unique ID prefix
        rule: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a property, appended at the end of the order
    Add {
        /// Rule name, ID, or unique ID prefix
        rule: String,
        /// Destination field to write
        destination: String,
        /// Source expression, e.g. '${hostname}.example.com'
        expression: String,
    },
    /// Edit a property's mapping
    Edit {
        /// Rule name, ID, or unique ID prefix
        rule: String,
        /// Property ID
        property: String,
        /// New destination field
        #[arg(long)]
        destination: Option<String>,
        /// New source expression
        #[arg(long)]
        expression: Option<String>,
    },
    /// Delete a property
    Delete {
        /// Rule name, ID, or unique ID prefix
        rule: String,
        /// Property ID
        property: String,
    },
    /// Move a property to a 1-based position in the order
    Move {
        /// Rule name, ID, or unique ID prefix
        rule: String,
        /// Property ID
        property: String,
        /// Target position, 1-based
        position: usize,
    },
}

#[derive(Subcommand)]
pub enum RunCommands {
    /// Open a run for a rule; prints the run ID
    Start {
        /// Rule name, ID, or unique ID prefix
        rule: String,
    },
    /// Close a run with the executor's result
    Complete {
        /// Run ID printed by `drift run start`
        run_id: String,
        /// How the run ended
        #[arg(long, value_enum)]
        outcome: RunOutcomeArg,
        /// Number of changes applied
        #[arg(long, default_value = "0")]
        changes: i64,
        /// Error message; required when the outcome is failed
        #[arg(long)]
        message: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CheckOutcomeArg {
    /// No pending differences
    InSync,
    /// Differences found; a run would apply them
    Pending,
    /// The check raised an error
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum RunOutcomeArg {
    Succeeded,
    Failed,
    Indeterminate,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
