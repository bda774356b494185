mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands, PropertyCommands, RunCommands};
use crate::commands::common::resolve_db_path;
use crate::error::CliError;

fn main() {
    if let Err(error) = run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("drift=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::List { json } => commands::list::run_list(json, &db_path),
        Commands::Show { rule } => commands::show::run_show(&rule, &db_path),
        Commands::Add { name, description } => {
            commands::add::run_add(&name, &description, &db_path)
        }
        Commands::Edit {
            rule,
            name,
            description,
        } => commands::edit::run_edit(&rule, name, description, &db_path),
        Commands::Delete { rule } => commands::delete::run_delete(&rule, &db_path),
        Commands::Clone { rule, new_name } => {
            commands::clone::run_clone(&rule, &new_name, &db_path)
        }
        Commands::Property { command } => match command {
            PropertyCommands::List { rule, json } => {
                commands::property::run_property_list(&rule, json, &db_path)
            }
            PropertyCommands::Add {
                rule,
                destination,
                expression,
            } => commands::property::run_property_add(&rule, &destination, &expression, &db_path),
            PropertyCommands::Edit {
                rule,
                property,
                destination,
                expression,
            } => commands::property::run_property_edit(
                &rule,
                &property,
                destination,
                expression,
                &db_path,
            ),
            PropertyCommands::Delete { rule, property } => {
                commands::property::run_property_delete(&rule, &property, &db_path)
            }
            PropertyCommands::Move {
                rule,
                property,
                position,
            } => commands::property::run_property_move(&rule, &property, position, &db_path),
        },
        Commands::History { rule, limit, json } => {
            commands::history::run_history(&rule, limit, json, &db_path)
        }
        Commands::Check {
            rule,
            outcome,
            message,
        } => commands::check::run_check(&rule, outcome, message, &db_path),
        Commands::Run { command } => match command {
            RunCommands::Start { rule } => commands::run::run_start(&rule, &db_path),
            RunCommands::Complete {
                run_id,
                outcome,
                changes,
                message,
            } => commands::run::run_complete(&run_id, outcome, changes, message, &db_path),
        },
        Commands::Completions { shell, output } => {
            commands::completions::run_completions(shell, output.as_deref())
        }
    }
}
