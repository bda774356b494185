use std::path::Path;

use drift_core::db::{PropertyList, SqlitePropertyList};
use drift_core::models::{NewSyncProperty, PropertyId, UpdateSyncProperty};

use crate::commands::common::{
    format_property_lines, open_database, property_to_list_item, resolve_rule, PropertyListItem,
};
use crate::error::CliError;

pub fn run_property_list(rule_query: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let rule = resolve_rule(rule_query, &db)?;
    let properties = SqlitePropertyList::new(db.connection()).list(&rule.id)?;

    if as_json {
        let json_items = properties
            .iter()
            .enumerate()
            .map(|(index, property)| property_to_list_item(property, index + 1))
            .collect::<Vec<PropertyListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if properties.is_empty() {
        println!("Rule '{}' has no sync properties yet.", rule.name);
    } else {
        for line in format_property_lines(&properties) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn run_property_add(
    rule_query: &str,
    destination: &str,
    expression: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let rule = resolve_rule(rule_query, &db)?;

    let property = SqlitePropertyList::new(db.connection())
        .create(&rule.id, NewSyncProperty::new(destination, expression)?)?;

    println!("{}", property.id);
    Ok(())
}

pub fn run_property_edit(
    rule_query: &str,
    property: &str,
    destination: Option<String>,
    expression: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let rule = resolve_rule(rule_query, &db)?;
    let property_id = parse_property_id(property)?;

    let updated = SqlitePropertyList::new(db.connection()).update(
        &rule.id,
        &property_id,
        UpdateSyncProperty {
            destination_field: destination,
            source_expression: expression,
        },
    )?;

    println!("{}", updated.id);
    Ok(())
}

pub fn run_property_delete(
    rule_query: &str,
    property: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let rule = resolve_rule(rule_query, &db)?;
    let property_id = parse_property_id(property)?;

    SqlitePropertyList::new(db.connection()).delete(&rule.id, &property_id)?;
    println!("{property_id}");
    Ok(())
}

pub fn run_property_move(
    rule_query: &str,
    property: &str,
    position: usize,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let rule = resolve_rule(rule_query, &db)?;
    let property_id = parse_property_id(property)?;

    let reordered =
        SqlitePropertyList::new(db.connection()).move_to(&rule.id, &property_id, position)?;

    for line in format_property_lines(&reordered) {
        println!("{line}");
    }

    Ok(())
}

fn parse_property_id(property: &str) -> Result<PropertyId, CliError> {
    property
        .trim()
        .parse::<PropertyId>()
        .map_err(|_| CliError::InvalidPropertyId(property.to_string()))
}
