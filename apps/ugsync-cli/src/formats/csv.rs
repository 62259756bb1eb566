//! CSV readers for user and group files.
//!
//! Expected headers:
//!
//! ```text
//! users:  name,display_name,mail,password,group_names,visibility
//! groups: name,display_name,description,group_names,privileges,visibility
//! ```
//!
//! Name-list cells (`group_names`, `privileges`) hold a JSON array, e.g.
//! `["Eng","Support"]`; an empty cell means an empty list.  The audit
//! archive files written after a sync use the same cell shape.

use std::path::Path;

use csv::ReaderBuilder;
use serde::Deserialize;
use ugsync_core::{Group, User};

use crate::error::CliError;

#[derive(Debug, Deserialize)]
struct UserRecord {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    mail: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    group_names: Option<String>,
    #[serde(default)]
    visibility: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroupRecord {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    group_names: Option<String>,
    #[serde(default)]
    privileges: Option<String>,
    #[serde(default)]
    visibility: Option<String>,
}

impl TryFrom<UserRecord> for User {
    type Error = CliError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        Ok(User {
            group_names: parse_names_cell(record.group_names.as_deref())?,
            display_name: record.display_name,
            mail: record.mail,
            password: record.password,
            visibility: record.visibility,
            ..User::new(record.name)
        })
    }
}

impl TryFrom<GroupRecord> for Group {
    type Error = CliError;

    fn try_from(record: GroupRecord) -> Result<Self, Self::Error> {
        Ok(Group {
            group_names: parse_names_cell(record.group_names.as_deref())?,
            privileges: parse_names_cell(record.privileges.as_deref())?,
            display_name: record.display_name,
            description: record.description,
            visibility: record.visibility,
            ..Group::new(record.name)
        })
    }
}

/// Read a users CSV file.
pub fn read_users(path: &Path) -> Result<Vec<User>, CliError> {
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| CliError::Input(format!("{}: {e}", path.display())))?;
    let mut users = Vec::new();
    for result in reader.deserialize::<UserRecord>() {
        let record = result.map_err(|e| CliError::Input(format!("{}: {e}", path.display())))?;
        users.push(User::try_from(record)?);
    }
    Ok(users)
}

/// Read a groups CSV file.
pub fn read_groups(path: &Path) -> Result<Vec<Group>, CliError> {
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| CliError::Input(format!("{}: {e}", path.display())))?;
    let mut groups = Vec::new();
    for result in reader.deserialize::<GroupRecord>() {
        let record = result.map_err(|e| CliError::Input(format!("{}: {e}", path.display())))?;
        groups.push(Group::try_from(record)?);
    }
    Ok(groups)
}

fn parse_names_cell(cell: Option<&str>) -> Result<Vec<String>, CliError> {
    match cell {
        None => Ok(Vec::new()),
        Some(cell) if cell.trim().is_empty() => Ok(Vec::new()),
        Some(cell) => serde_json::from_str(cell)
            .map_err(|e| CliError::Input(format!("name-list cell '{cell}' is not a JSON array: {e}"))),
    }
}
