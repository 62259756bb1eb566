//! Principals JSON reader.
//!
//! The file holds the same flat array of `principalTypeEnum`-tagged objects
//! that `ugsync fetch` emits, so a fetched snapshot can be edited and fed
//! back in.

use std::fs;
use std::path::Path;

use ugsync_core::UsersAndGroups;

use crate::error::CliError;

/// Read a principals document into a dataset.
pub fn read_principals(path: &Path) -> Result<UsersAndGroups, CliError> {
    let content = fs::read_to_string(path)?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&content)
        .map_err(|e| CliError::Input(format!("{}: {e}", path.display())))?;
    Ok(UsersAndGroups::from_principals(&values)?)
}
