//! Local dataset import: CSV files and principals JSON.

pub mod csv;
pub mod json;

use std::path::PathBuf;

use tracing::info;
use ugsync_core::{DuplicatePolicy, UsersAndGroups};

use crate::error::CliError;

/// The local files one dataset is assembled from.
pub struct DatasetSource {
    pub users_csv: Option<PathBuf>,
    pub groups_csv: Option<PathBuf>,
    pub principals_json: Option<PathBuf>,
    /// Deployment-specific import filter: drop groups carrying this suffix.
    pub exclude_group_suffix: Option<String>,
}

impl DatasetSource {
    /// Build the dataset.  CSV entities are layered on top of the principals
    /// document; duplicates across sources are an error.
    pub fn load(&self) -> Result<UsersAndGroups, CliError> {
        if self.users_csv.is_none() && self.groups_csv.is_none() && self.principals_json.is_none()
        {
            return Err(CliError::Input(
                "no dataset source given; pass --users-csv, --groups-csv, or --principals-json"
                    .to_string(),
            ));
        }

        let mut dataset = match &self.principals_json {
            Some(path) => json::read_principals(path)?,
            None => UsersAndGroups::new(),
        };
        if let Some(path) = &self.groups_csv {
            for group in csv::read_groups(path)? {
                dataset.add_group(group, DuplicatePolicy::RaiseError)?;
            }
        }
        if let Some(path) = &self.users_csv {
            for user in csv::read_users(path)? {
                dataset.add_user(user, DuplicatePolicy::RaiseError)?;
            }
        }

        let dataset = match &self.exclude_group_suffix {
            Some(suffix) => exclude_group_suffix(dataset, suffix)?,
            None => dataset,
        };

        info!(
            users = dataset.number_users(),
            groups = dataset.number_groups(),
            "Loaded local dataset"
        );
        Ok(dataset)
    }
}

/// Drop every group whose name ends with `suffix`, and strip references to
/// the dropped groups from users and remaining groups.
fn exclude_group_suffix(
    dataset: UsersAndGroups,
    suffix: &str,
) -> Result<UsersAndGroups, CliError> {
    let (users, groups) = dataset.into_parts();
    let mut filtered = UsersAndGroups::new();
    for mut group in groups {
        if group.name.ends_with(suffix) {
            continue;
        }
        group.group_names.retain(|name| !name.ends_with(suffix));
        filtered.add_group(group, DuplicatePolicy::RaiseError)?;
    }
    for mut user in users {
        user.group_names.retain(|name| !name.ends_with(suffix));
        filtered.add_user(user, DuplicatePolicy::RaiseError)?;
    }
    Ok(filtered)
}
