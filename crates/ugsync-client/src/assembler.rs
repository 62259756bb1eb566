//! Dataset assembly against the service's current state.
//!
//! Two independent policies prepare a locally built dataset for submission:
//! implicit group creation (define every group a user references) and group
//! merge (carry the service's existing memberships forward).  Both read the
//! previously fetched `original` dataset and fail with a precondition error
//! when it was not supplied.

use tracing::{debug, info};
use ugsync_core::{DuplicatePolicy, Group, UsersAndGroups};

use crate::error::{SyncClientError, SyncClientResult};

/// Description given to groups synthesized from a bare user reference.
pub const IMPLICIT_GROUP_DESCRIPTION: &str = "implicitly created group";

/// Define every group referenced by a user but absent from the dataset.
///
/// References that exist in `original` are copied verbatim, preserving the
/// remote identity and attributes; the rest are synthesized as minimal
/// placeholders.
pub fn create_implicit_groups(
    dataset: &mut UsersAndGroups,
    original: Option<&UsersAndGroups>,
) -> SyncClientResult<()> {
    let original = original.ok_or_else(|| {
        SyncClientError::Precondition(
            "implicit group creation requires the current directory state".to_string(),
        )
    })?;

    // Missing names in first-reference order for deterministic output.
    let mut missing: Vec<String> = Vec::new();
    for user in dataset.users() {
        for name in &user.group_names {
            if !dataset.has_group(name) && !missing.contains(name) {
                missing.push(name.clone());
            }
        }
    }

    if missing.is_empty() {
        debug!("No implicit groups to create");
        return Ok(());
    }

    let mut copied = 0usize;
    for name in missing {
        let group = match original.group(&name) {
            Some(existing) => {
                copied += 1;
                existing.clone()
            }
            None => Group {
                display_name: Some(name.clone()),
                description: Some(IMPLICIT_GROUP_DESCRIPTION.to_string()),
                ..Group::new(name.clone())
            },
        };
        dataset.add_group(group, DuplicatePolicy::RaiseError)?;
    }
    info!(copied, "Created implicit groups");
    Ok(())
}

/// Concatenate each user's existing memberships onto the new dataset.
///
/// Users absent from `original` are left unchanged.  The union is not
/// deduplicated; duplicate membership entries are tolerated downstream.
pub fn merge_original_groups(
    dataset: &mut UsersAndGroups,
    original: Option<&UsersAndGroups>,
) -> SyncClientResult<()> {
    let original = original.ok_or_else(|| {
        SyncClientError::Precondition(
            "group merge requires the current directory state".to_string(),
        )
    })?;

    let mut merged = 0usize;
    for user in dataset.users_mut() {
        if let Some(existing) = original.user(&user.name) {
            if !existing.group_names.is_empty() {
                user.group_names.extend(existing.group_names.iter().cloned());
                merged += 1;
            }
        }
    }
    debug!(merged, "Merged existing group memberships");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ugsync_core::User;

    fn dataset(users: Vec<User>, groups: Vec<Group>) -> UsersAndGroups {
        let mut ds = UsersAndGroups::new();
        for g in groups {
            ds.add_group(g, DuplicatePolicy::RaiseError).unwrap();
        }
        for u in users {
            ds.add_user(u, DuplicatePolicy::RaiseError).unwrap();
        }
        ds
    }

    #[test]
    fn implicit_group_is_copied_from_original_when_present() {
        let original = dataset(
            vec![],
            vec![Group {
                description: Some("Regional".to_string()),
                ..Group::new("Sales")
            }],
        );
        let mut new = dataset(vec![User::new("bob").with_groups(["Sales"])], vec![]);

        create_implicit_groups(&mut new, Some(&original)).unwrap();

        let sales = new.group("Sales").unwrap();
        assert_eq!(sales.description.as_deref(), Some("Regional"));
    }

    #[test]
    fn implicit_group_is_synthesized_when_absent_from_original() {
        let original = UsersAndGroups::new();
        let mut new = dataset(vec![User::new("bob").with_groups(["Support"])], vec![]);

        create_implicit_groups(&mut new, Some(&original)).unwrap();

        let support = new.group("Support").unwrap();
        assert_eq!(support.display_name.as_deref(), Some("Support"));
        assert_eq!(
            support.description.as_deref(),
            Some(IMPLICIT_GROUP_DESCRIPTION)
        );
        assert!(support.privileges.is_empty());
    }

    #[test]
    fn implicit_creation_without_original_is_a_precondition_error() {
        let mut new = dataset(vec![User::new("bob").with_groups(["x"])], vec![]);
        let err = create_implicit_groups(&mut new, None).unwrap_err();
        assert!(matches!(err, SyncClientError::Precondition(_)));
    }

    #[test]
    fn merge_concatenates_existing_memberships() {
        let original = dataset(vec![User::new("bob").with_groups(["Eng"])], vec![]);
        let mut new = dataset(vec![User::new("bob").with_groups(["Support"])], vec![]);

        merge_original_groups(&mut new, Some(&original)).unwrap();

        let bob = new.user("bob").unwrap();
        assert!(bob.group_names.contains(&"Eng".to_string()));
        assert!(bob.group_names.contains(&"Support".to_string()));
    }

    #[test]
    fn merge_leaves_users_absent_from_original_unchanged() {
        let original = UsersAndGroups::new();
        let mut new = dataset(vec![User::new("carol").with_groups(["Support"])], vec![]);

        merge_original_groups(&mut new, Some(&original)).unwrap();

        assert_eq!(new.user("carol").unwrap().group_names, ["Support"]);
    }

    #[test]
    fn merge_without_original_is_a_precondition_error() {
        let mut new = dataset(vec![User::new("bob")], vec![]);
        let err = merge_original_groups(&mut new, None).unwrap_err();
        assert!(matches!(err, SyncClientError::Precondition(_)));
    }

    #[test]
    fn policies_compose() {
        let original = dataset(
            vec![User::new("bob").with_groups(["Eng"])],
            vec![Group::new("Eng")],
        );
        let mut new = dataset(vec![User::new("bob").with_groups(["Support"])], vec![]);

        create_implicit_groups(&mut new, Some(&original)).unwrap();
        merge_original_groups(&mut new, Some(&original)).unwrap();
        // "Eng" arrives through the merge, after the implicit pass ran.
        create_implicit_groups(&mut new, Some(&original)).unwrap();

        assert!(new.has_group("Support"));
        assert!(new.has_group("Eng"));
        assert!(new.validate().ok());
    }
}
