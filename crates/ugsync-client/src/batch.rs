//! Dataset partitioning for size-bounded submissions.
//!
//! Batches exist to stay under remote payload limits, not for throughput;
//! they are submitted strictly in order, one request at a time.

use std::collections::HashMap;

use tracing::debug;
use ugsync_core::{DuplicatePolicy, Group, UsersAndGroups};

use crate::error::{SyncClientError, SyncClientResult};

/// Destructively partition a dataset into sub-datasets of at most
/// `batch_size` users each.
///
/// Every group referenced (transitively, through nested parents) by a user
/// in a batch is pulled into that batch from the full group table, so a
/// batch of a valid dataset is itself valid.  Concatenating the user lists
/// of all batches, in order, reproduces the input's user list exactly.
/// References to groups the input never defined are carried through
/// untouched; the orchestrator's validation surfaces them.
pub fn partition(
    dataset: UsersAndGroups,
    batch_size: usize,
) -> SyncClientResult<Vec<UsersAndGroups>> {
    if batch_size == 0 {
        return Err(SyncClientError::Configuration(
            "batch size must be positive".to_string(),
        ));
    }

    let (users, groups) = dataset.into_parts();
    let group_table: HashMap<String, Group> =
        groups.into_iter().map(|g| (g.name.clone(), g)).collect();

    let mut batches = Vec::with_capacity(users.len().div_ceil(batch_size));
    let mut users = users.into_iter().peekable();
    while users.peek().is_some() {
        let mut batch = UsersAndGroups::new();
        for user in users.by_ref().take(batch_size) {
            // Closure over nested parents so the batch stands alone.
            let mut pending: Vec<String> = user.group_names.clone();
            while let Some(name) = pending.pop() {
                if batch.has_group(&name) {
                    continue;
                }
                if let Some(group) = group_table.get(&name) {
                    pending.extend(group.group_names.iter().cloned());
                    batch.add_group(group.clone(), DuplicatePolicy::RaiseError)?;
                }
            }
            batch.add_user(user, DuplicatePolicy::RaiseError)?;
        }
        batches.push(batch);
    }

    debug!(batches = batches.len(), batch_size, "Partitioned dataset");
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ugsync_core::User;

    fn sample(users: usize) -> UsersAndGroups {
        let mut ds = UsersAndGroups::new();
        ds.add_group(Group::new("root"), DuplicatePolicy::RaiseError)
            .unwrap();
        ds.add_group(
            Group::new("nested").with_parents(["root"]),
            DuplicatePolicy::RaiseError,
        )
        .unwrap();
        ds.add_group(Group::new("idle"), DuplicatePolicy::RaiseError)
            .unwrap();
        for i in 0..users {
            ds.add_user(
                User::new(format!("user{i}")).with_groups(["nested"]),
                DuplicatePolicy::RaiseError,
            )
            .unwrap();
        }
        ds
    }

    #[test]
    fn user_lists_concatenate_to_the_input() {
        let batches = partition(sample(7), 3).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(
            batches.iter().map(UsersAndGroups::number_users).collect::<Vec<_>>(),
            [3, 3, 1]
        );
        let names: Vec<String> = batches
            .iter()
            .flat_map(|b| b.users().iter().map(|u| u.name.clone()))
            .collect();
        let expected: Vec<String> = (0..7).map(|i| format!("user{i}")).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn referenced_groups_are_pulled_transitively() {
        let batches = partition(sample(2), 1).unwrap();
        for batch in &batches {
            assert!(batch.has_group("nested"));
            assert!(batch.has_group("root"), "nested parent must follow");
            assert!(!batch.has_group("idle"), "unreferenced groups stay out");
            assert!(batch.validate().ok());
        }
    }

    #[test]
    fn exact_multiple_produces_full_batches_only() {
        let batches = partition(sample(6), 3).unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.number_users() == 3));
    }

    #[test]
    fn empty_dataset_produces_no_batches() {
        let batches = partition(UsersAndGroups::new(), 10).unwrap();
        assert!(batches.is_empty());
    }

    #[test]
    fn zero_batch_size_is_a_configuration_error() {
        let err = partition(sample(1), 0).unwrap_err();
        assert!(matches!(err, SyncClientError::Configuration(_)));
    }

    #[test]
    fn undefined_references_are_left_for_validation() {
        let mut ds = UsersAndGroups::new();
        ds.add_user(
            User::new("bob").with_groups(["ghost"]),
            DuplicatePolicy::RaiseError,
        )
        .unwrap();
        let batches = partition(ds, 5).unwrap();
        assert_eq!(batches.len(), 1);
        assert!(!batches[0].validate().ok());
    }
}
