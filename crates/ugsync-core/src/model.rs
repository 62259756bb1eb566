//! Users, groups, and the dataset container.
//!
//! A [`UsersAndGroups`] dataset is one snapshot of directory principals,
//! either assembled locally (CSV/JSON import) or fetched from the remote
//! service.  Entities are kept in insertion order so that submitted payloads
//! and audit artifacts are deterministic.  Uniqueness is enforced at insert
//! time; referential consistency (group references, nesting cycles) is a
//! derived property checked by [`UsersAndGroups::validate`].

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, UgSyncError};

/// `principalTypeEnum` marker for users on the wire.
pub const PRINCIPAL_TYPE_USER: &str = "LOCAL_USER";
/// `principalTypeEnum` marker for groups on the wire.
pub const PRINCIPAL_TYPE_GROUP: &str = "LOCAL_GROUP";

/// Which kind of principal an operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Group,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::User => f.write_str("user"),
            EntityKind::Group => f.write_str("group"),
        }
    }
}

/// A directory user.
///
/// `name` is the case-sensitive identity key.  `id` is assigned by the
/// remote service and is absent for locally assembled entities.  `created`
/// is an origin timestamp and is never modified once set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    /// Provisioning-only; never returned by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Names of groups this user belongs to.  Duplicate entries are
    /// tolerated (the merge policy concatenates without deduplication).
    #[serde(default)]
    pub group_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl User {
    /// Create a user with just a name; remaining attributes default to empty.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            mail: None,
            password: None,
            group_names: Vec::new(),
            visibility: None,
            created: None,
            id: None,
        }
    }

    /// Builder-style group membership assignment.
    #[must_use]
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group_names = groups.into_iter().map(Into::into).collect();
        self
    }
}

/// A directory group.
///
/// `group_names` holds *parent* group references (nested membership).  A
/// valid dataset contains no nesting cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub group_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    /// Privilege tokens, in service-defined order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub privileges: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Group {
    /// Create a group with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            group_names: Vec::new(),
            visibility: None,
            privileges: Vec::new(),
            id: None,
        }
    }

    /// Builder-style parent group assignment.
    #[must_use]
    pub fn with_parents(mut self, parents: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group_names = parents.into_iter().map(Into::into).collect();
        self
    }
}

/// What to do when an insert collides with an existing entity of the same
/// name.  Selected per call, not per container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail the insert with [`UgSyncError::Duplicate`].
    RaiseError,
    /// Keep the existing entity and drop the new one.
    Ignore,
    /// Replace the existing entity in place (insertion position is kept).
    Overwrite,
}

/// A specific consistency violation found by [`UsersAndGroups::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationViolation {
    /// A user or group references a group name that is not defined in the
    /// dataset.
    UnknownGroupReference {
        referrer: String,
        referrer_kind: EntityKind,
        group: String,
    },
    /// A group (transitively) lists itself as a parent.
    CyclicGroupNesting { group: String },
    /// Two entities of the same kind share a name.  The container enforces
    /// uniqueness at insert time, so this only fires on hand-built data.
    DuplicateName { kind: EntityKind, name: String },
}

impl fmt::Display for ValidationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationViolation::UnknownGroupReference {
                referrer,
                referrer_kind,
                group,
            } => write!(
                f,
                "{referrer_kind} '{referrer}' references unknown group '{group}'"
            ),
            ValidationViolation::CyclicGroupNesting { group } => {
                write!(f, "group '{group}' is part of a nesting cycle")
            }
            ValidationViolation::DuplicateName { kind, name } => {
                write!(f, "duplicate {kind} name '{name}'")
            }
        }
    }
}

/// Outcome of a validation pass.  Never an error: callers decide whether a
/// non-empty violation list aborts the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub violations: Vec<ValidationViolation>,
}

impl ValidationReport {
    /// True when no violations were found.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.violations.is_empty() {
            return f.write_str("no violations");
        }
        let parts: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("; "))
    }
}

/// Insertion-ordered container of users and groups with unique names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsersAndGroups {
    users: Vec<User>,
    user_index: HashMap<String, usize>,
    groups: Vec<Group>,
    group_index: HashMap<String, usize>,
}

impl UsersAndGroups {
    /// Create an empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user according to the duplicate policy.
    pub fn add_user(&mut self, user: User, policy: DuplicatePolicy) -> Result<()> {
        if user.name.is_empty() {
            return Err(UgSyncError::EmptyName {
                kind: EntityKind::User,
            });
        }
        match self.user_index.get(&user.name) {
            None => {
                self.user_index.insert(user.name.clone(), self.users.len());
                self.users.push(user);
                Ok(())
            }
            Some(&idx) => match policy {
                DuplicatePolicy::RaiseError => Err(UgSyncError::Duplicate {
                    kind: EntityKind::User,
                    name: user.name,
                }),
                DuplicatePolicy::Ignore => Ok(()),
                DuplicatePolicy::Overwrite => {
                    self.users[idx] = user;
                    Ok(())
                }
            },
        }
    }

    /// Insert a group according to the duplicate policy.
    pub fn add_group(&mut self, group: Group, policy: DuplicatePolicy) -> Result<()> {
        if group.name.is_empty() {
            return Err(UgSyncError::EmptyName {
                kind: EntityKind::Group,
            });
        }
        match self.group_index.get(&group.name) {
            None => {
                self.group_index
                    .insert(group.name.clone(), self.groups.len());
                self.groups.push(group);
                Ok(())
            }
            Some(&idx) => match policy {
                DuplicatePolicy::RaiseError => Err(UgSyncError::Duplicate {
                    kind: EntityKind::Group,
                    name: group.name,
                }),
                DuplicatePolicy::Ignore => Ok(()),
                DuplicatePolicy::Overwrite => {
                    self.groups[idx] = group;
                    Ok(())
                }
            },
        }
    }

    /// Look up a user by name.
    #[must_use]
    pub fn user(&self, name: &str) -> Option<&User> {
        self.user_index.get(name).map(|&i| &self.users[i])
    }

    /// Look up a group by name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.group_index.get(name).map(|&i| &self.groups[i])
    }

    /// Mutable lookup of a group by name.  The group's name must not be
    /// changed through the returned reference.
    pub fn group_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.group_index.get(name).map(|&i| &mut self.groups[i])
    }

    /// True if a user with this name exists.
    #[must_use]
    pub fn has_user(&self, name: &str) -> bool {
        self.user_index.contains_key(name)
    }

    /// True if a group with this name exists.
    #[must_use]
    pub fn has_group(&self, name: &str) -> bool {
        self.group_index.contains_key(name)
    }

    /// Users in insertion order.
    #[must_use]
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Groups in insertion order.
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Mutable iteration over users, in insertion order.  Names must not be
    /// changed through this iterator; only attribute mutation (e.g. group
    /// merge) is supported.
    pub fn users_mut(&mut self) -> impl Iterator<Item = &mut User> {
        self.users.iter_mut()
    }

    /// Number of users.
    #[must_use]
    pub fn number_users(&self) -> usize {
        self.users.len()
    }

    /// Number of groups.
    #[must_use]
    pub fn number_groups(&self) -> usize {
        self.groups.len()
    }

    /// True when the dataset holds no entities at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty()
    }

    /// Consume the dataset, yielding its user list and keeping groups.
    ///
    /// Used by the batcher, which destructively partitions the user list and
    /// pulls referenced groups per batch.
    #[must_use]
    pub fn into_parts(self) -> (Vec<User>, Vec<Group>) {
        (self.users, self.groups)
    }

    /// Check referential consistency.
    ///
    /// Finds, in order: user references to undefined groups, group references
    /// to undefined parent groups, group nesting cycles, and duplicate names.
    /// Never fails; callers inspect [`ValidationReport::ok`].
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        for user in &self.users {
            for group_name in &user.group_names {
                if !self.has_group(group_name) {
                    report
                        .violations
                        .push(ValidationViolation::UnknownGroupReference {
                            referrer: user.name.clone(),
                            referrer_kind: EntityKind::User,
                            group: group_name.clone(),
                        });
                }
            }
        }

        for group in &self.groups {
            for parent in &group.group_names {
                if !self.has_group(parent) {
                    report
                        .violations
                        .push(ValidationViolation::UnknownGroupReference {
                            referrer: group.name.clone(),
                            referrer_kind: EntityKind::Group,
                            group: parent.clone(),
                        });
                }
            }
        }

        self.find_nesting_cycles(&mut report);
        self.find_duplicate_names(&mut report);
        report
    }

    /// Report every group that (transitively) lists itself as a parent.
    /// Groups that merely point into a cycle without closing one are not
    /// themselves violations.
    fn find_nesting_cycles(&self, report: &mut ValidationReport) {
        for group in &self.groups {
            if self.group_reaches_itself(&group.name) {
                report
                    .violations
                    .push(ValidationViolation::CyclicGroupNesting {
                        group: group.name.clone(),
                    });
            }
        }
    }

    /// Walk the parent graph from `name` looking for `name` itself.
    /// Undefined parents are skipped; they are reported separately as
    /// unknown references.
    fn group_reaches_itself(&self, name: &str) -> bool {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut pending: Vec<&str> = match self.group(name) {
            Some(group) => group.group_names.iter().map(String::as_str).collect(),
            None => return false,
        };
        while let Some(parent) = pending.pop() {
            if parent == name {
                return true;
            }
            if !seen.insert(parent) {
                continue;
            }
            if let Some(group) = self.group(parent) {
                pending.extend(group.group_names.iter().map(String::as_str));
            }
        }
        false
    }

    /// Duplicate names cannot arise through `add_user`/`add_group`, but the
    /// check is kept so hand-assembled datasets are covered too.
    fn find_duplicate_names(&self, report: &mut ValidationReport) {
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.users.len());
        for user in &self.users {
            if !seen.insert(user.name.as_str()) {
                report.violations.push(ValidationViolation::DuplicateName {
                    kind: EntityKind::User,
                    name: user.name.clone(),
                });
            }
        }
        seen.clear();
        for group in &self.groups {
            if !seen.insert(group.name.as_str()) {
                report.violations.push(ValidationViolation::DuplicateName {
                    kind: EntityKind::Group,
                    name: group.name.clone(),
                });
            }
        }
    }

    /// Serialize to the wire form: one flat JSON array of principal objects,
    /// users first, each tagged with `principalTypeEnum`.
    #[must_use]
    pub fn to_principals(&self) -> Vec<serde_json::Value> {
        let mut principals = Vec::with_capacity(self.users.len() + self.groups.len());
        for user in &self.users {
            let mut value = serde_json::to_value(user).expect("user serialization is infallible");
            value["principalTypeEnum"] = serde_json::Value::from(PRINCIPAL_TYPE_USER);
            principals.push(value);
        }
        for group in &self.groups {
            let mut value =
                serde_json::to_value(group).expect("group serialization is infallible");
            value["principalTypeEnum"] = serde_json::Value::from(PRINCIPAL_TYPE_GROUP);
            principals.push(value);
        }
        principals
    }

    /// Parse the wire form produced by the service's "list all" call.
    ///
    /// Principals whose `principalTypeEnum` ends in `_USER` become users;
    /// everything else becomes a group.  Duplicate names are logged and
    /// skipped rather than failing the whole fetch.
    pub fn from_principals(principals: &[serde_json::Value]) -> Result<Self> {
        let mut dataset = Self::new();
        for value in principals {
            let kind = value
                .get("principalTypeEnum")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(PRINCIPAL_TYPE_GROUP);
            if kind.ends_with("_USER") {
                let user: User = serde_json::from_value(value.clone())
                    .map_err(|e| UgSyncError::MalformedPrincipals(e.to_string()))?;
                if dataset.has_user(&user.name) {
                    warn!(user = %user.name, "duplicate user in principals list, skipping");
                    continue;
                }
                dataset.add_user(user, DuplicatePolicy::RaiseError)?;
            } else {
                let group: Group = serde_json::from_value(value.clone())
                    .map_err(|e| UgSyncError::MalformedPrincipals(e.to_string()))?;
                if dataset.has_group(&group.name) {
                    warn!(group = %group.name, "duplicate group in principals list, skipping");
                    continue;
                }
                dataset.add_group(group, DuplicatePolicy::RaiseError)?;
            }
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset_with(users: &[User], groups: &[Group]) -> UsersAndGroups {
        let mut ds = UsersAndGroups::new();
        for g in groups {
            ds.add_group(g.clone(), DuplicatePolicy::RaiseError).unwrap();
        }
        for u in users {
            ds.add_user(u.clone(), DuplicatePolicy::RaiseError).unwrap();
        }
        ds
    }

    #[test]
    fn insertion_order_is_preserved() {
        let ds = dataset_with(
            &[User::new("zed"), User::new("amy")],
            &[Group::new("ops"), Group::new("dev")],
        );
        let names: Vec<&str> = ds.users().iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["zed", "amy"]);
        let groups: Vec<&str> = ds.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(groups, ["ops", "dev"]);
    }

    #[test]
    fn duplicate_user_raises_under_raise_policy() {
        let mut ds = UsersAndGroups::new();
        ds.add_user(User::new("bob"), DuplicatePolicy::RaiseError)
            .unwrap();
        let err = ds
            .add_user(User::new("bob"), DuplicatePolicy::RaiseError)
            .unwrap_err();
        assert_eq!(
            err,
            UgSyncError::Duplicate {
                kind: EntityKind::User,
                name: "bob".to_string()
            }
        );
    }

    #[test]
    fn duplicate_group_is_kept_under_ignore_policy() {
        let mut ds = UsersAndGroups::new();
        let original = Group {
            description: Some("first".to_string()),
            ..Group::new("Sales")
        };
        ds.add_group(original, DuplicatePolicy::RaiseError).unwrap();
        ds.add_group(Group::new("Sales"), DuplicatePolicy::Ignore)
            .unwrap();
        assert_eq!(ds.number_groups(), 1);
        assert_eq!(
            ds.group("Sales").unwrap().description.as_deref(),
            Some("first")
        );
    }

    #[test]
    fn overwrite_policy_replaces_in_place() {
        let mut ds = UsersAndGroups::new();
        ds.add_group(Group::new("a"), DuplicatePolicy::RaiseError)
            .unwrap();
        ds.add_group(Group::new("b"), DuplicatePolicy::RaiseError)
            .unwrap();
        let replacement = Group {
            description: Some("replaced".to_string()),
            ..Group::new("a")
        };
        ds.add_group(replacement, DuplicatePolicy::Overwrite)
            .unwrap();
        assert_eq!(ds.groups()[0].description.as_deref(), Some("replaced"));
        assert_eq!(ds.number_groups(), 2);
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut ds = UsersAndGroups::new();
        let err = ds
            .add_user(User::new(""), DuplicatePolicy::RaiseError)
            .unwrap_err();
        assert_eq!(
            err,
            UgSyncError::EmptyName {
                kind: EntityKind::User
            }
        );
    }

    #[test]
    fn unknown_group_reference_is_invalid() {
        let ds = dataset_with(&[User::new("bob").with_groups(["ghost"])], &[]);
        let report = ds.validate();
        assert!(!report.ok());
        assert_eq!(
            report.violations,
            vec![ValidationViolation::UnknownGroupReference {
                referrer: "bob".to_string(),
                referrer_kind: EntityKind::User,
                group: "ghost".to_string(),
            }]
        );
    }

    #[test]
    fn direct_nesting_cycle_is_invalid() {
        let ds = dataset_with(
            &[],
            &[
                Group::new("a").with_parents(["b"]),
                Group::new("b").with_parents(["a"]),
            ],
        );
        let report = ds.validate();
        assert!(!report.ok());
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, ValidationViolation::CyclicGroupNesting { group } if group == "a")));
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, ValidationViolation::CyclicGroupNesting { group } if group == "b")));
    }

    #[test]
    fn transitive_nesting_cycle_is_invalid() {
        let ds = dataset_with(
            &[],
            &[
                Group::new("a").with_parents(["b"]),
                Group::new("b").with_parents(["c"]),
                Group::new("c").with_parents(["a"]),
            ],
        );
        assert!(!ds.validate().ok());
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let ds = dataset_with(&[], &[Group::new("a").with_parents(["a"])]);
        let report = ds.validate();
        assert_eq!(
            report.violations,
            vec![ValidationViolation::CyclicGroupNesting {
                group: "a".to_string()
            }]
        );
    }

    #[test]
    fn group_pointing_into_a_cycle_is_not_itself_cyclic() {
        let ds = dataset_with(
            &[],
            &[
                Group::new("entry").with_parents(["a"]),
                Group::new("a").with_parents(["b"]),
                Group::new("b").with_parents(["a"]),
            ],
        );
        let report = ds.validate();
        assert_eq!(report.violations.len(), 2);
        assert!(!report.violations.iter().any(
            |v| matches!(v, ValidationViolation::CyclicGroupNesting { group } if group == "entry")
        ));
    }

    #[test]
    fn acyclic_nesting_is_valid() {
        let ds = dataset_with(
            &[User::new("bob").with_groups(["leaf"])],
            &[
                Group::new("root"),
                Group::new("mid").with_parents(["root"]),
                Group::new("leaf").with_parents(["mid", "root"]),
            ],
        );
        let report = ds.validate();
        assert!(report.ok(), "unexpected violations: {report}");
    }

    #[test]
    fn principals_round_trip_keeps_type_markers() {
        let ds = dataset_with(
            &[User::new("alice").with_groups(["dev"])],
            &[Group::new("dev")],
        );
        let principals = ds.to_principals();
        assert_eq!(principals.len(), 2);
        assert_eq!(principals[0]["principalTypeEnum"], PRINCIPAL_TYPE_USER);
        assert_eq!(principals[1]["principalTypeEnum"], PRINCIPAL_TYPE_GROUP);

        let parsed = UsersAndGroups::from_principals(&principals).unwrap();
        assert_eq!(parsed.number_users(), 1);
        assert_eq!(parsed.number_groups(), 1);
        assert_eq!(parsed.user("alice").unwrap().group_names, ["dev"]);
    }

    #[test]
    fn principals_parse_skips_duplicates() {
        let principals = vec![
            serde_json::json!({"name": "bob", "principalTypeEnum": "LOCAL_USER"}),
            serde_json::json!({"name": "bob", "principalTypeEnum": "LOCAL_USER"}),
        ];
        let parsed = UsersAndGroups::from_principals(&principals).unwrap();
        assert_eq!(parsed.number_users(), 1);
    }

    #[test]
    fn wire_serialization_uses_camel_case() {
        let user = User {
            display_name: Some("Bob".to_string()),
            group_names: vec!["dev".to_string()],
            ..User::new("bob")
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["displayName"], "Bob");
        assert_eq!(value["groupNames"][0], "dev");
        assert!(value.get("password").is_none());
    }
}
