//! Core entity model for ugsync.
//!
//! Provides the [`User`] and [`Group`] value records, the insertion-ordered
//! [`UsersAndGroups`] container, and dataset validation
//! ([`UsersAndGroups::validate`]).  Everything that talks to the directory
//! service lives in `ugsync-client`; this crate has no I/O.

pub mod error;
pub mod model;

pub use error::{Result, UgSyncError};
pub use model::{
    DuplicatePolicy, EntityKind, Group, User, UsersAndGroups, ValidationReport,
    ValidationViolation,
};
