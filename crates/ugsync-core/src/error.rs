//! Error types for the entity model.

use crate::model::EntityKind;
use thiserror::Error;

/// Errors raised while building a [`crate::UsersAndGroups`] container.
///
/// Dataset-level consistency problems (unknown group references, nesting
/// cycles) are deliberately *not* errors: they are reported as
/// [`crate::ValidationReport`] violations so that callers can decide whether
/// to abort.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UgSyncError {
    /// An entity with the same name already exists and the caller asked for
    /// [`crate::DuplicatePolicy::RaiseError`].
    #[error("duplicate {kind} '{name}'")]
    Duplicate { kind: EntityKind, name: String },

    /// Entity names are identity keys and must be non-empty.
    #[error("{kind} name must not be empty")]
    EmptyName { kind: EntityKind },

    /// A principals document could not be interpreted.
    #[error("malformed principals document: {0}")]
    MalformedPrincipals(String),
}

/// Result alias for model operations.
pub type Result<T> = std::result::Result<T, UgSyncError>;
