//! Error types for the synchronization client.

use thiserror::Error;
use ugsync_core::{UgSyncError, ValidationReport};

/// Errors produced while reconciling a dataset with the directory service.
///
/// `InvalidDataset` and `Configuration` are always detected before any
/// network call. `RemoteRejected` carries the full response body for
/// forensic logging; transport failures before any response arrive as
/// `Transport`.
#[derive(Debug, Error)]
pub enum SyncClientError {
    /// The dataset failed referential validation.
    #[error("dataset failed validation: {0}")]
    InvalidDataset(ValidationReport),

    /// Mutually exclusive or otherwise unusable options were requested.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// An operation was invoked without its required inputs.
    #[error("precondition not met: {0}")]
    Precondition(String),

    /// The directory service answered with a non-success status.
    #[error("directory service rejected the request (HTTP {status}): {body}")]
    RemoteRejected { status: u16, body: String },

    /// Network or connection failure before any response was received.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local file-system failure while writing audit artifacts.
    #[error("failed to persist audit artifact: {0}")]
    Persistence(#[from] std::io::Error),

    /// Session login was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A response body could not be interpreted.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The notification email could not be built or delivered.
    #[error("notification failed: {0}")]
    Notification(String),

    /// Entity-model failure while building a dataset.
    #[error(transparent)]
    Model(#[from] UgSyncError),
}

/// Result alias for synchronization client operations.
pub type SyncClientResult<T> = std::result::Result<T, SyncClientError>;
