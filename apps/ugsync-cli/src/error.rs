//! CLI error type and process exit codes.

use thiserror::Error;
use ugsync_client::SyncClientError;
use ugsync_core::UgSyncError;

/// Top-level CLI error.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Client(#[from] SyncClientError),

    #[error("{0}")]
    Model(#[from] UgSyncError),

    #[error("invalid input: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// 2 = authentication, 3 = transport, 4 = local validation or
    /// configuration, 5 = the service rejected or returned garbage,
    /// 1 = everything else.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Client(e) => match e {
                SyncClientError::Auth(_) => 2,
                SyncClientError::Transport(_) => 3,
                SyncClientError::InvalidDataset(_)
                | SyncClientError::Configuration(_)
                | SyncClientError::Precondition(_)
                | SyncClientError::Model(_) => 4,
                SyncClientError::RemoteRejected { .. } | SyncClientError::Parse(_) => 5,
                SyncClientError::Persistence(_) | SyncClientError::Notification(_) => 1,
            },
            CliError::Model(_) | CliError::Input(_) => 4,
            CliError::Io(_) => 1,
        }
    }
}
