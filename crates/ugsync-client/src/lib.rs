//! Directory synchronization client.
//!
//! Drives one-way reconciliation of a locally assembled
//! [`UsersAndGroups`](ugsync_core::UsersAndGroups) dataset against a remote
//! directory service:
//!
//! 1. [`assembler`] augments the dataset with implicit or merged groups
//!    against the service's current state.
//! 2. [`batch`] partitions large datasets into size-bounded submissions.
//! 3. [`sync::SyncEngine`] validates, submits, and interprets the
//!    six-bucket change response.
//! 4. [`audit::AuditRecorder`] persists CSV and raw-response artifacts;
//!    [`notify::Notifier`] sends the success/failure email signal.
//!
//! All remote traffic goes through [`client::DirectoryClient`], which owns
//! the session lifecycle (cookie-based login, re-login on 401).

pub mod assembler;
pub mod audit;
pub mod auth;
pub mod batch;
pub mod client;
pub mod error;
pub mod notify;
pub mod sync;

pub use audit::AuditRecorder;
pub use auth::Credentials;
pub use client::DirectoryClient;
pub use error::{SyncClientError, SyncClientResult};
pub use notify::{NotificationConfig, Notifier};
pub use sync::{
    ChangeRecord, ChangeSummary, ChangeType, RunStamp, SyncEngine, SyncOptions, SyncOutcome,
};
