//! Sync engine: validate, assemble, submit, interpret, record.
//!
//! One [`SyncEngine::run`] call drives a complete reconciliation of a
//! dataset against the directory service.  The flow is strictly sequential,
//! one request at a time; a run that fails is never retried by the engine,
//! the operator re-runs it.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{info, warn};
use ugsync_core::{EntityKind, UsersAndGroups};

use crate::assembler;
use crate::audit::{self, AuditRecorder};
use crate::batch;
use crate::client::DirectoryClient;
use crate::error::{SyncClientError, SyncClientResult};
use crate::notify::Notifier;

/// Caller-selected behavior for one run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Persist the computed changes remotely; false is a dry run.
    pub apply_changes: bool,
    /// Delete remote entities absent from the submitted dataset.
    pub remove_deleted: bool,
    /// Users per submission; 0 submits the whole dataset at once.
    pub batch_size: usize,
    /// Define groups that users reference without an explicit entry.
    pub create_groups: bool,
    /// Carry existing remote group memberships forward.
    pub merge_groups: bool,
    /// Shared provisioning password for newly created users.
    pub password: Option<String>,
}

impl SyncOptions {
    /// Reject unusable option combinations before any network call.
    ///
    /// A deletion sweep must see the complete target set to know what to
    /// delete, so `remove_deleted` cannot be combined with batching.
    pub fn validate(&self) -> SyncClientResult<()> {
        if self.remove_deleted && self.batch_size > 0 {
            return Err(SyncClientError::Configuration(
                "remove_deleted cannot be combined with batching".to_string(),
            ));
        }
        Ok(())
    }
}

/// Timestamps for one run: a filename tag and a row timestamp.
///
/// Always constructed explicitly per run and passed down; nothing in the
/// engine defaults to "now".
#[derive(Debug, Clone)]
pub struct RunStamp {
    /// Filesystem-safe tag embedded in artifact names.
    pub file_tag: String,
    /// Timestamp written into each CSV change row.
    pub row_timestamp: String,
}

impl RunStamp {
    /// Stamp the current local time.
    #[must_use]
    pub fn now() -> Self {
        let now = chrono::Local::now();
        Self {
            file_tag: now.format("%d%b%y_%H-%M-%S-%6f").to_string(),
            row_timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// What happened to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Updated,
    Deleted,
}

impl ChangeType {
    /// Label used in the CSV change log.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Added => "Added",
            ChangeType::Updated => "Updated",
            ChangeType::Deleted => "Deleted",
        }
    }
}

/// One normalized change, flattened from the six-bucket response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub entity: String,
    pub entity_type: EntityKind,
    pub change_type: ChangeType,
    pub timestamp: String,
}

/// The service's six-bucket change response.
///
/// Absent buckets default to empty rather than failing; unknown keys land in
/// `extra` and are logged as schema drift, never rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    #[serde(default)]
    pub users_added: Vec<String>,
    #[serde(default)]
    pub users_updated: Vec<String>,
    #[serde(default)]
    pub users_deleted: Vec<String>,
    #[serde(default)]
    pub groups_added: Vec<String>,
    #[serde(default)]
    pub groups_updated: Vec<String>,
    #[serde(default)]
    pub groups_deleted: Vec<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ChangeSummary {
    /// Flatten the buckets into a uniform change sequence: user buckets
    /// first, added/updated/deleted within each kind.
    #[must_use]
    pub fn to_records(&self, timestamp: &str) -> Vec<ChangeRecord> {
        let buckets: [(&[String], EntityKind, ChangeType); 6] = [
            (&self.users_added, EntityKind::User, ChangeType::Added),
            (&self.users_updated, EntityKind::User, ChangeType::Updated),
            (&self.users_deleted, EntityKind::User, ChangeType::Deleted),
            (&self.groups_added, EntityKind::Group, ChangeType::Added),
            (&self.groups_updated, EntityKind::Group, ChangeType::Updated),
            (&self.groups_deleted, EntityKind::Group, ChangeType::Deleted),
        ];
        let mut records = Vec::new();
        for (names, entity_type, change_type) in buckets {
            for name in names {
                records.push(ChangeRecord {
                    entity: name.clone(),
                    entity_type,
                    change_type,
                    timestamp: timestamp.to_string(),
                });
            }
        }
        records
    }
}

/// Terminal result of a successful run.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    /// All changes, across batches, in submission order.
    pub changes: Vec<ChangeRecord>,
    /// False for an empty successful sync, which is a normal outcome.
    pub changes_occurred: bool,
    /// Number of requests that reached the service.
    pub batches_submitted: usize,
    /// Audit-artifact write failures after the remote sync succeeded.
    pub persistence_errors: Vec<String>,
}

/// Drives one dataset through assembly, batching, submission, and recording.
///
/// Not re-entrant across runs in the sense that each run gets its own
/// explicit [`RunStamp`]; the engine itself holds no per-run state.
pub struct SyncEngine {
    client: DirectoryClient,
    options: SyncOptions,
    recorder: AuditRecorder,
    notifier: Option<Notifier>,
}

impl SyncEngine {
    /// Create an engine for one target service and one set of options.
    #[must_use]
    pub fn new(client: DirectoryClient, options: SyncOptions, recorder: AuditRecorder) -> Self {
        Self {
            client,
            options,
            recorder,
            notifier: None,
        }
    }

    /// Attach the email signal.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Reconcile `dataset` with the directory service.
    ///
    /// Dataset invalidity and remote rejection are terminal and not retried.
    /// Audit-artifact write failures after a successful remote sync are
    /// collected in the outcome instead of failing the run.
    pub async fn run(
        &self,
        mut dataset: UsersAndGroups,
        stamp: &RunStamp,
    ) -> SyncClientResult<SyncOutcome> {
        self.options.validate()?;

        // ── Assemble ─────────────────────────────────────────────────
        if self.options.create_groups || self.options.merge_groups {
            let original = self.client.fetch_all(false).await?;
            if self.options.create_groups {
                assembler::create_implicit_groups(&mut dataset, Some(&original))?;
            }
            if self.options.merge_groups {
                assembler::merge_original_groups(&mut dataset, Some(&original))?;
            }
        }

        // ── Batch ────────────────────────────────────────────────────
        let batches = if self.options.batch_size > 0 {
            batch::partition(dataset, self.options.batch_size)?
        } else {
            vec![dataset]
        };
        let multi_batch = batches.len() > 1;

        let mut outcome = SyncOutcome::default();
        for (index, batch) in batches.into_iter().enumerate() {
            let batch_tag = multi_batch.then_some(index + 1);
            self.submit_batch(&batch, stamp, batch_tag, &mut outcome)
                .await?;
        }

        outcome.changes_occurred = !outcome.changes.is_empty();
        info!(
            changes = outcome.changes.len(),
            batches = outcome.batches_submitted,
            apply_changes = self.options.apply_changes,
            "Sync run completed"
        );
        self.signal_success(&format!(
            "Sync completed: {} change(s) across {} submission(s).",
            outcome.changes.len(),
            outcome.batches_submitted
        ))
        .await;
        Ok(outcome)
    }

    /// Validate, submit, and record one batch.
    async fn submit_batch(
        &self,
        batch: &UsersAndGroups,
        stamp: &RunStamp,
        batch_tag: Option<usize>,
        outcome: &mut SyncOutcome,
    ) -> SyncClientResult<()> {
        // ── Validate ─────────────────────────────────────────────────
        let report = batch.validate();
        if !report.ok() {
            self.signal_failure(&format!("Dataset validation failed: {report}"))
                .await;
            return Err(SyncClientError::InvalidDataset(report));
        }

        let principals = serde_json::to_string_pretty(&batch.to_principals())
            .map_err(|e| SyncClientError::Parse(format!("principals document: {e}")))?;

        // ── Submit ───────────────────────────────────────────────────
        info!(
            users = batch.number_users(),
            groups = batch.number_groups(),
            batch = batch_tag,
            "Submitting principals"
        );
        let body = match self
            .client
            .sync(
                &principals,
                self.options.apply_changes,
                self.options.remove_deleted,
                self.options.password.as_deref(),
            )
            .await
        {
            Ok(body) => body,
            Err(e) => {
                if let Err(pe) = self.recorder.record_failed_submission(&principals, stamp) {
                    warn!(error = %pe, "Could not persist failed-submission record");
                }
                self.signal_failure(&format!("Sync failed: {e}")).await;
                return Err(e);
            }
        };

        // ── Interpret ────────────────────────────────────────────────
        info!(preview = %audit::preview(&body), "Directory service response");
        let summary: ChangeSummary = serde_json::from_str(&body)
            .map_err(|e| SyncClientError::Parse(format!("change summary: {e}")))?;
        if !summary.extra.is_empty() {
            let keys: Vec<&str> = summary.extra.keys().map(String::as_str).collect();
            warn!(buckets = ?keys, "Response contained unexpected change buckets");
        }
        let changes = summary.to_records(&stamp.row_timestamp);

        // ── Record (best-effort; the remote sync already succeeded) ──
        if let Err(e) = self
            .recorder
            .record_changes(&changes, stamp, self.options.apply_changes, batch_tag)
        {
            warn!(error = %e, "Could not write CSV change log");
            outcome.persistence_errors.push(e.to_string());
        }
        if let Err(e) = self.recorder.record_response(&body, stamp, batch_tag) {
            warn!(error = %e, "Could not write raw response log");
            outcome.persistence_errors.push(e.to_string());
        }
        if let Err(e) = self.recorder.archive_dataset(batch, stamp, batch_tag) {
            warn!(error = %e, "Could not archive submitted dataset");
            outcome.persistence_errors.push(e.to_string());
        }

        outcome.changes.extend(changes);
        outcome.batches_submitted += 1;
        Ok(())
    }

    async fn signal_success(&self, message: &str) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify_success(message).await {
                warn!(error = %e, "Could not send success notification");
            }
        }
    }

    async fn signal_failure(&self, message: &str) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify_failure(message).await {
                warn!(error = %e, "Could not send failure notification");
            }
        }
    }
}
