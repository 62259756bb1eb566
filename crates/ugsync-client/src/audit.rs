//! Durable audit artifacts for sync runs.
//!
//! Every run leaves a CSV change log and the raw server response on disk,
//! named with the run's timestamp so consecutive runs never collide.  Dry
//! runs are tagged `_Test_Mode`, runs with no effective change `_NO_CHANGE`,
//! and multi-batch runs carry a `_batchN` tag per submission.  The raw
//! response is always persisted in full; only the human-facing log preview
//! is truncated.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;
use ugsync_core::{EntityKind, Group, User, UsersAndGroups};

use crate::sync::{ChangeRecord, RunStamp};

/// Upper bound on the human-facing response preview.
pub const RESPONSE_PREVIEW_BYTES: usize = 1000;

/// Writes audit artifacts into one log directory.
#[derive(Debug, Clone)]
pub struct AuditRecorder {
    dir: PathBuf,
}

impl AuditRecorder {
    /// Create a recorder rooted at `dir`, creating the directory if needed.
    ///
    /// Falls back to the current directory when `dir` cannot be created, so
    /// a run never loses its artifacts to a misconfigured log path.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match fs::create_dir_all(&dir) {
            Ok(()) => Self { dir },
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot use log directory, falling back to current directory");
                Self {
                    dir: PathBuf::from("."),
                }
            }
        }
    }

    /// The directory artifacts are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the CSV change log for one submission.
    ///
    /// The file always carries the header row; with no changes it is
    /// header-only and the name is tagged `_NO_CHANGE`.
    pub fn record_changes(
        &self,
        changes: &[ChangeRecord],
        stamp: &RunStamp,
        apply_changes: bool,
        batch_tag: Option<usize>,
    ) -> io::Result<PathBuf> {
        let mut name = format!("changes_{}", stamp.file_tag);
        if let Some(n) = batch_tag {
            name.push_str(&format!("_batch{n}"));
        }
        if !apply_changes {
            name.push_str("_Test_Mode");
        }
        if changes.is_empty() {
            name.push_str("_NO_CHANGE");
        }
        name.push_str(".csv");
        let path = self.dir.join(name);

        let mut writer = csv::Writer::from_path(&path).map_err(io::Error::other)?;
        writer
            .write_record(["timestamp", "entity", "entity_type", "change_type"])
            .map_err(io::Error::other)?;
        for change in changes {
            writer
                .write_record([
                    change.timestamp.as_str(),
                    change.entity.as_str(),
                    entity_label(change.entity_type),
                    change.change_type.as_str(),
                ])
                .map_err(io::Error::other)?;
        }
        writer.flush()?;
        Ok(path)
    }

    /// Persist the full raw response body for forensic recovery.
    pub fn record_response(
        &self,
        raw: &str,
        stamp: &RunStamp,
        batch_tag: Option<usize>,
    ) -> io::Result<PathBuf> {
        let mut name = format!("sync_response_{}", stamp.file_tag);
        if let Some(n) = batch_tag {
            name.push_str(&format!("_batch{n}"));
        }
        name.push_str(".json");
        let path = self.dir.join(name);
        fs::write(&path, raw)?;
        Ok(path)
    }

    /// Persist the principals document that a failed submission attempted,
    /// so the failed run can be diffed against a retried one.
    pub fn record_failed_submission(
        &self,
        principals_json: &str,
        stamp: &RunStamp,
    ) -> io::Result<PathBuf> {
        let path = self
            .dir
            .join(format!("users_and_groups_failed_sync_{}.json", stamp.file_tag));
        fs::write(&path, principals_json)?;
        Ok(path)
    }

    /// Archive the submitted dataset as `sent_user_data` / `sent_group_data`
    /// CSV copies.
    pub fn archive_dataset(
        &self,
        dataset: &UsersAndGroups,
        stamp: &RunStamp,
        batch_tag: Option<usize>,
    ) -> io::Result<Vec<PathBuf>> {
        let tag = match batch_tag {
            Some(n) => format!("{}_batch{n}", stamp.file_tag),
            None => stamp.file_tag.clone(),
        };

        let user_path = self.dir.join(format!("sent_user_data_{tag}.csv"));
        write_user_archive(&user_path, dataset.users())?;

        let group_path = self.dir.join(format!("sent_group_data_{tag}.csv"));
        write_group_archive(&group_path, dataset.groups())?;

        Ok(vec![user_path, group_path])
    }
}

/// Truncate a response body to the bounded human-facing preview.
#[must_use]
pub fn preview(raw: &str) -> &str {
    if raw.len() <= RESPONSE_PREVIEW_BYTES {
        return raw;
    }
    let mut end = RESPONSE_PREVIEW_BYTES;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    &raw[..end]
}

fn entity_label(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::User => "User",
        EntityKind::Group => "Group",
    }
}

fn write_user_archive(path: &Path, users: &[User]) -> io::Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(io::Error::other)?;
    writer
        .write_record([
            "name",
            "display_name",
            "mail",
            "group_names",
            "visibility",
            "created",
            "id",
        ])
        .map_err(io::Error::other)?;
    for user in users {
        writer
            .write_record([
                user.name.as_str(),
                user.display_name.as_deref().unwrap_or(""),
                user.mail.as_deref().unwrap_or(""),
                &names_cell(&user.group_names),
                user.visibility.as_deref().unwrap_or(""),
                user.created.as_deref().unwrap_or(""),
                user.id.as_deref().unwrap_or(""),
            ])
            .map_err(io::Error::other)?;
    }
    writer.flush()
}

fn write_group_archive(path: &Path, groups: &[Group]) -> io::Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(io::Error::other)?;
    writer
        .write_record([
            "name",
            "display_name",
            "description",
            "group_names",
            "privileges",
            "visibility",
            "id",
        ])
        .map_err(io::Error::other)?;
    for group in groups {
        writer
            .write_record([
                group.name.as_str(),
                group.display_name.as_deref().unwrap_or(""),
                group.description.as_deref().unwrap_or(""),
                &names_cell(&group.group_names),
                &names_cell(&group.privileges),
                group.visibility.as_deref().unwrap_or(""),
                group.id.as_deref().unwrap_or(""),
            ])
            .map_err(io::Error::other)?;
    }
    writer.flush()
}

/// Name lists are stored as a JSON array inside one CSV cell, the same shape
/// the CSV importer reads back.
fn names_cell(names: &[String]) -> String {
    serde_json::to_string(names).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ChangeType;
    use tempfile::TempDir;

    fn stamp() -> RunStamp {
        RunStamp {
            file_tag: "01Jan26_12-00-00-000000".to_string(),
            row_timestamp: "2026-01-01 12:00:00".to_string(),
        }
    }

    fn one_change() -> Vec<ChangeRecord> {
        vec![ChangeRecord {
            entity: "alice".to_string(),
            entity_type: EntityKind::User,
            change_type: ChangeType::Added,
            timestamp: "2026-01-01 12:00:00".to_string(),
        }]
    }

    #[test]
    fn change_log_names_carry_mode_tags() {
        let dir = TempDir::new().unwrap();
        let recorder = AuditRecorder::new(dir.path());

        let applied = recorder
            .record_changes(&one_change(), &stamp(), true, None)
            .unwrap();
        assert_eq!(
            applied.file_name().unwrap().to_str().unwrap(),
            "changes_01Jan26_12-00-00-000000.csv"
        );

        let dry = recorder
            .record_changes(&one_change(), &stamp(), false, None)
            .unwrap();
        assert!(dry.to_str().unwrap().ends_with("_Test_Mode.csv"));

        let empty = recorder.record_changes(&[], &stamp(), true, None).unwrap();
        assert!(empty.to_str().unwrap().ends_with("_NO_CHANGE.csv"));

        let batched = recorder
            .record_changes(&one_change(), &stamp(), false, Some(2))
            .unwrap();
        assert!(batched.to_str().unwrap().ends_with("_batch2_Test_Mode.csv"));
    }

    #[test]
    fn change_log_has_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let recorder = AuditRecorder::new(dir.path());
        let path = recorder
            .record_changes(&one_change(), &stamp(), true, None)
            .unwrap();
        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "timestamp,entity,entity_type,change_type");
        assert_eq!(lines[1], "2026-01-01 12:00:00,alice,User,Added");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn empty_change_log_is_header_only() {
        let dir = TempDir::new().unwrap();
        let recorder = AuditRecorder::new(dir.path());
        let path = recorder.record_changes(&[], &stamp(), true, None).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn failed_submission_is_persisted_verbatim() {
        let dir = TempDir::new().unwrap();
        let recorder = AuditRecorder::new(dir.path());
        let path = recorder
            .record_failed_submission("[{\"name\":\"alice\"}]", &stamp())
            .unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("users_and_groups_failed_sync_"));
        assert_eq!(fs::read_to_string(path).unwrap(), "[{\"name\":\"alice\"}]");
    }

    #[test]
    fn unusable_log_dir_falls_back_to_current_directory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("occupied");
        fs::write(&blocker, "not a directory").unwrap();
        let recorder = AuditRecorder::new(&blocker);
        assert_eq!(recorder.dir(), Path::new("."));
    }

    #[test]
    fn preview_is_bounded_and_char_safe() {
        let short = "abc";
        assert_eq!(preview(short), "abc");

        let long = "é".repeat(600); // 1200 bytes
        let cut = preview(&long);
        assert!(cut.len() <= RESPONSE_PREVIEW_BYTES);
        assert!(long.starts_with(cut));
    }
}
