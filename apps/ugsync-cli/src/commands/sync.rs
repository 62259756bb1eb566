//! The `sync` subcommand.

use ugsync_client::{
    AuditRecorder, DirectoryClient, NotificationConfig, Notifier, RunStamp, SyncEngine,
    SyncOptions,
};
use ugsync_core::EntityKind;

use crate::error::CliError;
use crate::SyncArgs;

pub async fn run(client: DirectoryClient, args: &SyncArgs) -> Result<(), CliError> {
    let dataset = args.dataset.source().load()?;

    let options = SyncOptions {
        apply_changes: args.apply_changes,
        remove_deleted: args.remove_deleted,
        batch_size: args.batch_size,
        create_groups: args.create_groups,
        merge_groups: args.merge_groups,
        password: args.set_password.clone(),
    };

    let recorder = AuditRecorder::new(&args.log_dir);
    let mut engine = SyncEngine::new(client, options, recorder);
    if let Some(path) = &args.notify_config {
        let config = NotificationConfig::from_json_file(path)?;
        engine = engine.with_notifier(Notifier::new(config));
    }

    let stamp = RunStamp::now();
    let outcome = engine.run(dataset, &stamp).await?;

    let mode = if args.apply_changes { "" } else { " (dry run)" };
    println!(
        "{} change(s) across {} submission(s){mode}",
        outcome.changes.len(),
        outcome.batches_submitted
    );
    for change in &outcome.changes {
        let kind = match change.entity_type {
            EntityKind::User => "user",
            EntityKind::Group => "group",
        };
        println!("  {} {kind} {}", change.change_type.as_str(), change.entity);
    }
    for error in &outcome.persistence_errors {
        eprintln!("warning: audit artifact not written: {error}");
    }
    Ok(())
}
