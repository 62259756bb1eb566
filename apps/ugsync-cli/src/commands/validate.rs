//! The `validate` subcommand: purely local, no network.

use ugsync_client::SyncClientError;

use crate::error::CliError;
use crate::DatasetArgs;

pub fn run(args: &DatasetArgs) -> Result<(), CliError> {
    let dataset = args.source().load()?;
    let report = dataset.validate();
    if report.ok() {
        println!(
            "dataset is valid: {} user(s), {} group(s)",
            dataset.number_users(),
            dataset.number_groups()
        );
        Ok(())
    } else {
        for violation in &report.violations {
            eprintln!("{violation}");
        }
        Err(CliError::Client(SyncClientError::InvalidDataset(report)))
    }
}
