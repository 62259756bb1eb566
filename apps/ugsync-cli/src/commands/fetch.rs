//! The `fetch` subcommand.

use std::fs;
use std::path::Path;

use ugsync_client::DirectoryClient;

use crate::error::CliError;

pub async fn run(
    client: DirectoryClient,
    privileges: bool,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let dataset = client.fetch_all(privileges).await?;
    let principals = dataset.to_principals();
    let document = serde_json::to_string_pretty(&principals)
        .map_err(|e| CliError::Input(format!("could not serialize principals: {e}")))?;

    match output {
        Some(path) => {
            fs::write(path, &document)?;
            eprintln!(
                "wrote {} user(s) and {} group(s) to {}",
                dataset.number_users(),
                dataset.number_groups(),
                path.display()
            );
        }
        None => println!("{document}"),
    }
    Ok(())
}
