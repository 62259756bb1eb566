//! `ugsync` — reconcile users and groups with a remote directory service.

mod commands;
mod error;
mod formats;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use ugsync_client::{Credentials, DirectoryClient};

use crate::error::CliError;
use crate::formats::DatasetSource;

#[derive(Parser)]
#[command(
    name = "ugsync",
    version,
    about = "Reconcile users and groups with a remote directory service"
)]
struct Cli {
    /// Base URL of the directory service
    #[arg(long, env = "UGSYNC_URL", global = true)]
    url: Option<String>,

    /// Login username
    #[arg(long, env = "UGSYNC_USERNAME", global = true)]
    username: Option<String>,

    /// Login password
    #[arg(long, env = "UGSYNC_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 120, global = true)]
    timeout: u64,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile a local dataset with the directory service
    Sync(SyncArgs),

    /// Fetch the service's current users and groups as a principals document
    Fetch {
        /// Include each group's privilege tokens
        #[arg(long)]
        privileges: bool,
        /// Write the document here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a local dataset without contacting the service
    Validate(DatasetArgs),

    /// Delete users by name
    DeleteUsers {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Delete groups by name
    DeleteGroups {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Change a user's password
    UpdatePassword {
        name: String,
        current_password: String,
        new_password: String,
    },

    /// Transfer all objects owned by one user to another
    TransferOwnership { from: String, to: String },

    /// Grant a privilege to groups
    AddPrivilege {
        privilege: String,
        #[arg(required = true)]
        groups: Vec<String>,
    },

    /// Revoke a privilege from groups
    RemovePrivilege {
        privilege: String,
        #[arg(required = true)]
        groups: Vec<String>,
    },
}

/// Where the local dataset comes from.
#[derive(Args)]
pub struct DatasetArgs {
    /// CSV file of users
    #[arg(long)]
    pub users_csv: Option<PathBuf>,

    /// CSV file of groups
    #[arg(long)]
    pub groups_csv: Option<PathBuf>,

    /// JSON principals file
    #[arg(long)]
    pub principals_json: Option<PathBuf>,

    /// Drop imported groups whose name ends with this suffix
    #[arg(long)]
    pub exclude_group_suffix: Option<String>,
}

impl DatasetArgs {
    fn source(&self) -> DatasetSource {
        DatasetSource {
            users_csv: self.users_csv.clone(),
            groups_csv: self.groups_csv.clone(),
            principals_json: self.principals_json.clone(),
            exclude_group_suffix: self.exclude_group_suffix.clone(),
        }
    }
}

#[derive(Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Apply the computed changes (omit for a dry run)
    #[arg(long)]
    pub apply_changes: bool,

    /// Delete remote entities absent from the dataset
    #[arg(long)]
    pub remove_deleted: bool,

    /// Users per submission (0 submits everything at once)
    #[arg(long, default_value_t = 0)]
    pub batch_size: usize,

    /// Define groups that users reference without an explicit entry
    #[arg(long)]
    pub create_groups: bool,

    /// Carry existing remote group memberships forward
    #[arg(long)]
    pub merge_groups: bool,

    /// Provisioning password for newly created users
    #[arg(long)]
    pub set_password: Option<String>,

    /// Directory for audit artifacts
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// JSON file with SMTP notification settings
    #[arg(long)]
    pub notify_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Validate(ref args) => commands::validate::run(args),
        ref command => {
            let client = build_client(&cli)?;
            match command {
                Command::Sync(args) => commands::sync::run(client, args).await,
                Command::Fetch { privileges, output } => {
                    commands::fetch::run(client, *privileges, output.as_deref()).await
                }
                Command::DeleteUsers { names } => Ok(client.delete_users(names).await?),
                Command::DeleteGroups { names } => Ok(client.delete_groups(names).await?),
                Command::UpdatePassword {
                    name,
                    current_password,
                    new_password,
                } => Ok(client
                    .update_password(name, current_password, new_password)
                    .await?),
                Command::TransferOwnership { from, to } => {
                    Ok(client.transfer_ownership(from, to).await?)
                }
                Command::AddPrivilege { privilege, groups } => {
                    Ok(client.add_privilege(groups, privilege).await?)
                }
                Command::RemovePrivilege { privilege, groups } => {
                    Ok(client.remove_privilege(groups, privilege).await?)
                }
                Command::Validate(_) => unreachable!("handled above"),
            }
        }
    }
}

fn build_client(cli: &Cli) -> Result<DirectoryClient, CliError> {
    let url = cli
        .url
        .clone()
        .ok_or_else(|| CliError::Input("--url (or UGSYNC_URL) is required".to_string()))?;
    let username = cli.username.clone().ok_or_else(|| {
        CliError::Input("--username (or UGSYNC_USERNAME) is required".to_string())
    })?;
    let password = cli.password.clone().ok_or_else(|| {
        CliError::Input("--password (or UGSYNC_PASSWORD) is required".to_string())
    })?;

    Ok(DirectoryClient::new(
        url,
        Credentials::new(username, password),
        Duration::from_secs(cli.timeout),
        !cli.insecure,
    )?)
}
