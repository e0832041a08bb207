//! `aws-provider`: ARN helpers and IAM role workflows from the command line.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use aws_provider_core::ProviderError;
use clap::{Parser, Subcommand};
use log::LevelFilter;

/// Exit status for AWS or wait failures.
const EXIT_FAILURE: u8 = 1;
/// Exit status for bad input: invalid ARNs, arguments or configuration.
const EXIT_INVALID_INPUT: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "aws-provider",
    version,
    about = "Build and inspect ARNs, and manage IAM roles with consistency-aware waits"
)]
struct Cli {
    /// Provider configuration file (TOML)
    #[arg(long, global = true, env = "AWS_PROVIDER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and build Amazon Resource Names
    Arn {
        #[command(subcommand)]
        command: ArnCommand,
    },
    /// IAM role operations
    Role {
        #[command(subcommand)]
        command: RoleCommand,
    },
    /// IAM role inline policy operations
    RolePolicy {
        #[command(subcommand)]
        command: RolePolicyCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ArnCommand {
    /// Print the fields of an ARN as JSON
    Parse {
        /// The ARN to parse
        arn: String,
    },
    /// Build an ARN from its parts
    Build {
        #[arg(long)]
        service: String,
        #[arg(long)]
        resource: String,
        /// Region; also selects the partition unless --partition is given
        #[arg(long)]
        region: Option<String>,
        /// 12-digit account id
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        partition: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum RoleCommand {
    /// Wait until an IAM role is readable
    Wait {
        #[arg(long)]
        name: String,
        /// How long to wait, e.g. "90s" or "2m"
        #[arg(long, default_value = "2m", value_parser = humantime::parse_duration)]
        timeout: Duration,
    },
    /// Delete an IAM role and wait until it is gone
    Delete {
        #[arg(long)]
        name: String,
        /// Delete the role's inline policies first
        #[arg(long)]
        force_detach_policies: bool,
    },
}

#[derive(Subcommand, Debug)]
enum RolePolicyCommand {
    /// Create or replace an inline policy and wait until it propagates
    Put {
        #[arg(long)]
        role: String,
        #[arg(long)]
        name: String,
        /// Path to the policy document (JSON)
        #[arg(long, value_name = "FILE")]
        document: PathBuf,
    },
    /// Delete an inline policy and wait until it is gone
    Delete {
        #[arg(long)]
        role: String,
        #[arg(long)]
        name: String,
    },
}

fn init_logging(debug: bool) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn"),
    );
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp_millis().init();
}

/// Map an error to the process exit status.
fn exit_code(err: &anyhow::Error) -> u8 {
    let user_error = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<ProviderError>())
        .any(ProviderError::is_user_error);
    if user_error {
        EXIT_INVALID_INPUT
    } else {
        EXIT_FAILURE
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}
