//! Subcommand handlers.

use std::path::Path;

use anyhow::{Context, Result};
use aws_provider_core::resources::{role, role_policy};
use aws_provider_core::{
    is_valid_account_id, partition_by_id, partition_for_region, Arn, AwsClients, MutexKV,
    PolicyDocument, ProviderConfig, ProviderError, RolePolicyConfig, RolePolicyId,
};
use serde::Serialize;

use crate::{ArnCommand, Cli, Command, RoleCommand, RolePolicyCommand};

const REGION_ENV_VARS: [&str; 2] = ["AWS_REGION", "AWS_DEFAULT_REGION"];

#[derive(Serialize)]
struct ParsedArn<'a> {
    #[serde(flatten)]
    arn: &'a Arn,
    resource_type: Option<&'a str>,
    resource_id: &'a str,
}

pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Arn { command } => run_arn(command),
        Command::Role { command } => {
            let (config, clients) = connect(cli.config.as_deref()).await?;
            run_role(command, &config, &clients).await
        }
        Command::RolePolicy { command } => {
            let (config, clients) = connect(cli.config.as_deref()).await?;
            run_role_policy(command, &config, &clients).await
        }
    }
}

fn run_arn(command: ArnCommand) -> Result<()> {
    match command {
        ArnCommand::Parse { arn } => {
            let arn: Arn = arn.parse()?;
            let (resource_type, resource_id) = arn.resource_parts();
            let parsed = ParsedArn {
                arn: &arn,
                resource_type,
                resource_id,
            };
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        ArnCommand::Build {
            service,
            resource,
            region,
            account,
            partition,
        } => {
            let region = region.unwrap_or_default();
            let partition = match partition {
                Some(id) => partition_by_id(&id).ok_or_else(|| {
                    ProviderError::validation("partition", format!("unknown partition {id:?}"))
                })?,
                None => partition_for_region(&region),
            };
            let account = account.unwrap_or_default();
            if !account.is_empty() && !is_valid_account_id(&account) {
                return Err(ProviderError::validation(
                    "account",
                    format!("{account:?} must be 12 digits"),
                )
                .into());
            }
            let arn = Arn::new(partition.id, service, region, account, resource);
            // Reject empty service or resource the same way parsing would.
            let arn: Arn = arn.to_string().parse()?;
            println!("{arn}");
        }
    }
    Ok(())
}

/// Load and validate the provider configuration, then build the clients.
async fn connect(path: Option<&Path>) -> Result<(ProviderConfig, AwsClients)> {
    let mut config = match path {
        Some(path) => ProviderConfig::load(path)
            .with_context(|| format!("loading provider configuration from {}", path.display()))?,
        None => ProviderConfig::new(""),
    };
    if config.region.is_empty() {
        if let Some(region) = REGION_ENV_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        {
            config.region = region;
        }
    }
    config.validate()?;
    log::debug!("Connecting to AWS in {}", config.region);

    let clients = AwsClients::connect(&config)
        .await
        .context("configuring AWS clients")?;
    Ok((config, clients))
}

async fn run_role(command: RoleCommand, config: &ProviderConfig, clients: &AwsClients) -> Result<()> {
    let api = clients.iam();
    match command {
        RoleCommand::Wait { name, timeout } => {
            let state = role::wait_until_readable(api, &name, timeout).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        RoleCommand::Delete {
            name,
            force_detach_policies,
        } => {
            role::delete(
                api,
                MutexKV::global(),
                &name,
                force_detach_policies,
                &config.timeouts,
            )
            .await?;
            eprintln!("Deleted IAM Role ({name})");
        }
    }
    Ok(())
}

async fn run_role_policy(
    command: RolePolicyCommand,
    config: &ProviderConfig,
    clients: &AwsClients,
) -> Result<()> {
    let api = clients.iam();
    match command {
        RolePolicyCommand::Put {
            role,
            name,
            document,
        } => {
            let text = std::fs::read_to_string(&document)
                .with_context(|| format!("reading policy document {}", document.display()))?;
            let document = PolicyDocument::from_json(&text)?;
            let policy = RolePolicyConfig::new(role, name, document);
            let state =
                role_policy::put(api, MutexKV::global(), &policy, &config.timeouts).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        RolePolicyCommand::Delete { role, name } => {
            let id = RolePolicyId::new(role, name);
            role_policy::delete(api, MutexKV::global(), &id, &config.timeouts).await?;
            eprintln!("Deleted IAM Role Policy ({id})");
        }
    }
    Ok(())
}
