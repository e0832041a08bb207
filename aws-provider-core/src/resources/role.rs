//! IAM role workflow.

use std::time::Duration;

use aws_provider_waiter::{retry_when, PollResult, RetryDecision, RetryError, StateWaiter, WaitSpec};
use serde::Serialize;

use super::validate_iam_name;
use crate::aws::{AwsError, AwsResult, CreateRoleInput, IamApi, RoleRecord, UpdateRoleInput};
use crate::config::Timeouts;
use crate::error::{ProviderError, ProviderResult};
use crate::mutexkv::MutexKV;
use crate::types::{policies_equivalent, PolicyDocument};

pub const ROLE_NAME_MAX_LEN: usize = 64;
pub const MIN_SESSION_DURATION: i32 = 3600;
pub const MAX_SESSION_DURATION: i32 = 43200;
const DESCRIPTION_MAX_LEN: usize = 1000;
const PATH_MAX_LEN: usize = 512;

const STATUS_AVAILABLE: &str = "available";
const STATUS_EXISTS: &str = "exists";
const STATUS_UPDATING: &str = "updating";
const STATUS_UPDATED: &str = "updated";

fn label(name: &str) -> String {
    format!("IAM Role ({name})")
}

/// IAM rejects trust policies naming principals it cannot see yet.
pub(crate) fn is_invalid_principal(err: &AwsError) -> bool {
    err.has_code_and_message("MalformedPolicyDocument", "Invalid principal")
}

/// IAM does not store empty descriptions, so `Some("")` and `None` match.
fn same_description(current: Option<&str>, desired: Option<&str>) -> bool {
    current.unwrap_or_default() == desired.unwrap_or_default()
}

fn retry_invalid_principal(err: &AwsError) -> RetryDecision {
    if is_invalid_principal(err) {
        RetryDecision::Retry
    } else {
        RetryDecision::Stop
    }
}

/// Desired state of a role.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleConfig {
    pub name: String,
    pub path: String,
    pub description: Option<String>,
    pub assume_role_policy: PolicyDocument,
    /// Seconds, 3600 to 43200.
    pub max_session_duration: Option<i32>,
}

impl RoleConfig {
    pub fn new(name: impl Into<String>, assume_role_policy: PolicyDocument) -> Self {
        Self {
            name: name.into(),
            path: "/".to_string(),
            description: None,
            assume_role_policy,
            max_session_duration: None,
        }
    }

    pub fn validate(&self) -> ProviderResult<()> {
        validate_iam_name("role name", &self.name, ROLE_NAME_MAX_LEN)?;
        if self.path.len() > PATH_MAX_LEN || !self.path.starts_with('/') || !self.path.ends_with('/')
        {
            return Err(ProviderError::validation(
                "role path",
                format!(
                    "{:?} must begin and end with '/' and be at most {PATH_MAX_LEN} characters",
                    self.path
                ),
            ));
        }
        if let Some(description) = &self.description {
            if description.chars().count() > DESCRIPTION_MAX_LEN {
                return Err(ProviderError::validation(
                    "role description",
                    format!("must be at most {DESCRIPTION_MAX_LEN} characters"),
                ));
            }
        }
        if let Some(seconds) = self.max_session_duration {
            if !(MIN_SESSION_DURATION..=MAX_SESSION_DURATION).contains(&seconds) {
                return Err(ProviderError::validation(
                    "max session duration",
                    format!(
                        "{seconds} must be between {MIN_SESSION_DURATION} and {MAX_SESSION_DURATION} seconds"
                    ),
                ));
            }
        }
        if self.assume_role_policy.statement.is_empty() {
            return Err(ProviderError::validation(
                "assume role policy",
                "must contain at least one statement",
            ));
        }
        Ok(())
    }

    fn create_input(&self) -> ProviderResult<CreateRoleInput> {
        Ok(CreateRoleInput {
            role_name: self.name.clone(),
            path: self.path.clone(),
            assume_role_policy_document: self.assume_role_policy.to_json()?,
            description: self.description.clone(),
            max_session_duration: self.max_session_duration,
        })
    }
}

/// Observed state of a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleState {
    pub name: String,
    pub unique_id: String,
    pub arn: String,
    pub path: String,
    pub description: Option<String>,
    pub max_session_duration: Option<i32>,
    pub assume_role_policy: Option<String>,
}

impl From<RoleRecord> for RoleState {
    fn from(role: RoleRecord) -> Self {
        Self {
            name: role.role_name,
            unique_id: role.role_id,
            arn: role.arn,
            path: role.path,
            description: role.description,
            max_session_duration: role.max_session_duration,
            assume_role_policy: role.assume_role_policy_document,
        }
    }
}

async fn role_available<A>(api: &A, name: &str) -> AwsResult<PollResult<RoleRecord>>
where
    A: IamApi + ?Sized,
{
    let role = api.get_role(name).await?;
    Ok(PollResult::new(role, STATUS_AVAILABLE))
}

async fn role_exists<A>(api: &A, name: &str) -> AwsResult<PollResult<RoleRecord>>
where
    A: IamApi + ?Sized,
{
    PollResult::from_find(api.get_role(name).await, AwsError::is_not_found, |_| {
        STATUS_EXISTS.to_string()
    })
}

async fn role_converged<A>(api: &A, config: &RoleConfig, policy: &str) -> AwsResult<PollResult<RoleRecord>>
where
    A: IamApi + ?Sized,
{
    let role = api.get_role(&config.name).await?;
    let converged = role
        .assume_role_policy_document
        .as_deref()
        .is_some_and(|current| policies_equivalent(current, policy))
        && same_description(role.description.as_deref(), config.description.as_deref())
        && (config.max_session_duration.is_none()
            || role.max_session_duration == config.max_session_duration);
    let status = if converged {
        STATUS_UPDATED
    } else {
        STATUS_UPDATING
    };
    Ok(PollResult::new(role, status))
}

/// Create the role and wait until IAM serves it on the read path.
pub async fn create<A>(api: &A, config: &RoleConfig, timeouts: &Timeouts) -> ProviderResult<RoleState>
where
    A: IamApi + ?Sized,
{
    config.validate()?;
    let input = config.create_input()?;

    log::info!("Creating {}", label(&config.name));
    retry_when(
        timeouts.propagation,
        || api.create_role(&input),
        retry_invalid_principal,
    )
    .await
    .map_err(|e| ProviderError::retry("creating", label(&config.name), e))?;

    wait_until_readable(api, &config.name, timeouts.propagation).await
}

/// Wait until `get_role` stops reporting the role as missing.
pub async fn wait_until_readable<A>(api: &A, name: &str, timeout: Duration) -> ProviderResult<RoleState>
where
    A: IamApi + ?Sized,
{
    let spec = WaitSpec::new(std::iter::empty(), [STATUS_AVAILABLE], timeout)
        .description(format!("{} creation", label(name)));

    let role = StateWaiter::new(&spec)
        .treat_as_not_found(AwsError::is_not_found)
        .wait(|| role_available(api, name))
        .await
        .map_err(|failure| {
            ProviderError::wait(label(name), "to become readable", failure.into_error())
        })?;

    role.map(RoleState::from)
        .ok_or_else(|| ProviderError::EmptyResult {
            resource: label(name),
        })
}

/// Current state of the role, or `None` if it no longer exists.
pub async fn read<A>(api: &A, name: &str) -> ProviderResult<Option<RoleState>>
where
    A: IamApi + ?Sized,
{
    match api.get_role(name).await {
        Ok(role) => Ok(Some(role.into())),
        Err(err) if err.is_not_found() => {
            log::warn!("{} not found, removing from state", label(name));
            Ok(None)
        }
        Err(err) => Err(ProviderError::operation("reading", label(name), err)),
    }
}

/// Bring an existing role in line with `config`.
pub async fn update<A>(api: &A, config: &RoleConfig, timeouts: &Timeouts) -> ProviderResult<RoleState>
where
    A: IamApi + ?Sized,
{
    config.validate()?;
    let name = config.name.as_str();
    let current = read(api, name).await?.ok_or_else(|| {
        ProviderError::operation("updating", label(name), AwsError::not_found("IAM Role", name))
    })?;
    let policy = config.assume_role_policy.to_json()?;

    let policy_changed = !current
        .assume_role_policy
        .as_deref()
        .is_some_and(|existing| policies_equivalent(existing, &policy));
    let settings_changed = !same_description(
        current.description.as_deref(),
        config.description.as_deref(),
    )
        || (config.max_session_duration.is_some()
            && current.max_session_duration != config.max_session_duration);

    if !policy_changed && !settings_changed {
        log::debug!("{} is up to date", label(name));
        return Ok(current);
    }

    if policy_changed {
        log::info!("Updating assume role policy of {}", label(name));
        retry_when(
            timeouts.propagation,
            || api.update_assume_role_policy(name, &policy),
            retry_invalid_principal,
        )
        .await
        .map_err(|e| ProviderError::retry("updating assume role policy of", label(name), e))?;
    }

    if settings_changed {
        log::info!("Updating {}", label(name));
        // An omitted description is left unchanged, so clearing sends "".
        let input = UpdateRoleInput {
            description: Some(config.description.clone().unwrap_or_default()),
            max_session_duration: config.max_session_duration,
        };
        api.update_role(name, &input)
            .await
            .map_err(|e| ProviderError::operation("updating", label(name), e))?;
    }

    let spec = WaitSpec::new([STATUS_UPDATING], [STATUS_UPDATED], timeouts.update)
        .description(format!("{} update", label(name)));
    let role = StateWaiter::new(&spec)
        .wait(|| role_converged(api, config, &policy))
        .await
        .map_err(|failure| ProviderError::wait(label(name), "to be updated", failure.into_error()))?;

    role.map(RoleState::from)
        .ok_or_else(|| ProviderError::EmptyResult {
            resource: label(name),
        })
}

/// Delete the role and wait until it is gone. A role that is already gone
/// is not an error.
pub async fn delete<A>(
    api: &A,
    locks: &MutexKV,
    name: &str,
    force_detach_policies: bool,
    timeouts: &Timeouts,
) -> ProviderResult<()>
where
    A: IamApi + ?Sized,
{
    if force_detach_policies {
        let _guard = locks.lock(name).await;
        let policies = match api.list_role_policies(name).await {
            Ok(policies) => policies,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => {
                return Err(ProviderError::operation(
                    "listing inline policies of",
                    label(name),
                    err,
                ))
            }
        };
        for policy in policies {
            log::debug!("Deleting inline policy {policy} of {}", label(name));
            match api.delete_role_policy(name, &policy).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    return Err(ProviderError::operation(
                        "deleting inline policy of",
                        label(name),
                        err,
                    ))
                }
            }
        }
    }

    log::info!("Deleting {}", label(name));
    let deleted = retry_when(
        timeouts.propagation,
        || api.delete_role(name),
        |err: &AwsError| match err {
            AwsError::IamError { code, .. } if code == "DeleteConflict" => RetryDecision::Retry,
            _ => RetryDecision::Stop,
        },
    )
    .await;
    match deleted {
        Ok(()) => {}
        Err(RetryError::Stopped(err)) if err.is_not_found() => return Ok(()),
        Err(err) => return Err(ProviderError::retry("deleting", label(name), err)),
    }

    let spec = WaitSpec::deletion([STATUS_EXISTS], timeouts.delete)
        .description(format!("{} deletion", label(name)));
    StateWaiter::new(&spec)
        .wait(|| role_exists(api, name))
        .await
        .map_err(|failure| ProviderError::wait(label(name), "to be deleted", failure.into_error()))?;
    Ok(())
}
