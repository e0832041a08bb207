//! IAM role inline policy workflow.

use std::fmt;
use std::str::FromStr;

use aws_provider_waiter::{retry_when_not_found, PollResult, StateWaiter, WaitSpec};
use serde::Serialize;

use super::role::ROLE_NAME_MAX_LEN;
use super::validate_iam_name;
use crate::aws::{AwsError, AwsResult, IamApi};
use crate::config::Timeouts;
use crate::error::{ProviderError, ProviderResult};
use crate::mutexkv::MutexKV;
use crate::types::{policies_equivalent, PolicyDocument};

pub const POLICY_NAME_MAX_LEN: usize = 128;

/// Consecutive matching reads required before a put counts as propagated.
const REQUIRED_CONFIRMATIONS: u32 = 2;

const STATUS_STALE: &str = "stale";
const STATUS_PROPAGATED: &str = "propagated";
const STATUS_EXISTS: &str = "exists";

fn label(id: &RolePolicyId) -> String {
    format!("IAM Role Policy ({id})")
}

/// `role:policy`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RolePolicyId {
    pub role: String,
    pub name: String,
}

impl RolePolicyId {
    pub fn new(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            name: name.into(),
        }
    }
}

impl FromStr for RolePolicyId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((role, name)) if !role.is_empty() && !name.is_empty() => Ok(Self::new(role, name)),
            _ => Err(ProviderError::validation(
                "role policy id",
                format!("expected ROLE:POLICY, got {s:?}"),
            )),
        }
    }
}

impl fmt::Display for RolePolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.name)
    }
}

/// Desired inline policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RolePolicyConfig {
    pub role: String,
    pub name: String,
    pub document: PolicyDocument,
}

impl RolePolicyConfig {
    pub fn new(role: impl Into<String>, name: impl Into<String>, document: PolicyDocument) -> Self {
        Self {
            role: role.into(),
            name: name.into(),
            document,
        }
    }

    pub fn id(&self) -> RolePolicyId {
        RolePolicyId::new(&self.role, &self.name)
    }

    pub fn validate(&self) -> ProviderResult<()> {
        validate_iam_name("role name", &self.role, ROLE_NAME_MAX_LEN)?;
        validate_iam_name("policy name", &self.name, POLICY_NAME_MAX_LEN)?;
        if self.document.statement.is_empty() {
            return Err(ProviderError::validation(
                "policy document",
                "must contain at least one statement",
            ));
        }
        Ok(())
    }
}

/// Observed inline policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolePolicyState {
    pub id: String,
    pub role: String,
    pub name: String,
    /// URL-decoded JSON as returned by IAM.
    pub document: String,
}

impl RolePolicyState {
    fn new(id: &RolePolicyId, document: String) -> Self {
        Self {
            id: id.to_string(),
            role: id.role.clone(),
            name: id.name.clone(),
            document,
        }
    }
}

async fn policy_status<A>(api: &A, id: &RolePolicyId, expected: &str) -> AwsResult<PollResult<String>>
where
    A: IamApi + ?Sized,
{
    let found = api.get_role_policy(&id.role, &id.name).await;
    PollResult::from_find(found, AwsError::is_not_found, |document| {
        if policies_equivalent(document, expected) {
            STATUS_PROPAGATED.to_string()
        } else {
            STATUS_STALE.to_string()
        }
    })
}

async fn policy_exists<A>(api: &A, id: &RolePolicyId) -> AwsResult<PollResult<String>>
where
    A: IamApi + ?Sized,
{
    let found = api.get_role_policy(&id.role, &id.name).await;
    PollResult::from_find(found, AwsError::is_not_found, |_| STATUS_EXISTS.to_string())
}

/// Create or replace the inline policy and wait until reads return it.
///
/// Writes to the same role are serialized through `locks`.
pub async fn put<A>(
    api: &A,
    locks: &MutexKV,
    config: &RolePolicyConfig,
    timeouts: &Timeouts,
) -> ProviderResult<RolePolicyState>
where
    A: IamApi + ?Sized,
{
    config.validate()?;
    let id = config.id();
    let document = config.document.to_json()?;

    let _guard = locks.lock(&config.role).await;
    log::info!("Putting {}", label(&id));
    // A role created moments ago may not be visible to PutRolePolicy yet.
    retry_when_not_found(
        timeouts.propagation,
        || api.put_role_policy(&config.role, &config.name, &document),
        AwsError::is_not_found,
    )
    .await
    .map_err(|e| ProviderError::retry("putting", label(&id), e))?;

    let spec = WaitSpec::new([STATUS_STALE], [STATUS_PROPAGATED], timeouts.propagation)
        .continuous_target_occurrence(REQUIRED_CONFIRMATIONS)
        .description(format!("{} propagation", label(&id)));
    let propagated = StateWaiter::new(&spec)
        .wait(|| policy_status(api, &id, &document))
        .await
        .map_err(|failure| {
            ProviderError::wait(label(&id), "to propagate", failure.into_error())
        })?;

    propagated
        .map(|document| RolePolicyState::new(&id, document))
        .ok_or_else(|| ProviderError::EmptyResult { resource: label(&id) })
}

/// Current inline policy, or `None` if it no longer exists.
pub async fn read<A>(api: &A, id: &RolePolicyId) -> ProviderResult<Option<RolePolicyState>>
where
    A: IamApi + ?Sized,
{
    match api.get_role_policy(&id.role, &id.name).await {
        Ok(document) => Ok(Some(RolePolicyState::new(id, document))),
        Err(err) if err.is_not_found() => {
            log::warn!("{} not found, removing from state", label(id));
            Ok(None)
        }
        Err(err) => Err(ProviderError::operation("reading", label(id), err)),
    }
}

/// Delete the inline policy and wait until reads stop returning it.
pub async fn delete<A>(
    api: &A,
    locks: &MutexKV,
    id: &RolePolicyId,
    timeouts: &Timeouts,
) -> ProviderResult<()>
where
    A: IamApi + ?Sized,
{
    let _guard = locks.lock(&id.role).await;
    log::info!("Deleting {}", label(id));
    match api.delete_role_policy(&id.role, &id.name).await {
        Ok(()) => {}
        Err(err) if err.is_not_found() => return Ok(()),
        Err(err) => return Err(ProviderError::operation("deleting", label(id), err)),
    }

    let spec = WaitSpec::deletion([STATUS_EXISTS], timeouts.delete)
        .description(format!("{} deletion", label(id)));
    StateWaiter::new(&spec)
        .wait(|| policy_exists(api, id))
        .await
        .map_err(|failure| ProviderError::wait(label(id), "to be deleted", failure.into_error()))?;
    Ok(())
}
