//! IAM API seam and its AWS SDK implementation.
//!
//! Workflows only talk to [`IamApi`], so they can be driven by the real
//! client or by an in-memory fake in tests.

use async_trait::async_trait;
use aws_sdk_iam::types::Role;
use aws_sdk_iam::Client as IamClient;

use crate::aws::{AwsError, AwsResult};

const ROLE: &str = "IAM Role";
const ROLE_POLICY: &str = "IAM Role Policy";

/// The parts of an IAM role the workflows care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    pub role_name: String,
    pub role_id: String,
    pub arn: String,
    pub path: String,
    pub description: Option<String>,
    pub max_session_duration: Option<i32>,
    /// URL-decoded JSON.
    pub assume_role_policy_document: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    pub role_name: String,
    pub path: String,
    pub assume_role_policy_document: String,
    pub description: Option<String>,
    pub max_session_duration: Option<i32>,
}

/// Fields left as `None` are not sent, and IAM keeps their current value.
/// An empty description clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRoleInput {
    pub description: Option<String>,
    pub max_session_duration: Option<i32>,
}

/// IAM operations used by the role and role policy workflows.
///
/// Missing entities are reported as [`AwsError::NotFound`].
#[async_trait]
pub trait IamApi: Send + Sync {
    async fn create_role(&self, input: &CreateRoleInput) -> AwsResult<RoleRecord>;

    async fn get_role(&self, role_name: &str) -> AwsResult<RoleRecord>;

    async fn update_role(&self, role_name: &str, input: &UpdateRoleInput) -> AwsResult<()>;

    async fn update_assume_role_policy(&self, role_name: &str, policy_document: &str)
        -> AwsResult<()>;

    async fn delete_role(&self, role_name: &str) -> AwsResult<()>;

    async fn list_role_policies(&self, role_name: &str) -> AwsResult<Vec<String>>;

    async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        policy_document: &str,
    ) -> AwsResult<()>;

    /// Returns the URL-decoded policy document.
    async fn get_role_policy(&self, role_name: &str, policy_name: &str) -> AwsResult<String>;

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> AwsResult<()>;
}

/// [`IamApi`] over the AWS SDK.
#[derive(Debug, Clone)]
pub struct AwsIamClient {
    client: IamClient,
}

impl AwsIamClient {
    pub fn new(client: IamClient) -> Self {
        Self { client }
    }
}

/// IAM returns policy documents URL-encoded.
pub(crate) fn decode_policy_document(document: &str) -> AwsResult<String> {
    percent_encoding::percent_decode_str(document)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| AwsError::PolicyError(format!("Failed to URL decode policy document: {e}")))
}

fn role_record(role: Role) -> AwsResult<RoleRecord> {
    let assume_role_policy_document = role
        .assume_role_policy_document
        .as_deref()
        .map(decode_policy_document)
        .transpose()?;
    Ok(RoleRecord {
        role_name: role.role_name,
        role_id: role.role_id,
        arn: role.arn,
        path: role.path,
        description: role.description,
        max_session_duration: role.max_session_duration,
        assume_role_policy_document,
    })
}

fn role_or_not_found(role: Option<Role>, role_name: &str) -> AwsResult<RoleRecord> {
    role.map_or_else(|| Err(AwsError::not_found(ROLE, role_name)), role_record)
}

fn policy_id(role_name: &str, policy_name: &str) -> String {
    format!("{role_name}:{policy_name}")
}

#[async_trait]
impl IamApi for AwsIamClient {
    async fn create_role(&self, input: &CreateRoleInput) -> AwsResult<RoleRecord> {
        let response = self
            .client
            .create_role()
            .role_name(&input.role_name)
            .path(&input.path)
            .assume_role_policy_document(&input.assume_role_policy_document)
            .set_description(input.description.clone())
            .set_max_session_duration(input.max_session_duration)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(e, ROLE, &input.role_name))?;
        role_or_not_found(response.role, &input.role_name)
    }

    async fn get_role(&self, role_name: &str) -> AwsResult<RoleRecord> {
        let response = self
            .client
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(e, ROLE, role_name))?;
        role_or_not_found(response.role, role_name)
    }

    async fn update_role(&self, role_name: &str, input: &UpdateRoleInput) -> AwsResult<()> {
        self.client
            .update_role()
            .role_name(role_name)
            .set_description(input.description.clone())
            .set_max_session_duration(input.max_session_duration)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(e, ROLE, role_name))?;
        Ok(())
    }

    async fn update_assume_role_policy(
        &self,
        role_name: &str,
        policy_document: &str,
    ) -> AwsResult<()> {
        self.client
            .update_assume_role_policy()
            .role_name(role_name)
            .policy_document(policy_document)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(e, ROLE, role_name))?;
        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> AwsResult<()> {
        self.client
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(e, ROLE, role_name))?;
        Ok(())
    }

    async fn list_role_policies(&self, role_name: &str) -> AwsResult<Vec<String>> {
        let mut names = Vec::new();
        let mut marker = None;
        loop {
            let response = self
                .client
                .list_role_policies()
                .role_name(role_name)
                .set_marker(marker)
                .send()
                .await
                .map_err(|e| AwsError::from_sdk(e, ROLE, role_name))?;
            names.extend(response.policy_names);
            if !response.is_truncated {
                return Ok(names);
            }
            marker = response.marker;
        }
    }

    async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        policy_document: &str,
    ) -> AwsResult<()> {
        self.client
            .put_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .policy_document(policy_document)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(e, ROLE, role_name))?;
        Ok(())
    }

    async fn get_role_policy(&self, role_name: &str, policy_name: &str) -> AwsResult<String> {
        let response = self
            .client
            .get_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(e, ROLE_POLICY, &policy_id(role_name, policy_name)))?;
        decode_policy_document(&response.policy_document)
    }

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> AwsResult<()> {
        self.client
            .delete_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(|e| AwsError::from_sdk(e, ROLE_POLICY, &policy_id(role_name, policy_name)))?;
        Ok(())
    }
}
