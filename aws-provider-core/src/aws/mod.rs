//! AWS SDK integration: IAM client seam and STS caller identity.

pub mod iam_client;
pub(crate) mod sts;

use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

pub use iam_client::{AwsIamClient, CreateRoleInput, IamApi, RoleRecord, UpdateRoleInput};

/// Error code IAM returns for missing roles, policies and other entities.
pub const NO_SUCH_ENTITY: &str = "NoSuchEntity";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AwsError {
    #[error("{kind} ({id}) not found")]
    NotFound { kind: &'static str, id: String },
    #[error("IAM client error: {code}: {message}")]
    IamError { code: String, message: String },
    #[error("STS client error: {0}")]
    StsError(String),
    #[error("Policy document error: {0}")]
    PolicyError(String),
}

impl AwsError {
    pub fn iam(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IamError {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Matches an IAM error by code and a fragment of its message.
    pub fn has_code_and_message(&self, code: &str, fragment: &str) -> bool {
        match self {
            Self::IamError {
                code: actual,
                message,
            } => actual == code && message.contains(fragment),
            _ => false,
        }
    }

    /// Convert an SDK error, mapping IAM's `NoSuchEntity` to [`AwsError::NotFound`].
    pub(crate) fn from_sdk<E, R>(err: SdkError<E, R>, kind: &'static str, id: &str) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        match err.code() {
            Some(NO_SUCH_ENTITY) => Self::not_found(kind, id),
            code => {
                let code = code.unwrap_or("Unknown").to_string();
                let message = err
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
                Self::IamError { code, message }
            }
        }
    }
}

pub type AwsResult<T> = Result<T, AwsError>;
