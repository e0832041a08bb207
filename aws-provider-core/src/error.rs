//! Error types for provider operations.

use std::path::PathBuf;

use aws_provider_waiter::{RetryError, WaitError};
use thiserror::Error;

use crate::aws::AwsError;

/// Errors surfaced by configuration loading and resource workflows.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read {}: {error}", .path.display())]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },

    /// A resource argument failed validation before any API call was made.
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Invalid ARN ({arn}): {reason}")]
    InvalidArn { arn: String, reason: String },

    #[error(transparent)]
    Aws(#[from] AwsError),

    #[error("{action} {resource}: {error}")]
    Operation {
        action: &'static str,
        resource: String,
        error: AwsError,
    },

    #[error("{action} {resource}: {error}")]
    Retry {
        action: &'static str,
        resource: String,
        error: RetryError<AwsError>,
    },

    #[error("waiting for {resource} {transition}: {error}")]
    Wait {
        resource: String,
        transition: &'static str,
        error: WaitError<AwsError>,
    },

    #[error("reading {resource}: empty result")]
    EmptyResult { resource: String },
}

impl ProviderError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn operation(action: &'static str, resource: impl Into<String>, error: AwsError) -> Self {
        Self::Operation {
            action,
            resource: resource.into(),
            error,
        }
    }

    pub fn retry(
        action: &'static str,
        resource: impl Into<String>,
        error: RetryError<AwsError>,
    ) -> Self {
        Self::Retry {
            action,
            resource: resource.into(),
            error,
        }
    }

    pub fn wait(
        resource: impl Into<String>,
        transition: &'static str,
        error: WaitError<AwsError>,
    ) -> Self {
        Self::Wait {
            resource: resource.into(),
            transition,
            error,
        }
    }

    /// True for errors caused by bad input rather than by AWS.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Io { .. } | Self::Validation { .. } | Self::InvalidArn { .. }
        )
    }

    /// True when the wrapped AWS or waiter error is a timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Retry { error, .. } => error.is_timeout(),
            Self::Wait { error, .. } => error.is_timeout(),
            _ => false,
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
