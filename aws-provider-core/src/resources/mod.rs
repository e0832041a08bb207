//! Create, read, update and delete workflows for IAM resources.
//!
//! Every mutating call is followed by a wait on IAM's eventually consistent
//! read path, so callers observe their own writes.

pub mod role;
pub mod role_policy;

#[cfg(test)]
pub(crate) mod fake;

use crate::error::{ProviderError, ProviderResult};

const IAM_NAME_PUNCTUATION: &str = "+=,.@-_";

fn is_iam_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || IAM_NAME_PUNCTUATION.contains(c)
}

/// IAM user, role and policy names.
pub(crate) fn validate_iam_name(
    field: &'static str,
    name: &str,
    max_len: usize,
) -> ProviderResult<()> {
    if name.is_empty() || name.len() > max_len {
        return Err(ProviderError::validation(
            field,
            format!("{name:?} must be 1 to {max_len} characters"),
        ));
    }
    if !name.chars().all(is_iam_name_char) {
        return Err(ProviderError::validation(
            field,
            format!("{name:?} must contain only alphanumeric characters or +=,.@-_"),
        ));
    }
    Ok(())
}
