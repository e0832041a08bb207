//! Caller identity lookup.

use aws_sdk_sts::Client as StsClient;

use crate::aws::{AwsError, AwsResult};

/// Account id of the credentials in use.
pub(crate) async fn caller_account_id(client: &StsClient) -> AwsResult<String> {
    let response = client
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| {
            AwsError::StsError(format!(
                "Failed to get caller identity: {}",
                aws_sdk_sts::error::DisplayErrorContext(&e)
            ))
        })?;
    response
        .account
        .ok_or_else(|| AwsError::StsError("caller identity has no account id".to_string()))
}
