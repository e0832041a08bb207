//! The AWS client bundle shared by all workflows.

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_iam::Client as IamClient;
use aws_sdk_sts::Client as StsClient;

use crate::arn::{partition_for_region, Arn, Partition};
use crate::aws::sts::caller_account_id;
use crate::aws::AwsIamClient;
use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};

/// Clients plus the identity facts resolved while building them.
#[derive(Debug, Clone)]
pub struct AwsClients {
    iam: AwsIamClient,
    sts: StsClient,
    account_id: Option<String>,
    partition: Partition,
    region: String,
}

impl AwsClients {
    /// Build clients from a validated configuration and resolve the caller's
    /// account id unless `skip_requesting_account_id` is set.
    pub async fn connect(config: &ProviderConfig) -> ProviderResult<Self> {
        config.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts()));
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        let mut iam_config = aws_sdk_iam::config::Builder::from(&sdk_config);
        if let Some(url) = config.endpoint("iam") {
            iam_config = iam_config.endpoint_url(url);
        }
        let mut sts_config = aws_sdk_sts::config::Builder::from(&sdk_config);
        if let Some(url) = config.endpoint("sts") {
            sts_config = sts_config.endpoint_url(url);
        }
        let iam = IamClient::from_conf(iam_config.build());
        let sts = StsClient::from_conf(sts_config.build());

        let account_id = if config.skip_requesting_account_id {
            None
        } else {
            let account_id = caller_account_id(&sts).await?;
            config.validate_account_id(&account_id)?;
            Some(account_id)
        };
        if account_id.is_none() {
            log::warn!("AWS account ID not found for provider; ARNs will have an empty account");
        }

        Ok(Self::from_parts(
            AwsIamClient::new(iam),
            sts,
            account_id,
            &config.region,
        ))
    }

    pub(crate) fn from_parts(
        iam: AwsIamClient,
        sts: StsClient,
        account_id: Option<String>,
        region: &str,
    ) -> Self {
        Self {
            iam,
            sts,
            account_id,
            partition: partition_for_region(region),
            region: region.to_string(),
        }
    }

    pub fn iam(&self) -> &AwsIamClient {
        &self.iam
    }

    pub fn sts(&self) -> &StsClient {
        &self.sts
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn dns_suffix(&self) -> &'static str {
        self.partition.dns_suffix
    }

    /// `{service}.{region}.{dns_suffix}`
    pub fn regional_hostname(&self, service: &str) -> String {
        format!("{service}.{}.{}", self.region, self.dns_suffix())
    }

    pub fn regional_arn(&self, service: &str, resource: &str) -> Arn {
        Arn::new(
            self.partition.id,
            service,
            self.region.as_str(),
            self.account_id().unwrap_or_default(),
            resource,
        )
    }

    pub fn global_arn(&self, service: &str, resource: &str) -> Arn {
        Arn::global(
            &self.partition,
            service,
            self.account_id().unwrap_or_default(),
            resource,
        )
    }

    /// Fails when the account id was not resolved.
    pub fn require_account_id(&self) -> ProviderResult<&str> {
        self.account_id().ok_or_else(|| {
            ProviderError::config("account id is unknown (skip_requesting_account_id is set)")
        })
    }
}
