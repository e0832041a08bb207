//! Amazon Resource Names and partitions.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ProviderError;

const ARN_PREFIX: &str = "arn";

/// An AWS partition and the DNS suffix its endpoints use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub id: &'static str,
    pub dns_suffix: &'static str,
}

pub const AWS: Partition = Partition {
    id: "aws",
    dns_suffix: "amazonaws.com",
};
pub const AWS_CN: Partition = Partition {
    id: "aws-cn",
    dns_suffix: "amazonaws.com.cn",
};
pub const AWS_US_GOV: Partition = Partition {
    id: "aws-us-gov",
    dns_suffix: "amazonaws.com",
};
pub const AWS_ISO: Partition = Partition {
    id: "aws-iso",
    dns_suffix: "c2s.ic.gov",
};
pub const AWS_ISO_B: Partition = Partition {
    id: "aws-iso-b",
    dns_suffix: "sc2s.sgov.gov",
};

/// Partition a region belongs to. Unknown regions fall back to `aws`.
pub fn partition_for_region(region: &str) -> Partition {
    if region.starts_with("cn-") {
        AWS_CN
    } else if region.starts_with("us-gov-") {
        AWS_US_GOV
    } else if region.starts_with("us-isob-") {
        AWS_ISO_B
    } else if region.starts_with("us-iso-") {
        AWS_ISO
    } else {
        AWS
    }
}

/// Look up a partition by its id.
pub fn partition_by_id(id: &str) -> Option<Partition> {
    [AWS, AWS_CN, AWS_US_GOV, AWS_ISO, AWS_ISO_B]
        .into_iter()
        .find(|p| p.id == id)
}

/// A parsed `arn:partition:service:region:account:resource` string.
///
/// The resource may itself contain `:` and `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl Arn {
    pub fn new(
        partition: impl Into<String>,
        service: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            service: service.into(),
            region: region.into(),
            account_id: account_id.into(),
            resource: resource.into(),
        }
    }

    /// ARN for a regional resource; the partition follows from the region.
    pub fn regional(
        service: impl Into<String>,
        region: &str,
        account_id: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self::new(
            partition_for_region(region).id,
            service,
            region,
            account_id,
            resource,
        )
    }

    /// ARN for a global resource such as an IAM role; the region is empty.
    pub fn global(
        partition: &Partition,
        service: impl Into<String>,
        account_id: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self::new(partition.id, service, "", account_id, resource)
    }

    /// Split the resource into its type and id on the first `/` or `:`.
    pub fn resource_parts(&self) -> (Option<&str>, &str) {
        match self.resource.find(['/', ':']) {
            Some(idx) => (Some(&self.resource[..idx]), &self.resource[idx + 1..]),
            None => (None, &self.resource),
        }
    }
}

impl FromStr for Arn {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ProviderError::InvalidArn {
            arn: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.splitn(6, ':').collect();
        let [prefix, partition, service, region, account_id, resource] = parts[..] else {
            return Err(invalid("expected 6 colon-separated sections"));
        };
        if prefix != ARN_PREFIX {
            return Err(invalid("must start with \"arn:\""));
        }
        if partition.is_empty() {
            return Err(invalid("partition is empty"));
        }
        if service.is_empty() {
            return Err(invalid("service is empty"));
        }
        if resource.is_empty() {
            return Err(invalid("resource is empty"));
        }
        if !account_id.is_empty() && !is_valid_account_id(account_id) {
            return Err(invalid("account id must be 12 digits"));
        }

        Ok(Self::new(partition, service, region, account_id, resource))
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{ARN_PREFIX}:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

/// True for a 12-digit AWS account id.
pub fn is_valid_account_id(account_id: &str) -> bool {
    account_id.len() == 12 && account_id.chars().all(|c| c.is_ascii_digit())
}

/// Extract 12-digit account ID from ARN (field 5 in colon-delimited format)
pub fn extract_account_from_arn(arn: &str) -> Option<String> {
    arn.parse::<Arn>()
        .ok()
        .map(|arn| arn.account_id)
        .filter(|account_id| is_valid_account_id(account_id))
}
