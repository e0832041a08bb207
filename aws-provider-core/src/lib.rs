//! Core of the AWS provider:
//! - ARN parsing and partition lookup
//! - keyed locks for operations that must not interleave
//! - typed provider configuration and the AWS client bundle
//! - IAM role and role policy workflows that wait out eventual consistency
//!

pub mod arn;
pub mod aws;
pub mod config;
pub mod conns;
mod error;
pub mod mutexkv;
pub mod resources;
pub mod types;

pub use arn::{
    extract_account_from_arn, is_valid_account_id, partition_by_id, partition_for_region, Arn,
    Partition,
};
pub use aws::{AwsError, AwsIamClient, IamApi};
pub use config::{ProviderConfig, Timeouts};
pub use conns::AwsClients;
pub use error::{ProviderError, ProviderResult};
pub use mutexkv::MutexKV;
pub use resources::role::{RoleConfig, RoleState};
pub use resources::role_policy::{RolePolicyConfig, RolePolicyId, RolePolicyState};
pub use types::PolicyDocument;
