//! Typed provider configuration, loaded from TOML and validated once.
//!
//! ```toml
//! region = "us-west-2"
//! profile = "deploy"
//! allowed_account_ids = ["123456789012"]
//!
//! [endpoints]
//! iam = "http://localhost:4566"
//!
//! [timeouts]
//! create = "10m"
//! propagation = "2m"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::arn::is_valid_account_id;
use crate::error::{ProviderError, ProviderResult};

pub const DEFAULT_MAX_RETRIES: u32 = 25;

/// Default operation timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    #[serde(deserialize_with = "humantime_duration")]
    pub create: Duration,
    #[serde(deserialize_with = "humantime_duration")]
    pub update: Duration,
    #[serde(deserialize_with = "humantime_duration")]
    pub delete: Duration,
    /// How long to wait for IAM changes to become visible.
    #[serde(deserialize_with = "humantime_duration")]
    pub propagation: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(10 * 60),
            update: Duration::from_secs(10 * 60),
            delete: Duration::from_secs(10 * 60),
            propagation: Duration::from_secs(2 * 60),
        }
    }
}

fn humantime_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-service endpoint overrides keyed by service name (`iam`, `sts`).
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    #[serde(default)]
    pub allowed_account_ids: Vec<String>,
    #[serde(default)]
    pub forbidden_account_ids: Vec<String>,
    #[serde(default)]
    pub skip_requesting_account_id: bool,
    #[serde(default)]
    pub timeouts: Timeouts,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl ProviderConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            profile: None,
            max_retries: DEFAULT_MAX_RETRIES,
            endpoints: BTreeMap::new(),
            allowed_account_ids: Vec::new(),
            forbidden_account_ids: Vec::new(),
            skip_requesting_account_id: false,
            timeouts: Timeouts::default(),
        }
    }

    pub fn from_toml_str(text: &str) -> ProviderResult<Self> {
        toml::from_str(text).map_err(|e| ProviderError::config(e.to_string()))
    }

    /// Read a TOML file. The result is not validated yet.
    pub fn load(path: &Path) -> ProviderResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|error| ProviderError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn endpoint(&self, service: &str) -> Option<&str> {
        self.endpoints
            .get(service)
            .map(String::as_str)
            .filter(|url| !url.is_empty())
    }

    /// SDK attempts per request: the first try plus `max_retries`.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn validate(&self) -> ProviderResult<()> {
        if self.region.trim().is_empty() {
            return Err(ProviderError::config("region must be set"));
        }
        if !self.allowed_account_ids.is_empty() && !self.forbidden_account_ids.is_empty() {
            return Err(ProviderError::config(
                "allowed_account_ids and forbidden_account_ids cannot both be set",
            ));
        }
        for id in self
            .allowed_account_ids
            .iter()
            .chain(&self.forbidden_account_ids)
        {
            if !is_valid_account_id(id) {
                return Err(ProviderError::config(format!(
                    "invalid account id {id:?}: must be 12 digits"
                )));
            }
        }
        if self.skip_requesting_account_id && !self.allowed_account_ids.is_empty() {
            log::warn!("allowed_account_ids cannot be enforced when skip_requesting_account_id is set");
        }
        Ok(())
    }

    /// Check a resolved account id against the allowed and forbidden lists.
    pub fn validate_account_id(&self, account_id: &str) -> ProviderResult<()> {
        if self.forbidden_account_ids.iter().any(|id| id == account_id) {
            return Err(ProviderError::config(format!(
                "forbidden account ID ({account_id})"
            )));
        }
        if !self.allowed_account_ids.is_empty()
            && !self.allowed_account_ids.iter().any(|id| id == account_id)
        {
            return Err(ProviderError::config(format!(
                "account ID not allowed ({account_id})"
            )));
        }
        Ok(())
    }
}
