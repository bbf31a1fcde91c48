//! Configuration for governance generators and tally loops

use crate::tally::RetryPolicy;
use dao_types::AccountKey;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Governance core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Address of the singleton network account
    #[serde(default = "AccountKey::zero")]
    pub network_account: AccountKey,

    /// Payout address for node rewards; the submitter address when unset
    #[serde(default)]
    pub pay_address: Option<String>,

    /// Tally retry behaviour
    #[serde(default)]
    pub retry: RetryPolicyConfig,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            network_account: AccountKey::zero(),
            pay_address: None,
            retry: RetryPolicyConfig::default(),
        }
    }
}

/// Tally retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    /// Delay after the target account was not found
    #[serde(default = "default_not_found_delay")]
    pub not_found_delay_ms: u64,

    /// Delay after a transient read failure
    #[serde(default = "default_error_delay")]
    pub error_delay_ms: u64,

    /// Attempt cap; unbounded when unset
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            not_found_delay_ms: default_not_found_delay(),
            error_delay_ms: default_error_delay(),
            max_attempts: None,
        }
    }
}

impl RetryPolicyConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            not_found_delay: Duration::from_millis(self.not_found_delay_ms),
            error_delay: Duration::from_millis(self.error_delay_ms),
            max_attempts: self.max_attempts,
        }
    }
}

fn default_not_found_delay() -> u64 {
    500
}

fn default_error_delay() -> u64 {
    1000
}
