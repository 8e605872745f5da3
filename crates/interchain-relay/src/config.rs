//! # Relay Configuration
//!
//! Static domain list and relay tuning. Loading the JSON from disk or a
//! secret store is left to surrounding tooling.

use crate::domain::{FeeOverrides, RelayError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// One configured domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Human label, unique within a registry.
    pub name: String,
    /// Numeric routing id, unique within a registry.
    pub domain_id: u32,
    /// Confirmations required before a delivery receipt is final.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Fee parameters for delivery transactions.
    #[serde(default)]
    pub fees: FeeOverrides,
}

fn default_confirmations() -> u64 {
    1
}

impl DomainConfig {
    /// Domain with one required confirmation and default fees.
    pub fn new(name: impl Into<String>, domain_id: u32) -> Self {
        Self {
            name: name.into(),
            domain_id,
            confirmations: default_confirmations(),
            fees: FeeOverrides::default(),
        }
    }
}

/// Relay engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Configured domains.
    pub domains: Vec<DomainConfig>,

    /// Delay between delivery receipt polls.
    pub receipt_poll_interval_ms: u64,

    /// Receipt polls before a delivery is reported unavailable.
    pub receipt_poll_attempts: u32,

    /// Delay between passes of the continuous relay loop.
    pub relay_interval_secs: u64,

    /// Buffered receipts per correlation channel.
    pub bus_capacity: usize,

    /// Origin transactions whose receipts are replayed to late waiters.
    pub receipt_history: usize,

    /// Domain names excluded from relay passes and balance checks.
    pub skip_domains: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            receipt_poll_interval_ms: 1_000,
            receipt_poll_attempts: 60,
            relay_interval_secs: 10,
            bus_capacity: 256,
            receipt_history: 1_024,
            skip_domains: Vec::new(),
        }
    }
}

impl RelayConfig {
    /// Config for testing (fast polling).
    pub fn for_testing() -> Self {
        Self {
            domains: Vec::new(),
            receipt_poll_interval_ms: 5,
            receipt_poll_attempts: 20,
            relay_interval_secs: 1,
            bus_capacity: 64,
            receipt_history: 64,
            skip_domains: Vec::new(),
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, RelayError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| RelayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.receipt_poll_attempts == 0 {
            return Err(RelayError::Config(
                "receipt_poll_attempts must be at least 1".to_string(),
            ));
        }
        if self.bus_capacity == 0 {
            return Err(RelayError::Config(
                "bus_capacity must be at least 1".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for domain in &self.domains {
            if !ids.insert(domain.domain_id) {
                return Err(RelayError::DuplicateDomain {
                    domain: domain.domain_id.to_string(),
                });
            }
            if !names.insert(domain.name.as_str()) {
                return Err(RelayError::DuplicateDomain {
                    domain: domain.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Receipt poll interval.
    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    /// Continuous relay interval.
    pub fn relay_interval(&self) -> Duration {
        Duration::from_secs(self.relay_interval_secs)
    }
}
