//! # Domain Value Objects
//!
//! Immutable value types shared by the scanner, submitter and orchestrator.

use primitive_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction identifier on any domain.
pub type TxId = H256;

/// Keccak-256 identifier of an encoded message.
pub type MessageId = H256;

/// 20-byte account address.
pub type Address = H160;

/// Numeric routing id of a domain.
///
/// Ids are validated for uniqueness when the registry is built and never
/// change afterwards.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DomainId(pub u32);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DomainId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Position of an event in a domain's outbound log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition(pub u64);

/// Scan cursor: the next log position to read.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Checkpoint(u64);

impl Checkpoint {
    /// Initial cursor, replays the whole log.
    pub const GENESIS: Checkpoint = Checkpoint(0);

    /// Cursor that resumes reading at `position`.
    pub fn at(position: LogPosition) -> Self {
        Self(position.0)
    }

    /// Cursor that resumes right after `position`.
    pub fn after(position: LogPosition) -> Self {
        Self(position.0.saturating_add(1))
    }

    /// First log position this cursor will read.
    pub fn next_position(&self) -> LogPosition {
        LogPosition(self.0)
    }

    /// Whether `position` has not been consumed by this cursor yet.
    pub fn covers(&self, position: LogPosition) -> bool {
        position.0 >= self.0
    }
}

/// Per-domain fee parameters applied to delivery transactions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeOverrides {
    /// Gas limit override.
    #[serde(default)]
    pub gas_limit: Option<u64>,
    /// Gas price override.
    #[serde(default)]
    pub gas_price: Option<U256>,
    /// Fee cap for fee-market ledgers; used as the price when no gas price is set.
    #[serde(default)]
    pub max_fee_per_gas: Option<U256>,
}

impl FeeOverrides {
    /// Configured per-gas price, if any: `gas_price`, else `max_fee_per_gas`.
    pub fn price_override(&self) -> Option<U256> {
        self.gas_price.or(self.max_fee_per_gas)
    }
}

/// Signing account used for submissions on a domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signer {
    /// Account address.
    pub address: Address,
    /// Human label for logs (key alias, not secret material).
    pub label: String,
}

impl Signer {
    /// Create a signer handle.
    pub fn new(address: Address, label: impl Into<String>) -> Self {
        Self {
            address,
            label: label.into(),
        }
    }
}

/// Left-pad a 20-byte address into a 32-byte message identifier.
pub fn address_to_bytes32(address: Address) -> H256 {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(address.as_bytes());
    H256(out)
}

/// Recover the 20-byte address from a padded identifier.
pub fn bytes32_to_address(id: H256) -> Address {
    Address::from_slice(&id.as_bytes()[12..])
}
