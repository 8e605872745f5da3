//! # Domain Entities
//!
//! Messages observed in outbound logs, receipts of their deliveries, and the
//! domains they travel between.

use super::errors::RelayError;
use super::value_objects::{
    Address, Checkpoint, DomainId, FeeOverrides, LogPosition, MessageId, TxId,
};
use crate::config::DomainConfig;
use crate::ports::outbound::LedgerClient;
use primitive_types::{H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One independent ledger participating in cross-domain messaging.
#[derive(Clone)]
pub struct Domain {
    /// Routing id.
    pub id: DomainId,
    /// Human label.
    pub name: String,
    /// Confirmations a delivery needs before its receipt is final.
    pub confirmations: u64,
    /// Fee parameters for delivery transactions.
    pub fees: FeeOverrides,
    /// Ledger client handle.
    pub client: Arc<dyn LedgerClient>,
}

impl Domain {
    /// Create a domain with default fees and a single confirmation.
    pub fn new(id: DomainId, name: impl Into<String>, client: Arc<dyn LedgerClient>) -> Self {
        Self {
            id,
            name: name.into(),
            confirmations: 1,
            fees: FeeOverrides::default(),
            client,
        }
    }

    /// Bind a configuration entry to its ledger client.
    pub fn from_config(config: &DomainConfig, client: Arc<dyn LedgerClient>) -> Self {
        Self {
            id: DomainId(config.domain_id),
            name: config.name.clone(),
            confirmations: config.confirmations,
            fees: config.fees.clone(),
            client,
        }
    }

    /// Override the required confirmations.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    /// Override the fee parameters.
    pub fn with_fees(mut self, fees: FeeOverrides) -> Self {
        self.fees = fees;
        self
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("confirmations", &self.confirmations)
            .field("fees", &self.fees)
            .finish_non_exhaustive()
    }
}

/// A cross-domain message observed in an origin domain's outbound log.
///
/// `(origin, origin_tx, position)` identifies a message uniquely; messages
/// are never mutated after the scanner builds them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchedMessage {
    /// Keccak-256 of the encoded message.
    pub id: MessageId,
    /// Message format version.
    pub version: u8,
    /// Per-origin dispatch counter.
    pub nonce: u32,
    /// Origin domain.
    pub origin: DomainId,
    /// Padded sender address on the origin domain.
    pub sender: H256,
    /// Destination domain.
    pub destination: DomainId,
    /// Padded recipient address on the destination domain.
    pub recipient: H256,
    /// Raw message body.
    pub body: Vec<u8>,
    /// Transaction that dispatched the message.
    pub origin_tx: TxId,
    /// Position of the dispatch event in the origin log.
    pub position: LogPosition,
}

/// How a delivery was settled on the destination domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryOutcome {
    /// This submission processed the message.
    Delivered,
    /// The destination had already processed the message.
    AlreadyDelivered,
}

impl DeliveryOutcome {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::AlreadyDelivered => "already_delivered",
        }
    }
}

/// Result of delivering one message on its destination domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Delivered message.
    pub message_id: MessageId,
    /// Origin domain of the message.
    pub origin: DomainId,
    /// Domain the delivery was submitted to.
    pub destination: DomainId,
    /// Transaction that dispatched the message.
    pub origin_tx: TxId,
    /// Delivery transaction; `None` when the message was already delivered.
    pub delivery_tx: Option<TxId>,
    /// Settlement outcome.
    pub outcome: DeliveryOutcome,
    /// Confirmations observed for the delivery transaction.
    pub confirmations: u64,
    /// Block that included the delivery transaction.
    pub block_number: u64,
}

impl DeliveryReceipt {
    /// Receipt for a message the destination had already processed.
    pub fn already_delivered(message: &DispatchedMessage) -> Self {
        Self {
            message_id: message.id,
            origin: message.origin,
            destination: message.destination,
            origin_tx: message.origin_tx,
            delivery_tx: None,
            outcome: DeliveryOutcome::AlreadyDelivered,
            confirmations: 0,
            block_number: 0,
        }
    }

    /// Whether the message is processed on the destination.
    ///
    /// Always true: a failed delivery surfaces as a `RelayError`, never as a
    /// receipt.
    pub fn success(&self) -> bool {
        matches!(
            self.outcome,
            DeliveryOutcome::Delivered | DeliveryOutcome::AlreadyDelivered
        )
    }
}

/// Dispatch event that could not be turned into a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedEvent {
    /// Log position of the event.
    pub position: LogPosition,
    /// Transaction that emitted the event.
    pub origin_tx: TxId,
    /// Decode or validation failure.
    pub reason: String,
}

impl MalformedEvent {
    /// Error reported for this event when relaying from `origin`.
    pub fn to_error(&self, origin: DomainId) -> RelayError {
        RelayError::MalformedMessage {
            domain: origin,
            origin_tx: self.origin_tx,
            reason: self.reason.clone(),
        }
    }
}

/// Messages returned by one scan, with the cursor to resume from.
#[derive(Clone, Debug)]
pub struct ScanBatch {
    /// Scanned domain.
    pub origin: DomainId,
    /// Messages in log order.
    pub messages: Vec<DispatchedMessage>,
    /// Events in the scanned window that failed to decode, in log order.
    pub malformed: Vec<MalformedEvent>,
    /// Cursor reflecting the last position read, malformed events included.
    pub checkpoint: Checkpoint,
}

impl ScanBatch {
    /// Whether the scan found nothing new.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.malformed.is_empty()
    }
}

/// Signer funding status on one domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceReport {
    /// Checked domain.
    pub domain: DomainId,
    /// Signer account.
    pub address: Address,
    /// Current balance.
    pub balance: U256,
    /// Balance needed to cover the expected gas at the current price.
    pub desired: U256,
    /// Whether `balance` covers `desired`.
    pub sufficient: bool,
}

/// Receipts of one origin's relay, keyed by destination.
///
/// A destination with no dispatched messages has no key.
pub type RelayReport = BTreeMap<DomainId, Vec<DeliveryReceipt>>;
