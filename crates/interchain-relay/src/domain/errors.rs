//! # Domain Errors
//!
//! Error taxonomy for the relay engine.
//!
//! Every variant names the domain involved and, where a message is involved,
//! the origin transaction.

use super::entities::DeliveryReceipt;
use super::value_objects::{DomainId, TxId};
use thiserror::Error;

/// Relay engine errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Domain id is not configured in the registry.
    #[error("Unknown domain: {domain}")]
    UnknownDomain {
        /// Offending domain id.
        domain: DomainId,
    },

    /// Domain name is not configured in the registry.
    #[error("Unknown domain name: {0}")]
    UnknownDomainName(String),

    /// Two registry entries share an id or a name.
    #[error("Duplicate domain: {domain}")]
    DuplicateDomain {
        /// Id or name that was registered twice.
        domain: String,
    },

    /// No signer is configured for the destination domain.
    #[error("No signer configured for domain {domain}")]
    MissingSigner {
        /// Destination domain.
        domain: DomainId,
    },

    /// The origin domain's ledger could not be read.
    #[error("Source domain {domain} unavailable: {reason}")]
    SourceUnavailable {
        /// Origin domain.
        domain: DomainId,
        /// Underlying client failure.
        reason: String,
    },

    /// The destination domain's ledger could not be reached.
    #[error("Destination domain {domain} unavailable for message from tx {origin_tx:?}: {reason}")]
    DestinationUnavailable {
        /// Destination domain.
        domain: DomainId,
        /// Transaction that dispatched the message.
        origin_tx: TxId,
        /// Underlying client failure.
        reason: String,
    },

    /// The destination domain declined the delivery transaction.
    #[error("Delivery rejected by domain {domain} for message from tx {origin_tx:?}: {reason}")]
    SubmissionRejected {
        /// Destination domain.
        domain: DomainId,
        /// Transaction that dispatched the message.
        origin_tx: TxId,
        /// Rejection reason reported by the ledger.
        reason: String,
    },

    /// A dispatch event could not be decoded.
    #[error("Malformed message on domain {domain} in tx {origin_tx:?}: {reason}")]
    MalformedMessage {
        /// Origin domain whose log held the event.
        domain: DomainId,
        /// Transaction that emitted the event.
        origin_tx: TxId,
        /// Decode failure.
        reason: String,
    },

    /// Not enough deliveries were observed before the deadline.
    #[error(
        "Timed out waiting for deliveries of tx {origin_tx:?}: {}/{expected} receipts, {lagged} dropped by lag",
        .receipts.len()
    )]
    DeliveryTimeout {
        /// Dispatch transaction being waited on.
        origin_tx: TxId,
        /// Number of deliveries the caller expected.
        expected: usize,
        /// Receipts collected before the deadline.
        receipts: Vec<DeliveryReceipt>,
        /// Receipts the waiter missed because it fell behind its channel.
        lagged: u64,
    },

    /// A per-domain relay task panicked or was aborted.
    #[error("Relay task for domain {domain} failed: {reason}")]
    TaskFailed {
        /// Origin domain of the task.
        domain: DomainId,
        /// Join failure.
        reason: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl RelayError {
    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::DestinationUnavailable { .. }
        )
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
