//! # Outbound Ports
//!
//! The narrow ledger contract the relay core depends on, and the signer
//! lookup used for submissions.

use crate::algorithms::encode_message;
use crate::domain::{Address, DispatchedMessage, DomainId, FeeOverrides, LogPosition, Signer, TxId};
use async_trait::async_trait;
use primitive_types::U256;
use thiserror::Error;

/// Failures reported by a ledger client.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Network or RPC failure; the call may be retried.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger declined the transaction.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The delivery entry point has already processed this message.
    #[error("message already processed")]
    AlreadyProcessed,
}

/// Raw dispatch event as stored in an outbound log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawDispatchEvent {
    /// Position in the log.
    pub position: LogPosition,
    /// Transaction that emitted the event.
    pub tx_id: TxId,
    /// Encoded message bytes.
    pub message: Vec<u8>,
}

/// Inclusion record of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction id.
    pub tx_id: TxId,
    /// Whether execution succeeded.
    pub success: bool,
    /// Including block.
    pub block_number: u64,
    /// Blocks built on top of the including block, plus one.
    pub confirmations: u64,
}

/// Delivery transaction arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryPayload {
    /// Encoded message.
    pub message: Vec<u8>,
    /// Authentication metadata for the destination entry point.
    pub metadata: Vec<u8>,
}

impl DeliveryPayload {
    /// Payload delivering `message` with empty metadata.
    pub fn for_message(message: &DispatchedMessage) -> Self {
        Self {
            message: encode_message(message),
            metadata: Vec::new(),
        }
    }
}

/// Ledger client for one domain - outbound port.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Read dispatch events at or after `from`, in log order.
    async fn read_dispatch_logs(
        &self,
        from: LogPosition,
    ) -> Result<Vec<RawDispatchEvent>, LedgerError>;

    /// Submit a delivery transaction.
    async fn submit_transaction(
        &self,
        payload: &DeliveryPayload,
        signer: &Signer,
        fees: &FeeOverrides,
    ) -> Result<TxId, LedgerError>;

    /// Get a transaction receipt; `None` while pending.
    async fn get_transaction_receipt(&self, tx: TxId) -> Result<Option<TxReceipt>, LedgerError>;

    /// Get an account balance.
    async fn get_balance(&self, address: Address) -> Result<U256, LedgerError>;

    /// Current fee estimate per unit of gas.
    async fn gas_price(&self) -> Result<U256, LedgerError>;
}

/// Signer lookup - outbound port.
pub trait SignerProvider: Send + Sync {
    /// Signer currently configured for `domain`.
    fn signer(&self, domain: DomainId) -> Option<Signer>;
}
