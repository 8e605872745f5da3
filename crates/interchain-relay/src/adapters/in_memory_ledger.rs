//! In-Memory Ledger Adapter
//!
//! Implements `LedgerClient` over a simulated mailbox: an outbound dispatch
//! log, a delivered-message set and transaction receipts. Used by tests and
//! local harnesses in place of an RPC-backed client.

use crate::algorithms::{decode_fields, encode_fields, message_id, MessageFields};
use crate::domain::{
    address_to_bytes32, Address, DomainId, FeeOverrides, LogPosition, MessageId, Signer, TxId,
};
use crate::ports::outbound::{DeliveryPayload, LedgerClient, LedgerError, RawDispatchEvent, TxReceipt};
use async_trait::async_trait;
use parking_lot::RwLock;
use primitive_types::{H256, U256};
use sha3::{Digest, Keccak256};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Simulated ledger for a single domain.
pub struct InMemoryLedger {
    domain: DomainId,
    state: RwLock<LedgerState>,
}

struct LedgerState {
    log: Vec<RawDispatchEvent>,
    next_nonce: u32,
    delivered: HashSet<MessageId>,
    delivery_order: Vec<MessageId>,
    receipts: HashMap<TxId, TxReceipt>,
    pending_polls: HashMap<TxId, u32>,
    balances: HashMap<Address, U256>,
    gas_price: U256,
    block_number: u64,
    tx_counter: u64,
    confirmations: u64,
    polls_before_receipt: u32,
    unavailable: bool,
    reject_reason: Option<String>,
}

impl InMemoryLedger {
    /// Create an empty ledger for `domain`.
    pub fn new(domain: DomainId) -> Self {
        Self {
            domain,
            state: RwLock::new(LedgerState {
                log: Vec::new(),
                next_nonce: 0,
                delivered: HashSet::new(),
                delivery_order: Vec::new(),
                receipts: HashMap::new(),
                pending_polls: HashMap::new(),
                balances: HashMap::new(),
                gas_price: U256::from(1_000_000_000u64),
                block_number: 0,
                tx_counter: 0,
                confirmations: 1,
                polls_before_receipt: 0,
                unavailable: false,
                reject_reason: None,
            }),
        }
    }

    /// Domain this ledger simulates.
    pub fn domain(&self) -> DomainId {
        self.domain
    }

    /// Dispatch one message; returns the dispatch transaction id.
    pub fn dispatch(
        &self,
        sender: Address,
        destination: DomainId,
        recipient: H256,
        body: impl Into<Vec<u8>>,
    ) -> TxId {
        self.dispatch_many(sender, vec![(destination, recipient, body.into())])
    }

    /// Dispatch several messages from a single transaction.
    pub fn dispatch_many(&self, sender: Address, messages: Vec<(DomainId, H256, Vec<u8>)>) -> TxId {
        let mut state = self.state.write();
        let tx_id = next_tx_id(self.domain, &mut state);
        state.block_number += 1;

        for (destination, recipient, body) in messages {
            let fields = MessageFields {
                nonce: state.next_nonce,
                origin: self.domain,
                sender: address_to_bytes32(sender),
                destination,
                recipient,
                body,
            };
            state.next_nonce += 1;

            let position = LogPosition(state.log.len() as u64);
            state.log.push(RawDispatchEvent {
                position,
                tx_id,
                message: encode_fields(&fields),
            });

            info!(
                origin = %self.domain,
                destination = %destination,
                position = position.0,
                "Message dispatched"
            );
        }

        tx_id
    }

    /// Append an arbitrary event to the dispatch log.
    pub fn append_raw_event(&self, message: Vec<u8>) -> TxId {
        let mut state = self.state.write();
        let tx_id = next_tx_id(self.domain, &mut state);
        let position = LogPosition(state.log.len() as u64);
        state.log.push(RawDispatchEvent {
            position,
            tx_id,
            message,
        });
        tx_id
    }

    /// Simulate an RPC outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unavailable = unavailable;
    }

    /// Reject every delivery with `reason`, or stop rejecting with `None`.
    pub fn reject_deliveries(&self, reason: Option<String>) {
        self.state.write().reject_reason = reason;
    }

    /// Confirmations reported on new delivery receipts.
    pub fn set_confirmations(&self, confirmations: u64) {
        self.state.write().confirmations = confirmations;
    }

    /// Receipt polls answered with "pending" before a receipt appears.
    pub fn set_polls_before_receipt(&self, polls: u32) {
        self.state.write().polls_before_receipt = polls;
    }

    /// Set an account balance.
    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state.write().balances.insert(address, balance);
    }

    /// Set the gas price estimate.
    pub fn set_gas_price(&self, gas_price: U256) {
        self.state.write().gas_price = gas_price;
    }

    /// Whether the message has been processed here.
    pub fn is_delivered(&self, id: &MessageId) -> bool {
        self.state.read().delivered.contains(id)
    }

    /// Processed message ids in processing order.
    pub fn delivery_order(&self) -> Vec<MessageId> {
        self.state.read().delivery_order.clone()
    }

    /// Number of dispatch events in the outbound log.
    pub fn dispatched_count(&self) -> usize {
        self.state.read().log.len()
    }
}

fn next_tx_id(domain: DomainId, state: &mut LedgerState) -> TxId {
    state.tx_counter += 1;
    let mut hasher = Keccak256::new();
    hasher.update(domain.0.to_be_bytes());
    hasher.update(state.tx_counter.to_be_bytes());
    H256(hasher.finalize().into())
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn read_dispatch_logs(
        &self,
        from: LogPosition,
    ) -> Result<Vec<RawDispatchEvent>, LedgerError> {
        let state = self.state.read();
        if state.unavailable {
            return Err(LedgerError::Unavailable(format!(
                "domain {} rpc offline",
                self.domain
            )));
        }

        Ok(state
            .log
            .iter()
            .filter(|event| event.position >= from)
            .cloned()
            .collect())
    }

    async fn submit_transaction(
        &self,
        payload: &DeliveryPayload,
        signer: &Signer,
        _fees: &FeeOverrides,
    ) -> Result<TxId, LedgerError> {
        let mut state = self.state.write();
        if state.unavailable {
            return Err(LedgerError::Unavailable(format!(
                "domain {} rpc offline",
                self.domain
            )));
        }
        if let Some(reason) = &state.reject_reason {
            return Err(LedgerError::Rejected(reason.clone()));
        }

        let fields =
            decode_fields(&payload.message).map_err(|e| LedgerError::Rejected(e.to_string()))?;
        if fields.destination != self.domain {
            return Err(LedgerError::Rejected(format!(
                "message destined for {} submitted to {}",
                fields.destination, self.domain
            )));
        }

        let id = message_id(&payload.message);
        if state.delivered.contains(&id) {
            return Err(LedgerError::AlreadyProcessed);
        }

        state.delivered.insert(id);
        state.delivery_order.push(id);
        state.block_number += 1;

        let tx_id = next_tx_id(self.domain, &mut state);
        let receipt = TxReceipt {
            tx_id,
            success: true,
            block_number: state.block_number,
            confirmations: state.confirmations,
        };
        state.receipts.insert(tx_id, receipt);
        let polls = state.polls_before_receipt;
        if polls > 0 {
            state.pending_polls.insert(tx_id, polls);
        }

        debug!(
            destination = %self.domain,
            signer = %signer.label,
            block = state.block_number,
            "Delivery processed"
        );

        Ok(tx_id)
    }

    async fn get_transaction_receipt(&self, tx: TxId) -> Result<Option<TxReceipt>, LedgerError> {
        let mut state = self.state.write();
        if state.unavailable {
            return Err(LedgerError::Unavailable(format!(
                "domain {} rpc offline",
                self.domain
            )));
        }

        if let Some(remaining) = state.pending_polls.get_mut(&tx) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
        }

        Ok(state.receipts.get(&tx).cloned())
    }

    async fn get_balance(&self, address: Address) -> Result<U256, LedgerError> {
        let state = self.state.read();
        if state.unavailable {
            return Err(LedgerError::Unavailable(format!(
                "domain {} rpc offline",
                self.domain
            )));
        }
        Ok(state.balances.get(&address).copied().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<U256, LedgerError> {
        let state = self.state.read();
        if state.unavailable {
            return Err(LedgerError::Unavailable(format!(
                "domain {} rpc offline",
                self.domain
            )));
        }
        Ok(state.gas_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> Signer {
        Signer::new(Address::repeat_byte(9), "relayer")
    }

    async fn first_payload(origin: &InMemoryLedger) -> DeliveryPayload {
        let events = origin.read_dispatch_logs(LogPosition(0)).await.unwrap();
        DeliveryPayload {
            message: events[0].message.clone(),
            metadata: vec![],
        }
    }

    #[tokio::test]
    async fn test_dispatch_appends_ordered_events() {
        let ledger = InMemoryLedger::new(DomainId(1));
        let tx = ledger.dispatch_many(
            Address::zero(),
            vec![
                (DomainId(2), H256::zero(), vec![1]),
                (DomainId(3), H256::zero(), vec![2]),
            ],
        );

        let events = ledger.read_dispatch_logs(LogPosition(0)).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].position, LogPosition(0));
        assert_eq!(events[1].position, LogPosition(1));
        assert!(events.iter().all(|e| e.tx_id == tx));

        let tail = ledger.read_dispatch_logs(LogPosition(1)).await.unwrap();
        assert_eq!(tail.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_reports_already_processed() {
        let origin = InMemoryLedger::new(DomainId(1));
        let destination = InMemoryLedger::new(DomainId(2));
        origin.dispatch(Address::zero(), DomainId(2), H256::zero(), b"hi".to_vec());
        let payload = first_payload(&origin).await;

        let fees = FeeOverrides::default();
        assert!(destination.submit_transaction(&payload, &signer(), &fees).await.is_ok());
        assert_eq!(
            destination.submit_transaction(&payload, &signer(), &fees).await,
            Err(LedgerError::AlreadyProcessed)
        );
        assert_eq!(destination.delivery_order().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_destination_rejected() {
        let origin = InMemoryLedger::new(DomainId(1));
        let other = InMemoryLedger::new(DomainId(3));
        origin.dispatch(Address::zero(), DomainId(2), H256::zero(), vec![]);
        let payload = first_payload(&origin).await;

        let result = other
            .submit_transaction(&payload, &signer(), &FeeOverrides::default())
            .await;
        assert!(matches!(result, Err(LedgerError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_pending_receipt_polls() {
        let origin = InMemoryLedger::new(DomainId(1));
        let destination = InMemoryLedger::new(DomainId(2));
        destination.set_polls_before_receipt(2);
        origin.dispatch(Address::zero(), DomainId(2), H256::zero(), vec![]);
        let payload = first_payload(&origin).await;

        let tx = destination
            .submit_transaction(&payload, &signer(), &FeeOverrides::default())
            .await
            .unwrap();

        assert_eq!(destination.get_transaction_receipt(tx).await.unwrap(), None);
        assert_eq!(destination.get_transaction_receipt(tx).await.unwrap(), None);
        let receipt = destination.get_transaction_receipt(tx).await.unwrap().unwrap();
        assert!(receipt.success);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let ledger = InMemoryLedger::new(DomainId(1));
        ledger.set_unavailable(true);

        assert!(ledger.read_dispatch_logs(LogPosition(0)).await.is_err());
        assert!(ledger.get_balance(Address::zero()).await.is_err());
        assert!(ledger.gas_price().await.is_err());
    }

    #[tokio::test]
    async fn test_balances_default_to_zero() {
        let ledger = InMemoryLedger::new(DomainId(1));
        let addr = Address::repeat_byte(1);
        assert_eq!(ledger.get_balance(addr).await.unwrap(), U256::zero());

        ledger.set_balance(addr, U256::from(42));
        assert_eq!(ledger.get_balance(addr).await.unwrap(), U256::from(42));
    }
}
