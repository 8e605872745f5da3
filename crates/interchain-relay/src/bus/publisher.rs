//! # Receipt Publisher
//!
//! Publishing side of the receipt bus.

use super::subscriber::ReceiptSubscription;
use super::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_HISTORY_TXS};
use crate::domain::{DeliveryReceipt, TxId};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Channels keyed by origin transaction.
pub(crate) type ChannelMap = Arc<Mutex<HashMap<TxId, broadcast::Sender<DeliveryReceipt>>>>;

/// Recently published receipts, replayed to late subscribers.
///
/// Holds at most `max_txs` origin transactions, evicting the oldest first,
/// and at most `per_tx` distinct receipts for each.
struct ReceiptHistory {
    by_tx: HashMap<TxId, Vec<DeliveryReceipt>>,
    order: VecDeque<TxId>,
    max_txs: usize,
    per_tx: usize,
}

impl ReceiptHistory {
    fn new(max_txs: usize, per_tx: usize) -> Self {
        Self {
            by_tx: HashMap::new(),
            order: VecDeque::new(),
            max_txs,
            per_tx,
        }
    }

    fn record(&mut self, receipt: &DeliveryReceipt) {
        if self.max_txs == 0 {
            return;
        }

        let kept = match self.by_tx.entry(receipt.origin_tx) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.order.push_back(receipt.origin_tx);
                entry.insert(Vec::new())
            }
        };
        let seen = kept.iter().any(|r| r.message_id == receipt.message_id);
        if !seen && kept.len() < self.per_tx {
            kept.push(receipt.clone());
        }

        while self.order.len() > self.max_txs {
            if let Some(evicted) = self.order.pop_front() {
                self.by_tx.remove(&evicted);
            }
        }
    }

    fn replay(&self, origin_tx: &TxId) -> VecDeque<DeliveryReceipt> {
        self.by_tx
            .get(origin_tx)
            .map(|receipts| receipts.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// In-memory receipt bus.
///
/// Uses one `tokio::sync::broadcast` channel per origin transaction that
/// currently has subscribers. Receipts are also kept in a bounded history
/// so a subscription opened after a delivery still observes it.
pub struct ReceiptBus {
    channels: ChannelMap,
    history: Mutex<ReceiptHistory>,
    published: AtomicU64,
    capacity: usize,
}

impl ReceiptBus {
    /// Create a bus with default per-channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with the given per-channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_limits(capacity, DEFAULT_HISTORY_TXS)
    }

    /// Create a bus with the given per-channel capacity, remembering
    /// receipts of up to `history_txs` origin transactions.
    #[must_use]
    pub fn with_limits(capacity: usize, history_txs: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            history: Mutex::new(ReceiptHistory::new(history_txs, capacity)),
            published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to receipts of messages dispatched by `origin_tx`.
    ///
    /// Receipts still in the history are replayed first, followed by
    /// everything published after this call.
    #[must_use]
    pub fn subscribe(&self, origin_tx: TxId) -> ReceiptSubscription {
        // Publishing holds the channel lock too, so every receipt lands in
        // either the backlog or the receiver.
        let mut channels = self.channels.lock();
        let backlog = self.history.lock().replay(&origin_tx);
        let receiver = match channels.get(&origin_tx) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(self.capacity);
                channels.insert(origin_tx, sender);
                receiver
            }
        };

        debug!(
            origin_tx = ?origin_tx,
            replayed = backlog.len(),
            "Receipt subscription created"
        );
        ReceiptSubscription::new(receiver, backlog, origin_tx, self.channels.clone())
    }

    /// Publish a receipt to subscribers of its origin transaction.
    ///
    /// Returns the number of subscriptions reached; zero when nobody waits.
    /// The receipt is kept in the history either way.
    pub fn publish(&self, receipt: DeliveryReceipt) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let origin_tx = receipt.origin_tx;

        let channels = self.channels.lock();
        self.history.lock().record(&receipt);
        let Some(sender) = channels.get(&origin_tx) else {
            return 0;
        };

        match sender.send(receipt) {
            Ok(receivers) => {
                debug!(origin_tx = ?origin_tx, receivers, "Receipt published");
                receivers
            }
            Err(_) => 0,
        }
    }

    /// Origin transactions with at least one subscription.
    #[must_use]
    pub fn active_channels(&self) -> usize {
        self.channels.lock().len()
    }

    /// Origin transactions with receipts in the history.
    #[must_use]
    pub fn remembered(&self) -> usize {
        self.history.lock().len()
    }

    /// Total receipts published.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Per-channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ReceiptBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeliveryOutcome, DomainId};
    use primitive_types::H256;

    fn receipt_for(origin_tx: TxId, message: u64) -> DeliveryReceipt {
        DeliveryReceipt {
            message_id: H256::from_low_u64_be(message),
            origin: DomainId(1),
            destination: DomainId(2),
            origin_tx,
            delivery_tx: Some(H256::repeat_byte(9)),
            outcome: DeliveryOutcome::Delivered,
            confirmations: 1,
            block_number: 1,
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = ReceiptBus::new();
        assert_eq!(bus.publish(receipt_for(H256::repeat_byte(1), 0)), 0);
        assert_eq!(bus.published(), 1);
        assert_eq!(bus.active_channels(), 0);
    }

    #[test]
    fn test_publish_reaches_matching_channel_only() {
        let bus = ReceiptBus::new();
        let watched = H256::repeat_byte(1);
        let _a = bus.subscribe(watched);
        let _b = bus.subscribe(watched);
        let _other = bus.subscribe(H256::repeat_byte(2));

        assert_eq!(bus.publish(receipt_for(watched, 0)), 2);
        assert_eq!(bus.active_channels(), 2);
    }

    #[test]
    fn test_late_subscriber_sees_earlier_receipts() {
        let bus = ReceiptBus::new();
        let tx = H256::repeat_byte(1);
        bus.publish(receipt_for(tx, 0));
        bus.publish(receipt_for(tx, 1));
        bus.publish(receipt_for(H256::repeat_byte(2), 0));

        let mut sub = bus.subscribe(tx);

        assert_eq!(sub.try_recv().unwrap().message_id, H256::from_low_u64_be(0));
        assert_eq!(sub.try_recv().unwrap().message_id, H256::from_low_u64_be(1));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_history_evicts_oldest_transaction() {
        let bus = ReceiptBus::with_limits(4, 2);
        for byte in 1..=3 {
            bus.publish(receipt_for(H256::repeat_byte(byte), 0));
        }

        assert_eq!(bus.remembered(), 2);
        assert!(bus.subscribe(H256::repeat_byte(1)).try_recv().is_none());
        assert!(bus.subscribe(H256::repeat_byte(3)).try_recv().is_some());
    }

    #[test]
    fn test_history_keeps_one_copy_per_message() {
        let bus = ReceiptBus::new();
        let tx = H256::repeat_byte(1);
        bus.publish(receipt_for(tx, 5));
        bus.publish(receipt_for(tx, 5));

        let mut sub = bus.subscribe(tx);
        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_history_disabled() {
        let bus = ReceiptBus::with_limits(4, 0);
        let tx = H256::repeat_byte(1);
        bus.publish(receipt_for(tx, 0));

        assert_eq!(bus.remembered(), 0);
        assert!(bus.subscribe(tx).try_recv().is_none());
    }

    #[test]
    fn test_custom_capacity() {
        assert_eq!(ReceiptBus::with_capacity(8).capacity(), 8);
        assert_eq!(ReceiptBus::with_capacity(0).capacity(), 1);
        assert_eq!(ReceiptBus::default().capacity(), DEFAULT_CHANNEL_CAPACITY);
    }
}
