//! # Receipt Subscriber
//!
//! Subscription side of the receipt bus.

use super::publisher::ChannelMap;
use crate::domain::{DeliveryReceipt, TxId};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Subscription to receipts of one origin transaction.
///
/// Dropping the last subscription of a transaction removes its channel.
pub struct ReceiptSubscription {
    receiver: broadcast::Receiver<DeliveryReceipt>,
    backlog: VecDeque<DeliveryReceipt>,
    lagged: u64,
    origin_tx: TxId,
    channels: ChannelMap,
}

impl ReceiptSubscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<DeliveryReceipt>,
        backlog: VecDeque<DeliveryReceipt>,
        origin_tx: TxId,
        channels: ChannelMap,
    ) -> Self {
        Self {
            receiver,
            backlog,
            lagged: 0,
            origin_tx,
            channels,
        }
    }

    /// Origin transaction this subscription follows.
    pub fn origin_tx(&self) -> TxId {
        self.origin_tx
    }

    /// Receipts skipped because this subscription fell behind the channel.
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    /// Receive the next receipt, replayed history first.
    ///
    /// Returns `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<DeliveryReceipt> {
        if let Some(receipt) = self.backlog.pop_front() {
            return Some(receipt);
        }
        loop {
            match self.receiver.recv().await {
                Ok(receipt) => return Some(receipt),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    self.lagged += count;
                    warn!(
                        origin_tx = ?self.origin_tx,
                        lagged = count,
                        "Receipt subscriber lagged, receipts dropped"
                    );
                }
            }
        }
    }

    /// Receive a buffered receipt without waiting.
    pub fn try_recv(&mut self) -> Option<DeliveryReceipt> {
        if let Some(receipt) = self.backlog.pop_front() {
            return Some(receipt);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(receipt) => return Some(receipt),
                Err(broadcast::error::TryRecvError::Lagged(count)) => self.lagged += count,
                Err(_) => return None,
            }
        }
    }
}

impl Drop for ReceiptSubscription {
    fn drop(&mut self) {
        let mut channels = self.channels.lock();
        let Some(sender) = channels.get(&self.origin_tx) else {
            return;
        };

        // Our receiver is still alive here, so a count of one means we are last.
        if sender.receiver_count() <= 1 {
            channels.remove(&self.origin_tx);
            debug!(origin_tx = ?self.origin_tx, "Receipt channel released");
        }
    }
}
