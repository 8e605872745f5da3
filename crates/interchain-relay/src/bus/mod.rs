//! # Receipt Bus
//!
//! Correlation channel between relayers and waiters.
//!
//! ```text
//! relay_from_origin ──publish(receipt)──→ ┌────────────────────┐
//!                                         │ channel[origin_tx] │ ──recv()──→ wait_for_delivery
//! relay_all ────────publish(receipt)────→ └────────────────────┘
//! ```
//!
//! Channels exist only while someone is subscribed to their origin
//! transaction; the last subscription to drop removes its channel. A bounded
//! history of recent receipts is replayed to new subscriptions, so waiting
//! after the relay has already delivered still succeeds.

pub mod publisher;
pub mod subscriber;

pub use publisher::ReceiptBus;
pub use subscriber::ReceiptSubscription;

/// Default receipts buffered per channel before a slow subscriber lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Default number of origin transactions whose receipts stay replayable.
pub const DEFAULT_HISTORY_TXS: usize = 1024;
