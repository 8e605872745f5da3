//! # Interchain Relay
//!
//! Moves messages between independent ledgers ("domains"). Each domain
//! records outgoing messages in an outbound log; the relay reads those logs
//! and submits each message to its destination's delivery entry point.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | `DomainRegistry` | Domain id to ledger client lookup |
//! | `MessageLogScanner` | Reads and decodes dispatch events, owns cursors |
//! | `RelaySubmitter` | Submits one delivery and waits for its receipt |
//! | `RelayService` | Per-origin passes, fan-out and delivery waits |
//!
//! ## Delivery Guarantees
//!
//! - At-least-once submission; the destination suppresses duplicates and an
//!   "already processed" answer counts as success.
//! - Per `(origin, destination)` pair, deliveries follow log order.
//! - A failed origin or destination never blocks the others.
//!
//! ## Module Structure
//!
//! ```text
//! interchain-relay/
//! ├── domain/          # DomainId, DispatchedMessage, DeliveryReceipt, errors
//! ├── algorithms/      # Message codec, destination grouping
//! ├── ports/           # RelayApi, LedgerClient, SignerProvider
//! ├── adapters/        # InMemoryLedger, StaticSigners
//! ├── bus/             # Receipt bus for delivery waiters
//! ├── registry.rs      # DomainRegistry
//! ├── scanner.rs       # MessageLogScanner
//! ├── submitter.rs     # RelaySubmitter
//! └── service.rs       # RelayService
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod bus;
pub mod config;
pub mod domain;
pub mod ports;
pub mod registry;
pub mod scanner;
pub mod service;
pub mod submitter;

// Re-exports
pub use adapters::{InMemoryLedger, StaticSigners};
pub use algorithms::{decode_message, encode_message, group_by_destination, message_id};
pub use bus::{ReceiptBus, ReceiptSubscription};
pub use config::{DomainConfig, RelayConfig};
pub use domain::{
    address_to_bytes32, bytes32_to_address, Address, BalanceReport, Checkpoint, DeliveryOutcome,
    DeliveryReceipt, DispatchedMessage, Domain, DomainId, FeeOverrides, LogPosition,
    MalformedEvent, MessageId, RelayError, RelayReport, RelayResult, ScanBatch, Signer, TxId,
};
pub use ports::{
    DeliveryPayload, LedgerClient, LedgerError, RawDispatchEvent, RelayAllReport, RelayApi,
    SignerProvider, TxReceipt,
};
pub use registry::DomainRegistry;
pub use scanner::{CursorGuard, MessageLogScanner};
pub use service::RelayService;
pub use submitter::RelaySubmitter;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
