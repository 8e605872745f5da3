//! # Inbound Ports
//!
//! API trait defining what the relay engine can do.

use crate::domain::{DeliveryReceipt, DomainId, RelayError, RelayReport, TxId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-origin outcomes of a relay pass over every domain.
pub type RelayAllReport = BTreeMap<DomainId, Result<RelayReport, RelayError>>;

/// Relay API - inbound port.
#[async_trait]
pub trait RelayApi: Send + Sync {
    /// Relay every pending message from `origin` to its destinations.
    async fn relay_from_origin(&self, origin: DomainId) -> Result<RelayReport, RelayError>;

    /// Relay pending messages from every configured domain.
    ///
    /// Failures are isolated per origin and never abort sibling domains.
    async fn relay_all(&self) -> RelayAllReport;

    /// Wait until `expected` deliveries of messages dispatched by
    /// `origin_tx` have been observed, or `timeout` elapses.
    async fn wait_for_delivery(
        &self,
        origin_tx: TxId,
        expected: usize,
        timeout: Duration,
    ) -> Result<Vec<DeliveryReceipt>, RelayError>;
}
