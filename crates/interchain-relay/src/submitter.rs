//! # Relay Submitter
//!
//! Submits delivery transactions for dispatched messages on their
//! destination domain and waits for the resulting receipts.
//!
//! The destination ledger is the source of truth for duplicate suppression:
//! nothing is checked before submitting, and an "already processed" answer
//! settles the message exactly like a fresh delivery.

use crate::config::RelayConfig;
use crate::domain::{
    invariant_sufficient_confirmations, DeliveryOutcome, DeliveryReceipt, DispatchedMessage,
    Domain, RelayError, TxId,
};
use crate::ports::outbound::{DeliveryPayload, LedgerError, SignerProvider, TxReceipt};
use crate::registry::DomainRegistry;
use relay_telemetry::metrics::{DELIVERIES, DELIVERY_FAILURES};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Failure classes, also used as metric labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FailureKind {
    Rejected,
    Unavailable,
    Unconfirmed,
}

impl FailureKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::Unavailable => "unavailable",
            Self::Unconfirmed => "unconfirmed",
        }
    }
}

/// Delivery transaction submitter.
pub struct RelaySubmitter {
    registry: Arc<DomainRegistry>,
    signers: Arc<dyn SignerProvider>,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl RelaySubmitter {
    /// Create a submitter using the receipt polling settings of `config`.
    pub fn new(
        registry: Arc<DomainRegistry>,
        signers: Arc<dyn SignerProvider>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            registry,
            signers,
            poll_interval: config.receipt_poll_interval(),
            poll_attempts: config.receipt_poll_attempts.max(1),
        }
    }

    /// Deliver `message` on its destination domain.
    ///
    /// Exactly one transaction is submitted to exactly one domain.
    pub async fn deliver(&self, message: &DispatchedMessage) -> Result<DeliveryReceipt, RelayError> {
        let destination = self.registry.resolve(message.destination)?;
        let signer = self
            .signers
            .signer(destination.id)
            .ok_or(RelayError::MissingSigner {
                domain: destination.id,
            })?;

        let payload = DeliveryPayload::for_message(message);
        debug!(
            origin = %message.origin,
            destination = %destination.id,
            nonce = message.nonce,
            origin_tx = ?message.origin_tx,
            "Submitting delivery"
        );

        let submitted = destination
            .client
            .submit_transaction(&payload, &signer, &destination.fees)
            .await;

        let receipt = match submitted {
            Ok(tx) => {
                let tx_receipt = self.await_receipt(destination, tx, message).await?;
                DeliveryReceipt {
                    message_id: message.id,
                    origin: message.origin,
                    destination: destination.id,
                    origin_tx: message.origin_tx,
                    delivery_tx: Some(tx),
                    outcome: DeliveryOutcome::Delivered,
                    confirmations: tx_receipt.confirmations,
                    block_number: tx_receipt.block_number,
                }
            }
            Err(LedgerError::AlreadyProcessed) => {
                debug!(
                    destination = %destination.id,
                    origin_tx = ?message.origin_tx,
                    "Message already delivered"
                );
                DeliveryReceipt::already_delivered(message)
            }
            Err(LedgerError::Rejected(reason)) => {
                return Err(self.fail(destination, message, FailureKind::Rejected, reason));
            }
            Err(LedgerError::Unavailable(reason)) => {
                return Err(self.fail(destination, message, FailureKind::Unavailable, reason));
            }
        };

        DELIVERIES
            .with_label_values(&[&destination.id.to_string(), receipt.outcome.as_str()])
            .inc();
        Ok(receipt)
    }

    /// Poll until the delivery has the destination's required confirmations.
    async fn await_receipt(
        &self,
        destination: &Domain,
        tx: TxId,
        message: &DispatchedMessage,
    ) -> Result<TxReceipt, RelayError> {
        for attempt in 1..=self.poll_attempts {
            match destination.client.get_transaction_receipt(tx).await {
                Ok(Some(receipt)) if !receipt.success => {
                    return Err(self.fail(
                        destination,
                        message,
                        FailureKind::Rejected,
                        format!("delivery tx {tx:?} reverted"),
                    ));
                }
                Ok(Some(receipt))
                    if invariant_sufficient_confirmations(
                        receipt.confirmations,
                        destination.confirmations,
                    ) =>
                {
                    return Ok(receipt);
                }
                Ok(_) => {
                    debug!(
                        destination = %destination.id,
                        tx = ?tx,
                        attempt,
                        "Delivery receipt pending"
                    );
                }
                Err(LedgerError::Unavailable(reason)) => {
                    return Err(self.fail(destination, message, FailureKind::Unavailable, reason));
                }
                Err(e) => {
                    return Err(self.fail(destination, message, FailureKind::Rejected, e.to_string()));
                }
            }

            if attempt < self.poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(self.fail(
            destination,
            message,
            FailureKind::Unconfirmed,
            format!(
                "delivery tx {tx:?} not confirmed after {} polls",
                self.poll_attempts
            ),
        ))
    }

    fn fail(
        &self,
        destination: &Domain,
        message: &DispatchedMessage,
        kind: FailureKind,
        reason: String,
    ) -> RelayError {
        DELIVERY_FAILURES
            .with_label_values(&[&destination.id.to_string(), kind.as_str()])
            .inc();
        warn!(
            destination = %destination.id,
            origin_tx = ?message.origin_tx,
            kind = kind.as_str(),
            reason = %reason,
            "Delivery failed"
        );

        if kind == FailureKind::Rejected {
            RelayError::SubmissionRejected {
                domain: destination.id,
                origin_tx: message.origin_tx,
                reason,
            }
        } else {
            RelayError::DestinationUnavailable {
                domain: destination.id,
                origin_tx: message.origin_tx,
                reason,
            }
        }
    }
}
