//! # Relay Service
//!
//! Drives scanner and submitter across every registered domain and reports
//! per-origin, per-destination outcomes.
//!
//! A relay pass of one origin holds that origin's cursor lock from scan to
//! commit. Destination groups are delivered concurrently; inside a group,
//! messages go out one at a time in log order and the group stops at its
//! first failure. The cursor is committed only past messages that are
//! settled, so a failed pass is picked up again by the next one. Messages
//! settled above the committed cursor (delivered, rejected or malformed) are
//! remembered by the cursor and skipped when a later pass rescans them.

use crate::algorithms::group_by_destination;
use crate::bus::{ReceiptBus, ReceiptSubscription};
use crate::config::RelayConfig;
use crate::domain::{
    BalanceReport, Checkpoint, DeliveryReceipt, DispatchedMessage, DomainId, LogPosition,
    RelayError, RelayReport, TxId,
};
use crate::ports::inbound::{RelayAllReport, RelayApi};
use crate::ports::outbound::{LedgerError, SignerProvider};
use crate::registry::DomainRegistry;
use crate::scanner::MessageLogScanner;
use crate::submitter::RelaySubmitter;
use async_trait::async_trait;
use futures::future::join_all;
use primitive_types::U256;
use relay_telemetry::metrics::WAIT_TIMEOUTS;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Result of delivering one destination group.
struct GroupOutcome {
    destination: DomainId,
    receipts: Vec<DeliveryReceipt>,
    /// First failure and the log position of the failed message.
    failure: Option<(LogPosition, RelayError)>,
    /// Positions handled for good by this group.
    settled: Vec<LogPosition>,
    /// Lowest position of the group that still needs delivering.
    resume_at: Option<LogPosition>,
}

struct Inner {
    registry: Arc<DomainRegistry>,
    scanner: MessageLogScanner,
    submitter: RelaySubmitter,
    bus: ReceiptBus,
    signers: Arc<dyn SignerProvider>,
    skip: HashSet<DomainId>,
    relay_interval: Duration,
}

/// Relay orchestrator.
///
/// Cheap to clone; clones share cursors and the receipt bus.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<Inner>,
}

impl RelayService {
    /// Build a service over `registry`.
    ///
    /// Fails when `config` is inconsistent or names an unknown skip domain.
    pub fn new(
        registry: DomainRegistry,
        signers: Arc<dyn SignerProvider>,
        config: &RelayConfig,
    ) -> Result<Self, RelayError> {
        config.validate()?;
        let registry = Arc::new(registry);

        let skip = config
            .skip_domains
            .iter()
            .map(|name| registry.resolve_name(name).map(|domain| domain.id))
            .collect::<Result<HashSet<_>, _>>()?;

        info!(
            domains = registry.len(),
            skipped = skip.len(),
            "Relay service configured"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                scanner: MessageLogScanner::new(registry.clone()),
                submitter: RelaySubmitter::new(registry.clone(), signers.clone(), config),
                bus: ReceiptBus::with_limits(config.bus_capacity, config.receipt_history),
                registry,
                signers,
                skip,
                relay_interval: config.relay_interval(),
            }),
        })
    }

    /// Registered domains.
    pub fn registry(&self) -> &DomainRegistry {
        &self.inner.registry
    }

    /// Scanner owning the per-domain cursors.
    pub fn scanner(&self) -> &MessageLogScanner {
        &self.inner.scanner
    }

    /// Receipt bus.
    pub fn bus(&self) -> &ReceiptBus {
        &self.inner.bus
    }

    /// Whether `domain` is excluded as an origin.
    pub fn is_skipped(&self, domain: DomainId) -> bool {
        self.inner.skip.contains(&domain)
    }

    /// Stored cursor of `origin`.
    pub async fn checkpoint(&self, origin: DomainId) -> Result<Checkpoint, RelayError> {
        self.inner.scanner.checkpoint(origin).await
    }

    /// Subscribe to receipts of messages dispatched by `origin_tx`.
    ///
    /// Receipts still held by the bus history are received first, then every
    /// receipt published after this call.
    pub fn subscribe_deliveries(&self, origin_tx: TxId) -> ReceiptSubscription {
        self.inner.bus.subscribe(origin_tx)
    }

    /// Report whether each signer can pay for `gas_amount` at current prices.
    ///
    /// Skipped domains are not checked.
    pub async fn check_signer_balances(
        &self,
        gas_amount: U256,
    ) -> BTreeMap<DomainId, Result<BalanceReport, RelayError>> {
        let checks = self
            .inner
            .registry
            .ids()
            .into_iter()
            .filter(|id| !self.is_skipped(*id))
            .map(|id| async move { (id, self.check_signer_balance(id, gas_amount).await) });

        join_all(checks).await.into_iter().collect()
    }

    async fn check_signer_balance(
        &self,
        id: DomainId,
        gas_amount: U256,
    ) -> Result<BalanceReport, RelayError> {
        let domain = self.inner.registry.resolve(id)?;
        let signer = self
            .inner
            .signers
            .signer(id)
            .ok_or(RelayError::MissingSigner { domain: id })?;
        let unavailable = |e: LedgerError| RelayError::SourceUnavailable {
            domain: id,
            reason: e.to_string(),
        };

        let balance = domain
            .client
            .get_balance(signer.address)
            .await
            .map_err(unavailable)?;
        let gas_price = match domain.fees.price_override() {
            Some(price) => price,
            None => domain.client.gas_price().await.map_err(unavailable)?,
        };
        let desired = gas_price.saturating_mul(gas_amount);
        let sufficient = balance >= desired;

        if sufficient {
            debug!(domain = %id, balance = %balance, "Signer funded");
        } else {
            warn!(
                domain = %id,
                signer = ?signer.address,
                balance = %balance,
                desired = %desired,
                "Signer balance below desired"
            );
        }

        Ok(BalanceReport {
            domain: id,
            address: signer.address,
            balance,
            desired,
            sufficient,
        })
    }

    /// Relay every origin each interval until `shutdown` turns true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.inner.relay_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.inner.relay_interval, "Relay loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.relay_all().await;
                    log_pass(&report);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Relay loop stopped");
    }

    async fn deliver_group(
        &self,
        destination: DomainId,
        messages: Vec<DispatchedMessage>,
    ) -> GroupOutcome {
        let mut receipts = Vec::with_capacity(messages.len());
        let mut settled = Vec::with_capacity(messages.len());

        for (index, message) in messages.iter().enumerate() {
            match self.inner.submitter.deliver(message).await {
                Ok(receipt) => {
                    self.inner.bus.publish(receipt.clone());
                    receipts.push(receipt);
                    settled.push(message.position);
                }
                Err(err) => {
                    let resume_at = if settles_message(&err) {
                        settled.push(message.position);
                        messages.get(index + 1).map(|next| next.position)
                    } else {
                        Some(message.position)
                    };
                    return GroupOutcome {
                        destination,
                        receipts,
                        failure: Some((message.position, err)),
                        settled,
                        resume_at,
                    };
                }
            }
        }

        GroupOutcome {
            destination,
            receipts,
            failure: None,
            settled,
            resume_at: None,
        }
    }
}

#[async_trait]
impl RelayApi for RelayService {
    async fn relay_from_origin(&self, origin: DomainId) -> Result<RelayReport, RelayError> {
        let mut cursor = self.inner.scanner.lock_cursor(origin).await?;
        let mut batch = self
            .inner
            .scanner
            .scan_dispatched(origin, cursor.checkpoint())
            .await?;

        batch
            .messages
            .retain(|message| !cursor.is_settled(message.position));
        batch
            .malformed
            .retain(|event| !cursor.is_settled(event.position));

        if batch.is_empty() {
            cursor.advance(batch.checkpoint);
            debug!(origin = %origin, "Nothing to relay");
            return Ok(RelayReport::new());
        }

        let mut first_failure: Option<(LogPosition, RelayError)> = None;
        for event in &batch.malformed {
            cursor.settle(event.position);
            keep_earliest(&mut first_failure, event.position, event.to_error(origin));
        }

        let scanned = batch.messages.len();
        let groups = group_by_destination(&batch.messages);
        let outcomes = join_all(
            groups
                .into_iter()
                .map(|(destination, messages)| self.deliver_group(destination, messages)),
        )
        .await;

        let mut report = RelayReport::new();
        let mut resume_at: Option<LogPosition> = None;

        for outcome in outcomes {
            if !outcome.receipts.is_empty() {
                report.insert(outcome.destination, outcome.receipts);
            }
            for position in outcome.settled {
                cursor.settle(position);
            }
            if let Some(position) = outcome.resume_at {
                resume_at = Some(resume_at.map_or(position, |current| current.min(position)));
            }
            if let Some((position, err)) = outcome.failure {
                keep_earliest(&mut first_failure, position, err);
            }
        }

        cursor.advance(resume_at.map_or(batch.checkpoint, Checkpoint::at));

        match first_failure {
            Some((position, err)) => {
                warn!(
                    origin = %origin,
                    position = position.0,
                    error = %err,
                    "Relay pass incomplete"
                );
                Err(err)
            }
            None => {
                info!(
                    origin = %origin,
                    messages = scanned,
                    destinations = report.len(),
                    "Relay pass complete"
                );
                Ok(report)
            }
        }
    }

    async fn relay_all(&self) -> RelayAllReport {
        let handles: Vec<_> = self
            .inner
            .registry
            .ids()
            .into_iter()
            .filter(|id| !self.is_skipped(*id))
            .map(|id| {
                let service = self.clone();
                let span = info_span!("relay_origin", origin = %id);
                let handle = tokio::spawn(
                    async move { service.relay_from_origin(id).await }.instrument(span),
                );
                (id, handle)
            })
            .collect();

        let mut report = RelayAllReport::new();
        for (id, handle) in handles {
            let result = handle.await.unwrap_or_else(|e| {
                error!(origin = %id, error = %e, "Relay task failed");
                Err(RelayError::TaskFailed {
                    domain: id,
                    reason: e.to_string(),
                })
            });
            report.insert(id, result);
        }
        report
    }

    async fn wait_for_delivery(
        &self,
        origin_tx: TxId,
        expected: usize,
        timeout: Duration,
    ) -> Result<Vec<DeliveryReceipt>, RelayError> {
        let mut subscription = self.inner.bus.subscribe(origin_tx);
        if expected == 0 {
            return Ok(Vec::new());
        }

        let mut receipts = Vec::with_capacity(expected);
        let mut seen = HashSet::new();
        let collect = async {
            while let Some(receipt) = subscription.recv().await {
                if seen.insert(receipt.message_id) {
                    receipts.push(receipt);
                    if receipts.len() >= expected {
                        return true;
                    }
                }
            }
            false
        };

        let complete = matches!(tokio::time::timeout(timeout, collect).await, Ok(true));
        if complete {
            debug!(origin_tx = ?origin_tx, count = receipts.len(), "Deliveries observed");
            return Ok(receipts);
        }

        let lagged = subscription.lagged();
        WAIT_TIMEOUTS.inc();
        warn!(
            origin_tx = ?origin_tx,
            expected,
            observed = receipts.len(),
            lagged,
            "Timed out waiting for deliveries"
        );
        Err(RelayError::DeliveryTimeout {
            origin_tx,
            expected,
            receipts,
            lagged,
        })
    }
}

/// Whether `err` ends the handling of its message: the destination refused it
/// or does not exist.
fn settles_message(err: &RelayError) -> bool {
    matches!(
        err,
        RelayError::SubmissionRejected { .. } | RelayError::UnknownDomain { .. }
    )
}

/// Keep the failure with the lowest log position.
fn keep_earliest(
    first: &mut Option<(LogPosition, RelayError)>,
    position: LogPosition,
    err: RelayError,
) {
    if first.as_ref().map_or(true, |(current, _)| position < *current) {
        *first = Some((position, err));
    }
}

fn log_pass(report: &RelayAllReport) {
    for (origin, result) in report {
        match result {
            Ok(destinations) if !destinations.is_empty() => {
                let delivered: usize = destinations.values().map(Vec::len).sum();
                info!(origin = %origin, delivered, "Origin relayed");
            }
            Ok(_) => debug!(origin = %origin, "Origin idle"),
            Err(err) => warn!(
                origin = %origin,
                retryable = err.is_retryable(),
                error = %err,
                "Origin relay failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryLedger, StaticSigners};
    use crate::domain::{Address, DeliveryOutcome, Domain, FeeOverrides, Signer};
    use primitive_types::H256;

    fn relayer() -> Signer {
        Signer::new(Address::repeat_byte(0x42), "relayer")
    }

    fn setup_with(count: u32, config: RelayConfig) -> (Vec<Arc<InMemoryLedger>>, RelayService) {
        let ids: Vec<DomainId> = (1..=count).map(DomainId).collect();
        let ledgers: Vec<Arc<InMemoryLedger>> = ids
            .iter()
            .map(|id| Arc::new(InMemoryLedger::new(*id)))
            .collect();
        let domains = ledgers
            .iter()
            .map(|ledger| {
                let id = ledger.domain();
                Domain::new(id, format!("test{}", id.0), ledger.clone())
            })
            .collect();
        let registry = DomainRegistry::new(domains).unwrap();
        let signers = Arc::new(StaticSigners::shared(&ids, relayer()));
        let service = RelayService::new(registry, signers, &config).unwrap();
        (ledgers, service)
    }

    fn setup(count: u32) -> (Vec<Arc<InMemoryLedger>>, RelayService) {
        setup_with(count, RelayConfig::for_testing())
    }

    fn send(from: &InMemoryLedger, to: u32, body: &str) -> TxId {
        from.dispatch(
            Address::repeat_byte(1),
            DomainId(to),
            H256::repeat_byte(2),
            body.as_bytes().to_vec(),
        )
    }

    #[tokio::test]
    async fn test_relay_single_message() {
        let (ledgers, service) = setup(2);
        send(&ledgers[0], 2, "hello");

        let report = service.relay_from_origin(DomainId(1)).await.unwrap();
        let receipts = &report[&DomainId(2)];
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].outcome, DeliveryOutcome::Delivered);
        assert!(ledgers[1].is_delivered(&receipts[0].message_id));
        assert!(!report.contains_key(&DomainId(1)));
    }

    #[tokio::test]
    async fn test_empty_origin_yields_empty_report() {
        let (_, service) = setup(2);
        let report = service.relay_from_origin(DomainId(1)).await.unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_second_pass_delivers_nothing() {
        let (ledgers, service) = setup(2);
        send(&ledgers[0], 2, "once");

        service.relay_from_origin(DomainId(1)).await.unwrap();
        let second = service.relay_from_origin(DomainId(1)).await.unwrap();

        assert!(second.is_empty());
        assert_eq!(ledgers[1].delivery_order().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_origin() {
        let (_, service) = setup(2);
        assert!(matches!(
            service.relay_from_origin(DomainId(9)).await,
            Err(RelayError::UnknownDomain { domain: DomainId(9) })
        ));
    }

    #[tokio::test]
    async fn test_rejected_message_is_not_retried() {
        let (ledgers, service) = setup(2);
        send(&ledgers[0], 2, "bad");
        ledgers[1].reject_deliveries(Some("reverted".to_string()));

        let err = service.relay_from_origin(DomainId(1)).await.unwrap_err();
        assert!(matches!(err, RelayError::SubmissionRejected { .. }));

        ledgers[1].reject_deliveries(None);
        let retry = service.relay_from_origin(DomainId(1)).await.unwrap();
        assert!(retry.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_destination_is_retried_next_pass() {
        let (ledgers, service) = setup(2);
        send(&ledgers[0], 2, "a");
        send(&ledgers[0], 2, "b");
        ledgers[1].set_unavailable(true);

        let err = service.relay_from_origin(DomainId(1)).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            service.checkpoint(DomainId(1)).await.unwrap(),
            Checkpoint::GENESIS
        );

        ledgers[1].set_unavailable(false);
        let report = service.relay_from_origin(DomainId(1)).await.unwrap();
        assert_eq!(report[&DomainId(2)].len(), 2);
    }

    #[tokio::test]
    async fn test_failed_group_does_not_block_sibling_group() {
        let (ledgers, service) = setup(3);
        send(&ledgers[0], 2, "to-2");
        send(&ledgers[0], 3, "to-3");
        ledgers[1].set_unavailable(true);

        let err = service.relay_from_origin(DomainId(1)).await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::DestinationUnavailable { domain: DomainId(2), .. }
        ));
        assert_eq!(ledgers[2].delivery_order().len(), 1);

        ledgers[1].set_unavailable(false);
        let report = service.relay_from_origin(DomainId(1)).await.unwrap();
        assert_eq!(report[&DomainId(2)][0].outcome, DeliveryOutcome::Delivered);
        assert!(!report.contains_key(&DomainId(3)));
        assert_eq!(ledgers[2].delivery_order().len(), 1);
    }

    #[tokio::test]
    async fn test_rejection_stays_settled_when_sibling_group_retries() {
        let (ledgers, service) = setup(3);
        send(&ledgers[0], 2, "transient");
        send(&ledgers[0], 3, "refused");
        ledgers[1].set_unavailable(true);
        ledgers[2].reject_deliveries(Some("reverted".to_string()));

        let err = service.relay_from_origin(DomainId(1)).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            service.checkpoint(DomainId(1)).await.unwrap(),
            Checkpoint::GENESIS
        );

        ledgers[1].set_unavailable(false);
        let report = service.relay_from_origin(DomainId(1)).await.unwrap();
        assert_eq!(report[&DomainId(2)].len(), 1);
        assert!(!report.contains_key(&DomainId(3)));

        ledgers[2].reject_deliveries(None);
        let later = service.relay_from_origin(DomainId(1)).await.unwrap();
        assert!(later.is_empty());
        assert!(ledgers[2].delivery_order().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_event_does_not_block_origin() {
        let (ledgers, service) = setup(2);
        send(&ledgers[0], 2, "before");
        let bad_tx = ledgers[0].append_raw_event(vec![0u8; 10]);
        send(&ledgers[0], 2, "after");

        match service.relay_from_origin(DomainId(1)).await {
            Err(RelayError::MalformedMessage { domain, origin_tx, .. }) => {
                assert_eq!(domain, DomainId(1));
                assert_eq!(origin_tx, bad_tx);
            }
            other => panic!("expected malformed message, got {other:?}"),
        }
        assert_eq!(ledgers[1].delivery_order().len(), 2);

        for _ in 0..2 {
            let report = service.relay_from_origin(DomainId(1)).await.unwrap();
            assert!(report.is_empty());
        }
        assert_eq!(ledgers[1].delivery_order().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_event_stays_settled_across_rewind() {
        let (ledgers, service) = setup(2);
        send(&ledgers[0], 2, "stalled");
        ledgers[0].append_raw_event(vec![0u8; 10]);
        ledgers[1].set_unavailable(true);

        let err = service.relay_from_origin(DomainId(1)).await.unwrap_err();
        assert!(matches!(err, RelayError::DestinationUnavailable { .. }));

        ledgers[1].set_unavailable(false);
        let report = service.relay_from_origin(DomainId(1)).await.unwrap();
        assert_eq!(report[&DomainId(2)].len(), 1);
    }

    #[tokio::test]
    async fn test_wait_zero_returns_immediately() {
        let (_, service) = setup(2);
        let receipts = service
            .wait_for_delivery(H256::zero(), 0, Duration::from_millis(1))
            .await
            .unwrap();
        assert!(receipts.is_empty());
        assert_eq!(service.bus().active_channels(), 0);
    }

    #[tokio::test]
    async fn test_wait_collects_receipts_of_concurrent_relay() {
        let (ledgers, service) = setup(2);
        let tx = ledgers[0].dispatch_many(
            Address::zero(),
            vec![
                (DomainId(2), H256::zero(), b"one".to_vec()),
                (DomainId(2), H256::zero(), b"two".to_vec()),
            ],
        );

        let (waited, relayed) = tokio::join!(
            service.wait_for_delivery(tx, 2, Duration::from_secs(5)),
            service.relay_from_origin(DomainId(1)),
        );

        assert_eq!(waited.unwrap().len(), 2);
        assert_eq!(relayed.unwrap()[&DomainId(2)].len(), 2);
        assert_eq!(service.bus().active_channels(), 0);
    }

    #[tokio::test]
    async fn test_wait_timeout_keeps_partial_receipts() {
        let (ledgers, service) = setup(2);
        let tx = send(&ledgers[0], 2, "only");

        let (waited, _) = tokio::join!(
            service.wait_for_delivery(tx, 2, Duration::from_millis(50)),
            service.relay_from_origin(DomainId(1)),
        );

        match waited {
            Err(RelayError::DeliveryTimeout {
                origin_tx,
                expected,
                receipts,
                lagged,
            }) => {
                assert_eq!(origin_tx, tx);
                assert_eq!(expected, 2);
                assert_eq!(receipts.len(), 1);
                assert_eq!(lagged, 0);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wait_after_relay_finished() {
        let (ledgers, service) = setup(2);
        let tx = send(&ledgers[0], 2, "early");
        service.relay_from_origin(DomainId(1)).await.unwrap();

        let receipts = service
            .wait_for_delivery(tx, 1, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(receipts[0].origin_tx, tx);
        assert_eq!(service.bus().active_channels(), 0);
    }

    #[tokio::test]
    async fn test_wait_replays_history_while_relay_continues() {
        let (ledgers, service) = setup(2);
        let first = ledgers[0].dispatch_many(
            Address::zero(),
            vec![(DomainId(2), H256::zero(), b"one".to_vec())],
        );
        service.relay_from_origin(DomainId(1)).await.unwrap();

        let (waited, relayed) = tokio::join!(
            service.wait_for_delivery(first, 1, Duration::from_secs(5)),
            async {
                send(&ledgers[0], 2, "unrelated");
                service.relay_from_origin(DomainId(1)).await
            },
        );

        assert_eq!(waited.unwrap().len(), 1);
        assert_eq!(relayed.unwrap()[&DomainId(2)].len(), 1);
    }

    #[tokio::test]
    async fn test_wait_timeout_reports_lag() {
        let mut config = RelayConfig::for_testing();
        config.bus_capacity = 1;
        config.receipt_history = 0;
        let (ledgers, service) = setup_with(2, config);
        let tx = ledgers[0].dispatch_many(
            Address::zero(),
            vec![
                (DomainId(2), H256::zero(), b"one".to_vec()),
                (DomainId(2), H256::zero(), b"two".to_vec()),
                (DomainId(2), H256::zero(), b"three".to_vec()),
            ],
        );

        let (waited, relayed) = tokio::join!(
            service.wait_for_delivery(tx, 3, Duration::from_millis(50)),
            service.relay_from_origin(DomainId(1)),
        );

        assert_eq!(relayed.unwrap()[&DomainId(2)].len(), 3);
        match waited {
            Err(RelayError::DeliveryTimeout {
                receipts, lagged, ..
            }) => {
                assert_eq!(receipts.len(), 1);
                assert_eq!(lagged, 2);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_relay_all_skips_configured_domains() {
        let mut config = RelayConfig::for_testing();
        config.skip_domains = vec!["test2".to_string()];
        let (ledgers, service) = setup_with(2, config);
        send(&ledgers[0], 2, "forward");
        send(&ledgers[1], 1, "backward");

        let report = service.relay_all().await;
        assert_eq!(report.len(), 1);
        assert!(report[&DomainId(1)].is_ok());
        assert_eq!(ledgers[1].delivery_order().len(), 1);
        assert!(ledgers[0].delivery_order().is_empty());
    }

    #[test]
    fn test_unknown_skip_domain_fails_construction() {
        let mut config = RelayConfig::for_testing();
        config.skip_domains = vec!["nowhere".to_string()];
        let registry = DomainRegistry::new(vec![Domain::new(
            DomainId(1),
            "test1",
            Arc::new(InMemoryLedger::new(DomainId(1))),
        )])
        .unwrap();

        let result = RelayService::new(registry, Arc::new(StaticSigners::new()), &config);
        assert!(matches!(result, Err(RelayError::UnknownDomainName(name)) if name == "nowhere"));
    }

    #[tokio::test]
    async fn test_signer_balance_report() {
        let (ledgers, service) = setup(2);
        ledgers[0].set_gas_price(U256::from(10));
        ledgers[0].set_balance(relayer().address, U256::from(5_000));
        ledgers[1].set_gas_price(U256::from(10));
        ledgers[1].set_balance(relayer().address, U256::from(500));

        let reports = service.check_signer_balances(U256::from(100)).await;
        let funded = reports[&DomainId(1)].as_ref().unwrap();
        let short = reports[&DomainId(2)].as_ref().unwrap();

        assert_eq!(funded.desired, U256::from(1_000));
        assert!(funded.sufficient);
        assert!(!short.sufficient);
        assert_eq!(short.balance, U256::from(500));
    }

    #[tokio::test]
    async fn test_signer_balance_uses_configured_gas_price() {
        let ledgers: Vec<Arc<InMemoryLedger>> = (1..=2)
            .map(|id| Arc::new(InMemoryLedger::new(DomainId(id))))
            .collect();
        let priced = FeeOverrides {
            gas_price: Some(U256::from(1_000)),
            ..FeeOverrides::default()
        };
        let capped = FeeOverrides {
            max_fee_per_gas: Some(U256::from(50)),
            ..FeeOverrides::default()
        };
        let registry = DomainRegistry::new(vec![
            Domain::new(DomainId(1), "test1", ledgers[0].clone()).with_fees(priced),
            Domain::new(DomainId(2), "test2", ledgers[1].clone()).with_fees(capped),
        ])
        .unwrap();
        let signers = Arc::new(StaticSigners::shared(&[DomainId(1), DomainId(2)], relayer()));
        let service = RelayService::new(registry, signers, &RelayConfig::for_testing()).unwrap();
        for ledger in &ledgers {
            ledger.set_gas_price(U256::from(10));
        }

        let reports = service.check_signer_balances(U256::from(100)).await;

        assert_eq!(
            reports[&DomainId(1)].as_ref().unwrap().desired,
            U256::from(100_000)
        );
        assert_eq!(
            reports[&DomainId(2)].as_ref().unwrap().desired,
            U256::from(5_000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_relays_until_shutdown() {
        let (ledgers, service) = setup(2);
        send(&ledgers[0], 2, "looped");
        let (stop, shutdown) = watch::channel(false);

        let handle = {
            let service = service.clone();
            tokio::spawn(async move { service.run(shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(ledgers[1].delivery_order().len(), 1);

        stop.send(true).unwrap();
        handle.await.unwrap();
    }
}
