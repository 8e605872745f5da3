//! # Message Log Scanner
//!
//! Reads dispatch events from an origin domain's outbound log and decodes
//! them into messages. Owns the per-domain scan cursors.
//!
//! A cursor is guarded by an async mutex held for the duration of a scan (and
//! of the relay that consumes it), so two scans of the same domain never race
//! on its checkpoint. Cursors of different domains are independent.
//!
//! Besides the checkpoint, a cursor remembers positions past the checkpoint
//! that are already settled, so a pass that resumes below them does not
//! handle them again. An event that cannot be decoded is reported in the
//! batch and read past; it never blocks the rest of the log.

use crate::algorithms::decode_message;
use crate::domain::{
    invariant_checkpoint_monotonic, invariant_origin_matches, Checkpoint, DispatchedMessage,
    DomainId, LogPosition, MalformedEvent, RelayError, ScanBatch,
};
use crate::ports::outbound::RawDispatchEvent;
use crate::registry::DomainRegistry;
use relay_telemetry::metrics::{
    CHECKPOINT_POSITION, MALFORMED_EVENTS, MESSAGES_SCANNED, SCAN_FAILURES,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// Checkpoint plus the settled positions at or past it.
#[derive(Debug, Default)]
struct CursorState {
    checkpoint: Checkpoint,
    settled: BTreeSet<LogPosition>,
}

/// Exclusive handle on one domain's scan cursor.
pub struct CursorGuard {
    domain: DomainId,
    guard: OwnedMutexGuard<CursorState>,
}

impl CursorGuard {
    /// Domain this cursor belongs to.
    pub fn domain(&self) -> DomainId {
        self.domain
    }

    /// Current checkpoint.
    pub fn checkpoint(&self) -> Checkpoint {
        self.guard.checkpoint
    }

    /// Mark `position` as handled for good. Positions below the checkpoint
    /// are settled already and are not recorded.
    pub fn settle(&mut self, position: LogPosition) {
        if self.guard.checkpoint.covers(position) {
            self.guard.settled.insert(position);
        }
    }

    /// Whether `position` needs no further handling.
    pub fn is_settled(&self, position: LogPosition) -> bool {
        !self.guard.checkpoint.covers(position) || self.guard.settled.contains(&position)
    }

    /// Move the cursor forward to `to`; never moves it backwards.
    ///
    /// Settled positions below the new checkpoint are forgotten.
    pub fn advance(&mut self, to: Checkpoint) {
        if !invariant_checkpoint_monotonic(self.guard.checkpoint, to) {
            debug!(
                domain = %self.domain,
                current = ?self.guard.checkpoint,
                proposed = ?to,
                "Ignoring checkpoint regression"
            );
            return;
        }
        self.guard.checkpoint = to;
        let kept = self.guard.settled.split_off(&to.next_position());
        self.guard.settled = kept;
        CHECKPOINT_POSITION
            .with_label_values(&[&self.domain.to_string()])
            .set(to.next_position().0 as i64);
    }
}

/// Outbound log scanner for every registered domain.
pub struct MessageLogScanner {
    registry: Arc<DomainRegistry>,
    cursors: HashMap<DomainId, Arc<Mutex<CursorState>>>,
}

impl MessageLogScanner {
    /// Create a scanner with every cursor at genesis.
    pub fn new(registry: Arc<DomainRegistry>) -> Self {
        let cursors = registry
            .ids()
            .into_iter()
            .map(|id| (id, Arc::new(Mutex::new(CursorState::default()))))
            .collect();
        Self { registry, cursors }
    }

    /// Read dispatch events of `origin` emitted at or after `since`.
    ///
    /// Stateless: the stored cursor is neither read nor moved. The returned
    /// checkpoint follows the last event read, or equals `since` when nothing
    /// new was found. Events that fail to decode, or claim another origin,
    /// are returned in `malformed` and do not fail the scan.
    pub async fn scan_dispatched(
        &self,
        origin: DomainId,
        since: Checkpoint,
    ) -> Result<ScanBatch, RelayError> {
        let domain = self.registry.resolve(origin)?;

        let mut events = domain
            .client
            .read_dispatch_logs(since.next_position())
            .await
            .map_err(|e| {
                SCAN_FAILURES.with_label_values(&[&origin.to_string()]).inc();
                warn!(origin = %origin, error = %e, "Dispatch log read failed");
                RelayError::SourceUnavailable {
                    domain: origin,
                    reason: e.to_string(),
                }
            })?;

        let mut messages = Vec::with_capacity(events.len());
        let mut malformed = Vec::new();
        let mut checkpoint = since;
        events.sort_by_key(|event| event.position);

        for event in events {
            if !since.covers(event.position) {
                continue;
            }
            checkpoint = Checkpoint::after(event.position);

            match decode_event(&event, origin) {
                Ok(message) => messages.push(message),
                Err(reason) => {
                    MALFORMED_EVENTS
                        .with_label_values(&[&origin.to_string()])
                        .inc();
                    warn!(
                        origin = %origin,
                        position = event.position.0,
                        origin_tx = ?event.tx_id,
                        reason = %reason,
                        "Skipping malformed dispatch event"
                    );
                    malformed.push(MalformedEvent {
                        position: event.position,
                        origin_tx: event.tx_id,
                        reason,
                    });
                }
            }
        }

        MESSAGES_SCANNED
            .with_label_values(&[&origin.to_string()])
            .inc_by(messages.len() as u64);
        debug!(
            origin = %origin,
            since = since.next_position().0,
            count = messages.len(),
            malformed = malformed.len(),
            "Scanned dispatch log"
        );

        Ok(ScanBatch {
            origin,
            messages,
            malformed,
            checkpoint,
        })
    }

    /// Take the scan-in-progress lock for `origin`.
    pub async fn lock_cursor(&self, origin: DomainId) -> Result<CursorGuard, RelayError> {
        let cursor = self
            .cursors
            .get(&origin)
            .ok_or(RelayError::UnknownDomain { domain: origin })?;
        Ok(CursorGuard {
            domain: origin,
            guard: Arc::clone(cursor).lock_owned().await,
        })
    }

    /// Scan from the stored cursor and advance it past the returned batch.
    ///
    /// On failure the cursor is left untouched, so a retry re-reads the
    /// same window.
    pub async fn scan_pending(&self, origin: DomainId) -> Result<ScanBatch, RelayError> {
        let mut cursor = self.lock_cursor(origin).await?;
        let batch = self.scan_dispatched(origin, cursor.checkpoint()).await?;
        cursor.advance(batch.checkpoint);
        Ok(batch)
    }

    /// Stored cursor of `origin`; waits for an in-flight scan to finish.
    pub async fn checkpoint(&self, origin: DomainId) -> Result<Checkpoint, RelayError> {
        Ok(self.lock_cursor(origin).await?.checkpoint())
    }
}

/// Decode one event read from `origin`, returning the failure reason.
fn decode_event(event: &RawDispatchEvent, origin: DomainId) -> Result<DispatchedMessage, String> {
    let message =
        decode_message(&event.message, event.tx_id, event.position).map_err(|e| e.to_string())?;
    match invariant_origin_matches(&message, origin) {
        Ok(()) => Ok(message),
        Err(RelayError::MalformedMessage { reason, .. }) => Err(reason),
        Err(other) => Err(other.to_string()),
    }
}
