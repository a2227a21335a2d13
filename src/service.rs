//! Correlation service
//!
//! Façade over the message and redirect stores. The ingestion path pushes
//! decoded messages in; request handlers claim them out again.
//!
//! ## Locking
//!
//! Both maps sit behind a single `RwLock`. Ingest and claim for the same id
//! never interleave, and a claim never sees a message without the redirect
//! recorded alongside it. Writes for unrelated ids serialise too; critical
//! sections are in-memory map operations only, never I/O.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{CorrelationError, Result};
use crate::identifier::{decode, LogicalId};
use crate::message::{Message, SskKeypair, SSK_KEYPAIR_KIND};
use crate::store::{MessageStore, RedirectStore};

/// A claimed message together with the redirect recorded for the same id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Claim {
    pub message: Message,
    pub redirect: Option<String>,
}

/// Entry counts, for health output and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub messages: usize,
    pub redirects: usize,
}

#[derive(Debug, Default)]
struct CorrelationState {
    messages: MessageStore,
    redirects: RedirectStore,
}

/// Process-wide correlation store. Construct one and share it by `Arc`.
#[derive(Debug, Default)]
pub struct CorrelationService {
    inner: RwLock<CorrelationState>,
}

impl CorrelationService {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, CorrelationState>> {
        self.inner
            .read()
            .map_err(|e| CorrelationError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, CorrelationState>> {
        self.inner
            .write()
            .map_err(|e| CorrelationError::LockPoisoned(e.to_string()))
    }

    /// Buffer an inbound message under the logical id decoded from its
    /// `Identifier` field.
    ///
    /// A newer message for the same id replaces the older one. A message with a
    /// `RedirectUri` field records that redirect; one without clears any
    /// redirect left behind by the message it replaces.
    pub fn ingest(&self, message: Message) -> Result<LogicalId> {
        self.ingest_at(message, Instant::now())
    }

    /// [`ingest`](Self::ingest) with an explicit arrival instant.
    pub fn ingest_at(&self, message: Message, now: Instant) -> Result<LogicalId> {
        let raw = message
            .identifier()
            .ok_or_else(|| CorrelationError::MissingIdentifier {
                kind: message.kind.clone(),
            })?;
        let id = decode(raw)?;
        let redirect = message.redirect_uri().map(str::to_string);
        let kind = message.kind.clone();

        let mut state = self.write()?;
        let replaced = state.messages.put(id.clone(), message, now);
        match redirect {
            Some(target) => state.redirects.put(id.clone(), target),
            None => {
                state.redirects.take_and_remove(&id);
            }
        }
        drop(state);

        debug!(
            id = %id,
            kind = %kind,
            replaced = ?replaced.map(|m| m.kind),
            "Message buffered"
        );
        Ok(id)
    }

    /// Non-destructive lookup.
    pub fn get(&self, id: &LogicalId) -> Result<Option<Message>> {
        Ok(self.read()?.messages.get(id).cloned())
    }

    /// Kind of the message currently buffered for `id`, if any.
    ///
    /// Lets a caller tell "nothing yet" apart from "something else is
    /// waiting", which [`claim`](Self::claim) deliberately reports the same way.
    pub fn pending_kind(&self, id: &LogicalId) -> Result<Option<String>> {
        Ok(self.read()?.messages.get(id).map(|m| m.kind.clone()))
    }

    /// Atomically take the message for `id` if it has `expected_kind`, along
    /// with any redirect recorded for it.
    ///
    /// On a kind mismatch nothing is removed, so a later claim with the right
    /// kind still succeeds.
    pub fn claim(&self, id: &LogicalId, expected_kind: &str) -> Result<Option<Claim>> {
        let mut state = self.write()?;
        let Some(message) = state.messages.take_if_kind(id, expected_kind) else {
            let pending = state.messages.get(id).map(|m| m.kind.clone());
            drop(state);
            debug!(id = %id, expected = %expected_kind, pending = ?pending, "Nothing to claim");
            return Ok(None);
        };
        let redirect = state.redirects.take_and_remove(id);
        drop(state);

        debug!(id = %id, kind = %expected_kind, redirect = ?redirect, "Message claimed");
        Ok(Some(Claim { message, redirect }))
    }

    /// Claim an `SSKKeypair` reply and pull out its URIs.
    ///
    /// A keypair message missing either URI is still consumed.
    pub fn claim_ssk_keypair(&self, id: &LogicalId) -> Result<Option<SskKeypair>> {
        let Some(claim) = self.claim(id, SSK_KEYPAIR_KIND)? else {
            return Ok(None);
        };
        let keypair = SskKeypair::from_message(&claim.message);
        if keypair.is_none() {
            warn!(id = %id, "SSKKeypair reply without InsertURI/RequestURI");
        }
        Ok(keypair)
    }

    /// Drop message/redirect pairs that have waited longer than `ttl`.
    /// Returns the number of ids evicted.
    pub fn evict_expired(&self, now: Instant, ttl: Duration) -> Result<usize> {
        let mut state = self.write()?;
        let expired = state.messages.expired_ids(now, ttl);
        for id in &expired {
            state.messages.remove(id);
            state.redirects.take_and_remove(id);
        }
        Ok(expired.len())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.read()?;
        Ok(StoreStats {
            messages: state.messages.len(),
            redirects: state.redirects.len(),
        })
    }
}

/// Periodically evict unclaimed entries until `shutdown` flips to `true`.
pub async fn run_eviction_sweep(
    service: Arc<CorrelationService>,
    ttl: Duration,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(ttl_secs = ttl.as_secs(), "Eviction sweep started");
    let mut ticker = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.evict_expired(Instant::now(), ttl) {
                    Ok(0) => {}
                    Ok(n) => info!(evicted = n, "Evicted unclaimed entries"),
                    Err(e) => warn!(?e, "Eviction sweep failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Eviction sweep shutting down");
                    break;
                }
            }
        }
    }
}
