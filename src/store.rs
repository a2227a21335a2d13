//! Message and redirect maps keyed by logical id.
//!
//! Neither store synchronises on its own. [`crate::service::CorrelationService`]
//! owns both behind one lock so a message and its redirect always change
//! together.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::identifier::LogicalId;
use crate::message::Message;

#[derive(Debug)]
struct Buffered<T> {
    value: T,
    received_at: Instant,
}

impl<T> Buffered<T> {
    fn new(value: T, received_at: Instant) -> Self {
        Self { value, received_at }
    }

    fn expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.received_at) > ttl
    }
}

/// Most recent message per logical id.
#[derive(Debug, Default)]
pub struct MessageStore {
    entries: HashMap<LogicalId, Buffered<Message>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional upsert. Returns the replaced message, if any.
    pub fn put(&mut self, id: LogicalId, message: Message, now: Instant) -> Option<Message> {
        self.entries
            .insert(id, Buffered::new(message, now))
            .map(|prior| prior.value)
    }

    pub fn get(&self, id: &LogicalId) -> Option<&Message> {
        self.entries.get(id).map(|entry| &entry.value)
    }

    /// Remove and return the message for `id` only if its kind matches.
    /// A mismatch leaves the entry in place.
    pub fn take_if_kind(&mut self, id: &LogicalId, expected_kind: &str) -> Option<Message> {
        if !self.get(id)?.is_kind(expected_kind) {
            return None;
        }
        self.entries.remove(id).map(|entry| entry.value)
    }

    /// Ids whose message arrived more than `ttl` before `now`.
    pub fn expired_ids(&self, now: Instant, ttl: Duration) -> Vec<LogicalId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.expired(now, ttl))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn remove(&mut self, id: &LogicalId) -> Option<Message> {
        self.entries.remove(id).map(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Redirect target per logical id.
#[derive(Debug, Default)]
pub struct RedirectStore {
    targets: HashMap<LogicalId, String>,
}

impl RedirectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, id: LogicalId, target: impl Into<String>) {
        self.targets.insert(id, target.into());
    }

    pub fn take_and_remove(&mut self, id: &LogicalId) -> Option<String> {
        self.targets.remove(id)
    }

    pub fn contains(&self, id: &LogicalId) -> bool {
        self.targets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
