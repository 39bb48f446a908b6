//! Pending remote checks.
//!
//! At most one check is outstanding per key. Registering a key again
//! replaces the entry and bumps the generation, so the earlier request's
//! result no longer matches anything and is dropped on arrival.

use std::collections::HashMap;
use std::fmt;

use formcheck_model::{MessageMap, NodeId};
use serde_json::Value;

/// Identity of an outstanding check: control, operation and endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingKey {
    /// Html id of the control, or its node id when it has none.
    pub control: String,
    pub operation: String,
    pub endpoint: String,
}

impl PendingKey {
    pub fn new(
        control: impl Into<String>,
        operation: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            control: control.into(),
            operation: operation.into(),
            endpoint: endpoint.into(),
        }
    }
}

impl fmt::Display for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}--{}--{}", self.control, self.operation, self.endpoint)
    }
}

/// Handle the transport returns with a completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingTicket {
    pub key: PendingKey,
    pub generation: u64,
}

/// What a check needs to be resolved once its result arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub control: NodeId,
    pub messages: MessageMap,
    pub optional: bool,
    /// Resolve silently, without touching messages.
    pub only_check: bool,
    pub argument: Value,
    generation: u64,
}

impl PendingEntry {
    pub fn new(control: NodeId, messages: MessageMap, optional: bool, argument: Value) -> Self {
        Self {
            control,
            messages,
            optional,
            only_check: false,
            argument,
            generation: 0,
        }
    }

    #[must_use]
    pub fn only_check(mut self, only_check: bool) -> Self {
        self.only_check = only_check;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: HashMap<PendingKey, PendingEntry>,
    next_generation: u64,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check, returning its ticket and the entry it superseded.
    pub fn register(
        &mut self,
        key: PendingKey,
        mut entry: PendingEntry,
    ) -> (PendingTicket, Option<PendingEntry>) {
        self.next_generation += 1;
        entry.generation = self.next_generation;
        let ticket = PendingTicket {
            key: key.clone(),
            generation: entry.generation,
        };
        let replaced = self.entries.insert(key, entry);
        (ticket, replaced)
    }

    /// Remove and return the entry the ticket was issued for. Tickets of
    /// superseded or already resolved checks yield `None`.
    pub fn take(&mut self, ticket: &PendingTicket) -> Option<PendingEntry> {
        let current = self.entries.get(&ticket.key)?;
        if current.generation != ticket.generation {
            return None;
        }
        self.entries.remove(&ticket.key)
    }

    pub fn get(&self, key: &PendingKey) -> Option<&PendingEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &PendingKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outstanding keys, sorted.
    pub fn keys(&self) -> Vec<&PendingKey> {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        keys
    }

    /// Outstanding keys owned by the control with the given identity.
    pub fn pending_for(&self, control: &str) -> Vec<&PendingKey> {
        self.keys()
            .into_iter()
            .filter(|key| key.control == control)
            .collect()
    }
}
