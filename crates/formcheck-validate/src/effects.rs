//! Per-operation side effects run after a remote check resolves.

use std::collections::HashMap;
use std::fmt;

use formcheck_model::{Document, NodeId, RemoteResponse};
use serde_json::Value;

/// Callback receiving the document, the owning control, the response
/// payload (absent on failure or timeout) and the rule argument.
pub type SideEffect = Box<dyn Fn(&mut Document, NodeId, Option<&RemoteResponse>, &Value)>;

#[derive(Default)]
pub struct SideEffects {
    callbacks: HashMap<String, SideEffect>,
}

impl fmt::Debug for SideEffects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.callbacks.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("SideEffects")
            .field("operations", &names)
            .finish()
    }
}

impl SideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, operation: impl Into<String>, callback: F)
    where
        F: Fn(&mut Document, NodeId, Option<&RemoteResponse>, &Value) + 'static,
    {
        self.callbacks.insert(operation.into(), Box::new(callback));
    }

    pub fn get(&self, operation: &str) -> Option<&SideEffect> {
        self.callbacks.get(operation)
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.callbacks.contains_key(operation)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}
