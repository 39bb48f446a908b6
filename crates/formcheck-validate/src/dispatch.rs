//! Remote check dispatch.
//!
//! The engine owns no I/O. It hands a [`RemoteRequest`] to a [`Transport`]
//! and expects the host to come back with the request's ticket and a
//! [`RemoteCompletion`](formcheck_model::RemoteCompletion), exactly once.

use std::collections::VecDeque;
use std::time::Duration;

use formcheck_model::dom::attr;
use formcheck_model::{DependentValue, Document, NodeId, RequestParameters, RuleArgument};
use serde_json::Value;

use crate::queue::PendingTicket;

/// One remote check ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub ticket: PendingTicket,
    pub url: String,
    pub timeout: Duration,
    pub parameters: RequestParameters,
    /// Rule argument as declared.
    pub argument: Value,
}

impl RemoteRequest {
    pub fn operation(&self) -> &str {
        &self.ticket.key.operation
    }

    /// Identity of the owning control.
    pub fn control(&self) -> &str {
        &self.ticket.key.control
    }
}

pub trait Transport {
    /// Start a request. Completion is reported back through
    /// `FormValidator::resolve`.
    fn send(&mut self, request: RemoteRequest);
}

/// Keeps requests in send order until the host completes them.
#[derive(Debug, Default)]
pub struct QueuedTransport {
    outbox: VecDeque<RemoteRequest>,
}

impl QueuedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.outbox.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outbox.is_empty()
    }

    pub fn requests(&self) -> impl Iterator<Item = &RemoteRequest> {
        self.outbox.iter()
    }

    pub fn pop_front(&mut self) -> Option<RemoteRequest> {
        self.outbox.pop_front()
    }

    /// Take the oldest request sent for a control.
    pub fn take_for(&mut self, control: &str) -> Option<RemoteRequest> {
        let index = self.outbox.iter().position(|r| r.control() == control)?;
        self.outbox.remove(index)
    }

    pub fn drain(&mut self) -> Vec<RemoteRequest> {
        self.outbox.drain(..).collect()
    }
}

impl Transport for QueuedTransport {
    fn send(&mut self, request: RemoteRequest) {
        self.outbox.push_back(request);
    }
}

/// Snapshot the control's value and every dependent control declared in the
/// argument. Dependent controls missing from the document send an empty
/// value.
pub fn request_parameters(
    doc: &Document,
    control: NodeId,
    argument: &RuleArgument,
) -> RequestParameters {
    let dependent_inputs = argument
        .dependent_inputs
        .iter()
        .map(|(parameter, html_id)| {
            let value = doc
                .element_by_id(html_id)
                .map(|node| doc.effective_value(node))
                .unwrap_or_default();
            (
                parameter.clone(),
                DependentValue {
                    html_id: html_id.clone(),
                    value,
                },
            )
        })
        .collect();
    RequestParameters {
        input_value: doc.effective_value(control),
        dependent_inputs,
    }
}

/// Identity used to key pending checks: the html id, else the node id.
pub fn control_identity(doc: &Document, control: NodeId) -> String {
    doc.attr(control, attr::ID)
        .filter(|id| !id.is_empty())
        .map_or_else(|| control.to_string(), str::to_string)
}
