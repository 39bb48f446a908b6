//! Remote validation payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::outcome::{OutcomeStatus, Severity};
use crate::rule::value_to_string;

/// Body sent to the remote validation endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParameters {
    pub input_value: String,
    /// Keyed by the parameter name declared in the rule argument.
    #[serde(default)]
    pub dependent_inputs: BTreeMap<String, DependentValue>,
}

/// Snapshot of one dependent control at dispatch time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependentValue {
    pub html_id: String,
    pub value: String,
}

/// Response of the remote validation endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Html id to value for controls the server can fill in.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependent_inputs: BTreeMap<String, Value>,
}

impl RemoteResponse {
    pub fn valid() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    pub fn invalid() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_message_type(mut self, severity: Severity) -> Self {
        self.message_type = Some(severity.as_str().to_string());
        self
    }

    #[must_use]
    pub fn with_dependent_input(mut self, html_id: impl Into<String>, value: Value) -> Self {
        self.dependent_inputs.insert(html_id.into(), value);
        self
    }

    /// Declared status, else derived from `valid`.
    pub fn status(&self) -> OutcomeStatus {
        match self.status.as_deref().filter(|s| !s.is_empty()) {
            Some(status) => OutcomeStatus::parse(status),
            None if self.valid => OutcomeStatus::Valid,
            None => OutcomeStatus::Invalid,
        }
    }

    /// Non-empty message carried by the response.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }

    /// Severity declared by the server; unknown tokens are ignored.
    pub fn severity(&self) -> Option<Severity> {
        self.message_type.as_deref().and_then(Severity::parse)
    }

    /// Value for a dependent control, rendered as input text.
    pub fn dependent_value(&self, html_id: &str) -> Option<String> {
        self.dependent_inputs.get(html_id).and_then(value_to_string)
    }
}

/// How a dispatched check ended. Every variant funnels into the same
/// resolution path.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCompletion {
    Response(RemoteResponse),
    /// Transport-level failure, carrying the transport's status text.
    Failed(String),
    TimedOut,
}

impl RemoteCompletion {
    pub fn status(&self) -> OutcomeStatus {
        match self {
            Self::Response(response) => response.status(),
            Self::Failed(text) => OutcomeStatus::parse(text),
            Self::TimedOut => OutcomeStatus::Timeout,
        }
    }

    pub fn response(&self) -> Option<&RemoteResponse> {
        match self {
            Self::Response(response) => Some(response),
            _ => None,
        }
    }
}
