//! Severities, evaluator verdicts and remote outcome statuses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Message severity. The lowercase label doubles as the CSS class token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocking failure of a mandatory rule.
    Error,
    /// Advisory feedback; never blocks.
    Info,
    /// Positive confirmation.
    Valid,
}

impl Severity {
    /// Get all severities.
    pub const fn all() -> &'static [Self] {
        &[Self::Error, Self::Info, Self::Valid]
    }

    /// Parse severity from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "info" => Some(Self::Info),
            "valid" => Some(Self::Valid),
            _ => None,
        }
    }

    /// Class-name token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Info => "info",
            Self::Valid => "valid",
        }
    }

    /// Error messages are exclusive per placeholder; the others are not.
    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating one flat rule synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Valid,
    Invalid,
    /// The operation is not known to the evaluator; the rule is skipped.
    Unhandled,
}

impl Verdict {
    pub fn from_bool(valid: bool) -> Self {
        if valid { Self::Valid } else { Self::Invalid }
    }

    /// Flip `Valid`/`Invalid`; `Unhandled` stays unhandled.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Valid => Self::Invalid,
            Self::Invalid => Self::Valid,
            Self::Unhandled => Self::Unhandled,
        }
    }

    /// `None` for `Unhandled`.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Valid => Some(true),
            Self::Invalid => Some(false),
            Self::Unhandled => None,
        }
    }
}

/// Terminal status of an asynchronous check; also the key into a rule's
/// message map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutcomeStatus {
    Valid,
    Invalid,
    Timeout,
    /// Application-declared status or transport error text.
    Other(String),
}

impl OutcomeStatus {
    pub const VALID: &'static str = "valid";
    pub const INVALID: &'static str = "invalid";
    pub const TIMEOUT: &'static str = "timeout";

    pub fn parse(s: &str) -> Self {
        match s {
            Self::VALID => Self::Valid,
            Self::INVALID => Self::Invalid,
            Self::TIMEOUT => Self::Timeout,
            other => Self::Other(other.to_string()),
        }
    }

    /// Message-map key for this status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Valid => Self::VALID,
            Self::Invalid => Self::INVALID,
            Self::Timeout => Self::TIMEOUT,
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
