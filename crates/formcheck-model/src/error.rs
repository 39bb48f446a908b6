//! Error types shared across the formcheck crates.
//!
//! Validation outcomes are never errors. Only authoring mistakes (malformed
//! rule declarations, broken configuration) and I/O surface here.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FormError {
    /// The `data-rules` declaration of a control could not be parsed.
    #[error("invalid rule declaration on '{control}': {source}")]
    RuleDeclaration {
        /// Name or id of the control carrying the declaration.
        control: String,
        #[source]
        source: serde_json::Error,
    },

    /// A node id does not refer to a live element.
    #[error("unknown control: {0}")]
    UnknownControl(String),

    /// Engine configuration failed validation.
    #[error("invalid configuration: {message}")]
    Config {
        /// What was wrong with the configuration.
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FormError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FormError>;
