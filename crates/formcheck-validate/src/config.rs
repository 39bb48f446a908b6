//! Engine configuration.
//!
//! Defaults reproduce the stock behaviour: five second request timeout,
//! timeouts give the user the benefit of the doubt, `formcheck-` class
//! prefix.

use std::path::Path;

use formcheck_model::{FormError, Result, Severity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Timeout handed to the transport with every remote check.
    pub request_timeout_ms: u64,
    /// Render timeouts of mandatory rules as errors instead of info. Only
    /// the severity changes; pending checks never block a form pass.
    pub timeout_severity_error: bool,
    pub markup: MarkupConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5000,
            timeout_severity_error: false,
            markup: MarkupConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(FormError::config("request_timeout_ms must be positive"));
        }
        let prefix = &self.markup.class_prefix;
        if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
            return Err(FormError::config(format!(
                "class_prefix must be a single non-empty token, got '{prefix}'"
            )));
        }
        Ok(())
    }
}

/// Class names of the CSS-visible contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkupConfig {
    pub class_prefix: String,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            class_prefix: "formcheck".to_string(),
        }
    }
}

impl MarkupConfig {
    /// Marks a control-scoped message placeholder.
    pub fn input_placeholder_class(&self) -> String {
        format!("{}-messages--input", self.class_prefix)
    }

    /// Marks the form-level message area.
    pub fn global_placeholder_class(&self) -> String {
        format!("{}-messages--global", self.class_prefix)
    }

    /// Carried by every rendered message.
    pub fn message_class(&self) -> String {
        format!("{}-message", self.class_prefix)
    }

    /// Severity class applied to placeholders.
    pub fn severity_class(&self, severity: Severity) -> String {
        format!("{}-{}", self.class_prefix, severity.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"timeout_severity_error": true}"#).expect("config");
        assert!(config.timeout_severity_error);
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.markup.class_prefix, "formcheck");
    }

    #[test]
    fn rejects_zero_timeout_and_bad_prefix() {
        let err = EngineConfig::from_json_str(r#"{"request_timeout_ms": 0}"#).expect_err("zero");
        assert!(matches!(err, FormError::Config { .. }));
        let err = EngineConfig::from_json_str(r#"{"markup": {"class_prefix": "a b"}}"#)
            .expect_err("prefix");
        assert!(err.to_string().contains("class_prefix"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(EngineConfig::from_json_str(r#"{"retries": 3}"#).is_err());
    }

    #[test]
    fn class_names_follow_prefix() {
        let markup = MarkupConfig {
            class_prefix: "pd".into(),
        };
        assert_eq!(markup.input_placeholder_class(), "pd-messages--input");
        assert_eq!(markup.severity_class(Severity::Info), "pd-info");
    }
}
