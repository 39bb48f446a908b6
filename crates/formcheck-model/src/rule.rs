//! Rule declarations and their normalized form.
//!
//! A [`RuleDescriptor`] is what the server emits into the `data-rules`
//! attribute of a control. A [`RuleNode`] is the canonical shape the engine
//! walks: flat operation name, derived flags and one message map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One rule as declared by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    /// Namespaced operation, optionally prefixed with `~` for negation.
    pub op: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub arg: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<MessageSpec>,
    /// Present on conditional rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleDescriptor>>,
    /// Name of another control the rule is evaluated against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<String>,
}

impl RuleDescriptor {
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            arg: Value::Null,
            msg: None,
            rules: None,
            control: None,
        }
    }

    #[must_use]
    pub fn with_arg(mut self, arg: Value) -> Self {
        self.arg = arg;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.msg = Some(MessageSpec::Text(message.into()));
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: Vec<RuleDescriptor>) -> Self {
        self.rules = Some(rules);
        self
    }

    #[must_use]
    pub fn with_control(mut self, control: impl Into<String>) -> Self {
        self.control = Some(control.into());
        self
    }
}

/// Message declaration: a bare string means the `invalid` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageSpec {
    Text(String),
    ByOutcome(BTreeMap<String, String>),
}

/// Outcome key to display text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageMap(BTreeMap<String, String>);

impl MessageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Message for an outcome; empty strings count as absent.
    pub fn get(&self, outcome: &str) -> Option<&str> {
        self.0
            .get(outcome)
            .map(String::as_str)
            .filter(|m| !m.is_empty())
    }

    pub fn insert(&mut self, outcome: impl Into<String>, message: impl Into<String>) {
        self.0.insert(outcome.into(), message.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl From<BTreeMap<String, String>> for MessageMap {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<MessageSpec> for MessageMap {
    fn from(spec: MessageSpec) -> Self {
        match spec {
            MessageSpec::Text(text) => {
                let mut map = Self::new();
                map.insert(crate::OutcomeStatus::INVALID, text);
                map
            }
            MessageSpec::ByOutcome(map) => Self(map),
        }
    }
}

/// Normalized rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleNode {
    /// Flat operation name (`FormcheckRules_phone`, `minLength`, ...).
    pub operation: String,
    pub negated: bool,
    pub argument: Value,
    pub messages: MessageMap,
    /// Advisory rule: failure is informational only.
    pub optional: bool,
    /// Resolution needs a remote round trip.
    pub asynchronous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control: Option<String>,
    /// `Some` marks a conditional node, even when the list is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<RuleNode>>,
}

impl RuleNode {
    pub fn is_conditional(&self) -> bool {
        self.children.is_some()
    }

    pub fn children(&self) -> &[RuleNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Remote endpoint of an asynchronous rule.
    pub fn endpoint(&self) -> Option<&str> {
        if !self.asynchronous {
            return None;
        }
        Some(
            self.argument
                .get(RuleArgument::ENDPOINT)
                .and_then(Value::as_str)
                .unwrap_or_default(),
        )
    }

    /// Structured view of the argument.
    pub fn arguments(&self) -> RuleArgument {
        RuleArgument::from_value(&self.argument)
    }
}

impl From<&RuleNode> for RuleDescriptor {
    fn from(node: &RuleNode) -> Self {
        let op = if node.negated {
            format!("~{}", node.operation)
        } else {
            node.operation.clone()
        };
        Self {
            op,
            arg: node.argument.clone(),
            msg: (!node.messages.is_empty())
                .then(|| MessageSpec::ByOutcome(node.messages.clone().into_inner())),
            rules: node
                .children
                .as_ref()
                .map(|children| children.iter().map(RuleDescriptor::from).collect()),
            control: node.control.clone(),
        }
    }
}

/// Known keys of a structured rule argument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleArgument {
    pub optional: bool,
    pub endpoint: Option<String>,
    pub messages: BTreeMap<String, String>,
    /// Request parameter name to html id of the dependent control.
    pub dependent_inputs: BTreeMap<String, String>,
    pub context: Value,
}

impl RuleArgument {
    pub const OPTIONAL: &'static str = "optional";
    pub const ENDPOINT: &'static str = "ajaxUrl";
    pub const MESSAGES: &'static str = "msg";
    pub const DEPENDENT_INPUTS: &'static str = "dependentInputs";
    pub const CONTEXT: &'static str = "context";

    /// Lenient extraction; scalar arguments yield the default view.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        Self {
            optional: object.get(Self::OPTIONAL).is_some_and(is_truthy),
            endpoint: object
                .get(Self::ENDPOINT)
                .map(|v| v.as_str().unwrap_or_default().to_string()),
            messages: string_map(object.get(Self::MESSAGES)),
            dependent_inputs: string_map(object.get(Self::DEPENDENT_INPUTS)),
            context: object.get(Self::CONTEXT).cloned().unwrap_or(Value::Null),
        }
    }
}

/// Loose truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a scalar JSON value the way it would appear in an input.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .filter_map(|(k, v)| value_to_string(v).map(|s| (k.clone(), s)))
                .collect()
        })
        .unwrap_or_default()
}
