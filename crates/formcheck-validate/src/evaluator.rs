//! Base rule evaluation.
//!
//! The orchestrator never evaluates a rule itself; it asks an injected
//! [`Evaluator`]. [`ValidatorRegistry`] is the stock implementation: a table
//! of synchronous validators keyed by flat operation name.

use std::collections::HashMap;
use std::fmt;

use formcheck_model::{Document, NodeId, RuleArgument, Verdict};
use serde_json::Value;

use crate::normalize::format_operation;
use crate::validators;

/// What a validator may look at besides the value.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub document: &'a Document,
    /// Control the rule is evaluated against.
    pub control: NodeId,
}

/// Evaluates one flat rule against one value.
pub trait Evaluator {
    fn evaluate(
        &self,
        ctx: &EvalContext<'_>,
        operation: &str,
        argument: &Value,
        value: &str,
    ) -> Verdict;
}

/// Synchronous validator function.
pub type Validator = Box<dyn Fn(&EvalContext<'_>, &Value, &str) -> bool>;

/// Registry of validators indexed by flat operation name.
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Validator>,
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.operations().collect();
        names.sort_unstable();
        f.debug_struct("ValidatorRegistry")
            .field("operations", &names)
            .finish()
    }
}

impl ValidatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    /// Registry preloaded with the base and custom validators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        validators::register_builtins(&mut registry);
        registry
    }

    /// Register a validator; replaces any previous one for the operation.
    pub fn insert<F>(&mut self, operation: impl Into<String>, validator: F)
    where
        F: Fn(&EvalContext<'_>, &Value, &str) -> bool + 'static,
    {
        self.validators.insert(operation.into(), Box::new(validator));
    }

    pub fn get(&self, operation: &str) -> Option<&Validator> {
        self.validators.get(operation)
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.validators.contains_key(operation)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    /// The rule proxy evaluates another registered operation, named by
    /// `context.rule`, with its own arguments from `context.ruleArgs`.
    fn evaluate_proxy(&self, ctx: &EvalContext<'_>, argument: &Value, value: &str) -> Verdict {
        let context = argument.get(RuleArgument::CONTEXT).unwrap_or(&Value::Null);
        let Some(target) = context.get("rule").and_then(Value::as_str) else {
            return Verdict::Valid;
        };
        let target_args = context.get("ruleArgs").unwrap_or(&Value::Null);
        match self.get(&format_operation(target)) {
            Some(validator) => Verdict::from_bool(validator(ctx, target_args, value)),
            None => Verdict::Valid,
        }
    }
}

impl Evaluator for ValidatorRegistry {
    fn evaluate(
        &self,
        ctx: &EvalContext<'_>,
        operation: &str,
        argument: &Value,
        value: &str,
    ) -> Verdict {
        if operation == validators::RULE_PROXY {
            return self.evaluate_proxy(ctx, argument, value);
        }
        match self.get(operation) {
            Some(validator) => Verdict::from_bool(validator(ctx, argument, value)),
            None => Verdict::Unhandled,
        }
    }
}
