//! Rule normalizer.
//!
//! Converts server rule declarations into [`RuleNode`] trees: flat operation
//! names, optional/asynchronous flags and a single message map per rule.
//! Normalizing the descriptor form of an already normalized tree yields the
//! same tree.

use formcheck_model::{
    FormError, MessageMap, RuleArgument, RuleDescriptor, RuleNode, is_truthy,
};
use serde_json::Value;

/// Collapse a namespaced operation into a flat identifier.
///
/// `Formcheck\Rules::phone` becomes `FormcheckRules_phone` and `:filled`
/// becomes `filled`. Only one leading `:` and the first `::` are rewritten,
/// so the result is stable for operations with a single class separator.
pub fn format_operation(op: &str) -> String {
    let op = op.strip_prefix(':').unwrap_or(op);
    op.replacen("::", "_", 1).replace('\\', "")
}

/// Advisory rule: structured argument with a truthy `optional` field.
pub fn is_optional_rule(arg: &Value) -> bool {
    arg.as_object()
        .and_then(|object| object.get(RuleArgument::OPTIONAL))
        .is_some_and(is_truthy)
}

/// Asynchronous rule: structured argument carrying a remote endpoint key.
pub fn is_async_rule(arg: &Value) -> bool {
    arg.as_object()
        .is_some_and(|object| object.contains_key(RuleArgument::ENDPOINT))
}

/// Normalize a list of declarations, recursing into conditional children.
pub fn normalize<I>(rules: I) -> Vec<RuleNode>
where
    I: IntoIterator<Item = RuleDescriptor>,
{
    rules.into_iter().map(normalize_rule).collect()
}

/// Normalize one declaration.
pub fn normalize_rule(rule: RuleDescriptor) -> RuleNode {
    let (negated, op) = match rule.op.strip_prefix('~') {
        Some(rest) => (true, rest),
        None => (false, rule.op.as_str()),
    };
    let operation = format_operation(op);

    let mut messages = rule.msg.map(MessageMap::from).unwrap_or_default();
    if let Some(overrides) = rule
        .arg
        .get(RuleArgument::MESSAGES)
        .and_then(Value::as_object)
    {
        for (outcome, message) in overrides {
            if let Some(text) = message.as_str() {
                messages.insert(outcome.clone(), text);
            }
        }
    }

    RuleNode {
        operation,
        negated,
        optional: is_optional_rule(&rule.arg),
        asynchronous: is_async_rule(&rule.arg),
        messages,
        control: rule.control,
        children: rule.rules.map(normalize),
        argument: rule.arg,
    }
}

/// Parse and normalize a JSON rule declaration.
///
/// `control` only labels the error.
pub fn parse_rules(control: &str, json: &str) -> Result<Vec<RuleNode>, FormError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let raw: Vec<RuleDescriptor> =
        serde_json::from_str(json).map_err(|source| FormError::RuleDeclaration {
            control: control.to_string(),
            source,
        })?;
    Ok(normalize(raw))
}

/// True when any rule in the tree is asynchronous.
pub fn has_async_rule(rules: &[RuleNode]) -> bool {
    rules
        .iter()
        .any(|rule| rule.asynchronous || has_async_rule(rule.children()))
}

/// First rule with the given flat operation, depth first.
pub fn rule_by_operation<'a>(rules: &'a [RuleNode], operation: &str) -> Option<&'a RuleNode> {
    rules.iter().find_map(|rule| {
        if rule.operation == operation {
            Some(rule)
        } else {
            rule_by_operation(rule.children(), operation)
        }
    })
}
