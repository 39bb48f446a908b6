//! Base operations every rule declaration may use.
//!
//! Semantics follow the server-side form library: lengths count characters,
//! `pattern` must match the whole value, numeric bounds accept `,` as the
//! decimal separator.

use std::sync::LazyLock;

use formcheck_model::dom::attr;
use regex::Regex;
use serde_json::Value;

use crate::evaluator::{EvalContext, ValidatorRegistry};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email regex")
});

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://\S+$").expect("Invalid url regex"));

static INTEGER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+$").expect("Invalid integer regex"));

static FLOAT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]*[.,]?[0-9]+$").expect("Invalid float regex"));

pub(super) fn register(registry: &mut ValidatorRegistry) {
    registry.insert("filled", |_, _, value| is_filled(value));
    registry.insert("blank", |_, _, value| !is_filled(value));
    registry.insert("valid", |_, _, _| true);
    registry.insert("equal", equal);
    registry.insert("notEqual", |ctx, arg, value| !equal(ctx, arg, value));
    registry.insert("minLength", |_, arg, value| {
        as_usize(arg).is_none_or(|min| char_len(value) >= min)
    });
    registry.insert("maxLength", |_, arg, value| {
        as_usize(arg).is_none_or(|max| char_len(value) <= max)
    });
    registry.insert("length", |_, arg, value| {
        let len = char_len(value);
        match arg {
            Value::Array(bounds) => {
                let min = bounds.first().and_then(as_usize);
                let max = bounds.get(1).and_then(as_usize);
                min.is_none_or(|min| len >= min) && max.is_none_or(|max| len <= max)
            }
            other => as_usize(other).is_none_or(|exact| len == exact),
        }
    });
    registry.insert("email", |_, _, value| EMAIL_REGEX.is_match(value));
    registry.insert("url", |_, _, value| URL_REGEX.is_match(value));
    registry.insert("pattern", pattern);
    registry.insert("integer", |_, _, value| INTEGER_REGEX.is_match(value));
    registry.insert("float", |_, _, value| FLOAT_REGEX.is_match(value));
    registry.insert("numeric", |_, _, value| FLOAT_REGEX.is_match(value));
    registry.insert("min", |_, arg, value| {
        in_range(value, as_f64(arg), None)
    });
    registry.insert("max", |_, arg, value| {
        in_range(value, None, as_f64(arg))
    });
    registry.insert("range", |_, arg, value| {
        let bounds = arg.as_array();
        let min = bounds.and_then(|b| b.first()).and_then(as_f64);
        let max = bounds.and_then(|b| b.get(1)).and_then(as_f64);
        in_range(value, min, max)
    });
}

fn is_filled(value: &str) -> bool {
    !value.is_empty()
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn as_usize(arg: &Value) -> Option<usize> {
    match arg {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(arg: &Value) -> Option<f64> {
    match arg {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse().ok()
}

fn in_range(value: &str, min: Option<f64>, max: Option<f64>) -> bool {
    let Some(number) = parse_number(value) else {
        return false;
    };
    min.is_none_or(|min| number >= min) && max.is_none_or(|max| number <= max)
}

/// Compare against scalars, any of an array, or another control
/// (`{"control": "<name>"}`).
fn equal(ctx: &EvalContext<'_>, arg: &Value, value: &str) -> bool {
    match arg {
        Value::Array(items) => items.iter().any(|item| equal(ctx, item, value)),
        Value::Object(object) => {
            let Some(name) = object.get("control").and_then(Value::as_str) else {
                return false;
            };
            let scope = ctx
                .document
                .form_of(ctx.control)
                .unwrap_or(ctx.document.root());
            ctx.document
                .find(scope, |e| e.attr(attr::NAME) == Some(name))
                .first()
                .is_some_and(|other| ctx.document.effective_value(*other) == value)
        }
        other => formcheck_model::rule::value_to_string(other).is_some_and(|s| s == value),
    }
}

/// Whole-value regex match; an unparsable pattern does not fail the value.
fn pattern(_ctx: &EvalContext<'_>, arg: &Value, value: &str) -> bool {
    let Some(source) = arg.as_str() else {
        return true;
    };
    match Regex::new(&format!("^(?:{source})$")) {
        Ok(regex) => regex.is_match(value),
        Err(_) => true,
    }
}
