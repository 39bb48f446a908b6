//! Checks shipped with the server-side rule set.

use std::sync::LazyLock;

use regex::Regex;

use crate::evaluator::ValidatorRegistry;

/// Value contains at least one digit (e.g. a house number in a street).
pub const CONTAINS_NUMBER: &str = "FormcheckRules_containsNumber";
/// International phone number, `+420 123 456 789` style.
pub const PHONE: &str = "FormcheckRules_phone";
/// Czech company identifier (IČO) checksum.
pub const CZECH_COMPANY_IDENTIFIER: &str = "FormcheckRules_czechCompanyIdentifier";
/// Evaluates another operation named in the argument context.
pub const RULE_PROXY: &str = "FormcheckRules_ruleProxy";
/// Remote check; always declared with an endpoint, never evaluated locally.
pub const REMOTE: &str = "FormcheckRules_remote";

static DIGIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Invalid digit regex"));

static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+[0-9]{3} ?[1-9][0-9]{2} ?[0-9]{3} ?[0-9]{3}$").expect("Invalid phone regex")
});

pub(super) fn register(registry: &mut ValidatorRegistry) {
    registry.insert(CONTAINS_NUMBER, |_, _, value| DIGIT_REGEX.is_match(value));
    registry.insert(PHONE, |_, _, value| PHONE_REGEX.is_match(value));
    registry.insert(CZECH_COMPANY_IDENTIFIER, |_, _, value| {
        is_czech_company_identifier(value)
    });
}

/// Eight digits (whitespace ignored) with a mod-11 check digit.
pub fn is_czech_company_identifier(value: &str) -> bool {
    let digits: Vec<u32> = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_digit(10))
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default();
    if digits.len() != 8 {
        return false;
    }

    let weighted: u32 = digits[..7]
        .iter()
        .zip((2..=8).rev())
        .map(|(digit, weight)| digit * weight)
        .sum();
    let check = match weighted % 11 {
        0 => 1,
        1 => 0,
        rest => 11 - rest,
    };
    digits[7] == check
}
