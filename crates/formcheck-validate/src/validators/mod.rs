//! Stock validators.
//!
//! Each module registers plain synchronous checks. Asynchronous rules never
//! reach a validator; the orchestrator dispatches them instead.

mod base;
mod custom;

pub use custom::{
    CONTAINS_NUMBER, CZECH_COMPANY_IDENTIFIER, PHONE, REMOTE, RULE_PROXY,
    is_czech_company_identifier,
};

use crate::evaluator::ValidatorRegistry;

/// Register every stock validator.
pub fn register_builtins(registry: &mut ValidatorRegistry) {
    base::register(registry);
    custom::register(registry);
}
