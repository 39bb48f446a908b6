//! Client-side validation engine for server-declared form rules.
//!
//! Rule declarations are normalized into [`RuleNode`](formcheck_model::RuleNode)
//! trees, evaluated per control by [`FormValidator`], and reconciled into
//! inline messages on a [`Document`](formcheck_model::Document). Remote
//! checks go out through a [`Transport`] and come back via
//! [`FormValidator::resolve`].

pub mod binder;
pub mod config;
pub mod dispatch;
pub mod effects;
pub mod engine;
pub mod evaluator;
pub mod normalize;
pub mod queue;
pub mod reconcile;
pub mod validators;

pub use binder::{FormEvent, is_bound, triggers};
pub use config::{EngineConfig, MarkupConfig};
pub use dispatch::{QueuedTransport, RemoteRequest, Transport};
pub use effects::{SideEffect, SideEffects};
pub use engine::{ControlState, FormValidator};
pub use evaluator::{EvalContext, Evaluator, ValidatorRegistry};
pub use normalize::{
    format_operation, has_async_rule, normalize, normalize_rule, parse_rules, rule_by_operation,
};
pub use queue::{PendingEntry, PendingKey, PendingQueue, PendingTicket};
pub use reconcile::{Reconciler, RenderedMessage};
