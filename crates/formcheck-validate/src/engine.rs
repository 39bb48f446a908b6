//! Control validation orchestrator.
//!
//! [`FormValidator`] walks a control's normalized rule list, evaluates
//! synchronous rules through the injected [`Evaluator`], dispatches
//! asynchronous ones through the [`Transport`] and keeps the rendered
//! messages in step with the outcome.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

use formcheck_model::dom::attr;
use formcheck_model::{
    ControlKind, Document, NodeId, OutcomeStatus, RemoteCompletion, RemoteResponse, Result,
    RuleArgument, RuleNode, Severity,
};
use tracing::{debug, trace, warn};

use crate::binder::FormEvent;
use crate::config::EngineConfig;
use crate::dispatch::{RemoteRequest, Transport, control_identity, request_parameters};
use crate::effects::SideEffects;
use crate::evaluator::{EvalContext, Evaluator, ValidatorRegistry};
use crate::normalize::{has_async_rule, parse_rules};
use crate::queue::{PendingEntry, PendingKey, PendingQueue, PendingTicket};
use crate::reconcile::Reconciler;

/// Pseudo-operation that makes the remaining plain rules conditional on the
/// control being filled.
pub const OPTIONAL_OPERATION: &str = "optional";

/// Placeholder in message text replaced by the evaluated value.
const VALUE_PLACEHOLDER: &str = "%value";

/// Ephemeral per-control state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlState {
    /// The user focused or changed the control at least once.
    pub ever_focused: bool,
    /// Outstanding remote checks.
    pub pending: BTreeSet<PendingKey>,
}

pub struct FormValidator<T> {
    config: EngineConfig,
    evaluator: Box<dyn Evaluator>,
    side_effects: SideEffects,
    transport: T,
    reconciler: Reconciler,
    queue: PendingQueue,
    states: HashMap<NodeId, ControlState>,
}

impl<T: fmt::Debug> fmt::Debug for FormValidator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormValidator")
            .field("config", &self.config)
            .field("side_effects", &self.side_effects)
            .field("transport", &self.transport)
            .field("queue", &self.queue)
            .field("states", &self.states.len())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> FormValidator<T> {
    pub fn new(config: EngineConfig, evaluator: impl Evaluator + 'static, transport: T) -> Self {
        let reconciler = Reconciler::new(config.markup.clone());
        Self {
            config,
            evaluator: Box::new(evaluator),
            side_effects: SideEffects::new(),
            transport,
            reconciler,
            queue: PendingQueue::new(),
            states: HashMap::new(),
        }
    }

    /// Validator backed by the built-in validator registry.
    pub fn with_builtins(config: EngineConfig, transport: T) -> Self {
        Self::new(config, ValidatorRegistry::with_builtins(), transport)
    }

    #[must_use]
    pub fn with_side_effects(mut self, side_effects: SideEffects) -> Self {
        self.side_effects = side_effects;
        self
    }

    pub fn side_effects_mut(&mut self) -> &mut SideEffects {
        &mut self.side_effects
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn state(&self, control: NodeId) -> Option<&ControlState> {
        self.states.get(&control)
    }

    pub fn mark_focused(&mut self, control: NodeId) {
        self.states.entry(control).or_default().ever_focused = true;
    }

    pub fn is_ever_focused(&self, control: NodeId) -> bool {
        self.state(control).is_some_and(|s| s.ever_focused)
    }

    /// The control has remote checks in flight.
    pub fn is_loading(&self, control: NodeId) -> bool {
        self.state(control).is_some_and(|s| !s.pending.is_empty())
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Normalized rules declared on the control; none when undeclared.
    pub fn rules_for(&self, doc: &Document, control: NodeId) -> Result<Vec<RuleNode>> {
        let declaration = doc.attr(control, attr::RULES).unwrap_or_default();
        parse_rules(doc.control_name(control), declaration)
    }

    /// Run one validation pass over `rules`.
    ///
    /// Returns false when a mandatory rule failed. Asynchronous rules pass
    /// provisionally; their outcome arrives through [`Self::resolve`].
    pub fn validate_control(
        &mut self,
        doc: &mut Document,
        control: NodeId,
        rules: &[RuleNode],
        only_check: bool,
    ) -> bool {
        if !only_check {
            self.reconciler.clear_messages(doc, control, false);
        }
        self.run_rules(doc, control, rules, only_check, false)
    }

    /// Validate the control's validation group, or the control alone.
    /// Controls never focused by the user are left alone.
    pub fn validate_input(&mut self, doc: &mut Document, control: NodeId) -> Result<bool> {
        let targets: Vec<NodeId> = match doc
            .attr(control, attr::VALIDATION_GROUP)
            .filter(|g| !g.is_empty())
        {
            Some(group) => {
                let scope = doc.form_of(control).unwrap_or(doc.root());
                doc.controls(scope)
                    .into_iter()
                    .filter(|c| doc.attr(*c, attr::VALIDATION_GROUP) == Some(group))
                    .collect()
            }
            None => vec![control],
        };

        let mut all_valid = true;
        for target in targets {
            if !self.is_ever_focused(target) {
                continue;
            }
            let rules = self.rules_for(doc, target)?;
            let valid = self.validate_control(doc, target, &rules, false);
            if valid && !has_async_rule(&rules) {
                self.reconciler
                    .show_message(doc, target, None, Severity::Valid, false);
            }
            all_valid &= valid;
        }
        Ok(all_valid)
    }

    /// Validate every control of the form that declares rules.
    ///
    /// Pending remote checks do not block the result.
    pub fn validate_form(&mut self, doc: &mut Document, form: NodeId) -> Result<bool> {
        self.prune_detached(doc);
        let mut seen_radios = BTreeSet::new();
        let mut all_valid = true;
        for control in doc.controls(form) {
            if !doc.has_attr(control, attr::RULES) {
                continue;
            }
            if doc.control_kind(control) == Some(ControlKind::Radio)
                && !seen_radios.insert(doc.control_name(control).to_string())
            {
                continue;
            }
            let rules = self.rules_for(doc, control)?;
            all_valid &= self.validate_control(doc, control, &rules, false);
        }
        debug!(form = %form, valid = all_valid, "form validated");
        Ok(all_valid)
    }

    /// Apply the completion of a dispatched check.
    ///
    /// Returns false when the ticket no longer matches a pending entry; such
    /// completions leave the document untouched.
    pub fn resolve(
        &mut self,
        doc: &mut Document,
        ticket: &PendingTicket,
        completion: RemoteCompletion,
    ) -> Result<bool> {
        let Some(entry) = self.queue.take(ticket) else {
            debug!(
                key = %ticket.key,
                generation = ticket.generation,
                "dropping stale remote result"
            );
            return Ok(false);
        };
        let control = entry.control;
        if let Some(state) = self.states.get_mut(&control) {
            state.pending.remove(&ticket.key);
        }
        // Side effects target the control, so a removed control gets none.
        if !doc.contains(control) {
            debug!(key = %ticket.key, "control left the document before its check resolved");
            self.states.remove(&control);
            return Ok(true);
        }

        let status = completion.status();
        let response = completion.response();
        debug!(key = %ticket.key, status = %status, "remote check resolved");

        if !entry.only_check {
            self.render_remote_outcome(doc, control, &entry, &status, response);
        }

        let argument = RuleArgument::from_value(&entry.argument);
        let cascade = match response {
            Some(response) => self.fill_dependent_inputs(doc, &argument, response),
            None => Ok(()),
        };

        if let Some(effect) = self.side_effects.get(&ticket.key.operation) {
            effect(doc, control, response, &entry.argument);
        }
        cascade.map(|()| true)
    }

    /// Drop per-control state of nodes no longer in the document.
    pub fn prune_detached(&mut self, doc: &Document) {
        let before = self.states.len();
        self.states.retain(|control, _| doc.contains(*control));
        let pruned = before - self.states.len();
        if pruned > 0 {
            trace!(pruned, "dropped state of removed controls");
        }
    }

    fn run_rules(
        &mut self,
        doc: &mut Document,
        control: NodeId,
        rules: &[RuleNode],
        only_check: bool,
        mut empty_optional: bool,
    ) -> bool {
        for rule in rules {
            if rule.operation == OPTIONAL_OPERATION && !rule.is_conditional() {
                empty_optional = doc.effective_value(control).is_empty();
                continue;
            }
            if empty_optional && !rule.is_conditional() && rule.operation != "filled" {
                continue;
            }

            let target = match rule.control.as_deref() {
                Some(name) => match find_control(doc, control, name) {
                    Some(target) => target,
                    None => {
                        trace!(control = name, "rule targets a missing control");
                        continue;
                    }
                },
                None => control,
            };

            if rule.asynchronous {
                if rule.is_conditional() {
                    warn!(
                        control = doc.control_name(control),
                        operation = %rule.operation,
                        "asynchronous rules cannot be conditions, ignoring"
                    );
                    continue;
                }
                self.dispatch(doc, control, rule, only_check);
                continue;
            }

            let value = doc.effective_value(target);
            let verdict = self.evaluator.evaluate(
                &EvalContext {
                    document: &*doc,
                    control: target,
                },
                &rule.operation,
                &rule.argument,
                &value,
            );
            let verdict = if rule.negated {
                verdict.negate()
            } else {
                verdict
            };
            let Some(holds) = verdict.as_bool() else {
                trace!(operation = %rule.operation, "no validator, skipping");
                continue;
            };

            let valid = if !rule.is_conditional() {
                holds
            } else if holds {
                let nested_optional = rule.operation != "blank" && empty_optional;
                self.run_rules(doc, control, rule.children(), only_check, nested_optional)
            } else {
                true
            };

            if !valid && !rule.is_conditional() && doc.is_disabled(target) {
                continue;
            }

            if !only_check {
                if !valid {
                    let text = rule
                        .messages
                        .get(OutcomeStatus::INVALID)
                        .map(|m| m.replace(VALUE_PLACEHOLDER, &value));
                    if text.is_some() {
                        self.reconciler.clear_async_messages(doc, control);
                    }
                    let severity = if rule.optional {
                        Severity::Info
                    } else {
                        Severity::Error
                    };
                    self.reconciler
                        .show_message(doc, control, text.as_deref(), severity, false);
                } else if let Some(text) = rule.messages.get(OutcomeStatus::VALID) {
                    let text = text.replace(VALUE_PLACEHOLDER, &value);
                    self.reconciler
                        .show_message(doc, control, Some(&text), Severity::Valid, false);
                }
            }

            if !valid && !rule.optional {
                return false;
            }
        }
        true
    }

    fn dispatch(&mut self, doc: &Document, control: NodeId, rule: &RuleNode, only_check: bool) {
        let argument = rule.arguments();
        let key = PendingKey::new(
            control_identity(doc, control),
            rule.operation.clone(),
            rule.endpoint().unwrap_or_default(),
        );
        let entry = PendingEntry::new(
            control,
            rule.messages.clone(),
            rule.optional,
            rule.argument.clone(),
        )
        .only_check(only_check);

        let (ticket, replaced) = self.queue.register(key.clone(), entry);
        if replaced.is_some() {
            debug!(key = %key, "superseding outstanding remote check");
        }
        self.states
            .entry(control)
            .or_default()
            .pending
            .insert(key.clone());

        let request = RemoteRequest {
            ticket,
            url: argument.endpoint.clone().unwrap_or_default(),
            timeout: Duration::from_millis(self.config.request_timeout_ms),
            parameters: request_parameters(doc, control, &argument),
            argument: rule.argument.clone(),
        };
        debug!(key = %key, url = %request.url, "dispatching remote check");
        self.transport.send(request);
    }

    fn render_remote_outcome(
        &self,
        doc: &mut Document,
        control: NodeId,
        entry: &PendingEntry,
        status: &OutcomeStatus,
        response: Option<&RemoteResponse>,
    ) {
        self.reconciler.clear_async_messages(doc, control);

        let text = response
            .and_then(RemoteResponse::message)
            .or_else(|| entry.messages.get(status.as_str()));
        match text {
            Some(text) => {
                let mut severity = response
                    .and_then(RemoteResponse::severity)
                    .unwrap_or_else(|| self.default_severity(status));
                if entry.optional && severity == Severity::Error {
                    severity = Severity::Info;
                }
                self.reconciler
                    .show_message(doc, control, Some(text), severity, true);
            }
            None if *status == OutcomeStatus::Valid => {
                self.reconciler
                    .show_message(doc, control, None, Severity::Valid, true);
            }
            None => trace!(status = %status, "no message for remote outcome"),
        }
    }

    fn default_severity(&self, status: &OutcomeStatus) -> Severity {
        match status {
            OutcomeStatus::Valid => Severity::Valid,
            OutcomeStatus::Timeout if !self.config.timeout_severity_error => Severity::Info,
            _ => Severity::Error,
        }
    }

    /// Copy server-provided values into empty dependent controls, then
    /// revalidate them as if the user had changed them. Every dependent is
    /// processed; the first revalidation error is returned.
    fn fill_dependent_inputs(
        &mut self,
        doc: &mut Document,
        argument: &RuleArgument,
        response: &RemoteResponse,
    ) -> Result<()> {
        if !response.valid || argument.dependent_inputs.is_empty() {
            return Ok(());
        }
        let mut first_error = None;
        for html_id in argument.dependent_inputs.values() {
            let Some(value) = response.dependent_value(html_id) else {
                continue;
            };
            let Some(target) = doc.element_by_id(html_id) else {
                trace!(html_id = %html_id, "dependent control not in document");
                continue;
            };
            if !doc.value(target).is_empty() {
                debug!(html_id = %html_id, "dependent control already filled, keeping user value");
                continue;
            }
            doc.set_value(target, &value);
            debug!(html_id = %html_id, "filled dependent control");
            let revalidated = self
                .handle_event(doc, target, &FormEvent::Change)
                .and_then(|_| self.handle_event(doc, target, &FormEvent::Validate));
            if let Err(err) = revalidated {
                warn!(html_id = %html_id, error = %err, "dependent control failed to revalidate");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Control named `name` in the same form as `control`.
fn find_control(doc: &Document, control: NodeId, name: &str) -> Option<NodeId> {
    let scope = doc.form_of(control).unwrap_or(doc.root());
    doc.controls(scope)
        .into_iter()
        .find(|c| doc.attr(*c, attr::NAME) == Some(name))
}
