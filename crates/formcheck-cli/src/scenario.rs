//! Scenario replay.
//!
//! A scenario is a form (as a JSON element tree) plus the ordered steps a
//! user would take. Remote checks are answered by `respond` steps, oldest
//! outstanding request of the named control first.

use std::path::Path;

use anyhow::{Context, Result, bail};
use formcheck_model::rule::value_to_string;
use formcheck_model::{
    Document, Markup, NodeId, RemoteCompletion, RemoteResponse, Severity, is_truthy,
};
use formcheck_validate::{
    EngineConfig, FormEvent, FormValidator, QueuedTransport, RenderedMessage, is_bound,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use crate::logging::redact_value;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub form: Markup,
    /// Engine configuration used unless one is given on the command line.
    #[serde(default)]
    pub config: Option<EngineConfig>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read scenario {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse scenario {}", path.display()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Focus {
        control: String,
    },
    Blur {
        control: String,
    },
    Change {
        control: String,
    },
    /// Set the control's value; checkboxes and radios take a truthy value
    /// as checked.
    Input {
        control: String,
        value: serde_json::Value,
    },
    /// Complete the oldest outstanding remote check of the control.
    Respond {
        control: String,
        #[serde(default)]
        response: Option<RemoteResponse>,
        /// Transport failure status text.
        #[serde(default)]
        failure: Option<String>,
        #[serde(default)]
        timeout: bool,
    },
    Submit,
}

/// End state of a replay.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Outcome of the last submit step, if any.
    pub submitted: Option<bool>,
    /// Remote checks still waiting for a response.
    pub pending: usize,
    pub controls: Vec<ControlReport>,
}

impl ReplayReport {
    pub fn is_blocked(&self) -> bool {
        self.submitted == Some(false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlReport {
    pub control: String,
    pub value: String,
    /// Severity classes on the control's placeholder.
    pub state: Vec<Severity>,
    pub loading: bool,
    pub messages: Vec<MessageReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageReport {
    pub severity: Option<Severity>,
    pub text: String,
    #[serde(rename = "async")]
    pub async_originated: bool,
}

impl From<RenderedMessage> for MessageReport {
    fn from(message: RenderedMessage) -> Self {
        Self {
            severity: message.severity,
            text: message.text,
            async_originated: message.async_originated,
        }
    }
}

/// Run every step of the scenario against a fresh engine.
pub fn replay(scenario: &Scenario, config: EngineConfig) -> Result<ReplayReport> {
    let span = info_span!("replay", scenario = scenario.name.as_deref().unwrap_or("unnamed"));
    let _guard = span.enter();

    let mut doc = Document::from_markup(&scenario.form);
    let form = doc
        .find(doc.root(), |e| e.tag() == "form")
        .into_iter()
        .next()
        .unwrap_or(doc.root());
    let mut validator = FormValidator::with_builtins(config, QueuedTransport::new());
    let mut submitted = None;

    for (index, step) in scenario.steps.iter().enumerate() {
        run_step(&mut validator, &mut doc, form, step, &mut submitted)
            .with_context(|| format!("step {}", index + 1))?;
    }

    let controls = doc
        .controls(form)
        .into_iter()
        .filter(|c| is_bound(&doc, *c))
        .map(|control| control_report(&validator, &doc, control))
        .collect();
    Ok(ReplayReport {
        name: scenario.name.clone(),
        submitted,
        pending: validator.queue().len(),
        controls,
    })
}

fn run_step(
    validator: &mut FormValidator<QueuedTransport>,
    doc: &mut Document,
    form: NodeId,
    step: &Step,
    submitted: &mut Option<bool>,
) -> Result<()> {
    match step {
        Step::Focus { control } => emit(validator, doc, control, &FormEvent::Focus),
        Step::Blur { control } => emit(validator, doc, control, &FormEvent::Blur),
        Step::Change { control } => emit(validator, doc, control, &FormEvent::Change),
        Step::Input { control, value } => {
            let node = doc.require_by_id(control)?;
            let is_checkable = doc.control_kind(node).is_some_and(|k| k.is_checkable());
            if is_checkable {
                doc.set_checked(node, is_truthy(value));
            } else {
                let text = value_to_string(value).unwrap_or_default();
                info!(control = %control, value = redact_value(&text), "input");
                doc.set_value(node, &text);
            }
            Ok(())
        }
        Step::Respond {
            control,
            response,
            failure,
            timeout,
        } => {
            let completion = match (response, failure, *timeout) {
                (Some(response), None, false) => RemoteCompletion::Response(response.clone()),
                (None, Some(text), false) => RemoteCompletion::Failed(text.clone()),
                (None, None, true) => RemoteCompletion::TimedOut,
                _ => bail!("respond needs exactly one of response, failure or timeout"),
            };
            let Some(request) = validator.transport_mut().take_for(control) else {
                bail!("no outstanding remote check for '{control}'");
            };
            let live = validator.resolve(doc, &request.ticket, completion)?;
            info!(control = %control, url = %request.url, live, "respond");
            Ok(())
        }
        Step::Submit => {
            let valid = validator.validate_form(doc, form)?;
            info!(valid, pending = validator.queue().len(), "submit");
            *submitted = Some(valid);
            Ok(())
        }
    }
}

fn emit(
    validator: &mut FormValidator<QueuedTransport>,
    doc: &mut Document,
    control: &str,
    event: &FormEvent,
) -> Result<()> {
    let node = doc.require_by_id(control)?;
    let outcome = validator.handle_event(doc, node, event)?;
    debug!(control = %control, event = %event, ?outcome, "event");
    Ok(())
}

fn control_report(
    validator: &FormValidator<QueuedTransport>,
    doc: &Document,
    control: NodeId,
) -> ControlReport {
    let reconciler = validator.reconciler();
    ControlReport {
        control: doc.control_name(control).to_string(),
        value: doc.effective_value(control),
        state: reconciler.placeholder_state(doc, control),
        loading: validator.is_loading(control),
        messages: reconciler
            .messages_for(doc, control)
            .into_iter()
            .map(MessageReport::from)
            .collect(),
    }
}
