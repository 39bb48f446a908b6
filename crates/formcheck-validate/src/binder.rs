//! Event binding.
//!
//! Maps control events to validation passes. Which events trigger a pass
//! depends on the kind of control; `data-validate-on` adds more.

use std::fmt;

use formcheck_model::dom::attr;
use formcheck_model::{ControlKind, Document, NodeId, Result};
use tracing::trace;

use crate::dispatch::Transport;
use crate::engine::FormValidator;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormEvent {
    Focus,
    Blur,
    Change,
    /// Explicit request to validate the control.
    Validate,
    Custom(String),
}

impl FormEvent {
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "focus" => Self::Focus,
            "blur" => Self::Blur,
            "change" => Self::Change,
            "validate" => Self::Validate,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Focus => "focus",
            Self::Blur => "blur",
            Self::Change => "change",
            Self::Validate => "validate",
            Self::Custom(name) => name,
        }
    }

    /// Events after which the control counts as touched by the user.
    pub fn marks_focus(&self) -> bool {
        matches!(self, Self::Focus | Self::Change)
    }
}

impl fmt::Display for FormEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Controls declaring rules or a validation group take part in validation.
pub fn is_bound(doc: &Document, control: NodeId) -> bool {
    let validatable = doc
        .control_kind(control)
        .is_some_and(|kind| kind != ControlKind::Button);
    validatable
        && (doc.has_attr(control, attr::RULES) || doc.has_attr(control, attr::VALIDATION_GROUP))
}

/// Events that start a validation pass for the control.
pub fn triggers(doc: &Document, control: NodeId) -> Vec<FormEvent> {
    let mut events = vec![FormEvent::Validate];
    if let Some(extra) = doc.attr(control, attr::VALIDATE_ON) {
        events.extend(extra.split_whitespace().map(FormEvent::parse));
        return events;
    }
    match doc.control_kind(control) {
        Some(ControlKind::Checkbox | ControlKind::Radio) => events.push(FormEvent::Change),
        Some(ControlKind::Select) => events.extend([FormEvent::Blur, FormEvent::Change]),
        Some(_) => events.push(FormEvent::Blur),
        None => {}
    }
    events
}

impl<T: Transport> FormValidator<T> {
    /// Feed a control event into the engine.
    ///
    /// Returns the outcome of the validation pass the event triggered, if
    /// any. Events on unbound controls are ignored.
    pub fn handle_event(
        &mut self,
        doc: &mut Document,
        control: NodeId,
        event: &FormEvent,
    ) -> Result<Option<bool>> {
        if !is_bound(doc, control) {
            return Ok(None);
        }
        if event.marks_focus() {
            self.mark_focused(control);
        }
        if !triggers(doc, control).contains(event) {
            return Ok(None);
        }
        trace!(control = doc.control_name(control), event = %event, "validating on event");
        self.validate_input(doc, control).map(Some)
    }
}
