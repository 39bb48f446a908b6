//! Message and state reconciliation.
//!
//! Placeholder lookup for a control, in order:
//! 1. closest ancestor carrying the input placeholder class,
//! 2. closest `p`,
//! 3. the global placeholder of the enclosing form.
//!
//! The lookup runs on every call because fragments of the page may have
//! been replaced since the last one. Messages are tagged with the owning
//! control's name so several controls can share one placeholder.

use formcheck_model::dom::attr;
use formcheck_model::{Document, NodeId, Severity};
use tracing::trace;

use crate::config::MarkupConfig;

/// A message currently rendered in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub node: NodeId,
    /// Name of the owning control.
    pub owner: String,
    pub severity: Option<Severity>,
    pub text: String,
    pub async_originated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    markup: MarkupConfig,
}

impl Reconciler {
    pub fn new(markup: MarkupConfig) -> Self {
        Self { markup }
    }

    pub fn markup(&self) -> &MarkupConfig {
        &self.markup
    }

    /// Control-scoped placeholder, if any.
    pub fn input_placeholder(&self, doc: &Document, control: NodeId) -> Option<NodeId> {
        let class = self.markup.input_placeholder_class();
        doc.closest(control, |e| e.has_class(&class))
            .or_else(|| doc.closest(control, |e| e.tag() == "p"))
    }

    /// Form-level placeholder of the control's form.
    pub fn global_placeholder(&self, doc: &Document, control: NodeId) -> Option<NodeId> {
        let class = self.markup.global_placeholder_class();
        let form = doc.form_of(control)?;
        doc.find(form, |e| e.has_class(&class)).into_iter().next()
    }

    /// Mark the control's placeholder with `severity` and render `text`.
    ///
    /// Returns the rendered message node. Nothing is rendered for empty
    /// text, or for an error when the control-scoped placeholder already
    /// shows one.
    pub fn show_message(
        &self,
        doc: &mut Document,
        control: NodeId,
        text: Option<&str>,
        severity: Severity,
        async_originated: bool,
    ) -> Option<NodeId> {
        let mut placeholder = self.input_placeholder(doc, control);
        if let Some(scoped) = placeholder {
            doc.add_class(scoped, &self.markup.severity_class(severity));
        }

        let text = text.filter(|t| !t.is_empty())?;

        let force_global = doc
            .attr(control, attr::MESSAGES_GLOBAL)
            .is_some_and(is_truthy_attr);
        let mut global = false;
        if (force_global || placeholder.is_none())
            && let Some(area) = self.global_placeholder(doc, control)
        {
            placeholder = Some(area);
            global = true;
        }
        let placeholder = placeholder?;

        if !global && severity.is_exclusive() && self.has_error_message(doc, placeholder) {
            trace!(control = %control, "error message suppressed, placeholder already shows one");
            return None;
        }

        let default_tag = if global { "p" } else { "label" };
        let tag = doc
            .attr(placeholder, attr::MESSAGES_TAGNAME)
            .filter(|t| !t.is_empty())
            .unwrap_or(default_tag)
            .to_string();

        let message = doc.create_element(&tag);
        if tag == "p" {
            doc.add_class(message, "message");
            doc.add_class(message, &format!("message--{severity}"));
        } else {
            doc.add_class(message, &format!("inp-{severity}"));
        }
        doc.add_class(message, &self.markup.message_class());
        let owner = doc.control_name(control).to_string();
        doc.set_attr(message, attr::MESSAGE_OWNER, &owner);
        doc.set_attr(message, attr::MESSAGE_SEVERITY, severity.as_str());
        if async_originated {
            doc.set_attr(message, attr::ASYNC_RULE, "true");
        }
        if tag == "label"
            && let Some(id) = doc.attr(control, attr::ID).map(str::to_string)
        {
            doc.set_attr(message, attr::FOR, &id);
        }
        doc.set_text(message, text);

        let prepend = doc
            .attr(placeholder, attr::MESSAGES_PREPEND)
            .is_some_and(is_truthy_attr);
        if prepend {
            doc.prepend_child(placeholder, message);
        } else {
            doc.append_child(placeholder, message);
        }
        Some(message)
    }

    /// Remove the control's messages from its placeholder and the global
    /// area, optionally keeping async-originated ones. Returns how many were
    /// removed.
    pub fn clear_messages(&self, doc: &mut Document, control: NodeId, include_async: bool) -> usize {
        self.remove_messages(doc, control, |from_async| include_async || !from_async)
    }

    /// Remove only the control's async-originated messages.
    pub fn clear_async_messages(&self, doc: &mut Document, control: NodeId) -> usize {
        self.remove_messages(doc, control, |from_async| from_async)
    }

    fn remove_messages(
        &self,
        doc: &mut Document,
        control: NodeId,
        select: impl Fn(bool) -> bool,
    ) -> usize {
        let owner = doc.control_name(control).to_string();
        let input = self.input_placeholder(doc, control);
        let global = self.global_placeholder(doc, control);
        let message_class = self.markup.message_class();

        let mut doomed = Vec::new();
        let mut remaining_in_input = 0usize;
        for (scope, is_input) in [(input, true), (global, false)] {
            let Some(scope) = scope else {
                continue;
            };
            for message in doc.find(scope, |e| e.has_class(&message_class)) {
                let owned = doc.attr(message, attr::MESSAGE_OWNER) == Some(owner.as_str());
                let from_async = doc.has_attr(message, attr::ASYNC_RULE);
                if owned && select(from_async) {
                    if !doomed.contains(&message) {
                        doomed.push(message);
                    }
                } else if is_input {
                    remaining_in_input += 1;
                }
            }
        }

        if let Some(scoped) = input
            && remaining_in_input == 0
        {
            for severity in Severity::all() {
                doc.remove_class(scoped, &self.markup.severity_class(*severity));
            }
        }

        for message in &doomed {
            doc.remove(*message);
        }
        doomed.len()
    }

    /// Rendered messages under `scope`, in document order.
    pub fn messages(&self, doc: &Document, scope: NodeId) -> Vec<RenderedMessage> {
        let message_class = self.markup.message_class();
        doc.find(scope, |e| e.has_class(&message_class))
            .into_iter()
            .map(|node| RenderedMessage {
                node,
                owner: doc
                    .attr(node, attr::MESSAGE_OWNER)
                    .unwrap_or_default()
                    .to_string(),
                severity: doc
                    .attr(node, attr::MESSAGE_SEVERITY)
                    .and_then(Severity::parse),
                text: doc.text(node).to_string(),
                async_originated: doc.has_attr(node, attr::ASYNC_RULE),
            })
            .collect()
    }

    /// Rendered messages owned by `control`, wherever they were placed.
    pub fn messages_for(&self, doc: &Document, control: NodeId) -> Vec<RenderedMessage> {
        let owner = doc.control_name(control);
        let scope = doc.form_of(control).unwrap_or(doc.root());
        self.messages(doc, scope)
            .into_iter()
            .filter(|m| m.owner == owner)
            .collect()
    }

    /// Severity classes currently set on the control-scoped placeholder.
    pub fn placeholder_state(&self, doc: &Document, control: NodeId) -> Vec<Severity> {
        let Some(scoped) = self.input_placeholder(doc, control) else {
            return Vec::new();
        };
        Severity::all()
            .iter()
            .copied()
            .filter(|s| doc.has_class(scoped, &self.markup.severity_class(*s)))
            .collect()
    }

    fn has_error_message(&self, doc: &Document, placeholder: NodeId) -> bool {
        let message_class = self.markup.message_class();
        doc.find(placeholder, |e| {
            e.has_class(&message_class) && e.attr(attr::MESSAGE_SEVERITY) == Some("error")
        })
        .into_iter()
        .next()
        .is_some()
    }
}

fn is_truthy_attr(value: &str) -> bool {
    !matches!(value.trim(), "" | "0" | "false")
}
