//! In-memory document tree.
//!
//! The engine never talks to a real browser DOM. Hosts mirror the relevant
//! part of the page into a [`Document`] (or implement the same operations on
//! top of their own tree) and the reconciler mutates it.
//!
//! Invariants:
//! - Node ids are never reused; a removed node's id stays dead.
//! - A node has at most one parent; children are kept in document order.
//! - Class lists keep insertion order and never contain duplicates.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute names the engine reads or writes.
pub mod attr {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const VALUE: &str = "value";
    pub const TYPE: &str = "type";
    pub const CHECKED: &str = "checked";
    pub const DISABLED: &str = "disabled";
    pub const FOR: &str = "for";
    /// JSON rule declaration of a control.
    pub const RULES: &str = "data-rules";
    pub const VALIDATION_GROUP: &str = "data-validation-group";
    /// Space separated extra events that trigger validation.
    pub const VALIDATE_ON: &str = "data-validate-on";
    /// Forces messages of a control into the global placeholder.
    pub const MESSAGES_GLOBAL: &str = "data-messages--global";
    pub const MESSAGES_TAGNAME: &str = "data-messages-tagname";
    pub const MESSAGES_PREPEND: &str = "data-messages-prepend";
    /// Name of the control a rendered message belongs to.
    pub const MESSAGE_OWNER: &str = "data-elem";
    /// Present on messages produced by an asynchronous rule.
    pub const ASYNC_RULE: &str = "data-async-rule";
    /// Severity token of a rendered message.
    pub const MESSAGE_SEVERITY: &str = "data-severity";
}

const ROOT_TAG: &str = "#document";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Kind of form control, derived from tag and `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Text,
    TextArea,
    Select,
    Checkbox,
    Radio,
    /// Buttons, resets and submits; never validated.
    Button,
}

impl ControlKind {
    pub fn of(tag: &str, input_type: Option<&str>) -> Option<Self> {
        match tag {
            "textarea" => Some(Self::TextArea),
            "select" => Some(Self::Select),
            "button" => Some(Self::Button),
            "input" => Some(
                match input_type.unwrap_or("text").to_ascii_lowercase().as_str() {
                    "checkbox" => Self::Checkbox,
                    "radio" => Self::Radio,
                    "button" | "submit" | "reset" | "image" => Self::Button,
                    _ => Self::Text,
                },
            ),
            _ => None,
        }
    }

    pub fn is_checkable(&self) -> bool {
        matches!(self, Self::Checkbox | Self::Radio)
    }
}

/// Serializable element tree used to build documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markup {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Markup>,
}

impl Markup {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    #[must_use]
    pub fn child(mut self, child: Markup) -> Self {
        self.children.push(child);
        self
    }
}

/// Arena-backed element tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Option<Element>>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Element::new(ROOT_TAG))],
            root: NodeId(0),
        }
    }

    /// Build a document with `markup` as the only child of the root.
    pub fn from_markup(markup: &Markup) -> Self {
        let mut document = Self::new();
        document.append_markup(document.root, markup);
        document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Instantiate `markup` and append it under `parent`.
    pub fn append_markup(&mut self, parent: NodeId, markup: &Markup) -> NodeId {
        let node = self.create_element(&markup.tag);
        for class in &markup.classes {
            self.add_class(node, class);
        }
        for (name, value) in &markup.attributes {
            self.set_attr(node, name, value);
        }
        self.set_text(node, &markup.text);
        self.append_child(parent, node);
        for child in &markup.children {
            self.append_markup(node, child);
        }
        node
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Some(Element::new(tag)));
        NodeId(self.nodes.len() - 1)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0).and_then(Option::as_ref)
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(node.0).and_then(Option::as_mut)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.attach(parent, child, false);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.attach(parent, child, true);
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, front: bool) {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return;
        }
        if self.ancestors(parent).contains(&child) {
            return;
        }
        self.detach(child);
        if let Some(element) = self.element_mut(parent) {
            if front {
                element.children.insert(0, child);
            } else {
                element.children.push(child);
            }
        }
        if let Some(element) = self.element_mut(child) {
            element.parent = Some(parent);
        }
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(element) = self.element_mut(parent) {
            element.children.retain(|c| *c != node);
        }
        if let Some(element) = self.element_mut(node) {
            element.parent = None;
        }
    }

    /// Remove a node and its whole subtree. The root cannot be removed.
    pub fn remove(&mut self, node: NodeId) {
        if node == self.root || !self.contains(node) {
            return;
        }
        self.detach(node);
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(element) = self.nodes.get_mut(current.0).and_then(Option::take) {
                stack.extend(element.children);
            }
        }
    }

    pub fn tag(&self, node: NodeId) -> &str {
        self.element(node).map(Element::tag).unwrap_or_default()
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).and_then(|e| e.attr(name))
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(element) = self.element_mut(node) {
            element.attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(element) = self.element_mut(node) {
            element.attributes.remove(name);
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node).is_some_and(|e| e.has_class(class))
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(element) = self.element_mut(node)
            && !element.has_class(class)
        {
            element.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(element) = self.element_mut(node) {
            element.classes.retain(|c| c != class);
        }
    }

    pub fn text(&self, node: NodeId) -> &str {
        self.element(node).map(Element::text).unwrap_or_default()
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(element) = self.element_mut(node) {
            element.text = text.to_string();
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.element(node).and_then(|e| e.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.element(node).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    /// Ancestors, closest first, excluding `node`.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(node);
        while let Some(id) = current {
            out.push(id);
            current = self.parent(id);
        }
        out
    }

    /// `node` itself or its closest ancestor matching `predicate`.
    pub fn closest(&self, node: NodeId, predicate: impl Fn(&Element) -> bool) -> Option<NodeId> {
        std::iter::once(node)
            .chain(self.ancestors(node))
            .find(|id| self.element(*id).is_some_and(&predicate))
    }

    /// Descendants in document order, excluding `node`.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Descendants of `scope` matching `predicate`, in document order.
    pub fn find(&self, scope: NodeId, predicate: impl Fn(&Element) -> bool) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.element(*id).is_some_and(&predicate))
            .collect()
    }

    /// First element whose `id` attribute equals `html_id`.
    pub fn element_by_id(&self, html_id: &str) -> Option<NodeId> {
        self.find(self.root, |e| e.attr(attr::ID) == Some(html_id))
            .into_iter()
            .next()
    }

    /// Like [`Self::element_by_id`], failing for ids not in the document.
    pub fn require_by_id(&self, html_id: &str) -> crate::Result<NodeId> {
        self.element_by_id(html_id)
            .ok_or_else(|| crate::FormError::UnknownControl(html_id.to_string()))
    }

    /// Enclosing form of a node.
    pub fn form_of(&self, node: NodeId) -> Option<NodeId> {
        self.closest(node, |e| e.tag() == "form")
    }

    pub fn control_kind(&self, node: NodeId) -> Option<ControlKind> {
        self.element(node)
            .and_then(|e| ControlKind::of(e.tag(), e.attr(attr::TYPE)))
    }

    /// Validatable controls inside `scope`, in document order.
    pub fn controls(&self, scope: NodeId) -> Vec<NodeId> {
        self.find(scope, |e| {
            ControlKind::of(e.tag(), e.attr(attr::TYPE))
                .is_some_and(|kind| kind != ControlKind::Button)
        })
    }

    /// Control name, falling back to its id.
    pub fn control_name(&self, node: NodeId) -> &str {
        self.attr(node, attr::NAME)
            .or_else(|| self.attr(node, attr::ID))
            .unwrap_or_default()
    }

    pub fn value(&self, node: NodeId) -> &str {
        self.attr(node, attr::VALUE).unwrap_or_default()
    }

    pub fn set_value(&mut self, node: NodeId, value: &str) {
        self.set_attr(node, attr::VALUE, value);
    }

    pub fn is_checked(&self, node: NodeId) -> bool {
        self.has_attr(node, attr::CHECKED)
    }

    pub fn set_checked(&mut self, node: NodeId, checked: bool) {
        if checked {
            self.set_attr(node, attr::CHECKED, "checked");
        } else {
            self.remove_attr(node, attr::CHECKED);
        }
    }

    pub fn is_disabled(&self, node: NodeId) -> bool {
        self.has_attr(node, attr::DISABLED)
    }

    /// Value the control would submit.
    ///
    /// Checkboxes submit their value only when checked; a radio button
    /// reports the value of the checked button of its group.
    pub fn effective_value(&self, node: NodeId) -> String {
        match self.control_kind(node) {
            Some(ControlKind::Checkbox) => {
                if self.is_checked(node) {
                    self.attr(node, attr::VALUE).unwrap_or("on").to_string()
                } else {
                    String::new()
                }
            }
            Some(ControlKind::Radio) => {
                let name = self.control_name(node);
                let scope = self.form_of(node).unwrap_or(self.root);
                self.find(scope, |e| {
                    e.attr(attr::NAME) == Some(name) && e.attr(attr::CHECKED).is_some()
                })
                .into_iter()
                .next()
                .map(|checked| self.attr(checked, attr::VALUE).unwrap_or("on").to_string())
                .unwrap_or_default()
            }
            _ => self.value(node).to_string(),
        }
    }

    /// Render a subtree as HTML-like text.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(element) = self.element(node) else {
            return;
        };
        let is_root = node == self.root;
        if !is_root {
            out.push('<');
            out.push_str(&element.tag);
            if !element.classes.is_empty() {
                out.push_str(&format!(" class=\"{}\"", element.classes.join(" ")));
            }
            for (name, value) in &element.attributes {
                out.push_str(&format!(" {}=\"{}\"", name, escape(value)));
            }
            out.push('>');
        }
        out.push_str(&escape(&element.text));
        for child in &element.children {
            self.write_html(*child, out);
        }
        if !is_root {
            out.push_str(&format!("</{}>", element.tag));
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
