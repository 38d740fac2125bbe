//! Node types: NodeId, NodeKind, NodeData.

use std::borrow::Cow;

use slotmap::new_key_type;

new_key_type! {
    /// Unique identifier for a DOM node. Copy, lightweight (u64).
    pub struct NodeId;
}

/// How a shadow root was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowRootMode {
    Open,
    Closed,
    /// Engine-internal shadow tree (form controls, media elements).
    UserAgent,
}

/// What a node is. Only the document, elements and shadow roots take part in
/// styling; text is not modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    ShadowRoot(ShadowRootMode),
}

/// Data associated with a single DOM node.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    /// Lowercase tag name for elements, `#document` / `#shadow-root` otherwise.
    pub tag: String,
    /// Optional unique id (CSS #id selector).
    pub id: Option<String>,
    /// CSS classes (for .class selector).
    pub classes: Vec<String>,
    /// Remaining attributes in insertion order.
    pub attributes: Vec<(String, String)>,
    /// `:hover` state.
    pub hovered: bool,
    /// `:focus` state.
    pub focused: bool,
    /// `:disabled` state.
    pub disabled: bool,
    /// Whether a link element points at a visited URL.
    pub visited: bool,
    /// Shadow roots only: whether document author rules also apply inside.
    pub apply_author_styles: bool,
}

impl NodeData {
    fn with_kind(kind: NodeKind, tag: &str) -> Self {
        Self {
            kind,
            tag: tag.to_owned(),
            id: None,
            classes: Vec::new(),
            attributes: Vec::new(),
            hovered: false,
            focused: false,
            disabled: false,
            visited: false,
            apply_author_styles: false,
        }
    }

    /// Create an element with the given tag name and sensible defaults.
    pub fn element(tag: impl Into<String>) -> Self {
        let tag = tag.into().to_ascii_lowercase();
        Self::with_kind(NodeKind::Element, &tag)
    }

    pub(crate) fn document() -> Self {
        Self::with_kind(NodeKind::Document, "#document")
    }

    pub(crate) fn shadow_root(mode: ShadowRootMode) -> Self {
        Self::with_kind(NodeKind::ShadowRoot(mode), "#shadow-root")
    }

    /// Set the CSS id (builder).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a single CSS class (builder).
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        if !self.classes.contains(&class) {
            self.classes.push(class);
        }
        self
    }

    /// Add multiple CSS classes (builder).
    pub fn with_classes(mut self, classes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for class in classes {
            let class = class.into();
            if !self.classes.contains(&class) {
                self.classes.push(class);
            }
        }
        self
    }

    /// Set an attribute (builder). `id` and `class` go to their dedicated fields.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(&name.into(), &value.into());
        self
    }

    /// Set the hover state (builder).
    pub fn hovered(mut self, hovered: bool) -> Self {
        self.hovered = hovered;
        self
    }

    /// Set the focus state (builder).
    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    /// Set whether this node is disabled (builder).
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Mark a link as visited (builder).
    pub fn visited(mut self, visited: bool) -> Self {
        self.visited = visited;
        self
    }

    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    pub fn is_shadow_root(&self) -> bool {
        matches!(self.kind, NodeKind::ShadowRoot(_))
    }

    pub fn is_document(&self) -> bool {
        self.kind == NodeKind::Document
    }

    /// Whether this element is a hyperlink (`:link` / `:visited` candidate).
    pub fn is_link(&self) -> bool {
        matches!(self.tag.as_str(), "a" | "area" | "link") && self.attribute("href").is_some()
    }

    /// Look up an attribute value. `id` and `class` are reported too.
    pub fn attribute(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "id" => self.id.as_deref().map(Cow::Borrowed),
            "class" if self.classes.is_empty() => None,
            "class" => Some(Cow::Owned(self.classes.join(" "))),
            _ => self
                .attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| Cow::Borrowed(v.as_str())),
        }
    }

    /// Set an attribute, replacing any previous value.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "id" => self.id = Some(value.to_owned()),
            "class" => {
                self.classes.clear();
                for class in value.split_ascii_whitespace() {
                    self.add_class(class);
                }
            }
            _ => match self.attributes.iter_mut().find(|(n, _)| *n == name) {
                Some((_, v)) => *v = value.to_owned(),
                None => self.attributes.push((name, value.to_owned())),
            },
        }
    }

    /// Check whether this node has a given CSS class.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Add a CSS class. No-op if already present.
    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_owned());
        }
    }

    /// Remove a CSS class. No-op if not present.
    pub fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }
}
