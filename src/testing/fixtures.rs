//! DOM fixtures for tests.

use crate::dom::{Dom, NodeData, NodeId, ShadowRootMode};

/// Builds a DOM top-down, descending into elements and shadow roots.
///
/// ```ignore
/// let mut tree = TreeBuilder::new();
/// let host = tree.open(NodeData::element("x-card"));
/// tree.shadow(ShadowRootMode::Open);
/// let title = tree.child(NodeData::element("h1"));
/// let dom = tree.finish();
/// ```
pub struct TreeBuilder {
    dom: Dom,
    stack: Vec<NodeId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        let dom = Dom::new();
        let stack = vec![dom.document()];
        Self { dom, stack }
    }

    /// The node new children are appended to.
    pub fn current(&self) -> NodeId {
        self.stack.last().copied().unwrap_or_else(|| self.dom.document())
    }

    /// Append a child to the current node and stay where we are.
    pub fn child(&mut self, data: NodeData) -> NodeId {
        self.dom.insert_child(self.current(), data)
    }

    /// Append a child to the current node and descend into it.
    pub fn open(&mut self, data: NodeData) -> NodeId {
        let id = self.child(data);
        self.stack.push(id);
        id
    }

    /// Attach a shadow root to the current element and descend into it.
    pub fn shadow(&mut self, mode: ShadowRootMode) -> NodeId {
        let root = self.dom.attach_shadow(self.current(), mode);
        self.stack.push(root);
        root
    }

    /// Return to the parent of the current node. The document is never left.
    pub fn close(&mut self) -> &mut Self {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        self
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn finish(self) -> Dom {
        self.dom
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A document with two nested shadow trees and a distributed light child:
///
/// ```text
/// document
/// └── div.a
///     └── x-host
///         ├── #shadow-root
///         │   ├── p.b
///         │   ├── slot
///         │   └── x-inner
///         │       └── #shadow-root
///         │           └── span.b
///         └── p.light.b
/// ```
pub struct ShadowFixture {
    pub dom: Dom,
    pub outer: NodeId,
    pub host: NodeId,
    pub root: NodeId,
    pub shadow_p: NodeId,
    pub slot: NodeId,
    pub inner_host: NodeId,
    pub inner_root: NodeId,
    pub inner_span: NodeId,
    pub light_p: NodeId,
}

impl ShadowFixture {
    pub fn new() -> Self {
        let mut tree = TreeBuilder::new();
        let outer = tree.open(NodeData::element("div").with_class("a"));
        let host = tree.open(NodeData::element("x-host"));

        let root = tree.shadow(ShadowRootMode::Open);
        let shadow_p = tree.child(NodeData::element("p").with_class("b"));
        let slot = tree.child(NodeData::element("slot"));
        let inner_host = tree.open(NodeData::element("x-inner"));
        let inner_root = tree.shadow(ShadowRootMode::Open);
        let inner_span = tree.child(NodeData::element("span").with_class("b"));
        tree.close().close().close();

        let light_p = tree.child(NodeData::element("p").with_classes(["light", "b"]));

        Self {
            dom: tree.finish(),
            outer,
            host,
            root,
            shadow_p,
            slot,
            inner_host,
            inner_root,
            inner_span,
            light_p,
        }
    }
}

impl Default for ShadowFixture {
    fn default() -> Self {
        Self::new()
    }
}
