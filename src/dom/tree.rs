//! Tree operations: insert, remove, reparent, shadow roots, tree scopes, walks.
//!
//! A *tree scope* is the document or one shadow root. Light-tree parent links
//! stop at a shadow root; the root's host is reached through
//! [`Dom::parent_or_shadow_host`].

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::rc::Rc;

use slotmap::{SecondaryMap, SlotMap};

use super::node::{NodeData, NodeId, NodeKind, ShadowRootMode};

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeId] = &[];

/// The central DOM tree, backed by a slotmap arena.
///
/// All nodes live in a single `SlotMap`. Parent/child relationships are stored
/// in secondary maps so that node removal is O(subtree size) and lookup is O(1).
/// The document node is created with the tree and can never be removed.
pub struct Dom {
    pub(crate) nodes: SlotMap<NodeId, NodeData>,
    children: SecondaryMap<NodeId, Vec<NodeId>>,
    parent: SecondaryMap<NodeId, NodeId>,
    /// Host -> attached shadow roots, oldest first.
    shadow_roots: SecondaryMap<NodeId, Vec<NodeId>>,
    /// Shadow root -> host.
    host: SecondaryMap<NodeId, NodeId>,
    document: NodeId,
    /// Shadow-including document positions. Dropped on every structural
    /// change and rebuilt on the next order query.
    document_positions: RefCell<Option<Rc<SecondaryMap<NodeId, usize>>>>,
}

impl Dom {
    /// Create a DOM holding only the document node.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let document = nodes.insert(NodeData::document());
        let mut children = SecondaryMap::new();
        children.insert(document, Vec::new());
        Self {
            nodes,
            children,
            parent: SecondaryMap::new(),
            shadow_roots: SecondaryMap::new(),
            host: SecondaryMap::new(),
            document,
            document_positions: RefCell::new(None),
        }
    }

    /// The document node.
    pub fn document(&self) -> NodeId {
        self.document
    }

    /// Insert a node as a child of `parent` (the document, an element or a
    /// shadow root).
    ///
    /// # Panics
    ///
    /// Panics (debug) if `parent` does not exist in the tree.
    pub fn insert_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        debug_assert!(
            self.nodes.contains_key(parent),
            "parent node does not exist"
        );
        self.invalidate_document_positions();
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        self.parent.insert(id, parent);
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.push(id);
        }
        id
    }

    /// Attach a new shadow root to `host`. A host may carry several roots;
    /// the last attached is the youngest.
    pub fn attach_shadow(&mut self, host: NodeId, mode: ShadowRootMode) -> NodeId {
        debug_assert!(
            self.get(host).is_some_and(NodeData::is_element),
            "shadow host must be an element"
        );
        self.invalidate_document_positions();
        let root = self.nodes.insert(NodeData::shadow_root(mode));
        self.children.insert(root, Vec::new());
        self.host.insert(root, host);
        match self.shadow_roots.get_mut(host) {
            Some(roots) => roots.push(root),
            None => {
                self.shadow_roots.insert(host, vec![root]);
            }
        }
        tracing::trace!(?host, ?root, ?mode, "attached shadow root");
        root
    }

    /// Remove a node, its descendants and every shadow tree hosted inside.
    ///
    /// Returns the `NodeData` for the removed node, or `None` if it didn't
    /// exist or is the document.
    pub fn remove(&mut self, id: NodeId) -> Option<NodeData> {
        if !self.nodes.contains_key(id) || id == self.document {
            return None;
        }
        self.invalidate_document_positions();

        // Detach from parent's children list or host's shadow root list.
        if let Some(parent_id) = self.parent.remove(id) {
            if let Some(siblings) = self.children.get_mut(parent_id) {
                siblings.retain(|&child| child != id);
            }
        }
        if let Some(host) = self.host.remove(id) {
            if let Some(roots) = self.shadow_roots.get_mut(host) {
                roots.retain(|&root| root != id);
            }
        }

        // Collect all descendants (BFS) to remove them.
        let mut to_remove = VecDeque::new();
        to_remove.push_back(id);
        let mut removed_root_data = None;

        while let Some(current) = to_remove.pop_front() {
            // Queue children and shadow roots before removing.
            if let Some(kids) = self.children.remove(current) {
                to_remove.extend(kids);
            }
            if let Some(roots) = self.shadow_roots.remove(current) {
                to_remove.extend(roots);
            }
            self.parent.remove(current);
            self.host.remove(current);
            let data = self.nodes.remove(current);
            if current == id {
                removed_root_data = data;
            }
        }

        removed_root_data
    }

    /// Move `node` to become the last child of `new_parent`.
    ///
    /// The node keeps its subtree intact. If `node` was previously a child of
    /// another parent, it is detached first.
    ///
    /// # Panics
    ///
    /// Panics (debug) if either `node` or `new_parent` does not exist.
    pub fn reparent(&mut self, node: NodeId, new_parent: NodeId) {
        debug_assert!(self.nodes.contains_key(node), "node does not exist");
        debug_assert!(
            self.nodes.contains_key(new_parent),
            "new_parent does not exist"
        );
        debug_assert!(!self.host.contains_key(node), "shadow roots cannot be moved");
        self.invalidate_document_positions();

        // Detach from old parent.
        if let Some(old_parent) = self.parent.remove(node) {
            if let Some(siblings) = self.children.get_mut(old_parent) {
                siblings.retain(|&child| child != node);
            }
        }

        // Attach to new parent.
        self.parent.insert(node, new_parent);
        if let Some(siblings) = self.children.get_mut(new_parent) {
            siblings.push(node);
        }
    }

    // ── Light tree ───────────────────────────────────────────────────

    /// Get the light-tree parent of a node. Shadow roots and the document
    /// have none.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(id).copied()
    }

    /// The parent, if it is an element.
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id)
            .filter(|&p| self.get(p).is_some_and(NodeData::is_element))
    }

    /// The parent, or the host when `id` is a shadow root.
    pub fn parent_or_shadow_host(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).or_else(|| self.shadow_host(id))
    }

    /// Get the children of a node. Returns an empty slice if the node has no children
    /// or does not exist.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// Walk from `id` up to its tree scope root, collecting light-tree
    /// ancestors (immediate parent first).
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(p) = self.parent.get(current).copied() {
            result.push(p);
            current = p;
        }
        result
    }

    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let index = siblings.iter().position(|&s| s == id)?;
        siblings[..index]
            .iter()
            .rev()
            .copied()
            .find(|&s| self.get(s).is_some_and(NodeData::is_element))
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let index = siblings.iter().position(|&s| s == id)?;
        siblings[index + 1..]
            .iter()
            .copied()
            .find(|&s| self.get(s).is_some_and(NodeData::is_element))
    }

    // ── Shadow trees ─────────────────────────────────────────────────

    /// The host of a shadow root.
    pub fn shadow_host(&self, root: NodeId) -> Option<NodeId> {
        self.host.get(root).copied()
    }

    /// Shadow roots attached to `host`, oldest first.
    pub fn shadow_roots(&self, host: NodeId) -> &[NodeId] {
        self.shadow_roots
            .get(host)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    pub fn youngest_shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.shadow_roots(host).last().copied()
    }

    pub fn is_shadow_host(&self, id: NodeId) -> bool {
        !self.shadow_roots(id).is_empty()
    }

    // ── Tree scopes ──────────────────────────────────────────────────

    /// The tree scope `id` belongs to: the document or a shadow root.
    /// A tree scope node is its own scope.
    pub fn tree_scope(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(p) = self.parent(current) {
            current = p;
        }
        current
    }

    /// The tree scope enclosing `scope`'s host, or `None` for the document.
    pub fn parent_tree_scope(&self, scope: NodeId) -> Option<NodeId> {
        self.shadow_host(scope).map(|host| self.tree_scope(host))
    }

    /// Whether tree scope `ancestor` is `scope` or encloses it.
    pub fn tree_scope_is_inclusive_ancestor_of(&self, ancestor: NodeId, scope: NodeId) -> bool {
        let mut current = Some(scope);
        while let Some(s) = current {
            if s == ancestor {
                return true;
            }
            current = self.parent_tree_scope(s);
        }
        false
    }

    /// Whether `ancestor` is `node` or one of its ancestors, crossing shadow
    /// boundaries through hosts.
    pub fn is_shadow_including_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent_or_shadow_host(n);
        }
        false
    }

    /// Whether `ancestor` is `node` or one of its light-tree ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).contains(&ancestor)
    }

    // ── Distribution ─────────────────────────────────────────────────

    /// The slot (`<slot>` or `<content>` insertion point) in the youngest
    /// shadow tree of this node's parent that the node is distributed to.
    ///
    /// A `<slot>` takes nodes whose `slot` attribute equals its `name`
    /// (both default to the empty string). A `<content>` takes any node no
    /// slot claimed.
    pub fn assigned_slot(&self, id: NodeId) -> Option<NodeId> {
        let node = self.get(id).filter(|n| n.is_element())?;
        let host = self.parent(id)?;
        let root = self.youngest_shadow_root(host)?;
        let slot_name = node.attribute("slot").unwrap_or_default();

        let candidates = self.walk_depth_first(root);
        candidates
            .iter()
            .copied()
            .find(|&n| {
                self.get(n).is_some_and(|d| {
                    d.tag == "slot" && d.attribute("name").unwrap_or_default() == slot_name
                })
            })
            .or_else(|| {
                candidates
                    .iter()
                    .copied()
                    .find(|&n| self.get(n).is_some_and(|d| d.tag == "content"))
            })
    }

    // ── Access ───────────────────────────────────────────────────────

    /// Immutable access to a node's data.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    /// Mutable access to a node's data.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(NodeData::is_element)
    }

    pub fn is_shadow_root(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.kind, NodeKind::ShadowRoot(_)))
    }

    /// Number of nodes in the DOM, the document included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the DOM holds nothing but the document.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Whether the DOM contains a node with the given id.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    // ── Walks ────────────────────────────────────────────────────────

    /// Pre-order depth-first traversal of the light tree starting from `start`.
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Push children in reverse so the first child is visited first.
            let kids = self.children(current);
            for &child in kids.iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    /// Shadow-including pre-order traversal: a host's shadow roots (oldest
    /// first) are visited right after the host, before its light children.
    pub fn walk_shadow_including(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
            for &root in self.shadow_roots(current).iter().rev() {
                stack.push(root);
            }
        }
        result
    }

    /// Position of `id` in shadow-including document order.
    pub fn document_position(&self, id: NodeId) -> Option<usize> {
        self.document_positions().get(id).copied()
    }

    /// Compare two nodes by shadow-including document order. Nodes not in
    /// the document sort last.
    pub fn document_order(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let positions = self.document_positions();
        let position = |n: NodeId| positions.get(n).copied().unwrap_or(usize::MAX);
        position(a).cmp(&position(b))
    }

    /// Positions of every node in shadow-including document order. One walk
    /// per structural change; later queries share the result.
    pub fn document_positions(&self) -> Rc<SecondaryMap<NodeId, usize>> {
        if let Some(positions) = self.document_positions.borrow().as_ref() {
            return Rc::clone(positions);
        }
        let positions: Rc<SecondaryMap<NodeId, usize>> = Rc::new(
            self.walk_shadow_including(self.document)
                .into_iter()
                .enumerate()
                .map(|(index, node)| (node, index))
                .collect(),
        );
        *self.document_positions.borrow_mut() = Some(Rc::clone(&positions));
        positions
    }

    fn invalidate_document_positions(&mut self) {
        *self.document_positions.get_mut() = None;
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a small test tree:
    /// ```text
    ///     document
    ///        |
    ///       html
    ///      /    \
    ///    a        b
    ///   / \
    ///  c   d
    /// ```
    fn build_tree() -> (Dom, NodeId, NodeId, NodeId, NodeId, NodeId) {
        let mut dom = Dom::new();
        let html = dom.insert_child(dom.document(), NodeData::element("html"));
        let a = dom.insert_child(html, NodeData::element("div").with_id("a").with_class("left"));
        let b = dom.insert_child(html, NodeData::element("div").with_id("b").with_class("right"));
        let c = dom.insert_child(a, NodeData::element("button").with_id("c"));
        let d = dom.insert_child(a, NodeData::element("span").with_id("d"));
        (dom, html, a, b, c, d)
    }

    /// `host` with one shadow root containing `inner`.
    fn build_shadow_tree() -> (Dom, NodeId, NodeId, NodeId, NodeId) {
        let mut dom = Dom::new();
        let host = dom.insert_child(dom.document(), NodeData::element("x-host"));
        let light = dom.insert_child(host, NodeData::element("span"));
        let root = dom.attach_shadow(host, ShadowRootMode::Open);
        let inner = dom.insert_child(root, NodeData::element("div"));
        (dom, host, light, root, inner)
    }

    #[test]
    fn new_has_document_only() {
        let dom = Dom::new();
        assert!(dom.is_empty());
        assert_eq!(dom.len(), 1);
        assert!(dom.get(dom.document()).is_some_and(NodeData::is_document));
    }

    #[test]
    fn insert_child_parent_relationship() {
        let (dom, html, a, _b, c, _d) = build_tree();
        assert_eq!(dom.parent(html), Some(dom.document()));
        assert_eq!(dom.parent(a), Some(html));
        assert_eq!(dom.parent(c), Some(a));
        assert_eq!(dom.parent(dom.document()), None);
        assert_eq!(dom.parent_element(html), None);
    }

    #[test]
    fn children_and_ancestors() {
        let (dom, html, a, b, c, d) = build_tree();
        assert_eq!(dom.children(html), &[a, b]);
        assert_eq!(dom.children(a), &[c, d]);
        assert_eq!(dom.ancestors(c), vec![a, html, dom.document()]);
    }

    #[test]
    fn element_siblings() {
        let (dom, _html, a, b, c, d) = build_tree();
        assert_eq!(dom.next_element_sibling(a), Some(b));
        assert_eq!(dom.previous_element_sibling(b), Some(a));
        assert_eq!(dom.previous_element_sibling(c), None);
        assert_eq!(dom.next_element_sibling(d), None);
    }

    #[test]
    fn remove_subtree() {
        let (mut dom, html, a, b, c, d) = build_tree();
        dom.remove(a);
        assert!(!dom.contains(a));
        assert!(!dom.contains(c));
        assert!(!dom.contains(d));
        assert_eq!(dom.children(html), &[b]);
        assert_eq!(dom.len(), 3);
    }

    #[test]
    fn remove_document_is_refused() {
        let mut dom = Dom::new();
        let document = dom.document();
        assert!(dom.remove(document).is_none());
        assert!(dom.contains(document));
    }

    #[test]
    fn remove_host_drops_shadow_tree() {
        let (mut dom, host, light, root, inner) = build_shadow_tree();
        dom.remove(host);
        for id in [host, light, root, inner] {
            assert!(!dom.contains(id));
        }
        assert!(dom.is_empty());
    }

    #[test]
    fn remove_shadow_root_detaches_from_host() {
        let (mut dom, host, _light, root, inner) = build_shadow_tree();
        dom.remove(root);
        assert!(dom.shadow_roots(host).is_empty());
        assert!(!dom.contains(inner));
    }

    #[test]
    fn reparent() {
        let (mut dom, html, a, b, c, _d) = build_tree();
        dom.reparent(c, b);
        assert_eq!(dom.parent(c), Some(b));
        assert!(!dom.children(a).contains(&c));
        assert_eq!(dom.ancestors(c), vec![b, html, dom.document()]);
    }

    #[test]
    fn shadow_root_links() {
        let (dom, host, light, root, inner) = build_shadow_tree();
        assert_eq!(dom.parent(root), None);
        assert_eq!(dom.shadow_host(root), Some(host));
        assert_eq!(dom.parent_or_shadow_host(root), Some(host));
        assert_eq!(dom.parent(inner), Some(root));
        assert_eq!(dom.parent_element(inner), None);
        assert_eq!(dom.youngest_shadow_root(host), Some(root));
        assert!(dom.is_shadow_host(host));
        assert!(!dom.is_shadow_host(light));
    }

    #[test]
    fn tree_scopes() {
        let (mut dom, host, light, root, inner) = build_shadow_tree();
        let document = dom.document();
        assert_eq!(dom.tree_scope(host), document);
        assert_eq!(dom.tree_scope(light), document);
        assert_eq!(dom.tree_scope(inner), root);
        assert_eq!(dom.tree_scope(root), root);
        assert_eq!(dom.parent_tree_scope(root), Some(document));
        assert_eq!(dom.parent_tree_scope(document), None);

        let nested_host = dom.insert_child(root, NodeData::element("x-inner"));
        let nested = dom.attach_shadow(nested_host, ShadowRootMode::Closed);
        assert!(dom.tree_scope_is_inclusive_ancestor_of(document, nested));
        assert!(dom.tree_scope_is_inclusive_ancestor_of(root, nested));
        assert!(dom.tree_scope_is_inclusive_ancestor_of(nested, nested));
        assert!(!dom.tree_scope_is_inclusive_ancestor_of(nested, root));
        assert!(dom.is_shadow_including_inclusive_ancestor(host, nested));
        assert!(!dom.is_inclusive_ancestor(host, nested));
    }

    #[test]
    fn assigned_slot_by_name_and_default() {
        let mut dom = Dom::new();
        let host = dom.insert_child(dom.document(), NodeData::element("x-card"));
        let titled = dom.insert_child(host, NodeData::element("h1").with_attribute("slot", "title"));
        let plain = dom.insert_child(host, NodeData::element("p"));
        let root = dom.attach_shadow(host, ShadowRootMode::Open);
        let wrapper = dom.insert_child(root, NodeData::element("div"));
        let title_slot = dom.insert_child(wrapper, NodeData::element("slot").with_attribute("name", "title"));
        let default_slot = dom.insert_child(root, NodeData::element("slot"));

        assert_eq!(dom.assigned_slot(titled), Some(title_slot));
        assert_eq!(dom.assigned_slot(plain), Some(default_slot));
        assert_eq!(dom.assigned_slot(wrapper), None);
    }

    #[test]
    fn content_insertion_point_takes_unslotted_nodes() {
        let mut dom = Dom::new();
        let host = dom.insert_child(dom.document(), NodeData::element("x-old"));
        let child = dom.insert_child(host, NodeData::element("span"));
        let root = dom.attach_shadow(host, ShadowRootMode::Open);
        let content = dom.insert_child(root, NodeData::element("content"));
        assert_eq!(dom.assigned_slot(child), Some(content));
    }

    #[test]
    fn walk_depth_first() {
        let (dom, html, a, b, c, d) = build_tree();
        assert_eq!(dom.walk_depth_first(html), vec![html, a, c, d, b]);
        assert_eq!(dom.walk_depth_first(a), vec![a, c, d]);
    }

    #[test]
    fn walk_shadow_including_visits_roots_before_light_children() {
        let (dom, host, light, root, inner) = build_shadow_tree();
        let document = dom.document();
        assert_eq!(
            dom.walk_shadow_including(document),
            vec![document, host, root, inner, light]
        );
        assert_eq!(dom.document_order(root, light), Ordering::Less);
        assert_eq!(dom.document_order(light, host), Ordering::Greater);
        assert_eq!(dom.document_position(inner), Some(3));
    }

    #[test]
    fn document_order_is_shared_until_tree_changes() {
        let (mut dom, host, light, root, inner) = build_shadow_tree();
        let first = dom.document_positions();
        for _ in 0..8 {
            assert_eq!(dom.document_order(inner, light), Ordering::Less);
        }
        assert!(Rc::ptr_eq(&first, &dom.document_positions()));

        // A new shadow child lands before the light child.
        let early = dom.insert_child(root, NodeData::element("b"));
        assert!(!Rc::ptr_eq(&first, &dom.document_positions()));
        assert_eq!(dom.document_position(early), Some(4));
        assert_eq!(dom.document_position(light), Some(5));

        dom.remove(inner);
        assert_eq!(dom.document_position(inner), None);
        assert_eq!(dom.document_order(inner, host), Ordering::Greater);
        assert_eq!(dom.document_position(light), Some(4));
    }
}
