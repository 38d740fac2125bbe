//! The forest of scoped resolvers, one per tree scope with author style.
//!
//! Resolvers live in a slotmap arena and point at their parent by
//! [`ResolverId`]. Following parent links from any resolver ends at the
//! document's resolver. A single-slot cache remembers the nearest enclosing
//! resolver of the node last visited by a depth-first style walk.

use std::collections::HashMap;

use slotmap::{new_key_type, SlotMap};
use tracing::{debug, trace};

use crate::dom::{Dom, NodeId};
use crate::style::scoped_resolver::ScopedStyleResolver;

new_key_type! {
    /// Handle to a resolver in a [`ScopedStyleTree`].
    pub struct ResolverId;
}

/// How new resolvers are linked into the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Scopes are added in document order, so a new resolver never becomes
    /// the parent of an existing one.
    DocumentOrder,
    /// Scopes may arrive in any order; existing resolvers nested inside a
    /// new one are re-pointed to it.
    #[default]
    ReparentByContainment,
}

#[derive(Debug, Clone, Copy, Default)]
struct StyleCache {
    resolver: Option<ResolverId>,
    node: Option<NodeId>,
}

#[derive(Debug, Default)]
pub struct ScopedStyleTree {
    resolvers: SlotMap<ResolverId, ScopedStyleResolver>,
    by_scope: HashMap<NodeId, ResolverId>,
    document_resolver: Option<ResolverId>,
    cache: StyleCache,
    build_mode: BuildMode,
}

impl ScopedStyleTree {
    pub fn new(build_mode: BuildMode) -> Self {
        Self {
            build_mode,
            ..Self::default()
        }
    }

    pub fn build_mode(&self) -> BuildMode {
        self.build_mode
    }

    // ── Structure ────────────────────────────────────────────────────

    /// The resolver for `scope`, created and linked on first use.
    pub fn ensure_scoped_style_resolver(&mut self, dom: &Dom, scope: NodeId) -> ResolverId {
        if let Some(&id) = self.by_scope.get(&scope) {
            return id;
        }
        let id = self.add_resolver(dom, scope);
        self.setup_scoped_styles_tree(dom, id);
        id
    }

    fn add_resolver(&mut self, dom: &Dom, scope: NodeId) -> ResolverId {
        let id = self.resolvers.insert(ScopedStyleResolver::new(scope));
        self.by_scope.insert(scope, id);
        if scope == dom.document() {
            self.document_resolver = Some(id);
        }
        self.clear_cache();
        debug!(?scope, resolvers = self.resolvers.len(), "scoped resolver created");
        id
    }

    /// Link `target` to the nearest enclosing resolver, creating the
    /// document's resolver if nothing closer exists.
    fn setup_scoped_styles_tree(&mut self, dom: &Dom, target: ResolverId) {
        let Some(scope) = self.resolvers.get(target).map(ScopedStyleResolver::scope) else {
            return;
        };

        let mut current = dom.parent_or_shadow_host(scope);
        while let Some(node) = current {
            if let Some(&parent) = self.by_scope.get(&node) {
                self.set_parent(target, Some(parent));
                break;
            }
            if node == dom.document() {
                let parent = self.add_resolver(dom, node);
                self.set_parent(target, Some(parent));
                self.setup_scoped_styles_tree(dom, parent);
                break;
            }
            current = dom.parent_or_shadow_host(node);
        }

        if self.build_mode == BuildMode::DocumentOrder {
            return;
        }

        let parent = self.resolvers.get(target).and_then(ScopedStyleResolver::parent);
        for (id, resolver) in self.resolvers.iter_mut() {
            if id == target || resolver.parent() != parent {
                continue;
            }
            if dom.is_shadow_including_inclusive_ancestor(scope, resolver.scope()) {
                trace!(from = ?parent, to = ?target, scope = ?resolver.scope(), "resolver reparented");
                resolver.set_parent(Some(target));
            }
        }
    }

    fn set_parent(&mut self, id: ResolverId, parent: Option<ResolverId>) {
        if let Some(resolver) = self.resolvers.get_mut(id) {
            resolver.set_parent(parent);
        }
    }

    /// Drop the resolver for `scope`. Its children move to its parent. The
    /// document's resolver is never removed.
    pub fn remove(&mut self, scope: NodeId) {
        let Some(&id) = self.by_scope.get(&scope) else {
            return;
        };
        if Some(id) == self.document_resolver {
            return;
        }
        self.by_scope.remove(&scope);
        let Some(removed) = self.resolvers.remove(id) else {
            return;
        };

        let new_parent = removed.parent();
        for resolver in self.resolvers.values_mut() {
            if resolver.parent() == Some(id) {
                resolver.set_parent(new_parent);
            }
        }
        self.clear_cache();
        debug!(?scope, resolvers = self.resolvers.len(), "scoped resolver removed");
    }

    /// Drop every resolver.
    pub fn clear(&mut self) {
        self.resolvers.clear();
        self.by_scope.clear();
        self.document_resolver = None;
        self.clear_cache();
    }

    // ── Lookup ───────────────────────────────────────────────────────

    pub fn scoped_style_resolver_for(&self, scope: NodeId) -> Option<ResolverId> {
        self.by_scope.get(&scope).copied()
    }

    pub fn document_resolver(&self) -> Option<ResolverId> {
        self.document_resolver
    }

    pub fn get(&self, id: ResolverId) -> Option<&ScopedStyleResolver> {
        self.resolvers.get(id)
    }

    pub fn get_mut(&mut self, id: ResolverId) -> Option<&mut ScopedStyleResolver> {
        self.resolvers.get_mut(id)
    }

    pub fn parent_of(&self, id: ResolverId) -> Option<ResolverId> {
        self.resolvers.get(id).and_then(ScopedStyleResolver::parent)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResolverId, &ScopedStyleResolver)> {
        self.resolvers.iter()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// The nearest resolver found by walking from `node` through parents
    /// and shadow hosts. Does not touch the cache.
    pub fn enclosing_scoped_style_resolver_for(&self, dom: &Dom, node: NodeId) -> Option<ResolverId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if let Some(&id) = self.by_scope.get(&n) {
                return Some(id);
            }
            current = dom.parent_or_shadow_host(n);
        }
        None
    }

    // ── Walk cache ───────────────────────────────────────────────────

    fn cache_is_valid(&self, parent: Option<NodeId>) -> bool {
        parent.is_some() && parent == self.cache.node
    }

    fn clear_cache(&mut self) {
        self.cache = StyleCache::default();
    }

    /// Recompute the cache for `node` from scratch.
    pub fn resolve_style_cache(&mut self, dom: &Dom, node: NodeId) {
        self.cache.resolver = self.enclosing_scoped_style_resolver_for(dom, node);
        self.cache.node = Some(node);
        trace!(?node, resolver = ?self.cache.resolver, "style cache resolved");
    }

    /// Enter `node` during a depth-first walk. `parent` is the node the walk
    /// came from (its parent or shadow host).
    pub fn push_style_cache(&mut self, dom: &Dom, node: NodeId, parent: Option<NodeId>) {
        if self.by_scope.is_empty() {
            return;
        }
        if !self.cache_is_valid(parent) {
            self.resolve_style_cache(dom, node);
            return;
        }
        if let Some(&id) = self.by_scope.get(&node) {
            self.cache.resolver = Some(id);
        }
        self.cache.node = Some(node);
    }

    /// Leave `node`, rolling the cache back to its parent or shadow host.
    pub fn pop_style_cache(&mut self, dom: &Dom, node: NodeId) {
        if !self.cache_is_valid(Some(node)) {
            return;
        }
        if let Some(id) = self.cache.resolver {
            if self.resolvers.get(id).is_some_and(|r| r.scope() == node) {
                self.cache.resolver = self.parent_of(id);
            }
        }
        self.cache.node = dom.parent_or_shadow_host(node);
    }

    /// The nearest enclosing resolver of `element`, served from the cache
    /// when the walk is positioned on it.
    pub fn scoped_resolver_for(&mut self, dom: &Dom, element: NodeId) -> Option<ResolverId> {
        if !self.cache_is_valid(Some(element)) {
            self.resolve_style_cache(dom, element);
        }
        self.cache.resolver
    }

    // ── Resolution ───────────────────────────────────────────────────

    /// Resolvers from `element`'s nearest enclosing one out to the
    /// document's, innermost first.
    pub fn resolve_scoped_styles(&mut self, dom: &Dom, element: NodeId) -> Vec<ResolverId> {
        let mut chain = Vec::new();
        let mut current = self.scoped_resolver_for(dom, element);
        while let Some(id) = current {
            chain.push(id);
            current = self.parent_of(id);
        }
        chain
    }

    /// Resolvers of the shadow roots `host` carries, youngest first.
    pub fn collect_scoped_resolvers_for_hosted_shadow_trees(
        &self,
        dom: &Dom,
        host: NodeId,
    ) -> Vec<ResolverId> {
        dom.shadow_roots(host)
            .iter()
            .rev()
            .filter_map(|&root| self.scoped_style_resolver_for(root))
            .collect()
    }

    /// Whether rules of resolver `id` may style `element`: the resolver
    /// belongs to the element's own tree scope, or to the document when the
    /// element's scope accepts document author style.
    pub fn applies_to_element(&self, dom: &Dom, id: ResolverId, element: NodeId) -> bool {
        let Some(resolver) = self.resolvers.get(id) else {
            return false;
        };
        let tree_scope = dom.tree_scope(element);
        if resolver.scope() == tree_scope {
            return true;
        }
        let apply_author_styles = dom.get(tree_scope).is_some_and(|s| s.apply_author_styles);
        apply_author_styles && resolver.scope() == dom.document()
    }

    /// Resolvers whose `@keyframes` are visible to `element`: those of the
    /// shadow trees it hosts, then its own chain filtered by
    /// [`applies_to_element`](Self::applies_to_element).
    pub fn resolve_scoped_keyframes_rules(&mut self, dom: &Dom, element: NodeId) -> Vec<ResolverId> {
        let mut resolvers = self.collect_scoped_resolvers_for_hosted_shadow_trees(dom, element);
        let chain = self.resolve_scoped_styles(dom, element);
        resolvers.extend(
            chain
                .into_iter()
                .filter(|&id| self.applies_to_element(dom, id, element)),
        );
        resolvers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{NodeData, ShadowRootMode};
    use pretty_assertions::assert_eq;

    struct Fixture {
        dom: Dom,
        host1: NodeId,
        root1: NodeId,
        host2: NodeId,
        root2: NodeId,
        leaf: NodeId,
    }

    /// document > div > host1 [root1 > section > host2 [root2 > b]] > p
    fn fixture() -> Fixture {
        let mut dom = Dom::new();
        let div = dom.insert_child(dom.document(), NodeData::element("div"));
        let host1 = dom.insert_child(div, NodeData::element("x-outer"));
        let root1 = dom.attach_shadow(host1, ShadowRootMode::Open);
        let section = dom.insert_child(root1, NodeData::element("section"));
        let host2 = dom.insert_child(section, NodeData::element("x-inner"));
        let root2 = dom.attach_shadow(host2, ShadowRootMode::Open);
        let leaf = dom.insert_child(root2, NodeData::element("b"));
        dom.insert_child(host1, NodeData::element("p"));
        Fixture {
            dom,
            host1,
            root1,
            host2,
            root2,
            leaf,
        }
    }

    fn walk(
        tree: &mut ScopedStyleTree,
        dom: &Dom,
        node: NodeId,
        parent: Option<NodeId>,
        out: &mut Vec<(NodeId, Option<ResolverId>)>,
    ) {
        tree.push_style_cache(dom, node, parent);
        if dom.is_element(node) {
            out.push((node, tree.scoped_resolver_for(dom, node)));
        }
        for &root in dom.shadow_roots(node) {
            walk(tree, dom, root, Some(node), out);
        }
        for &child in dom.children(node) {
            walk(tree, dom, child, Some(node), out);
        }
        tree.pop_style_cache(dom, node);
    }

    // ── Linking ──────────────────────────────────────────────────────

    #[test]
    fn test_first_resolver_creates_document_parent() {
        let f = fixture();
        let mut tree = ScopedStyleTree::new(BuildMode::ReparentByContainment);

        let r1 = tree.ensure_scoped_style_resolver(&f.dom, f.root1);
        let doc = tree.document_resolver();
        assert!(doc.is_some());
        assert_eq!(tree.parent_of(r1), doc);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.ensure_scoped_style_resolver(&f.dom, f.root1), r1);
    }

    #[test]
    fn test_out_of_order_insertion_reparents() {
        let f = fixture();
        let mut tree = ScopedStyleTree::new(BuildMode::ReparentByContainment);

        let r2 = tree.ensure_scoped_style_resolver(&f.dom, f.root2);
        let doc = tree.document_resolver();
        assert_eq!(tree.parent_of(r2), doc);

        let r1 = tree.ensure_scoped_style_resolver(&f.dom, f.root1);
        assert_eq!(tree.parent_of(r1), doc);
        assert_eq!(tree.parent_of(r2), Some(r1));
    }

    #[test]
    fn test_document_order_mode_skips_reparenting() {
        let f = fixture();
        let mut tree = ScopedStyleTree::new(BuildMode::DocumentOrder);

        let r2 = tree.ensure_scoped_style_resolver(&f.dom, f.root2);
        tree.ensure_scoped_style_resolver(&f.dom, f.root1);
        assert_eq!(tree.parent_of(r2), tree.document_resolver());
    }

    #[test]
    fn test_remove_reparents_children() {
        let f = fixture();
        let mut tree = ScopedStyleTree::new(BuildMode::ReparentByContainment);
        let doc = tree.ensure_scoped_style_resolver(&f.dom, f.dom.document());
        let r1 = tree.ensure_scoped_style_resolver(&f.dom, f.root1);
        let r2 = tree.ensure_scoped_style_resolver(&f.dom, f.root2);
        assert_eq!(tree.parent_of(r2), Some(r1));

        tree.remove(f.root1);
        assert!(tree.get(r1).is_none());
        assert_eq!(tree.parent_of(r2), Some(doc));
        assert_eq!(tree.scoped_style_resolver_for(f.root1), None);

        tree.remove(f.dom.document());
        assert_eq!(tree.document_resolver(), Some(doc));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_every_chain_ends_at_document() {
        let f = fixture();
        let mut tree = ScopedStyleTree::new(BuildMode::ReparentByContainment);
        tree.ensure_scoped_style_resolver(&f.dom, f.root2);
        tree.ensure_scoped_style_resolver(&f.dom, f.root1);
        tree.remove(f.root1);
        tree.ensure_scoped_style_resolver(&f.dom, f.root1);

        let doc = tree.document_resolver();
        let ids: Vec<_> = tree.iter().map(|(id, _)| id).collect();
        for id in ids {
            let mut current = id;
            let mut steps = 0;
            while let Some(parent) = tree.parent_of(current) {
                current = parent;
                steps += 1;
                assert!(steps <= tree.len(), "parent chain has a cycle");
            }
            assert_eq!(Some(current), doc);
        }
    }

    // ── Cache ────────────────────────────────────────────────────────

    #[test]
    fn test_cached_walk_matches_fresh_lookup() {
        let f = fixture();
        let mut tree = ScopedStyleTree::new(BuildMode::ReparentByContainment);
        tree.ensure_scoped_style_resolver(&f.dom, f.dom.document());
        tree.ensure_scoped_style_resolver(&f.dom, f.root2);

        let mut seen = Vec::new();
        walk(&mut tree, &f.dom, f.dom.document(), None, &mut seen);
        assert_eq!(seen.len(), 6);
        for (element, cached) in seen {
            assert_eq!(cached, tree.enclosing_scoped_style_resolver_for(&f.dom, element));
        }
    }

    #[test]
    fn test_pop_restores_parent_resolver() {
        let f = fixture();
        let mut tree = ScopedStyleTree::new(BuildMode::ReparentByContainment);
        let r1 = tree.ensure_scoped_style_resolver(&f.dom, f.root1);
        let r2 = tree.ensure_scoped_style_resolver(&f.dom, f.root2);

        tree.resolve_style_cache(&f.dom, f.host2);
        assert_eq!(tree.scoped_resolver_for(&f.dom, f.host2), Some(r1));
        tree.push_style_cache(&f.dom, f.root2, Some(f.host2));
        tree.push_style_cache(&f.dom, f.leaf, Some(f.root2));
        assert_eq!(tree.scoped_resolver_for(&f.dom, f.leaf), Some(r2));
        tree.pop_style_cache(&f.dom, f.leaf);
        tree.pop_style_cache(&f.dom, f.root2);
        assert_eq!(tree.scoped_resolver_for(&f.dom, f.host2), Some(r1));
    }

    // ── Resolution ───────────────────────────────────────────────────

    #[test]
    fn test_resolve_scoped_styles_innermost_first() {
        let f = fixture();
        let mut tree = ScopedStyleTree::new(BuildMode::ReparentByContainment);
        let r1 = tree.ensure_scoped_style_resolver(&f.dom, f.root1);
        let r2 = tree.ensure_scoped_style_resolver(&f.dom, f.root2);
        let doc = tree.document_resolver().unwrap_or_else(|| panic!("no document resolver"));

        assert_eq!(tree.resolve_scoped_styles(&f.dom, f.leaf), vec![r2, r1, doc]);
        assert_eq!(tree.resolve_scoped_styles(&f.dom, f.host1), vec![doc]);
    }

    #[test]
    fn test_keyframes_resolvers_follow_tree_scope() {
        let mut f = fixture();
        let mut tree = ScopedStyleTree::new(BuildMode::ReparentByContainment);
        let r1 = tree.ensure_scoped_style_resolver(&f.dom, f.root1);
        let r2 = tree.ensure_scoped_style_resolver(&f.dom, f.root2);
        let doc = tree.document_resolver().unwrap_or_else(|| panic!("no document resolver"));

        assert_eq!(tree.resolve_scoped_keyframes_rules(&f.dom, f.leaf), vec![r2]);
        assert_eq!(tree.resolve_scoped_keyframes_rules(&f.dom, f.host2), vec![r2, r1]);
        assert_eq!(tree.resolve_scoped_keyframes_rules(&f.dom, f.host1), vec![r1, doc]);

        if let Some(root) = f.dom.get_mut(f.root2) {
            root.apply_author_styles = true;
        }
        assert_eq!(tree.resolve_scoped_keyframes_rules(&f.dom, f.leaf), vec![r2, doc]);
    }
}
