//! Rules that match across shadow boundaries, indexed by the scoping node
//! that declared them.
//!
//! Each scoping node with `/deep/`, `::shadow`, `::content` or `::slotted()`
//! rules gets small dedicated rule sets. When an element is matched, every
//! registered scoping node contributes with a cascade order derived from its
//! position relative to the element's tree scope.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::css::model::StyleSheet;
use crate::dom::{Dom, NodeId};
use crate::style::collector::{CascadeOrder, ElementRuleCollector, MatchRequest};
use crate::style::rule_set::RuleSet;
use crate::style::selector_checker::BoundaryBehavior;

/// One sheet's boundary-crossing rules at a scoping node.
#[derive(Debug)]
pub struct CrossingRuleSet {
    pub sheet: Rc<StyleSheet>,
    /// Index of the sheet among the sheets of its scope.
    pub sheet_index: u32,
    /// `/deep/` and `::shadow` rules.
    pub rule_set: RuleSet,
    /// `::content` and `::slotted()` rules. Always empty for the document.
    pub distributed: RuleSet,
}

/// Where a scoping node's tree sits relative to an element's tree scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRelation {
    /// An enclosing tree: the element sits in a shadow tree below it.
    Outer,
    /// The element's own tree scope.
    Own,
    /// A tree nested inside the element's tree scope.
    Inner,
}

/// The cascade order a scoping node is matched with for one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeCascadeOrder {
    pub scoping_node: NodeId,
    pub order: CascadeOrder,
    pub relation: ScopeRelation,
}

#[derive(Debug, Default)]
pub struct TreeBoundaryCrossingRules {
    rule_sets: HashMap<NodeId, Vec<CrossingRuleSet>>,
    /// Registered scoping nodes in document order.
    scoping_nodes: Vec<NodeId>,
}

impl TreeBoundaryCrossingRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the boundary-crossing rules of `author_rules`, the rule set of
    /// sheet number `sheet_index` at `scoping_node`, into fresh rule sets
    /// registered under that node. Every rule keeps its sheet position.
    /// `::content` and `::slotted()` rules are only kept for shadow roots.
    pub fn add_tree_boundary_crossing_rules(
        &mut self,
        dom: &Dom,
        author_rules: &RuleSet,
        scoping_node: NodeId,
        parent_style_sheet: &Rc<StyleSheet>,
        sheet_index: u32,
    ) {
        let is_document = scoping_node == dom.document();
        let deep_rules = author_rules.deep_combinator_or_shadow_pseudo_rules();
        if deep_rules.is_empty() && (is_document || !author_rules.has_shadow_distributed_rules()) {
            return;
        }

        let mut rule_set = RuleSet::new();
        for minimal in deep_rules {
            rule_set.add_minimal_rule(minimal);
        }
        rule_set.compact_rules_if_needed();

        let mut distributed = RuleSet::new();
        if !is_document {
            let rules = author_rules
                .content_pseudo_element_rules()
                .iter()
                .chain(author_rules.slotted_pseudo_element_rules());
            for minimal in rules {
                distributed.add_minimal_rule(minimal);
            }
        }
        distributed.compact_rules_if_needed();
        debug!(
            scoping_node = ?scoping_node,
            sheet_index,
            deep = deep_rules.len(),
            "boundary-crossing rules registered"
        );

        self.rule_sets
            .entry(scoping_node)
            .or_default()
            .push(CrossingRuleSet {
                sheet: Rc::clone(parent_style_sheet),
                sheet_index,
                rule_set,
                distributed,
            });
        if !self.scoping_nodes.contains(&scoping_node) {
            let index = self
                .scoping_nodes
                .partition_point(|&node| dom.document_order(node, scoping_node).is_lt());
            self.scoping_nodes.insert(index, scoping_node);
        }
    }

    /// Cascade order of every registered scoping node for `element`, whose
    /// own scope's rules are matched at `element_scope_order`.
    ///
    /// The element's own scope matches at exactly `element_scope_order`, so
    /// its `/deep/` rules order by sheet position against its plain rules.
    /// Every other scope ranks above it. With `N` scoping nodes, inner
    /// scopes count up from `element_scope_order + N` and outer scopes count
    /// down from `element_scope_order + 2N`. Each counter moves only for its
    /// own kind, so the ranges never collide: every outer scope outranks
    /// every inner one, the outermost scope wins among outer scopes, and the
    /// last in document order wins among inner scopes.
    pub fn cascade_orders(
        &self,
        dom: &Dom,
        element: NodeId,
        element_scope_order: CascadeOrder,
    ) -> Vec<ScopeCascadeOrder> {
        let size = self.scoping_nodes.len() as CascadeOrder;
        let mut inner_order = element_scope_order + size;
        let mut outer_order = element_scope_order + 2 * size;
        let element_scope = dom.tree_scope(element);

        self.scoping_nodes
            .iter()
            .map(|&scoping_node| {
                let relation = if scoping_node == element_scope {
                    ScopeRelation::Own
                } else if dom.tree_scope_is_inclusive_ancestor_of(element_scope, dom.tree_scope(scoping_node)) {
                    ScopeRelation::Inner
                } else {
                    ScopeRelation::Outer
                };
                let order = match relation {
                    ScopeRelation::Own => element_scope_order,
                    ScopeRelation::Inner => {
                        inner_order += 1;
                        inner_order - 1
                    }
                    ScopeRelation::Outer => {
                        outer_order -= 1;
                        outer_order + 1
                    }
                };
                ScopeCascadeOrder {
                    scoping_node,
                    order,
                    relation,
                }
            })
            .collect()
    }

    /// Add every `/deep/` and `::shadow` match for the collector's element.
    pub fn collect_tree_boundary_crossing_rules<'a>(
        &'a self,
        collector: &mut ElementRuleCollector<'a>,
        element_scope_order: CascadeOrder,
        include_empty_rules: bool,
    ) {
        if self.scoping_nodes.is_empty() {
            return;
        }
        let dom = collector.dom();
        for entry in self.cascade_orders(dom, collector.element(), element_scope_order) {
            let behavior = crossing_behavior(dom, entry.scoping_node);
            for crossing in self.rule_sets_for(entry.scoping_node) {
                let request = MatchRequest::new(&crossing.rule_set, Some(entry.scoping_node))
                    .with_sheet_index(crossing.sheet_index);
                collector.collect_matching_rules(&request, entry.order, behavior, include_empty_rules);
            }
        }
    }

    /// Add the `::content` and `::slotted()` matches declared at one
    /// scoping node. The caller closes the range.
    pub fn collect_distributed_rules<'a>(
        &'a self,
        collector: &mut ElementRuleCollector<'a>,
        scoping_node: NodeId,
        include_empty_rules: bool,
    ) {
        let behavior = crossing_behavior(collector.dom(), scoping_node);
        for crossing in self.rule_sets_for(scoping_node) {
            let request = MatchRequest::new(&crossing.distributed, Some(scoping_node))
                .with_sheet_index(crossing.sheet_index);
            collector.collect_matching_rules(&request, 0, behavior, include_empty_rules);
        }
    }

    pub fn has_distributed_rules(&self, scoping_node: NodeId) -> bool {
        self.rule_sets_for(scoping_node)
            .iter()
            .any(|crossing| crossing.distributed.rule_count() > 0)
    }

    /// Drop everything registered for `scoping_node`.
    pub fn reset(&mut self, scoping_node: NodeId) {
        if self.rule_sets.remove(&scoping_node).is_some() {
            self.scoping_nodes.retain(|&node| node != scoping_node);
            debug!(scoping_node = ?scoping_node, "boundary-crossing rules reset");
        }
    }

    pub fn clear(&mut self) {
        self.rule_sets.clear();
        self.scoping_nodes.clear();
    }

    pub fn rule_sets_for(&self, scoping_node: NodeId) -> &[CrossingRuleSet] {
        self.rule_sets
            .get(&scoping_node)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn scoping_nodes(&self) -> &[NodeId] {
        &self.scoping_nodes
    }

    pub fn len(&self) -> usize {
        self.scoping_nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scoping_nodes.is_empty()
    }
}

fn crossing_behavior(dom: &Dom, scoping_node: NodeId) -> BoundaryBehavior {
    let mut behavior = BoundaryBehavior::SCOPE_CONTAINS_LAST_MATCHED_ELEMENT;
    if dom.is_shadow_root(scoping_node) {
        behavior |= BoundaryBehavior::SCOPE_IS_SHADOW_ROOT;
    }
    behavior
}
