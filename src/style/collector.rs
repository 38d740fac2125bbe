//! Collects the rules of one or more rule sets that match an element.
//!
//! Candidates come from the buckets the element's own identifiers select.
//! Each candidate passes the ancestor filter and the selector checker before
//! it is recorded with its cascade order. Sorting happens once per origin or
//! scope, when the matches are transferred into the [`MatchResult`].

use std::rc::Rc;

use tracing::trace;

use crate::css::model::{DeclarationBlock, StyleRule};
use crate::css::specificity::Specificity;
use crate::dom::{Dom, NodeId};
use crate::style::ancestor_filter::AncestorFilter;
use crate::style::match_result::{MatchResult, MatchedProperties};
use crate::style::rule_data::{LinkMatchType, PropertyWhitelist, RuleData};
use crate::style::rule_set::RuleSet;
use crate::style::selector_checker::{BoundaryBehavior, SelectorChecker, SelectorCheckingContext};

/// Tie-break between equal specificities: a higher order wins.
pub type CascadeOrder = u32;

/// A rule set to match, with the scope its rules were declared in.
#[derive(Debug, Clone, Copy)]
pub struct MatchRequest<'a> {
    pub rule_set: &'a RuleSet,
    pub scope: Option<NodeId>,
    /// Index of the rule set's sheet among the sheets of its scope.
    pub sheet_index: u32,
}

impl<'a> MatchRequest<'a> {
    pub fn new(rule_set: &'a RuleSet, scope: Option<NodeId>) -> Self {
        Self {
            rule_set,
            scope,
            sheet_index: 0,
        }
    }

    pub fn with_sheet_index(mut self, sheet_index: u32) -> Self {
        self.sheet_index = sheet_index;
        self
    }
}

/// A rule that matched, waiting to be sorted.
#[derive(Debug, Clone, Copy)]
pub struct MatchedRule<'a> {
    pub rule_data: &'a RuleData,
    pub cascade_order: CascadeOrder,
    pub sheet_index: u32,
}

impl MatchedRule<'_> {
    /// Ascending key: the last rule after sorting wins. Sheet index and
    /// position together are unique within a scope, so ties never fall
    /// back to collection order.
    fn sort_key(&self) -> (Specificity, CascadeOrder, u32, u32) {
        (
            self.rule_data.specificity(),
            self.cascade_order,
            self.sheet_index,
            self.rule_data.position(),
        )
    }
}

pub struct ElementRuleCollector<'a> {
    dom: &'a Dom,
    element: NodeId,
    pseudo_element: Option<String>,
    filter: Option<&'a AncestorFilter>,
    matched_rules: Vec<MatchedRule<'a>>,
    result: MatchResult,
    collect_for_inspection: bool,
    rules_for_inspection: Vec<Rc<StyleRule>>,
}

impl<'a> ElementRuleCollector<'a> {
    pub fn new(dom: &'a Dom, element: NodeId) -> Self {
        Self {
            dom,
            element,
            pseudo_element: None,
            filter: None,
            matched_rules: Vec::new(),
            result: MatchResult::new(),
            collect_for_inspection: false,
            rules_for_inspection: Vec::new(),
        }
    }

    /// Match rules for a generated pseudo-element of the element instead.
    pub fn with_pseudo_element(mut self, pseudo: Option<String>) -> Self {
        self.pseudo_element = pseudo;
        self
    }

    /// Use `filter` to reject rules early. It is ignored unless it currently
    /// describes this element's ancestors.
    pub fn with_ancestor_filter(mut self, filter: &'a AncestorFilter) -> Self {
        let parent = self.dom.parent_element(self.element);
        if filter.parent_stack_is_consistent(parent) && parent.is_some() {
            self.filter = Some(filter);
        }
        self
    }

    /// Record the matched style rules themselves, in cascade order, instead
    /// of only their declaration blocks.
    pub fn collecting_for_inspection(mut self) -> Self {
        self.collect_for_inspection = true;
        self
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn dom(&self) -> &'a Dom {
        self.dom
    }

    pub fn match_result(&self) -> &MatchResult {
        &self.result
    }

    pub fn into_match_result(self) -> MatchResult {
        self.result
    }

    /// Style rules matched so far, sorted per transfer.
    pub fn matched_rules_for_inspection(&self) -> &[Rc<StyleRule>] {
        &self.rules_for_inspection
    }

    pub fn pending_match_count(&self) -> usize {
        self.matched_rules.len()
    }

    pub fn clear_pending(&mut self) {
        self.matched_rules.clear();
    }

    // ── Collection ──────────────────────────────────────────────────

    /// Collect matches from every bucket applicable to the element.
    pub fn collect_matching_rules(
        &mut self,
        request: &MatchRequest<'a>,
        cascade_order: CascadeOrder,
        behavior: BoundaryBehavior,
        include_empty_rules: bool,
    ) {
        let dom = self.dom;
        let Some(data) = dom.get(self.element).filter(|d| d.is_element()) else {
            return;
        };
        let rules = request.rule_set;
        let collect = |this: &mut Self, bucket: Option<&'a [RuleData]>| {
            if let Some(bucket) = bucket {
                this.collect_rules_if_matching(
                    bucket,
                    request,
                    cascade_order,
                    behavior,
                    include_empty_rules,
                );
            }
        };

        if let Some(id) = &data.id {
            collect(self, rules.id_rules(id));
        }
        if let Some(pseudo) = data.attribute("pseudo") {
            if pseudo == "cue" {
                collect(self, Some(rules.cue_pseudo_rules()));
            } else {
                collect(self, rules.shadow_pseudo_element_rules(&pseudo));
            }
        }
        if data.is_link() {
            collect(self, Some(rules.link_pseudo_class_rules()));
        }
        if data.focused {
            collect(self, Some(rules.focus_pseudo_class_rules()));
        }
        for class in &data.classes {
            collect(self, rules.class_rules(class));
        }
        collect(self, rules.tag_rules(&data.tag));
        collect(self, Some(rules.universal_rules()));
    }

    /// Collect `:host` rules of a shadow root's rule set for its host.
    pub fn collect_matching_shadow_host_rules(
        &mut self,
        request: &MatchRequest<'a>,
        cascade_order: CascadeOrder,
        include_empty_rules: bool,
    ) {
        let behavior = BoundaryBehavior::SCOPE_IS_SHADOW_ROOT;
        self.collect_rules_if_matching(
            request.rule_set.shadow_host_rules(),
            request,
            cascade_order,
            behavior,
            include_empty_rules,
        );
    }

    fn collect_rules_if_matching(
        &mut self,
        rules: &'a [RuleData],
        request: &MatchRequest<'a>,
        cascade_order: CascadeOrder,
        behavior: BoundaryBehavior,
        include_empty_rules: bool,
    ) {
        let checker = SelectorChecker::new(self.dom);
        let context = SelectorCheckingContext::new(request.scope)
            .with_behavior(behavior)
            .with_pseudo_element(self.pseudo_element.clone());

        for rule_data in rules {
            if !include_empty_rules && rule_data.properties().is_empty() {
                continue;
            }
            if self.filter.is_some_and(|filter| {
                filter.fast_reject_selector(rule_data.descendant_selector_identifier_hashes())
            }) {
                continue;
            }
            if !checker.match_selector(rule_data.selector(), self.element, &context) {
                continue;
            }
            if rule_data.contains_uncommon_attribute_selector() {
                self.result.set_is_cacheable(false);
            }
            self.matched_rules.push(MatchedRule {
                rule_data,
                cascade_order,
                sheet_index: request.sheet_index,
            });
        }
    }

    // ── Transfer ────────────────────────────────────────────────────

    /// Sort pending matches by (specificity, cascade order, sheet, position)
    /// and append them to the match result.
    pub fn sort_and_transfer_matched_rules(&mut self) {
        if self.matched_rules.is_empty() {
            return;
        }
        self.matched_rules.sort_by_key(MatchedRule::sort_key);
        trace!(element = ?self.element, matched = self.matched_rules.len(), "matched rules transferred");

        for matched in self.matched_rules.drain(..) {
            let data = matched.rule_data;
            if self.collect_for_inspection {
                self.rules_for_inspection.push(Rc::clone(data.rule()));
            }
            self.result.add_matched_properties(MatchedProperties::new(
                Rc::clone(data.properties()),
                data.link_match_type(),
                data.property_whitelist(),
            ));
        }
    }

    /// Transfer pending matches and close the user-agent range.
    pub fn finish_adding_ua_rules(&mut self) {
        self.sort_and_transfer_matched_rules();
        self.result.finish_adding_ua_rules();
    }

    /// Transfer pending matches and close one author tree-scope range.
    pub fn finish_adding_author_rules_for_tree_scope(&mut self) {
        self.sort_and_transfer_matched_rules();
        self.result.finish_adding_author_rules_for_tree_scope();
    }

    /// Append the element's inline style after its scope's matched rules.
    /// It applies to every link state and is never filtered.
    pub fn add_element_style_properties(&mut self, block: &Rc<DeclarationBlock>, is_cacheable: bool) {
        self.sort_and_transfer_matched_rules();
        self.result.add_matched_properties(MatchedProperties::new(
            Rc::clone(block),
            LinkMatchType::ALL,
            PropertyWhitelist::None,
        ));
        if !is_cacheable {
            self.result.set_is_cacheable(false);
        }
    }

    pub fn set_is_cacheable(&mut self, cacheable: bool) {
        self.result.set_is_cacheable(cacheable);
    }
}
