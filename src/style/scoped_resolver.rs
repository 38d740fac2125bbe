//! Author style of one tree scope: the document or one shadow root.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::css::media::MediaQueryEvaluator;
use crate::css::model::{FontFaceRule, KeyframesRule, PageRule, StyleSheet};
use crate::dom::{Dom, NodeId};
use crate::style::boundary_crossing::TreeBoundaryCrossingRules;
use crate::style::collector::{CascadeOrder, ElementRuleCollector, MatchRequest};
use crate::style::rule_data::AddRuleFlags;
use crate::style::rule_set::RuleSet;
use crate::style::scoped_tree::ResolverId;
use crate::style::selector_checker::BoundaryBehavior;

#[derive(Debug)]
pub struct ScopedStyleResolver {
    scope: NodeId,
    parent: Option<ResolverId>,
    author_style_sheets: Vec<Rc<StyleSheet>>,
    /// One rule set per sheet, in sheet order.
    rule_sets: Vec<RuleSet>,
    keyframes: HashMap<String, Rc<KeyframesRule>>,
    has_deep_or_shadow_selector: bool,
}

impl ScopedStyleResolver {
    pub fn new(scope: NodeId) -> Self {
        Self {
            scope,
            parent: None,
            author_style_sheets: Vec::new(),
            rule_sets: Vec::new(),
            keyframes: HashMap::new(),
            has_deep_or_shadow_selector: false,
        }
    }

    /// The document or shadow root this resolver styles.
    pub fn scope(&self) -> NodeId {
        self.scope
    }

    /// The resolver of the nearest enclosing scope with author style.
    pub fn parent(&self) -> Option<ResolverId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ResolverId>) {
        self.parent = parent;
    }

    /// Index `sheet` and register its boundary-crossing rules.
    pub fn append_css_style_sheet(
        &mut self,
        dom: &Dom,
        sheet: &Rc<StyleSheet>,
        evaluator: &MediaQueryEvaluator,
        flags: AddRuleFlags,
        tree_boundary_crossing_rules: &mut TreeBoundaryCrossingRules,
    ) {
        let mut rule_set = RuleSet::new();
        rule_set.add_rules_from_sheet(sheet, evaluator, flags);
        rule_set.compact_rules_if_needed();

        self.add_keyframes_rules(&rule_set);
        tree_boundary_crossing_rules.add_tree_boundary_crossing_rules(
            dom,
            &rule_set,
            self.scope,
            sheet,
            self.rule_sets.len() as u32,
        );
        if !rule_set.deep_combinator_or_shadow_pseudo_rules().is_empty() {
            self.has_deep_or_shadow_selector = true;
        }
        debug!(
            scope = ?self.scope,
            rules = rule_set.rule_count(),
            sheets = self.author_style_sheets.len() + 1,
            "style sheet appended"
        );

        self.author_style_sheets.push(Rc::clone(sheet));
        self.rule_sets.push(rule_set);
    }

    /// A later `@keyframes` with the same name replaces an earlier one.
    fn add_keyframes_rules(&mut self, rule_set: &RuleSet) {
        for rule in rule_set.keyframes_rules() {
            self.keyframes.insert(rule.name.clone(), Rc::clone(rule));
        }
    }

    pub fn keyframes_rule(&self, name: &str) -> Option<&Rc<KeyframesRule>> {
        self.keyframes.get(name)
    }

    /// Drop all sheets and indexed rules.
    pub fn reset_author_style(&mut self) {
        self.author_style_sheets.clear();
        self.rule_sets.clear();
        self.keyframes.clear();
        self.has_deep_or_shadow_selector = false;
    }

    /// Collect this scope's rules matching the collector's element.
    pub fn collect_matching_author_rules<'a>(
        &'a self,
        collector: &mut ElementRuleCollector<'a>,
        include_empty_rules: bool,
        cascade_order: CascadeOrder,
    ) {
        for (index, rule_set) in self.rule_sets.iter().enumerate() {
            let request = MatchRequest::new(rule_set, Some(self.scope)).with_sheet_index(index as u32);
            collector.collect_matching_rules(
                &request,
                cascade_order,
                BoundaryBehavior::empty(),
                include_empty_rules,
            );
        }
    }

    /// Collect `:host` rules for the host of this resolver's shadow root.
    pub fn collect_matching_shadow_host_rules<'a>(
        &'a self,
        collector: &mut ElementRuleCollector<'a>,
        include_empty_rules: bool,
        cascade_order: CascadeOrder,
    ) {
        for (index, rule_set) in self.rule_sets.iter().enumerate() {
            let request = MatchRequest::new(rule_set, Some(self.scope)).with_sheet_index(index as u32);
            collector.collect_matching_shadow_host_rules(&request, cascade_order, include_empty_rules);
        }
    }

    pub fn font_face_rules(&self) -> impl Iterator<Item = &Rc<FontFaceRule>> {
        self.rule_sets.iter().flat_map(|set| set.font_face_rules())
    }

    pub fn page_rules(&self) -> impl Iterator<Item = &Rc<PageRule>> {
        self.rule_sets.iter().flat_map(|set| set.page_rules())
    }

    pub fn author_style_sheets(&self) -> &[Rc<StyleSheet>] {
        &self.author_style_sheets
    }

    pub fn rule_sets(&self) -> &[RuleSet] {
        &self.rule_sets
    }

    pub fn has_deep_or_shadow_selector(&self) -> bool {
        self.has_deep_or_shadow_selector
    }

    pub fn has_author_style(&self) -> bool {
        !self.author_style_sheets.is_empty()
    }
}
