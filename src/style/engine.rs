//! The style engine: owns every sheet and index, and answers style queries
//! for elements of a [`Dom`].

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::css::media::{MediaEnvironment, MediaQueryEvaluator};
use crate::css::model::{DeclarationBlock, FontFaceRule, KeyframesRule, PageRule, StyleRule, StyleSheet};
use crate::css::parser::{parse_css, parse_declaration_list, ParseError};
use crate::dom::{Dom, NodeId};
use crate::style::ancestor_filter::AncestorFilter;
use crate::style::boundary_crossing::TreeBoundaryCrossingRules;
use crate::style::cascade::{self, ComputedStyle};
use crate::style::collector::{CascadeOrder, ElementRuleCollector, MatchRequest};
use crate::style::default_style::default_style_sheet;
use crate::style::global_rule_set::CssGlobalRuleSet;
use crate::style::match_result::MatchResult;
use crate::style::rule_data::{AddRuleFlags, LinkMatchType};
use crate::style::rule_set::RuleSet;
use crate::style::scoped_resolver::ScopedStyleResolver;
use crate::style::scoped_tree::{BuildMode, ResolverId, ScopedStyleTree};
use crate::style::selector_checker::BoundaryBehavior;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StyleEngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("node {0:?} is not a document or shadow root")]
    NotATreeScope(NodeId),
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Configuration for the style engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Environment media queries are evaluated against.
    pub media: MediaEnvironment,
    /// How the scoped resolver forest links new scopes.
    pub tree_build_mode: BuildMode,
    /// Whether rules with empty declaration blocks are collected.
    pub include_empty_rules: bool,
    /// Whether the built-in user-agent sheet is loaded.
    pub load_default_style: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            media: MediaEnvironment::default(),
            tree_build_mode: BuildMode::default(),
            include_empty_rules: false,
            load_default_style: true,
        }
    }
}

impl EngineConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the media environment (builder).
    pub fn with_media(mut self, media: MediaEnvironment) -> Self {
        self.media = media;
        self
    }

    /// Set the resolver forest build mode (builder).
    pub fn with_tree_build_mode(mut self, mode: BuildMode) -> Self {
        self.tree_build_mode = mode;
        self
    }

    /// Collect rules with empty declaration blocks (builder).
    pub fn with_include_empty_rules(mut self, include: bool) -> Self {
        self.include_empty_rules = include;
        self
    }

    /// Load the built-in user-agent sheet (builder).
    pub fn with_default_style(mut self, load: bool) -> Self {
        self.load_default_style = load;
        self
    }
}

// ---------------------------------------------------------------------------
// StyleEngine
// ---------------------------------------------------------------------------

pub struct StyleEngine {
    config: EngineConfig,
    evaluator: MediaQueryEvaluator,
    ua_sheets: Vec<Rc<StyleSheet>>,
    /// Author sheets per tree scope, in insertion order.
    author_sheets: HashMap<NodeId, Vec<Rc<StyleSheet>>>,
    dirty_scopes: HashSet<NodeId>,
    style_tree: ScopedStyleTree,
    tree_boundary_crossing_rules: TreeBoundaryCrossingRules,
    global_rule_set: CssGlobalRuleSet,
    /// Parsed `style` attributes, keyed by element and checked against the
    /// attribute text before reuse.
    inline_styles: HashMap<NodeId, (String, Rc<DeclarationBlock>)>,
}

impl StyleEngine {
    pub fn new(config: EngineConfig) -> Self {
        let mut engine = Self {
            evaluator: MediaQueryEvaluator::new(config.media.clone()),
            style_tree: ScopedStyleTree::new(config.tree_build_mode),
            config,
            ua_sheets: Vec::new(),
            author_sheets: HashMap::new(),
            dirty_scopes: HashSet::new(),
            tree_boundary_crossing_rules: TreeBoundaryCrossingRules::new(),
            global_rule_set: CssGlobalRuleSet::new(),
            inline_styles: HashMap::new(),
        };
        if engine.config.load_default_style {
            match default_style_sheet() {
                Ok(sheet) => engine.add_user_agent_sheet(Rc::new(sheet)),
                Err(error) => warn!(%error, "default style sheet failed to parse"),
            }
        }
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn style_tree(&self) -> &ScopedStyleTree {
        &self.style_tree
    }

    pub fn tree_boundary_crossing_rules(&self) -> &TreeBoundaryCrossingRules {
        &self.tree_boundary_crossing_rules
    }

    pub fn global_rule_set(&self) -> &CssGlobalRuleSet {
        &self.global_rule_set
    }

    // ── Sheets ───────────────────────────────────────────────────────

    pub fn add_user_agent_sheet(&mut self, sheet: Rc<StyleSheet>) {
        self.ua_sheets.push(sheet);
        self.global_rule_set
            .set_default_style(&self.ua_sheets, &self.evaluator);
    }

    /// Attach an author sheet to `scope`, the document or a shadow root.
    /// Takes effect on the next [`update_active_style`](Self::update_active_style).
    pub fn add_author_sheet(
        &mut self,
        dom: &Dom,
        scope: NodeId,
        sheet: Rc<StyleSheet>,
    ) -> Result<(), StyleEngineError> {
        let is_tree_scope = dom
            .get(scope)
            .is_some_and(|data| data.is_document() || data.is_shadow_root());
        if !is_tree_scope {
            return Err(StyleEngineError::NotATreeScope(scope));
        }
        self.author_sheets.entry(scope).or_default().push(sheet);
        self.dirty_scopes.insert(scope);
        Ok(())
    }

    /// Parse `css` and attach it to `scope`.
    pub fn add_author_css(
        &mut self,
        dom: &Dom,
        scope: NodeId,
        css: &str,
    ) -> Result<Rc<StyleSheet>, StyleEngineError> {
        let sheet = Rc::new(parse_css(css)?);
        self.add_author_sheet(dom, scope, Rc::clone(&sheet))?;
        Ok(sheet)
    }

    /// Detach one sheet from `scope`. Returns whether it was attached.
    pub fn remove_author_sheet(&mut self, scope: NodeId, sheet: &Rc<StyleSheet>) -> bool {
        let Some(sheets) = self.author_sheets.get_mut(&scope) else {
            return false;
        };
        let before = sheets.len();
        sheets.retain(|s| !Rc::ptr_eq(s, sheet));
        let removed = sheets.len() != before;
        if removed {
            self.dirty_scopes.insert(scope);
        }
        removed
    }

    /// Detach every sheet of `scope`.
    pub fn remove_author_sheets(&mut self, scope: NodeId) {
        if self.author_sheets.remove(&scope).is_some() {
            self.dirty_scopes.insert(scope);
        }
    }

    pub fn author_sheets(&self, scope: NodeId) -> &[Rc<StyleSheet>] {
        self.author_sheets.get(&scope).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Forget a tree scope that left the document.
    pub fn remove_tree_scope(&mut self, scope: NodeId) {
        self.author_sheets.remove(&scope);
        self.dirty_scopes.remove(&scope);
        self.tree_boundary_crossing_rules.reset(scope);
        self.style_tree.remove(scope);
        self.global_rule_set.mark_dirty();
    }

    // ── Updates ──────────────────────────────────────────────────────

    pub fn needs_update(&self) -> bool {
        !self.dirty_scopes.is_empty() || self.global_rule_set.is_dirty()
    }

    /// Re-index every dirty scope in document order and refresh the
    /// global rule set.
    pub fn update_active_style(&mut self, dom: &Dom) {
        if !self.needs_update() {
            return;
        }

        let mut scopes: Vec<NodeId> = self.dirty_scopes.drain().collect();
        scopes.sort_by(|&a, &b| dom.document_order(a, b));

        for scope in scopes {
            self.tree_boundary_crossing_rules.reset(scope);
            let sheets = self.author_sheets.get(&scope).cloned().unwrap_or_default();

            if sheets.is_empty() || !dom.contains(scope) {
                if let Some(resolver) = self
                    .style_tree
                    .scoped_style_resolver_for(scope)
                    .and_then(|id| self.style_tree.get_mut(id))
                {
                    resolver.reset_author_style();
                }
                self.style_tree.remove(scope);
                continue;
            }

            let id = self.style_tree.ensure_scoped_style_resolver(dom, scope);
            let Some(resolver) = self.style_tree.get_mut(id) else {
                continue;
            };
            resolver.reset_author_style();
            for sheet in &sheets {
                resolver.append_css_style_sheet(
                    dom,
                    sheet,
                    &self.evaluator,
                    AddRuleFlags::HAS_DOCUMENT_SECURITY_ORIGIN,
                    &mut self.tree_boundary_crossing_rules,
                );
            }
        }

        self.inline_styles.retain(|&element, _| dom.contains(element));
        self.global_rule_set.mark_dirty();
        let features = self
            .style_tree
            .iter()
            .flat_map(|(_, resolver)| resolver.rule_sets().iter().map(RuleSet::features));
        self.global_rule_set.update(features);
        debug!(
            resolvers = self.style_tree.len(),
            crossing_scopes = self.tree_boundary_crossing_rules.len(),
            "active style updated"
        );
    }

    /// Switch the media environment. Everything indexed under a media query
    /// whose result flips is rebuilt. Returns whether anything was rebuilt.
    pub fn set_media_environment(&mut self, dom: &Dom, media: MediaEnvironment) -> bool {
        let evaluator = MediaQueryEvaluator::new(media.clone());
        let changed = evaluator.any_result_changed(self.global_rule_set.default_style_viewport_results())
            || self.style_tree.iter().any(|(_, resolver)| {
                resolver
                    .rule_sets()
                    .iter()
                    .any(|set| evaluator.any_result_changed(set.viewport_dependent_media_query_results()))
            });
        self.evaluator = evaluator;
        self.config.media = media;
        if !changed {
            return false;
        }

        debug!("viewport-dependent media query changed, rebuilding");
        self.global_rule_set
            .set_default_style(&self.ua_sheets, &self.evaluator);
        self.dirty_scopes.extend(self.author_sheets.keys().copied());
        self.update_active_style(dom);
        true
    }

    /// Let document author rules style the inside of shadow root `root`.
    /// Returns `false` if `root` is not a shadow root.
    pub fn set_apply_author_styles(&mut self, dom: &mut Dom, root: NodeId, apply: bool) -> bool {
        match dom.get_mut(root).filter(|data| data.is_shadow_root()) {
            Some(data) => {
                data.apply_author_styles = apply;
                true
            }
            None => false,
        }
    }

    // ── Matching ─────────────────────────────────────────────────────

    /// Collect every rule matching `element`, updating dirty scopes first.
    pub fn match_element(&mut self, dom: &Dom, element: NodeId) -> MatchResult {
        self.update_active_style(dom);
        self.collect_match_result(dom, element, None, None)
    }

    /// Collect the rules of a generated pseudo-element such as `before`.
    pub fn match_pseudo_element(&mut self, dom: &Dom, element: NodeId, pseudo: &str) -> MatchResult {
        self.update_active_style(dom);
        self.collect_match_result(dom, element, Some(pseudo.to_owned()), None)
    }

    /// The style rules matching `element`, lowest priority first.
    pub fn matched_rules_for_inspection(&mut self, dom: &Dom, element: NodeId) -> Vec<Rc<StyleRule>> {
        self.update_active_style(dom);
        let (hosted, chain) = self.resolvers_for(dom, element);
        let mut collector = ElementRuleCollector::new(dom, element).collecting_for_inspection();
        self.collect_into(&mut collector, &hosted, &chain, None);
        collector.matched_rules_for_inspection().to_vec()
    }

    /// Match and cascade `element`.
    pub fn resolve_style(&mut self, dom: &Dom, element: NodeId) -> ComputedStyle {
        let result = self.match_element(dom, element);
        cascade::apply(&result, link_match_mode(dom, element))
    }

    /// Resolve every element under `root` depth first, shadow trees before
    /// light children, keeping the resolver cache and the ancestor filter in
    /// step with the walk.
    pub fn style_tree_walk(&mut self, dom: &Dom, root: NodeId) -> Vec<(NodeId, ComputedStyle)> {
        self.update_active_style(dom);
        let mut filter = AncestorFilter::new();
        if dom.is_element(root) {
            filter.setup_parent_stack(dom, root);
        }
        let mut styles = Vec::new();
        self.walk_node(dom, root, dom.parent_or_shadow_host(root), &mut filter, &mut styles);
        trace!(elements = styles.len(), "style tree walk finished");
        styles
    }

    fn walk_node(
        &mut self,
        dom: &Dom,
        node: NodeId,
        parent: Option<NodeId>,
        filter: &mut AncestorFilter,
        styles: &mut Vec<(NodeId, ComputedStyle)>,
    ) {
        self.style_tree.push_style_cache(dom, node, parent);

        let is_element = dom.is_element(node);
        if is_element {
            let result = self.collect_match_result(dom, node, None, Some(&*filter));
            styles.push((node, cascade::apply(&result, link_match_mode(dom, node))));
            filter.push_parent(dom, node);
        }
        for &shadow_root in dom.shadow_roots(node) {
            self.walk_node(dom, shadow_root, Some(node), filter, styles);
        }
        for &child in dom.children(node) {
            self.walk_node(dom, child, Some(node), filter, styles);
        }
        if is_element {
            filter.pop_parent(node);
        }

        self.style_tree.pop_style_cache(dom, node);
    }

    /// Whether `element` matches any rule that prevents sharing its style
    /// with a sibling: sibling-position or uncommon-attribute rules.
    pub fn style_sharing_blocked(&mut self, dom: &Dom, element: NodeId) -> bool {
        self.update_active_style(dom);
        let scope = Some(dom.tree_scope(element));
        let sets = [
            self.global_rule_set.sibling_rule_set(),
            self.global_rule_set.uncommon_attribute_rule_set(),
        ];
        let mut collector = ElementRuleCollector::new(dom, element);
        for set in sets.into_iter().flatten() {
            let request = MatchRequest::new(set, scope);
            collector.collect_matching_rules(&request, 0, BoundaryBehavior::empty(), true);
        }
        collector.pending_match_count() > 0
    }

    /// Hosted shadow-tree resolvers and the element's own filtered chain,
    /// innermost first.
    fn resolvers_for(&mut self, dom: &Dom, element: NodeId) -> (Vec<ResolverId>, Vec<ResolverId>) {
        let hosted = self
            .style_tree
            .collect_scoped_resolvers_for_hosted_shadow_trees(dom, element);
        let chain = self.style_tree.resolve_scoped_styles(dom, element);
        let chain = chain
            .into_iter()
            .filter(|&id| self.style_tree.applies_to_element(dom, id, element))
            .collect();
        (hosted, chain)
    }

    fn collect_match_result(
        &mut self,
        dom: &Dom,
        element: NodeId,
        pseudo_element: Option<String>,
        filter: Option<&AncestorFilter>,
    ) -> MatchResult {
        let (hosted, chain) = self.resolvers_for(dom, element);
        let inline_style = match pseudo_element {
            None => self.inline_style_for(dom, element),
            Some(_) => None,
        };

        let mut collector = ElementRuleCollector::new(dom, element).with_pseudo_element(pseudo_element);
        if let Some(filter) = filter {
            collector = collector.with_ancestor_filter(filter);
        }
        self.collect_into(&mut collector, &hosted, &chain, inline_style.as_ref());

        let result = collector.into_match_result();
        trace!(?element, matched = result.len(), scopes = result.author_range_ends().len(), "element matched");
        result
    }

    /// The parsed `style` attribute of `element`, if it has a valid one.
    fn inline_style_for(&mut self, dom: &Dom, element: NodeId) -> Option<Rc<DeclarationBlock>> {
        let Some(source) = dom.get(element).and_then(|data| data.attribute("style")) else {
            self.inline_styles.remove(&element);
            return None;
        };
        if let Some((cached, block)) = self.inline_styles.get(&element) {
            if *cached == *source {
                return Some(Rc::clone(block));
            }
        }
        match parse_declaration_list(&source) {
            Ok(block) if block.is_empty() => {
                self.inline_styles.remove(&element);
                None
            }
            Ok(block) => {
                let block = Rc::new(block);
                self.inline_styles
                    .insert(element, (source.into_owned(), Rc::clone(&block)));
                Some(block)
            }
            Err(error) => {
                warn!(?element, %error, "inline style ignored");
                self.inline_styles.remove(&element);
                None
            }
        }
    }

    /// User-agent rules, then one author range per hosted shadow tree for
    /// its `:host` rules, one per slot scope the element is distributed
    /// through, and last one range for the element's own scope with the
    /// boundary-crossing rules and the inline style.
    fn collect_into<'a>(
        &'a self,
        collector: &mut ElementRuleCollector<'a>,
        hosted: &[ResolverId],
        chain: &[ResolverId],
        inline_style: Option<&Rc<DeclarationBlock>>,
    ) {
        let include_empty_rules = self.config.include_empty_rules;

        let default_style = MatchRequest::new(self.global_rule_set.default_style(), None);
        collector.collect_matching_rules(&default_style, 0, BoundaryBehavior::empty(), include_empty_rules);
        collector.finish_adding_ua_rules();

        for resolver in hosted.iter().filter_map(|&id| self.style_tree.get(id)) {
            resolver.collect_matching_shadow_host_rules(collector, include_empty_rules, 0);
            collector.finish_adding_author_rules_for_tree_scope();
        }

        self.collect_slotted_rules(collector, include_empty_rules);

        // Innermost scope gets the highest order.
        for (i, resolver) in chain.iter().filter_map(|&id| self.style_tree.get(id)).enumerate() {
            let order = (chain.len() - i) as CascadeOrder;
            resolver.collect_matching_author_rules(collector, include_empty_rules, order);
        }
        let element_scope_order = chain.len() as CascadeOrder;
        self.tree_boundary_crossing_rules.collect_tree_boundary_crossing_rules(
            collector,
            element_scope_order,
            include_empty_rules,
        );
        if let Some(block) = inline_style {
            // Parsed from immutable attribute text.
            collector.add_element_style_properties(block, true);
        }
        collector.finish_adding_author_rules_for_tree_scope();
    }

    /// One range per tree scope along the element's slot chain, the scope
    /// of the last slot first. The slot nearest the element ends up last
    /// and wins among them.
    fn collect_slotted_rules<'a>(&'a self, collector: &mut ElementRuleCollector<'a>, include_empty_rules: bool) {
        let dom = collector.dom();
        let mut scopes = Vec::new();
        let mut slot = dom.assigned_slot(collector.element());
        while let Some(current) = slot {
            scopes.push(dom.tree_scope(current));
            slot = dom.assigned_slot(current);
        }

        for &scope in scopes.iter().rev() {
            if !self.tree_boundary_crossing_rules.has_distributed_rules(scope) {
                continue;
            }
            self.tree_boundary_crossing_rules
                .collect_distributed_rules(collector, scope, include_empty_rules);
            collector.finish_adding_author_rules_for_tree_scope();
        }
    }

    // ── At-rules ─────────────────────────────────────────────────────

    /// The `@keyframes` named `name` visible to `element`.
    pub fn keyframes_for(&mut self, dom: &Dom, element: NodeId, name: &str) -> Option<Rc<KeyframesRule>> {
        self.update_active_style(dom);
        self.style_tree
            .resolve_scoped_keyframes_rules(dom, element)
            .into_iter()
            .find_map(|id| self.style_tree.get(id)?.keyframes_rule(name).cloned())
    }

    /// `@font-face` rules of the user-agent sheets and the document.
    pub fn font_face_rules(&self) -> Vec<Rc<FontFaceRule>> {
        let mut rules = self.global_rule_set.default_style().font_face_rules().to_vec();
        if let Some(document) = self.document_resolver() {
            rules.extend(document.font_face_rules().cloned());
        }
        rules
    }

    /// `@page` rules of the user-agent sheets and the document.
    pub fn page_rules(&self) -> Vec<Rc<PageRule>> {
        let mut rules = self.global_rule_set.default_style().page_rules().to_vec();
        if let Some(document) = self.document_resolver() {
            rules.extend(document.page_rules().cloned());
        }
        rules
    }

    fn document_resolver(&self) -> Option<&ScopedStyleResolver> {
        self.style_tree
            .document_resolver()
            .and_then(|id| self.style_tree.get(id))
    }
}

impl Default for StyleEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// `VISITED` for a visited link, `LINK` for anything else.
fn link_match_mode(dom: &Dom, element: NodeId) -> LinkMatchType {
    match dom.get(element) {
        Some(data) if data.is_link() && data.visited => LinkMatchType::VISITED,
        _ => LinkMatchType::LINK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{NodeData, ShadowRootMode};
    use pretty_assertions::assert_eq;

    fn engine() -> StyleEngine {
        StyleEngine::new(EngineConfig::new().with_default_style(false))
    }

    fn color(engine: &mut StyleEngine, dom: &Dom, element: NodeId) -> Option<String> {
        engine.resolve_style(dom, element).get_css("color")
    }

    // ── Sheets ───────────────────────────────────────────────────────

    #[test]
    fn test_author_sheet_requires_tree_scope() {
        let mut dom = Dom::new();
        let div = dom.insert_child(dom.document(), NodeData::element("div"));
        let mut engine = engine();

        let err = engine.add_author_css(&dom, div, "p { color: red }").unwrap_err();
        assert!(matches!(err, StyleEngineError::NotATreeScope(node) if node == div));
        let err = engine.add_author_css(&dom, dom.document(), "p { color: red;").unwrap_err();
        assert!(matches!(err, StyleEngineError::Parse(_)));
    }

    #[test]
    fn test_update_is_lazy() {
        let mut dom = Dom::new();
        let p = dom.insert_child(dom.document(), NodeData::element("p"));
        let mut engine = engine();
        engine.add_author_css(&dom, dom.document(), "p { color: red }").unwrap();
        assert!(engine.needs_update());

        assert_eq!(color(&mut engine, &dom, p).as_deref(), Some("red"));
        assert!(!engine.needs_update());
    }

    #[test]
    fn test_removing_sheets_clears_style() {
        let mut dom = Dom::new();
        let host = dom.insert_child(dom.document(), NodeData::element("x-host"));
        let root = dom.attach_shadow(host, ShadowRootMode::Open);
        let p = dom.insert_child(root, NodeData::element("p"));
        let mut engine = engine();
        let sheet = engine.add_author_css(&dom, root, "p { color: red }").unwrap();
        assert_eq!(color(&mut engine, &dom, p).as_deref(), Some("red"));
        assert!(engine.style_tree().scoped_style_resolver_for(root).is_some());

        assert!(engine.remove_author_sheet(root, &sheet));
        assert_eq!(color(&mut engine, &dom, p), None);
        assert!(engine.style_tree().scoped_style_resolver_for(root).is_none());
    }

    // ── Matching ─────────────────────────────────────────────────────

    #[test]
    fn test_shadow_host_rules_get_own_range() {
        let mut dom = Dom::new();
        let host = dom.insert_child(dom.document(), NodeData::element("x-card"));
        let root = dom.attach_shadow(host, ShadowRootMode::Open);
        let mut engine = engine();
        engine.add_author_css(&dom, dom.document(), "x-card { color: blue }").unwrap();
        engine.add_author_css(&dom, root, ":host { color: red; margin: 1px }").unwrap();

        let result = engine.match_element(&dom, host);
        assert_eq!(result.ua_range_end(), 0);
        assert_eq!(result.author_range_ends(), &[1, 2]);
        let style = cascade::apply(&result, LinkMatchType::LINK);
        assert_eq!(style.get_css("color").as_deref(), Some("blue"));
        assert_eq!(style.get_css("margin").as_deref(), Some("1px"));
    }

    #[test]
    fn test_deep_rule_orders_by_position_within_its_sheet() {
        let mut dom = Dom::new();
        let div = dom.insert_child(dom.document(), NodeData::element("div").with_classes(["a", "x"]));
        let p = dom.insert_child(div, NodeData::element("p").with_class("b"));

        let mut deep_first = engine();
        deep_first
            .add_author_css(&dom, dom.document(), ".a /deep/ .b { color: red } .x .b { color: blue }")
            .unwrap();
        assert_eq!(color(&mut deep_first, &dom, p).as_deref(), Some("blue"));

        let mut deep_last = engine();
        deep_last
            .add_author_css(&dom, dom.document(), ".x .b { color: blue } .a /deep/ .b { color: red }")
            .unwrap();
        assert_eq!(color(&mut deep_last, &dom, p).as_deref(), Some("red"));
    }

    #[test]
    fn test_outer_deep_rule_beats_shadow_rule_of_equal_specificity() {
        let mut dom = Dom::new();
        let div = dom.insert_child(dom.document(), NodeData::element("div").with_class("a"));
        let host = dom.insert_child(div, NodeData::element("x-host"));
        let root = dom.attach_shadow(host, ShadowRootMode::Open);
        let p = dom.insert_child(root, NodeData::element("p").with_classes(["b", "c"]));

        let mut engine = engine();
        engine.add_author_css(&dom, dom.document(), ".a /deep/ .b { color: red }").unwrap();
        engine.add_author_css(&dom, root, ".c.b { color: green }").unwrap();
        assert_eq!(color(&mut engine, &dom, p).as_deref(), Some("red"));
    }

    #[test]
    fn test_slotted_rules_get_own_range_before_element_scope() {
        let mut dom = Dom::new();
        let host = dom.insert_child(dom.document(), NodeData::element("x-card"));
        let p = dom.insert_child(host, NodeData::element("p"));
        let root = dom.attach_shadow(host, ShadowRootMode::Open);
        dom.insert_child(root, NodeData::element("slot"));

        let mut engine = engine();
        engine
            .add_author_css(&dom, dom.document(), "p { color: blue; margin: 1px !important }")
            .unwrap();
        engine
            .add_author_css(&dom, root, "::slotted(p) { color: red; margin: 2px !important }")
            .unwrap();

        let result = engine.match_element(&dom, p);
        assert_eq!(result.author_range_ends(), &[1, 2]);
        let style = cascade::apply(&result, LinkMatchType::LINK);
        assert_eq!(style.get_css("color").as_deref(), Some("blue"));
        assert_eq!(style.get_css("margin").as_deref(), Some("2px"));
    }

    #[test]
    fn test_nested_slot_scopes_each_get_a_range() {
        // span is slotted into outer_root, whose slot is slotted into inner_root.
        let mut dom = Dom::new();
        let outer_host = dom.insert_child(dom.document(), NodeData::element("x-outer"));
        let span = dom.insert_child(outer_host, NodeData::element("span"));
        let outer_root = dom.attach_shadow(outer_host, ShadowRootMode::Open);
        let inner_host = dom.insert_child(outer_root, NodeData::element("x-inner"));
        let outer_slot = dom.insert_child(inner_host, NodeData::element("slot"));
        let inner_root = dom.attach_shadow(inner_host, ShadowRootMode::Open);
        dom.insert_child(inner_root, NodeData::element("slot"));
        assert_eq!(dom.assigned_slot(span), Some(outer_slot));

        let mut engine = engine();
        engine.add_author_css(&dom, outer_root, "::slotted(span) { color: red }").unwrap();
        engine
            .add_author_css(&dom, inner_root, "::slotted(span) { color: blue; margin: 1px }")
            .unwrap();

        let result = engine.match_element(&dom, span);
        // inner_root's range comes first, then outer_root's, then the empty
        // document scope.
        assert_eq!(result.author_range_ends(), &[1, 2, 2]);
        let style = cascade::apply(&result, LinkMatchType::LINK);
        assert_eq!(style.get_css("color").as_deref(), Some("red"));
        assert_eq!(style.get_css("margin").as_deref(), Some("1px"));
    }

    // ── Inline style ─────────────────────────────────────────────────

    #[test]
    fn test_inline_style_ends_element_scope_range() {
        let mut dom = Dom::new();
        let p = dom.insert_child(
            dom.document(),
            NodeData::element("p")
                .with_id("x")
                .with_attribute("style", "color: green; margin: 3px"),
        );
        let mut engine = engine();
        engine
            .add_author_css(&dom, dom.document(), "#x { color: red; margin: 1px !important }")
            .unwrap();

        let result = engine.match_element(&dom, p);
        assert_eq!(result.author_range_ends(), &[2]);
        assert!(result.is_cacheable());
        let style = cascade::apply(&result, LinkMatchType::LINK);
        assert_eq!(style.get_css("color").as_deref(), Some("green"));
        assert_eq!(style.get_css("margin").as_deref(), Some("1px"));

        assert_eq!(engine.match_pseudo_element(&dom, p, "before").len(), 0);
        assert_eq!(engine.matched_rules_for_inspection(&dom, p).len(), 1);
    }

    #[test]
    fn test_inline_style_follows_attribute_changes() {
        let mut dom = Dom::new();
        let p = dom.insert_child(
            dom.document(),
            NodeData::element("p").with_attribute("style", "color: green"),
        );
        let mut engine = engine();
        engine.add_author_css(&dom, dom.document(), "p { color: red }").unwrap();
        assert_eq!(color(&mut engine, &dom, p).as_deref(), Some("green"));

        if let Some(data) = dom.get_mut(p) {
            data.set_attribute("style", "color: teal");
        }
        assert_eq!(color(&mut engine, &dom, p).as_deref(), Some("teal"));

        // An unparsable attribute is ignored.
        if let Some(data) = dom.get_mut(p) {
            data.set_attribute("style", "color: red }");
        }
        assert_eq!(color(&mut engine, &dom, p).as_deref(), Some("red"));
    }

    #[test]
    fn test_document_rules_stay_out_of_shadow_tree() {
        let mut dom = Dom::new();
        let host = dom.insert_child(dom.document(), NodeData::element("div"));
        let root = dom.attach_shadow(host, ShadowRootMode::Open);
        let p = dom.insert_child(root, NodeData::element("p"));
        let mut engine = engine();
        engine.add_author_css(&dom, dom.document(), "p { color: red }").unwrap();

        assert_eq!(color(&mut engine, &dom, p), None);
        assert!(engine.set_apply_author_styles(&mut dom, root, true));
        assert_eq!(color(&mut engine, &dom, p).as_deref(), Some("red"));
        assert!(!engine.set_apply_author_styles(&mut dom, host, true));
    }

    #[test]
    fn test_visited_link_uses_visited_rules() {
        let mut dom = Dom::new();
        let a = dom.insert_child(
            dom.document(),
            NodeData::element("a").with_attribute("href", "/x").visited(true),
        );
        let b = dom.insert_child(dom.document(), NodeData::element("a").with_attribute("href", "/y"));
        let mut engine = engine();
        engine
            .add_author_css(&dom, dom.document(), "a:link { color: blue } a:visited { color: purple }")
            .unwrap();

        assert_eq!(color(&mut engine, &dom, a).as_deref(), Some("purple"));
        assert_eq!(color(&mut engine, &dom, b).as_deref(), Some("blue"));
    }

    #[test]
    fn test_pseudo_element_matching() {
        let mut dom = Dom::new();
        let p = dom.insert_child(dom.document(), NodeData::element("p"));
        let mut engine = engine();
        engine
            .add_author_css(&dom, dom.document(), "p { color: red } p::before { color: blue }")
            .unwrap();

        let before = engine.match_pseudo_element(&dom, p, "before");
        assert_eq!(before.author_rules().len(), 1);
        assert_eq!(engine.match_element(&dom, p).author_rules().len(), 1);
    }

    #[test]
    fn test_walk_agrees_with_single_resolution() {
        let mut dom = Dom::new();
        let div = dom.insert_child(dom.document(), NodeData::element("div").with_class("a"));
        let host = dom.insert_child(div, NodeData::element("x-box"));
        let root = dom.attach_shadow(host, ShadowRootMode::Open);
        let span = dom.insert_child(root, NodeData::element("span").with_class("b"));
        dom.insert_child(span, NodeData::element("em").with_class("b"));
        dom.insert_child(host, NodeData::element("p").with_class("b"));

        let mut engine = engine();
        engine
            .add_author_css(&dom, dom.document(), ".a .b { color: red } .a /deep/ .b { margin: 1px }")
            .unwrap();
        engine
            .add_author_css(&dom, root, "span .b { color: green } :host { padding: 2px }")
            .unwrap();

        let walked = engine.style_tree_walk(&dom, dom.document());
        assert_eq!(walked.len(), 5);
        for (element, style) in walked {
            assert_eq!(style, engine.resolve_style(&dom, element));
        }
    }

    #[test]
    fn test_inspection_lists_rules_in_cascade_order() {
        let mut dom = Dom::new();
        let p = dom.insert_child(dom.document(), NodeData::element("p").with_id("x"));
        let mut engine = engine();
        engine
            .add_author_css(&dom, dom.document(), "#x { a: 1 } p { a: 2 } * { a: 3 }")
            .unwrap();

        let rules = engine.matched_rules_for_inspection(&dom, p);
        let texts: Vec<_> = rules.iter().map(|r| r.selector_text()).collect();
        assert_eq!(texts, vec!["*", "p", "#x"]);
    }

    #[test]
    fn test_style_sharing_blocked() {
        let mut dom = Dom::new();
        let ul = dom.insert_child(dom.document(), NodeData::element("ul"));
        let first = dom.insert_child(ul, NodeData::element("li"));
        let second = dom.insert_child(ul, NodeData::element("li"));
        let mut engine = engine();
        engine
            .add_author_css(&dom, dom.document(), "li:first-child { a: 1 } li { a: 2 }")
            .unwrap();

        assert!(engine.style_sharing_blocked(&dom, first));
        assert!(!engine.style_sharing_blocked(&dom, second));
    }

    // ── At-rules ─────────────────────────────────────────────────────

    #[test]
    fn test_keyframes_lookup_prefers_inner_scope() {
        let mut dom = Dom::new();
        let host = dom.insert_child(dom.document(), NodeData::element("x-a"));
        let root = dom.attach_shadow(host, ShadowRootMode::Open);
        let inner = dom.insert_child(root, NodeData::element("div"));
        let outer = dom.insert_child(dom.document(), NodeData::element("div"));
        let mut engine = engine();
        engine
            .add_author_css(&dom, dom.document(), "@keyframes spin { from { a: 1 } } @page { margin: 1px }")
            .unwrap();
        engine
            .add_author_css(&dom, root, "@keyframes spin { to { a: 2 } }")
            .unwrap();

        let keys = |rule: Option<Rc<KeyframesRule>>| rule.map(|r| r.frames[0].keys.clone());
        assert_eq!(keys(engine.keyframes_for(&dom, inner, "spin")), Some(vec!["to".to_string()]));
        assert_eq!(keys(engine.keyframes_for(&dom, outer, "spin")), Some(vec!["from".to_string()]));
        assert_eq!(keys(engine.keyframes_for(&dom, host, "spin")), Some(vec!["to".to_string()]));
        assert!(engine.keyframes_for(&dom, outer, "missing").is_none());
        assert_eq!(engine.page_rules().len(), 1);
    }

    #[test]
    fn test_media_change_rebuilds() {
        let mut dom = Dom::new();
        let p = dom.insert_child(dom.document(), NodeData::element("p"));
        let mut engine = engine();
        engine
            .add_author_css(&dom, dom.document(), "@media (max-width: 600px) { p { color: red } }")
            .unwrap();
        assert_eq!(color(&mut engine, &dom, p), None);

        assert!(!engine.set_media_environment(&dom, MediaEnvironment::screen(800.0, 600.0)));
        assert!(engine.set_media_environment(&dom, MediaEnvironment::screen(500.0, 600.0)));
        assert_eq!(color(&mut engine, &dom, p).as_deref(), Some("red"));
    }

    #[test]
    fn test_default_style_applies_first() {
        let mut dom = Dom::new();
        let div = dom.insert_child(dom.document(), NodeData::element("div"));
        let mut engine = StyleEngine::default();
        engine.add_author_css(&dom, dom.document(), "div { color: red }").unwrap();

        let style = engine.resolve_style(&dom, div);
        assert_eq!(style.get_css("display").as_deref(), Some("block"));
        assert_eq!(style.get_css("color").as_deref(), Some("red"));
    }
}
