//! Integration tests for scoped-cascade.
//!
//! These tests exercise the public API from outside the crate, verifying that
//! sheet indexing, the scoped resolver forest, boundary-crossing rules and the
//! cascade work together.

use std::rc::Rc;

use pretty_assertions::assert_eq;
use scoped_cascade::css::media::MediaQueryEvaluator;
use scoped_cascade::css::parser::parse_css;
use scoped_cascade::dom::{NodeData, ShadowRootMode};
use scoped_cascade::style::boundary_crossing::{ScopeRelation, TreeBoundaryCrossingRules};
use scoped_cascade::style::collector::ElementRuleCollector;
use scoped_cascade::style::rule_data::{AddRuleFlags, LinkMatchType, PropertyWhitelist};
use scoped_cascade::style::{
    BuildMode, EngineConfig, MatchResult, MatchedProperties, RuleSet, StyleEngine,
};
use scoped_cascade::testing::{dump_match_result, dump_rule_set, dump_style, ShadowFixture, TreeBuilder};

/// Route engine logs to the test output when `RUST_LOG` is set.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine() -> StyleEngine {
    init_tracing();
    StyleEngine::new(EngineConfig::new().with_default_style(false))
}

fn indexed(css: &str) -> RuleSet {
    let sheet = parse_css(css).unwrap();
    let mut rules = RuleSet::new();
    rules.add_rules_from_sheet(&sheet, &MediaQueryEvaluator::default(), AddRuleFlags::empty());
    rules.compact_rules_if_needed();
    rules
}

// ---------------------------------------------------------------------------
// Rule set indexing
// ---------------------------------------------------------------------------

#[test]
fn test_rules_land_in_one_bucket_each() {
    let rules = indexed("#id1 {x:1} .cls1 {x:2} div {x:3} * {x:4}");
    insta::assert_snapshot!(dump_rule_set(&rules), @r"
    id id1: #id1@0
    class cls1: .cls1@1
    tag div: div@2
    universal: *@3
    ");
}

#[test]
fn test_selector_list_and_side_lists() {
    let rules = indexed(
        "h1, .title, #main { a: 1 } \
         :host(.dark) { a: 2 } \
         ::slotted(span) { a: 3 } \
         .x::content p { a: 4 } \
         @media print { p { a: 5 } } \
         @keyframes fade { from { opacity: 0 } }",
    );
    insta::assert_snapshot!(dump_rule_set(&rules), @r"
    id main: #main@2
    class title: .title@1
    tag h1: h1@0
    shadow-host: :host(.dark)@3
    content: .x::content p@5
    slotted: ::slotted(span)@4
    keyframes: fade
    ");
}

// ---------------------------------------------------------------------------
// Match result ranges
// ---------------------------------------------------------------------------

#[test]
fn test_match_result_ranges() {
    let sheet = parse_css("a { p: 1 } b { p: 2 } c { p: 3 } d { p: 4 } e { p: 5 }").unwrap();
    let blocks: Vec<_> = sheet.style_rules().map(|r| Rc::clone(&r.block)).collect();
    let props = |i: usize| {
        MatchedProperties::new(Rc::clone(&blocks[i]), LinkMatchType::ALL, PropertyWhitelist::None)
    };

    let mut result = MatchResult::new();
    result.add_matched_properties(props(0));
    result.add_matched_properties(props(1));
    result.finish_adding_ua_rules();
    result.add_matched_properties(props(2));
    result.finish_adding_author_rules_for_tree_scope();
    result.add_matched_properties(props(3));
    result.add_matched_properties(props(4));
    result.finish_adding_author_rules_for_tree_scope();

    assert_eq!(result.ua_range_end(), 2);
    assert_eq!(result.author_range_ends(), &[3, 5]);
    assert_eq!(result.author_rules().len(), 3);
    let important: Vec<_> = result.important_author_ranges().collect();
    assert_eq!(important, vec![3..5, 2..3]);
}

// ---------------------------------------------------------------------------
// Boundary-crossing rules
// ---------------------------------------------------------------------------

#[test]
fn test_deep_rule_from_document_reaches_shadow_tree_as_outer() {
    let f = ShadowFixture::new();
    let document = f.dom.document();
    let mut engine = engine();
    engine
        .add_author_css(&f.dom, document, ".a /deep/ .b { color: red }")
        .unwrap();
    engine.add_author_css(&f.dom, f.root, "p { margin: 0 }").unwrap();
    engine.update_active_style(&f.dom);

    let crossing = engine.tree_boundary_crossing_rules();
    assert_eq!(crossing.scoping_nodes(), &[document]);
    let orders = crossing.cascade_orders(&f.dom, f.shadow_p, 1);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].relation, ScopeRelation::Outer);

    let mut collector = ElementRuleCollector::new(&f.dom, f.shadow_p);
    crossing.collect_tree_boundary_crossing_rules(&mut collector, 1, false);
    assert_eq!(collector.pending_match_count(), 1);

    let style = engine.resolve_style(&f.dom, f.shadow_p);
    insta::assert_snapshot!(dump_style(&style), @r"
    color: red
    margin: 0
    ");
}

#[test]
fn test_cascade_orders_are_disjoint() {
    let f = ShadowFixture::new();
    let mut crossing = TreeBoundaryCrossingRules::new();
    for scope in [f.dom.document(), f.root, f.inner_root] {
        let sheet = Rc::new(parse_css(".a /deep/ .b { x: 1 }").unwrap());
        let mut rules = RuleSet::new();
        rules.add_rules_from_sheet(&sheet, &MediaQueryEvaluator::default(), AddRuleFlags::empty());
        rules.compact_rules_if_needed();
        crossing.add_tree_boundary_crossing_rules(&f.dom, &rules, scope, &sheet, 0);
    }
    let element_scope_order = 2;

    for element in [f.outer, f.shadow_p, f.inner_span] {
        let orders = crossing.cascade_orders(&f.dom, element, element_scope_order);
        assert_eq!(orders.len(), crossing.len());
        let of = |relation| -> Vec<u32> {
            orders.iter().filter(|o| o.relation == relation).map(|o| o.order).collect()
        };
        let (outer, own, inner) = (of(ScopeRelation::Outer), of(ScopeRelation::Own), of(ScopeRelation::Inner));

        assert_eq!(own, vec![element_scope_order]);
        assert!(inner.iter().all(|&o| o > element_scope_order));
        assert!(outer.iter().all(|&o| inner.iter().all(|&i| o > i) && o > element_scope_order));
        let mut all: Vec<u32> = orders.iter().map(|o| o.order).collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), orders.len());
    }
}

#[test]
fn test_later_plain_rule_beats_earlier_deep_rule() {
    let mut tree = TreeBuilder::new();
    tree.open(NodeData::element("div").with_classes(["a", "x"]));
    let p = tree.child(NodeData::element("p").with_class("b"));
    let dom = tree.finish();

    let mut engine = engine();
    engine
        .add_author_css(&dom, dom.document(), ".a /deep/ .b { color: red } .x .b { color: blue }")
        .unwrap();
    assert_eq!(engine.resolve_style(&dom, p).get_css("color").as_deref(), Some("blue"));
}

#[test]
fn test_outer_deep_rule_beats_shadow_rule_of_equal_specificity() {
    let mut tree = TreeBuilder::new();
    tree.open(NodeData::element("div").with_class("a"));
    tree.open(NodeData::element("x-host"));
    let root = tree.shadow(ShadowRootMode::Open);
    let p = tree.child(NodeData::element("p").with_classes(["b", "c"]));
    let dom = tree.finish();

    let mut engine = engine();
    engine.add_author_css(&dom, dom.document(), ".a /deep/ .b { color: red }").unwrap();
    engine.add_author_css(&dom, root, ".c.b { color: green }").unwrap();
    assert_eq!(engine.resolve_style(&dom, p).get_css("color").as_deref(), Some("red"));
}

#[test]
fn test_slotted_rule_styles_light_child() {
    let f = ShadowFixture::new();
    let mut engine = engine();
    engine
        .add_author_css(&f.dom, f.root, "::slotted(.light) { color: green } p { color: red }")
        .unwrap();

    assert_eq!(engine.resolve_style(&f.dom, f.light_p).get_css("color").as_deref(), Some("green"));
    assert_eq!(engine.resolve_style(&f.dom, f.shadow_p).get_css("color").as_deref(), Some("red"));
}

#[test]
fn test_slotted_rules_match_in_their_own_range() {
    let mut tree = TreeBuilder::new();
    tree.open(NodeData::element("x-card"));
    let root = tree.shadow(ShadowRootMode::Open);
    tree.child(NodeData::element("slot"));
    tree.close();
    let p = tree.child(NodeData::element("p"));
    let dom = tree.finish();

    let mut engine = engine();
    engine
        .add_author_css(&dom, dom.document(), "p { color: blue; margin: 1px !important }")
        .unwrap();
    engine
        .add_author_css(&dom, root, "::slotted(p) { color: red; margin: 2px !important }")
        .unwrap();

    let result = engine.match_element(&dom, p);
    insta::assert_snapshot!(dump_match_result(&result), @r"
    ua:
    scope 0:
      color: red; margin: 2px !important
    scope 1:
      color: blue; margin: 1px !important
    ");
    insta::assert_snapshot!(dump_style(&engine.resolve_style(&dom, p)), @r"
    color: blue
    margin: 2px
    ");
}

// ---------------------------------------------------------------------------
// Scoped resolver forest
// ---------------------------------------------------------------------------

#[test]
fn test_removing_scope_reparents_children() {
    let f = ShadowFixture::new();
    let mut engine = StyleEngine::new(
        EngineConfig::new()
            .with_default_style(false)
            .with_tree_build_mode(BuildMode::ReparentByContainment),
    );
    engine.add_author_css(&f.dom, f.inner_root, "span { a: 1 }").unwrap();
    engine.add_author_css(&f.dom, f.root, "p { a: 2 }").unwrap();
    engine.update_active_style(&f.dom);

    let tree = engine.style_tree();
    let document = tree.document_resolver();
    let root = tree.scoped_style_resolver_for(f.root);
    let inner = tree.scoped_style_resolver_for(f.inner_root).unwrap();
    assert_eq!(tree.parent_of(inner), root);

    engine.remove_author_sheets(f.root);
    engine.update_active_style(&f.dom);
    let tree = engine.style_tree();
    assert_eq!(tree.scoped_style_resolver_for(f.root), None);
    assert_eq!(tree.parent_of(inner), document);
}

#[test]
fn test_walk_matches_fresh_resolution() {
    let f = ShadowFixture::new();
    let mut engine = engine();
    engine
        .add_author_css(&f.dom, f.dom.document(), ".a .b { a: 1 } .a /deep/ .b { b: 2 } p { c: 3 }")
        .unwrap();
    engine
        .add_author_css(&f.dom, f.root, ":host { d: 4 } x-inner::shadow span { e: 5 } ::slotted(p) { f: 6 }")
        .unwrap();
    engine.add_author_css(&f.dom, f.inner_root, "span { g: 7 }").unwrap();

    let walked = engine.style_tree_walk(&f.dom, f.dom.document());
    let elements: Vec<_> = walked.iter().map(|(id, _)| *id).collect();
    assert_eq!(
        elements,
        vec![f.outer, f.host, f.shadow_p, f.slot, f.inner_host, f.inner_span, f.light_p]
    );
    for (element, style) in walked {
        assert_eq!(style, engine.resolve_style(&f.dom, element), "element {element:?}");
    }
}

// ---------------------------------------------------------------------------
// Full cascade
// ---------------------------------------------------------------------------

#[test]
fn test_full_cascade_with_important_reversal() {
    let mut tree = TreeBuilder::new();
    let host = tree.open(NodeData::element("x-card").with_class("card"));
    let root = tree.shadow(ShadowRootMode::Open);
    let dom = tree.finish();

    let mut engine = engine();
    engine
        .add_author_css(&dom, dom.document(), ".card { color: blue; border: thin !important; margin: 4px }")
        .unwrap();
    engine
        .add_author_css(&dom, root, ":host { color: red; border: thick !important; padding: 1px }")
        .unwrap();

    let result = engine.match_element(&dom, host);
    insta::assert_snapshot!(dump_match_result(&result), @r"
    ua:
    scope 0:
      color: red; border: thick !important; padding: 1px
    scope 1:
      color: blue; border: thin !important; margin: 4px
    ");

    let style = engine.resolve_style(&dom, host);
    insta::assert_snapshot!(dump_style(&style), @r"
    border: thick
    color: blue
    margin: 4px
    padding: 1px
    ");
}

#[test]
fn test_inline_style_closes_element_scope() {
    let mut tree = TreeBuilder::new();
    let p = tree.child(
        NodeData::element("p")
            .with_class("c")
            .with_attribute("style", "color: green; padding: 2px"),
    );
    let dom = tree.finish();

    let mut engine = engine();
    engine
        .add_author_css(&dom, dom.document(), ".c { color: red; padding: 1px !important; margin: 0 }")
        .unwrap();

    let result = engine.match_element(&dom, p);
    insta::assert_snapshot!(dump_match_result(&result), @r"
    ua:
    scope 0:
      color: red; padding: 1px !important; margin: 0
      color: green; padding: 2px
    ");
    insta::assert_snapshot!(dump_style(&engine.resolve_style(&dom, p)), @r"
    color: green
    margin: 0
    padding: 1px
    ");
}

#[test]
fn test_specificity_then_scope_then_position() {
    let mut tree = TreeBuilder::new();
    let p = tree.child(NodeData::element("p").with_id("x").with_class("c"));
    let dom = tree.finish();

    let mut engine = engine();
    engine
        .add_author_css(&dom, dom.document(), "#x { a: id } .c { a: class; b: first } .c { b: second } p { a: tag }")
        .unwrap();

    let style = engine.resolve_style(&dom, p);
    assert_eq!(style.get_css("a").as_deref(), Some("id"));
    assert_eq!(style.get_css("b").as_deref(), Some("second"));
}
