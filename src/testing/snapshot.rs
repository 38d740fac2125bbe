//! Snapshot rendering helpers.
//!
//! Functions for converting rule sets, match results and cascaded styles into
//! plain-text strings suitable for snapshot testing and assertions.

use std::fmt::Write;

use crate::css::model::{values_to_css, DeclarationBlock};
use crate::style::cascade::ComputedStyle;
use crate::style::match_result::{MatchResult, MatchedProperties};
use crate::style::rule_data::{LinkMatchType, MinimalRuleData, PropertyWhitelist, RuleData};
use crate::style::rule_set::{RuleMap, RuleSet};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render the buckets and side lists of a compacted rule set.
///
/// One line per non-empty bucket, keyed buckets sorted by key. Each entry is
/// written as `selector@position`.
///
/// # Examples
///
/// ```ignore
/// let dump = dump_rule_set(&rules);
/// assert!(dump.contains("class cls1: .cls1@1"));
/// ```
pub fn dump_rule_set(rules: &RuleSet) -> String {
    let mut out = String::new();

    dump_map(&mut out, "id", rules.id_map());
    dump_map(&mut out, "class", rules.class_map());
    dump_map(&mut out, "shadow-pseudo", rules.shadow_pseudo_element_map());
    dump_map(&mut out, "tag", rules.tag_map());
    dump_list(&mut out, "link", rules.link_pseudo_class_rules());
    dump_list(&mut out, "cue", rules.cue_pseudo_rules());
    dump_list(&mut out, "focus", rules.focus_pseudo_class_rules());
    dump_list(&mut out, "shadow-host", rules.shadow_host_rules());
    dump_list(&mut out, "universal", rules.universal_rules());

    dump_minimal(&mut out, "deep", rules.deep_combinator_or_shadow_pseudo_rules());
    dump_minimal(&mut out, "content", rules.content_pseudo_element_rules());
    dump_minimal(&mut out, "slotted", rules.slotted_pseudo_element_rules());

    dump_count(&mut out, "page", rules.page_rules().len());
    dump_count(&mut out, "viewport", rules.viewport_rules().len());
    dump_count(&mut out, "font-face", rules.font_face_rules().len());
    let keyframes: Vec<&str> = rules.keyframes_rules().iter().map(|k| k.name.as_str()).collect();
    if !keyframes.is_empty() {
        let _ = writeln!(out, "keyframes: {}", keyframes.join(", "));
    }

    trim_trailing_newline(out)
}

/// Render a match result range by range.
///
/// The user-agent range comes first, then one `scope N` section per author
/// tree-scope range. Each entry lists its declarations, followed by its link
/// match type and property whitelist when they are not the defaults.
pub fn dump_match_result(result: &MatchResult) -> String {
    let mut out = String::new();
    let matched = result.matched_properties();

    let _ = writeln!(out, "ua:");
    for entry in &matched[..result.ua_range_end()] {
        dump_entry(&mut out, entry);
    }

    let mut start = result.ua_range_end();
    for (scope, &end) in result.author_range_ends().iter().enumerate() {
        let _ = writeln!(out, "scope {scope}:");
        for entry in &matched[start..end] {
            dump_entry(&mut out, entry);
        }
        start = end;
    }
    if start < matched.len() {
        let _ = writeln!(out, "unfinished:");
        for entry in &matched[start..] {
            dump_entry(&mut out, entry);
        }
    }

    trim_trailing_newline(out)
}

/// Render a cascaded style, one `property: value` line per property in
/// name order.
pub fn dump_style(style: &ComputedStyle) -> String {
    style
        .iter()
        .map(|(property, values)| format!("{property}: {}", values_to_css(values)))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn rule_text(data: &RuleData) -> String {
    format!("{}@{}", data.selector(), data.position())
}

fn dump_map(out: &mut String, label: &str, map: &RuleMap) {
    for key in map.sorted_keys() {
        let Some(rules) = map.get(key) else {
            continue;
        };
        let entries: Vec<String> = rules.iter().map(rule_text).collect();
        let _ = writeln!(out, "{label} {key}: {}", entries.join(", "));
    }
}

fn dump_list(out: &mut String, label: &str, rules: &[RuleData]) {
    if rules.is_empty() {
        return;
    }
    let entries: Vec<String> = rules.iter().map(rule_text).collect();
    let _ = writeln!(out, "{label}: {}", entries.join(", "));
}

fn dump_minimal(out: &mut String, label: &str, rules: &[MinimalRuleData]) {
    if rules.is_empty() {
        return;
    }
    let entries: Vec<String> = rules.iter().map(|r| format!("{}@{}", r.selector(), r.position)).collect();
    let _ = writeln!(out, "{label}: {}", entries.join(", "));
}

fn dump_count(out: &mut String, label: &str, count: usize) {
    if count > 0 {
        let _ = writeln!(out, "{label}: {count}");
    }
}

fn dump_entry(out: &mut String, entry: &MatchedProperties) {
    let _ = write!(out, "  {}", block_text(&entry.properties));
    if entry.link_match_type == LinkMatchType::LINK {
        out.push_str(" [link]");
    } else if entry.link_match_type == LinkMatchType::VISITED {
        out.push_str(" [visited]");
    }
    if entry.whitelist != PropertyWhitelist::None {
        let _ = write!(out, " [{:?}]", entry.whitelist);
    }
    out.push('\n');
}

fn block_text(block: &DeclarationBlock) -> String {
    block
        .iter()
        .map(|d| {
            let important = if d.important { " !important" } else { "" };
            format!("{}: {}{important}", d.property, values_to_css(&d.values))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn trim_trailing_newline(mut out: String) -> String {
    if out.ends_with('\n') {
        out.pop();
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::media::MediaQueryEvaluator;
    use crate::css::parser::parse_css;
    use crate::style::rule_data::AddRuleFlags;

    fn rule_set(css: &str) -> RuleSet {
        let sheet = parse_css(css).unwrap();
        let mut rules = RuleSet::new();
        rules.add_rules_from_sheet(&sheet, &MediaQueryEvaluator::default(), AddRuleFlags::empty());
        rules.compact_rules_if_needed();
        rules
    }

    #[test]
    fn test_dump_rule_set_buckets() {
        let rules = rule_set(
            "#id1 { x: 1 } .cls1 { x: 2 } div { x: 3 } * { x: 4 } \
             a:link { x: 5 } .a /deep/ .b { x: 6 } @font-face { font-family: f }",
        );
        insta::assert_snapshot!(dump_rule_set(&rules), @r"
        id id1: #id1@0
        class cls1: .cls1@1
        tag div: div@2
        link: a:link@4
        universal: *@3
        deep: .a /deep/ .b@5
        font-face: 1
        ");
    }

    #[test]
    fn test_dump_rule_set_empty() {
        assert_eq!(dump_rule_set(&rule_set("")), "");
    }

    #[test]
    fn test_dump_match_result_ranges() {
        let block = |css: &str| {
            let sheet = parse_css(&format!("x {{ {css} }}")).unwrap();
            let block = std::rc::Rc::clone(&sheet.style_rules().next().unwrap().block);
            block
        };
        let mut result = MatchResult::new();
        result.add_matched_properties(MatchedProperties::new(
            block("display: block"),
            LinkMatchType::ALL,
            PropertyWhitelist::None,
        ));
        result.finish_adding_ua_rules();
        result.add_matched_properties(MatchedProperties::new(
            block("color: red !important"),
            LinkMatchType::VISITED,
            PropertyWhitelist::None,
        ));
        result.finish_adding_author_rules_for_tree_scope();
        result.finish_adding_author_rules_for_tree_scope();

        insta::assert_snapshot!(dump_match_result(&result), @r"
        ua:
          display: block
        scope 0:
          color: red !important [visited]
        scope 1:
        ");
    }
}
