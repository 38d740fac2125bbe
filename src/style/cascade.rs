//! Applies a [`MatchResult`] to produce declared property values.
//!
//! Normal declarations are applied user-agent first, then author scopes in
//! collection order. Important author declarations follow with the tree
//! scopes reversed, and important user-agent declarations come last. A later
//! write replaces an earlier one.

use std::collections::BTreeMap;

use crate::css::model::{values_to_css, Declaration, DeclarationValue};
use crate::style::match_result::{MatchResult, MatchedProperties};
use crate::style::rule_data::{LinkMatchType, PropertyWhitelist};

/// Declared value per property after the cascade.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedStyle {
    properties: BTreeMap<String, Vec<DeclarationValue>>,
}

impl ComputedStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, property: &str) -> Option<&[DeclarationValue]> {
        self.properties.get(property).map(Vec::as_slice)
    }

    /// The value of `property` serialized as CSS text.
    pub fn get_css(&self, property: &str) -> Option<String> {
        self.get(property).map(values_to_css)
    }

    pub fn set(&mut self, property: impl Into<String>, values: Vec<DeclarationValue>) {
        self.properties.insert(property.into(), values);
    }

    /// Properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DeclarationValue])> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Cascade `result` for the link state `mode` (`LINK` for unvisited or
/// non-link elements, `VISITED` for visited links).
pub fn apply(result: &MatchResult, mode: LinkMatchType) -> ComputedStyle {
    let mut style = ComputedStyle::new();

    apply_matched(&mut style, result.ua_rules(), false, mode);
    apply_matched(&mut style, result.author_rules(), false, mode);

    let ranges = result.important_author_ranges();
    for range in ranges.clone() {
        apply_matched(&mut style, ranges.slice(range), true, mode);
    }
    apply_matched(&mut style, result.ua_rules(), true, mode);

    style
}

fn apply_matched(
    style: &mut ComputedStyle,
    matched: &[MatchedProperties],
    important: bool,
    mode: LinkMatchType,
) {
    for entry in matched {
        if !entry.link_match_type.intersects(mode) {
            continue;
        }
        for declaration in entry.properties.iter() {
            if declaration.important != important {
                continue;
            }
            if !is_allowed(entry.whitelist, declaration) {
                continue;
            }
            style.set(declaration.property.clone(), declaration.values.clone());
        }
    }
}

fn is_allowed(whitelist: PropertyWhitelist, declaration: &Declaration) -> bool {
    let property = declaration.property.as_str();
    match whitelist {
        PropertyWhitelist::None => true,
        PropertyWhitelist::Cue => is_valid_cue_property(property),
        PropertyWhitelist::FirstLetter => is_valid_first_letter_property(property),
    }
}

fn is_valid_cue_property(property: &str) -> bool {
    matches!(
        property,
        "color" | "opacity" | "visibility" | "white-space" | "line-height" | "text-shadow"
    ) || ["background", "font", "outline", "text-decoration"]
        .iter()
        .any(|prefix| property.starts_with(prefix))
}

fn is_valid_first_letter_property(property: &str) -> bool {
    matches!(
        property,
        "color"
            | "float"
            | "line-height"
            | "opacity"
            | "text-shadow"
            | "text-transform"
            | "vertical-align"
            | "word-spacing"
            | "letter-spacing"
    ) || ["background", "border", "font", "margin", "padding", "text-decoration"]
        .iter()
        .any(|prefix| property.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::parser::parse_css;
    use crate::css::model::DeclarationBlock;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn block(css: &str) -> Rc<DeclarationBlock> {
        let sheet = parse_css(&format!("x {{ {css} }}")).unwrap();
        let rule = sheet.style_rules().next().unwrap();
        Rc::clone(&rule.block)
    }

    fn matched(css: &str) -> MatchedProperties {
        MatchedProperties::new(block(css), LinkMatchType::ALL, PropertyWhitelist::None)
    }

    #[test]
    fn test_normal_declarations_later_wins() {
        let mut result = MatchResult::new();
        result.add_matched_properties(matched("color: black; display: block"));
        result.finish_adding_ua_rules();
        result.add_matched_properties(matched("color: red"));
        result.add_matched_properties(matched("color: green"));
        result.finish_adding_author_rules_for_tree_scope();

        let style = apply(&result, LinkMatchType::LINK);
        assert_eq!(style.get_css("color").as_deref(), Some("green"));
        assert_eq!(style.get_css("display").as_deref(), Some("block"));
    }

    #[test]
    fn test_important_reverses_tree_scopes() {
        let mut result = MatchResult::new();
        result.finish_adding_ua_rules();
        // Host rules of the shadow tree.
        result.add_matched_properties(matched("color: red !important; margin: 1px"));
        result.finish_adding_author_rules_for_tree_scope();
        // The host's own tree scope.
        result.add_matched_properties(matched("color: blue !important; margin: 2px"));
        result.finish_adding_author_rules_for_tree_scope();

        let style = apply(&result, LinkMatchType::LINK);
        assert_eq!(style.get_css("margin").as_deref(), Some("2px"));
        assert_eq!(style.get_css("color").as_deref(), Some("red"));
    }

    #[test]
    fn test_user_agent_important_wins_last() {
        let mut result = MatchResult::new();
        result.add_matched_properties(matched("display: none !important"));
        result.finish_adding_ua_rules();
        result.add_matched_properties(matched("display: block !important"));
        result.finish_adding_author_rules_for_tree_scope();

        let style = apply(&result, LinkMatchType::LINK);
        assert_eq!(style.get_css("display").as_deref(), Some("none"));
    }

    #[test]
    fn test_link_mode_filters_entries() {
        let mut result = MatchResult::new();
        result.finish_adding_ua_rules();
        result.add_matched_properties(MatchedProperties::new(
            block("color: blue"),
            LinkMatchType::LINK,
            PropertyWhitelist::None,
        ));
        result.add_matched_properties(MatchedProperties::new(
            block("color: purple"),
            LinkMatchType::VISITED,
            PropertyWhitelist::None,
        ));
        result.finish_adding_author_rules_for_tree_scope();

        let unvisited = apply(&result, LinkMatchType::LINK);
        let visited = apply(&result, LinkMatchType::VISITED);
        assert_eq!(unvisited.get_css("color").as_deref(), Some("blue"));
        assert_eq!(visited.get_css("color").as_deref(), Some("purple"));
    }

    #[test]
    fn test_whitelist_restricts_properties() {
        let mut result = MatchResult::new();
        result.finish_adding_ua_rules();
        result.add_matched_properties(MatchedProperties::new(
            block("color: white; display: block; font-size: 2px"),
            LinkMatchType::ALL,
            PropertyWhitelist::Cue,
        ));
        result.add_matched_properties(MatchedProperties::new(
            block("float: left; position: absolute"),
            LinkMatchType::ALL,
            PropertyWhitelist::FirstLetter,
        ));
        result.finish_adding_author_rules_for_tree_scope();

        let style = apply(&result, LinkMatchType::LINK);
        let names: Vec<_> = style.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["color", "float", "font-size"]);
    }
}
