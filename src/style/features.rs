//! Aggregate selector features of a rule set.
//!
//! The feature set records which ids, classes and attributes any indexed
//! selector mentions, and keeps side lists of rules whose matching depends on
//! siblings or uncommon attributes. The engine builds dedicated rule sets
//! from those lists.

use std::collections::HashSet;
use std::rc::Rc;

use crate::css::model::{Combinator, CompoundSelector, SelectorComponent, StyleRule};
use crate::style::rule_data::{AddRuleFlags, RuleData};

/// A rule recorded in one of the feature side lists.
#[derive(Debug, Clone)]
pub struct RuleFeature {
    pub rule: Rc<StyleRule>,
    pub selector_index: usize,
    pub flags: AddRuleFlags,
}

#[derive(Debug, Clone, Default)]
pub struct RuleFeatureSet {
    ids: HashSet<String>,
    classes: HashSet<String>,
    attributes: HashSet<String>,
    sibling_rules: Vec<RuleFeature>,
    uncommon_attribute_rules: Vec<RuleFeature>,
    uses_first_line_rules: bool,
    uses_deep_combinator_or_shadow_pseudo: bool,
    uses_content_or_slotted: bool,
}

impl RuleFeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the features of an indexed rule.
    pub fn collect_features_from_rule_data(&mut self, data: &RuleData) {
        let flags = if data.has_document_security_origin() {
            AddRuleFlags::HAS_DOCUMENT_SECURITY_ORIGIN
        } else {
            AddRuleFlags::empty()
        };
        self.collect_features_from_selector(
            data.rule(),
            data.selector_index(),
            flags,
            data.contains_uncommon_attribute_selector(),
        );
    }

    /// Record the features of one selector alternative of `rule`.
    pub fn collect_features_from_selector(
        &mut self,
        rule: &Rc<StyleRule>,
        selector_index: usize,
        flags: AddRuleFlags,
        uncommon_attribute: bool,
    ) {
        let selector = &rule.selectors[selector_index];
        let mut found_sibling_selector = false;

        for compound in selector.compounds() {
            if self.collect_compound(compound) {
                found_sibling_selector = true;
            }
        }
        for combinator in selector.combinators() {
            match combinator {
                Combinator::NextSibling | Combinator::SubsequentSibling => {
                    found_sibling_selector = true
                }
                Combinator::ShadowDeep | Combinator::ShadowTree => {
                    self.uses_deep_combinator_or_shadow_pseudo = true
                }
                Combinator::ContentDistributed => self.uses_content_or_slotted = true,
                Combinator::Descendant | Combinator::Child | Combinator::ShadowPseudo => {}
            }
        }
        if selector.has_slotted_pseudo() {
            self.uses_content_or_slotted = true;
        }

        let feature = RuleFeature {
            rule: Rc::clone(rule),
            selector_index,
            flags,
        };
        if found_sibling_selector {
            self.sibling_rules.push(feature.clone());
        }
        if uncommon_attribute {
            self.uncommon_attribute_rules.push(feature);
        }
    }

    /// Returns whether the compound depends on sibling position.
    fn collect_compound(&mut self, compound: &CompoundSelector) -> bool {
        let mut sibling = false;
        for component in &compound.components {
            match component {
                SelectorComponent::Id(id) => {
                    self.ids.insert(id.clone());
                }
                SelectorComponent::Class(class) => {
                    self.classes.insert(class.clone());
                }
                SelectorComponent::Attribute(attr) => {
                    self.attributes.insert(attr.name.clone());
                }
                SelectorComponent::PseudoClass(name) => {
                    if is_sibling_pseudo_class(name) {
                        sibling = true;
                    }
                }
                SelectorComponent::PseudoElement(name) if name == "first-line" => {
                    self.uses_first_line_rules = true;
                }
                SelectorComponent::Not(inner)
                | SelectorComponent::HostContext(inner)
                | SelectorComponent::Slotted(inner)
                | SelectorComponent::Host(Some(inner)) => {
                    if self.collect_compound(inner) {
                        sibling = true;
                    }
                }
                _ => {}
            }
        }
        sibling
    }

    /// Merge `other` into this set.
    pub fn add(&mut self, other: &RuleFeatureSet) {
        self.ids.extend(other.ids.iter().cloned());
        self.classes.extend(other.classes.iter().cloned());
        self.attributes.extend(other.attributes.iter().cloned());
        self.sibling_rules.extend(other.sibling_rules.iter().cloned());
        self.uncommon_attribute_rules
            .extend(other.uncommon_attribute_rules.iter().cloned());
        self.uses_first_line_rules |= other.uses_first_line_rules;
        self.uses_deep_combinator_or_shadow_pseudo |= other.uses_deep_combinator_or_shadow_pseudo;
        self.uses_content_or_slotted |= other.uses_content_or_slotted;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn has_selector_for_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn has_selector_for_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn has_selector_for_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    pub fn sibling_rules(&self) -> &[RuleFeature] {
        &self.sibling_rules
    }

    pub fn uncommon_attribute_rules(&self) -> &[RuleFeature] {
        &self.uncommon_attribute_rules
    }

    pub fn uses_first_line_rules(&self) -> bool {
        self.uses_first_line_rules
    }

    pub fn uses_deep_combinator_or_shadow_pseudo(&self) -> bool {
        self.uses_deep_combinator_or_shadow_pseudo
    }

    pub fn uses_content_or_slotted(&self) -> bool {
        self.uses_content_or_slotted
    }
}

fn is_sibling_pseudo_class(name: &str) -> bool {
    matches!(
        name,
        "first-child" | "last-child" | "only-child" | "empty"
    ) || name.starts_with("nth-")
}
