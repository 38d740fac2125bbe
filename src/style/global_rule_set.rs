//! Rule data shared by every tree scope: the user-agent rules and the
//! aggregate selector features of the whole document.

use std::rc::Rc;

use tracing::debug;

use crate::css::media::{MediaQueryEvaluator, MediaQueryResult};
use crate::css::model::StyleSheet;
use crate::style::features::{RuleFeature, RuleFeatureSet};
use crate::style::rule_data::AddRuleFlags;
use crate::style::rule_set::RuleSet;

#[derive(Debug)]
pub struct CssGlobalRuleSet {
    default_style: RuleSet,
    features: RuleFeatureSet,
    sibling_rule_set: Option<RuleSet>,
    uncommon_attribute_rule_set: Option<RuleSet>,
    is_dirty: bool,
}

impl CssGlobalRuleSet {
    pub fn new() -> Self {
        let mut default_style = RuleSet::new();
        default_style.compact_rules_if_needed();
        Self {
            default_style,
            features: RuleFeatureSet::new(),
            sibling_rule_set: None,
            uncommon_attribute_rule_set: None,
            is_dirty: true,
        }
    }

    /// Re-index the user-agent sheets.
    pub fn set_default_style(&mut self, sheets: &[Rc<StyleSheet>], evaluator: &MediaQueryEvaluator) {
        let mut default_style = RuleSet::new();
        for sheet in sheets {
            default_style.add_rules_from_sheet(sheet, evaluator, AddRuleFlags::empty());
        }
        default_style.compact_rules_if_needed();
        debug!(sheets = sheets.len(), rules = default_style.rule_count(), "default style indexed");
        self.default_style = default_style;
        self.mark_dirty();
    }

    pub fn default_style(&self) -> &RuleSet {
        &self.default_style
    }

    pub fn default_style_viewport_results(&self) -> &[MediaQueryResult] {
        self.default_style.viewport_dependent_media_query_results()
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Rebuild the aggregate features and the derived rule sets from the
    /// default style plus `author_features`. Does nothing unless dirty.
    pub fn update<'a>(&mut self, author_features: impl IntoIterator<Item = &'a RuleFeatureSet>) {
        if !self.is_dirty {
            return;
        }
        self.is_dirty = false;

        self.features.clear();
        self.features.add(self.default_style.features());
        for features in author_features {
            self.features.add(features);
        }
        self.sibling_rule_set = make_rule_set(self.features.sibling_rules());
        self.uncommon_attribute_rule_set = make_rule_set(self.features.uncommon_attribute_rules());
        debug!(
            sibling = self.features.sibling_rules().len(),
            uncommon_attribute = self.features.uncommon_attribute_rules().len(),
            "global rule set updated"
        );
    }

    pub fn features(&self) -> &RuleFeatureSet {
        &self.features
    }

    pub fn sibling_rule_set(&self) -> Option<&RuleSet> {
        self.sibling_rule_set.as_ref()
    }

    pub fn uncommon_attribute_rule_set(&self) -> Option<&RuleSet> {
        self.uncommon_attribute_rule_set.as_ref()
    }
}

impl Default for CssGlobalRuleSet {
    fn default() -> Self {
        Self::new()
    }
}

fn make_rule_set(rules: &[RuleFeature]) -> Option<RuleSet> {
    if rules.is_empty() {
        return None;
    }
    let mut rule_set = RuleSet::new();
    for feature in rules {
        rule_set.add_rule(&feature.rule, feature.selector_index, feature.flags);
    }
    rule_set.compact_rules_if_needed();
    Some(rule_set)
}
