//! Rule indexing: every selector alternative of a sheet lands in exactly one
//! bucket, chosen from the subject compound.
//!
//! Buckets fill in a pending phase and are sealed by
//! [`RuleSet::compact_rules_if_needed`]. Queries are only valid on a sealed
//! set; adding rules is only valid before sealing.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::css::media::{MediaQueryEvaluator, MediaQueryResult};
use crate::css::model::{
    CompoundSelector, FontFaceRule, KeyframesRule, PageRule, Rule, SelectorComponent, StyleRule,
    StyleSheet, ViewportRule,
};
use crate::style::features::RuleFeatureSet;
use crate::style::rule_data::{AddRuleFlags, MinimalRuleData, RuleData};

/// Standard pseudo-elements an author rule may target.
const KNOWN_PSEUDO_ELEMENTS: &[&str] = &[
    "before",
    "after",
    "first-letter",
    "first-line",
    "selection",
    "cue",
];

// ---------------------------------------------------------------------------
// RuleMap
// ---------------------------------------------------------------------------

/// A keyed bucket map with a pending and a sealed phase.
#[derive(Debug, Clone)]
pub enum RuleMap {
    Pending(HashMap<String, Vec<RuleData>>),
    Compact(HashMap<String, Box<[RuleData]>>),
}

impl RuleMap {
    pub fn new() -> Self {
        RuleMap::Pending(HashMap::new())
    }

    fn push(&mut self, key: &str, data: RuleData) {
        match self {
            RuleMap::Pending(map) => map.entry(key.to_string()).or_default().push(data),
            RuleMap::Compact(_) => {
                debug_assert!(false, "rule added to a compacted rule map");
            }
        }
    }

    fn compact(&mut self) {
        if let RuleMap::Pending(map) = self {
            let sealed = std::mem::take(map)
                .into_iter()
                .map(|(key, rules)| (key, rules.into_boxed_slice()))
                .collect();
            *self = RuleMap::Compact(sealed);
        }
    }

    pub fn is_compacted(&self) -> bool {
        matches!(self, RuleMap::Compact(_))
    }

    /// Rules stored under `key`, in insertion order.
    pub fn get(&self, key: &str) -> Option<&[RuleData]> {
        match self {
            RuleMap::Compact(map) => map.get(key).map(|rules| &rules[..]),
            RuleMap::Pending(_) => {
                debug_assert!(false, "rule map queried before compaction");
                None
            }
        }
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        match self {
            RuleMap::Pending(map) => map.len(),
            RuleMap::Compact(map) => map.len(),
        }
    }

    /// Every entry of every key, in no particular key order.
    pub fn values(&self) -> Box<dyn Iterator<Item = &RuleData> + '_> {
        match self {
            RuleMap::Pending(map) => Box::new(map.values().flatten()),
            RuleMap::Compact(map) => Box::new(map.values().flat_map(|rules| rules.iter())),
        }
    }

    /// Keys in sorted order, for stable dumps.
    pub fn sorted_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = match self {
            RuleMap::Pending(map) => map.keys().map(String::as_str).collect(),
            RuleMap::Compact(map) => map.keys().map(String::as_str).collect(),
        };
        keys.sort_unstable();
        keys
    }
}

impl Default for RuleMap {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// The bucket a rule was placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Id,
    Class,
    ShadowPseudoElement,
    Cue,
    LinkPseudoClass,
    FocusPseudoClass,
    Tag,
    ShadowHost,
    Universal,
}

/// Indexed rules of one or more sheets.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    id_rules: RuleMap,
    class_rules: RuleMap,
    tag_rules: RuleMap,
    shadow_pseudo_element_rules: RuleMap,
    link_pseudo_class_rules: Vec<RuleData>,
    cue_pseudo_rules: Vec<RuleData>,
    focus_pseudo_class_rules: Vec<RuleData>,
    universal_rules: Vec<RuleData>,
    shadow_host_rules: Vec<RuleData>,

    page_rules: Vec<Rc<PageRule>>,
    viewport_rules: Vec<Rc<ViewportRule>>,
    font_face_rules: Vec<Rc<FontFaceRule>>,
    keyframes_rules: Vec<Rc<KeyframesRule>>,

    deep_combinator_or_shadow_pseudo_rules: Vec<MinimalRuleData>,
    content_pseudo_element_rules: Vec<MinimalRuleData>,
    slotted_pseudo_element_rules: Vec<MinimalRuleData>,

    features: RuleFeatureSet,
    viewport_dependent_media_query_results: Vec<MediaQueryResult>,
    rule_count: u32,
    compacted: bool,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every rule of `sheet` whose media conditions hold.
    pub fn add_rules_from_sheet(
        &mut self,
        sheet: &StyleSheet,
        evaluator: &MediaQueryEvaluator,
        flags: AddRuleFlags,
    ) {
        debug_assert!(!self.compacted, "rules added to a compacted rule set");
        self.add_child_rules(&sheet.rules, evaluator, flags);
        self.viewport_dependent_media_query_results
            .extend(evaluator.take_viewport_dependent_results());
    }

    /// Walk a rule list, descending into `@media` groups that match.
    pub fn add_child_rules(
        &mut self,
        rules: &[Rule],
        evaluator: &MediaQueryEvaluator,
        flags: AddRuleFlags,
    ) {
        for rule in rules {
            match rule {
                Rule::Style(style) => self.add_style_rule(style, flags),
                Rule::Media { queries, rules } => {
                    if evaluator.eval(queries) {
                        self.add_child_rules(rules, evaluator, flags);
                    } else {
                        trace!(media = %queries, "media rule skipped");
                    }
                }
                Rule::Page(page) => self.page_rules.push(Rc::clone(page)),
                Rule::Viewport(viewport) => self.viewport_rules.push(Rc::clone(viewport)),
                Rule::FontFace(font_face) => self.font_face_rules.push(Rc::clone(font_face)),
                Rule::Keyframes(keyframes) => self.keyframes_rules.push(Rc::clone(keyframes)),
            }
        }
    }

    /// Index each selector alternative of a style rule. Alternatives that
    /// cross tree boundaries go to the minimal side lists instead of a bucket.
    pub fn add_style_rule(&mut self, rule: &Rc<StyleRule>, flags: AddRuleFlags) {
        for (index, selector) in rule.selectors.iter().enumerate() {
            if selector
                .rightmost()
                .is_some_and(|subject| !has_known_pseudo_element(subject))
            {
                trace!(selector = %selector, "unknown pseudo-element, rule dropped");
                continue;
            }

            let side_list = if selector.uses_deep_combinator_or_shadow_pseudo() {
                &mut self.deep_combinator_or_shadow_pseudo_rules
            } else if selector.has_content_pseudo() {
                &mut self.content_pseudo_element_rules
            } else if selector.has_slotted_pseudo() {
                &mut self.slotted_pseudo_element_rules
            } else {
                self.add_rule(rule, index, flags);
                continue;
            };
            // Side-list rules take a position too, so they order against
            // the bucketed rules of the same sheet.
            side_list.push(MinimalRuleData::new(Rc::clone(rule), index, self.rule_count, flags));
            self.rule_count += 1;
        }
    }

    /// Create a [`RuleData`] for one alternative and bucket it.
    pub fn add_rule(&mut self, rule: &Rc<StyleRule>, selector_index: usize, flags: AddRuleFlags) {
        debug_assert!(!self.compacted, "rules added to a compacted rule set");
        let data = RuleData::new(Rc::clone(rule), selector_index, self.rule_count, flags);
        self.rule_count += 1;
        self.features.collect_features_from_rule_data(&data);
        self.find_best_rule_set_and_add(data);
    }

    /// Bucket a side-list rule, keeping the position its sheet gave it.
    pub fn add_minimal_rule(&mut self, minimal: &MinimalRuleData) {
        debug_assert!(!self.compacted, "rules added to a compacted rule set");
        let data = RuleData::new(
            Rc::clone(&minimal.rule),
            minimal.selector_index,
            minimal.position,
            minimal.flags,
        );
        self.rule_count = self.rule_count.max(minimal.position + 1);
        self.features.collect_features_from_rule_data(&data);
        self.find_best_rule_set_and_add(data);
    }

    /// Place `data` into the one bucket its subject compound selects.
    pub fn find_best_rule_set_and_add(&mut self, data: RuleData) -> Bucket {
        let bucket = match data.selector().rightmost() {
            Some(subject) => choose_bucket(subject),
            None => BucketKey::Universal,
        };
        trace!(selector = %data.selector(), position = data.position(), ?bucket, "rule indexed");

        match bucket {
            BucketKey::Id(key) => {
                self.id_rules.push(&key, data);
                Bucket::Id
            }
            BucketKey::Class(key) => {
                self.class_rules.push(&key, data);
                Bucket::Class
            }
            BucketKey::ShadowPseudoElement(key) => {
                self.shadow_pseudo_element_rules.push(&key, data);
                Bucket::ShadowPseudoElement
            }
            BucketKey::Cue => {
                self.cue_pseudo_rules.push(data);
                Bucket::Cue
            }
            BucketKey::LinkPseudoClass => {
                self.link_pseudo_class_rules.push(data);
                Bucket::LinkPseudoClass
            }
            BucketKey::FocusPseudoClass => {
                self.focus_pseudo_class_rules.push(data);
                Bucket::FocusPseudoClass
            }
            BucketKey::Tag(key) => {
                self.tag_rules.push(&key, data);
                Bucket::Tag
            }
            BucketKey::ShadowHost => {
                self.shadow_host_rules.push(data);
                Bucket::ShadowHost
            }
            BucketKey::Universal => {
                self.universal_rules.push(data);
                Bucket::Universal
            }
        }
    }

    /// Seal all buckets. Calling this more than once is harmless.
    pub fn compact_rules_if_needed(&mut self) {
        if self.compacted {
            return;
        }
        self.id_rules.compact();
        self.class_rules.compact();
        self.tag_rules.compact();
        self.shadow_pseudo_element_rules.compact();
        self.link_pseudo_class_rules.shrink_to_fit();
        self.cue_pseudo_rules.shrink_to_fit();
        self.focus_pseudo_class_rules.shrink_to_fit();
        self.universal_rules.shrink_to_fit();
        self.shadow_host_rules.shrink_to_fit();
        self.compacted = true;
        debug!(rules = self.rule_count, "rule set compacted");
    }

    pub fn is_compacted(&self) -> bool {
        self.compacted
    }

    // ── Bucket queries ─────────────────────────────────────────────

    pub fn id_rules(&self, key: &str) -> Option<&[RuleData]> {
        debug_assert!(self.compacted);
        self.id_rules.get(key)
    }

    pub fn class_rules(&self, key: &str) -> Option<&[RuleData]> {
        debug_assert!(self.compacted);
        self.class_rules.get(key)
    }

    pub fn tag_rules(&self, key: &str) -> Option<&[RuleData]> {
        debug_assert!(self.compacted);
        self.tag_rules.get(key)
    }

    pub fn shadow_pseudo_element_rules(&self, key: &str) -> Option<&[RuleData]> {
        debug_assert!(self.compacted);
        self.shadow_pseudo_element_rules.get(key)
    }

    pub fn link_pseudo_class_rules(&self) -> &[RuleData] {
        debug_assert!(self.compacted);
        &self.link_pseudo_class_rules
    }

    pub fn cue_pseudo_rules(&self) -> &[RuleData] {
        debug_assert!(self.compacted);
        &self.cue_pseudo_rules
    }

    pub fn focus_pseudo_class_rules(&self) -> &[RuleData] {
        debug_assert!(self.compacted);
        &self.focus_pseudo_class_rules
    }

    pub fn universal_rules(&self) -> &[RuleData] {
        debug_assert!(self.compacted);
        &self.universal_rules
    }

    pub fn shadow_host_rules(&self) -> &[RuleData] {
        debug_assert!(self.compacted);
        &self.shadow_host_rules
    }

    /// The keyed maps, for dumps and diagnostics.
    pub fn id_map(&self) -> &RuleMap {
        &self.id_rules
    }

    pub fn class_map(&self) -> &RuleMap {
        &self.class_rules
    }

    pub fn tag_map(&self) -> &RuleMap {
        &self.tag_rules
    }

    pub fn shadow_pseudo_element_map(&self) -> &RuleMap {
        &self.shadow_pseudo_element_rules
    }

    // ── Side lists ─────────────────────────────────────────────────

    pub fn page_rules(&self) -> &[Rc<PageRule>] {
        &self.page_rules
    }

    pub fn viewport_rules(&self) -> &[Rc<ViewportRule>] {
        &self.viewport_rules
    }

    pub fn font_face_rules(&self) -> &[Rc<FontFaceRule>] {
        &self.font_face_rules
    }

    pub fn keyframes_rules(&self) -> &[Rc<KeyframesRule>] {
        &self.keyframes_rules
    }

    pub fn deep_combinator_or_shadow_pseudo_rules(&self) -> &[MinimalRuleData] {
        &self.deep_combinator_or_shadow_pseudo_rules
    }

    pub fn content_pseudo_element_rules(&self) -> &[MinimalRuleData] {
        &self.content_pseudo_element_rules
    }

    pub fn slotted_pseudo_element_rules(&self) -> &[MinimalRuleData] {
        &self.slotted_pseudo_element_rules
    }

    /// Whether any rule is matched across a shadow boundary into a scope's
    /// distributed or slotted nodes.
    pub fn has_shadow_distributed_rules(&self) -> bool {
        !self.content_pseudo_element_rules.is_empty()
            || !self.slotted_pseudo_element_rules.is_empty()
    }

    pub fn features(&self) -> &RuleFeatureSet {
        &self.features
    }

    pub fn viewport_dependent_media_query_results(&self) -> &[MediaQueryResult] {
        &self.viewport_dependent_media_query_results
    }

    /// Positions handed out so far, bucketed and side-list rules alike.
    pub fn rule_count(&self) -> u32 {
        self.rule_count
    }
}

/// Bucket choice plus the key for keyed buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BucketKey {
    Id(String),
    Class(String),
    ShadowPseudoElement(String),
    Cue,
    LinkPseudoClass,
    FocusPseudoClass,
    Tag(String),
    ShadowHost,
    Universal,
}

/// Pick a bucket from the subject compound. For `::slotted(x)` the keys come
/// from `x`, since that is the compound tested against the slotted element.
fn choose_bucket(subject: &CompoundSelector) -> BucketKey {
    let compound = subject.slotted().unwrap_or(subject);

    let mut id = None;
    let mut class = None;
    let mut custom_pseudo = None;
    let mut tag = None;
    let mut cue = false;
    let mut link = false;
    let mut focus = false;
    let mut host = false;

    for component in &compound.components {
        match component {
            SelectorComponent::Id(value) => id = Some(value),
            SelectorComponent::Class(value) => class = class.or(Some(value)),
            SelectorComponent::Type(value) => tag = Some(value),
            SelectorComponent::PseudoElement(name) if name == "cue" => cue = true,
            SelectorComponent::PseudoElement(name) if name.starts_with('-') => {
                custom_pseudo = Some(name)
            }
            SelectorComponent::PseudoClass(name) => match name.as_str() {
                "link" | "visited" | "any-link" => link = true,
                "focus" => focus = true,
                _ => {}
            },
            SelectorComponent::Host(_) | SelectorComponent::HostContext(_) => host = true,
            _ => {}
        }
    }

    if let Some(id) = id {
        BucketKey::Id(id.clone())
    } else if let Some(class) = class {
        BucketKey::Class(class.clone())
    } else if let Some(name) = custom_pseudo {
        BucketKey::ShadowPseudoElement(name.clone())
    } else if cue {
        BucketKey::Cue
    } else if link {
        BucketKey::LinkPseudoClass
    } else if focus {
        BucketKey::FocusPseudoClass
    } else if let Some(tag) = tag {
        BucketKey::Tag(tag.clone())
    } else if host {
        BucketKey::ShadowHost
    } else {
        BucketKey::Universal
    }
}

fn has_known_pseudo_element(subject: &CompoundSelector) -> bool {
    match subject.pseudo_element() {
        None => true,
        Some(name) => name.starts_with('-') || KNOWN_PSEUDO_ELEMENTS.contains(&name),
    }
}
