//! Indexed rule entries: one selector alternative bound to its declaration
//! block, plus the metadata the collector and cascade need.

use std::rc::Rc;

use bitflags::bitflags;

use crate::css::model::{
    Combinator, CompoundSelector, DeclarationBlock, Selector, SelectorComponent, SelectorPart,
    StyleRule,
};
use crate::css::specificity::Specificity;
use crate::style::ancestor_filter::{identifier_hash, IdentifierKind};

/// Number of ancestor identifier hashes kept per rule.
pub const MAX_IDENTIFIER_HASHES: usize = 4;

bitflags! {
    /// Which link states a rule applies in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LinkMatchType: u8 {
        const LINK = 1;
        const VISITED = 2;
        const ALL = Self::LINK.bits() | Self::VISITED.bits();
    }
}

bitflags! {
    /// Flags passed down while indexing a sheet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AddRuleFlags: u8 {
        /// The sheet shares the document's security origin, so its rules may
        /// be exposed to inspection.
        const HAS_DOCUMENT_SECURITY_ORIGIN = 1;
    }
}

/// Restricts which properties a matched block may set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PropertyWhitelist {
    #[default]
    None,
    Cue,
    FirstLetter,
}

/// One compiled selector alternative bound to one declaration block.
#[derive(Debug, Clone)]
pub struct RuleData {
    rule: Rc<StyleRule>,
    selector_index: usize,
    position: u32,
    specificity: Specificity,
    link_match_type: LinkMatchType,
    contains_uncommon_attribute_selector: bool,
    property_whitelist: PropertyWhitelist,
    has_document_security_origin: bool,
    descendant_selector_identifier_hashes: [u32; MAX_IDENTIFIER_HASHES],
}

impl RuleData {
    pub fn new(rule: Rc<StyleRule>, selector_index: usize, position: u32, flags: AddRuleFlags) -> Self {
        debug_assert!(selector_index < rule.selectors.len());
        let selector = &rule.selectors[selector_index];
        let specificity = Specificity::from_selector(selector);
        let link_match_type = compute_link_match_type(selector);
        let contains_uncommon_attribute_selector = contains_uncommon_attribute_selector(selector);
        let property_whitelist = determine_property_whitelist(selector);
        let descendant_selector_identifier_hashes =
            collect_descendant_selector_identifier_hashes(selector);

        Self {
            rule,
            selector_index,
            position,
            specificity,
            link_match_type,
            contains_uncommon_attribute_selector,
            property_whitelist,
            has_document_security_origin: flags
                .contains(AddRuleFlags::HAS_DOCUMENT_SECURITY_ORIGIN),
            descendant_selector_identifier_hashes,
        }
    }

    pub fn rule(&self) -> &Rc<StyleRule> {
        &self.rule
    }

    pub fn selector(&self) -> &Selector {
        &self.rule.selectors[self.selector_index]
    }

    pub fn selector_index(&self) -> usize {
        self.selector_index
    }

    pub fn properties(&self) -> &Rc<DeclarationBlock> {
        &self.rule.block
    }

    /// Insertion order within the owning rule set.
    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn specificity(&self) -> Specificity {
        self.specificity
    }

    pub fn link_match_type(&self) -> LinkMatchType {
        self.link_match_type
    }

    pub fn contains_uncommon_attribute_selector(&self) -> bool {
        self.contains_uncommon_attribute_selector
    }

    pub fn property_whitelist(&self) -> PropertyWhitelist {
        self.property_whitelist
    }

    pub fn has_document_security_origin(&self) -> bool {
        self.has_document_security_origin
    }

    /// Up to four ancestor identifier hashes; the list ends at the first zero.
    pub fn descendant_selector_identifier_hashes(&self) -> &[u32] {
        let len = self
            .descendant_selector_identifier_hashes
            .iter()
            .position(|&h| h == 0)
            .unwrap_or(MAX_IDENTIFIER_HASHES);
        &self.descendant_selector_identifier_hashes[..len]
    }
}

/// A rule recorded only by reference, for the boundary-crossing side lists.
/// It is turned into a [`RuleData`] when those lists are indexed, keeping
/// the position it was given in its sheet.
#[derive(Debug, Clone)]
pub struct MinimalRuleData {
    pub rule: Rc<StyleRule>,
    pub selector_index: usize,
    pub position: u32,
    pub flags: AddRuleFlags,
}

impl MinimalRuleData {
    pub fn new(rule: Rc<StyleRule>, selector_index: usize, position: u32, flags: AddRuleFlags) -> Self {
        Self {
            rule,
            selector_index,
            position,
            flags,
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.rule.selectors[self.selector_index]
    }
}

fn compute_link_match_type(selector: &Selector) -> LinkMatchType {
    let mut link_match_type = LinkMatchType::ALL;
    let Some(subject) = selector.rightmost() else {
        return link_match_type;
    };
    for component in &subject.components {
        if let SelectorComponent::PseudoClass(name) = component {
            match name.as_str() {
                "link" => link_match_type.remove(LinkMatchType::VISITED),
                "visited" => link_match_type.remove(LinkMatchType::LINK),
                _ => {}
            }
        }
    }
    link_match_type
}

fn determine_property_whitelist(selector: &Selector) -> PropertyWhitelist {
    match selector.rightmost().and_then(CompoundSelector::pseudo_element) {
        Some("cue") => PropertyWhitelist::Cue,
        Some("first-letter") => PropertyWhitelist::FirstLetter,
        _ => PropertyWhitelist::None,
    }
}

/// Attributes used by the default style sheet; selectors on them alone do not
/// make a rule uncommon.
fn is_common_attribute(name: &str) -> bool {
    matches!(name, "type" | "readonly")
}

fn compound_has_attribute(compound: &CompoundSelector, allow_common: bool) -> bool {
    compound.components.iter().any(|c| match c {
        SelectorComponent::Attribute(attr) => !(allow_common && is_common_attribute(&attr.name)),
        SelectorComponent::Not(inner) => compound_has_attribute(inner, false),
        _ => false,
    })
}

/// Whether matching may depend on an attribute other than id, class and the
/// common ones. Such rules make the match result uncacheable.
pub fn contains_uncommon_attribute_selector(selector: &Selector) -> bool {
    let mut parts = selector.parts.iter().rev();

    if let Some(SelectorPart::Compound(subject)) = parts.next() {
        if compound_has_attribute(subject, true) || subject.slotted().is_some() {
            return true;
        }
    }
    if let Some(SelectorPart::Combinator(relation)) = parts.clone().next() {
        if matches!(relation, Combinator::ShadowPseudo | Combinator::ContentDistributed) {
            return true;
        }
    }

    parts.any(|part| match part {
        SelectorPart::Compound(compound) => compound_has_attribute(compound, false),
        SelectorPart::Combinator(_) => false,
    })
}

fn collect_compound_hashes(
    compound: &CompoundSelector,
    hashes: &mut [u32; MAX_IDENTIFIER_HASHES],
    count: &mut usize,
) {
    for component in &compound.components {
        let hash = match component {
            SelectorComponent::Id(id) => identifier_hash(IdentifierKind::Id, id),
            SelectorComponent::Class(class) => identifier_hash(IdentifierKind::Class, class),
            SelectorComponent::Type(tag) => identifier_hash(IdentifierKind::Tag, tag),
            _ => continue,
        };
        if *count == MAX_IDENTIFIER_HASHES {
            return;
        }
        hashes[*count] = hash;
        *count += 1;
    }
}

/// Identifier hashes of compounds that must match ancestors of the subject.
/// Sibling compounds are skipped; collection stops at any tree-boundary
/// relation.
fn collect_descendant_selector_identifier_hashes(selector: &Selector) -> [u32; MAX_IDENTIFIER_HASHES] {
    let mut hashes = [0; MAX_IDENTIFIER_HASHES];
    let mut count = 0;

    if selector.rightmost().is_some_and(|s| s.slotted().is_some()) {
        return hashes;
    }

    // Walk right to left: (relation, compound to its left).
    let mut parts = selector.parts.iter().rev().skip(1);
    while let (Some(SelectorPart::Combinator(relation)), Some(SelectorPart::Compound(compound))) =
        (parts.next(), parts.next())
    {
        // The host sits outside the filtered tree scope.
        if compound.has_host_pseudo() {
            break;
        }
        match relation {
            Combinator::Descendant | Combinator::Child => {
                collect_compound_hashes(compound, &mut hashes, &mut count)
            }
            Combinator::NextSibling | Combinator::SubsequentSibling => {}
            _ => break,
        }
        if count == MAX_IDENTIFIER_HASHES {
            break;
        }
    }

    hashes
}
