//! Matched declaration blocks of one element, split into origin ranges.
//!
//! The flat list holds user-agent matches first, then author matches grouped
//! per tree scope. `ua_range_end` and `author_range_ends` mark the group
//! boundaries so the cascade can walk normal declarations front to back and
//! important author declarations scope by scope in reverse.

use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::rc::Rc;

use crate::css::model::DeclarationBlock;
use crate::style::rule_data::{LinkMatchType, PropertyWhitelist};

/// One matched declaration block with the flags the cascade needs.
#[derive(Debug, Clone)]
pub struct MatchedProperties {
    pub properties: Rc<DeclarationBlock>,
    pub link_match_type: LinkMatchType,
    pub whitelist: PropertyWhitelist,
}

impl MatchedProperties {
    pub fn new(
        properties: Rc<DeclarationBlock>,
        link_match_type: LinkMatchType,
        whitelist: PropertyWhitelist,
    ) -> Self {
        Self {
            properties,
            link_match_type,
            whitelist,
        }
    }
}

// Identity of the block, not its contents.
impl PartialEq for MatchedProperties {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.properties, &other.properties)
            && self.link_match_type == other.link_match_type
            && self.whitelist == other.whitelist
    }
}

impl Eq for MatchedProperties {}

impl Hash for MatchedProperties {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.properties).hash(state);
        self.link_match_type.hash(state);
        self.whitelist.hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    matched_properties: Vec<MatchedProperties>,
    ua_range_end: usize,
    author_range_ends: Vec<usize>,
    ua_finished: bool,
    is_cacheable: bool,
}

impl MatchResult {
    pub fn new() -> Self {
        Self {
            matched_properties: Vec::new(),
            ua_range_end: 0,
            author_range_ends: Vec::new(),
            ua_finished: false,
            is_cacheable: true,
        }
    }

    pub fn add_matched_properties(&mut self, matched: MatchedProperties) {
        self.matched_properties.push(matched);
    }

    /// Close the user-agent range. Must be called once, before any author
    /// scope is finished.
    pub fn finish_adding_ua_rules(&mut self) {
        debug_assert!(!self.ua_finished, "user-agent rules finished twice");
        debug_assert!(self.author_range_ends.is_empty());
        self.ua_range_end = self.matched_properties.len();
        self.ua_finished = true;
    }

    /// Close the author range of one tree scope. An empty range is allowed.
    pub fn finish_adding_author_rules_for_tree_scope(&mut self) {
        debug_assert!(
            self.ua_finished,
            "author scope finished before user-agent rules"
        );
        self.author_range_ends.push(self.matched_properties.len());
    }

    pub fn matched_properties(&self) -> &[MatchedProperties] {
        &self.matched_properties
    }

    pub fn len(&self) -> usize {
        self.matched_properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matched_properties.is_empty()
    }

    pub fn ua_range_end(&self) -> usize {
        self.ua_range_end
    }

    pub fn author_range_ends(&self) -> &[usize] {
        &self.author_range_ends
    }

    pub fn ua_rules(&self) -> &[MatchedProperties] {
        &self.matched_properties[..self.ua_range_end]
    }

    /// Every author match, all scopes, in normal cascade order.
    pub fn author_rules(&self) -> &[MatchedProperties] {
        &self.matched_properties[self.ua_range_end..]
    }

    /// Author scope ranges from the last finished scope to the first, the
    /// order in which important declarations are applied.
    pub fn important_author_ranges(&self) -> ImportantAuthorRanges<'_> {
        ImportantAuthorRanges {
            result: self,
            remaining: self.author_range_ends.len(),
        }
    }

    pub fn is_cacheable(&self) -> bool {
        self.is_cacheable
    }

    pub fn set_is_cacheable(&mut self, cacheable: bool) {
        self.is_cacheable = cacheable;
    }
}

impl Default for MatchResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks the per-scope author ranges backwards.
#[derive(Debug, Clone)]
pub struct ImportantAuthorRanges<'a> {
    result: &'a MatchResult,
    remaining: usize,
}

impl<'a> ImportantAuthorRanges<'a> {
    /// The matched properties of a range yielded by this iterator.
    pub fn slice(&self, range: Range<usize>) -> &'a [MatchedProperties] {
        &self.result.matched_properties[range]
    }
}

impl Iterator for ImportantAuthorRanges<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let ends = &self.result.author_range_ends;
        let end = ends[self.remaining];
        let start = match self.remaining {
            0 => self.result.ua_range_end,
            i => ends[i - 1],
        };
        Some(start..end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ImportantAuthorRanges<'_> {}
