//! Counting Bloom filter over ancestor identifiers.
//!
//! While walking the tree, the identifiers (tag, id, classes) of every
//! ancestor of the current element are counted into a small filter. A rule
//! whose descendant-selector identifier hashes are not all present can be
//! rejected without running the selector checker. False positives are
//! possible, false negatives are not.

use std::hash::Hasher;

use fnv::FnvHasher;

use crate::dom::{Dom, NodeData, NodeId};

/// Key bits: the filter holds `1 << KEY_BITS` counters.
const KEY_BITS: u32 = 12;
const TABLE_SIZE: usize = 1 << KEY_BITS;
const KEY_MASK: u32 = (1 << KEY_BITS) - 1;

const TAG_NAME_SALT: u32 = 13;
const ID_ATTRIBUTE_SALT: u32 = 17;
const CLASS_ATTRIBUTE_SALT: u32 = 19;

/// What an identifier hash was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Tag,
    Id,
    Class,
}

/// Hash of one identifier, salted by kind. Never zero; zero terminates hash
/// lists.
pub fn identifier_hash(kind: IdentifierKind, name: &str) -> u32 {
    let salt = match kind {
        IdentifierKind::Tag => TAG_NAME_SALT,
        IdentifierKind::Id => ID_ATTRIBUTE_SALT,
        IdentifierKind::Class => CLASS_ATTRIBUTE_SALT,
    };
    let mut hasher = FnvHasher::default();
    hasher.write(name.as_bytes());
    let wide = hasher.finish();
    let hash = (wide ^ (wide >> 32)) as u32;
    match hash.wrapping_mul(salt) {
        0 => 1,
        h => h,
    }
}

/// All identifier hashes an element contributes as an ancestor.
pub fn element_identifier_hashes(data: &NodeData) -> Vec<u32> {
    let mut hashes = Vec::with_capacity(2 + data.classes.len());
    hashes.push(identifier_hash(IdentifierKind::Tag, &data.tag));
    if let Some(id) = &data.id {
        hashes.push(identifier_hash(IdentifierKind::Id, id));
    }
    for class in &data.classes {
        hashes.push(identifier_hash(IdentifierKind::Class, class));
    }
    hashes
}

/// Filter over the identifiers of the current element's ancestors within
/// its tree scope.
#[derive(Clone)]
pub struct AncestorFilter {
    counts: Box<[u8; TABLE_SIZE]>,
    /// Pushed parents with the hashes they contributed.
    stack: Vec<(NodeId, Vec<u32>)>,
}

impl AncestorFilter {
    pub fn new() -> Self {
        Self {
            counts: Box::new([0; TABLE_SIZE]),
            stack: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.counts.fill(0);
        self.stack.clear();
    }

    /// The most recently pushed parent.
    pub fn top(&self) -> Option<NodeId> {
        self.stack.last().map(|(id, _)| *id)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether the filter currently describes the ancestors of a child of
    /// `parent`.
    pub fn parent_stack_is_consistent(&self, parent: Option<NodeId>) -> bool {
        self.top() == parent
    }

    /// Record `parent` as the next ancestor on the way down.
    pub fn push_parent(&mut self, dom: &Dom, parent: NodeId) {
        let hashes = dom
            .get(parent)
            .filter(|data| data.is_element())
            .map(element_identifier_hashes)
            .unwrap_or_default();
        for &hash in &hashes {
            self.increment(hash);
        }
        self.stack.push((parent, hashes));
    }

    /// Undo the matching [`push_parent`](Self::push_parent).
    pub fn pop_parent(&mut self, parent: NodeId) {
        debug_assert_eq!(self.top(), Some(parent), "unbalanced ancestor filter pop");
        if let Some((_, hashes)) = self.stack.pop() {
            for hash in hashes {
                self.decrement(hash);
            }
        }
    }

    /// Rebuild the filter from scratch for `element`: every element ancestor
    /// inside its tree scope, outermost first.
    pub fn setup_parent_stack(&mut self, dom: &Dom, element: NodeId) {
        self.clear();
        let mut ancestors = Vec::new();
        let mut current = dom.parent_element(element);
        while let Some(parent) = current {
            ancestors.push(parent);
            current = dom.parent_element(parent);
        }
        for &ancestor in ancestors.iter().rev() {
            self.push_parent(dom, ancestor);
        }
    }

    pub fn might_contain(&self, hash: u32) -> bool {
        self.counts[first_slot(hash)] != 0 && self.counts[second_slot(hash)] != 0
    }

    /// Whether a rule with these descendant identifier hashes can be rejected
    /// outright. The list ends at the first zero.
    pub fn fast_reject_selector(&self, hashes: &[u32]) -> bool {
        hashes
            .iter()
            .take_while(|&&h| h != 0)
            .any(|&h| !self.might_contain(h))
    }

    fn increment(&mut self, hash: u32) {
        for slot in [first_slot(hash), second_slot(hash)] {
            let count = &mut self.counts[slot];
            // A saturated counter stays saturated.
            if *count != u8::MAX {
                *count += 1;
            }
        }
    }

    fn decrement(&mut self, hash: u32) {
        for slot in [first_slot(hash), second_slot(hash)] {
            let count = &mut self.counts[slot];
            if *count != u8::MAX {
                debug_assert!(*count > 0, "ancestor filter underflow");
                *count = count.saturating_sub(1);
            }
        }
    }
}

impl Default for AncestorFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AncestorFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AncestorFilter")
            .field("depth", &self.stack.len())
            .field("top", &self.top())
            .finish()
    }
}

fn first_slot(hash: u32) -> usize {
    (hash & KEY_MASK) as usize
}

fn second_slot(hash: u32) -> usize {
    ((hash >> KEY_BITS) & KEY_MASK) as usize
}
