//! DOM queries: by id, class, tag; generic predicate matching.

use super::node::{NodeData, NodeId};
use super::tree::Dom;

impl Dom {
    /// Find the first element, in shadow-including document order, whose
    /// `id` matches the given string.
    pub fn query_by_id(&self, id: &str) -> Option<NodeId> {
        self.query_all(|data| data.id.as_deref() == Some(id))
            .into_iter()
            .next()
    }

    /// Find all elements that have the given CSS class.
    pub fn query_by_class(&self, class: &str) -> Vec<NodeId> {
        self.query_all(|data| data.has_class(class))
    }

    /// Find all elements with the given tag name.
    pub fn query_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        self.query_all(|data| data.tag == tag)
    }

    /// Find all elements matching an arbitrary predicate, in shadow-including
    /// document order.
    pub fn query_all(&self, predicate: impl Fn(&NodeData) -> bool) -> Vec<NodeId> {
        self.walk_shadow_including(self.document())
            .into_iter()
            .filter(|&id| {
                self.get(id)
                    .is_some_and(|data| data.is_element() && predicate(data))
            })
            .collect()
    }
}
