//! Selector matching against the DOM, aware of tree scopes.
//!
//! A selector is matched right to left. Plain combinators stay inside the
//! element's tree scope, except that the host of the scope a rule was
//! declared in is visible to compounds containing `:host`. The boundary
//! combinators hop between trees: `/deep/` walks through hosts, `::shadow`
//! and custom pseudo-elements jump to the host, `::content` and
//! `::slotted()` jump from a distributed node to its slot.

use bitflags::bitflags;

use crate::css::model::{
    AttrOperator, AttributeSelector, Combinator, CompoundSelector, Selector, SelectorComponent,
    SelectorPart,
};
use crate::dom::{Dom, NodeData, NodeId};

bitflags! {
    /// How the scope constrains a match.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BoundaryBehavior: u8 {
        /// The leftmost matched element must belong to the scope's tree
        /// (or be its host, with `SCOPE_IS_SHADOW_ROOT`).
        const SCOPE_CONTAINS_LAST_MATCHED_ELEMENT = 1;
        /// The scoping node is a shadow root.
        const SCOPE_IS_SHADOW_ROOT = 2;
    }
}

/// Per-match parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorCheckingContext {
    /// The document or shadow root the rule was declared in.
    pub scope: Option<NodeId>,
    pub behavior: BoundaryBehavior,
    /// The standard pseudo-element being styled, if any.
    pub pseudo_element: Option<String>,
}

impl SelectorCheckingContext {
    pub fn new(scope: Option<NodeId>) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    pub fn with_behavior(mut self, behavior: BoundaryBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_pseudo_element(mut self, pseudo: Option<String>) -> Self {
        self.pseudo_element = pseudo;
        self
    }
}

/// Pseudo-elements that name an element inside a shadow tree rather than a
/// generated box.
pub fn is_shadow_pseudo_element(name: &str) -> bool {
    name.starts_with('-') || name == "cue"
}

pub struct SelectorChecker<'a> {
    dom: &'a Dom,
}

impl<'a> SelectorChecker<'a> {
    pub fn new(dom: &'a Dom) -> Self {
        Self { dom }
    }

    /// Whether `selector` matches `element` under `context`.
    pub fn match_selector(
        &self,
        selector: &Selector,
        element: NodeId,
        context: &SelectorCheckingContext,
    ) -> bool {
        let Some(subject) = selector.rightmost() else {
            return false;
        };
        let generated = subject
            .pseudo_element()
            .filter(|name| !is_shadow_pseudo_element(name));
        if generated != context.pseudo_element.as_deref() {
            return false;
        }
        self.match_parts(&selector.parts, element, context, Candidate::Subject)
    }

    fn match_parts(
        &self,
        parts: &[SelectorPart],
        element: NodeId,
        context: &SelectorCheckingContext,
        candidate: Candidate,
    ) -> bool {
        let Some((SelectorPart::Compound(compound), rest)) = parts.split_last() else {
            return false;
        };
        if candidate == Candidate::ScopeHost && !compound.has_host_pseudo() {
            return false;
        }
        let Some(anchor) = self.match_compound(compound, element, context, candidate) else {
            return false;
        };

        let Some((SelectorPart::Combinator(combinator), left)) = rest.split_last() else {
            return self.scope_contains_last_matched_element(anchor, context);
        };

        match combinator {
            Combinator::Descendant => {
                let mut current = self.parent_for_matching(anchor, context);
                while let Some((parent, kind)) = current {
                    if self.match_parts(left, parent, context, kind) {
                        return true;
                    }
                    if kind == Candidate::ScopeHost {
                        break;
                    }
                    current = self.parent_for_matching(parent, context);
                }
                false
            }
            Combinator::Child => self
                .parent_for_matching(anchor, context)
                .is_some_and(|(parent, kind)| self.match_parts(left, parent, context, kind)),
            Combinator::NextSibling => self
                .dom
                .previous_element_sibling(anchor)
                .is_some_and(|sibling| self.match_parts(left, sibling, context, Candidate::Other)),
            Combinator::SubsequentSibling => {
                let mut current = self.dom.previous_element_sibling(anchor);
                while let Some(sibling) = current {
                    if self.match_parts(left, sibling, context, Candidate::Other) {
                        return true;
                    }
                    current = self.dom.previous_element_sibling(sibling);
                }
                false
            }
            Combinator::ShadowDeep => {
                let mut current = self.dom.parent_or_shadow_host(anchor);
                while let Some(node) = current {
                    if self.dom.is_element(node)
                        && self.match_parts(left, node, context, Candidate::Other)
                    {
                        return true;
                    }
                    current = self.dom.parent_or_shadow_host(node);
                }
                false
            }
            Combinator::ShadowTree | Combinator::ShadowPseudo => self
                .dom
                .shadow_host(self.dom.tree_scope(anchor))
                .is_some_and(|host| self.match_parts(left, host, context, Candidate::Other)),
            Combinator::ContentDistributed => self
                .dom
                .assigned_slot(anchor)
                .is_some_and(|slot| self.match_parts(left, slot, context, Candidate::Other)),
        }
    }

    /// Match one compound. Returns the element the next combinator starts
    /// from: the element itself, or its slot for `::slotted()`.
    fn match_compound(
        &self,
        compound: &CompoundSelector,
        element: NodeId,
        context: &SelectorCheckingContext,
        candidate: Candidate,
    ) -> Option<NodeId> {
        let data = self.dom.get(element).filter(|d| d.is_element())?;
        let subject = candidate == Candidate::Subject;

        let Some(slotted) = compound.slotted() else {
            return compound
                .components
                .iter()
                .all(|c| self.match_component(c, element, data, context, subject))
                .then_some(element);
        };

        if !self.match_simple(slotted, element, data, context) {
            return None;
        }
        let slot = self.assigned_slot_in_scope(element, context.scope)?;
        let slot_data = self.dom.get(slot)?;
        compound
            .components
            .iter()
            .filter(|c| !matches!(c, SelectorComponent::Slotted(_)))
            .all(|c| self.match_component(c, slot, slot_data, context, false))
            .then_some(slot)
    }

    /// The slot `element` is distributed to in `scope`, following slots that
    /// are themselves assigned to slots of an enclosing shadow tree.
    fn assigned_slot_in_scope(&self, element: NodeId, scope: Option<NodeId>) -> Option<NodeId> {
        let mut slot = self.dom.assigned_slot(element)?;
        let Some(scope) = scope else {
            return Some(slot);
        };
        while self.dom.tree_scope(slot) != scope {
            slot = self.dom.assigned_slot(slot)?;
        }
        Some(slot)
    }

    fn match_simple(
        &self,
        compound: &CompoundSelector,
        element: NodeId,
        data: &NodeData,
        context: &SelectorCheckingContext,
    ) -> bool {
        compound
            .components
            .iter()
            .all(|c| self.match_component(c, element, data, context, false))
    }

    fn match_component(
        &self,
        component: &SelectorComponent,
        element: NodeId,
        data: &NodeData,
        context: &SelectorCheckingContext,
        subject: bool,
    ) -> bool {
        match component {
            SelectorComponent::Type(tag) => data.tag == *tag,
            SelectorComponent::Universal => true,
            SelectorComponent::Class(class) => data.has_class(class),
            SelectorComponent::Id(id) => data.id.as_deref() == Some(id.as_str()),
            SelectorComponent::Attribute(attr) => match_attribute(attr, data),
            SelectorComponent::PseudoClass(name) => {
                self.match_pseudo_class(name, element, data, subject)
            }
            SelectorComponent::Not(inner) => !self.match_simple(inner, element, data, context),
            SelectorComponent::Host(argument) => {
                self.is_scope_host(element, context)
                    && argument
                        .as_ref()
                        .map_or(true, |arg| self.match_simple(arg, element, data, context))
            }
            SelectorComponent::HostContext(argument) => {
                if !self.is_scope_host(element, context) {
                    return false;
                }
                let mut current = Some(element);
                while let Some(node) = current {
                    if let Some(node_data) = self.dom.get(node).filter(|d| d.is_element()) {
                        if self.match_simple(argument, node, node_data, context) {
                            return true;
                        }
                    }
                    current = self.dom.parent_or_shadow_host(node);
                }
                false
            }
            SelectorComponent::PseudoElement(name) => {
                if is_shadow_pseudo_element(name) {
                    data.attribute("pseudo").as_deref() == Some(name.as_str())
                } else {
                    // Generated pseudo-elements are checked against the
                    // context before matching starts.
                    true
                }
            }
            SelectorComponent::Slotted(_) => false,
        }
    }

    fn match_pseudo_class(&self, name: &str, element: NodeId, data: &NodeData, subject: bool) -> bool {
        match name {
            "hover" => data.hovered,
            "focus" => data.focused,
            "disabled" => data.disabled,
            "enabled" => !data.disabled,
            // On the subject both link states match; the cascade picks the
            // visited or unvisited style later.
            "link" => data.is_link() && (subject || !data.visited),
            "visited" => data.is_link() && (subject || data.visited),
            "any-link" => data.is_link(),
            "root" => self.dom.parent(element) == Some(self.dom.document()),
            "empty" => self.dom.children(element).is_empty(),
            "first-child" => {
                self.dom.parent(element).is_some()
                    && self.dom.previous_element_sibling(element).is_none()
            }
            "last-child" => {
                self.dom.parent(element).is_some()
                    && self.dom.next_element_sibling(element).is_none()
            }
            "only-child" => {
                self.dom.parent(element).is_some()
                    && self.dom.previous_element_sibling(element).is_none()
                    && self.dom.next_element_sibling(element).is_none()
            }
            _ => false,
        }
    }

    /// Whether `element` hosts the shadow root the rule is scoped to.
    fn is_scope_host(&self, element: NodeId, context: &SelectorCheckingContext) -> bool {
        context.scope.is_some_and(|scope| {
            self.dom.is_shadow_root(scope) && self.dom.shadow_host(scope) == Some(element)
        })
    }

    /// The next ancestor for plain combinators: the parent element, or the
    /// scope's host when the walk reaches the scoping shadow root.
    fn parent_for_matching(
        &self,
        element: NodeId,
        context: &SelectorCheckingContext,
    ) -> Option<(NodeId, Candidate)> {
        if let Some(parent) = self.dom.parent_element(element) {
            return Some((parent, Candidate::Other));
        }
        let parent = self.dom.parent(element)?;
        if context.scope == Some(parent) && self.dom.is_shadow_root(parent) {
            return self
                .dom
                .shadow_host(parent)
                .map(|host| (host, Candidate::ScopeHost));
        }
        None
    }

    fn scope_contains_last_matched_element(
        &self,
        element: NodeId,
        context: &SelectorCheckingContext,
    ) -> bool {
        if !context
            .behavior
            .contains(BoundaryBehavior::SCOPE_CONTAINS_LAST_MATCHED_ELEMENT)
        {
            return true;
        }
        let Some(scope) = context.scope else {
            return true;
        };
        self.dom.tree_scope(element) == scope
            || (context.behavior.contains(BoundaryBehavior::SCOPE_IS_SHADOW_ROOT)
                && self.dom.shadow_host(scope) == Some(element))
    }
}

/// Role of the element a compound is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    Subject,
    /// The host of the scoping shadow root, reached by leaving the scope.
    /// Only `:host` compounds may match it.
    ScopeHost,
    Other,
}

fn match_attribute(attr: &AttributeSelector, data: &NodeData) -> bool {
    let Some(value) = data.attribute(&attr.name) else {
        return false;
    };
    let Some((operator, expected)) = &attr.matcher else {
        return true;
    };
    let expected = expected.as_str();
    match operator {
        AttrOperator::Equals => value == expected,
        AttrOperator::Includes => value.split_whitespace().any(|word| word == expected),
        AttrOperator::DashMatch => {
            value == expected
                || value
                    .strip_prefix(expected)
                    .is_some_and(|rest| rest.starts_with('-'))
        }
        AttrOperator::Prefix => !expected.is_empty() && value.starts_with(expected),
        AttrOperator::Suffix => !expected.is_empty() && value.ends_with(expected),
        AttrOperator::Substring => !expected.is_empty() && value.contains(expected),
    }
}
