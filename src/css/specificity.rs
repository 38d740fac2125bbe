//! Selector specificity calculation and comparison.
//!
//! Specificity is the standard CSS triple:
//!
//! ```text
//! (id_count, class_count, type_count)
//! ```
//!
//! Fields are ordered so that `Ord` (lexicographic) gives the correct result:
//! - More IDs beat fewer IDs
//! - More classes, attributes and pseudo-classes beat fewer
//! - More type selectors and pseudo-elements beat fewer
//!
//! `:not(x)` counts as its argument. `:host(x)` and `:host-context(x)` count
//! as one pseudo-class plus their argument, `::slotted(x)` as one
//! pseudo-element plus its argument.

use std::fmt;

use crate::css::model::{CompoundSelector, Selector, SelectorComponent};

/// CSS specificity, ordered from highest to lowest priority.
///
/// Derive `Ord` so that lexicographic comparison gives the correct cascade order:
/// higher specificity wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Specificity {
    /// Number of ID selectors (`#id`).
    pub id_count: u16,
    /// Number of class, attribute and pseudo-class selectors.
    pub class_count: u16,
    /// Number of type selectors and pseudo-elements.
    pub type_count: u16,
}

impl Specificity {
    /// Create a zero specificity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute specificity from a parsed selector.
    pub fn from_selector(selector: &Selector) -> Self {
        selector
            .compounds()
            .fold(Self::default(), |acc, compound| acc + Self::from_compound(compound))
    }

    /// Compute specificity of a single compound selector.
    pub fn from_compound(compound: &CompoundSelector) -> Self {
        let mut spec = Self::default();

        for component in &compound.components {
            match component {
                SelectorComponent::Id(_) => spec.id_count += 1,
                SelectorComponent::Class(_)
                | SelectorComponent::Attribute(_)
                | SelectorComponent::PseudoClass(_)
                | SelectorComponent::Host(None) => spec.class_count += 1,
                SelectorComponent::Type(_) | SelectorComponent::PseudoElement(_) => {
                    spec.type_count += 1
                }
                SelectorComponent::Universal => {
                    // Universal selector has zero specificity.
                }
                SelectorComponent::Not(inner) => spec = spec + Self::from_compound(inner),
                SelectorComponent::Host(Some(inner)) | SelectorComponent::HostContext(inner) => {
                    spec.class_count += 1;
                    spec = spec + Self::from_compound(inner);
                }
                SelectorComponent::Slotted(inner) => {
                    spec.type_count += 1;
                    spec = spec + Self::from_compound(inner);
                }
            }
        }

        spec
    }

    /// Packed single-number form, `a * 65536 + b * 256 + c` with each field
    /// clamped to its byte range.
    pub fn value(&self) -> u32 {
        let a = u32::from(self.id_count.min(0xff));
        let b = u32::from(self.class_count.min(0xff));
        let c = u32::from(self.type_count.min(0xff));
        (a << 16) | (b << 8) | c
    }
}

impl std::ops::Add for Specificity {
    type Output = Specificity;

    fn add(self, rhs: Self) -> Self {
        Self {
            id_count: self.id_count.saturating_add(rhs.id_count),
            class_count: self.class_count.saturating_add(rhs.class_count),
            type_count: self.type_count.saturating_add(rhs.type_count),
        }
    }
}

impl fmt::Display for Specificity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.id_count, self.class_count, self.type_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::parser::parse_selector;

    fn spec(input: &str) -> Specificity {
        let selector = parse_selector(input).unwrap_or_else(|e| panic!("bad selector {input}: {e}"));
        Specificity::from_selector(&selector)
    }

    fn triple(id: u16, class: u16, ty: u16) -> Specificity {
        Specificity {
            id_count: id,
            class_count: class,
            type_count: ty,
        }
    }

    #[test]
    fn test_specificity_new() {
        assert_eq!(Specificity::new(), triple(0, 0, 0));
    }

    #[test]
    fn test_simple_selectors() {
        assert_eq!(spec("*"), triple(0, 0, 0));
        assert_eq!(spec("div"), triple(0, 0, 1));
        assert_eq!(spec(".a"), triple(0, 1, 0));
        assert_eq!(spec("#x"), triple(1, 0, 0));
        assert_eq!(spec("[href]"), triple(0, 1, 0));
        assert_eq!(spec("a:hover"), triple(0, 1, 1));
    }

    #[test]
    fn test_combinators_sum_compounds() {
        assert_eq!(spec("div > p.note #main"), triple(1, 1, 2));
        assert_eq!(spec(".a /deep/ .b"), triple(0, 2, 0));
    }

    #[test]
    fn test_functional_pseudos() {
        assert_eq!(spec("a:not(.b)"), triple(0, 1, 1));
        assert_eq!(spec(":host"), triple(0, 1, 0));
        assert_eq!(spec(":host(.active)"), triple(0, 2, 0));
        assert_eq!(spec(":host-context(#dark)"), triple(1, 1, 0));
        assert_eq!(spec("::slotted(span)"), triple(0, 0, 2));
    }

    #[test]
    fn test_pseudo_elements_count_as_types() {
        assert_eq!(spec("p::first-letter"), triple(0, 0, 2));
        // The host compound is an implicit universal selector.
        assert_eq!(spec("::-x-thumb"), triple(0, 0, 1));
    }

    #[test]
    fn test_ordering() {
        assert!(triple(1, 0, 0) > triple(0, 10, 10));
        assert!(triple(0, 1, 0) > triple(0, 0, 10));
        assert!(triple(0, 1, 1) > triple(0, 1, 0));
    }

    #[test]
    fn test_packed_value() {
        assert_eq!(triple(1, 2, 3).value(), 0x01_02_03);
        assert_eq!(triple(0, 300, 0).value(), 0x00_ff_00);
    }

    #[test]
    fn test_display() {
        assert_eq!(triple(1, 2, 3).to_string(), "(1,2,3)");
    }
}
