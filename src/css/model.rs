//! CSS object model: selectors, declarations, rules, style sheets.

use std::fmt;
use std::rc::Rc;

use crate::css::media::MediaQueryList;

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// Attribute selector operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOperator {
    /// `[a=v]`
    Equals,
    /// `[a~=v]`: whitespace-separated list contains `v`.
    Includes,
    /// `[a|=v]`: equals `v` or starts with `v-`.
    DashMatch,
    /// `[a^=v]`
    Prefix,
    /// `[a$=v]`
    Suffix,
    /// `[a*=v]`
    Substring,
}

/// An attribute selector: `[name]` or `[name op value]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSelector {
    pub name: String,
    pub matcher: Option<(AttrOperator, String)>,
}

/// A single simple selector inside a compound selector.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorComponent {
    /// Type selector: matches the element's tag name (e.g. `div`).
    Type(String),
    /// Universal selector: `*`.
    Universal,
    /// Class selector: `.classname`.
    Class(String),
    /// ID selector: `#id`.
    Id(String),
    /// Attribute selector: `[href]`, `[type="text"]`.
    Attribute(AttributeSelector),
    /// Pseudo-class: `:hover`, `:focus`, `:link`, etc.
    PseudoClass(String),
    /// `:not(compound)`.
    Not(Box<CompoundSelector>),
    /// `:host` or `:host(compound)`.
    Host(Option<Box<CompoundSelector>>),
    /// `:host-context(compound)`.
    HostContext(Box<CompoundSelector>),
    /// Pseudo-element: `::before`, `::first-letter`, or a custom `::-x-thumb`.
    PseudoElement(String),
    /// `::slotted(compound)`.
    Slotted(Box<CompoundSelector>),
}

/// A combinator between compound selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// Descendant combinator (whitespace): `A B`.
    Descendant,
    /// Child combinator: `A > B`.
    Child,
    /// Next-sibling combinator: `A + B`.
    NextSibling,
    /// Subsequent-sibling combinator: `A ~ B`.
    SubsequentSibling,
    /// Shadow-piercing descendant combinator: `A /deep/ B`, `A >>> B`.
    ShadowDeep,
    /// `A::shadow B`: `B` lives inside a shadow tree hosted by `A`.
    ShadowTree,
    /// Implicit relation between a host and a custom pseudo-element:
    /// `input::-x-thumb`.
    ShadowPseudo,
    /// `A::content B`: `B` is distributed into insertion point `A`.
    ContentDistributed,
}

impl Combinator {
    /// Whether this combinator crosses out of the subject's tree scope.
    pub fn crosses_tree_boundary(self) -> bool {
        matches!(
            self,
            Combinator::ShadowDeep
                | Combinator::ShadowTree
                | Combinator::ShadowPseudo
                | Combinator::ContentDistributed
        )
    }
}

/// A single compound selector (sequence of components without combinators).
///
/// For example, `a.primary:hover` is one `CompoundSelector` with three
/// components: `Type("a")`, `Class("primary")`, `PseudoClass("hover")`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundSelector {
    pub components: Vec<SelectorComponent>,
}

impl CompoundSelector {
    /// Create an empty compound selector.
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Create a compound holding only the universal selector.
    pub fn universal() -> Self {
        Self {
            components: vec![SelectorComponent::Universal],
        }
    }

    /// Append a component to this compound selector.
    pub fn push(&mut self, component: SelectorComponent) {
        self.components.push(component);
    }

    /// Returns `true` if this selector is the universal selector `*` alone.
    pub fn is_universal(&self) -> bool {
        self.components.len() == 1
            && matches!(self.components[0], SelectorComponent::Universal)
    }

    /// The pseudo-element named in this compound, if any.
    pub fn pseudo_element(&self) -> Option<&str> {
        self.components.iter().find_map(|c| match c {
            SelectorComponent::PseudoElement(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// The `::slotted()` argument in this compound, if any.
    pub fn slotted(&self) -> Option<&CompoundSelector> {
        self.components.iter().find_map(|c| match c {
            SelectorComponent::Slotted(inner) => Some(inner.as_ref()),
            _ => None,
        })
    }

    /// Whether this compound contains `:host`, `:host()` or `:host-context()`.
    pub fn has_host_pseudo(&self) -> bool {
        self.components.iter().any(|c| {
            matches!(
                c,
                SelectorComponent::Host(_) | SelectorComponent::HostContext(_)
            )
        })
    }
}

impl Default for CompoundSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// One element in a selector chain: either a compound selector or a combinator.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorPart {
    /// A compound selector (one or more simple selectors).
    Compound(CompoundSelector),
    /// A combinator between compound selectors.
    Combinator(Combinator),
}

/// A full CSS selector: chain of compound selectors joined by combinators.
///
/// For example, `.a > div.b` is a `Selector` with parts:
/// `[Compound(.a), Combinator(Child), Compound(div.b)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    /// Alternating compound selectors and combinators.
    /// Always starts and ends with a `SelectorPart::Compound`.
    pub parts: Vec<SelectorPart>,
}

impl Selector {
    /// Create an empty selector.
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// The rightmost compound: the one tested against the subject element.
    pub fn rightmost(&self) -> Option<&CompoundSelector> {
        match self.parts.last() {
            Some(SelectorPart::Compound(compound)) => Some(compound),
            _ => None,
        }
    }

    /// Iterate over all compounds, left to right.
    pub fn compounds(&self) -> impl Iterator<Item = &CompoundSelector> {
        self.parts.iter().filter_map(|part| match part {
            SelectorPart::Compound(c) => Some(c),
            SelectorPart::Combinator(_) => None,
        })
    }

    /// Iterate over all combinators, left to right.
    pub fn combinators(&self) -> impl Iterator<Item = Combinator> + '_ {
        self.parts.iter().filter_map(|part| match part {
            SelectorPart::Combinator(c) => Some(*c),
            SelectorPart::Compound(_) => None,
        })
    }

    /// Whether the selector uses `/deep/`, `>>>` or `::shadow`.
    pub fn uses_deep_combinator_or_shadow_pseudo(&self) -> bool {
        self.combinators()
            .any(|c| matches!(c, Combinator::ShadowDeep | Combinator::ShadowTree))
    }

    /// Whether the selector uses `::content`.
    pub fn has_content_pseudo(&self) -> bool {
        self.combinators()
            .any(|c| c == Combinator::ContentDistributed)
    }

    /// Whether the selector uses `::slotted()`.
    pub fn has_slotted_pseudo(&self) -> bool {
        self.compounds().any(|c| c.slotted().is_some())
    }

    /// Whether any combinator is a sibling combinator.
    pub fn has_sibling_combinator(&self) -> bool {
        self.combinators().any(|c| {
            matches!(c, Combinator::NextSibling | Combinator::SubsequentSibling)
        })
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

impl fmt::Display for AttributeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.matcher {
            None => write!(f, "[{}]", self.name),
            Some((op, value)) => {
                let op = match op {
                    AttrOperator::Equals => "=",
                    AttrOperator::Includes => "~=",
                    AttrOperator::DashMatch => "|=",
                    AttrOperator::Prefix => "^=",
                    AttrOperator::Suffix => "$=",
                    AttrOperator::Substring => "*=",
                };
                write!(f, "[{}{}\"{}\"]", self.name, op, value)
            }
        }
    }
}

impl fmt::Display for SelectorComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorComponent::Type(name) => f.write_str(name),
            SelectorComponent::Universal => f.write_str("*"),
            SelectorComponent::Class(name) => write!(f, ".{name}"),
            SelectorComponent::Id(name) => write!(f, "#{name}"),
            SelectorComponent::Attribute(attr) => write!(f, "{attr}"),
            SelectorComponent::PseudoClass(name) => write!(f, ":{name}"),
            SelectorComponent::Not(inner) => write!(f, ":not({inner})"),
            SelectorComponent::Host(None) => f.write_str(":host"),
            SelectorComponent::Host(Some(inner)) => write!(f, ":host({inner})"),
            SelectorComponent::HostContext(inner) => write!(f, ":host-context({inner})"),
            SelectorComponent::PseudoElement(name) => write!(f, "::{name}"),
            SelectorComponent::Slotted(inner) => write!(f, "::slotted({inner})"),
        }
    }
}

impl fmt::Display for CompoundSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.parts.iter().peekable();
        while let Some(part) = iter.next() {
            match part {
                SelectorPart::Compound(compound) => {
                    // The compound after a shadow-pseudo relation is written
                    // flush against its host.
                    write!(f, "{compound}")?;
                }
                SelectorPart::Combinator(combinator) => {
                    let text = match combinator {
                        Combinator::Descendant => " ",
                        Combinator::Child => " > ",
                        Combinator::NextSibling => " + ",
                        Combinator::SubsequentSibling => " ~ ",
                        Combinator::ShadowDeep => " /deep/ ",
                        Combinator::ShadowTree => "::shadow ",
                        Combinator::ShadowPseudo => "",
                        Combinator::ContentDistributed => "::content ",
                    };
                    f.write_str(text)?;
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// A value token within a CSS declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationValue {
    /// An identifier like `red`, `bold`, `center`.
    Ident(String),
    /// A bare number like `10`, `3.14`.
    Number(f32),
    /// A number with a unit suffix like `10px`, `50%`, `2s`.
    Dimension(f32, String),
    /// A hex color string (without the `#` prefix), e.g. `"ff00aa"`.
    Color(String),
    /// A quoted string value.
    String(String),
    /// A function call with its raw argument text, e.g. `url(a.woff)`.
    Function { name: String, arguments: String },
    /// A separator: `,` or `/`.
    Delimiter(char),
}

impl fmt::Display for DeclarationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationValue::Ident(name) => f.write_str(name),
            DeclarationValue::Number(n) => write!(f, "{n}"),
            DeclarationValue::Dimension(n, unit) => write!(f, "{n}{unit}"),
            DeclarationValue::Color(hex) => write!(f, "#{hex}"),
            DeclarationValue::String(s) => write!(f, "\"{s}\""),
            DeclarationValue::Function { name, arguments } => write!(f, "{name}({arguments})"),
            DeclarationValue::Delimiter(c) => write!(f, "{c}"),
        }
    }
}

/// Serialize a value list the way it would appear after the colon.
pub fn values_to_css(values: &[DeclarationValue]) -> String {
    let mut out = String::new();
    for (i, value) in values.iter().enumerate() {
        let is_comma = matches!(value, DeclarationValue::Delimiter(','));
        if i > 0 && !is_comma {
            out.push(' ');
        }
        out.push_str(&value.to_string());
    }
    out
}

/// A single CSS property declaration, e.g. `color: red` or `margin: 1px 2px`.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// The property name, lowercased, e.g. `"color"`, `"margin"`.
    pub property: String,
    /// The declaration values.
    pub values: Vec<DeclarationValue>,
    /// Whether `!important` was specified.
    pub important: bool,
}

impl Declaration {
    /// Create a new declaration.
    pub fn new(property: String, values: Vec<DeclarationValue>, important: bool) -> Self {
        Self {
            property,
            values,
            important,
        }
    }
}

/// The `{ ... }` block of a rule.
///
/// Blocks are shared (`Rc`) between the style sheet that declares them, the
/// indexed rule data, and the match results built from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclarationBlock {
    pub declarations: Vec<Declaration>,
}

impl DeclarationBlock {
    pub fn new(declarations: Vec<Declaration>) -> Self {
        Self { declarations }
    }

    /// Number of declarations in the block.
    pub fn property_count(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    /// Whether any declaration carries `!important`.
    pub fn has_important(&self) -> bool {
        self.declarations.iter().any(|d| d.important)
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A style rule: a selector list paired with a declaration block.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    /// The selectors for this rule (comma-separated in CSS).
    pub selectors: Vec<Selector>,
    pub block: Rc<DeclarationBlock>,
}

impl StyleRule {
    pub fn new(selectors: Vec<Selector>, declarations: Vec<Declaration>) -> Self {
        Self {
            selectors,
            block: Rc::new(DeclarationBlock::new(declarations)),
        }
    }

    /// The selector list serialized as it would appear in a sheet.
    pub fn selector_text(&self) -> String {
        self.selectors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `@page [:pseudo] { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct PageRule {
    pub pseudo: Option<String>,
    pub block: Rc<DeclarationBlock>,
}

/// `@viewport { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportRule {
    pub block: Rc<DeclarationBlock>,
}

/// `@font-face { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct FontFaceRule {
    pub block: Rc<DeclarationBlock>,
}

impl FontFaceRule {
    /// The `font-family` this face declares, if any.
    pub fn family(&self) -> Option<String> {
        self.block
            .iter()
            .find(|d| d.property == "font-family")
            .and_then(|d| d.values.first())
            .map(|v| match v {
                DeclarationValue::String(s) | DeclarationValue::Ident(s) => s.clone(),
                other => other.to_string(),
            })
    }
}

/// One keyframe inside `@keyframes`: `from`, `to`, or percentage keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    pub keys: Vec<String>,
    pub block: Rc<DeclarationBlock>,
}

/// `@keyframes name { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframesRule {
    pub name: String,
    pub frames: Vec<Keyframe>,
}

/// A top-level or nested rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Style(Rc<StyleRule>),
    Media {
        queries: MediaQueryList,
        rules: Vec<Rule>,
    },
    Page(Rc<PageRule>),
    Viewport(Rc<ViewportRule>),
    FontFace(Rc<FontFaceRule>),
    Keyframes(Rc<KeyframesRule>),
}

/// A parsed CSS style sheet: an ordered list of rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleSheet {
    pub rules: Vec<Rule>,
}

impl StyleSheet {
    /// Create an empty style sheet.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Iterate over the top-level style rules only.
    pub fn style_rules(&self) -> impl Iterator<Item = &Rc<StyleRule>> {
        self.rules.iter().filter_map(|rule| match rule {
            Rule::Style(style) => Some(style),
            _ => None,
        })
    }
}
