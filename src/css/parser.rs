//! Recursive descent CSS parser.
//!
//! Parses CSS text into a [`StyleSheet`]. Uses the logos-based tokenizer from
//! [`crate::css::tokenizer`]. Whitespace is not tokenized; byte spans are kept
//! so adjacency (`div.a` vs `div .a`) can still be told apart.

use logos::Logos;

use std::rc::Rc;

use crate::css::media::{MediaFeature, MediaQuery, MediaQueryList};
use crate::css::model::*;
use crate::css::tokenizer::Token;

/// Errors from CSS parsing.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected token at position {position}: {message}")]
    UnexpectedToken { position: usize, message: String },
    #[error("unexpected end of input: {0}")]
    UnexpectedEof(String),
}

/// A positioned token with byte-level span information for whitespace detection.
#[derive(Debug, Clone)]
struct PToken {
    token: Token,
    text: String,
    /// Index in the token stream (for error reporting).
    pos: usize,
    /// Byte offset where this token starts in the source.
    byte_start: usize,
    /// Byte offset where this token ends in the source.
    byte_end: usize,
}

/// Strip CSS block comments (`/* ... */`) from the input, replacing each
/// comment with a single space. Comment markers inside quoted strings are
/// kept as written.
fn strip_comments(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut result = String::with_capacity(input.len());
    let mut copied = 0;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        match quote {
            Some(_) if byte == b'\\' => i += 2,
            Some(open) => {
                if byte == open || byte == b'\n' {
                    quote = None;
                }
                i += 1;
            }
            None if byte == b'"' || byte == b'\'' => {
                quote = Some(byte);
                i += 1;
            }
            None if bytes[i..].starts_with(b"/*") => {
                result.push_str(&input[copied..i]);
                result.push(' ');
                // Unterminated comment consumes the rest of the input.
                i = input[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |end| i + 2 + end + 2);
                copied = i;
            }
            None => i += 1,
        }
    }
    result.push_str(&input[copied.min(input.len())..]);

    result
}

/// Tokenize input using logos with span information preserved.
fn tokenize_with_spans(input: &str) -> Vec<PToken> {
    let lexer = Token::lexer(input);
    let mut tokens = Vec::new();
    let mut idx = 0;

    for (result, span) in lexer.spanned() {
        if let Ok(token) = result {
            tokens.push(PToken {
                text: input[span.clone()].to_string(),
                token,
                pos: idx,
                byte_start: span.start,
                byte_end: span.end,
            });
            idx += 1;
        }
    }

    tokens
}

/// Parse a CSS string into a [`StyleSheet`].
pub fn parse_css(input: &str) -> Result<StyleSheet, ParseError> {
    let mut parser = Parser::new(input);
    let rules = parser.parse_rule_list(false)?;
    Ok(StyleSheet { rules })
}

/// Parse a single selector, e.g. `"div.a > .b"`.
pub fn parse_selector(input: &str) -> Result<Selector, ParseError> {
    let mut parser = Parser::new(input);
    let selector = parser.parse_selector()?;
    match parser.peek() {
        None => Ok(selector),
        Some(tok) => Err(ParseError::UnexpectedToken {
            position: tok.pos,
            message: format!("trailing input after selector: '{}'", tok.text),
        }),
    }
}

/// Parse a bare declaration list, such as the value of a `style` attribute.
pub fn parse_declaration_list(input: &str) -> Result<DeclarationBlock, ParseError> {
    let mut parser = Parser::new(input);
    let declarations = parser.parse_declarations()?;
    match parser.peek() {
        None => Ok(DeclarationBlock::new(declarations)),
        Some(tok) => Err(ParseError::UnexpectedToken {
            position: tok.pos,
            message: format!("unexpected '{}' in declaration list", tok.text),
        }),
    }
}

/// Parse a media query list, e.g. `"screen and (min-width: 600px)"`.
pub fn parse_media_query_list(input: &str) -> MediaQueryList {
    let parser = Parser::new(input);
    media_query_list(&parser.tokens)
}

/// Recursive descent parser state.
struct Parser {
    source: String,
    tokens: Vec<PToken>,
    cursor: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        let source = strip_comments(input);
        let tokens = tokenize_with_spans(&source);
        Self {
            source,
            tokens,
            cursor: 0,
        }
    }

    fn is_eof(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    fn peek(&self) -> Option<&PToken> {
        self.tokens.get(self.cursor)
    }

    fn peek_is(&self, token: Token) -> bool {
        self.peek().is_some_and(|t| t.token == token)
    }

    fn advance(&mut self) -> Option<&PToken> {
        if self.cursor < self.tokens.len() {
            let tok = &self.tokens[self.cursor];
            self.cursor += 1;
            Some(tok)
        } else {
            None
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<PToken, ParseError> {
        match self.advance() {
            Some(tok) if &tok.token == expected => Ok(tok.clone()),
            Some(tok) => Err(ParseError::UnexpectedToken {
                position: tok.pos,
                message: format!(
                    "expected {:?}, got {:?} '{}'",
                    expected, tok.token, tok.text
                ),
            }),
            None => Err(ParseError::UnexpectedEof(format!(
                "expected {:?}",
                expected
            ))),
        }
    }

    /// Consume the next token, requiring it to be an identifier.
    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        let tok = self
            .advance()
            .ok_or_else(|| ParseError::UnexpectedEof(format!("expected {what}")))?;
        if tok.token != Token::Ident {
            return Err(ParseError::UnexpectedToken {
                position: tok.pos,
                message: format!("expected {what}, got {:?} '{}'", tok.token, tok.text),
            });
        }
        Ok(tok.text.clone())
    }

    fn current_pos(&self) -> usize {
        self.peek().map(|t| t.pos).unwrap_or(self.tokens.len())
    }

    /// Returns `true` if the current token is immediately adjacent (no whitespace)
    /// to the previous token.
    fn is_adjacent(&self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = &self.tokens[self.cursor - 1];
        match self.peek() {
            Some(curr) => curr.byte_start == prev.byte_end,
            None => false,
        }
    }

    /// Whether the next token is a `(` glued to the previous token.
    fn at_adjacent_paren(&self) -> bool {
        self.is_adjacent() && self.peek_is(Token::ParenOpen)
    }

    /// Skip tokens through the `)` matching an already-consumed `(`.
    /// Returns the raw source text between the parentheses.
    fn skip_to_matching_paren(&mut self, open: &PToken) -> Result<String, ParseError> {
        let mut depth = 1usize;
        while let Some(tok) = self.advance() {
            let (token, byte_start) = (tok.token.clone(), tok.byte_start);
            match token {
                Token::ParenOpen => depth += 1,
                Token::ParenClose => {
                    depth -= 1;
                    if depth == 0 {
                        let inner = &self.source[open.byte_end..byte_start];
                        return Ok(inner.trim().to_string());
                    }
                }
                _ => {}
            }
        }
        Err(ParseError::UnexpectedEof("expected ')'".into()))
    }

    // ── Rules ────────────────────────────────────────────────────────

    /// Parse rules until end of input, or until a `}` when `nested`.
    fn parse_rule_list(&mut self, nested: bool) -> Result<Vec<Rule>, ParseError> {
        let mut rules = Vec::new();
        while !self.is_eof() {
            if nested && self.peek_is(Token::BraceClose) {
                break;
            }
            if let Some(rule) = self.parse_rule()? {
                rules.push(rule);
            }
        }
        Ok(rules)
    }

    /// Parse one rule. Unknown at-rules are consumed and yield `None`.
    fn parse_rule(&mut self) -> Result<Option<Rule>, ParseError> {
        let at_keyword = match self.peek() {
            Some(t) if t.token == Token::AtKeyword => Some(t.text[1..].to_ascii_lowercase()),
            _ => None,
        };
        let Some(name) = at_keyword else {
            return self.parse_style_rule().map(Some);
        };
        self.advance();

        match name.as_str() {
            "media" => self.parse_media_rule().map(Some),
            "page" => self.parse_page_rule().map(Some),
            "viewport" | "-webkit-viewport" | "-ms-viewport" => {
                let block = self.parse_block()?;
                Ok(Some(Rule::Viewport(Rc::new(ViewportRule { block }))))
            }
            "font-face" => {
                let block = self.parse_block()?;
                Ok(Some(Rule::FontFace(Rc::new(FontFaceRule { block }))))
            }
            "keyframes" | "-webkit-keyframes" => self.parse_keyframes_rule().map(Some),
            _ => {
                tracing::trace!(at_rule = %name, "skipping unsupported at-rule");
                self.skip_at_rule();
                Ok(None)
            }
        }
    }

    /// Parse a style rule: selector(s) `{` declarations `}`.
    fn parse_style_rule(&mut self) -> Result<Rule, ParseError> {
        let selectors = self.parse_selector_list()?;
        self.expect(&Token::BraceOpen)?;
        let declarations = self.parse_declarations()?;
        self.expect(&Token::BraceClose)?;

        Ok(Rule::Style(Rc::new(StyleRule::new(selectors, declarations))))
    }

    fn parse_block(&mut self) -> Result<Rc<DeclarationBlock>, ParseError> {
        self.expect(&Token::BraceOpen)?;
        let declarations = self.parse_declarations()?;
        self.expect(&Token::BraceClose)?;
        Ok(Rc::new(DeclarationBlock::new(declarations)))
    }

    fn parse_media_rule(&mut self) -> Result<Rule, ParseError> {
        let start = self.cursor;
        while self.peek().is_some_and(|t| t.token != Token::BraceOpen) {
            self.advance();
        }
        let queries = media_query_list(&self.tokens[start..self.cursor]);
        self.expect(&Token::BraceOpen)?;
        let rules = self.parse_rule_list(true)?;
        self.expect(&Token::BraceClose)?;
        Ok(Rule::Media { queries, rules })
    }

    fn parse_page_rule(&mut self) -> Result<Rule, ParseError> {
        if self.peek_is(Token::Ident) {
            // Named pages are not distinguished.
            self.advance();
        }
        let pseudo = match self.peek() {
            Some(t) if t.token == Token::PseudoClass => {
                let name = t.text[1..].to_ascii_lowercase();
                self.advance();
                Some(name)
            }
            _ => None,
        };
        let block = self.parse_block()?;
        Ok(Rule::Page(Rc::new(PageRule { pseudo, block })))
    }

    fn parse_keyframes_rule(&mut self) -> Result<Rule, ParseError> {
        let tok = self
            .advance()
            .ok_or_else(|| ParseError::UnexpectedEof("expected keyframes name".into()))?;
        let name = match tok.token {
            Token::Ident => tok.text.clone(),
            Token::StringLiteral | Token::StringLiteralSingle => {
                tok.text[1..tok.text.len() - 1].to_string()
            }
            _ => {
                return Err(ParseError::UnexpectedToken {
                    position: tok.pos,
                    message: format!("expected keyframes name, got '{}'", tok.text),
                })
            }
        };

        self.expect(&Token::BraceOpen)?;
        let mut frames = Vec::new();
        while self.peek().is_some_and(|t| t.token != Token::BraceClose) {
            let mut keys = Vec::new();
            loop {
                let tok = self
                    .advance()
                    .ok_or_else(|| ParseError::UnexpectedEof("expected keyframe selector".into()))?;
                match tok.token {
                    Token::Ident | Token::Dimension | Token::Number => {
                        keys.push(tok.text.to_ascii_lowercase())
                    }
                    _ => {
                        return Err(ParseError::UnexpectedToken {
                            position: tok.pos,
                            message: format!("invalid keyframe selector '{}'", tok.text),
                        })
                    }
                }
                if self.peek_is(Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            let block = self.parse_block()?;
            frames.push(Keyframe { keys, block });
        }
        self.expect(&Token::BraceClose)?;

        Ok(Rule::Keyframes(Rc::new(KeyframesRule { name, frames })))
    }

    /// Consume an at-rule prelude and either its `;` or its `{ ... }` block.
    fn skip_at_rule(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.advance() {
            match tok.token {
                Token::Semicolon if depth == 0 => return,
                Token::BraceOpen => depth += 1,
                Token::BraceClose => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    // ── Selectors ────────────────────────────────────────────────────

    /// Parse a comma-separated list of selectors (before `{`).
    fn parse_selector_list(&mut self) -> Result<Vec<Selector>, ParseError> {
        let mut selectors = Vec::new();

        selectors.push(self.parse_selector()?);

        while self.peek_is(Token::Comma) {
            self.advance(); // consume comma
            selectors.push(self.parse_selector()?);
        }

        Ok(selectors)
    }

    /// Parse a single selector: a sequence of compound selectors with combinators.
    ///
    /// A selector like `div > x-foo::shadow .b` becomes parts:
    /// - Compound [Type("div")]
    /// - Combinator(Child)
    /// - Compound [Type("x-foo")]
    /// - Combinator(ShadowTree)
    /// - Compound [Class("b")]
    fn parse_selector(&mut self) -> Result<Selector, ParseError> {
        let mut parts = Vec::new();

        let (first, mut relation) = self.parse_compound_selector(false)?;
        parts.push(SelectorPart::Compound(first));

        loop {
            let combinator = match relation.take() {
                // A pseudo-element relation ends the previous compound.
                Some(rel) => rel,
                None => match self.peek().map(|t| &t.token) {
                    Some(Token::GreaterThan) => {
                        self.advance();
                        Combinator::Child
                    }
                    Some(Token::Plus) => {
                        self.advance();
                        Combinator::NextSibling
                    }
                    Some(Token::Tilde) => {
                        self.advance();
                        Combinator::SubsequentSibling
                    }
                    Some(Token::DeepCombinator) => {
                        self.advance();
                        Combinator::ShadowDeep
                    }
                    // A selector-starting token after whitespace is a
                    // descendant combinator; adjacent ones were consumed by
                    // the compound.
                    Some(
                        Token::Ident
                        | Token::Hash
                        | Token::HexColor
                        | Token::Dot
                        | Token::Star
                        | Token::BracketOpen
                        | Token::PseudoClass
                        | Token::PseudoElement,
                    ) => Combinator::Descendant,
                    _ => break,
                },
            };
            parts.push(SelectorPart::Combinator(combinator));
            let (compound, next) =
                self.parse_compound_selector(combinator == Combinator::ShadowPseudo)?;
            parts.push(SelectorPart::Compound(compound));
            relation = next;
        }

        Ok(Selector { parts })
    }

    /// Parse a compound selector: a sequence of simple selector components with
    /// no whitespace between them, e.g. `button.primary:hover`.
    ///
    /// `::shadow`, `::content` and custom `::-x-*` pseudo-elements end the
    /// compound; the relation they introduce is returned alongside it. When
    /// `after_shadow_pseudo` is set, a leading custom pseudo-element belongs to
    /// this compound.
    fn parse_compound_selector(
        &mut self,
        after_shadow_pseudo: bool,
    ) -> Result<(CompoundSelector, Option<Combinator>), ParseError> {
        let mut components = Vec::new();

        loop {
            // Continue appending to this compound only if the next token is
            // adjacent (no whitespace gap).
            if !components.is_empty() && !self.is_adjacent() {
                break;
            }
            let Some(tok) = self.peek().cloned() else {
                break;
            };

            match tok.token {
                Token::Ident if components.is_empty() => {
                    self.advance();
                    components.push(SelectorComponent::Type(tok.text.to_ascii_lowercase()));
                }
                Token::Star if components.is_empty() => {
                    self.advance();
                    components.push(SelectorComponent::Universal);
                }
                Token::Dot => {
                    self.advance();
                    let name = self.expect_ident("class name after '.'")?;
                    components.push(SelectorComponent::Class(name));
                }
                Token::Hash => {
                    self.advance();
                    let name = self.expect_ident("id name after '#'")?;
                    components.push(SelectorComponent::Id(name));
                }
                Token::HexColor => {
                    // `#abc` lexes as a color but names an id here; `#add-x`
                    // lexes as `#add` followed by a glued `-x`.
                    self.advance();
                    let mut name = tok.text[1..].to_string();
                    if self.is_adjacent() && self.peek_is(Token::Ident) {
                        if let Some(rest) = self.advance() {
                            name.push_str(&rest.text);
                        }
                    }
                    components.push(SelectorComponent::Id(name));
                }
                Token::BracketOpen => {
                    self.advance();
                    components.push(SelectorComponent::Attribute(self.parse_attribute()?));
                }
                Token::PseudoClass => {
                    self.advance();
                    components.push(self.parse_pseudo_class(&tok)?);
                }
                Token::PseudoElement => {
                    let name = tok.text[2..].to_ascii_lowercase();
                    match name.as_str() {
                        "shadow" | "content" => {
                            self.advance();
                            if components.is_empty() {
                                components.push(SelectorComponent::Universal);
                            }
                            let relation = if name == "shadow" {
                                Combinator::ShadowTree
                            } else {
                                Combinator::ContentDistributed
                            };
                            return Ok((CompoundSelector { components }, Some(relation)));
                        }
                        "slotted" => {
                            self.advance();
                            if !self.at_adjacent_paren() {
                                return Err(ParseError::UnexpectedToken {
                                    position: self.current_pos(),
                                    message: "expected '(' after ::slotted".into(),
                                });
                            }
                            self.advance();
                            let inner = self.parse_inner_compound()?;
                            components.push(SelectorComponent::Slotted(Box::new(inner)));
                        }
                        _ if is_shadow_pseudo_element(&name) => {
                            if components.is_empty() && after_shadow_pseudo {
                                self.advance();
                                components.push(SelectorComponent::PseudoElement(name));
                            } else {
                                // The host part ends here; the pseudo-element
                                // starts the next compound.
                                if components.is_empty() {
                                    components.push(SelectorComponent::Universal);
                                }
                                return Ok((
                                    CompoundSelector { components },
                                    Some(Combinator::ShadowPseudo),
                                ));
                            }
                        }
                        _ => {
                            self.advance();
                            components.push(SelectorComponent::PseudoElement(name));
                        }
                    }
                }
                _ => break,
            }
        }

        if components.is_empty() {
            return Err(ParseError::UnexpectedToken {
                position: self.current_pos(),
                message: "expected selector part".into(),
            });
        }

        Ok((CompoundSelector { components }, None))
    }

    /// Parse the compound argument of a functional pseudo and its `)`.
    fn parse_inner_compound(&mut self) -> Result<CompoundSelector, ParseError> {
        let pos = self.current_pos();
        let (compound, relation) = self.parse_compound_selector(false)?;
        if relation.is_some() {
            return Err(ParseError::UnexpectedToken {
                position: pos,
                message: "pseudo-element relation not allowed here".into(),
            });
        }
        self.expect(&Token::ParenClose)?;
        Ok(compound)
    }

    fn parse_pseudo_class(&mut self, tok: &PToken) -> Result<SelectorComponent, ParseError> {
        let name = tok.text[1..].to_ascii_lowercase();
        let has_args = self.at_adjacent_paren();

        match (name.as_str(), has_args) {
            ("not", true) => {
                self.advance();
                Ok(SelectorComponent::Not(Box::new(self.parse_inner_compound()?)))
            }
            ("host", true) => {
                self.advance();
                Ok(SelectorComponent::Host(Some(Box::new(self.parse_inner_compound()?))))
            }
            ("host", false) => Ok(SelectorComponent::Host(None)),
            ("host-context", true) => {
                self.advance();
                Ok(SelectorComponent::HostContext(Box::new(
                    self.parse_inner_compound()?,
                )))
            }
            ("not" | "host-context", false) => Err(ParseError::UnexpectedToken {
                position: self.current_pos(),
                message: format!("expected '(' after :{name}"),
            }),
            (_, true) => {
                // Unsupported functional pseudo-class: keep it, it never matches.
                let open = self.expect(&Token::ParenOpen)?;
                let args = self.skip_to_matching_paren(&open)?;
                Ok(SelectorComponent::PseudoClass(format!("{name}({args})")))
            }
            (_, false) => Ok(SelectorComponent::PseudoClass(name)),
        }
    }

    /// Parse `name [op value]]` after a consumed `[`.
    fn parse_attribute(&mut self) -> Result<AttributeSelector, ParseError> {
        let name = self.expect_ident("attribute name")?.to_ascii_lowercase();

        let op = match self.peek().map(|t| &t.token) {
            Some(Token::BracketClose) => {
                self.advance();
                return Ok(AttributeSelector {
                    name,
                    matcher: None,
                });
            }
            Some(Token::Equals) => AttrOperator::Equals,
            Some(Token::Includes) => AttrOperator::Includes,
            Some(Token::DashMatch) => AttrOperator::DashMatch,
            Some(Token::PrefixMatch) => AttrOperator::Prefix,
            Some(Token::SuffixMatch) => AttrOperator::Suffix,
            Some(Token::SubstringMatch) => AttrOperator::Substring,
            _ => {
                return Err(ParseError::UnexpectedToken {
                    position: self.current_pos(),
                    message: "expected attribute operator or ']'".into(),
                })
            }
        };
        self.advance();

        let tok = self
            .advance()
            .ok_or_else(|| ParseError::UnexpectedEof("expected attribute value".into()))?;
        let value = match tok.token {
            Token::Ident | Token::Number | Token::Dimension => tok.text.clone(),
            Token::StringLiteral | Token::StringLiteralSingle => {
                tok.text[1..tok.text.len() - 1].to_string()
            }
            _ => {
                return Err(ParseError::UnexpectedToken {
                    position: tok.pos,
                    message: format!("invalid attribute value '{}'", tok.text),
                })
            }
        };
        self.expect(&Token::BracketClose)?;

        Ok(AttributeSelector {
            name,
            matcher: Some((op, value)),
        })
    }

    // ── Declarations ─────────────────────────────────────────────────

    /// Parse declarations between `{` and `}`.
    fn parse_declarations(&mut self) -> Result<Vec<Declaration>, ParseError> {
        let mut declarations = Vec::new();

        while self.peek().is_some_and(|t| t.token != Token::BraceClose) {
            if self.peek_is(Token::Semicolon) {
                self.advance();
                continue;
            }
            declarations.push(self.parse_declaration()?);
        }

        Ok(declarations)
    }

    /// Parse a single declaration: `property: value1 value2 [!important];`
    fn parse_declaration(&mut self) -> Result<Declaration, ParseError> {
        let property = self.expect_ident("property name")?.to_ascii_lowercase();

        let mut values = Vec::new();

        // `color:red` lexes the colon and value as one pseudo-class token.
        match self.peek() {
            Some(t) if t.token == Token::PseudoClass => {
                let ident = t.text[1..].to_string();
                self.advance();
                if self.at_adjacent_paren() {
                    let open = self.expect(&Token::ParenOpen)?;
                    let arguments = self.skip_to_matching_paren(&open)?;
                    values.push(DeclarationValue::Function {
                        name: ident.to_ascii_lowercase(),
                        arguments,
                    });
                } else {
                    values.push(DeclarationValue::Ident(ident));
                }
            }
            _ => {
                self.expect(&Token::Colon)?;
            }
        }

        // Values (until `;` or `}` or `!important`)
        let mut important = false;

        loop {
            match self.peek() {
                None
                | Some(PToken {
                    token: Token::Semicolon,
                    ..
                })
                | Some(PToken {
                    token: Token::BraceClose,
                    ..
                }) => break,
                Some(PToken {
                    token: Token::Important,
                    ..
                }) => {
                    self.advance();
                    important = true;
                    break;
                }
                Some(_) => {
                    values.push(self.parse_declaration_value()?);
                }
            }
        }

        // Consume optional semicolon
        if self.peek_is(Token::Semicolon) {
            self.advance();
        }

        Ok(Declaration::new(property, values, important))
    }

    /// Parse a single declaration value token into a [`DeclarationValue`].
    fn parse_declaration_value(&mut self) -> Result<DeclarationValue, ParseError> {
        let tok = self
            .advance()
            .cloned()
            .ok_or_else(|| ParseError::UnexpectedEof("expected declaration value".into()))?;

        match &tok.token {
            Token::Number => {
                let n: f32 = tok.text.parse().map_err(|_| ParseError::UnexpectedToken {
                    position: tok.pos,
                    message: format!("invalid number: {}", tok.text),
                })?;
                Ok(DeclarationValue::Number(n))
            }
            Token::Dimension => {
                let text = &tok.text;
                let (num_str, unit_str) =
                    split_dimension(text).ok_or_else(|| ParseError::UnexpectedToken {
                        position: tok.pos,
                        message: format!("invalid dimension: {text}"),
                    })?;
                let n: f32 = num_str.parse().map_err(|_| ParseError::UnexpectedToken {
                    position: tok.pos,
                    message: format!("invalid number in dimension: {num_str}"),
                })?;
                Ok(DeclarationValue::Dimension(n, unit_str.to_string()))
            }
            Token::Ident if self.at_adjacent_paren() => {
                let open = self.expect(&Token::ParenOpen)?;
                let arguments = self.skip_to_matching_paren(&open)?;
                Ok(DeclarationValue::Function {
                    name: tok.text.to_ascii_lowercase(),
                    arguments,
                })
            }
            Token::Ident => Ok(DeclarationValue::Ident(tok.text.clone())),
            Token::HexColor => {
                // Strip the leading '#' for DeclarationValue::Color
                let hex = tok.text.strip_prefix('#').unwrap_or(&tok.text);
                Ok(DeclarationValue::Color(hex.to_string()))
            }
            Token::StringLiteral | Token::StringLiteralSingle => {
                // Strip surrounding quotes
                let inner = &tok.text[1..tok.text.len() - 1];
                Ok(DeclarationValue::String(inner.to_string()))
            }
            Token::Comma => Ok(DeclarationValue::Delimiter(',')),
            Token::Slash => Ok(DeclarationValue::Delimiter('/')),
            other => Err(ParseError::UnexpectedToken {
                position: tok.pos,
                message: format!(
                    "unexpected token in declaration value: {:?} '{}'",
                    other, tok.text
                ),
            }),
        }
    }
}

/// Pseudo-elements that live in a shadow tree of their originating element
/// and therefore introduce a host relation.
fn is_shadow_pseudo_element(name: &str) -> bool {
    name.starts_with('-') || name == "cue"
}

/// Parse a media query list from prelude tokens. Queries that fail to parse
/// become `not all`.
fn media_query_list(tokens: &[PToken]) -> MediaQueryList {
    if tokens.is_empty() {
        return MediaQueryList::default();
    }
    let queries = tokens
        .split(|t| t.token == Token::Comma)
        .map(|chunk| media_query(chunk).unwrap_or_else(MediaQuery::not_all))
        .collect();
    MediaQueryList::new(queries)
}

fn media_query(tokens: &[PToken]) -> Option<MediaQuery> {
    let mut negated = false;
    let mut media_type = None;
    let mut features = Vec::new();
    let mut i = 0;

    if let Some(first) = tokens.first() {
        if first.token == Token::Ident {
            match first.text.to_ascii_lowercase().as_str() {
                "not" => {
                    negated = true;
                    i += 1;
                }
                "only" => i += 1,
                _ => {}
            }
        }
    }
    if let Some(tok) = tokens.get(i) {
        if tok.token == Token::Ident {
            media_type = Some(tok.text.to_ascii_lowercase());
            i += 1;
        }
    }

    let mut expect_and = media_type.is_some();
    while i < tokens.len() {
        if expect_and {
            let and = tokens.get(i)?;
            if and.token != Token::Ident || !and.text.eq_ignore_ascii_case("and") {
                return None;
            }
            i += 1;
        }
        if tokens.get(i)?.token != Token::ParenOpen {
            return None;
        }
        let close = i + tokens[i..].iter().position(|t| t.token == Token::ParenClose)?;
        features.push(media_feature(&tokens[i + 1..close])?);
        i = close + 1;
        expect_and = true;
    }

    if negated && media_type.is_none() {
        return None;
    }
    if media_type.is_none() && features.is_empty() {
        return None;
    }

    Some(MediaQuery {
        negated,
        media_type,
        features,
    })
}

fn media_feature(tokens: &[PToken]) -> Option<MediaFeature> {
    let (name_tok, rest) = tokens.split_first()?;
    if name_tok.token != Token::Ident {
        return None;
    }
    let name = name_tok.text.to_ascii_lowercase();
    let value = match rest {
        [] => None,
        // `(orientation:portrait)` lexes the value as a pseudo-class.
        [v] if v.token == Token::PseudoClass => Some(v.text[1..].to_ascii_lowercase()),
        [colon, v] if colon.token == Token::Colon => Some(v.text.to_ascii_lowercase()),
        _ => return None,
    };
    Some(MediaFeature::from_parts(&name, value.as_deref()))
}

/// Split a dimension string like "50%" or "1fr" into (number_part, unit_part).
fn split_dimension(s: &str) -> Option<(&str, &str)> {
    let unit_start = s
        .char_indices()
        .find(|(i, c)| !c.is_ascii_digit() && *c != '.' && !(*c == '-' && *i == 0))
        .map(|(i, _)| i)?;

    if unit_start == 0 || unit_start >= s.len() {
        return None;
    }

    Some((&s[..unit_start], &s[unit_start..]))
}
