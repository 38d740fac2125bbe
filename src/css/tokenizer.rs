//! logos-based CSS tokenizer.
//!
//! Token priority in logos is determined by:
//! 1. Longest match wins (e.g. `#fff` as HexColor beats `#` as Hash)
//! 2. For equal length matches, earlier-defined variants win
//!
//! Our ordering ensures:
//! - `#ff00aa` matches [`Token::HexColor`], not `Hash` + `Ident`
//! - `10px` matches [`Token::Dimension`], not `Number` + `Ident`
//! - `:hover` matches [`Token::PseudoClass`], not `Colon` + `Ident`
//! - `::content` matches [`Token::PseudoElement`], not two pseudo tokens
//! - `>>>` and `/deep/` are single [`Token::DeepCombinator`] tokens

use logos::Logos;

/// CSS token produced by the lexer.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
pub enum Token {
    // ── Compound tokens (longer matches, defined first) ──────────────

    /// `!important` flag.
    #[token("!important")]
    Important,

    /// Shadow-piercing descendant combinator: `/deep/` or `>>>`.
    #[token("/deep/")]
    #[token(">>>")]
    DeepCombinator,

    /// At-rule keyword: `@media`, `@keyframes`, `@font-face`.
    #[regex(r"@-?[a-zA-Z][a-zA-Z0-9_-]*")]
    AtKeyword,

    /// CSS hex color: `#fff`, `#ff00aa`, `#ff00aa80` (3-8 hex digits).
    #[regex(r"#[0-9a-fA-F]{3,8}")]
    HexColor,

    /// Dimension: number with unit suffix like `10px`, `50%`, `1.5em`, `200ms`.
    #[regex(r"-?[0-9]+(\.[0-9]+)?(px|em|rem|%|vw|vh|fr|s|ms|deg)")]
    Dimension,

    /// Pseudo-element: `::before`, `::content`, `::-x-thumb`.
    #[regex(r"::-?[a-zA-Z][a-zA-Z0-9_-]*")]
    PseudoElement,

    /// Pseudo-class: `:hover`, `:host`, `:not`, etc.
    #[regex(r":-?[a-zA-Z][a-zA-Z0-9_-]*")]
    PseudoClass,

    /// Double-quoted string literal.
    #[regex(r#""[^"]*""#)]
    StringLiteral,

    /// Single-quoted string literal.
    #[regex(r"'[^']*'")]
    StringLiteralSingle,

    /// Number: integer or float, possibly negative.
    #[regex(r"-?[0-9]+(\.[0-9]+)?")]
    Number,

    /// Identifier: property names, tag names, keywords, vendor-prefixed names.
    #[regex(r"-?[a-zA-Z_][a-zA-Z0-9_-]*")]
    Ident,

    // ── Attribute operators ──────────────────────────────────────────

    /// `~=`
    #[token("~=")]
    Includes,

    /// `|=`
    #[token("|=")]
    DashMatch,

    /// `^=`
    #[token("^=")]
    PrefixMatch,

    /// `$=`
    #[token("$=")]
    SuffixMatch,

    /// `*=`
    #[token("*=")]
    SubstringMatch,

    // ── Single-character punctuation ─────────────────────────────────

    /// `{`
    #[token("{")]
    BraceOpen,

    /// `}`
    #[token("}")]
    BraceClose,

    /// `(`
    #[token("(")]
    ParenOpen,

    /// `)`
    #[token(")")]
    ParenClose,

    /// `[`
    #[token("[")]
    BracketOpen,

    /// `]`
    #[token("]")]
    BracketClose,

    /// `:`
    #[token(":")]
    Colon,

    /// `;`
    #[token(";")]
    Semicolon,

    /// `,`
    #[token(",")]
    Comma,

    /// `.`
    #[token(".")]
    Dot,

    /// `#`
    #[token("#")]
    Hash,

    /// `*`
    #[token("*")]
    Star,

    /// `>`
    #[token(">")]
    GreaterThan,

    /// `+`
    #[token("+")]
    Plus,

    /// `~`
    #[token("~")]
    Tilde,

    /// `=`
    #[token("=")]
    Equals,

    /// `/`
    #[token("/")]
    Slash,
}

/// Tokenize a CSS string into a vector of `(Token, String)` pairs.
///
/// Characters that fail to lex are skipped.
pub fn tokenize(input: &str) -> Vec<(Token, String)> {
    let lexer = Token::lexer(input);
    lexer
        .spanned()
        .filter_map(|(result, span)| {
            result.ok().map(|token| (token, input[span].to_string()))
        })
        .collect()
}
