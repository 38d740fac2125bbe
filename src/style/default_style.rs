//! Built-in user-agent style sheet.

use crate::css::model::StyleSheet;
use crate::css::parser::{parse_css, ParseError};

/// Elements rendered as blocks by default.
const BLOCK_LEVEL_ELEMENTS: &[&str] = &[
    "html", "body", "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "dl", "dt",
    "dd", "blockquote", "pre", "table", "form", "fieldset", "legend", "section", "article",
    "aside", "header", "footer", "main", "nav", "address", "figure", "figcaption", "details",
    "summary", "dialog", "hr",
];

const HIDDEN_ELEMENTS: &[&str] = &["head", "script", "style", "template"];

const REST: &str = "
a:link { color: blue; text-decoration: underline }
a:visited { color: purple }
:focus { outline: auto }
b, strong { font-weight: bold }
i, em { font-style: italic }
[hidden] { display: none }
video::cue { color: white; background-color: black }
";

/// CSS text of the default style sheet.
pub fn default_style_css() -> String {
    let mut css = String::new();
    css.push_str(&BLOCK_LEVEL_ELEMENTS.join(", "));
    css.push_str(" { display: block }\n");
    css.push_str(&HIDDEN_ELEMENTS.join(", "));
    css.push_str(" { display: none }\n");
    css.push_str(REST);
    css
}

/// Parse the default style sheet.
pub fn default_style_sheet() -> Result<StyleSheet, ParseError> {
    parse_css(&default_style_css())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_style_parses() {
        let sheet = default_style_sheet().unwrap();
        let rules: Vec<_> = sheet.style_rules().collect();
        assert_eq!(rules.len(), 9);
        assert_eq!(rules[0].selectors.len(), BLOCK_LEVEL_ELEMENTS.len());
        assert_eq!(rules[1].selectors.len(), HIDDEN_ELEMENTS.len());
    }
}
