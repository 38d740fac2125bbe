//! # scoped-cascade
//!
//! Rule indexing and cascade resolution for a CSS style engine that has to deal
//! with shadow trees.
//!
//! Style sheets are parsed into a small CSS object model, indexed into
//! [`RuleSet`](style::rule_set::RuleSet) buckets, attached to tree scopes (the
//! document or a shadow root) through a forest of
//! [`ScopedStyleResolver`](style::scoped_resolver::ScopedStyleResolver)s, and
//! matched against elements of a slotmap-backed [`Dom`](dom::Dom). Matches are
//! accumulated into a [`MatchResult`](style::match_result::MatchResult) whose
//! origin and tree-scope ranges drive the two-pass (normal, then `!important`)
//! cascade.
//!
//! ## Core Systems
//!
//! - **[`css`]**: Tokenizer, parser, selector model, specificity, media queries
//! - **[`dom`]**: Slotmap-backed DOM arena with shadow roots, tree scopes and slots
//! - **[`style`]**: Rule sets, scoped resolvers, boundary-crossing rules, rule
//!   collection, match results, cascade application and the [`StyleEngine`](style::StyleEngine)
//! - **[`testing`]**: Text dumps of engine structures for snapshot assertions

// Foundation
pub mod css;
pub mod dom;

// Rule indexing, matching and cascade
pub mod style;

// Test support
pub mod testing;
