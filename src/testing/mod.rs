//! Test support: text dumps of engine structures and DOM fixtures.
//!
//! Use [`dump_rule_set`], [`dump_match_result`] and [`dump_style`] to render
//! structures as stable plain text for snapshot assertions, and the
//! [`fixtures`] builders for documents with shadow trees.

pub mod fixtures;
pub mod snapshot;

pub use fixtures::{ShadowFixture, TreeBuilder};
pub use snapshot::{dump_match_result, dump_rule_set, dump_style};
