//! Rule indexing, scoped resolution, rule collection and cascade.
//!
//! Bottom up: [`rule_data`] and [`rule_set`] index parsed sheets into
//! buckets; [`scoped_resolver`] and [`scoped_tree`] attach rule sets to tree
//! scopes; [`boundary_crossing`] holds rules that reach across shadow
//! boundaries; [`collector`] matches an element against all of them into a
//! [`match_result::MatchResult`], which [`cascade`] turns into declared
//! values. [`engine::StyleEngine`] drives the whole pipeline.

pub mod ancestor_filter;
pub mod boundary_crossing;
pub mod cascade;
pub mod collector;
pub mod default_style;
pub mod engine;
pub mod features;
pub mod global_rule_set;
pub mod match_result;
pub mod rule_data;
pub mod rule_set;
pub mod scoped_resolver;
pub mod scoped_tree;
pub mod selector_checker;

pub use cascade::ComputedStyle;
pub use engine::{EngineConfig, StyleEngine, StyleEngineError};
pub use match_result::{MatchResult, MatchedProperties};
pub use rule_set::RuleSet;
pub use scoped_tree::{BuildMode, ResolverId, ScopedStyleTree};
