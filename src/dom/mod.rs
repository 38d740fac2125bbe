//! DOM arena: slotmap-backed node tree with shadow roots, tree scopes and
//! slot distribution.

pub mod node;
pub mod tree;
pub mod query;

pub use node::{NodeData, NodeId, NodeKind, ShadowRootMode};
pub use tree::Dom;
