//! CSS front end: tokenizer, parser, selector model, specificity, media queries.

pub mod tokenizer;
pub mod model;
pub mod parser;
pub mod media;
pub mod specificity;
