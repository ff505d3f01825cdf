//! Typed AST produced by the analyzer and consumed by the evaluator
//!
//! Every node keeps the form it came from, so diagnostics can point back at source
//! positions recorded by the reader.

mod node;

pub use node::*;
