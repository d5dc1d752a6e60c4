//! Query AST & evaluation layer.
//!
//! `parser` turns SQL text into the crate-owned AST, `normalize` lowers it to
//! the logical tree, `executor` runs that tree over a schema with the pure
//! functions in `operators`, and `steps` narrates the trace.

pub mod ast;
pub mod errors;
pub mod executor;
pub mod logical;
pub mod normalize;
pub mod operators;
pub mod parser;
pub mod steps;

pub use errors::*;
pub use logical::*;
