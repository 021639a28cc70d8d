//! C AST front-end, built on tree-sitter and the C grammar.
//!
//! Mirrors the teacher's `cst::parser` split: a thin `parser` module
//! wraps tree-sitter setup, and `walker` owns the tree-shape knowledge
//! needed to pull [`Declaration`](crate::model::Declaration)s out of it.

mod parser;
mod walker;

pub use parser::CParser;
pub use walker::extract_declarations;
