//! # Abstract Syntax Tree
//!
//! This module defines the Abstract Syntax Tree (AST) of the source language.
//! The AST is produced by the parser and consumed by the code generator; it
//! is never mutated after parsing.
//!
//! ## Documentation conventions
//!
//! - `t(i)` denotes an element of array `t` indexed by `i`.
//! - Every node that can fail code generation carries the 1-based source
//!   line it was parsed from.

pub mod node;
pub mod program;
pub mod value;
