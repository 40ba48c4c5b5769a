//! Code generator for a small imperative language targeting a
//! single-accumulator machine.
//!
//! The pipeline is `frontend` (tokens, AST) → `compile` (code generation)
//! → `bytecode::ObjectCode`, which `runtime::Machine` can execute.

pub mod bytecode;
pub mod compile;
pub mod frontend;
pub mod lang;
pub mod runtime;
