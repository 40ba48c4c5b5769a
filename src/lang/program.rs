use super::node::{Command, Declaration};

/// Parsed program: the `DECLARE` block followed by the `BEGIN ... END` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Declarations in source order.
    pub declarations: Vec<Declaration>,
    /// Top-level commands in source order.
    pub commands: Vec<Command>,
}
