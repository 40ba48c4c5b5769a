use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opcode descriptor of the target accumulator machine.
///
/// Cell 0 of the machine memory is the accumulator, written `acc` below.
/// Jump operands are absolute positions in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // =========================================================================
    // I/O
    // =========================================================================
    /// acc ← next input value
    Get,
    /// output acc
    Put,

    // =========================================================================
    // Memory
    // =========================================================================
    /// acc ← p[i]
    Load,
    /// p[i] ← acc
    Store,
    /// acc ← p[p[i]]
    Loadi,
    /// p[p[i]] ← acc
    Storei,

    // =========================================================================
    // Arithmetic
    // =========================================================================
    /// acc ← acc + p[i]
    Add,
    /// acc ← acc - p[i]
    Sub,
    /// acc ← floor(acc · 2^p[i]); doubles for p[i] = 1, halves for p[i] = -1
    Shift,
    /// acc ← acc + 1
    Inc,
    /// acc ← acc - 1
    Dec,

    // =========================================================================
    // Control flow
    // =========================================================================
    /// pc ← j
    Jump,
    /// pc ← j if acc > 0
    Jpos,
    /// pc ← j if acc = 0
    Jzero,
    /// pc ← j if acc < 0
    Jneg,
    /// stop execution
    Halt,
}

impl Opcode {
    pub const ALL: [Opcode; 16] = [
        Opcode::Get,
        Opcode::Put,
        Opcode::Load,
        Opcode::Store,
        Opcode::Loadi,
        Opcode::Storei,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Shift,
        Opcode::Inc,
        Opcode::Dec,
        Opcode::Jump,
        Opcode::Jpos,
        Opcode::Jzero,
        Opcode::Jneg,
        Opcode::Halt,
    ];

    /// Symbolic name used by the textual encoding.
    pub const fn name(self) -> &'static str {
        match self {
            Opcode::Get => "GET",
            Opcode::Put => "PUT",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Loadi => "LOADI",
            Opcode::Storei => "STOREI",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Shift => "SHIFT",
            Opcode::Inc => "INC",
            Opcode::Dec => "DEC",
            Opcode::Jump => "JUMP",
            Opcode::Jpos => "JPOS",
            Opcode::Jzero => "JZERO",
            Opcode::Jneg => "JNEG",
            Opcode::Halt => "HALT",
        }
    }

    /// Abstract execution cost, used for reporting only.
    pub const fn cost(self) -> u64 {
        match self {
            Opcode::Get | Opcode::Put => 100,
            Opcode::Load | Opcode::Store | Opcode::Add | Opcode::Sub => 10,
            Opcode::Loadi | Opcode::Storei => 20,
            Opcode::Shift => 5,
            Opcode::Inc | Opcode::Dec => 1,
            Opcode::Jump | Opcode::Jpos | Opcode::Jzero | Opcode::Jneg => 1,
            Opcode::Halt => 0,
        }
    }

    pub const fn is_jump(self) -> bool {
        matches!(
            self,
            Opcode::Jump | Opcode::Jpos | Opcode::Jzero | Opcode::Jneg
        )
    }

    /// Whether the instruction is written with an operand.
    pub const fn takes_operand(self) -> bool {
        !matches!(
            self,
            Opcode::Get | Opcode::Put | Opcode::Inc | Opcode::Dec | Opcode::Halt
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown opcode '{0}'")]
pub struct UnknownOpcode(pub String);

impl FromStr for Opcode {
    type Err = UnknownOpcode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Opcode::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| UnknownOpcode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for op in Opcode::ALL {
            assert_eq!(op.name().parse::<Opcode>(), Ok(op));
        }
        assert!("NOP".parse::<Opcode>().is_err());
    }

    #[test]
    fn test_jumps_take_operands() {
        for op in Opcode::ALL.into_iter().filter(|op| op.is_jump()) {
            assert!(op.takes_operand(), "{} should take an operand", op);
        }
        assert!(!Opcode::Halt.takes_operand());
        assert!(Opcode::Shift.takes_operand());
    }

    #[test]
    fn test_costs() {
        assert_eq!(Opcode::Get.cost(), 100);
        assert_eq!(Opcode::Loadi.cost(), 20);
        assert_eq!(Opcode::Shift.cost(), 5);
        assert_eq!(Opcode::Halt.cost(), 0);
    }
}
