use crate::bytecode::op::Opcode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Memory cell index on the target machine.
pub type Address = i64;

/// Operand of an emitted instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// The opcode takes no operand.
    None,
    /// Memory cell for loads, stores and arithmetic.
    Address(Address),
    /// Resolved absolute jump target.
    Target(usize),
    /// Jump target still waiting for its patch.
    Unresolved,
}

/// A single emitted instruction.
///
/// `position` is the instruction's index in the final stream; it is assigned
/// once at emission time from the shared position counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Operand,
    pub position: usize,
}

impl Instruction {
    /// Address operand of a memory instruction.
    pub fn address(&self) -> Option<Address> {
        match self.operand {
            Operand::Address(a) => Some(a),
            _ => None,
        }
    }

    /// Resolved target of a jump instruction.
    pub fn target(&self) -> Option<usize> {
        match self.operand {
            Operand::Target(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Operand::None => write!(f, "{}", self.opcode),
            Operand::Address(a) => write!(f, "{} {}", self.opcode, a),
            Operand::Target(t) => write!(f, "{} {}", self.opcode, t),
            Operand::Unresolved => write!(f, "{} ?", self.opcode),
        }
    }
}

/// The finished instruction stream, terminated by `HALT`.
///
/// This is the artifact handed to downstream consumers. Its `Display`
/// impl is the textual file format: one instruction per line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCode {
    pub instructions: Vec<Instruction>,
}

impl ObjectCode {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Sum of opcode costs over the static stream.
    pub fn static_cost(&self) -> u64 {
        self.instructions.iter().map(|i| i.opcode.cost()).sum()
    }

    /// Encodes the stream with postcard.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Decodes a stream produced by [`ObjectCode::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

impl fmt::Display for ObjectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{}", instruction)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseObjectError {
    pub line: usize,
    pub message: String,
}

impl FromStr for ObjectCode {
    type Err = ParseObjectError;

    /// Parses the textual format back. Blank lines are skipped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut instructions = Vec::new();

        for (index, text) in s.lines().enumerate() {
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let error = |message: String| ParseObjectError {
                line: index + 1,
                message,
            };

            let mut parts = text.split_whitespace();
            let opcode: Opcode = parts
                .next()
                .unwrap_or_default()
                .parse()
                .map_err(|e: crate::bytecode::op::UnknownOpcode| error(e.to_string()))?;

            let operand = match (opcode.takes_operand(), parts.next()) {
                (false, None) => Operand::None,
                (false, Some(extra)) => {
                    return Err(error(format!("{} takes no operand, got '{}'", opcode, extra)));
                }
                (true, None) => return Err(error(format!("{} requires an operand", opcode))),
                (true, Some(arg)) if opcode.is_jump() => Operand::Target(
                    arg.parse()
                        .map_err(|_| error(format!("invalid jump target '{}'", arg)))?,
                ),
                (true, Some(arg)) => Operand::Address(
                    arg.parse()
                        .map_err(|_| error(format!("invalid address '{}'", arg)))?,
                ),
            };

            if let Some(extra) = parts.next() {
                return Err(error(format!("unexpected '{}'", extra)));
            }

            instructions.push(Instruction {
                opcode,
                operand,
                position: instructions.len(),
            });
        }

        Ok(ObjectCode { instructions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ObjectCode {
        ObjectCode::new(vec![
            Instruction {
                opcode: Opcode::Get,
                operand: Operand::None,
                position: 0,
            },
            Instruction {
                opcode: Opcode::Jzero,
                operand: Operand::Target(3),
                position: 1,
            },
            Instruction {
                opcode: Opcode::Store,
                operand: Operand::Address(4),
                position: 2,
            },
            Instruction {
                opcode: Opcode::Halt,
                operand: Operand::None,
                position: 3,
            },
        ])
    }

    #[test]
    fn test_text_format() {
        assert_eq!(sample().to_string(), "GET\nJZERO 3\nSTORE 4\nHALT\n");
    }

    #[test]
    fn test_text_parses_back() {
        let text = sample().to_string();
        assert_eq!(text.parse::<ObjectCode>().unwrap(), sample());
    }

    #[test]
    fn test_binary_encoding() {
        let bytes = sample().to_bytes().unwrap();
        assert_eq!(ObjectCode::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        let err = "GET\nLOAD\n".parse::<ObjectCode>().unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("requires an operand"));

        let err = "HALT 3".parse::<ObjectCode>().unwrap_err();
        assert!(err.message.contains("takes no operand"));
    }

    #[test]
    fn test_unresolved_renders_placeholder() {
        let jump = Instruction {
            opcode: Opcode::Jump,
            operand: Operand::Unresolved,
            position: 0,
        };
        assert_eq!(jump.to_string(), "JUMP ?");
        assert_eq!(jump.target(), None);
    }

    #[test]
    fn test_static_cost() {
        assert_eq!(sample().static_cost(), 100 + 1 + 10);
    }
}
