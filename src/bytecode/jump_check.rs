use crate::bytecode::ir::{Instruction, Operand};
use crate::bytecode::op::Opcode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("jump-check error: {message}")]
pub struct JumpCheckError {
    pub message: String,
}

impl JumpCheckError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Checks the structural invariants of a finished instruction stream:
///
/// - every instruction's position equals its index
/// - operands match their opcode (no address on `INC`, none missing on `LOAD`)
/// - every jump is resolved to a position inside the stream
/// - the stream ends with `HALT`
pub fn check_instructions(instructions: &[Instruction]) -> Result<(), JumpCheckError> {
    for (index, instruction) in instructions.iter().enumerate() {
        if instruction.position != index {
            return Err(JumpCheckError::new(format!(
                "instruction {} at index {} claims position {}",
                instruction, index, instruction.position
            )));
        }

        let opcode = instruction.opcode;
        match instruction.operand {
            Operand::Unresolved => {
                return Err(JumpCheckError::new(format!(
                    "unresolved jump target at position {}",
                    index
                )));
            }
            Operand::Target(target) if opcode.is_jump() => {
                if target >= instructions.len() {
                    return Err(JumpCheckError::new(format!(
                        "jump at position {} targets {} outside the stream of {} instructions",
                        index,
                        target,
                        instructions.len()
                    )));
                }
            }
            Operand::Address(_) if opcode.takes_operand() && !opcode.is_jump() => {}
            Operand::None if !opcode.takes_operand() => {}
            operand => {
                return Err(JumpCheckError::new(format!(
                    "operand {:?} does not fit {} at position {}",
                    operand, opcode, index
                )));
            }
        }
    }

    match instructions.last() {
        Some(last) if last.opcode == Opcode::Halt => Ok(()),
        _ => Err(JumpCheckError::new("stream does not end with HALT")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instr(opcode: Opcode, operand: Operand, position: usize) -> Instruction {
        Instruction {
            opcode,
            operand,
            position,
        }
    }

    #[test]
    fn test_valid_stream() {
        let stream = vec![
            instr(Opcode::Get, Operand::None, 0),
            instr(Opcode::Jzero, Operand::Target(3), 1),
            instr(Opcode::Put, Operand::None, 2),
            instr(Opcode::Halt, Operand::None, 3),
        ];
        assert!(check_instructions(&stream).is_ok());
    }

    #[test]
    fn test_unresolved_jump() {
        let stream = vec![
            instr(Opcode::Jump, Operand::Unresolved, 0),
            instr(Opcode::Halt, Operand::None, 1),
        ];
        let err = check_instructions(&stream).unwrap_err();
        assert!(err.message.contains("unresolved"));
    }

    #[test]
    fn test_jump_out_of_range() {
        let stream = vec![
            instr(Opcode::Jpos, Operand::Target(9), 0),
            instr(Opcode::Halt, Operand::None, 1),
        ];
        assert!(check_instructions(&stream).is_err());
    }

    #[test]
    fn test_position_mismatch() {
        let stream = vec![
            instr(Opcode::Inc, Operand::None, 1),
            instr(Opcode::Halt, Operand::None, 2),
        ];
        let err = check_instructions(&stream).unwrap_err();
        assert!(err.message.contains("claims position"));
    }

    #[test]
    fn test_operand_kind_mismatch() {
        let stream = vec![
            instr(Opcode::Load, Operand::Target(0), 0),
            instr(Opcode::Halt, Operand::None, 1),
        ];
        assert!(check_instructions(&stream).is_err());

        let stream = vec![
            instr(Opcode::Inc, Operand::Address(3), 0),
            instr(Opcode::Halt, Operand::None, 1),
        ];
        assert!(check_instructions(&stream).is_err());
    }

    #[test]
    fn test_missing_halt() {
        let stream = vec![instr(Opcode::Get, Operand::None, 0)];
        let err = check_instructions(&stream).unwrap_err();
        assert!(err.message.contains("HALT"));
        assert!(check_instructions(&[]).is_err());
    }
}
