use crate::bytecode::compile_error::CompileError;
use crate::bytecode::ir::{Address, Instruction, Operand};
use crate::bytecode::op::Opcode;

/// The single position counter shared by a whole generation pass.
///
/// Every emission takes the next position, so positions are indices into
/// the final stream as long as code is spliced in emission order.
#[derive(Debug, Default)]
pub struct Emitter {
    next: usize,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position the next emitted instruction will receive.
    pub fn position(&self) -> usize {
        self.next
    }

    fn take(&mut self) -> usize {
        let position = self.next;
        self.next += 1;
        position
    }

    /// Drops positions handed out after `position`.
    ///
    /// Used when the code emitted since `position` is thrown away.
    pub fn rewind(&mut self, position: usize) {
        debug_assert!(position <= self.next);
        self.next = position;
    }
}

/// A jump target inside one [`Code`] block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// A growing run of instructions with symbolic jump targets.
///
/// Jumps to a label that is not bound yet are emitted with an
/// `Operand::Unresolved` and patched when the label is bound. Labels are
/// local to the block that created them.
#[derive(Debug, Default)]
pub struct Code {
    instructions: Vec<Instruction>,
    /// Bound position of each label.
    labels: Vec<Option<usize>>,
    /// (instruction index, label) of jumps waiting for their label.
    pending: Vec<(usize, Label)>,
}

impl Code {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Position of the first instruction, if any was emitted.
    pub fn first_position(&self) -> Option<usize> {
        self.instructions.first().map(|i| i.position)
    }

    fn push(&mut self, em: &mut Emitter, opcode: Opcode, operand: Operand) -> usize {
        self.instructions.push(Instruction {
            opcode,
            operand,
            position: em.take(),
        });
        self.instructions.len() - 1
    }

    /// Emits an instruction without operand (`GET`, `PUT`, `INC`, `DEC`, `HALT`).
    pub fn emit(&mut self, em: &mut Emitter, opcode: Opcode) {
        debug_assert!(!opcode.takes_operand(), "{} needs an operand", opcode);
        self.push(em, opcode, Operand::None);
    }

    /// Emits a memory or arithmetic instruction on `address`.
    pub fn emit_at(&mut self, em: &mut Emitter, opcode: Opcode, address: Address) {
        debug_assert!(
            opcode.takes_operand() && !opcode.is_jump(),
            "{} does not take an address",
            opcode
        );
        self.push(em, opcode, Operand::Address(address));
    }

    /// Creates a new, unbound label.
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the position of the next emitted instruction and
    /// patches every jump already waiting for it.
    pub fn bind(&mut self, em: &Emitter, label: Label) {
        debug_assert!(self.labels[label.0].is_none(), "label bound twice");
        let position = em.position();
        self.labels[label.0] = Some(position);

        let instructions = &mut self.instructions;
        self.pending.retain(|&(index, waiting)| {
            if waiting == label {
                instructions[index].operand = Operand::Target(position);
                false
            } else {
                true
            }
        });
    }

    /// Emits a jump to `label`, resolved now if the label is already bound.
    pub fn jump(&mut self, em: &mut Emitter, opcode: Opcode, label: Label) {
        debug_assert!(opcode.is_jump(), "{} is not a jump", opcode);
        match self.labels[label.0] {
            Some(position) => {
                self.push(em, opcode, Operand::Target(position));
            }
            None => {
                let index = self.push(em, opcode, Operand::Unresolved);
                self.pending.push((index, label));
            }
        }
    }

    /// Emits a jump to an absolute, already known position.
    pub fn jump_to(&mut self, em: &mut Emitter, opcode: Opcode, target: usize) {
        debug_assert!(opcode.is_jump(), "{} is not a jump", opcode);
        self.push(em, opcode, Operand::Target(target));
    }

    /// Splices `other` onto the end of this block.
    ///
    /// `other` must have been emitted right after this block's last
    /// instruction. Its unbound labels stay usable through this block.
    pub fn append(&mut self, other: Code) {
        debug_assert!(
            match (self.instructions.last(), other.instructions.first()) {
                (Some(last), Some(first)) => first.position == last.position + 1,
                _ => true,
            },
            "appended code is out of emission order"
        );

        let index_base = self.instructions.len();
        let label_base = self.labels.len();

        self.instructions.extend(other.instructions);
        self.labels.extend(other.labels);
        self.pending.extend(
            other
                .pending
                .into_iter()
                .map(|(index, Label(l))| (index + index_base, Label(l + label_base))),
        );
    }

    /// Returns the finished instructions.
    ///
    /// Fails if any jump is still waiting for an unbound label.
    pub fn finish(self) -> Result<Vec<Instruction>, CompileError> {
        if let Some(&(index, _)) = self.pending.first() {
            return Err(CompileError::internal(format!(
                "jump at position {} was never resolved",
                self.instructions[index].position
            )));
        }
        Ok(self.instructions)
    }
}
