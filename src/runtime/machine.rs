use crate::bytecode::ir::{Address, Instruction, Operand};
use crate::bytecode::op::Opcode;
use crate::runtime::runtime_error::RuntimeError;
use log::trace;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct MachineConfig {
    pub max_steps: Option<usize>,
}

/// Interpreter for the accumulator machine.
///
/// Memory is sparse; cells that were never written read as 0. Cell 0 is
/// the accumulator.
#[derive(Debug, Default)]
pub struct Machine {
    memory: HashMap<Address, i64>,
    input: VecDeque<i64>,
    output: Vec<i64>,
    config: MachineConfig,
    steps: usize,
    cost: u64,
}

impl Machine {
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    pub fn with_config(config: MachineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Queues values consumed by `GET`, in order.
    pub fn with_input(mut self, input: impl IntoIterator<Item = i64>) -> Self {
        self.input.extend(input);
        self
    }

    pub fn accumulator(&self) -> i64 {
        self.memory(0)
    }

    pub fn memory(&self, address: Address) -> i64 {
        self.memory.get(&address).copied().unwrap_or(0)
    }

    /// Values written by `PUT`, in order.
    pub fn output(&self) -> &[i64] {
        &self.output
    }

    /// Sum of the cost weights of every executed instruction.
    pub fn cost(&self) -> u64 {
        self.cost
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    // Execution

    /// Runs `program` from position 0 until `HALT`.
    pub fn run(&mut self, program: &[Instruction]) -> Result<(), RuntimeError> {
        let mut pc: usize = 0;

        loop {
            let instruction = program.get(pc).ok_or(RuntimeError::FellOffEnd)?;
            self.check_limits()?;
            self.cost += instruction.opcode.cost();
            trace!("{:04} {} (acc = {})", pc, instruction, self.accumulator());

            let mut next = pc + 1;
            match instruction.opcode {
                Opcode::Get => {
                    let value = self
                        .input
                        .pop_front()
                        .ok_or(RuntimeError::InputExhausted { position: pc })?;
                    self.set_acc(value);
                }
                Opcode::Put => self.output.push(self.accumulator()),

                Opcode::Load => {
                    let address = self.operand_address(instruction, pc)?;
                    self.set_acc(self.memory(address));
                }
                Opcode::Store => {
                    let address = self.operand_address(instruction, pc)?;
                    self.write(address, self.accumulator());
                }
                Opcode::Loadi => {
                    let address = self.indirect_address(instruction, pc)?;
                    self.set_acc(self.memory(address));
                }
                Opcode::Storei => {
                    let address = self.indirect_address(instruction, pc)?;
                    self.write(address, self.accumulator());
                }

                Opcode::Add => {
                    let address = self.operand_address(instruction, pc)?;
                    self.set_acc(self.accumulator().wrapping_add(self.memory(address)));
                }
                Opcode::Sub => {
                    let address = self.operand_address(instruction, pc)?;
                    self.set_acc(self.accumulator().wrapping_sub(self.memory(address)));
                }
                Opcode::Shift => {
                    let address = self.operand_address(instruction, pc)?;
                    let amount = self.memory(address);
                    self.set_acc(shift(self.accumulator(), amount));
                }
                Opcode::Inc => self.set_acc(self.accumulator().wrapping_add(1)),
                Opcode::Dec => self.set_acc(self.accumulator().wrapping_sub(1)),

                Opcode::Jump | Opcode::Jpos | Opcode::Jzero | Opcode::Jneg => {
                    let acc = self.accumulator();
                    let taken = match instruction.opcode {
                        Opcode::Jpos => acc > 0,
                        Opcode::Jzero => acc == 0,
                        Opcode::Jneg => acc < 0,
                        _ => true,
                    };
                    if taken {
                        let target = instruction.target().ok_or_else(|| missing(instruction, pc))?;
                        if target >= program.len() {
                            return Err(RuntimeError::JumpOutOfRange {
                                target,
                                len: program.len(),
                                position: pc,
                            });
                        }
                        next = target;
                    }
                }

                Opcode::Halt => return Ok(()),
            }

            pc = next;
        }
    }

    fn check_limits(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(RuntimeError::StepLimit(max));
            }
        }
        Ok(())
    }

    fn set_acc(&mut self, value: i64) {
        self.memory.insert(0, value);
    }

    fn write(&mut self, address: Address, value: i64) {
        self.memory.insert(address, value);
    }

    fn operand_address(
        &self,
        instruction: &Instruction,
        position: usize,
    ) -> Result<Address, RuntimeError> {
        let address = match instruction.operand {
            Operand::Address(a) => a,
            _ => return Err(missing(instruction, position)),
        };
        if address < 0 {
            return Err(RuntimeError::NegativeAddress { address, position });
        }
        Ok(address)
    }

    /// The cell named by `p[i]` for `LOADI`/`STOREI`.
    fn indirect_address(
        &self,
        instruction: &Instruction,
        position: usize,
    ) -> Result<Address, RuntimeError> {
        let pointer = self.operand_address(instruction, position)?;
        let address = self.memory(pointer);
        if address < 0 {
            return Err(RuntimeError::NegativeAddress { address, position });
        }
        Ok(address)
    }
}

fn missing(instruction: &Instruction, position: usize) -> RuntimeError {
    RuntimeError::MissingOperand {
        opcode: instruction.opcode.name().to_string(),
        position,
    }
}

/// `floor(value · 2^amount)`.
fn shift(value: i64, amount: i64) -> i64 {
    if amount >= 0 {
        value.wrapping_shl(amount.min(63) as u32)
    } else {
        value >> amount.unsigned_abs().min(63)
    }
}
