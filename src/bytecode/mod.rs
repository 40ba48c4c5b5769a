pub mod code;
pub mod compile_error;
pub mod disasm;
pub mod ir;
pub mod jump_check;
pub mod op;

pub use code::{Code, Emitter, Label};
pub use ir::{Address, Instruction, ObjectCode, Operand};
pub use op::Opcode;
