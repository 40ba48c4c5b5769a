//! Code generation from the AST to the accumulator machine.
//!
//! Every generator method returns the [`Code`] for its construct. Positions
//! come from the single [`Emitter`] owned by [`CodeGen`], so sub-results must
//! be spliced into their caller in the order they were generated.

mod arith;
mod declarations;
pub mod diagnostics;
mod number;
mod operand;
mod relational;
mod statement;
pub mod symbols;

use crate::bytecode::Opcode;
use crate::bytecode::code::{Code, Emitter};
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::ir::ObjectCode;
use crate::bytecode::jump_check::check_instructions;
use crate::lang::node::{Command, for_depth};
use crate::lang::program::Program;
use diagnostics::Diagnostics;
use log::debug;
use symbols::{Initialization, Symbols};

/// Result of a generation pass that did not hit an internal error.
#[derive(Debug)]
pub struct Compilation {
    pub code: ObjectCode,
    pub diagnostics: Diagnostics,
}

impl Compilation {
    /// The code is only meaningful when nothing was reported.
    pub fn is_success(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

pub struct CodeGen {
    symbols: Symbols,
    diagnostics: Diagnostics,
    em: Emitter,
    /// Number of counted loops enclosing the statement being generated.
    loop_depth: usize,
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGen {
    pub fn new() -> Self {
        Self {
            symbols: Symbols::new(),
            diagnostics: Diagnostics::new(),
            em: Emitter::new(),
            loop_depth: 0,
        }
    }

    /// Generates the whole program: declarations prologue, commands, `HALT`.
    pub fn generate(mut self, program: &Program) -> Result<Compilation, CompileError> {
        let depth = for_depth(&program.commands);
        let mut code = self.declarations(&program.declarations, depth);
        debug!(
            "prologue: {} instructions, {} loop slots",
            code.len(),
            depth
        );

        let body = self.commands(&program.commands)?;
        code.append(body);
        code.emit(&mut self.em, Opcode::Halt);

        let instructions = code.finish()?;
        check_instructions(&instructions).map_err(|e| CompileError::internal(e.message))?;
        debug!(
            "generated {} instructions, memory used up to cell {}",
            instructions.len(),
            self.symbols.offset()
        );

        Ok(Compilation {
            code: ObjectCode::new(instructions),
            diagnostics: self.diagnostics,
        })
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            position: self.em.position(),
            initialization: self.symbols.initialization(),
        }
    }

    /// Hands the positions used since `checkpoint` out again and forgets
    /// the assignments made since.
    fn restore(&mut self, checkpoint: Checkpoint) {
        self.em.rewind(checkpoint.position);
        self.symbols.restore_initialization(checkpoint.initialization);
    }

    /// Runs one statement generator, reporting a recoverable error instead
    /// of returning it.
    ///
    /// A failed statement contributes no code and leaves no trace in the
    /// symbol table.
    fn recover(
        &mut self,
        result: Result<Code, CompileError>,
        checkpoint: Checkpoint,
    ) -> Result<Code, CompileError> {
        match result {
            Ok(code) => Ok(code),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.diagnostics.report(e);
                self.restore(checkpoint);
                Ok(Code::new())
            }
        }
    }

    /// Gives up on a compound statement whose condition or bounds failed.
    ///
    /// `bodies` are still generated so their own errors get reported, then
    /// everything since `checkpoint` is thrown away.
    fn abandon(
        &mut self,
        error: CompileError,
        checkpoint: Checkpoint,
        bodies: &[&[Command]],
    ) -> Result<Code, CompileError> {
        if error.is_fatal() {
            return Err(error);
        }
        self.diagnostics.report(error);
        for body in bodies {
            self.commands(body)?;
        }
        self.restore(checkpoint);
        Ok(Code::new())
    }
}

/// Emission position and initialization state before a statement.
struct Checkpoint {
    position: usize,
    initialization: Initialization,
}

/// Generates code for `program` with a fresh generator.
pub fn generate(program: &Program) -> Result<Compilation, CompileError> {
    CodeGen::new().generate(program)
}
