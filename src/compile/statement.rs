use super::CodeGen;
use crate::bytecode::{Address, Opcode};
use crate::bytecode::code::Code;
use crate::bytecode::compile_error::CompileError;
use crate::lang::node::{Command, Condition, Expression};
use crate::lang::value::{Identifier, Value};
use log::debug;

impl CodeGen {
    /// Generates `commands` in order.
    ///
    /// A command that fails with a recoverable error is reported and left
    /// out; only internal errors are returned.
    pub(super) fn commands(&mut self, commands: &[Command]) -> Result<Code, CompileError> {
        let mut code = Code::new();
        for command in commands {
            let checkpoint = self.checkpoint();
            let result = self.command(command);
            let generated = self.recover(result, checkpoint)?;
            code.append(generated);
        }
        Ok(code)
    }

    fn command(&mut self, command: &Command) -> Result<Code, CompileError> {
        match command {
            Command::Assign {
                target, expression, ..
            } => self.assign(target, expression),
            Command::Read { target, .. } => self.read(target),
            Command::Write { value, .. } => self.write(value),
            Command::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => self.if_then(condition, then_branch, else_branch.as_deref()),
            Command::While {
                condition, body, ..
            } => self.while_loop(condition, body),
            Command::DoWhile {
                body, condition, ..
            } => self.do_while(body, condition),
            Command::For {
                iterator,
                from,
                to,
                descending,
                body,
                line,
            } => self.for_loop(iterator, from, to, *descending, body, *line),
        }
    }

    // =========================================================================
    // Data flow
    // =========================================================================

    fn assign(&mut self, target: &Identifier, expression: &Expression) -> Result<Code, CompileError> {
        self.check_writable(target)?;

        let mut code = Code::new();
        let place = self.place(target, &mut code)?;
        let value = self.expression(expression)?;
        code.append(value);
        self.store_place(place, &mut code);

        self.mark_initialized(target);
        Ok(code)
    }

    fn read(&mut self, target: &Identifier) -> Result<Code, CompileError> {
        self.check_writable(target)?;

        let mut code = Code::new();
        let place = self.place(target, &mut code)?;
        code.emit(&mut self.em, Opcode::Get);
        self.store_place(place, &mut code);

        self.mark_initialized(target);
        Ok(code)
    }

    fn write(&mut self, value: &Value) -> Result<Code, CompileError> {
        let mut code = self.load_value(value)?;
        code.emit(&mut self.em, Opcode::Put);
        Ok(code)
    }

    // =========================================================================
    // Control flow
    // =========================================================================

    fn if_then(
        &mut self,
        condition: &Condition,
        then_branch: &[Command],
        else_branch: Option<&[Command]>,
    ) -> Result<Code, CompileError> {
        let checkpoint = self.checkpoint();
        let mut code = match self.condition(condition) {
            Ok(code) => code,
            Err(e) => {
                let bodies = [then_branch, else_branch.unwrap_or_default()];
                return self.abandon(e, checkpoint, &bodies);
            }
        };
        let otherwise = code.label();
        code.jump(&mut self.em, Opcode::Jzero, otherwise);

        let then_code = self.commands(then_branch)?;
        code.append(then_code);

        match else_branch {
            Some(else_branch) => {
                let end = code.label();
                code.jump(&mut self.em, Opcode::Jump, end);
                code.bind(&self.em, otherwise);
                let else_code = self.commands(else_branch)?;
                code.append(else_code);
                code.bind(&self.em, end);
            }
            None => code.bind(&self.em, otherwise),
        }
        Ok(code)
    }

    fn while_loop(&mut self, condition: &Condition, body: &[Command]) -> Result<Code, CompileError> {
        let checkpoint = self.checkpoint();
        let mut code = Code::new();
        let head = code.label();
        let exit = code.label();

        code.bind(&self.em, head);
        let test = match self.condition(condition) {
            Ok(test) => test,
            Err(e) => return self.abandon(e, checkpoint, &[body]),
        };
        code.append(test);
        code.jump(&mut self.em, Opcode::Jzero, exit);

        let body = self.commands(body)?;
        code.append(body);
        code.jump(&mut self.em, Opcode::Jump, head);
        code.bind(&self.em, exit);
        Ok(code)
    }

    /// Runs the body, then repeats while the condition holds.
    fn do_while(&mut self, body: &[Command], condition: &Condition) -> Result<Code, CompileError> {
        let checkpoint = self.checkpoint();
        let mut code = Code::new();
        let head = code.label();

        code.bind(&self.em, head);
        let body = self.commands(body)?;
        code.append(body);
        let test = match self.condition(condition) {
            Ok(test) => test,
            // The body is already generated; only its effects go.
            Err(e) => return self.abandon(e, checkpoint, &[]),
        };
        code.append(test);
        code.jump(&mut self.em, Opcode::Jpos, head);
        Ok(code)
    }

    /// `FOR i FROM a TO|DOWNTO b DO body ENDFOR`
    ///
    /// The loop-depth slot counts the remaining iterations; the iterator
    /// cell holds the current index. Both bounds are read once, before the
    /// iterator comes into scope.
    fn for_loop(
        &mut self,
        iterator: &str,
        from: &Value,
        to: &Value,
        descending: bool,
        body: &[Command],
        line: usize,
    ) -> Result<Code, CompileError> {
        let counter = self.symbols.control_slot(self.loop_depth).ok_or_else(|| {
            CompileError::internal(format!(
                "no loop slot reserved for nesting depth {}",
                self.loop_depth + 1
            ))
        })?;

        let checkpoint = self.checkpoint();
        let (mut code, index) = match self.for_header(iterator, from, to, counter, line) {
            Ok(header) => header,
            Err(e) => {
                // Keep the iterator in scope so the body does not report it.
                let scoped = self.symbols.declare_iterator(iterator, line).is_ok();
                self.loop_depth += 1;
                let result = self.abandon(e, checkpoint, &[body]);
                self.loop_depth -= 1;
                if scoped {
                    self.symbols.remove(iterator);
                }
                return result;
            }
        };
        code.emit_at(&mut self.em, Opcode::Store, index);

        // counter := to - from + 1, or from - to + 1 going down
        if descending {
            code.emit_at(&mut self.em, Opcode::Sub, counter);
        } else {
            code.emit_at(&mut self.em, Opcode::Load, counter);
            code.emit_at(&mut self.em, Opcode::Sub, index);
        }
        code.emit(&mut self.em, Opcode::Inc);
        code.emit_at(&mut self.em, Opcode::Store, counter);

        let head = code.label();
        let exit = code.label();
        code.bind(&self.em, head);
        code.emit_at(&mut self.em, Opcode::Load, counter);
        code.jump(&mut self.em, Opcode::Jzero, exit);
        code.jump(&mut self.em, Opcode::Jneg, exit);
        code.emit(&mut self.em, Opcode::Dec);
        code.emit_at(&mut self.em, Opcode::Store, counter);

        self.loop_depth += 1;
        let body = self.commands(body);
        self.loop_depth -= 1;
        self.symbols.remove(iterator);
        code.append(body?);

        let step = if descending { Opcode::Dec } else { Opcode::Inc };
        code.emit_at(&mut self.em, Opcode::Load, index);
        code.emit(&mut self.em, step);
        code.emit_at(&mut self.em, Opcode::Store, index);
        code.jump(&mut self.em, Opcode::Jump, head);
        code.bind(&self.em, exit);

        debug!(
            "for {} (depth {}): {} instructions",
            iterator,
            self.loop_depth + 1,
            code.len()
        );
        Ok(code)
    }

    /// Stores the upper bound in `counter`, loads the lower bound and
    /// brings the iterator into scope.
    fn for_header(
        &mut self,
        iterator: &str,
        from: &Value,
        to: &Value,
        counter: Address,
        line: usize,
    ) -> Result<(Code, Address), CompileError> {
        let mut code = self.load_value(to)?;
        code.emit_at(&mut self.em, Opcode::Store, counter);
        let start = self.load_value(from)?;
        code.append(start);
        let index = self.symbols.declare_iterator(iterator, line)?;
        Ok((code, index))
    }
}
