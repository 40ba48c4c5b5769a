use super::CodeGen;
use super::symbols::ACC;
use crate::bytecode::Opcode;
use crate::bytecode::code::Code;
use crate::bytecode::compile_error::CompileError;
use crate::lang::node::{Condition, Relation};
use log::debug;

/// Jump tested on `left - right`, and the truth value when it is taken.
fn branch(relation: Relation) -> (Opcode, bool) {
    match relation {
        Relation::Eq => (Opcode::Jzero, true),
        Relation::Neq => (Opcode::Jzero, false),
        Relation::Less => (Opcode::Jneg, true),
        Relation::Greater => (Opcode::Jpos, true),
        Relation::LessEq => (Opcode::Jpos, false),
        Relation::GreaterEq => (Opcode::Jneg, false),
    }
}

impl CodeGen {
    /// Leaves `1` in the accumulator if `condition` holds, `0` otherwise.
    pub(super) fn condition(&mut self, condition: &Condition) -> Result<Code, CompileError> {
        let Condition {
            relation,
            left,
            right,
            ..
        } = condition;

        if let (Some(l), Some(r)) = (left.constant(), right.constant()) {
            return Ok(self.load_constant(relation.holds(l, r) as i64));
        }

        let mut code = self.minus(left, right)?;
        let (test, when_taken) = branch(*relation);
        let taken = code.label();
        let end = code.label();

        code.jump(&mut self.em, test, taken);
        self.set_truth(!when_taken, &mut code);
        code.jump(&mut self.em, Opcode::Jump, end);
        code.bind(&self.em, taken);
        self.set_truth(when_taken, &mut code);
        code.bind(&self.em, end);

        debug!(
            "condition {} {} {}: {} instructions",
            left,
            relation.symbol(),
            right,
            code.len()
        );
        Ok(code)
    }

    fn set_truth(&mut self, value: bool, code: &mut Code) {
        code.emit_at(&mut self.em, Opcode::Sub, ACC);
        if value {
            code.emit(&mut self.em, Opcode::Inc);
        }
    }
}
