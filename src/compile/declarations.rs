use super::CodeGen;
use crate::bytecode::Opcode;
use crate::bytecode::code::Code;
use crate::bytecode::compile_error::CompileError;
use crate::lang::node::Declaration;
use log::debug;
use std::collections::HashMap;

impl CodeGen {
    /// Assigns storage and emits the prologue.
    ///
    /// Scalars get the lowest cells, then one slot per counted-loop nesting
    /// level, then arrays. Duplicates are found in source order, so the
    /// second occurrence is the one reported and the first keeps its storage.
    pub(super) fn declarations(
        &mut self,
        declarations: &[Declaration],
        loop_slots: usize,
    ) -> Code {
        let mut first_lines: HashMap<&str, usize> = HashMap::new();
        let mut accepted = Vec::new();
        for declaration in declarations {
            match first_lines.get(declaration.name()) {
                Some(&first_line) => self.diagnostics.report(CompileError::DuplicateDeclaration {
                    name: declaration.name().to_string(),
                    first_line,
                    line: declaration.line(),
                }),
                None => {
                    first_lines.insert(declaration.name(), declaration.line());
                    accepted.push(declaration);
                }
            }
        }

        for declaration in &accepted {
            if let Declaration::Scalar { name, line } = declaration {
                if let Err(e) = self.symbols.declare(name, *line) {
                    self.diagnostics.report(e);
                }
            }
        }

        self.symbols.alloc_for_control(loop_slots);

        let mut code = Code::new();
        for declaration in &accepted {
            if let Declaration::Array {
                name,
                lower,
                upper,
                line,
            } = declaration
            {
                match self.symbols.declare_array(name, *lower, *upper, *line) {
                    Ok(bounds) => {
                        let offset = self.load_constant(bounds.offset());
                        code.append(offset);
                        code.emit_at(&mut self.em, Opcode::Store, bounds.header);
                        debug!(
                            "array {}({}:{}) at {}..={}",
                            name,
                            lower,
                            upper,
                            bounds.base(),
                            bounds.element(*upper)
                        );
                    }
                    Err(e) => self.diagnostics.report(e),
                }
            }
        }

        code
    }
}
