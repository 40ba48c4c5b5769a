use super::CodeGen;
use super::symbols::{ArrayBounds, Symbol};
use crate::bytecode::Opcode;
use crate::bytecode::code::Code;
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::ir::Address;
use crate::lang::value::{Access, Identifier, Value};

/// Where the storage of an identifier is, once its address code has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Place {
    /// The cell itself; use `LOAD`/`STORE`.
    Direct(Address),
    /// A scratch cell holding the address; use `LOADI`/`STOREI`.
    Indirect(Address),
}

enum Resolved {
    Cell(Address),
    /// `p[header] + p[index_cell]`
    Computed { header: Address, index_cell: Address },
}

impl CodeGen {
    fn symbol(&self, name: &str, line: usize) -> Result<&Symbol, CompileError> {
        self.symbols.get(name).ok_or_else(|| CompileError::Undeclared {
            name: name.to_string(),
            line,
        })
    }

    /// Cell of a scalar that is read as an array index.
    fn index_cell(&self, index: &str, line: usize) -> Result<Address, CompileError> {
        let symbol = self.symbol(index, line)?;
        if symbol.is_array() {
            return Err(CompileError::ArrayWithoutIndex {
                name: index.to_string(),
                line,
            });
        }
        if !symbol.initialized {
            return Err(CompileError::Uninitialized {
                name: index.to_string(),
                line,
            });
        }
        Ok(symbol.offset)
    }

    fn bounds_of(&self, id: &Identifier) -> Result<ArrayBounds, CompileError> {
        let symbol = self.symbol(&id.name, id.line)?;
        symbol.array.ok_or_else(|| CompileError::NotAnArray {
            name: id.name.clone(),
            line: id.line,
        })
    }

    /// Resolves the storage of `id` without emitting anything.
    fn resolve(&self, id: &Identifier) -> Result<Resolved, CompileError> {
        match &id.access {
            Access::Scalar => {
                let symbol = self.symbol(&id.name, id.line)?;
                if symbol.is_array() {
                    return Err(CompileError::ArrayWithoutIndex {
                        name: id.name.clone(),
                        line: id.line,
                    });
                }
                Ok(Resolved::Cell(symbol.offset))
            }
            Access::ConstIndex(index) => {
                let bounds = self.bounds_of(id)?;
                if !bounds.contains(*index) {
                    return Err(CompileError::IndexOutOfBounds {
                        name: id.name.clone(),
                        index: *index,
                        lower: bounds.lower,
                        upper: bounds.upper,
                        line: id.line,
                    });
                }
                Ok(Resolved::Cell(bounds.element(*index)))
            }
            Access::VarIndex(index) => {
                let bounds = self.bounds_of(id)?;
                let index_cell = self.index_cell(index, id.line)?;
                Ok(Resolved::Computed {
                    header: bounds.header,
                    index_cell,
                })
            }
        }
    }

    fn check_initialized(&self, id: &Identifier) -> Result<(), CompileError> {
        let symbol = self.symbol(&id.name, id.line)?;
        let initialized = match &id.access {
            Access::Scalar => symbol.initialized,
            Access::ConstIndex(index) => symbol.is_element_initialized(*index),
            Access::VarIndex(_) => symbol.has_initialized_elements(),
        };
        if !initialized {
            return Err(CompileError::Uninitialized {
                name: id.to_string(),
                line: id.line,
            });
        }
        Ok(())
    }

    /// Checks that `value` could be read, for operators whose result does
    /// not depend on it.
    pub(super) fn check_read(&self, value: &Value) -> Result<(), CompileError> {
        match value {
            Value::Number(_) => Ok(()),
            Value::Identifier(id) => {
                self.resolve(id)?;
                self.check_initialized(id)
            }
        }
    }

    /// Resolves the storage of `id`.
    ///
    /// Variable-indexed elements emit `LOAD header; ADD index; STORE s` into
    /// `code` and are reached through the fresh scratch cell `s`.
    pub(super) fn place(&mut self, id: &Identifier, code: &mut Code) -> Result<Place, CompileError> {
        match self.resolve(id)? {
            Resolved::Cell(cell) => Ok(Place::Direct(cell)),
            Resolved::Computed { header, index_cell } => {
                let scratch = self.symbols.alloc_scratch();
                code.emit_at(&mut self.em, Opcode::Load, header);
                code.emit_at(&mut self.em, Opcode::Add, index_cell);
                code.emit_at(&mut self.em, Opcode::Store, scratch);
                Ok(Place::Indirect(scratch))
            }
        }
    }

    /// Like [`CodeGen::place`], but also rejects reads of storage that was
    /// never written.
    pub(super) fn read_place(&mut self, id: &Identifier, code: &mut Code) -> Result<Place, CompileError> {
        let place = self.place(id, code)?;
        self.check_initialized(id)?;
        Ok(place)
    }

    /// Records a write to `id`.
    pub(super) fn mark_initialized(&mut self, id: &Identifier) {
        match &id.access {
            Access::Scalar | Access::VarIndex(_) => {
                self.symbols.set_initialized(&id.name);
            }
            Access::ConstIndex(index) => {
                self.symbols.set_element_initialized(&id.name, *index);
            }
        }
    }

    /// Rejects writes to a loop iterator.
    pub(super) fn check_writable(&self, id: &Identifier) -> Result<(), CompileError> {
        if self.symbols.is_iterator(&id.name) {
            return Err(CompileError::IteratorAssignment {
                name: id.name.clone(),
                line: id.line,
            });
        }
        Ok(())
    }

    pub(super) fn load_place(&mut self, place: Place, code: &mut Code) {
        match place {
            Place::Direct(cell) => code.emit_at(&mut self.em, Opcode::Load, cell),
            Place::Indirect(pointer) => code.emit_at(&mut self.em, Opcode::Loadi, pointer),
        }
    }

    pub(super) fn store_place(&mut self, place: Place, code: &mut Code) {
        match place {
            Place::Direct(cell) => code.emit_at(&mut self.em, Opcode::Store, cell),
            Place::Indirect(pointer) => code.emit_at(&mut self.em, Opcode::Storei, pointer),
        }
    }

    /// Code leaving `value` in the accumulator.
    pub(super) fn load_value(&mut self, value: &Value) -> Result<Code, CompileError> {
        match value {
            Value::Number(n) => Ok(self.load_constant(*n)),
            Value::Identifier(id) => {
                let mut code = Code::new();
                let place = self.read_place(id, &mut code)?;
                self.load_place(place, &mut code);
                Ok(code)
            }
        }
    }

    /// A cell holding `value`, for use as an `ADD`/`SUB` operand.
    ///
    /// Scalars and constant-indexed elements are their own cell. Constants
    /// and variable-indexed elements are copied into a scratch cell by code
    /// appended to `code`; the accumulator is clobbered in that case.
    pub(super) fn cell_of(&mut self, value: &Value, code: &mut Code) -> Result<Address, CompileError> {
        match value {
            Value::Number(n) => {
                let constant = self.load_constant(*n);
                code.append(constant);
                let scratch = self.symbols.alloc_scratch();
                code.emit_at(&mut self.em, Opcode::Store, scratch);
                Ok(scratch)
            }
            Value::Identifier(id) => match self.read_place(id, code)? {
                Place::Direct(cell) => Ok(cell),
                Place::Indirect(pointer) => {
                    let scratch = self.symbols.alloc_scratch();
                    code.emit_at(&mut self.em, Opcode::Loadi, pointer);
                    code.emit_at(&mut self.em, Opcode::Store, scratch);
                    Ok(scratch)
                }
            },
        }
    }

    /// Copies the accumulator into a fresh scratch cell.
    pub(super) fn spill(&mut self, code: &mut Code) -> Address {
        let scratch = self.symbols.alloc_scratch();
        code.emit_at(&mut self.em, Opcode::Store, scratch);
        scratch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::tests::{compile, run};
    use crate::compile::symbols::FIRST_FREE;
    use test_log::test;

    fn generator_with(declare: impl FnOnce(&mut CodeGen)) -> CodeGen {
        let mut generator = CodeGen::new();
        declare(&mut generator);
        generator
    }

    #[test]
    fn test_scalar_place() {
        let mut generator = generator_with(|g| {
            g.symbols.declare("x", 1).unwrap();
        });
        let mut code = Code::new();
        let place = generator.place(&Identifier::scalar("x", 2), &mut code).unwrap();
        assert_eq!(place, Place::Direct(FIRST_FREE));
        assert!(code.is_empty());
    }

    #[test]
    fn test_const_index_resolves_at_compile_time() {
        let mut generator = generator_with(|g| {
            g.symbols.declare_array("t", -2, 2, 1).unwrap();
        });
        let mut code = Code::new();
        let place = generator
            .place(&Identifier::const_index("t", 0, 2), &mut code)
            .unwrap();
        // header, then t(-2), t(-1), t(0)
        assert_eq!(place, Place::Direct(FIRST_FREE + 3));
        assert!(code.is_empty());
    }

    #[test]
    fn test_var_index_goes_through_scratch() {
        let mut generator = generator_with(|g| {
            g.symbols.declare("i", 1).unwrap();
            g.symbols.set_initialized("i");
            g.symbols.declare_array("t", 0, 9, 1).unwrap();
        });
        let mut code = Code::new();
        let place = generator
            .place(&Identifier::var_index("t", "i", 2), &mut code)
            .unwrap();

        let header = FIRST_FREE + 1;
        let scratch = header + 11;
        assert_eq!(place, Place::Indirect(scratch));
        let text: Vec<String> = code.instructions().iter().map(|i| i.to_string()).collect();
        assert_eq!(
            text,
            vec![
                format!("LOAD {}", header),
                format!("ADD {}", FIRST_FREE),
                format!("STORE {}", scratch)
            ]
        );
    }

    #[test]
    fn test_access_errors() {
        let mut generator = generator_with(|g| {
            g.symbols.declare("x", 1).unwrap();
            g.symbols.declare_array("t", 1, 3, 1).unwrap();
        });
        let mut code = Code::new();

        let err = generator.place(&Identifier::scalar("y", 4), &mut code).unwrap_err();
        assert!(matches!(err, CompileError::Undeclared { line: 4, .. }));

        let err = generator.place(&Identifier::const_index("x", 1, 4), &mut code).unwrap_err();
        assert!(matches!(err, CompileError::NotAnArray { .. }));

        let err = generator.place(&Identifier::scalar("t", 4), &mut code).unwrap_err();
        assert!(matches!(err, CompileError::ArrayWithoutIndex { .. }));

        let err = generator.place(&Identifier::const_index("t", 4, 4), &mut code).unwrap_err();
        assert_eq!(
            err,
            CompileError::IndexOutOfBounds {
                name: "t".to_string(),
                index: 4,
                lower: 1,
                upper: 3,
                line: 4
            }
        );

        // Index variable never assigned.
        let err = generator.place(&Identifier::var_index("t", "x", 4), &mut code).unwrap_err();
        assert!(matches!(err, CompileError::Uninitialized { .. }));
    }

    #[test]
    fn test_uninitialized_element_read() {
        let compilation = compile("DECLARE t(1:3) BEGIN t(1) := 5; WRITE t(1); WRITE t(2); END");
        let errors: Vec<&CompileError> = compilation.diagnostics.iter().collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CompileError::Uninitialized { name, .. } if name == "t(2)"));
    }

    #[test]
    fn test_arrays_at_runtime() {
        let out = run(
            "DECLARE i, t(-3:3) BEGIN
                 FOR j FROM -3 TO 3 DO t(j) := j; ENDFOR
                 i := -2; WRITE t(i);
                 i := 3; WRITE t(i);
                 WRITE t(0);
             END",
            vec![],
        );
        assert_eq!(out, vec![-2, 3, 0]);
    }

    #[test]
    fn test_indirect_operand_cells() {
        let out = run(
            "DECLARE a, i, t(0:2) BEGIN
                 i := 1; t(i) := 40;
                 a := t(i) + 2; WRITE a;
                 a := 50 - t(i); WRITE a;
             END",
            vec![],
        );
        assert_eq!(out, vec![42, 10]);
    }
}
