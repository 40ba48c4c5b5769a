use super::CodeGen;
use super::symbols::{ACC, ONE};
use crate::bytecode::Opcode;
use crate::bytecode::code::{Code, Label};
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::ir::Address;
use crate::lang::node::Expression;
use crate::lang::value::Value;
use log::debug;

/// Largest constant added or multiplied in by repeating `INC`/`DEC` or
/// `ADD`/`SUB` instead of materializing it.
const INLINE_STEPS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DivPart {
    Quotient,
    Remainder,
}

impl CodeGen {
    /// Code leaving the value of `expression` in the accumulator.
    pub(super) fn expression(&mut self, expression: &Expression) -> Result<Code, CompileError> {
        match expression {
            Expression::Value(value) => self.load_value(value),
            Expression::Plus(left, right) => self.plus(left, right),
            Expression::Minus(left, right) => self.minus(left, right),
            Expression::Times(left, right) => self.times(left, right),
            Expression::Div(left, right) => self.divide(left, right, DivPart::Quotient),
            Expression::Mod(left, right) => self.divide(left, right, DivPart::Remainder),
        }
    }

    // =========================================================================
    // Addition / subtraction
    // =========================================================================

    fn plus(&mut self, left: &Value, right: &Value) -> Result<Code, CompileError> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(self.load_constant(a.wrapping_add(*b))),
            (value, Value::Number(c)) | (Value::Number(c), value) => self.add_constant(value, *c),
            _ => self.combine(left, right, Opcode::Add),
        }
    }

    pub(super) fn minus(&mut self, left: &Value, right: &Value) -> Result<Code, CompileError> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(self.load_constant(a.wrapping_sub(*b))),
            (value, Value::Number(c)) => self.subtract_constant(value, *c),
            (Value::Number(c), value) => {
                let mut code = Code::new();
                let cell = self.cell_of(value, &mut code)?;
                let constant = self.load_constant(*c);
                code.append(constant);
                code.emit_at(&mut self.em, Opcode::Sub, cell);
                Ok(code)
            }
            _ => self.combine(left, right, Opcode::Sub),
        }
    }

    /// `value + c`
    fn add_constant(&mut self, value: &Value, c: i64) -> Result<Code, CompileError> {
        if c.unsigned_abs() <= INLINE_STEPS {
            let mut code = self.load_value(value)?;
            let step = if c > 0 { Opcode::Inc } else { Opcode::Dec };
            for _ in 0..c.unsigned_abs() {
                code.emit(&mut self.em, step);
            }
            return Ok(code);
        }

        let mut code = Code::new();
        let cell = self.cell_of(value, &mut code)?;
        let constant = self.load_constant(c);
        code.append(constant);
        code.emit_at(&mut self.em, Opcode::Add, cell);
        Ok(code)
    }

    /// `value - c`: the constant goes to a scratch cell, then the value is
    /// loaded and the cell subtracted.
    fn subtract_constant(&mut self, value: &Value, c: i64) -> Result<Code, CompileError> {
        if c.unsigned_abs() <= INLINE_STEPS {
            return self.add_constant(value, c.wrapping_neg());
        }

        let mut code = self.load_constant(c);
        let cell = self.spill(&mut code);
        let load = self.load_value(value)?;
        code.append(load);
        code.emit_at(&mut self.em, Opcode::Sub, cell);
        Ok(code)
    }

    /// `left op right` for two identifiers, `op` being `ADD` or `SUB`.
    fn combine(&mut self, left: &Value, right: &Value, op: Opcode) -> Result<Code, CompileError> {
        let mut code = Code::new();
        let right_cell = self.cell_of(right, &mut code)?;
        let load = self.load_value(left)?;
        code.append(load);
        code.emit_at(&mut self.em, op, right_cell);
        Ok(code)
    }

    // =========================================================================
    // Multiplication
    // =========================================================================

    fn times(&mut self, left: &Value, right: &Value) -> Result<Code, CompileError> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(self.load_constant(a.wrapping_mul(*b))),
            (value, Value::Number(k)) | (Value::Number(k), value) => {
                self.multiply_constant(value, *k)
            }
            _ => self.multiply(left, right),
        }
    }

    fn multiply_constant(&mut self, value: &Value, k: i64) -> Result<Code, CompileError> {
        match k {
            0 => {
                self.check_read(value)?;
                Ok(self.load_constant(0))
            }
            1 => self.load_value(value),
            -1 => self.negated(value),
            _ => {
                let mut code = Code::new();
                let cell = self.cell_of(value, &mut code)?;
                self.scale(cell, k.unsigned_abs(), &mut code);
                if k < 0 {
                    self.negate(&mut code);
                }
                debug!("multiply by {} in {} instructions", k, code.len());
                Ok(code)
            }
        }
    }

    /// Leaves `m · p[cell]` in the accumulator, `m >= 1`.
    ///
    /// Doubles up to the largest power of two not above `m`, then either
    /// adds the remainder or doubles once more and subtracts the overshoot,
    /// whichever is smaller. A large correction is scaled the same way.
    fn scale(&mut self, cell: Address, m: u64, code: &mut Code) {
        if m == 1 {
            code.emit_at(&mut self.em, Opcode::Load, cell);
            return;
        }

        self.materialize_one(code);
        code.emit_at(&mut self.em, Opcode::Load, cell);
        let mut estimate: u64 = 1;
        while estimate <= m / 2 {
            code.emit_at(&mut self.em, Opcode::Shift, ONE);
            estimate *= 2;
        }

        let up = m - estimate;
        if up == 0 {
            return;
        }
        // estimate < m < 2^63 here, so doubling cannot overflow.
        let down = 2 * estimate - m;
        let (residual, op) = if down < up {
            code.emit_at(&mut self.em, Opcode::Shift, ONE);
            (down, Opcode::Sub)
        } else {
            (up, Opcode::Add)
        };

        if residual <= INLINE_STEPS {
            for _ in 0..residual {
                code.emit_at(&mut self.em, op, cell);
            }
        } else {
            let partial = self.spill(code);
            self.scale(cell, residual, code);
            let correction = self.spill(code);
            code.emit_at(&mut self.em, Opcode::Load, partial);
            code.emit_at(&mut self.em, op, correction);
        }
    }

    /// `-value`
    fn negated(&mut self, value: &Value) -> Result<Code, CompileError> {
        let mut code = Code::new();
        let cell = self.cell_of(value, &mut code)?;
        code.emit_at(&mut self.em, Opcode::Sub, ACC);
        code.emit_at(&mut self.em, Opcode::Sub, cell);
        Ok(code)
    }

    /// Negates the accumulator.
    fn negate(&mut self, code: &mut Code) {
        let cell = self.spill(code);
        code.emit_at(&mut self.em, Opcode::Sub, ACC);
        code.emit_at(&mut self.em, Opcode::Sub, cell);
    }

    /// General product by repeated addition.
    ///
    /// The smaller absolute value counts the additions of the larger one;
    /// the sign is applied at the end.
    fn multiply(&mut self, left: &Value, right: &Value) -> Result<Code, CompileError> {
        let mut code = Code::new();
        let a = self.cell_of(left, &mut code)?;
        let b = self.cell_of(right, &mut code)?;

        let x = self.symbols.alloc_scratch();
        let y = self.symbols.alloc_scratch();
        let sign = self.symbols.alloc_scratch();
        let result = self.symbols.alloc_scratch();

        let zero = code.label();
        let end = code.label();
        let ordered = code.label();
        let head = code.label();
        let done = code.label();

        self.jump_if_zero(a, zero, &mut code);
        self.jump_if_zero(b, zero, &mut code);
        self.set_one(sign, &mut code);
        self.abs_into(a, x, Some(sign), &mut code);
        self.abs_into(b, y, Some(sign), &mut code);

        // Count with the smaller of the two.
        code.emit_at(&mut self.em, Opcode::Load, x);
        code.emit_at(&mut self.em, Opcode::Sub, y);
        code.jump(&mut self.em, Opcode::Jpos, ordered);
        code.jump(&mut self.em, Opcode::Jzero, ordered);
        code.emit_at(&mut self.em, Opcode::Load, x);
        code.emit_at(&mut self.em, Opcode::Store, result);
        code.emit_at(&mut self.em, Opcode::Load, y);
        code.emit_at(&mut self.em, Opcode::Store, x);
        code.emit_at(&mut self.em, Opcode::Load, result);
        code.emit_at(&mut self.em, Opcode::Store, y);
        code.bind(&self.em, ordered);
        code.emit_at(&mut self.em, Opcode::Sub, ACC);
        code.emit_at(&mut self.em, Opcode::Store, result);

        code.bind(&self.em, head);
        code.emit_at(&mut self.em, Opcode::Load, y);
        code.jump(&mut self.em, Opcode::Jzero, done);
        code.emit(&mut self.em, Opcode::Dec);
        code.emit_at(&mut self.em, Opcode::Store, y);
        code.emit_at(&mut self.em, Opcode::Load, result);
        code.emit_at(&mut self.em, Opcode::Add, x);
        code.emit_at(&mut self.em, Opcode::Store, result);
        code.jump(&mut self.em, Opcode::Jump, head);

        code.bind(&self.em, done);
        self.signed_result(sign, result, end, &mut code);
        code.bind(&self.em, zero);
        code.emit_at(&mut self.em, Opcode::Sub, ACC);
        code.bind(&self.em, end);

        debug!("general multiply in {} instructions", code.len());
        Ok(code)
    }

    // =========================================================================
    // Division / modulo
    // =========================================================================

    /// Quotient truncates toward zero; the remainder takes the dividend's
    /// sign. A zero divisor gives 0 for both.
    fn divide(&mut self, left: &Value, right: &Value, part: DivPart) -> Result<Code, CompileError> {
        match (left, right, part) {
            (Value::Number(a), Value::Number(b), _) => {
                let folded = match (*b, part) {
                    (0, _) => 0,
                    (b, DivPart::Quotient) => a.wrapping_div(b),
                    (b, DivPart::Remainder) => a.wrapping_rem(b),
                };
                Ok(self.load_constant(folded))
            }
            (value, Value::Number(1), DivPart::Quotient) => self.load_value(value),
            (value, Value::Number(-1), DivPart::Quotient) => self.negated(value),
            (value, Value::Number(0 | 1 | -1), _) | (Value::Number(0), value, _) => {
                self.check_read(value)?;
                Ok(self.load_constant(0))
            }
            _ => self.long_division(left, right, part),
        }
    }

    /// Restoring division on absolute values.
    ///
    /// Each round scans for the largest `d = divisor · 2^s` not above the
    /// remaining dividend, starting again from `s = 0`, and subtracts it.
    fn long_division(&mut self, left: &Value, right: &Value, part: DivPart) -> Result<Code, CompileError> {
        let mut code = Code::new();
        let a = self.cell_of(left, &mut code)?;
        let b = self.cell_of(right, &mut code)?;

        let remainder = self.symbols.alloc_scratch();
        let divisor = self.symbols.alloc_scratch();
        let shifted = self.symbols.alloc_scratch();
        let power = self.symbols.alloc_scratch();
        let quotient = self.symbols.alloc_scratch();
        let sign = self.symbols.alloc_scratch();

        let zero = code.label();
        let end = code.label();
        let round = code.label();
        let scan = code.label();
        let subtract = code.label();
        let finish = code.label();

        self.jump_if_zero(b, zero, &mut code);
        self.jump_if_zero(a, zero, &mut code);
        self.set_one(sign, &mut code);
        self.abs_into(a, remainder, Some(sign), &mut code);
        let divisor_sign = match part {
            DivPart::Quotient => Some(sign),
            DivPart::Remainder => None,
        };
        self.abs_into(b, divisor, divisor_sign, &mut code);
        code.emit_at(&mut self.em, Opcode::Sub, ACC);
        code.emit_at(&mut self.em, Opcode::Store, quotient);
        self.materialize_one(&mut code);

        // Done once the remainder is below the divisor.
        code.bind(&self.em, round);
        code.emit_at(&mut self.em, Opcode::Load, remainder);
        code.emit_at(&mut self.em, Opcode::Sub, divisor);
        code.jump(&mut self.em, Opcode::Jneg, finish);
        code.emit_at(&mut self.em, Opcode::Load, divisor);
        code.emit_at(&mut self.em, Opcode::Store, shifted);
        self.set_one(power, &mut code);

        // Double while 2·shifted still fits; a negative value means overflow.
        code.bind(&self.em, scan);
        code.emit_at(&mut self.em, Opcode::Load, shifted);
        code.emit_at(&mut self.em, Opcode::Shift, ONE);
        code.jump(&mut self.em, Opcode::Jneg, subtract);
        code.emit_at(&mut self.em, Opcode::Sub, remainder);
        code.jump(&mut self.em, Opcode::Jpos, subtract);
        code.emit_at(&mut self.em, Opcode::Load, shifted);
        code.emit_at(&mut self.em, Opcode::Shift, ONE);
        code.emit_at(&mut self.em, Opcode::Store, shifted);
        code.emit_at(&mut self.em, Opcode::Load, power);
        code.emit_at(&mut self.em, Opcode::Shift, ONE);
        code.emit_at(&mut self.em, Opcode::Store, power);
        code.jump(&mut self.em, Opcode::Jump, scan);

        code.bind(&self.em, subtract);
        code.emit_at(&mut self.em, Opcode::Load, remainder);
        code.emit_at(&mut self.em, Opcode::Sub, shifted);
        code.emit_at(&mut self.em, Opcode::Store, remainder);
        code.emit_at(&mut self.em, Opcode::Load, quotient);
        code.emit_at(&mut self.em, Opcode::Add, power);
        code.emit_at(&mut self.em, Opcode::Store, quotient);
        code.jump(&mut self.em, Opcode::Jump, round);

        code.bind(&self.em, finish);
        let result = match part {
            DivPart::Quotient => quotient,
            DivPart::Remainder => remainder,
        };
        self.signed_result(sign, result, end, &mut code);
        code.bind(&self.em, zero);
        code.emit_at(&mut self.em, Opcode::Sub, ACC);
        code.bind(&self.em, end);

        debug!("{:?} by restoring division in {} instructions", part, code.len());
        Ok(code)
    }

    // =========================================================================
    // Shared pieces
    // =========================================================================

    fn jump_if_zero(&mut self, cell: Address, target: Label, code: &mut Code) {
        code.emit_at(&mut self.em, Opcode::Load, cell);
        code.jump(&mut self.em, Opcode::Jzero, target);
    }

    fn set_one(&mut self, cell: Address, code: &mut Code) {
        code.emit_at(&mut self.em, Opcode::Sub, ACC);
        code.emit(&mut self.em, Opcode::Inc);
        code.emit_at(&mut self.em, Opcode::Store, cell);
    }

    /// `into := |p[cell]|`, flipping the `±1` in `sign` if the value is
    /// negative. `p[cell]` must not be zero.
    fn abs_into(&mut self, cell: Address, into: Address, sign: Option<Address>, code: &mut Code) {
        let positive = code.label();
        let done = code.label();

        code.emit_at(&mut self.em, Opcode::Load, cell);
        code.jump(&mut self.em, Opcode::Jpos, positive);
        code.emit_at(&mut self.em, Opcode::Sub, ACC);
        code.emit_at(&mut self.em, Opcode::Sub, cell);
        code.emit_at(&mut self.em, Opcode::Store, into);
        if let Some(sign) = sign {
            code.emit_at(&mut self.em, Opcode::Sub, ACC);
            code.emit_at(&mut self.em, Opcode::Sub, sign);
            code.emit_at(&mut self.em, Opcode::Store, sign);
        }
        code.jump(&mut self.em, Opcode::Jump, done);
        code.bind(&self.em, positive);
        code.emit_at(&mut self.em, Opcode::Store, into);
        code.bind(&self.em, done);
    }

    /// Loads `p[result]` negated if `p[sign]` is negative, then jumps to `end`.
    fn signed_result(&mut self, sign: Address, result: Address, end: Label, code: &mut Code) {
        let positive = code.label();

        code.emit_at(&mut self.em, Opcode::Load, sign);
        code.jump(&mut self.em, Opcode::Jpos, positive);
        code.emit_at(&mut self.em, Opcode::Sub, ACC);
        code.emit_at(&mut self.em, Opcode::Sub, result);
        code.jump(&mut self.em, Opcode::Jump, end);
        code.bind(&self.em, positive);
        code.emit_at(&mut self.em, Opcode::Load, result);
        code.jump(&mut self.em, Opcode::Jump, end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::tests::{compile, run};
    use test_log::test;

    /// Runs `z := x <op> y; WRITE z;` with `x` and `y` read from input.
    fn apply(op: &str, x: i64, y: i64) -> i64 {
        let source = format!(
            "DECLARE x, y, z BEGIN READ x; READ y; z := x {} y; WRITE z; END",
            op
        );
        run(&source, vec![x, y])[0]
    }

    /// Runs `z := x <op> <k>;` and `z := <k> <op> x;` with `x` from input.
    fn apply_constant(op: &str, x: i64, k: i64) -> (i64, i64) {
        let source = format!(
            "DECLARE x, z BEGIN READ x; z := x {op} {k}; WRITE z; z := {k} {op} x; WRITE z; END"
        );
        let out = run(&source, vec![x]);
        (out[0], out[1])
    }

    fn fold(op: &str, a: i64, b: i64) -> i64 {
        let source = format!("DECLARE z BEGIN z := {} {} {}; WRITE z; END", a, op, b);
        run(&source, vec![])[0]
    }

    const PAIRS: [(i64, i64); 10] = [
        (7, 2),
        (-7, 2),
        (7, -2),
        (-7, -2),
        (0, 5),
        (5, 0),
        (12, 12),
        (1, -9),
        (100, 7),
        (-3, 25),
    ];

    // =========================================================================
    // Folding
    // =========================================================================

    #[test]
    fn test_constant_folding() {
        for (a, b) in PAIRS {
            assert_eq!(fold("+", a, b), a + b);
            assert_eq!(fold("-", a, b), a - b);
            assert_eq!(fold("*", a, b), a * b);
            assert_eq!(fold("/", a, b), if b == 0 { 0 } else { a / b });
            assert_eq!(fold("%", a, b), if b == 0 { 0 } else { a % b });
        }
    }

    #[test]
    fn test_division_rounds_toward_zero() {
        assert_eq!(fold("/", -7, 2), -3);
        assert_eq!(fold("/", 7, -2), -3);
        assert_eq!(apply("/", -7, 2), -3);
        assert_eq!(apply("/", 7, -2), -3);
        assert_eq!(apply("%", -7, 2), -1);
        assert_eq!(apply("%", 7, -2), 1);
    }

    #[test]
    fn test_folded_code_is_just_the_constant() {
        let compilation = compile("DECLARE z BEGIN z := 2 + 3; END");
        let text = compilation.code.to_string();
        assert!(!text.contains("ADD"));
    }

    // =========================================================================
    // Variables
    // =========================================================================

    #[test]
    fn test_variable_operators() {
        for (x, y) in PAIRS {
            assert_eq!(apply("+", x, y), x + y, "{} + {}", x, y);
            assert_eq!(apply("-", x, y), x - y, "{} - {}", x, y);
            assert_eq!(apply("*", x, y), x * y, "{} * {}", x, y);
            let quotient = if y == 0 { 0 } else { x / y };
            assert_eq!(apply("/", x, y), quotient, "{} / {}", x, y);
            let remainder = if y == 0 { 0 } else { x % y };
            assert_eq!(apply("%", x, y), remainder, "{} % {}", x, y);
        }
    }

    #[test]
    fn test_large_division() {
        assert_eq!(apply("/", 1_000_000_007, 3), 333_333_335);
        assert_eq!(apply("%", 1_000_000_007, 3), 2);
        assert_eq!(apply("/", i64::MAX, 2), i64::MAX / 2);
        assert_eq!(apply("/", i64::MAX, 1), i64::MAX);
    }

    #[test]
    fn test_same_variable_on_both_sides() {
        let out = run(
            "DECLARE x, z BEGIN READ x; z := x * x; WRITE z; z := x / x; WRITE z; z := x - x; WRITE z; END",
            vec![-6],
        );
        assert_eq!(out, vec![36, 1, 0]);
    }

    // =========================================================================
    // Constant operands
    // =========================================================================

    #[test]
    fn test_constant_operands() {
        for x in [-9, -1, 0, 1, 6, 13] {
            for k in [-100, -17, -4, -1, 0, 1, 2, 3, 4, 5, 7, 15, 17, 23, 1000] {
                assert_eq!(apply_constant("+", x, k), (x + k, k + x));
                assert_eq!(apply_constant("-", x, k), (x - k, k - x));
                assert_eq!(apply_constant("*", x, k), (x * k, k * x), "{} * {}", x, k);
                let q = |a: i64, b: i64| if b == 0 { 0 } else { a / b };
                let r = |a: i64, b: i64| if b == 0 { 0 } else { a % b };
                assert_eq!(apply_constant("/", x, k), (q(x, k), q(k, x)), "{} / {}", x, k);
                assert_eq!(apply_constant("%", x, k), (r(x, k), r(k, x)), "{} % {}", x, k);
            }
        }
    }

    #[test]
    fn test_small_constants_inline() {
        let compilation = compile("DECLARE x, z BEGIN READ x; z := x + 1; z := x - 2; END");
        let text = compilation.code.to_string();
        assert_eq!(text.matches("INC").count(), 1);
        assert_eq!(text.matches("DEC").count(), 2);
        assert!(!text.contains("ADD") && !text.contains("SUB 0"));
    }

    #[test]
    fn test_multiply_by_constant_has_no_loop() {
        let compilation = compile("DECLARE x, z BEGIN READ x; z := x * 1000; END");
        assert!(compilation.code.instructions.iter().all(|i| !i.opcode.is_jump()));
    }

    #[test]
    fn test_large_constant_products() {
        for k in [255, 1023, 1025, 3_000_017, 1 << 40] {
            assert_eq!(apply_constant("*", 3, k).0, 3 * k, "3 * {}", k);
            assert_eq!(apply_constant("*", -3, -k).0, 3 * k, "-3 * -{}", k);
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    #[test]
    fn test_uninitialized_operand_even_when_result_is_constant() {
        let compilation = compile("DECLARE x, z BEGIN z := x * 0; END");
        assert_eq!(compilation.diagnostics.len(), 1);
        assert!(matches!(
            compilation.diagnostics.iter().next(),
            Some(CompileError::Uninitialized { .. })
        ));
    }
}
