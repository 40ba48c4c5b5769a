use super::CodeGen;
use super::symbols::{ACC, ONE};
use crate::bytecode::Opcode;
use crate::bytecode::code::Code;
use log::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// `SHIFT ONE`
    Double,
    /// `INC` or `DEC`, toward the sign of the target.
    Adjust,
}

/// Binary decomposition of `magnitude`, least significant step first.
fn steps(mut magnitude: u64) -> Vec<Step> {
    let mut steps = Vec::new();
    while magnitude > 0 {
        if magnitude % 2 == 0 {
            steps.push(Step::Double);
            magnitude /= 2;
        } else {
            steps.push(Step::Adjust);
            magnitude -= 1;
        }
    }
    steps
}

impl CodeGen {
    /// Leaves `n` in the accumulator without touching any named variable.
    ///
    /// `0` is a single `SUB 0`. Anything else costs one instruction per bit
    /// plus one per set bit, and writes `1` into the shift helper first if
    /// a doubling is needed.
    pub(super) fn load_constant(&mut self, n: i64) -> Code {
        let mut code = Code::new();
        let steps = steps(n.unsigned_abs());

        if steps.contains(&Step::Double) {
            self.materialize_one(&mut code);
        }

        code.emit_at(&mut self.em, Opcode::Sub, ACC);
        let adjust = if n < 0 { Opcode::Dec } else { Opcode::Inc };
        for step in steps.iter().rev() {
            match step {
                Step::Double => code.emit_at(&mut self.em, Opcode::Shift, ONE),
                Step::Adjust => code.emit(&mut self.em, adjust),
            }
        }

        trace!("constant {} in {} instructions", n, code.len());
        code
    }

    /// Writes `1` into the shift helper cell.
    pub(super) fn materialize_one(&mut self, code: &mut Code) {
        code.emit_at(&mut self.em, Opcode::Sub, ACC);
        code.emit(&mut self.em, Opcode::Inc);
        code.emit_at(&mut self.em, Opcode::Store, ONE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Machine;
    use test_log::test;

    fn synthesize(n: i64) -> (i64, usize) {
        let mut generator = CodeGen::new();
        let mut code = generator.load_constant(n);
        let len = code.len();
        code.emit(&mut generator.em, Opcode::Halt);

        let mut machine = Machine::new();
        machine
            .run(&code.finish().expect("no jumps to resolve"))
            .expect("constant code should run");
        (machine.accumulator(), len)
    }

    #[test]
    fn test_zero_is_one_instruction() {
        assert_eq!(synthesize(0), (0, 1));
    }

    #[test]
    fn test_small_values_skip_the_helper() {
        assert_eq!(synthesize(1), (1, 2));
        assert_eq!(synthesize(-1), (-1, 2));
    }

    #[test]
    fn test_representative_values() {
        let mut values = vec![2, 3, 5, 7, 10, 64, 100, 255, 1023, 1024, 123_456_789];
        values.extend((0..62).map(|p| 1i64 << p));
        values.extend((1..62).map(|p| (1i64 << p) - 1));
        values.push(i64::MAX);

        for n in values {
            assert_eq!(synthesize(n).0, n, "synthesizing {}", n);
            assert_eq!(synthesize(-n).0, -n, "synthesizing {}", -n);
        }
    }

    #[test]
    fn test_extreme_negative() {
        assert_eq!(synthesize(i64::MIN).0, i64::MIN);
    }

    #[test]
    fn test_length_is_logarithmic() {
        // 3 helper + SUB 0 + 10 doubles + 1 adjust
        assert_eq!(synthesize(1024).1, 15);
        assert!(synthesize(i64::MAX).1 < 3 + 1 + 2 * 63);
    }

    #[test]
    fn test_step_order() {
        // 6 = ((1) * 2 + 1) * 2
        assert_eq!(steps(6), vec![Step::Double, Step::Adjust, Step::Double, Step::Adjust]);
    }
}
