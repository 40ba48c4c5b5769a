use accgen::bytecode::ObjectCode;
use accgen::bytecode::compile_error::CompileError;
use accgen::compile::{Compilation, generate};
use accgen::frontend::parse_source;
use accgen::runtime::{Machine, MachineConfig, RuntimeError};
use test_log::test;

// =============================================================================
// Helpers
// =============================================================================

fn compile(source: &str) -> Compilation {
    let program = parse_source(source).expect("program should parse");
    generate(&program).expect("generation should not fail internally")
}

fn compile_ok(source: &str) -> ObjectCode {
    let compilation = compile(source);
    assert!(
        compilation.is_success(),
        "unexpected diagnostics:\n{}",
        compilation.diagnostics
    );
    compilation.code
}

fn execute(code: &ObjectCode, input: Vec<i64>) -> Machine {
    let mut machine = Machine::new().with_input(input);
    machine
        .run(&code.instructions)
        .expect("generated code should run");
    machine
}

fn run(source: &str, input: Vec<i64>) -> Vec<i64> {
    execute(&compile_ok(source), input).output().to_vec()
}

const FACTORIAL: &str = "
DECLARE n, f
BEGIN
    READ n;
    f := 1;
    FOR i FROM 1 TO n DO
        f := f * i;
    ENDFOR
    WRITE f;
END";

const GCD: &str = "
DECLARE a, b, r
BEGIN
    READ a;
    READ b;
    WHILE b != 0 DO
        r := a % b;
        a := b;
        b := r;
    ENDWHILE
    WRITE a;
END";

const SIEVE: &str = "
DECLARE n, j, t(2:100)
BEGIN
    n := 100;
    FOR i FROM 2 TO n DO
        t(i) := 1;
    ENDFOR
    FOR i FROM 2 TO n DO
        IF t(i) != 0 THEN
            j := i + i;
            WHILE j <= n DO
                t(j) := 0;
                j := j + i;
            ENDWHILE
            WRITE i;
        ENDIF
    ENDFOR
END";

const BINARY: &str = "
[ least significant digit first ]
DECLARE n, d
BEGIN
    READ n;
    DO
        d := n % 2;
        WRITE d;
        n := n / 2;
    WHILE n > 0 ENDDO
END";

// =============================================================================
// Whole programs
// =============================================================================

#[test]
fn test_factorial() {
    assert_eq!(run(FACTORIAL, vec![10]), vec![3_628_800]);
    assert_eq!(run(FACTORIAL, vec![0]), vec![1]);
    assert_eq!(run(FACTORIAL, vec![20]), vec![2_432_902_008_176_640_000]);
}

#[test]
fn test_gcd() {
    assert_eq!(run(GCD, vec![1071, 462]), vec![21]);
    assert_eq!(run(GCD, vec![17, 5]), vec![1]);
    assert_eq!(run(GCD, vec![12, 0]), vec![12]);
}

#[test]
fn test_sieve() {
    let primes = vec![
        2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83,
        89, 97,
    ];
    assert_eq!(run(SIEVE, vec![]), primes);
}

#[test]
fn test_binary_digits() {
    assert_eq!(run(BINARY, vec![13]), vec![1, 0, 1, 1]);
    // The body runs once even when the condition is false from the start.
    assert_eq!(run(BINARY, vec![0]), vec![0]);
}

#[test]
fn test_nested_counted_loops() {
    let out = run(
        "BEGIN
            FOR i FROM 1 TO 3 DO
                FOR j FROM i DOWNTO 1 DO
                    WRITE j;
                ENDFOR
            ENDFOR
        END",
        vec![],
    );
    assert_eq!(out, vec![1, 2, 1, 3, 2, 1]);
}

#[test]
fn test_arrays_with_negative_bounds() {
    let out = run(
        "DECLARE k, t(-3:3)
        BEGIN
            FOR i FROM -3 TO 3 DO
                k := i * i;
                t(i) := k;
            ENDFOR
            WRITE t(-3);
            WRITE t(0);
            k := 2;
            WRITE t(k);
        END",
        vec![],
    );
    assert_eq!(out, vec![9, 0, 4]);
}

#[test]
fn test_signed_arithmetic() {
    let source = "
    DECLARE a, b, c
    BEGIN
        READ a;
        READ b;
        c := a * b; WRITE c;
        c := a / b; WRITE c;
        c := a % b; WRITE c;
        c := a - b; WRITE c;
    END";
    assert_eq!(run(source, vec![-17, 5]), vec![-85, -3, -2, -22]);
    assert_eq!(run(source, vec![17, -5]), vec![-85, -3, 2, 22]);
    assert_eq!(run(source, vec![17, 0]), vec![0, 0, 0, 17]);
}

#[test]
fn test_extreme_literals() {
    let out = run(
        "DECLARE a BEGIN
            WRITE -9223372036854775808;
            a := 9223372036854775807;
            WRITE a;
        END",
        vec![],
    );
    assert_eq!(out, vec![i64::MIN, i64::MAX]);
}

// =============================================================================
// Diagnostics
// =============================================================================

#[test]
fn test_diagnostics_are_collected() {
    let compilation = compile(
        "DECLARE a, t(1:3)
        BEGIN
            WRITE b;
            t(4) := 1;
            a := 2;
            FOR i FROM 1 TO a DO
                i := 3;
            ENDFOR
        END",
    );
    assert!(!compilation.is_success());
    let errors: Vec<&CompileError> = compilation.diagnostics.iter().collect();
    assert_eq!(errors.len(), 3);
    assert!(matches!(errors[0], CompileError::Undeclared { .. }));
    assert!(matches!(errors[1], CompileError::IndexOutOfBounds { .. }));
    assert!(matches!(errors[2], CompileError::IteratorAssignment { .. }));
}

#[test]
fn test_errors_behind_a_failed_condition_are_reported() {
    let compilation = compile(
        "DECLARE x BEGIN
            IF x = 0 THEN WRITE y; ENDIF
            WHILE x > 0 DO WRITE z; ENDWHILE
        END",
    );
    let undeclared: Vec<&str> = compilation
        .diagnostics
        .iter()
        .filter_map(|e| match e {
            CompileError::Undeclared { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(compilation.diagnostics.len(), 4);
    assert_eq!(undeclared, vec!["y", "z"]);
}

#[test]
fn test_parse_errors_abort() {
    assert!(parse_source("BEGIN WRITE 1 END").is_err());
    assert!(parse_source("DECLARE A BEGIN WRITE 1; END").is_err());
}

// =============================================================================
// Object code
// =============================================================================

#[test]
fn test_text_format_round_trip() {
    let code = compile_ok(GCD);
    let text = code.to_string();
    let parsed: ObjectCode = text.parse().expect("listing should parse back");
    assert_eq!(parsed, code);

    let out = execute(&parsed, vec![48, 36]).output().to_vec();
    assert_eq!(out, vec![12]);
}

#[test]
fn test_binary_format_round_trip() {
    let code = compile_ok(SIEVE);
    let bytes = code.to_bytes().expect("code should encode");
    let decoded = ObjectCode::from_bytes(&bytes).expect("code should decode");
    assert_eq!(decoded, code);
}

#[test]
fn test_straight_line_cost_matches_static_cost() {
    let code = compile_ok("DECLARE a BEGIN a := 1234; WRITE a; END");
    let machine = execute(&code, vec![]);
    assert_eq!(machine.output(), &[1234]);
    assert_eq!(machine.cost(), code.static_cost());
}

#[test]
fn test_step_limit_stops_endless_loop() {
    let code = compile_ok(
        "DECLARE a BEGIN a := 0; WHILE 1 = 1 DO a := a + 1; ENDWHILE END",
    );
    let mut machine = Machine::with_config(MachineConfig {
        max_steps: Some(1000),
    });
    let result = machine.run(&code.instructions);
    assert!(matches!(result, Err(RuntimeError::StepLimit(1000))));
}
