use crate::bytecode::ir::{Instruction, ObjectCode, Operand};
use crate::bytecode::op::Opcode;
use std::collections::{BTreeMap, BTreeSet};

/// Print a disassembly listing of a finished program
pub fn print_listing(code: &ObjectCode) {
    println!("════════════════════════════════════════");
    println!(" program");
    println!(" {} instructions", code.len());
    println!("════════════════════════════════════════");
    print!("{}", disassemble_to_string(&code.instructions));
    println!();
}

fn collect_jump_targets(instructions: &[Instruction]) -> BTreeSet<usize> {
    instructions
        .iter()
        .filter(|i| i.opcode.is_jump())
        .filter_map(Instruction::target)
        .collect()
}

// =============================================================================
// String output (for testing/logging)
// =============================================================================

/// Return disassembly as a String.
///
/// Jump targets get a separator line and a `►` marker; jumps show their
/// direction relative to their own position.
pub fn disassemble_to_string(instructions: &[Instruction]) -> String {
    let mut output = String::new();
    let jump_targets = collect_jump_targets(instructions);

    for instruction in instructions {
        let position = instruction.position;
        let is_target = jump_targets.contains(&position);

        if is_target {
            output.push_str("      ┌──────────────────────────────────\n");
        }

        output.push_str(&format!("{:04} ", position));
        output.push_str(if is_target { "► " } else { "  " });
        output.push_str(&format_instruction(instruction));
        output.push('\n');
    }

    output
}

fn format_instruction(instruction: &Instruction) -> String {
    let name = instruction.opcode.name();
    match instruction.operand {
        Operand::None => name.to_string(),
        Operand::Address(0) => format!("{:<7} 0      ; acc", name),
        Operand::Address(a) => format!("{:<7} {}", name, a),
        Operand::Target(target) => {
            let direction = if target <= instruction.position {
                "↑"
            } else {
                "↓"
            };
            format!("{:<7} {:04} {}", name, target, direction)
        }
        Operand::Unresolved => format!("{:<7} ????", name),
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Count instructions per opcode.
pub fn count_opcodes(instructions: &[Instruction]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for instruction in instructions {
        *counts.entry(instruction.opcode.name()).or_insert(0) += 1;
    }
    counts
}

/// Print program statistics
pub fn print_stats(code: &ObjectCode) {
    println!("=== PROGRAM STATISTICS ===\n");
    println!("Instructions:     {}", code.len());
    println!("Static cost:      {}", code.static_cost());
    println!();

    let counts = count_opcodes(&code.instructions);
    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    println!("Opcode frequency:");
    for (name, count) in sorted {
        let cost = name
            .parse::<Opcode>()
            .map(|op| op.cost() * count as u64)
            .unwrap_or(0);
        println!("  {:<8} {:>6}   (cost {})", name, count, cost);
    }
}
