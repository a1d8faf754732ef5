//! Human-readable program listings. The format is header lines followed by
//! one line per instruction:
//!
//! ```text
//! Program: NAME
//! Inputs: x1, x2
//! Labels: L1, L2, EXIT
//! #1 (B) [L1   ] IF x1 != 0 GOTO L2 (2)
//! #2 (S) [     ] y <- 5 (23)
//! ```
//!
//! Lines produced by expansion carry an ancestry suffix pointing at the
//! synthetic line they came from, e.g. `<<< #7`.

use crate::{
    ast::exec::{Body, Program},
    consts::EXIT_LABEL,
};
use std::fmt::Write;

/// Render a program (at whatever depth it is already in) as a listing.
pub fn listing(program: &Program) -> String {
    let mut out = String::new();
    writeln!(out, "Program: {}", program.name).unwrap();
    writeln!(out, "Inputs: {}", inputs_line(&program.body)).unwrap();
    writeln!(out, "Labels: {}", labels_line(&program.body)).unwrap();
    write_body(&mut out, &program.body);

    for function in &program.functions {
        writeln!(out).unwrap();
        writeln!(
            out,
            "Function: {} ({})",
            function.name, function.user_string
        )
        .unwrap();
        write_body(&mut out, &function.body);
    }
    out
}

fn write_body(out: &mut String, body: &Body) {
    for instruction in &body.instructions {
        let type_tag = if instruction.kind.is_basic() { "B" } else { "S" };
        let label = instruction.label.as_deref().unwrap_or("");
        write!(
            out,
            "#{} ({}) [{:<5}] {} ({})",
            instruction.index, type_tag, label, instruction.kind,
            instruction.cost,
        )
        .unwrap();
        if let Some(origin) = instruction.origin {
            write!(out, " <<< #{}", origin).unwrap();
        }
        writeln!(out).unwrap();
    }
}

fn inputs_line(body: &Body) -> String {
    body.input_vars
        .iter()
        .map(|n| format!("x{}", n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Defined labels in first-occurrence order, with `EXIT` appended when any
/// jump references it.
fn labels_line(body: &Body) -> String {
    let mut labels: Vec<&str> = Vec::new();
    for instruction in &body.instructions {
        if let Some(label) = instruction.label.as_deref() {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
    }
    if body
        .instructions
        .iter()
        .any(|i| i.kind.jump_target().map(String::as_str) == Some(EXIT_LABEL))
    {
        labels.push(EXIT_LABEL);
    }
    labels.join(", ")
}
