//! Integration tests for one-level expansion: observable equivalence, cost
//! preservation, idempotence, and the copy algorithm's invariants.

mod utils;

use semu::{ast::VarRef, expand, max_expansion_depth};
use utils::{document, document_with_functions, instr, load};

/// Run a program at depth 0 and depth 1 on each input vector, asserting that
/// `y` and the cycle total are identical at both levels.
fn assert_equivalent(src: &str, inputs_list: &[&[i64]]) {
    let mut emulator = load(src);
    assert_eq!(emulator.max_expansion_depth(), 1);
    for &inputs in inputs_list {
        let depth0 = emulator.run(inputs, 0).unwrap();
        let depth1 = emulator.run(inputs, 1).unwrap();
        assert_eq!(
            depth0.y_value, depth1.y_value,
            "y mismatch for inputs {:?}",
            inputs
        );
        assert_eq!(
            depth0.cycles, depth1.cycles,
            "cycle mismatch for inputs {:?}",
            inputs
        );
    }
}

#[test]
fn test_zero_variable_equivalence() {
    let src = document(&[
        instr("basic", "INCREASE", "y", "", &[]),
        instr("basic", "INCREASE", "y", "", &[]),
        instr("synthetic", "ZERO_VARIABLE", "y", "", &[]),
    ]);
    assert_equivalent(&src, &[&[]]);
}

#[test]
fn test_assignment_equivalence() {
    let src = document(&[instr(
        "synthetic",
        "ASSIGNMENT",
        "y",
        "",
        &[("assignedVariable", "x1")],
    )]);
    assert_equivalent(&src, &[&[0], &[1], &[5], &[12]]);
}

#[test]
fn test_constant_assignment_equivalence() {
    let src = document(&[instr(
        "synthetic",
        "CONSTANT_ASSIGNMENT",
        "y",
        "",
        &[("constantValue", "4")],
    )]);
    assert_equivalent(&src, &[&[]]);
}

#[test]
fn test_goto_and_jump_zero_equivalence() {
    let src = document(&[
        instr("synthetic", "JUMP_ZERO", "x1", "", &[("JZLabel", "SKIP")]),
        instr("basic", "INCREASE", "y", "", &[]),
        instr("synthetic", "GOTO_LABEL", "y", "", &[("gotoLabel", "EXIT")]),
        instr("basic", "INCREASE", "y", "SKIP", &[]),
        instr("basic", "INCREASE", "y", "", &[]),
    ]);
    assert_equivalent(&src, &[&[0], &[3]]);
}

#[test]
fn test_jump_equal_constant_equivalence() {
    let src = document(&[
        instr(
            "synthetic",
            "JUMP_EQUAL_CONSTANT",
            "x1",
            "",
            &[("JEConstantLabel", "EXIT"), ("constantValue", "3")],
        ),
        instr("basic", "INCREASE", "y", "", &[]),
    ]);
    // The v < k case is the trap: a copy drained by k decrements would
    // saturate to zero and wrongly report equality
    assert_equivalent(&src, &[&[0], &[2], &[3], &[7]]);
}

#[test]
fn test_jump_equal_variable_equivalence() {
    let src = document(&[
        instr(
            "synthetic",
            "JUMP_EQUAL_VARIABLE",
            "x1",
            "",
            &[("JEVariableLabel", "EXIT"), ("variableName", "x2")],
        ),
        instr("basic", "INCREASE", "y", "", &[]),
    ]);
    assert_equivalent(
        &src,
        &[&[0, 0], &[0, 4], &[4, 0], &[4, 4], &[4, 5], &[9, 9]],
    );
}

#[test]
fn test_self_comparison_equivalence() {
    let src = document(&[
        instr(
            "synthetic",
            "JUMP_EQUAL_VARIABLE",
            "x1",
            "",
            &[("JEVariableLabel", "EXIT"), ("variableName", "x1")],
        ),
        instr("basic", "INCREASE", "y", "", &[]),
    ]);
    assert_equivalent(&src, &[&[0], &[9]]);
}

#[test]
fn test_looping_synthetic_groups_equivalence() {
    // A loop whose back-edge and exit test are both synthetic, so expansion
    // groups are re-entered once per iteration
    let src = document(&[
        instr(
            "synthetic",
            "JUMP_ZERO",
            "x1",
            "A",
            &[("JZLabel", "EXIT")],
        ),
        instr("basic", "DECREASE", "x1", "", &[]),
        instr("basic", "INCREASE", "y", "", &[]),
        instr("synthetic", "GOTO_LABEL", "y", "", &[("gotoLabel", "A")]),
    ]);
    assert_equivalent(&src, &[&[0], &[1], &[3]]);
}

#[test]
fn test_copy_preserves_source_and_temporaries() {
    let src = document(&[instr(
        "synthetic",
        "ASSIGNMENT",
        "y",
        "",
        &[("assignedVariable", "x1")],
    )]);
    let mut emulator = load(&src);
    let result = emulator.run(&[5], 1).unwrap();
    assert_eq!(result.y_value, 5);
    // The source survives the copy, and every temporary drains back to zero
    assert_eq!(result.variables[&VarRef::Input(1)], 5);
    for (var, value) in &result.variables {
        if let VarRef::Work(_) = var {
            assert_eq!(*value, 0, "{} should end at zero", var);
        }
    }
}

#[test]
fn test_expansion_is_idempotent() {
    let src = document(&[
        instr("synthetic", "ZERO_VARIABLE", "y", "", &[]),
        instr(
            "synthetic",
            "JUMP_EQUAL_VARIABLE",
            "x1",
            "",
            &[("JEVariableLabel", "EXIT"), ("variableName", "x2")],
        ),
    ]);
    let emulator = load(&src);
    let once = emulator.expand(1);
    let twice = expand(&once, 1);
    assert_eq!(once, twice);
}

#[test]
fn test_expanded_lines_track_ancestry() {
    let src = document(&[
        instr("basic", "INCREASE", "y", "", &[]),
        instr("synthetic", "ZERO_VARIABLE", "y", "", &[]),
    ]);
    let expanded = load(&src).expand(1);
    let lines = &expanded.body.instructions;
    // The surviving basic keeps no ancestry; every expanded line points at
    // line 2, and indexes are contiguous from 1
    assert_eq!(lines[0].origin, None);
    assert!(lines[1..].iter().all(|line| line.origin == Some(2)));
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line.index, i + 1);
    }
    // Only the group header carries the synthetic's cost
    assert_eq!(lines[1].cost, 17);
    assert!(lines[2..].iter().all(|line| line.cost == 0));
}

#[test]
fn test_expanded_program_contains_only_basics() {
    let src = document(&[
        instr("synthetic", "ZERO_VARIABLE", "y", "", &[]),
        instr(
            "synthetic",
            "JUMP_EQUAL_CONSTANT",
            "x1",
            "",
            &[("JEConstantLabel", "EXIT"), ("constantValue", "2")],
        ),
    ]);
    let expanded = load(&src).expand(1);
    assert!(expanded
        .body
        .instructions
        .iter()
        .all(|line| line.kind.is_basic()));
    // Nothing left to expand
    assert_eq!(max_expansion_depth(&expanded), 0);
}

#[test]
fn test_quote_pins_program_at_depth_zero() {
    let identity = vec![instr(
        "synthetic",
        "ASSIGNMENT",
        "y",
        "",
        &[("assignedVariable", "x1")],
    )];
    let src = document_with_functions(
        &[
            instr("synthetic", "ZERO_VARIABLE", "z1", "", &[]),
            instr(
                "synthetic",
                "QUOTE",
                "y",
                "",
                &[("functionName", "ID"), ("functionArguments", "x1")],
            ),
        ],
        &[("ID", "identity", identity)],
    );
    let emulator = load(&src);
    assert_eq!(emulator.max_expansion_depth(), 0);
    // Expansion falls back to depth 0: the program passes through unchanged
    let expanded = emulator.expand(1);
    assert_eq!(&expanded, emulator.program());
}

#[test]
fn test_basic_only_program_has_no_expansion() {
    let src = document(&[instr("basic", "INCREASE", "y", "", &[])]);
    let emulator = load(&src);
    assert_eq!(emulator.max_expansion_depth(), 0);
    assert_eq!(&emulator.expand(1), emulator.program());
}

#[test]
fn test_fresh_names_start_past_existing_maximums() {
    // L5 referenced and z3 referenced: fresh allocations must start at L6/z4
    let src = document(&[
        instr("basic", "INCREASE", "z3", "L5", &[]),
        instr("synthetic", "GOTO_LABEL", "y", "", &[("gotoLabel", "L5")]),
    ]);
    let expanded = load(&src).expand(1);
    let goto_lines = &expanded.body.instructions[1..];
    // GOTO expands to an increment of a fresh flag and a jump on it
    assert_eq!(goto_lines[0].kind.to_string(), "z4 <- z4 + 1");
    assert_eq!(goto_lines[1].kind.to_string(), "IF z4 != 0 GOTO L5");
}
