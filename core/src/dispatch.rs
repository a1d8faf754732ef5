//! Function dispatch for `QUOTE`. Argument terms evaluate left-to-right,
//! depth-first, in the *caller's* frame; the call itself resolves against
//! user-defined functions first (case-insensitive), then the built-in table.
//! User-defined callees run on fresh frames via [crate::machine::run_body].

use crate::{
    ast::{exec::Program, ArgTerm, LangValue},
    consts::MAX_CALL_DEPTH,
    error::RuntimeError,
    machine::{self, Frame},
    models::MachineSpec,
};

/// Evaluate the top-level terms of a call's argument expression.
pub(crate) fn evaluate_terms(
    terms: &[ArgTerm],
    frame: &Frame,
    program: &Program,
    spec: &MachineSpec,
    call_depth: usize,
) -> Result<Vec<LangValue>, RuntimeError> {
    terms
        .iter()
        .map(|term| evaluate_term(term, frame, program, spec, call_depth))
        .collect()
}

fn evaluate_term(
    term: &ArgTerm,
    frame: &Frame,
    program: &Program,
    spec: &MachineSpec,
    call_depth: usize,
) -> Result<LangValue, RuntimeError> {
    match term {
        ArgTerm::Var(var) => frame.lookup(*var).ok_or_else(|| {
            // Resolution pre-seeds every referenced variable, so a miss here
            // indicates a malformed frame
            RuntimeError::InvalidVariable {
                name: var.to_string(),
            }
        }),
        ArgTerm::Call { function, args } => {
            let values =
                evaluate_terms(args, frame, program, spec, call_depth)?;
            call(function, &values, program, spec, call_depth)
        }
    }
}

/// Apply a function to already-evaluated arguments. User-defined functions
/// shadow built-ins of the same name.
pub(crate) fn call(
    name: &str,
    args: &[LangValue],
    program: &Program,
    spec: &MachineSpec,
    call_depth: usize,
) -> Result<LangValue, RuntimeError> {
    if call_depth >= MAX_CALL_DEPTH {
        return Err(RuntimeError::CallDepthExceeded {
            limit: MAX_CALL_DEPTH,
        });
    }
    if let Some(function) = program.function(name) {
        return machine::run_body(
            &function.body,
            program,
            spec,
            args,
            call_depth + 1,
        );
    }
    // The validator has already resolved every referenced name, so an
    // unknown function at runtime is defensive
    call_builtin(name, args, spec).ok_or_else(|| {
        RuntimeError::UnknownFunction {
            name: name.to_string(),
        }
    })
}

/// Whether a name refers to a built-in function (case-insensitive).
pub(crate) fn is_builtin(name: &str) -> bool {
    matches!(
        name.to_uppercase().as_str(),
        "CONST0"
            | "MINUS"
            | "SMALLER_THAN"
            | "SMALLER_EQUAL_THAN"
            | "EQUAL"
            | "NOT"
            | "AND"
    )
}

/// The built-in function table. Predicates return 0 or 1; missing arguments
/// read as 0, consistent with the missing-input rule.
fn call_builtin(
    name: &str,
    args: &[LangValue],
    spec: &MachineSpec,
) -> Option<LangValue> {
    let arg = |i: usize| args.get(i).copied().unwrap_or(0);
    let value = match name.to_uppercase().as_str() {
        "CONST0" => 0,
        "MINUS" => {
            let difference = arg(0) - arg(1);
            if spec.allow_negative {
                difference
            } else {
                difference.max(0)
            }
        }
        "SMALLER_THAN" => (arg(0) < arg(1)) as LangValue,
        "SMALLER_EQUAL_THAN" => (arg(0) <= arg(1)) as LangValue,
        "EQUAL" => (arg(0) == arg(1)) as LangValue,
        "NOT" => (arg(0) == 0) as LangValue,
        "AND" => {
            (!args.is_empty() && args.iter().all(|&a| a != 0)) as LangValue
        }
        _ => return None,
    };
    Some(value)
}
