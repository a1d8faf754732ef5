//! Reference validation. The parser guarantees the document's shape; this
//! pass guarantees that everything a program points at actually exists:
//! every jump target resolves within its own sequence (or is `EXIT`), and
//! every function named by a `QUOTE` (including functions named inside
//! nested argument expressions) is user-defined or built-in. All problems
//! are collected and reported together.

use crate::{
    ast::{
        source::Program, Instruction, InstructionKind, SyntheticOp,
    },
    consts::EXIT_LABEL,
    dispatch,
    error::{CompileError, SourceErrorWrapper, WithSource},
    util::Span,
    Loader,
};
use std::collections::HashSet;

impl Loader<Program> {
    /// Performs all reference validation on the parsed program. If any
    /// errors occur, `Err` is returned with the whole collection.
    pub(crate) fn validate(
        self,
    ) -> Result<Loader<Program>, WithSource<CompileError>> {
        let errors = validate_program(&self.ast);
        if errors.is_empty() {
            Ok(self)
        } else {
            let errors: Vec<_> = errors
                .into_iter()
                .map(|(error, span)| {
                    SourceErrorWrapper::new(error, span, &self.source)
                })
                .collect();
            Err(WithSource::new(errors, self.source))
        }
    }
}

fn validate_program(program: &Program) -> Vec<(CompileError, Span)> {
    // Function names are matched case-insensitively, user-defined first
    let function_names: HashSet<String> = program
        .functions
        .iter()
        .map(|function| function.name.to_uppercase())
        .collect();

    let mut errors = Vec::new();
    validate_sequence(&program.body, &function_names, &mut errors);
    for function in &program.functions {
        validate_sequence(&function.body, &function_names, &mut errors);
    }
    errors
}

/// Validate one instruction sequence. Jump targets resolve against the
/// labels of this sequence only; functions are program-global.
fn validate_sequence(
    instructions: &[Instruction],
    function_names: &HashSet<String>,
    errors: &mut Vec<(CompileError, Span)>,
) {
    let defined: HashSet<&str> = instructions
        .iter()
        .filter_map(|instruction| instruction.label.as_deref())
        .collect();

    for instruction in instructions {
        if let Some(label) = instruction.kind.jump_target() {
            if label != EXIT_LABEL && !defined.contains(label.as_str()) {
                errors.push((CompileError::InvalidLabel, instruction.span));
            }
        }
        if let InstructionKind::Synthetic {
            op: SyntheticOp::Quote { function, args },
            ..
        } = &instruction.kind
        {
            let mut referenced = vec![function.as_str()];
            for term in &args.terms {
                term.collect_functions(&mut referenced);
            }
            for name in referenced {
                if !function_names.contains(&name.to_uppercase())
                    && !dispatch::is_builtin(name)
                {
                    errors.push((
                        CompileError::UnknownFunction,
                        instruction.span,
                    ));
                }
            }
        }
    }
}
