//! The label and input resolver. Takes a validated [source::Program] and
//! derives everything execution and expansion need: the label map (earliest
//! definition wins), the maximum `L{n}`/`z{n}` indexes that seed the
//! expander's fresh allocators, the referenced input variables, and the
//! function lookup table.

use crate::{
    ast::{exec, source, ArgTerm, Instruction, InstructionKind, Label,
        SyntheticOp, VarRef},
    consts::LABEL_TAG,
    Loader,
};
use std::collections::{BTreeSet, HashMap};

impl Loader<source::Program> {
    /// Annotates the program with its derived data, producing the resolved
    /// form consumed by the interpreter and expander.
    pub(crate) fn resolve(self) -> Loader<exec::Program> {
        let source::Program {
            name,
            body,
            functions,
        } = self.ast;

        let functions: Vec<exec::Function> = functions
            .into_iter()
            .map(|function| exec::Function {
                name: function.name,
                user_string: function.user_string,
                body: resolve_body(function.body),
            })
            .collect();
        let function_index = functions
            .iter()
            .enumerate()
            .map(|(i, function)| (function.name.to_uppercase(), i))
            // On a name collision the earliest definition wins
            .rev()
            .collect();

        Loader {
            source: self.source,
            ast: exec::Program {
                name,
                body: resolve_body(body),
                functions,
                function_index,
            },
        }
    }
}

/// Derive a [exec::Body] from an instruction sequence. Also used by the
/// expander to re-derive the maps after rewriting.
pub(crate) fn resolve_body(instructions: Vec<Instruction>) -> exec::Body {
    let mut label_map: HashMap<Label, usize> = HashMap::new();
    let mut max_label_index = 0;
    let mut max_work_var_index = 0;
    let mut input_vars: BTreeSet<u32> = BTreeSet::new();

    let mut track_var = |var: VarRef| match var {
        VarRef::Output => {}
        VarRef::Input(n) => {
            input_vars.insert(n);
        }
        VarRef::Work(n) => max_work_var_index = max_work_var_index.max(n),
    };

    for (i, instruction) in instructions.iter().enumerate() {
        if let Some(label) = &instruction.label {
            // Earliest definition wins
            label_map.entry(label.clone()).or_insert(i);
            max_label_index = max_label_index.max(label_index(label));
        }
        if let Some(label) = instruction.kind.jump_target() {
            max_label_index = max_label_index.max(label_index(label));
        }

        track_var(instruction.kind.target());
        match &instruction.kind {
            InstructionKind::Synthetic {
                op: SyntheticOp::Assignment { source: Some(source) },
                ..
            } => track_var(*source),
            InstructionKind::Synthetic {
                op: SyntheticOp::JumpEqualVariable { other, .. },
                ..
            } => track_var(*other),
            InstructionKind::Synthetic {
                op: SyntheticOp::Quote { args, .. },
                ..
            } => {
                let mut vars = Vec::new();
                for term in &args.terms {
                    term.collect_vars(&mut vars);
                }
                for var in vars {
                    track_var(var);
                }
            }
            _ => {}
        }
    }
    drop(track_var);

    exec::Body {
        instructions,
        label_map,
        max_label_index,
        max_work_var_index,
        input_vars: input_vars.into_iter().collect(),
    }
}

/// The numeric index of an `L{n}` label; other label shapes (including
/// `EXIT`) contribute nothing to the allocator seed.
fn label_index(label: &str) -> u32 {
    label
        .strip_prefix(LABEL_TAG)
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}
