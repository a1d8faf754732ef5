//! Shared helpers for building S-Program documents and running them in
//! integration tests.
#![allow(dead_code)]

use semu::{Emulator, RunResult};

/// Build an `S-Instruction` element. `label` is the defining label (empty
/// for none); `args` become `S-Instruction-Argument` entries.
pub fn instr(
    ty: &str,
    name: &str,
    var: &str,
    label: &str,
    args: &[(&str, &str)],
) -> String {
    let label_el = if label.is_empty() {
        String::new()
    } else {
        format!("<S-Label>{}</S-Label>", label)
    };
    let args_el = if args.is_empty() {
        String::new()
    } else {
        let entries: String = args
            .iter()
            .map(|(name, value)| {
                format!(
                    r#"<S-Instruction-Argument name="{}" value="{}"/>"#,
                    name, value
                )
            })
            .collect();
        format!(
            "<S-Instruction-Arguments>{}</S-Instruction-Arguments>",
            entries
        )
    };
    format!(
        r#"<S-Instruction type="{}" name="{}"><S-Variable>{}</S-Variable>{}{}</S-Instruction>"#,
        ty, name, var, label_el, args_el
    )
}

/// Build a whole document around a main instruction sequence.
pub fn document(instructions: &[String]) -> String {
    document_with_functions(instructions, &[])
}

/// Build a document with named functions. Each function is
/// `(name, user_string, instructions)`.
pub fn document_with_functions(
    instructions: &[String],
    functions: &[(&str, &str, Vec<String>)],
) -> String {
    let main: String = instructions.concat();
    let functions: String = functions
        .iter()
        .map(|(name, user_string, body)| {
            format!(
                r#"<S-Function name="{}" user-string="{}"><S-Instructions>{}</S-Instructions></S-Function>"#,
                name,
                user_string,
                body.concat()
            )
        })
        .collect();
    format!(
        r#"<S-Program name="test"><S-Instructions>{}</S-Instructions>{}</S-Program>"#,
        main, functions
    )
}

/// Load a document, panicking on any load error.
pub fn load(src: &str) -> Emulator {
    Emulator::load(src.into())
        .unwrap_or_else(|err| panic!("load failed: {}", err))
}

/// Load and run a document to completion.
pub fn run(src: &str, inputs: &[i64], depth: u32) -> RunResult {
    load(src)
        .run(inputs, depth)
        .unwrap_or_else(|err| panic!("run failed: {}", err))
}
