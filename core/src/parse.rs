//! The document parser: turns an S-Program document into a
//! [source::Program]. Everything structural is checked here: the element
//! schema, attribute presence, variable/constant syntax, and per-operation
//! argument extraction. Reference resolution (labels, functions) is the
//! validator's job.

use crate::{
    args,
    ast::{
        source::{Function, Program},
        BasicOp, CallArgs, Instruction, InstructionKind, Label, LangValue,
        SyntheticOp, VarRef,
    },
    consts::{
        ARG_ASSIGNED_VARIABLE, ARG_CONSTANT, ARG_FUNCTION_ARGS,
        ARG_FUNCTION_NAME, ARG_GOTO_LABEL, ARG_JEC_LABEL, ARG_JEV_LABEL,
        ARG_JNZ_LABEL, ARG_JZ_LABEL, ARG_VARIABLE_NAME, ATTR_NAME, ATTR_TYPE,
        ATTR_USER_STRING, ATTR_VALUE, EL_ARGUMENT, EL_ARGUMENTS, EL_FUNCTION,
        EL_INSTRUCTION, EL_INSTRUCTIONS, EL_LABEL, EL_PROGRAM, EL_VARIABLE,
        EXIT_LABEL,
    },
    error::{CompileError, SourceErrorWrapper, WithSource},
    util::Span,
    xml::{self, Element},
    Loader,
};
use std::{collections::HashMap, iter};

type ParseResult<T> = Result<T, (CompileError, Span)>;

impl Loader<()> {
    /// Parses the source document into an abstract syntax tree.
    pub(crate) fn parse(
        self,
    ) -> Result<Loader<Program>, WithSource<CompileError>> {
        match parse(&self.source) {
            Ok(program) => Ok(Loader {
                source: self.source,
                ast: program,
            }),
            Err((error, span)) => {
                let wrapper =
                    SourceErrorWrapper::new(error, span, &self.source);
                Err(WithSource::new(iter::once(wrapper), self.source))
            }
        }
    }
}

fn parse(src: &str) -> ParseResult<Program> {
    let root = xml::parse_document(src)?;
    if root.name != EL_PROGRAM {
        return Err((
            CompileError::MissingElement {
                expected: EL_PROGRAM,
            },
            root.span,
        ));
    }
    let name = required_attr(&root, ATTR_NAME)?.to_string();

    // Only the *direct* S-Instructions child holds the main sequence.
    // Instructions nested under S-Function elements must not leak in here.
    let instructions_el = root.child_named(EL_INSTRUCTIONS).ok_or((
        CompileError::MissingElement {
            expected: EL_INSTRUCTIONS,
        },
        root.span,
    ))?;
    let body = parse_sequence(instructions_el)?;

    let mut functions = Vec::new();
    for function_el in root.children_named(EL_FUNCTION) {
        functions.push(parse_function(function_el)?);
    }

    Ok(Program {
        name,
        body,
        functions,
    })
}

fn parse_function(el: &Element) -> ParseResult<Function> {
    let name = required_attr(el, ATTR_NAME)?.to_string();
    let user_string = el.attr(ATTR_USER_STRING).unwrap_or("").to_string();
    let instructions_el = el.child_named(EL_INSTRUCTIONS).ok_or((
        CompileError::MissingElement {
            expected: EL_INSTRUCTIONS,
        },
        el.span,
    ))?;
    Ok(Function {
        name,
        user_string,
        body: parse_sequence(instructions_el)?,
    })
}

fn parse_sequence(el: &Element) -> ParseResult<Vec<Instruction>> {
    el.children_named(EL_INSTRUCTION)
        .enumerate()
        .map(|(i, child)| parse_instruction(child, i + 1))
        .collect()
}

fn parse_instruction(el: &Element, index: usize) -> ParseResult<Instruction> {
    let type_attr = required_attr(el, ATTR_TYPE)?;
    let op_name = required_attr(el, ATTR_NAME)?.to_uppercase();

    let variables: Vec<&Element> = el.children_named(EL_VARIABLE).collect();
    let target_el = match variables.as_slice() {
        [variable] => *variable,
        _ => {
            return Err((
                CompileError::WrongVariableCount {
                    found: variables.len(),
                },
                el.span,
            ))
        }
    };
    let target = parse_var(target_el)?;
    let label = parse_defining_label(el)?;
    let arguments = ArgMap::parse(el)?;

    let kind = match type_attr {
        "basic" => parse_basic(&op_name, target, &arguments, el.span)?,
        "synthetic" => parse_synthetic(&op_name, target, &arguments, el.span)?,
        other => {
            return Err((
                CompileError::InvalidInstructionType {
                    found: other.to_string(),
                },
                el.span,
            ))
        }
    };
    Ok(Instruction::new(kind, label, index, el.span))
}

fn parse_basic(
    op_name: &str,
    target: VarRef,
    arguments: &ArgMap,
    span: Span,
) -> ParseResult<InstructionKind> {
    let op = BasicOp::from_name(op_name).ok_or((
        CompileError::UnknownOp {
            name: op_name.to_string(),
        },
        span,
    ))?;
    let jump_label = match op {
        BasicOp::JumpNotZero => {
            Some(arguments.required_label(ARG_JNZ_LABEL, span)?)
        }
        _ => None,
    };
    Ok(InstructionKind::Basic {
        op,
        target,
        jump_label,
    })
}

fn parse_synthetic(
    op_name: &str,
    target: VarRef,
    arguments: &ArgMap,
    span: Span,
) -> ParseResult<InstructionKind> {
    let op = match op_name {
        "ZERO_VARIABLE" => SyntheticOp::ZeroVariable,
        "ASSIGNMENT" => {
            // An absent (or empty) source means "assign zero"
            let source = match arguments.optional(ARG_ASSIGNED_VARIABLE) {
                None => None,
                Some((value, arg_span)) => Some(
                    VarRef::parse(value)
                        .ok_or((CompileError::InvalidVariable, arg_span))?,
                ),
            };
            SyntheticOp::Assignment { source }
        }
        "CONSTANT_ASSIGNMENT" => SyntheticOp::ConstantAssignment {
            value: arguments.required_integer(ARG_CONSTANT, span)?,
        },
        "GOTO_LABEL" => SyntheticOp::GotoLabel {
            label: arguments.required_label(ARG_GOTO_LABEL, span)?,
        },
        "JUMP_ZERO" => SyntheticOp::JumpZero {
            label: arguments.required_label(ARG_JZ_LABEL, span)?,
        },
        "JUMP_EQUAL_CONSTANT" => SyntheticOp::JumpEqualConstant {
            value: arguments.required_integer(ARG_CONSTANT, span)?,
            label: arguments.required_label(ARG_JEC_LABEL, span)?,
        },
        "JUMP_EQUAL_VARIABLE" => {
            let (value, arg_span) =
                arguments.required(ARG_VARIABLE_NAME, span)?;
            SyntheticOp::JumpEqualVariable {
                other: VarRef::parse(value)
                    .ok_or((CompileError::InvalidVariable, arg_span))?,
                label: arguments.required_label(ARG_JEV_LABEL, span)?,
            }
        }
        "QUOTE" => {
            let (function, _) = arguments.required(ARG_FUNCTION_NAME, span)?;
            let (text, args_span) = arguments
                .optional(ARG_FUNCTION_ARGS)
                .unwrap_or(("", span));
            let terms = args::parse_terms(text).map_err(|detail| {
                (
                    CompileError::InvalidArgumentExpression { detail },
                    args_span,
                )
            })?;
            SyntheticOp::Quote {
                function: function.to_string(),
                args: CallArgs {
                    text: text.to_string(),
                    terms,
                },
            }
        }
        _ => {
            return Err((
                CompileError::UnknownOp {
                    name: op_name.to_string(),
                },
                span,
            ))
        }
    };
    Ok(InstructionKind::Synthetic { op, target })
}

fn parse_var(el: &Element) -> ParseResult<VarRef> {
    VarRef::parse(el.text.trim())
        .ok_or((CompileError::InvalidVariable, el.span))
}

/// The optional defining label of an instruction. `EXIT` is reserved and
/// cannot be defined.
fn parse_defining_label(el: &Element) -> ParseResult<Option<Label>> {
    let label_el = match el.child_named(EL_LABEL) {
        Some(label_el) => label_el,
        None => return Ok(None),
    };
    let label = label_el.text.trim().to_uppercase();
    if label.is_empty() {
        return Ok(None);
    }
    if label == EXIT_LABEL {
        return Err((CompileError::ReservedLabel, label_el.span));
    }
    Ok(Some(label))
}

/// An attribute that must be present and non-empty.
fn required_attr<'a>(
    el: &'a Element,
    attribute: &'static str,
) -> ParseResult<&'a str> {
    el.attr(attribute)
        .filter(|value| !value.trim().is_empty())
        .ok_or((CompileError::MissingAttribute { attribute }, el.span))
}

/// The parsed argument bag of one instruction: `name -> (value, span)`.
struct ArgMap(HashMap<String, (String, Span)>);

impl ArgMap {
    fn parse(el: &Element) -> ParseResult<Self> {
        let mut map = HashMap::new();
        if let Some(container) = el.child_named(EL_ARGUMENTS) {
            for arg_el in container.children_named(EL_ARGUMENT) {
                let name = arg_el.attr(ATTR_NAME).ok_or((
                    CompileError::MissingAttribute {
                        attribute: ATTR_NAME,
                    },
                    arg_el.span,
                ))?;
                let value = arg_el.attr(ATTR_VALUE).ok_or((
                    CompileError::MissingAttribute {
                        attribute: ATTR_VALUE,
                    },
                    arg_el.span,
                ))?;
                map.insert(
                    name.to_string(),
                    (value.to_string(), arg_el.span),
                );
            }
        }
        Ok(Self(map))
    }

    /// A present, non-empty argument. Spans point at the argument element.
    fn optional(&self, key: &str) -> Option<(&str, Span)> {
        self.0
            .get(key)
            .filter(|(value, _)| !value.trim().is_empty())
            .map(|(value, span)| (value.as_str(), *span))
    }

    fn required(
        &self,
        key: &'static str,
        fallback: Span,
    ) -> ParseResult<(&str, Span)> {
        self.optional(key).ok_or((
            CompileError::MissingArgument { argument: key },
            fallback,
        ))
    }

    fn required_label(
        &self,
        key: &'static str,
        fallback: Span,
    ) -> ParseResult<Label> {
        let (value, _) = self.required(key, fallback)?;
        Ok(value.trim().to_uppercase())
    }

    fn required_integer(
        &self,
        key: &'static str,
        fallback: Span,
    ) -> ParseResult<LangValue> {
        let (value, span) = self.required(key, fallback)?;
        value
            .trim()
            .parse::<LangValue>()
            .map_err(|_| (CompileError::InvalidInteger, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        parse(src).unwrap()
    }

    #[test]
    fn test_minimal_program() {
        let program = parse_ok(
            r#"<S-Program name="successor">
  <S-Instructions>
    <S-Instruction type="basic" name="INCREASE">
      <S-Variable>y</S-Variable>
    </S-Instruction>
  </S-Instructions>
</S-Program>"#,
        );
        assert_eq!(program.name, "successor");
        assert_eq!(program.body.len(), 1);
        assert_eq!(
            program.body[0].kind,
            InstructionKind::Basic {
                op: BasicOp::Increase,
                target: VarRef::Output,
                jump_label: None,
            }
        );
        assert_eq!(program.body[0].index, 1);
        assert_eq!(program.body[0].cost, 1);
    }

    #[test]
    fn test_case_folding() {
        // Mixed-case op names, variables and labels all normalize
        let program = parse_ok(
            r#"<S-Program name="p">
  <S-Instructions>
    <S-Instruction type="basic" name="jump_not_zero">
      <S-Variable>X1</S-Variable>
      <S-Label>loop</S-Label>
      <S-Instruction-Arguments>
        <S-Instruction-Argument name="JNZLabel" value="Loop"/>
      </S-Instruction-Arguments>
    </S-Instruction>
  </S-Instructions>
</S-Program>"#,
        );
        let instruction = &program.body[0];
        assert_eq!(instruction.label.as_deref(), Some("LOOP"));
        assert_eq!(
            instruction.kind,
            InstructionKind::Basic {
                op: BasicOp::JumpNotZero,
                target: VarRef::Input(1),
                jump_label: Some("LOOP".into()),
            }
        );
    }

    #[test]
    fn test_function_sequences_stay_separate() {
        // The main scan must not descend into the function's instructions
        let program = parse_ok(
            r#"<S-Program name="p">
  <S-Instructions>
    <S-Instruction type="synthetic" name="QUOTE">
      <S-Variable>y</S-Variable>
      <S-Instruction-Arguments>
        <S-Instruction-Argument name="functionName" value="S"/>
        <S-Instruction-Argument name="functionArguments" value="x1"/>
      </S-Instruction-Arguments>
    </S-Instruction>
  </S-Instructions>
  <S-Function name="S" user-string="successor">
    <S-Instructions>
      <S-Instruction type="synthetic" name="ASSIGNMENT">
        <S-Variable>y</S-Variable>
        <S-Instruction-Arguments>
          <S-Instruction-Argument name="assignedVariable" value="x1"/>
        </S-Instruction-Arguments>
      </S-Instruction>
      <S-Instruction type="basic" name="INCREASE">
        <S-Variable>y</S-Variable>
      </S-Instruction>
    </S-Instructions>
  </S-Function>
</S-Program>"#,
        );
        assert_eq!(program.body.len(), 1);
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].name, "S");
        assert_eq!(program.functions[0].user_string, "successor");
        assert_eq!(program.functions[0].body.len(), 2);
    }

    #[test]
    fn test_constant_cost() {
        let program = parse_ok(
            r#"<S-Program name="p">
  <S-Instructions>
    <S-Instruction type="synthetic" name="CONSTANT_ASSIGNMENT">
      <S-Variable>y</S-Variable>
      <S-Instruction-Arguments>
        <S-Instruction-Argument name="constantValue" value="3"/>
      </S-Instruction-Arguments>
    </S-Instruction>
  </S-Instructions>
</S-Program>"#,
        );
        // 17 + k + 1
        assert_eq!(program.body[0].cost, 21);
    }

    #[test]
    fn test_empty_assigned_variable_is_zero_source() {
        let program = parse_ok(
            r#"<S-Program name="p">
  <S-Instructions>
    <S-Instruction type="synthetic" name="ASSIGNMENT">
      <S-Variable>y</S-Variable>
      <S-Instruction-Arguments>
        <S-Instruction-Argument name="assignedVariable" value=""/>
      </S-Instruction-Arguments>
    </S-Instruction>
  </S-Instructions>
</S-Program>"#,
        );
        assert_eq!(
            program.body[0].kind,
            InstructionKind::Synthetic {
                op: SyntheticOp::Assignment { source: None },
                target: VarRef::Output,
            }
        );
    }

    #[test]
    fn test_missing_required_argument() {
        let err = parse(
            r#"<S-Program name="p">
  <S-Instructions>
    <S-Instruction type="basic" name="JUMP_NOT_ZERO">
      <S-Variable>x1</S-Variable>
    </S-Instruction>
  </S-Instructions>
</S-Program>"#,
        )
        .unwrap_err();
        assert!(matches!(
            err.0,
            CompileError::MissingArgument {
                argument: "JNZLabel"
            }
        ));
    }

    #[test]
    fn test_wrong_variable_count() {
        let err = parse(
            r#"<S-Program name="p">
  <S-Instructions>
    <S-Instruction type="basic" name="NEUTRAL">
      <S-Variable>y</S-Variable>
      <S-Variable>x1</S-Variable>
    </S-Instruction>
  </S-Instructions>
</S-Program>"#,
        )
        .unwrap_err();
        assert!(matches!(
            err.0,
            CompileError::WrongVariableCount { found: 2 }
        ));
    }
}
